//! Expressions over arbitrary values.
//!
//! Values that are not numbers are boxed into NaN payloads that index a per
//! expression [`ValueTable`], so they can flow through the numeric evaluator
//! unchanged and be unboxed again wherever caller code or a builtin needs them.
use std::fmt::{self, Debug, Display, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;
use smol_str::SmolStr;
use tracing::{debug, trace};

use crate::ast::{Node, ParsedExpression};
use crate::cache::ParseCache;
use crate::error::Error;
use crate::eval::builtin::{self as math, BuiltinFn};
use crate::eval::compiled::{Binding, Implementation};
use crate::eval::resolver::{function_arities, undefined};
use crate::eval::{Expression, Options, SymbolFn};
use crate::number::is_int;
use crate::symbol::Symbol;

mod builtin;
mod table;
mod value;

use builtin::{AnyBuiltinFn, mismatch};
use table::ValueTable;
pub use value::{Opaque, Value};

/// Implementation of a caller supplied symbol on unboxed values.
pub type AnySymbolFn = Arc<dyn Fn(&[Value]) -> Result<Value, Error> + Send + Sync>;

/// Fallback for symbols without a constant or implementation. Returning
/// `Ok(None)` defers to the standard library.
pub type AnyEvaluator = Arc<dyn Fn(&Symbol, &[Value]) -> Result<Option<Value>, Error> + Send + Sync>;

type Values = SmallVec<[Value; 4]>;

/// An expression whose constants, symbols and result may be any [`Value`].
///
/// ```
/// use xpr_lang::{AnyExpression, Value};
///
/// let mut expression = AnyExpression::builder("name + ' has ' + count + ' items'")
///     .constant("name", "cart")
///     .constant("count", 3.0)
///     .build();
///
/// assert_eq!(expression.evaluate(), Ok(Value::from("cart has 3 items")));
/// ```
pub struct AnyExpression {
    expression: Expression,
    table: Arc<Mutex<ValueTable>>,
    symbols: FxHashSet<Symbol>,
}

impl AnyExpression {
    pub fn new(source: &str) -> Self {
        Self::builder(source).build()
    }

    pub fn builder(source: &str) -> AnyExpressionBuilder {
        Self::builder_with_cache(source, ParseCache::global())
    }

    pub fn builder_with_cache(source: &str, cache: &ParseCache) -> AnyExpressionBuilder {
        AnyExpressionBuilder::from(cache.parse(source))
    }

    /// Evaluates the expression. Values boxed during the evaluation are dropped
    /// when it returns.
    pub fn evaluate(&mut self) -> Result<Value, Error> {
        let table = scopeguard::guard(&self.table, |table| lock(table).reset());
        let proxy = self.expression.evaluate()?;
        let value = lock(&table).unbox(proxy);
        Ok(value)
    }

    /// The symbols left after constant folding, excluding string literals.
    pub fn symbols(&self) -> &FxHashSet<Symbol> {
        &self.symbols
    }
}

impl Display for AnyExpression {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let table = lock(&self.table);
        write!(f, "{}", describe(self.expression.to_node(), &table))
    }
}

impl Debug for AnyExpression {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnyExpression")
            .field("description", &self.to_string())
            .field("symbols", &self.symbols)
            .finish()
    }
}

/// Collects the constants, symbols and evaluator an [`AnyExpression`] is bound to.
pub struct AnyExpressionBuilder {
    parsed: ParsedExpression,
    options: Options,
    constants: FxHashMap<SmolStr, Value>,
    numeric_symbols: FxHashMap<Symbol, SymbolFn>,
    symbols: FxHashMap<Symbol, AnySymbolFn>,
    evaluator: Option<AnyEvaluator>,
}

impl From<ParsedExpression> for AnyExpressionBuilder {
    fn from(parsed: ParsedExpression) -> Self {
        Self {
            parsed,
            options: Options::default(),
            constants: FxHashMap::default(),
            numeric_symbols: FxHashMap::default(),
            symbols: FxHashMap::default(),
            evaluator: None,
        }
    }
}

impl AnyExpressionBuilder {
    pub fn options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    /// Array and string constants can also be subscripted with `name[index]`.
    pub fn constant(mut self, name: impl Into<SmolStr>, value: impl Into<Value>) -> Self {
        self.constants.insert(name.into(), value.into());
        self
    }

    pub fn constants<K, V>(mut self, constants: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<SmolStr>,
        V: Into<Value>,
    {
        self.constants.extend(
            constants
                .into_iter()
                .map(|(name, value)| (name.into(), value.into())),
        );
        self
    }

    /// A symbol that only accepts numbers. Calls with any other argument are
    /// passed on to the symbols, evaluator and library that follow it.
    pub fn numeric_symbol<F>(mut self, symbol: Symbol, f: F) -> Self
    where
        F: Fn(&[f64]) -> Result<f64, Error> + Send + Sync + 'static,
    {
        self.numeric_symbols.insert(symbol, Arc::new(f));
        self
    }

    pub fn symbol<F>(mut self, symbol: Symbol, f: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, Error> + Send + Sync + 'static,
    {
        self.symbols.insert(symbol, Arc::new(f));
        self
    }

    pub fn evaluator<F>(mut self, f: F) -> Self
    where
        F: Fn(&Symbol, &[Value]) -> Result<Option<Value>, Error> + Send + Sync + 'static,
    {
        self.evaluator = Some(Arc::new(f));
        self
    }

    pub fn build(self) -> AnyExpression {
        let table = Arc::new(Mutex::new(ValueTable::new()));
        let expression = Expression::compile(&self.parsed, self.options, |symbol| {
            self.resolve(symbol, &table)
        });

        // Everything boxed so far is referenced by the compiled expression.
        let mut frozen = lock(&table);
        frozen.freeze();
        debug!(values = frozen.len(), "Froze value table");
        drop(frozen);

        let symbols = expression
            .symbols()
            .iter()
            .filter(|symbol| string_literal(symbol).is_none())
            .cloned()
            .collect();

        AnyExpression {
            expression,
            table,
            symbols,
        }
    }

    fn resolve(&self, symbol: &Symbol, table: &Arc<Mutex<ValueTable>>) -> Binding {
        let optimize = !self.options.contains(Options::NO_OPTIMIZE);

        if let Some(text) = string_literal(symbol) {
            trace!(%symbol, "Resolved to string literal");
            let proxy = lock(table).box_value(Value::String(text.into()));
            return Binding::new(Implementation::Constant(proxy), optimize);
        }

        match symbol {
            Symbol::Variable(name) => {
                if let Some(value) = self.constants.get(name) {
                    trace!(%symbol, "Resolved to constant");
                    let proxy = lock(table).box_value(value.clone());
                    return Binding::new(Implementation::Constant(proxy), optimize);
                }
            }
            Symbol::Array(name) => {
                if let Some(value) = self.constants.get(name) {
                    trace!(%symbol, "Resolved to subscript");
                    let handlers = vec![Handler::Subscript(value.clone())];
                    return bind(symbol, handlers, Error::UndefinedSymbol(symbol.clone()), table, optimize);
                }
            }
            _ => {}
        }

        let pure_symbol = self.options.contains(Options::PURE_SYMBOLS)
            && !matches!(symbol, Symbol::Variable(_));

        let mut handlers = Vec::new();
        if let Some(f) = self.numeric_symbols.get(symbol) {
            handlers.push(Handler::Numeric(Arc::clone(f), pure_symbol));
        }
        if let Some(f) = self.symbols.get(symbol) {
            handlers.push(Handler::Any(Arc::clone(f), pure_symbol));
        }
        if let Some(evaluator) = &self.evaluator {
            handlers.push(Handler::Evaluator(Arc::clone(evaluator)));
        }
        if let Some(f) = builtin::lookup(symbol, self.options) {
            handlers.push(Handler::Builtin(f));
        }
        if let Some(f) = math::lookup(symbol, Options::empty()) {
            handlers.push(Handler::Math(f));
        }

        let name = symbol.name();
        let arities = function_arities(name, self.numeric_symbols.keys())
            .chain(function_arities(name, self.symbols.keys()))
            .chain(math::function_arities(name, Options::empty()));
        let missing = undefined(symbol, arities);

        if handlers.is_empty() {
            trace!(%symbol, "Undefined symbol");
            return Binding::new(Implementation::Undefined(missing), false);
        }

        trace!(%symbol, handlers = handlers.len(), "Resolved to handlers");
        bind(symbol, handlers, missing, table, optimize)
    }
}

/// One way of evaluating a symbol. Handlers are tried in order until one of
/// them accepts the call.
enum Handler {
    /// Declines unless every argument is a number.
    Numeric(SymbolFn, bool),
    Any(AnySymbolFn, bool),
    Evaluator(AnyEvaluator),
    Builtin(AnyBuiltinFn),
    /// Fails with a type mismatch unless every argument is a number.
    Math(BuiltinFn),
    Subscript(Value),
}

impl Handler {
    fn is_pure(&self) -> bool {
        match self {
            Handler::Numeric(_, pure) | Handler::Any(_, pure) => *pure,
            Handler::Evaluator(_) => false,
            Handler::Builtin(_) | Handler::Math(_) | Handler::Subscript(_) => true,
        }
    }

    fn is_library(&self) -> bool {
        matches!(self, Handler::Builtin(_) | Handler::Math(_))
    }

    fn call(&self, symbol: &Symbol, proxies: &[f64], values: &[Value]) -> Result<Option<Value>, Error> {
        match self {
            Handler::Numeric(f, _) => match numbers(values) {
                Some(numbers) => f(&numbers).map(|n| Some(Value::Number(n))),
                None => Ok(None),
            },
            Handler::Any(f, _) => f(values).map(Some),
            Handler::Evaluator(evaluator) => evaluator(symbol, values),
            Handler::Builtin(f) => f(symbol, proxies, values),
            Handler::Math(f) => match numbers(values) {
                Some(numbers) => Ok(Some(Value::Number(f(&numbers)))),
                None => Err(mismatch(symbol, values)),
            },
            Handler::Subscript(value) => subscript(symbol, value, values).map(Some),
        }
    }
}

fn bind(
    symbol: &Symbol,
    handlers: Vec<Handler>,
    missing: Error,
    table: &Arc<Mutex<ValueTable>>,
    optimize: bool,
) -> Binding {
    let pure = optimize && handlers.iter().all(Handler::is_pure);
    let numeric = handlers.iter().any(|handler| matches!(handler, Handler::Numeric(..)));
    let symbol = symbol.clone();
    let table = Arc::clone(table);
    // Set once the evaluator has declined and the library answered instead.
    let settled = AtomicBool::new(false);

    let f: SymbolFn = Arc::new(move |proxies: &[f64]| {
        let values = {
            let table = lock(&table);
            proxies.iter().map(|proxy| table.unbox(*proxy)).collect::<Values>()
        };

        let skip_evaluator = settled.load(Ordering::Relaxed);
        let mut declined = false;
        for handler in &handlers {
            let is_evaluator = matches!(handler, Handler::Evaluator(_));
            if is_evaluator && skip_evaluator {
                continue;
            }

            match handler.call(&symbol, proxies, &values)? {
                Some(value) => {
                    if declined && optimize && handler.is_library() {
                        settled.store(true, Ordering::Relaxed);
                    }
                    return Ok(lock(&table).box_value(value));
                }
                None => declined |= is_evaluator,
            }
        }

        // Only a numeric symbol declines because of its arguments.
        if numeric {
            Err(mismatch(&symbol, &values))
        } else {
            Err(missing.clone())
        }
    });

    Binding::new(Implementation::Custom(f), pure)
}

fn numbers(values: &[Value]) -> Option<SmallVec<[f64; 4]>> {
    values.iter().map(Value::as_number).collect()
}

fn subscript(symbol: &Symbol, value: &Value, args: &[Value]) -> Result<Value, Error> {
    let index = match args {
        [Value::Number(index)] => *index,
        _ => return Err(mismatch(symbol, args)),
    };
    let out_of_bounds = || Error::ArrayBounds(index, symbol.clone());
    if !is_int(index) || index < 0.0 {
        return Err(out_of_bounds());
    }

    let index = index as usize;
    match value {
        Value::Array(values) => values.get(index).cloned().ok_or_else(out_of_bounds),
        Value::String(s) => s
            .chars()
            .nth(index)
            .map(|c| Value::String(c.to_string().into()))
            .ok_or_else(out_of_bounds),
        value => Err(mismatch(symbol, &[value.clone(), Value::Number(index as f64)])),
    }
}

/// The text of a `'...'` or `"..."` variable.
fn string_literal(symbol: &Symbol) -> Option<&str> {
    match symbol {
        Symbol::Variable(name) => ['\'', '"']
            .into_iter()
            .find_map(|quote| name.strip_prefix(quote)?.strip_suffix(quote)),
        _ => None,
    }
}

fn quote(text: &str) -> String {
    let mut quoted = String::with_capacity(text.len() + 2);
    quoted.push('\'');
    for c in text.chars() {
        match c {
            '\0' => quoted.push_str("\\0"),
            '\t' => quoted.push_str("\\t"),
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            '\'' | '\\' => {
                quoted.push('\\');
                quoted.push(c);
            }
            c => quoted.push(c),
        }
    }
    quoted.push('\'');
    quoted
}

/// Replaces boxed literals by something printable.
fn describe(node: Node, table: &ValueTable) -> Node {
    match node {
        Node::Literal(proxy) => match table.unbox(proxy) {
            Value::Number(n) => Node::Literal(n),
            Value::String(s) => Node::variable(quote(&s)),
            Value::Null => Node::variable("nil"),
            Value::Bool(b) => Node::variable(if b { "true" } else { "false" }),
            value => Node::variable(quote(&value.to_string())),
        },
        Node::Symbol(symbol, args) => Node::Symbol(
            symbol,
            args.into_iter().map(|arg| describe(arg, table)).collect(),
        ),
        node => node,
    }
}

fn lock(table: &Mutex<ValueTable>) -> MutexGuard<'_, ValueTable> {
    table.lock().unwrap_or_else(PoisonError::into_inner)
}
