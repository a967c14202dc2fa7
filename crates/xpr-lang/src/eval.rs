use std::fmt::{self, Debug, Display, Formatter};
use std::sync::Arc;

use bitflags::bitflags;
use rustc_hash::{FxHashMap, FxHashSet};
use smol_str::SmolStr;
use tracing::debug;

use crate::ast::{Node, ParsedExpression};
use crate::cache::ParseCache;
use crate::error::Error;
use crate::symbol::Symbol;

pub mod builtin;
pub(crate) mod compiled;
pub(crate) mod resolver;

use compiled::{Binding, Compiled};
use resolver::Resolver;

bitflags! {
    /// Flags controlling how an expression is bound and evaluated.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Options: u8 {
        /// Never fold constant subexpressions, and treat every symbol as impure.
        const NO_OPTIMIZE = 1;
        /// Enables `true`, `false` and the comparison and logical operators.
        const BOOL_SYMBOLS = 1 << 1;
        /// Caller supplied functions and operators depend on their arguments only.
        const PURE_SYMBOLS = 1 << 2;
    }
}

/// Implementation of a caller supplied symbol.
pub type SymbolFn = Arc<dyn Fn(&[f64]) -> Result<f64, Error> + Send + Sync>;

/// Fallback for symbols without a constant or implementation. Returning
/// `Ok(None)` defers to the standard library.
pub type Evaluator = Arc<dyn Fn(&Symbol, &[f64]) -> Result<Option<f64>, Error> + Send + Sync>;

/// A parsed expression with every symbol bound, ready to be evaluated repeatedly.
///
/// ```
/// use xpr_lang::Expression;
///
/// let expression = Expression::builder("width / 2 + left")
///     .constant("width", 100.0)
///     .constant("left", 5.0)
///     .build();
///
/// assert_eq!(expression.evaluate(), Ok(55.0));
/// assert_eq!(expression.to_string(), "55");
/// ```
#[derive(Clone)]
pub struct Expression {
    root: Compiled,
    symbols: FxHashSet<Symbol>,
}

impl Expression {
    /// Binds `source` to the standard library only.
    pub fn new(source: &str) -> Self {
        Self::builder(source).build()
    }

    /// Starts binding `source`, parsed through the process-wide cache.
    pub fn builder(source: &str) -> ExpressionBuilder {
        Self::builder_with_cache(source, ParseCache::global())
    }

    pub fn builder_with_cache(source: &str, cache: &ParseCache) -> ExpressionBuilder {
        ExpressionBuilder::from(cache.parse(source))
    }

    pub fn evaluate(&self) -> Result<f64, Error> {
        self.root.evaluate()
    }

    /// The symbols left after constant folding.
    pub fn symbols(&self) -> &FxHashSet<Symbol> {
        &self.symbols
    }

    pub(crate) fn to_node(&self) -> Node {
        self.root.to_node()
    }

    pub(crate) fn compile(
        parsed: &ParsedExpression,
        options: Options,
        mut resolve: impl FnMut(&Symbol) -> Binding,
    ) -> Self {
        let bindings = parsed
            .symbols()
            .iter()
            .map(|symbol| (symbol.clone(), Arc::new(resolve(symbol))))
            .collect::<FxHashMap<_, _>>();

        let mut root = Compiled::new(parsed.root(), &bindings);
        if !options.contains(Options::NO_OPTIMIZE) {
            let mut folded = 0;
            root = root.fold(&mut folded);
            debug!(folded, expression = %parsed, "Folded constant subexpressions");
        }

        let symbols = root.symbols();
        Self { root, symbols }
    }
}

impl Display for Expression {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_node())
    }
}

impl Debug for Expression {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Expression")
            .field("description", &self.to_string())
            .field("symbols", &self.symbols)
            .finish()
    }
}

/// Collects the constants, arrays, symbols and evaluator an [`Expression`] is
/// bound to.
pub struct ExpressionBuilder {
    parsed: ParsedExpression,
    options: Options,
    constants: FxHashMap<SmolStr, f64>,
    arrays: FxHashMap<SmolStr, Arc<[f64]>>,
    symbols: FxHashMap<Symbol, SymbolFn>,
    evaluator: Option<Evaluator>,
}

impl From<ParsedExpression> for ExpressionBuilder {
    fn from(parsed: ParsedExpression) -> Self {
        Self {
            parsed,
            options: Options::default(),
            constants: FxHashMap::default(),
            arrays: FxHashMap::default(),
            symbols: FxHashMap::default(),
            evaluator: None,
        }
    }
}

impl ExpressionBuilder {
    pub fn options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    pub fn constant(mut self, name: impl Into<SmolStr>, value: f64) -> Self {
        self.constants.insert(name.into(), value);
        self
    }

    pub fn constants<K: Into<SmolStr>>(mut self, constants: impl IntoIterator<Item = (K, f64)>) -> Self {
        self.constants
            .extend(constants.into_iter().map(|(name, value)| (name.into(), value)));
        self
    }

    /// Values for `name[index]`.
    pub fn array(mut self, name: impl Into<SmolStr>, values: impl IntoIterator<Item = f64>) -> Self {
        self.arrays.insert(name.into(), values.into_iter().collect());
        self
    }

    pub fn symbol<F>(mut self, symbol: Symbol, f: F) -> Self
    where
        F: Fn(&[f64]) -> Result<f64, Error> + Send + Sync + 'static,
    {
        self.symbols.insert(symbol, Arc::new(f));
        self
    }

    pub fn evaluator<F>(mut self, f: F) -> Self
    where
        F: Fn(&Symbol, &[f64]) -> Result<Option<f64>, Error> + Send + Sync + 'static,
    {
        self.evaluator = Some(Arc::new(f));
        self
    }

    pub fn build(self) -> Expression {
        let resolver = Resolver {
            options: self.options,
            constants: &self.constants,
            arrays: &self.arrays,
            symbols: &self.symbols,
            evaluator: self.evaluator.as_ref(),
        };
        Expression::compile(&self.parsed, self.options, |symbol| resolver.resolve(symbol))
    }
}
