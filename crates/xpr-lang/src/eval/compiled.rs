use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;
use smol_str::SmolStr;

use super::builtin::BuiltinFn;
use super::{Evaluator, SymbolFn};
use crate::ast::Node;
use crate::error::Error;
use crate::number::is_int;
use crate::symbol::Symbol;

/// Arguments of a single call. Most symbols take at most two.
pub(crate) type Args = SmallVec<[f64; 4]>;

pub(crate) enum Implementation {
    Constant(f64),
    Array(Arc<[f64]>),
    Builtin(BuiltinFn),
    Custom(SymbolFn),
    /// Asks the evaluator callback first. Once the callback has declined and the
    /// fallback answered, `settled` is set (when optimizing) and the callback is
    /// skipped from then on.
    Callback {
        evaluator: Evaluator,
        fallback: Option<BuiltinFn>,
        missing: Error,
        settle: bool,
        settled: AtomicBool,
    },
    Undefined(Error),
}

/// How one symbol of an expression is evaluated.
pub(crate) struct Binding {
    implementation: Implementation,
    /// Pure symbols depend on their arguments only, and may be folded.
    pure: bool,
}

impl Binding {
    pub(crate) fn new(implementation: Implementation, pure: bool) -> Self {
        let pure = pure && !matches!(implementation, Implementation::Undefined(_));
        Self {
            implementation,
            pure,
        }
    }

    pub(crate) fn is_pure(&self) -> bool {
        self.pure
    }

    pub(crate) fn call(&self, symbol: &Symbol, args: &[f64]) -> Result<f64, Error> {
        match &self.implementation {
            Implementation::Constant(value) => Ok(*value),
            Implementation::Array(values) => index(symbol, values, args),
            Implementation::Builtin(f) => Ok(f(args)),
            Implementation::Custom(f) => f(args),
            Implementation::Callback {
                evaluator,
                fallback,
                missing,
                settle,
                settled,
            } => {
                if let Some(fallback) = fallback {
                    if settled.load(Ordering::Relaxed) {
                        return Ok(fallback(args));
                    }
                }

                match evaluator(symbol, args)? {
                    Some(value) => Ok(value),
                    None => match fallback {
                        Some(fallback) => {
                            if *settle {
                                settled.store(true, Ordering::Relaxed);
                            }
                            Ok(fallback(args))
                        }
                        None => Err(missing.clone()),
                    },
                }
            }
            Implementation::Undefined(error) => Err(error.clone()),
        }
    }
}

fn index(symbol: &Symbol, values: &[f64], args: &[f64]) -> Result<f64, Error> {
    let index = args.first().copied().unwrap_or(f64::NAN);
    if is_int(index) && index >= 0.0 {
        if let Some(value) = values.get(index as usize) {
            return Ok(*value);
        }
    }
    Err(Error::ArrayBounds(index, symbol.clone()))
}

/// An expression tree with every symbol bound to its implementation.
#[derive(Clone)]
pub(crate) enum Compiled {
    Literal(f64),
    Call {
        symbol: Symbol,
        binding: Arc<Binding>,
        args: Vec<Compiled>,
    },
    Error(Error, SmolStr),
}

impl Compiled {
    pub(crate) fn new(node: &Node, bindings: &FxHashMap<Symbol, Arc<Binding>>) -> Self {
        match node {
            Node::Literal(value) => Compiled::Literal(*value),
            Node::Error(error, source) => Compiled::Error(error.clone(), source.clone()),
            Node::Symbol(symbol, args) => {
                let binding = match bindings.get(symbol) {
                    Some(binding) => Arc::clone(binding),
                    None => Arc::new(Binding::new(
                        Implementation::Undefined(Error::UndefinedSymbol(symbol.clone())),
                        false,
                    )),
                };
                Compiled::Call {
                    symbol: symbol.clone(),
                    binding,
                    args: args.iter().map(|arg| Compiled::new(arg, bindings)).collect(),
                }
            }
        }
    }

    pub(crate) fn evaluate(&self) -> Result<f64, Error> {
        match self {
            Compiled::Literal(value) => Ok(*value),
            Compiled::Call {
                symbol,
                binding,
                args,
            } => {
                let args = args
                    .iter()
                    .map(Compiled::evaluate)
                    .collect::<Result<Args, _>>()?;
                binding.call(symbol, &args)
            }
            Compiled::Error(error, _) => Err(error.clone()),
        }
    }

    /// Replaces pure calls whose arguments are all literals by their result.
    /// Calls that fail are kept, so the error is raised on evaluation.
    pub(crate) fn fold(self, folded: &mut usize) -> Self {
        match self {
            Compiled::Call {
                symbol,
                binding,
                args,
            } => {
                let args: Vec<_> = args.into_iter().map(|arg| arg.fold(folded)).collect();
                if binding.is_pure() {
                    let values = args
                        .iter()
                        .map(|arg| match arg {
                            Compiled::Literal(value) => Some(*value),
                            _ => None,
                        })
                        .collect::<Option<Args>>();

                    if let Some(Ok(value)) = values.map(|values| binding.call(&symbol, &values)) {
                        *folded += 1;
                        return Compiled::Literal(value);
                    }
                }

                Compiled::Call {
                    symbol,
                    binding,
                    args,
                }
            }
            compiled => compiled,
        }
    }

    pub(crate) fn symbols(&self) -> FxHashSet<Symbol> {
        let mut symbols = FxHashSet::default();
        self.collect_symbols(&mut symbols);
        symbols
    }

    fn collect_symbols(&self, symbols: &mut FxHashSet<Symbol>) {
        if let Compiled::Call { symbol, args, .. } = self {
            symbols.insert(symbol.clone());
            args.iter().for_each(|arg| arg.collect_symbols(symbols));
        }
    }

    /// Converts back to a plain tree, for printing.
    pub(crate) fn to_node(&self) -> Node {
        match self {
            Compiled::Literal(value) => Node::Literal(*value),
            Compiled::Call { symbol, args, .. } => {
                Node::Symbol(symbol.clone(), args.iter().map(Compiled::to_node).collect())
            }
            Compiled::Error(error, source) => Node::Error(error.clone(), source.clone()),
        }
    }
}
