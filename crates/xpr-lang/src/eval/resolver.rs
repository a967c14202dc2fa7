use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use rustc_hash::FxHashMap;
use smol_str::SmolStr;
use tracing::trace;

use super::builtin;
use super::compiled::{Binding, Implementation};
use super::{Evaluator, Options, SymbolFn};
use crate::error::Error;
use crate::symbol::Symbol;

/// Binds the symbols of an expression to the constants, arrays, symbols and
/// evaluator supplied by the caller, falling back to the standard library.
pub(crate) struct Resolver<'a> {
    pub options: Options,
    pub constants: &'a FxHashMap<SmolStr, f64>,
    pub arrays: &'a FxHashMap<SmolStr, Arc<[f64]>>,
    pub symbols: &'a FxHashMap<Symbol, SymbolFn>,
    pub evaluator: Option<&'a Evaluator>,
}

impl Resolver<'_> {
    pub(crate) fn resolve(&self, symbol: &Symbol) -> Binding {
        let optimize = !self.options.contains(Options::NO_OPTIMIZE);

        match symbol {
            Symbol::Variable(name) => {
                if let Some(value) = self.constants.get(name) {
                    trace!(%symbol, "Resolved to constant");
                    return Binding::new(Implementation::Constant(*value), optimize);
                }
            }
            Symbol::Array(name) => {
                if let Some(values) = self.arrays.get(name) {
                    trace!(%symbol, "Resolved to array");
                    return Binding::new(Implementation::Array(Arc::clone(values)), optimize);
                }
            }
            _ => {}
        }

        if let Some(f) = self.symbols.get(symbol) {
            // Variables may refer to state that changes between evaluations.
            let pure = optimize
                && self.options.contains(Options::PURE_SYMBOLS)
                && !matches!(symbol, Symbol::Variable(_));
            trace!(%symbol, pure, "Resolved to caller symbol");
            return Binding::new(Implementation::Custom(Arc::clone(f)), pure);
        }

        let fallback = builtin::lookup(symbol, self.options);

        if let Some(evaluator) = self.evaluator {
            trace!(%symbol, fallback = fallback.is_some(), "Resolved to evaluator");
            return Binding::new(
                Implementation::Callback {
                    evaluator: Arc::clone(evaluator),
                    fallback,
                    missing: self.missing(symbol),
                    settle: optimize,
                    settled: AtomicBool::new(false),
                },
                false,
            );
        }

        match fallback {
            Some(f) => {
                trace!(%symbol, "Resolved to builtin");
                Binding::new(Implementation::Builtin(f), optimize)
            }
            None => {
                trace!(%symbol, "Undefined symbol");
                Binding::new(Implementation::Undefined(self.missing(symbol)), false)
            }
        }
    }

    fn missing(&self, symbol: &Symbol) -> Error {
        let name = symbol.name();
        let arities = function_arities(name, self.symbols.keys())
            .chain(builtin::function_arities(name, self.options));
        undefined(symbol, arities)
    }
}

/// The arities of the functions called `name` among `symbols`.
pub(crate) fn function_arities<'a>(
    name: &'a str,
    symbols: impl Iterator<Item = &'a Symbol> + 'a,
) -> impl Iterator<Item = usize> + 'a {
    symbols.filter_map(move |symbol| match symbol {
        Symbol::Function(function, arity) if function == name => Some(*arity),
        _ => None,
    })
}

/// The error for a symbol nothing is bound to. A function called with the wrong
/// number of arguments reports the closest arity it is defined for.
pub(crate) fn undefined(symbol: &Symbol, arities: impl IntoIterator<Item = usize>) -> Error {
    match symbol {
        Symbol::Function(name, arity) => arities
            .into_iter()
            .min_by_key(|known| (known.abs_diff(*arity), *known))
            .map(|known| Error::ArityMismatch(Symbol::Function(name.clone(), known)))
            .unwrap_or_else(|| Error::UndefinedSymbol(symbol.clone())),
        _ => Error::UndefinedSymbol(symbol.clone()),
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::undefined(Symbol::function("foo", 1), vec![], Error::UndefinedSymbol(Symbol::function("foo", 1)))]
    #[case::single(Symbol::function("pow", 3), vec![2], Error::ArityMismatch(Symbol::function("pow", 2)))]
    #[case::closest(Symbol::function("bar", 5), vec![1, 2, 7], Error::ArityMismatch(Symbol::function("bar", 7)))]
    #[case::tie_prefers_fewer(Symbol::function("bar", 2), vec![3, 1], Error::ArityMismatch(Symbol::function("bar", 1)))]
    #[case::variable(Symbol::variable("x"), vec![1], Error::UndefinedSymbol(Symbol::variable("x")))]
    fn test_undefined(#[case] symbol: Symbol, #[case] arities: Vec<usize>, #[case] expected: Error) {
        assert_eq!(undefined(&symbol, arities), expected);
    }

    #[test]
    fn test_function_arities() {
        let symbols = [
            Symbol::function("bar", 1),
            Symbol::function("bar", 2),
            Symbol::function("baz", 3),
            Symbol::variable("bar"),
        ];
        let mut arities: Vec<_> = function_arities("bar", symbols.iter()).collect();
        arities.sort();
        assert_eq!(arities, vec![1, 2]);
    }

    #[test]
    fn test_resolution_order() {
        let constants: FxHashMap<SmolStr, f64> = [("pi".into(), 3.0)].into_iter().collect();
        let arrays = FxHashMap::default();
        let symbols: FxHashMap<Symbol, SymbolFn> = [(
            Symbol::infix("+"),
            Arc::new(|args: &[f64]| Ok(args[0] * args[1])) as SymbolFn,
        )]
        .into_iter()
        .collect();
        let resolver = Resolver {
            options: Options::empty(),
            constants: &constants,
            arrays: &arrays,
            symbols: &symbols,
            evaluator: None,
        };

        let pi = resolver.resolve(&Symbol::variable("pi"));
        assert_eq!(pi.call(&Symbol::variable("pi"), &[]), Ok(3.0));
        assert!(pi.is_pure());

        let plus = resolver.resolve(&Symbol::infix("+"));
        assert_eq!(plus.call(&Symbol::infix("+"), &[2.0, 3.0]), Ok(6.0));
        assert!(!plus.is_pure());

        let minus = resolver.resolve(&Symbol::infix("-"));
        assert_eq!(minus.call(&Symbol::infix("-"), &[2.0, 3.0]), Ok(-1.0));
        assert!(minus.is_pure());

        let sqrt = resolver.resolve(&Symbol::function("sqrt", 2));
        assert_eq!(
            sqrt.call(&Symbol::function("sqrt", 2), &[1.0, 2.0]),
            Err(Error::ArityMismatch(Symbol::function("sqrt", 1)))
        );
    }

    #[rstest]
    #[case::default(Options::empty(), false)]
    #[case::pure_symbols(Options::PURE_SYMBOLS, true)]
    #[case::no_optimize(Options::PURE_SYMBOLS | Options::NO_OPTIMIZE, false)]
    fn test_caller_function_purity(#[case] options: Options, #[case] expected: bool) {
        let constants = FxHashMap::default();
        let arrays = FxHashMap::default();
        let symbols: FxHashMap<Symbol, SymbolFn> = [
            (Symbol::function("f", 0), Arc::new(|_: &[f64]| Ok(1.0)) as SymbolFn),
            (Symbol::variable("v"), Arc::new(|_: &[f64]| Ok(1.0)) as SymbolFn),
        ]
        .into_iter()
        .collect();
        let resolver = Resolver {
            options,
            constants: &constants,
            arrays: &arrays,
            symbols: &symbols,
            evaluator: None,
        };

        assert_eq!(resolver.resolve(&Symbol::function("f", 0)).is_pure(), expected);
        assert!(!resolver.resolve(&Symbol::variable("v")).is_pure());
    }
}
