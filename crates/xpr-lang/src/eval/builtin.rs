use std::f64::consts::PI;
use std::sync::LazyLock;

use rustc_hash::FxHashMap;

use super::Options;
use crate::number::{from_bool, truthy};
use crate::symbol::Symbol;

/// A standard library symbol. Arguments always match the arity of the symbol it
/// is registered for.
pub type BuiltinFn = fn(&[f64]) -> f64;

#[inline(always)]
fn arg(args: &[f64], index: usize) -> f64 {
    args.get(index).copied().unwrap_or(f64::NAN)
}

fn unary(map: &mut FxHashMap<Symbol, BuiltinFn>, name: &str, f: BuiltinFn) {
    map.insert(Symbol::function(name, 1), f);
}

fn binary(map: &mut FxHashMap<Symbol, BuiltinFn>, name: &str, f: BuiltinFn) {
    map.insert(Symbol::function(name, 2), f);
}

fn infix(map: &mut FxHashMap<Symbol, BuiltinFn>, op: &str, f: BuiltinFn) {
    map.insert(Symbol::infix(op), f);
}

/// Arithmetic and math functions, always available unless shadowed.
pub static MATH_SYMBOLS: LazyLock<FxHashMap<Symbol, BuiltinFn>> = LazyLock::new(|| {
    let mut map: FxHashMap<Symbol, BuiltinFn> = FxHashMap::default();

    map.insert(Symbol::variable("pi"), |_| PI);

    infix(&mut map, "+", |a| arg(a, 0) + arg(a, 1));
    infix(&mut map, "-", |a| arg(a, 0) - arg(a, 1));
    infix(&mut map, "*", |a| arg(a, 0) * arg(a, 1));
    infix(&mut map, "/", |a| arg(a, 0) / arg(a, 1));
    infix(&mut map, "%", |a| arg(a, 0) % arg(a, 1));
    // `a+-b` scans as a single operator.
    infix(&mut map, "+-", |a| arg(a, 0) + -arg(a, 1));
    infix(&mut map, "*-", |a| arg(a, 0) * -arg(a, 1));
    infix(&mut map, "/-", |a| arg(a, 0) / -arg(a, 1));
    map.insert(Symbol::prefix("-"), |a| -arg(a, 0));

    unary(&mut map, "sqrt", |a| arg(a, 0).sqrt());
    unary(&mut map, "floor", |a| arg(a, 0).floor());
    unary(&mut map, "ceil", |a| arg(a, 0).ceil());
    unary(&mut map, "round", |a| arg(a, 0).round());
    unary(&mut map, "cos", |a| arg(a, 0).cos());
    unary(&mut map, "acos", |a| arg(a, 0).acos());
    unary(&mut map, "sin", |a| arg(a, 0).sin());
    unary(&mut map, "asin", |a| arg(a, 0).asin());
    unary(&mut map, "tan", |a| arg(a, 0).tan());
    unary(&mut map, "atan", |a| arg(a, 0).atan());
    unary(&mut map, "abs", |a| arg(a, 0).abs());

    binary(&mut map, "pow", |a| arg(a, 0).powf(arg(a, 1)));
    binary(&mut map, "max", |a| arg(a, 0).max(arg(a, 1)));
    binary(&mut map, "min", |a| arg(a, 0).min(arg(a, 1)));
    binary(&mut map, "atan2", |a| arg(a, 0).atan2(arg(a, 1)));
    binary(&mut map, "mod", |a| arg(a, 0) % arg(a, 1));

    map
});

/// Boolean constants and operators, enabled by [`Options::BOOL_SYMBOLS`].
/// `true` is `1` and `false` is `0`.
pub static BOOL_SYMBOLS: LazyLock<FxHashMap<Symbol, BuiltinFn>> = LazyLock::new(|| {
    let mut map: FxHashMap<Symbol, BuiltinFn> = FxHashMap::default();

    map.insert(Symbol::variable("true"), |_| 1.0);
    map.insert(Symbol::variable("false"), |_| 0.0);

    infix(&mut map, "==", |a| from_bool(arg(a, 0) == arg(a, 1)));
    infix(&mut map, "!=", |a| from_bool(arg(a, 0) != arg(a, 1)));
    infix(&mut map, ">", |a| from_bool(arg(a, 0) > arg(a, 1)));
    infix(&mut map, ">=", |a| from_bool(arg(a, 0) >= arg(a, 1)));
    infix(&mut map, "<", |a| from_bool(arg(a, 0) < arg(a, 1)));
    infix(&mut map, "<=", |a| from_bool(arg(a, 0) <= arg(a, 1)));
    infix(&mut map, "&&", |a| from_bool(truthy(arg(a, 0)) && truthy(arg(a, 1))));
    infix(&mut map, "||", |a| from_bool(truthy(arg(a, 0)) || truthy(arg(a, 1))));
    map.insert(Symbol::prefix("!"), |a| from_bool(!truthy(arg(a, 0))));
    // Both branches have already been evaluated by the time the condition is checked.
    infix(&mut map, "?:", |a| match a {
        [condition, then, otherwise] => if truthy(*condition) { *then } else { *otherwise },
        [lhs, rhs] => if truthy(*lhs) { *lhs } else { *rhs },
        _ => f64::NAN,
    });

    map
});

/// Looks up a standard library symbol enabled by `options`.
pub fn lookup(symbol: &Symbol, options: Options) -> Option<BuiltinFn> {
    MATH_SYMBOLS.get(symbol).copied().or_else(|| {
        options
            .contains(Options::BOOL_SYMBOLS)
            .then(|| BOOL_SYMBOLS.get(symbol).copied())
            .flatten()
    })
}

/// The arities of every standard library function called `name`.
pub fn function_arities(name: &str, options: Options) -> impl Iterator<Item = usize> + '_ {
    let bool_symbols = options
        .contains(Options::BOOL_SYMBOLS)
        .then(|| BOOL_SYMBOLS.keys())
        .into_iter()
        .flatten();

    MATH_SYMBOLS
        .keys()
        .chain(bool_symbols)
        .filter_map(move |symbol| match symbol {
            Symbol::Function(function, arity) if function == name => Some(*arity),
            _ => None,
        })
}
