use std::cmp::Ordering;
use std::sync::LazyLock;

use rustc_hash::FxHashMap;

use super::table::proxy_eq;
use super::value::Value;
use crate::error::Error;
use crate::eval::Options;
use crate::symbol::Symbol;

/// A standard library symbol on unboxed values. Receives both the proxies and
/// the values they stand for; `Ok(None)` declines the call, leaving it to the
/// numeric library.
pub(crate) type AnyBuiltinFn = fn(&Symbol, &[f64], &[Value]) -> Result<Option<Value>, Error>;

pub(crate) fn mismatch(symbol: &Symbol, values: &[Value]) -> Error {
    Error::TypeMismatch(
        symbol.clone(),
        values.iter().map(|value| value.type_name().to_string()).collect(),
    )
}

fn truthiness(symbol: &Symbol, value: &Value, values: &[Value]) -> Result<bool, Error> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::Number(n) => Ok(*n != 0.0),
        Value::Null => Ok(false),
        _ => Err(mismatch(symbol, values)),
    }
}

fn compare(symbol: &Symbol, values: &[Value], accept: fn(Ordering) -> bool) -> Result<Option<Value>, Error> {
    let ordering = match values {
        [Value::Number(a), Value::Number(b)] => a.partial_cmp(b),
        [Value::String(a), Value::String(b)] => Some(a.cmp(b)),
        _ => return Err(mismatch(symbol, values)),
    };
    Ok(Some(Value::Bool(ordering.is_some_and(accept))))
}

/// Always available.
static ANY_SYMBOLS: LazyLock<FxHashMap<Symbol, AnyBuiltinFn>> = LazyLock::new(|| {
    let mut map: FxHashMap<Symbol, AnyBuiltinFn> = FxHashMap::default();

    map.insert(Symbol::variable("nil"), |_, _, _| Ok(Some(Value::Null)));

    // Concatenates when either side is a string, otherwise adds.
    map.insert(Symbol::infix("+"), |_, _, values| match values {
        [lhs @ Value::String(_), rhs] | [lhs, rhs @ Value::String(_)] => {
            Ok(Some(Value::String(format!("{}{}", lhs, rhs).into())))
        }
        _ => Ok(None),
    });

    map.insert(Symbol::infix("=="), |_, proxies, _| match proxies {
        [lhs, rhs] => Ok(Some(Value::Bool(proxy_eq(*lhs, *rhs)))),
        _ => Ok(None),
    });
    map.insert(Symbol::infix("!="), |_, proxies, _| match proxies {
        [lhs, rhs] => Ok(Some(Value::Bool(!proxy_eq(*lhs, *rhs)))),
        _ => Ok(None),
    });

    map.insert(Symbol::infix("??"), |_, _, values| match values {
        [Value::Null, rhs] => Ok(Some(rhs.clone())),
        [lhs, _] => Ok(Some(lhs.clone())),
        _ => Ok(None),
    });

    map
});

/// Enabled by [`Options::BOOL_SYMBOLS`].
static ANY_BOOL_SYMBOLS: LazyLock<FxHashMap<Symbol, AnyBuiltinFn>> = LazyLock::new(|| {
    let mut map: FxHashMap<Symbol, AnyBuiltinFn> = FxHashMap::default();

    map.insert(Symbol::variable("true"), |_, _, _| Ok(Some(Value::Bool(true))));
    map.insert(Symbol::variable("false"), |_, _, _| Ok(Some(Value::Bool(false))));

    map.insert(Symbol::infix("&&"), |symbol, _, values| match values {
        [lhs, rhs] => {
            let lhs = truthiness(symbol, lhs, values)?;
            let rhs = truthiness(symbol, rhs, values)?;
            Ok(Some(Value::Bool(lhs && rhs)))
        }
        _ => Ok(None),
    });
    map.insert(Symbol::infix("||"), |symbol, _, values| match values {
        [lhs, rhs] => {
            let lhs = truthiness(symbol, lhs, values)?;
            let rhs = truthiness(symbol, rhs, values)?;
            Ok(Some(Value::Bool(lhs || rhs)))
        }
        _ => Ok(None),
    });
    map.insert(Symbol::prefix("!"), |symbol, _, values| match values {
        [operand] => Ok(Some(Value::Bool(!truthiness(symbol, operand, values)?))),
        _ => Ok(None),
    });

    map.insert(Symbol::infix("<"), |symbol, _, values| compare(symbol, values, Ordering::is_lt));
    map.insert(Symbol::infix("<="), |symbol, _, values| compare(symbol, values, Ordering::is_le));
    map.insert(Symbol::infix(">"), |symbol, _, values| compare(symbol, values, Ordering::is_gt));
    map.insert(Symbol::infix(">="), |symbol, _, values| compare(symbol, values, Ordering::is_ge));

    // Both branches have already been evaluated.
    map.insert(Symbol::infix("?:"), |symbol, _, values| match values {
        [condition, then, otherwise] => Ok(Some(if truthiness(symbol, condition, values)? {
            then.clone()
        } else {
            otherwise.clone()
        })),
        [lhs, rhs] => Ok(Some(if truthiness(symbol, lhs, values)? {
            lhs.clone()
        } else {
            rhs.clone()
        })),
        _ => Ok(None),
    });

    map
});

pub(crate) fn lookup(symbol: &Symbol, options: Options) -> Option<AnyBuiltinFn> {
    ANY_SYMBOLS.get(symbol).copied().or_else(|| {
        options
            .contains(Options::BOOL_SYMBOLS)
            .then(|| ANY_BOOL_SYMBOLS.get(symbol).copied())
            .flatten()
    })
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::any::table::ValueTable;

    fn call(symbol: Symbol, values: Vec<Value>) -> Result<Option<Value>, Error> {
        let mut table = ValueTable::new();
        let proxies = values
            .iter()
            .map(|value| table.box_value(value.clone()))
            .collect::<Vec<_>>();
        let f = lookup(&symbol, Options::BOOL_SYMBOLS).expect("builtin is defined");
        f(&symbol, &proxies, &values)
    }

    #[rstest]
    #[case::concat(Symbol::infix("+"), vec![Value::from("a"), Value::Number(1.0)], Some(Value::from("a1")))]
    #[case::concat_left(Symbol::infix("+"), vec![Value::Number(1.5), Value::from("b")], Some(Value::from("1.5b")))]
    #[case::concat_nil(Symbol::infix("+"), vec![Value::from("a"), Value::Null], Some(Value::from("anil")))]
    #[case::add_declines(Symbol::infix("+"), vec![Value::Number(1.0), Value::Number(2.0)], None)]
    #[case::equal_strings(Symbol::infix("=="), vec![Value::from("a"), Value::from("a")], Some(Value::Bool(true)))]
    #[case::different_strings(Symbol::infix("=="), vec![Value::from("a"), Value::from("b")], Some(Value::Bool(false)))]
    #[case::string_vs_number(Symbol::infix("!="), vec![Value::from("a"), Value::Number(1.0)], Some(Value::Bool(true)))]
    #[case::equal_numbers(Symbol::infix("=="), vec![Value::Number(0.0), Value::Number(-0.0)], Some(Value::Bool(true)))]
    #[case::coalesce_nil(Symbol::infix("??"), vec![Value::Null, Value::from("x")], Some(Value::from("x")))]
    #[case::coalesce_value(Symbol::infix("??"), vec![Value::Number(0.0), Value::from("x")], Some(Value::Number(0.0)))]
    #[case::and(Symbol::infix("&&"), vec![Value::Bool(true), Value::Number(0.0)], Some(Value::Bool(false)))]
    #[case::or(Symbol::infix("||"), vec![Value::Null, Value::Bool(true)], Some(Value::Bool(true)))]
    #[case::not(Symbol::prefix("!"), vec![Value::Bool(false)], Some(Value::Bool(true)))]
    #[case::less_strings(Symbol::infix("<"), vec![Value::from("a"), Value::from("b")], Some(Value::Bool(true)))]
    #[case::greater_numbers(Symbol::infix(">="), vec![Value::Number(1.0), Value::Number(2.0)], Some(Value::Bool(false)))]
    #[case::ternary(Symbol::infix("?:"), vec![Value::Bool(false), Value::from("a"), Value::from("b")], Some(Value::from("b")))]
    #[case::elvis(Symbol::infix("?:"), vec![Value::Null, Value::from("b")], Some(Value::from("b")))]
    #[case::true_(Symbol::variable("true"), vec![], Some(Value::Bool(true)))]
    fn test_builtin(#[case] symbol: Symbol, #[case] values: Vec<Value>, #[case] expected: Option<Value>) {
        assert_eq!(call(symbol, values), Ok(expected));
    }

    #[rstest]
    #[case::compare_mixed(Symbol::infix("<"), vec![Value::from("a"), Value::Number(1.0)])]
    #[case::and_string(Symbol::infix("&&"), vec![Value::from("a"), Value::Bool(true)])]
    fn test_type_mismatch(#[case] symbol: Symbol, #[case] values: Vec<Value>) {
        assert_eq!(call(symbol.clone(), values.clone()), Err(mismatch(&symbol, &values)));
    }

    #[test]
    fn test_bool_symbols_are_opt_in() {
        assert!(lookup(&Symbol::variable("nil"), Options::empty()).is_some());
        assert!(lookup(&Symbol::variable("true"), Options::empty()).is_none());
        assert!(lookup(&Symbol::infix("&&"), Options::empty()).is_none());
    }
}
