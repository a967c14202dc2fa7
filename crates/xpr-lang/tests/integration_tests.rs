use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use rstest::{fixture, rstest};
use xpr_lang::{Error, Expression, Options, ParseCache, ParsedExpression, Symbol};

#[fixture]
fn cache() -> ParseCache {
    ParseCache::new()
}

fn evaluate(source: &str, options: Options) -> Result<f64, Error> {
    Expression::builder(source).options(options).build().evaluate()
}

#[rstest]
#[case::multiplication_first("1 + 2 * 3", 7.0)]
#[case::parentheses("(1 + 2) * 3", 9.0)]
#[case::division_first("8 - 6 / 2", 5.0)]
#[case::left_to_right("8 / 4 / 2", 1.0)]
#[case::subtraction_left_to_right("1 - 2 - 3", -4.0)]
#[case::prefix_binds_tightest("-2 * -3", 6.0)]
#[case::nested_calls("max(min(4, 9), sqrt(pow(3, 2)))", 4.0)]
#[case::round("round(2.5) + floor(-0.5)", 2.0)]
#[case::pi("round(pi * 100)", 314.0)]
#[case::whitespace_insensitive("1+2*3", 7.0)]
fn test_arithmetic(#[case] source: &str, #[case] expected: f64) {
    assert_eq!(evaluate(source, Options::empty()), Ok(expected));
    assert_eq!(evaluate(source, Options::NO_OPTIMIZE), Ok(expected));
}

#[rstest]
#[case::comparison_under_arithmetic("1 + 1 == 2", 1.0)]
#[case::and_over_or("1 || 0 && 0", 1.0)]
#[case::ternary_under_logic("0 || 0 ? 5 : 6", 6.0)]
#[case::nested_else("0 ? 1 : 0 ? 2 : 3", 3.0)]
#[case::nested_then("1 ? 0 ? 2 : 3 : 4", 3.0)]
#[case::not("!(2 > 1)", 0.0)]
#[case::negative_else("0?1:-3", -3.0)]
fn test_bool_symbols(#[case] source: &str, #[case] expected: f64) {
    assert_eq!(evaluate(source, Options::BOOL_SYMBOLS), Ok(expected));
}

#[test]
fn test_ternary_evaluates_both_branches() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let expression = Expression::builder("1 ? 2 : effect()")
        .options(Options::BOOL_SYMBOLS)
        .symbol(Symbol::function("effect", 0), move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(3.0)
        })
        .build();

    assert_eq!(expression.evaluate(), Ok(2.0));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_arity_overloads() {
    let expression = |source: &str| {
        Expression::builder(source)
            .symbol(Symbol::function("bar", 1), |args| Ok(args[0]))
            .symbol(Symbol::function("bar", 2), |args| Ok(args[0] + args[1]))
            .build()
    };

    assert_eq!(expression("bar(1)").evaluate(), Ok(1.0));
    assert_eq!(expression("bar(1, 2)").evaluate(), Ok(3.0));
    assert_eq!(
        expression("bar(1, 2, 3)").evaluate(),
        Err(Error::ArityMismatch(Symbol::function("bar", 2)))
    );
}

#[test]
fn test_folding() {
    let expression = Expression::new("2+3*4");
    assert_eq!(expression.evaluate(), Ok(14.0));
    assert_eq!(expression.evaluate(), Ok(14.0));
    assert_eq!(expression.to_string(), "14");
    assert!(expression.symbols().is_empty());
}

#[rstest]
#[case::infinity("1/0", "(1 / 0)")]
#[case::negative_infinity("-1/0 + 1", "(-1 / 0)")]
#[case::nan("0/0", "(0 / 0)")]
fn test_folded_non_finite_results_reparse(#[case] source: &str, #[case] expected: &str) {
    let folded = Expression::new(source);
    assert_eq!(folded.to_string(), expected);

    let reparsed = Expression::new(&folded.to_string());
    assert!(ParsedExpression::parse(expected).error().is_none());
    match (folded.evaluate(), reparsed.evaluate()) {
        (Ok(lhs), Ok(rhs)) => assert!(lhs == rhs || (lhs.is_nan() && rhs.is_nan()), "{} != {}", lhs, rhs),
        results => panic!("unexpected results {:?}", results),
    }
}

#[test]
fn test_folded_subtrees_never_call_symbols() {
    let folded = Arc::new(AtomicUsize::new(0));
    let unfolded = Arc::new(AtomicUsize::new(0));
    let (f, u) = (Arc::clone(&folded), Arc::clone(&unfolded));
    let expression = Expression::builder("scale(2) * offset")
        .options(Options::PURE_SYMBOLS)
        .symbol(Symbol::function("scale", 1), move |args| {
            f.fetch_add(1, Ordering::SeqCst);
            Ok(args[0] * 10.0)
        })
        .symbol(Symbol::variable("offset"), move |_| {
            u.fetch_add(1, Ordering::SeqCst);
            Ok(1.5)
        })
        .build();

    assert_eq!(expression.to_string(), "20 * offset");
    for _ in 0..3 {
        assert_eq!(expression.evaluate(), Ok(30.0));
    }
    assert_eq!(folded.load(Ordering::SeqCst), 1);
    assert_eq!(unfolded.load(Ordering::SeqCst), 3);
}

#[test]
fn test_evaluator_fallback() {
    let asked = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&asked);
    let expression = Expression::builder("sqrt(x) + y")
        .evaluator(move |symbol, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(match symbol {
                Symbol::Variable(name) if name == "x" => Some(16.0),
                Symbol::Variable(name) if name == "y" => Some(1.0),
                _ => None,
            })
        })
        .build();

    assert_eq!(expression.evaluate(), Ok(5.0));
    let first = asked.load(Ordering::SeqCst);
    assert_eq!(expression.evaluate(), Ok(5.0));
    // `sqrt` and `+` fell back to the library and are not asked again.
    assert_eq!(asked.load(Ordering::SeqCst) - first, 2);
}

#[test]
fn test_evaluator_fallback_without_optimizing() {
    let asked = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&asked);
    let expression = Expression::builder("-x")
        .options(Options::NO_OPTIMIZE)
        .evaluator(move |symbol, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok((symbol == &Symbol::variable("x")).then_some(2.0))
        })
        .build();

    assert_eq!(expression.evaluate(), Ok(-2.0));
    assert_eq!(expression.evaluate(), Ok(-2.0));
    assert_eq!(asked.load(Ordering::SeqCst), 4);
}

#[test]
fn test_symbol_errors_propagate() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let expression = Expression::builder("1 + fail()")
        .symbol(Symbol::function("fail", 0), move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(Error::message("Not available"))
        })
        .build();

    assert_eq!(expression.evaluate(), Err(Error::message("Not available")));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[rstest]
#[case::empty("", Error::UnexpectedToken("".into()), "Empty expression")]
#[case::missing_paren("(1+2", Error::MissingDelimiter(")".into()), "Missing `)`")]
#[case::stray_token("1 + }", Error::UnexpectedToken("}".into()), "Unexpected token `}`")]
fn test_parse_errors(#[case] source: &str, #[case] expected: Error, #[case] message: &str) {
    let parsed = ParsedExpression::parse(source);
    assert_eq!(parsed.error(), Some(&expected));
    assert_eq!(expected.to_string(), message);

    let expression = Expression::new(source);
    assert_eq!(expression.evaluate(), Err(expected));
}

#[rstest]
#[case::undefined_function(
    "foo(1)",
    Error::UndefinedSymbol(Symbol::function("foo", 1)),
    "Undefined function foo()"
)]
#[case::undefined_variable("x + 1", Error::UndefinedSymbol(Symbol::variable("x")), "Undefined variable x")]
#[case::arity("pow(1,2,3)", Error::ArityMismatch(Symbol::function("pow", 2)), "Function pow() expects 2 arguments")]
#[case::undefined_operator("1 <> 2", Error::UndefinedSymbol(Symbol::infix("<>")), "Undefined infix operator <>")]
fn test_evaluation_errors(#[case] source: &str, #[case] expected: Error, #[case] message: &str) {
    let result = Expression::new(source).evaluate();
    assert_eq!(result, Err(expected));
    assert_eq!(result.map_err(|e| e.to_string()), Err(message.to_string()));
}

#[test]
fn test_arrays() {
    let expression = Expression::builder("stops[i] * 2")
        .array("stops", [0.0, 0.25, 1.0])
        .constant("i", 1.0)
        .build();
    assert_eq!(expression.evaluate(), Ok(0.5));
    assert_eq!(expression.to_string(), "0.5");
}

#[rstest]
fn test_cache(cache: ParseCache) {
    let first = xpr_lang::parse_with_cache("x+1", &cache);
    let second = xpr_lang::parse_with_cache("x+1", &cache);
    assert_eq!(first.to_string(), second.to_string());
    assert_eq!(first.symbols(), second.symbols());
    assert_eq!(cache.len(), 1);

    cache.clear(None);
    assert!(cache.is_empty());

    let third = xpr_lang::parse_with_cache("x+1", &cache);
    assert_eq!(third.to_string(), "x + 1");
    assert_eq!(third.symbols(), first.symbols());
}

#[test]
fn test_global_cache() {
    let source = "global_cache_probe * 2";
    let parsed = xpr_lang::parse(source);
    assert!(ParseCache::global().contains(source));

    xpr_lang::clear_cache(Some(source));
    assert!(!ParseCache::global().contains(source));
    assert_eq!(xpr_lang::parse(source), parsed);
}

#[rstest]
fn test_builder_with_cache(cache: ParseCache) {
    let expression = Expression::builder_with_cache("a * 2", &cache)
        .constant("a", 4.0)
        .build();
    assert_eq!(expression.evaluate(), Ok(8.0));
    assert!(cache.contains("a * 2"));
}

#[test]
fn test_parse_until_delimiter() {
    let (parsed, rest) = ParsedExpression::parse_until("width / 2} wide", &["}"]);
    let expression = xpr_lang::ExpressionBuilder::from(parsed)
        .constant("width", 10.0)
        .build();

    assert_eq!(expression.evaluate(), Ok(5.0));
    assert_eq!(rest, "} wide");
}

#[test]
fn test_expressions_are_shared_between_threads() {
    let expression = Arc::new(
        Expression::builder("n * 2 + 1")
            .symbol(Symbol::variable("n"), |_| Ok(20.0))
            .build(),
    );

    let handles = (0..4)
        .map(|_| {
            let expression = Arc::clone(&expression);
            std::thread::spawn(move || expression.evaluate())
        })
        .collect::<Vec<_>>();

    for handle in handles {
        assert_eq!(handle.join().expect("thread panicked"), Ok(41.0));
    }
}

#[rstest]
#[case::identifier("width", true)]
#[case::namespaced("layout.width", true)]
#[case::quoted("'a'", false)]
#[case::spaces("a b", false)]
#[case::number("1a", false)]
fn test_is_valid_identifier(#[case] name: &str, #[case] expected: bool) {
    assert_eq!(xpr_lang::is_valid_identifier(name), expected);
}

#[rstest]
#[case::plus("+", true)]
#[case::range("..<", true)]
#[case::compound("+=", true)]
#[case::word("and", false)]
#[case::parenthesis("(", false)]
fn test_is_valid_operator(#[case] name: &str, #[case] expected: bool) {
    assert_eq!(xpr_lang::is_valid_operator(name), expected);
}
