//! `xpr-lang` parses and evaluates small arithmetic, logical and string expressions
//! such as `width / 2 + left`, `rgba(255, 0, 0, a)` or `a ? b : c`.
//!
//! ## Examples
//!
//! ```rust
//! use xpr_lang::{AnyExpression, Expression, Options, Symbol, Value};
//!
//! // Numeric expressions, bound to constants and caller supplied functions.
//! let expression = Expression::builder("clamp(x * 2, 0, 10)")
//!     .constant("x", 7.0)
//!     .symbol(Symbol::function("clamp", 3), |args| Ok(args[0].max(args[1]).min(args[2])))
//!     .build();
//! assert_eq!(expression.evaluate(), Ok(10.0));
//!
//! // Booleans are opt-in.
//! let expression = Expression::builder("a > 1 ? 1 : 0")
//!     .options(Options::BOOL_SYMBOLS)
//!     .constant("a", 3.0)
//!     .build();
//! assert_eq!(expression.evaluate(), Ok(1.0));
//!
//! // Expressions over strings and other values.
//! let mut expression = AnyExpression::new("'a' + 1");
//! assert_eq!(expression.evaluate(), Ok(Value::from("a1")));
//!
//! // Parse errors are reported when evaluating.
//! let parsed = xpr_lang::parse("(1 + 2");
//! assert_eq!(parsed.error().map(|e| e.to_string()), Some("Missing `)`".to_string()));
//! ```
mod any;
mod ast;
mod cache;
mod error;
mod eval;
mod lexer;
mod number;
mod symbol;

pub use any::{AnyEvaluator, AnyExpression, AnyExpressionBuilder, AnySymbolFn, Opaque, Value};
pub use ast::{Node, ParsedExpression, Parser};
pub use cache::ParseCache;
pub use error::{Error, Report};
pub use eval::{Evaluator, Expression, ExpressionBuilder, Options, SymbolFn};
pub use lexer::{is_valid_identifier, is_valid_operator};
pub use number::format_number;
pub use symbol::Symbol;

/// Parses `source` through the process-wide [`ParseCache`].
pub fn parse(source: &str) -> ParsedExpression {
    ParseCache::global().parse(source)
}

pub fn parse_with_cache(source: &str, cache: &ParseCache) -> ParsedExpression {
    cache.parse(source)
}

/// Removes `source` from the process-wide cache, or every entry if `source` is `None`.
pub fn clear_cache(source: Option<&str>) {
    ParseCache::global().clear(source);
}
