use miette::{Diagnostic, SourceOffset, SourceSpan};
use smol_str::SmolStr;

use crate::number::format_number;
use crate::symbol::Symbol;

/// Errors raised while parsing or evaluating an expression.
///
/// The display strings are meant to be shown directly to whoever wrote the
/// expression, so they name the offending token or symbol.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// A free-text error raised by application code.
    #[error("{0}")]
    Message(String),
    #[error("{}", if .0.is_empty() { "Empty expression".to_string() } else { format!("Unexpected token `{}`", .0) })]
    UnexpectedToken(SmolStr),
    #[error("Missing `{0}`")]
    MissingDelimiter(SmolStr),
    #[error("Undefined {0}")]
    UndefinedSymbol(Symbol),
    #[error("{}", arity_message(.0))]
    ArityMismatch(Symbol),
    #[error("Index {index} out of bounds for {1}", index = format_number(*.0))]
    ArrayBounds(f64, Symbol),
    #[error("{} cannot be used with arguments of type ({})", capitalize(&.0.to_string()), .1.join(", "))]
    TypeMismatch(Symbol, Vec<String>),
}

impl Error {
    pub fn message(message: impl Into<String>) -> Self {
        Error::Message(message.into())
    }

    /// The token or symbol name that caused the error, if there is one.
    #[cold]
    pub fn token(&self) -> Option<&str> {
        match self {
            Error::Message(_) => None,
            Error::UnexpectedToken(token) if token.is_empty() => None,
            Error::UnexpectedToken(token) => Some(token.as_str()),
            Error::MissingDelimiter(_) => None,
            Error::UndefinedSymbol(symbol)
            | Error::ArityMismatch(symbol)
            | Error::ArrayBounds(_, symbol)
            | Error::TypeMismatch(symbol, _) => Some(symbol.name().as_str()),
        }
    }
}

fn arity_message(symbol: &Symbol) -> String {
    match symbol {
        Symbol::Function(_, arity) => format!(
            "Function {}() expects {} argument{}",
            symbol.escaped_name(),
            arity,
            if *arity == 1 { "" } else { "s" }
        ),
        symbol => format!("Arity mismatch for {}", symbol),
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// An [`Error`] together with the source text it was raised for, rendered by
/// [`miette`] with the offending token highlighted.
#[derive(PartialEq, Debug, thiserror::Error)]
#[error("{cause}")]
pub struct Report {
    /// The underlying cause of the error.
    pub cause: Error,
    /// The expression source text.
    pub source_code: String,
    /// The location of the offending token in the source text.
    pub location: SourceSpan,
}

impl Report {
    pub fn new(source_code: impl Into<String>, cause: Error) -> Self {
        let source_code = source_code.into();
        let location = match (&cause, cause.token()) {
            (Error::MissingDelimiter(_), _) => {
                SourceSpan::new(SourceOffset::from(source_code.len().saturating_sub(1)), 1)
            }
            (_, Some(token)) => match source_code.find(token) {
                Some(offset) => SourceSpan::new(SourceOffset::from(offset), token.len().max(1)),
                None => SourceSpan::new(SourceOffset::from(0), source_code.len().max(1)),
            },
            (_, None) => SourceSpan::new(SourceOffset::from(0), source_code.len().max(1)),
        };

        Self {
            cause,
            source_code,
            location,
        }
    }
}

impl Diagnostic for Report {
    fn code<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        let code = match &self.cause {
            Error::Message(_) => "xpr::message",
            Error::UnexpectedToken(_) => "xpr::unexpected_token",
            Error::MissingDelimiter(_) => "xpr::missing_delimiter",
            Error::UndefinedSymbol(_) => "xpr::undefined_symbol",
            Error::ArityMismatch(_) => "xpr::arity_mismatch",
            Error::ArrayBounds(..) => "xpr::array_bounds",
            Error::TypeMismatch(..) => "xpr::type_mismatch",
        };

        Some(Box::new(code))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        let msg = match &self.cause {
            Error::UnexpectedToken(token) if token.is_empty() => {
                Some("The expression is empty. Write a value, variable or function call.".to_string())
            }
            Error::UnexpectedToken(_) => Some("Check for misplaced operators or missing operands.".to_string()),
            Error::MissingDelimiter(delimiter) => Some(format!("Add the missing `{delimiter}`.")),
            Error::UndefinedSymbol(Symbol::Variable(name)) => {
                Some(format!("Define `{name}` as a constant, e.g. `-D {name}=1`."))
            }
            Error::UndefinedSymbol(_) => Some("Check the spelling, or enable the boolean symbols with `--bool`.".to_string()),
            Error::ArityMismatch(_) => Some("Check the number of arguments passed to the function.".to_string()),
            Error::Message(_) | Error::ArrayBounds(..) | Error::TypeMismatch(..) => None,
        };

        msg.map(|m| Box::new(m) as Box<dyn std::fmt::Display>)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = miette::LabeledSpan> + '_>> {
        Some(Box::new(std::iter::once(miette::LabeledSpan::new_with_span(
            Some(format!("{}", self.cause)),
            self.location,
        ))))
    }

    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        Some(&self.source_code)
    }
}
