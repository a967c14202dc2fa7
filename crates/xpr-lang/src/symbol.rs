use std::fmt::{self, Display, Formatter};

use smol_str::SmolStr;

use crate::lexer;

/// A named point of extensibility in an expression.
///
/// Every free name an expression references (variables, operators, functions and
/// array subscripts) is represented by a `Symbol`, and must be resolved to an
/// evaluator before the expression can be evaluated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Symbol {
    /// A named variable, e.g. `width`.
    Variable(SmolStr),
    /// A binary operator, e.g. `+` in `a + b`.
    Infix(SmolStr),
    /// A unary operator written before its operand, e.g. `-` in `-a`.
    Prefix(SmolStr),
    /// A unary operator written after its operand, e.g. `%` in `50%`.
    Postfix(SmolStr),
    /// A function called with a fixed number of arguments, e.g. `max(a, b)`.
    Function(SmolStr, usize),
    /// An array subscript, e.g. `colors[2]`.
    Array(SmolStr),
}

impl Symbol {
    pub fn variable(name: impl Into<SmolStr>) -> Self {
        Symbol::Variable(name.into())
    }

    pub fn infix(name: impl Into<SmolStr>) -> Self {
        Symbol::Infix(name.into())
    }

    pub fn prefix(name: impl Into<SmolStr>) -> Self {
        Symbol::Prefix(name.into())
    }

    pub fn postfix(name: impl Into<SmolStr>) -> Self {
        Symbol::Postfix(name.into())
    }

    pub fn function(name: impl Into<SmolStr>, arity: usize) -> Self {
        Symbol::Function(name.into(), arity)
    }

    pub fn array(name: impl Into<SmolStr>) -> Self {
        Symbol::Array(name.into())
    }

    /// The bare name of the symbol, without any decoration.
    pub fn name(&self) -> &SmolStr {
        match self {
            Symbol::Variable(name)
            | Symbol::Infix(name)
            | Symbol::Prefix(name)
            | Symbol::Postfix(name)
            | Symbol::Function(name, _)
            | Symbol::Array(name) => name,
        }
    }

    pub fn is_operator(&self) -> bool {
        matches!(self, Symbol::Infix(_) | Symbol::Prefix(_) | Symbol::Postfix(_))
    }

    /// The name as it must be written in source text to scan back to the same symbol.
    ///
    /// Quoted names are already escaped. Variable and function names that would not
    /// scan as a single identifier are wrapped in backticks.
    pub fn escaped_name(&self) -> String {
        let name = self.name();
        if self.is_operator() || is_quoted(name) || lexer::is_valid_identifier(name) {
            return name.to_string();
        }

        let mut escaped = String::with_capacity(name.len() + 2);
        escaped.push('`');
        for c in name.chars() {
            match c {
                '\0' => escaped.push_str("\\0"),
                '\t' => escaped.push_str("\\t"),
                '\n' => escaped.push_str("\\n"),
                '\r' => escaped.push_str("\\r"),
                '`' | '\\' => {
                    escaped.push('\\');
                    escaped.push(c);
                }
                c => escaped.push(c),
            }
        }
        escaped.push('`');
        escaped
    }
}

impl Display for Symbol {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            Symbol::Variable(_) => write!(f, "variable {}", self.escaped_name()),
            Symbol::Infix(name) => write!(f, "infix operator {}", name),
            Symbol::Prefix(name) => write!(f, "prefix operator {}", name),
            Symbol::Postfix(name) => write!(f, "postfix operator {}", name),
            Symbol::Function(..) => write!(f, "function {}()", self.escaped_name()),
            Symbol::Array(_) => write!(f, "array {}[]", self.escaped_name()),
        }
    }
}

/// Returns `true` for names produced by the escaped-identifier scanner from a
/// `'...'`, `"..."` or `` `...` `` literal.
pub(crate) fn is_quoted(name: &str) -> bool {
    let mut chars = name.chars();
    match (chars.next(), chars.next_back()) {
        (Some(first), Some(last)) => first == last && matches!(first, '\'' | '"' | '`'),
        _ => false,
    }
}
