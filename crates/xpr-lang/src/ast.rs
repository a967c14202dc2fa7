use std::fmt::{self, Display, Formatter};
use std::sync::Arc;

use rustc_hash::FxHashSet;
use smol_str::SmolStr;

use crate::error::Error;
use crate::symbol::Symbol;

pub mod node;
pub mod parser;
pub mod precedence;

pub use node::Node;
pub use parser::Parser;

/// An immutable parsed expression.
///
/// Parsing never fails: a malformed expression produces a tree whose root is an
/// error node, which is reported when the expression is evaluated. Cloning is
/// cheap and the tree can be shared between threads.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedExpression {
    root: Arc<Node>,
    symbols: Arc<FxHashSet<Symbol>>,
}

impl ParsedExpression {
    /// Parses `source` without going through a parse cache.
    pub fn parse(source: &str) -> Self {
        let root = match Parser::new(source).parse_subexpression(&[]) {
            Ok(node) => node,
            Err(error) => Node::Error(error, SmolStr::new(source)),
        };
        Self::from(root)
    }

    /// Parses the start of `source` up to the first of `delimiters`, for embedding
    /// expressions in a larger grammar. Returns the expression and the remaining
    /// input, which starts with the delimiter that ended the expression.
    pub fn parse_until<'a>(source: &'a str, delimiters: &[&str]) -> (Self, &'a str) {
        let mut parser = Parser::new(source);
        let root = match parser.parse_subexpression(delimiters) {
            Ok(node) => node,
            Err(error) => {
                let consumed = &source[..source.len() - parser.rest().len()];
                Node::Error(error, SmolStr::new(consumed.trim()))
            }
        };
        (Self::from(root), parser.rest())
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    /// Every symbol the expression references.
    pub fn symbols(&self) -> &FxHashSet<Symbol> {
        &self.symbols
    }

    /// The parse error, if the expression is malformed.
    pub fn error(&self) -> Option<&Error> {
        self.root.error()
    }
}

impl From<Node> for ParsedExpression {
    fn from(root: Node) -> Self {
        let symbols = root.symbols();
        Self {
            root: Arc::new(root),
            symbols: Arc::new(symbols),
        }
    }
}

impl Display for ParsedExpression {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.root)
    }
}
