use std::fmt::{self, Display, Formatter};

use itertools::Itertools;
use rustc_hash::FxHashSet;
use smol_str::SmolStr;

use super::precedence::Precedence;
use crate::error::Error;
use crate::lexer;
use crate::number::format_number;
use crate::symbol::Symbol;

/// A node of a parsed expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Literal(f64),
    /// A symbol applied to its arguments. Variables have no arguments.
    Symbol(Symbol, Vec<Node>),
    /// An expression that failed to parse, with the source text it was parsed from.
    Error(Error, SmolStr),
}

impl Node {
    pub fn variable(name: impl Into<SmolStr>) -> Self {
        Node::Symbol(Symbol::variable(name), Vec::new())
    }

    /// Collects every symbol referenced by the tree.
    pub fn symbols(&self) -> FxHashSet<Symbol> {
        let mut symbols = FxHashSet::default();
        self.collect_symbols(&mut symbols);
        symbols
    }

    fn collect_symbols(&self, symbols: &mut FxHashSet<Symbol>) {
        if let Node::Symbol(symbol, args) = self {
            symbols.insert(symbol.clone());
            args.iter().for_each(|arg| arg.collect_symbols(symbols));
        }
    }

    pub fn error(&self) -> Option<&Error> {
        match self {
            Node::Error(error, _) => Some(error),
            _ => None,
        }
    }

    pub(crate) fn is_ternary(&self) -> bool {
        matches!(self, Node::Symbol(Symbol::Infix(op), args) if op == "?:" && args.len() == 3)
    }

    /// The precedence this node prints with, or `None` for nodes that never need
    /// parentheses.
    fn precedence(&self) -> Option<Precedence> {
        match self {
            _ if self.is_ternary() => Some(Precedence::Ternary),
            Node::Symbol(Symbol::Infix(op), args) if args.len() == 2 => Some(Precedence::of(op)),
            _ => None,
        }
    }

    fn is_operator_application(&self) -> bool {
        matches!(self, Node::Symbol(symbol, _) if symbol.is_operator())
    }

    fn fmt_child(&self, f: &mut Formatter<'_>, wrap: bool) -> fmt::Result {
        if wrap { write!(f, "({})", self) } else { write!(f, "{}", self) }
    }
}

fn is_word(op: &str) -> bool {
    lexer::is_valid_identifier(op)
}

impl Display for Node {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            // Folded results that have no literal form print as an expression producing them.
            Node::Literal(value) if value.is_nan() => write!(f, "(0 / 0)"),
            Node::Literal(value) if value.is_infinite() => {
                write!(f, "({} / 0)", if value.is_sign_negative() { "-1" } else { "1" })
            }
            Node::Literal(value) => write!(f, "{}", format_number(*value)),
            Node::Error(_, source) => write!(f, "{}", source),
            Node::Symbol(_, args) if self.is_ternary() => {
                let ternary = Precedence::Ternary;
                args[0].fmt_child(f, args[0].precedence().is_some_and(|p| p <= ternary))?;
                write!(f, " ? {} : ", args[1])?;
                args[2].fmt_child(f, args[2].precedence().is_some_and(|p| p < ternary))
            }
            Node::Symbol(Symbol::Infix(op), args) if args.len() == 2 => {
                let precedence = Precedence::of(op);
                let right_associative = precedence.is_right_associative();
                let wrap_lhs = args[0]
                    .precedence()
                    .is_some_and(|p| p < precedence || (p == precedence && right_associative));
                let wrap_rhs = args[1]
                    .precedence()
                    .is_some_and(|p| p < precedence || (p == precedence && !right_associative));

                args[0].fmt_child(f, wrap_lhs)?;
                if op == "," {
                    write!(f, ", ")?;
                } else {
                    write!(f, " {} ", op)?;
                }
                args[1].fmt_child(f, wrap_rhs)
            }
            Node::Symbol(Symbol::Prefix(op), args) if args.len() == 1 => {
                let arg = &args[0];
                let wrap = arg.is_operator_application()
                    || matches!(arg, Node::Literal(value) if value.is_finite() && value.is_sign_negative());
                write!(f, "{}{}", op, if is_word(op) { " " } else { "" })?;
                arg.fmt_child(f, wrap)
            }
            Node::Symbol(Symbol::Postfix(op), args) if args.len() == 1 => {
                let arg = &args[0];
                let wrap = matches!(
                    arg,
                    Node::Symbol(Symbol::Infix(_) | Symbol::Postfix(_), _)
                );
                arg.fmt_child(f, wrap)?;
                write!(f, "{}{}", if is_word(op) { " " } else { "" }, op)
            }
            Node::Symbol(symbol @ Symbol::Array(_), args) => {
                write!(f, "{}[{}]", symbol.escaped_name(), args.iter().join(", "))
            }
            Node::Symbol(symbol @ Symbol::Variable(_), args) if args.is_empty() => {
                write!(f, "{}", symbol.escaped_name())
            }
            Node::Symbol(symbol, args) => {
                let name = if symbol.is_operator() {
                    symbol.name().to_string()
                } else {
                    symbol.escaped_name()
                };
                write!(f, "{}({})", name, args.iter().join(", "))
            }
        }
    }
}
