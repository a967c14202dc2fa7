/// Binding strength of infix operators, from loosest to tightest.
///
/// Operators that are not classified share the [`Precedence::Default`] tier, which
/// binds tighter than ranges and comparisons but looser than multiplication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
    Comma,
    Assignment,
    Ternary,
    Or,
    And,
    Comparison,
    Coalescing,
    Cast,
    Range,
    Default,
    Multiplicative,
    Shift,
}

impl Precedence {
    pub fn of(op: &str) -> Self {
        match op {
            "<<" | ">>" | ">>>" => Precedence::Shift,
            "*" | "/" | "%" | "&" => Precedence::Multiplicative,
            ".." | "..." | "..<" => Precedence::Range,
            "is" | "as" | "isa" => Precedence::Cast,
            "??" | "?:" => Precedence::Coalescing,
            "<" | "<=" | ">=" | ">" | "==" | "!=" | "<>" | "===" | "!==" | "lt" | "le" | "lte"
            | "gt" | "ge" | "gte" | "eq" | "ne" => Precedence::Comparison,
            "&&" | "and" => Precedence::And,
            "||" | "or" => Precedence::Or,
            "?" | ":" => Precedence::Ternary,
            "=" | "*=" | "/=" | "%=" | "+=" | "-=" | "<<=" | ">>=" | "&=" | "^=" | "|=" | ":=" => {
                Precedence::Assignment
            }
            "," => Precedence::Comma,
            _ => Precedence::Default,
        }
    }

    pub fn is_right_associative(self) -> bool {
        matches!(
            self,
            Precedence::Comparison | Precedence::Assignment | Precedence::Ternary
        )
    }

    /// Returns `true` if `op` has a tier of its own rather than the default one.
    pub fn is_classified(op: &str) -> bool {
        Self::of(op) != Precedence::Default
    }
}

/// Returns `true` if the operator on the left binds before the one on the right,
/// i.e. `a lhs b rhs c` groups as `(a lhs b) rhs c`.
pub fn takes_precedence(lhs: &str, rhs: &str) -> bool {
    let (lhs, rhs) = (Precedence::of(lhs), Precedence::of(rhs));
    lhs > rhs || (lhs == rhs && !lhs.is_right_associative())
}
