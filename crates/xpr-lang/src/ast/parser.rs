use nom::Parser as _;
use nom::bytes::complete::tag;
use rustc_hash::FxHashMap;
use smol_str::SmolStr;

use super::node::Node;
use super::precedence::{Precedence, takes_precedence};
use crate::error::Error;
use crate::lexer::chars::{is_operator_char, is_whitespace};
use crate::lexer::{self, ScanError, Span, Token};
use crate::symbol::Symbol;

/// An entry of the operand/operator stack the parser shifts tokens onto.
#[derive(Debug, Clone, PartialEq)]
enum Item {
    Operand(Node),
    /// An operator whose role (infix, prefix or postfix) may still change.
    Operator(Symbol),
    /// `? then :` of a ternary expression, waiting for its condition and else branch.
    Ternary(Node),
}

/// A single-pass expression parser.
///
/// Tokens are shifted onto a stack and the stack is collapsed once the end of the
/// subexpression is reached, which resolves operator precedence and the role of
/// ambiguous operators.
pub struct Parser<'a> {
    rest: Span<'a>,
    /// Outcome of the ternary branch parsed after each `?`, by byte offset.
    ternaries: FxHashMap<usize, Option<(Node, Span<'a>)>>,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            rest: Span::new(source),
            ternaries: FxHashMap::default(),
        }
    }

    /// The input that has not been consumed yet.
    pub fn rest(&self) -> &'a str {
        *self.rest.fragment()
    }

    /// Parses until the input ends or one of `delimiters` is reached. The
    /// delimiter itself is not consumed.
    pub fn parse_subexpression(&mut self, delimiters: &[&str]) -> Result<Node, Error> {
        let mut stack: Vec<Item> = Vec::new();
        let mut operand_position = true;
        let mut preceded_by_whitespace = true;
        self.skip_whitespace();

        while !self.rest.fragment().is_empty() && !self.at_delimiter(delimiters) {
            let token = self.scan()?;
            let followed_by_whitespace = self.skip_whitespace() || self.rest.fragment().is_empty();

            match token {
                Token::Number(value) => {
                    stack.push(Item::Operand(Node::Literal(value)));
                    operand_position = false;
                }
                Token::Identifier(name) if !operand_position => {
                    stack.push(Item::Operator(Symbol::Infix(name)));
                    operand_position = true;
                }
                Token::Identifier(name) | Token::Escaped(name) => {
                    stack.push(Item::Operand(Node::variable(name)));
                    operand_position = false;
                }
                Token::Punct('(') => {
                    match stack.last() {
                        Some(Item::Operand(Node::Symbol(Symbol::Variable(name), args)))
                            if !operand_position && args.is_empty() =>
                        {
                            let name = name.clone();
                            let args = self.parse_arguments()?;
                            let symbol = Symbol::Function(name, args.len());
                            stack.pop();
                            stack.push(Item::Operand(Node::Symbol(symbol, args)));
                        }
                        Some(Item::Operand(_)) if !operand_position => {
                            return Err(Error::UnexpectedToken("(".into()));
                        }
                        _ => {
                            let node = self.parse_subexpression(&[")"])?;
                            self.expect(")")?;
                            stack.push(Item::Operand(node));
                        }
                    }
                    operand_position = false;
                    preceded_by_whitespace = self.skip_whitespace();
                    continue;
                }
                Token::Punct('[') => {
                    match stack.pop() {
                        Some(Item::Operand(Node::Symbol(Symbol::Variable(name), args)))
                            if !operand_position && args.is_empty() =>
                        {
                            let index = self.parse_subexpression(&["]"])?;
                            self.expect("]")?;
                            stack.push(Item::Operand(Node::Symbol(Symbol::Array(name), vec![index])));
                        }
                        _ => return Err(Error::UnexpectedToken("[".into())),
                    }
                    operand_position = false;
                    preceded_by_whitespace = self.skip_whitespace();
                    continue;
                }
                Token::Punct(',') => {
                    if let Some(Item::Operator(Symbol::Infix(op))) = stack.last() {
                        let op = op.clone();
                        stack.pop();
                        stack.push(Item::Operator(Symbol::Postfix(op)));
                    }
                    stack.push(Item::Operator(Symbol::infix(",")));
                    operand_position = true;
                    preceded_by_whitespace = true;
                    continue;
                }
                Token::Punct(c) => return Err(Error::UnexpectedToken(c.to_string().into())),
                Token::Operator(op) => {
                    let after_postfix = matches!(stack.last(), Some(Item::Operator(Symbol::Postfix(_))));
                    if op == "?" && (!operand_position || after_postfix) {
                        if let Some(then) = self.parse_ternary_branch() {
                            stack.push(Item::Ternary(then));
                            operand_position = true;
                            preceded_by_whitespace = true;
                            continue;
                        }
                    }

                    let symbol = match (preceded_by_whitespace, followed_by_whitespace) {
                        (true, false) => Symbol::Prefix(op),
                        (false, true) => Symbol::Postfix(op),
                        _ => Symbol::Infix(op),
                    };
                    stack.push(Item::Operator(symbol));
                    operand_position = true;
                }
            }

            preceded_by_whitespace = followed_by_whitespace;
        }

        collapse(&mut stack, 0)?;

        match stack.len() {
            0 => Err(Error::UnexpectedToken(SmolStr::default())),
            1 => match stack.pop() {
                Some(Item::Operand(node)) => Ok(node),
                Some(item) => Err(unexpected(&item)),
                None => Err(Error::UnexpectedToken(SmolStr::default())),
            },
            _ => Err(stack
                .iter()
                .find(|item| !matches!(item, Item::Operand(_)))
                .or(stack.last())
                .map(unexpected)
                .unwrap_or_else(|| Error::UnexpectedToken(SmolStr::default()))),
        }
    }

    /// Parses the arguments of a function call, after the opening `(`.
    fn parse_arguments(&mut self) -> Result<Vec<Node>, Error> {
        let mut args = Vec::new();
        self.skip_whitespace();
        if self.consume(")") {
            return Ok(args);
        }

        loop {
            args.push(self.parse_subexpression(&[",", ")"])?);
            if self.consume(",") {
                continue;
            }
            self.expect(")")?;
            return Ok(args);
        }
    }

    /// Tries to parse the `then :` part of a ternary after a `?`. The position is
    /// restored if there is none, so the `?` can be treated as an ordinary operator.
    ///
    /// The outcome only depends on the input after the `?`, so it is remembered:
    /// a chain of `?` without `:` would otherwise be reparsed once for every
    /// enclosing `?`.
    fn parse_ternary_branch(&mut self) -> Option<Node> {
        let start = self.rest;
        let offset = start.location_offset();
        if let Some(outcome) = self.ternaries.get(&offset).cloned() {
            return outcome.map(|(then, rest)| {
                self.rest = rest;
                then
            });
        }

        let outcome = match self.parse_subexpression(&[":"]) {
            Ok(then) if self.at_delimiter(&[":"]) => {
                self.consume(":");
                self.skip_whitespace();
                Some((then, self.rest))
            }
            _ => {
                self.rest = start;
                None
            }
        };

        self.ternaries.insert(offset, outcome.clone());
        outcome.map(|(then, _)| then)
    }

    fn scan(&mut self) -> Result<Token, Error> {
        match lexer::token(self.rest) {
            Ok((rest, token)) => {
                self.rest = rest;
                Ok(token)
            }
            Err(nom::Err::Failure(ScanError {
                cause: Some(cause), ..
            })) => Err(cause),
            Err(_) => {
                let junk = self
                    .rest
                    .fragment()
                    .split(is_whitespace)
                    .next()
                    .unwrap_or_default();
                Err(Error::UnexpectedToken(junk.into()))
            }
        }
    }

    fn skip_whitespace(&mut self) -> bool {
        let (rest, skipped) = lexer::skip_whitespace(self.rest);
        self.rest = rest;
        skipped
    }

    fn consume(&mut self, token: &str) -> bool {
        match tag::<_, _, ScanError>(token).parse(self.rest) {
            Ok((rest, _)) => {
                self.rest = rest;
                true
            }
            Err(_) => false,
        }
    }

    fn expect(&mut self, delimiter: &str) -> Result<(), Error> {
        if self.consume(delimiter) {
            Ok(())
        } else {
            Err(Error::MissingDelimiter(delimiter.into()))
        }
    }

    /// Returns `true` if the input starts with one of `delimiters`. A delimiter
    /// made of operator characters only matches a whole operator, so `:` does not
    /// match the start of `:=`, or an operator that is the delimiter directly
    /// followed by a prefix sign, so `:` matches the start of `:-1`.
    fn at_delimiter(&self, delimiters: &[&str]) -> bool {
        let input = self.rest.fragment();
        delimiters.iter().any(|delimiter| {
            if !input.starts_with(*delimiter) {
                return false;
            }
            if delimiter.starts_with(|c: char| c == '.' || is_operator_char(c)) {
                matches!(
                    lexer::operator(self.rest),
                    Ok((_, op)) if op == *delimiter || matches!(op.strip_prefix(*delimiter), Some("-" | "+" | "!"))
                )
            } else {
                true
            }
        })
    }
}

fn unexpected(item: &Item) -> Error {
    let token = match item {
        Item::Operand(node) => node.to_string(),
        Item::Operator(symbol) => symbol.name().to_string(),
        Item::Ternary(_) => ":".to_string(),
    };
    Error::UnexpectedToken(token.into())
}

/// Operators that are known to be infix, so an operator following one must be a
/// prefix operator rather than the other way around.
fn is_known_infix(op: &str) -> bool {
    Precedence::is_classified(op) || op == "+" || op == "-"
}

/// Collapses the stack from position `i` until nothing more can be reduced.
fn collapse(stack: &mut Vec<Item>, mut i: usize) -> Result<(), Error> {
    while i + 1 < stack.len() {
        match (&stack[i], &stack[i + 1]) {
            (Item::Operand(Node::Symbol(Symbol::Postfix(_), args)), Item::Operand(_))
                if args.len() == 1 =>
            {
                // A postfix operator followed by an operand was an infix operator.
                if let Item::Operand(Node::Symbol(Symbol::Postfix(op), mut args)) = stack.remove(i) {
                    if let Some(lhs) = args.pop() {
                        stack.insert(i, Item::Operator(Symbol::Infix(op)));
                        stack.insert(i, Item::Operand(lhs));
                    }
                }
                // Operators left of it may bind tighter than the new infix operator.
                i = 0;
            }
            (Item::Operand(_), rhs @ Item::Operand(_)) => return Err(unexpected(rhs)),
            (Item::Operand(_), Item::Operator(op)) => {
                let is_postfix = matches!(op, Symbol::Postfix(_));
                let known_infix = is_known_infix(op.name());
                match stack.get(i + 2) {
                    None => {
                        apply_postfix(stack, i)?;
                        i = 0;
                    }
                    Some(_) if is_postfix => {
                        apply_postfix(stack, i)?;
                        i = 0;
                    }
                    Some(Item::Operand(_)) => i = reduce_infix(stack, i)?,
                    Some(Item::Operator(Symbol::Prefix(_))) => i += 2,
                    Some(Item::Operator(next)) if known_infix => {
                        stack[i + 2] = Item::Operator(Symbol::Prefix(next.name().clone()));
                        i += 2;
                    }
                    Some(Item::Operator(_)) => {
                        let op = op.name().clone();
                        stack[i + 1] = Item::Operator(Symbol::Postfix(op));
                    }
                    Some(item @ Item::Ternary(_)) => return Err(unexpected(item)),
                }
            }
            (Item::Operand(_), ternary @ Item::Ternary(_)) => match stack.get(i + 2) {
                None => return Err(unexpected(ternary)),
                Some(Item::Operand(_)) => i = reduce_infix(stack, i)?,
                Some(Item::Operator(Symbol::Prefix(_))) => i += 2,
                Some(Item::Operator(next)) => {
                    stack[i + 2] = Item::Operator(Symbol::Prefix(next.name().clone()));
                    i += 2;
                }
                Some(item @ Item::Ternary(_)) => return Err(unexpected(item)),
            },
            (Item::Operator(_), Item::Operand(_)) => {
                let mut items = stack.drain(i..i + 2);
                let node = match (items.next(), items.next()) {
                    (Some(Item::Operator(op)), Some(Item::Operand(arg))) => {
                        Node::Symbol(Symbol::Prefix(op.name().clone()), vec![arg])
                    }
                    _ => return Err(Error::UnexpectedToken(SmolStr::default())),
                };
                drop(items);
                stack.insert(i, Item::Operand(node));
                i = 0;
            }
            (Item::Operator(_), Item::Operator(_)) => i += 1,
            (Item::Operator(_), item @ Item::Ternary(_)) | (item @ Item::Ternary(_), _) => {
                return Err(unexpected(item));
            }
        }
    }

    Ok(())
}

/// Applies the operator at `i + 1` to the operand at `i` as a postfix operator.
fn apply_postfix(stack: &mut Vec<Item>, i: usize) -> Result<(), Error> {
    let mut items = stack.drain(i..i + 2);
    let node = match (items.next(), items.next()) {
        (Some(Item::Operand(arg)), Some(Item::Operator(op))) => {
            Node::Symbol(Symbol::Postfix(op.name().clone()), vec![arg])
        }
        (_, Some(item)) => return Err(unexpected(&item)),
        _ => return Err(Error::UnexpectedToken(SmolStr::default())),
    };
    drop(items);
    stack.insert(i, Item::Operand(node));
    Ok(())
}

/// Reduces `lhs op rhs` at `i` unless the operator after `rhs` binds tighter, in
/// which case collapsing continues from `rhs`. Returns the position to continue from.
fn reduce_infix(stack: &mut Vec<Item>, i: usize) -> Result<usize, Error> {
    let op = match &stack[i + 1] {
        Item::Operator(symbol) => symbol.name().clone(),
        _ => SmolStr::new_inline("?"),
    };

    match stack.get(i + 3) {
        Some(Item::Operator(Symbol::Postfix(_))) | Some(Item::Operand(_)) => return Ok(i + 2),
        Some(Item::Operator(_)) if stack.len() == i + 4 => return Ok(i + 2),
        Some(Item::Operator(next)) if !takes_precedence(&op, next.name()) => return Ok(i + 2),
        Some(Item::Ternary(_)) if !takes_precedence(&op, "?") => return Ok(i + 2),
        _ => {}
    }

    let mut items = stack.drain(i..i + 3);
    let node = match (items.next(), items.next(), items.next()) {
        (Some(Item::Operand(lhs)), Some(Item::Ternary(then)), Some(Item::Operand(rhs))) => {
            Node::Symbol(Symbol::infix("?:"), vec![lhs, then, rhs])
        }
        (Some(Item::Operand(lhs)), Some(Item::Operator(op)), Some(Item::Operand(rhs))) => {
            match lhs {
                Node::Symbol(Symbol::Infix(q), mut args) if op.name() == ":" && q == "?" && args.len() == 2 => {
                    args.push(rhs);
                    Node::Symbol(Symbol::infix("?:"), args)
                }
                lhs => Node::Symbol(Symbol::Infix(op.name().clone()), vec![lhs, rhs]),
            }
        }
        (_, Some(item), _) => return Err(unexpected(&item)),
        _ => return Err(Error::UnexpectedToken(SmolStr::default())),
    };
    drop(items);
    stack.insert(i, Item::Operand(node));
    Ok(0)
}
