pub mod chars;

use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_while, take_while_m_n, take_while1},
    character::complete::{anychar, char, digit1, hex_digit1, one_of, satisfy},
    combinator::{map, map_opt, opt, recognize, value},
    multi::{fold_many0, many0},
    sequence::{delimited, pair, preceded},
};
use nom_locate::LocatedSpan;
use smol_str::SmolStr;

use crate::error::Error;
use chars::{is_identifier_head, is_identifier_tail, is_operator_char, is_whitespace};

/// A cursor into the expression source. Copying a span is how the parser saves
/// and restores its position when it needs to backtrack.
pub type Span<'a> = LocatedSpan<&'a str>;

pub type ScanResult<'a, T> = IResult<Span<'a>, T, ScanError<'a>>;

/// The error type of the scanner.
///
/// A recoverable mismatch carries no cause and just means "try the next scan".
/// An input that was recognized but is malformed (an unterminated quote, a numeral
/// that overflows) is reported as a [`nom::Err::Failure`] with a cause.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanError<'a> {
    pub input: Span<'a>,
    pub cause: Option<Error>,
}

impl<'a> ScanError<'a> {
    fn failure(input: Span<'a>, cause: Error) -> nom::Err<Self> {
        nom::Err::Failure(Self {
            input,
            cause: Some(cause),
        })
    }
}

impl<'a> nom::error::ParseError<Span<'a>> for ScanError<'a> {
    fn from_error_kind(input: Span<'a>, _kind: nom::error::ErrorKind) -> Self {
        Self { input, cause: None }
    }

    fn append(_input: Span<'a>, _kind: nom::error::ErrorKind, other: Self) -> Self {
        other
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(f64),
    /// A bare identifier, e.g. `width` or `layout.left`.
    Identifier(SmolStr),
    /// A quoted identifier. The name keeps its delimiters, e.g. `'hello'`.
    Escaped(SmolStr),
    Operator(SmolStr),
    /// One of `(`, `)`, `,`, `[` or `]`.
    Punct(char),
}

/// Skips whitespace, returning the remaining input and whether anything was skipped.
pub fn skip_whitespace(input: Span) -> (Span, bool) {
    match take_while::<_, _, ScanError>(is_whitespace).parse(input) {
        Ok((rest, skipped)) => (rest, !skipped.fragment().is_empty()),
        Err(_) => (input, false),
    }
}

/// Scans the next token, trying numbers, identifiers, operators and quoted
/// identifiers in that order.
pub fn token(input: Span) -> ScanResult<Token> {
    alt((
        map(numeric_literal, Token::Number),
        map(identifier, Token::Identifier),
        map(operator, Token::Operator),
        map(punctuation, Token::Punct),
        map(escaped_identifier, Token::Escaped),
    ))
    .parse(input)
}

pub fn punctuation(input: Span) -> ScanResult<char> {
    one_of("(),[]").parse(input)
}

fn hex_numeral(input: Span) -> ScanResult<Span> {
    preceded(tag("0x"), hex_digit1).parse(input)
}

fn decimal_numeral(input: Span) -> ScanResult<Span> {
    recognize((
        digit1,
        opt(pair(char('.'), digit1)),
        opt((one_of("eE"), opt(one_of("+-")), digit1)),
    ))
    .parse(input)
}

/// Scans a decimal or `0x` hexadecimal numeral.
pub fn numeric_literal(input: Span) -> ScanResult<f64> {
    if let Ok((rest, digits)) = hex_numeral(input) {
        let number = digits
            .fragment()
            .chars()
            .filter_map(|c| c.to_digit(16))
            .fold(0.0, |acc, digit| acc * 16.0 + f64::from(digit));
        return finite(input, rest, number);
    }

    let (rest, numeral) = decimal_numeral(input)?;
    match numeral.fragment().parse::<f64>() {
        Ok(number) => finite(input, rest, number),
        Err(_) => Err(ScanError::failure(
            input,
            Error::UnexpectedToken(SmolStr::new(numeral.fragment())),
        )),
    }
}

fn finite<'a>(input: Span<'a>, rest: Span<'a>, number: f64) -> ScanResult<'a, f64> {
    if number.is_finite() {
        Ok((rest, number))
    } else {
        let len = rest.location_offset() - input.location_offset();
        Err(ScanError::failure(
            input,
            Error::UnexpectedToken(SmolStr::new(&input.fragment()[..len])),
        ))
    }
}

fn identifier_part(input: Span) -> ScanResult<Span> {
    take_while1(is_identifier_tail).parse(input)
}

/// Scans an identifier. Dots separate namespaces (`layout.left`), but a trailing
/// dot is left for the next token, and a lone `.` is not an identifier.
pub fn identifier(input: Span) -> ScanResult<SmolStr> {
    map(
        recognize(pair(
            alt((
                recognize(pair(satisfy(is_identifier_head), take_while(is_identifier_tail))),
                recognize(pair(char('.'), identifier_part)),
            )),
            many0(pair(char('.'), identifier_part)),
        )),
        |span: Span| SmolStr::new(span.fragment()),
    )
    .parse(input)
}

/// Scans an operator: either a run of operator characters, or one or more dots
/// followed by operator characters or dots.
pub fn operator(input: Span) -> ScanResult<SmolStr> {
    map(
        alt((
            recognize(pair(
                char('.'),
                take_while(|c| c == '.' || is_operator_char(c)),
            )),
            take_while1(is_operator_char),
        )),
        |span: Span| SmolStr::new(span.fragment()),
    )
    .parse(input)
}

fn unicode(input: Span) -> ScanResult<char> {
    map_opt(
        preceded(
            char('u'),
            delimited(
                char('{'),
                take_while_m_n(1, 8, |c: char| c.is_ascii_hexdigit()),
                char('}'),
            ),
        ),
        |span: Span| u32::from_str_radix(span.fragment(), 16).ok().and_then(char::from_u32),
    )
    .parse(input)
}

fn escape_sequence(input: Span) -> ScanResult<char> {
    preceded(
        char('\\'),
        alt((
            value('\0', char('0')),
            value('\t', char('t')),
            value('\n', char('n')),
            value('\r', char('r')),
            unicode,
            anychar,
        )),
    )
    .parse(input)
}

/// Scans a `` `...` ``, `'...'` or `"..."` quoted identifier. The returned name
/// includes both delimiters so it never equals a bare identifier.
pub fn escaped_identifier(input: Span) -> ScanResult<SmolStr> {
    let (rest, delimiter) = one_of("`'\"").parse(input)?;
    let (rest, body) = fold_many0(
        alt((
            escape_sequence,
            satisfy(move |c| c != delimiter && c != '\\'),
        )),
        String::new,
        |mut body, c| {
            body.push(c);
            body
        },
    )
    .parse(rest)?;

    match opt(char::<_, ScanError>(delimiter)).parse(rest) {
        Ok((rest, Some(_))) => {
            let mut name = String::with_capacity(body.len() + 2);
            name.push(delimiter);
            name.push_str(&body);
            name.push(delimiter);
            Ok((rest, SmolStr::new(name)))
        }
        _ => Err(ScanError::failure(
            input,
            Error::MissingDelimiter(SmolStr::new(delimiter.to_string())),
        )),
    }
}

/// Returns `true` if the string scans as exactly one identifier.
pub fn is_valid_identifier(name: &str) -> bool {
    matches!(identifier(Span::new(name)), Ok((rest, _)) if rest.fragment().is_empty())
}

/// Returns `true` if the string scans as exactly one operator.
pub fn is_valid_operator(name: &str) -> bool {
    matches!(operator(Span::new(name)), Ok((rest, _)) if rest.fragment().is_empty())
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn scan(input: &str) -> Result<(String, Token), Option<Error>> {
        match token(Span::new(input)) {
            Ok((rest, token)) => Ok((rest.fragment().to_string(), token)),
            Err(nom::Err::Failure(e)) | Err(nom::Err::Error(e)) => Err(e.cause),
            Err(nom::Err::Incomplete(_)) => Err(None),
        }
    }

    #[rstest]
    #[case::integer("42", 42.0, "")]
    #[case::fraction("3.25 + x", 3.25, " + x")]
    #[case::exponent("1e3", 1000.0, "")]
    #[case::signed_exponent("2.5E-1", 0.25, "")]
    #[case::hex("0xff", 255.0, "")]
    #[case::dot_without_digit("1.foo", 1.0, ".foo")]
    #[case::exponent_without_digit("1e", 1.0, "e")]
    #[case::range("1..2", 1.0, "..2")]
    #[case::leading_zero_hex_only("10xff", 10.0, "xff")]
    fn test_numeric_literal(#[case] input: &str, #[case] expected: f64, #[case] rest: &str) {
        assert_eq!(scan(input), Ok((rest.to_string(), Token::Number(expected))));
    }

    #[test]
    fn test_numeric_literal_overflow() {
        assert_eq!(
            scan("1e999"),
            Err(Some(Error::UnexpectedToken("1e999".into())))
        );
    }

    #[rstest]
    #[case::simple("width", "width", "")]
    #[case::namespaced("layout.left + 1", "layout.left", " + 1")]
    #[case::trailing_dot("a.", "a", ".")]
    #[case::leading_dot(".foo", ".foo", "")]
    #[case::digits("x2", "x2", "")]
    #[case::unicode("π", "π", "")]
    #[case::special_head("$count", "$count", "")]
    fn test_identifier(#[case] input: &str, #[case] expected: &str, #[case] rest: &str) {
        assert_eq!(
            scan(input),
            Ok((rest.to_string(), Token::Identifier(expected.into())))
        );
    }

    #[rstest]
    #[case::plus("+", "+", "")]
    #[case::run("+-x", "+-", "x")]
    #[case::lone_dot(".", ".", "")]
    #[case::range("..<5", "..<", "5")]
    #[case::ellipsis("...", "...", "")]
    #[case::unicode("≤ b", "≤", " b")]
    #[case::ternary("?:", "?:", "")]
    fn test_operator(#[case] input: &str, #[case] expected: &str, #[case] rest: &str) {
        assert_eq!(
            scan(input),
            Ok((rest.to_string(), Token::Operator(expected.into())))
        );
    }

    #[rstest]
    #[case('(')]
    #[case(')')]
    #[case(',')]
    #[case('[')]
    #[case(']')]
    fn test_punctuation(#[case] c: char) {
        assert_eq!(scan(&c.to_string()), Ok((String::new(), Token::Punct(c))));
    }

    #[rstest]
    #[case::single("'hello'", "'hello'")]
    #[case::double("\"hello\"", "\"hello\"")]
    #[case::backtick("`a b`", "`a b`")]
    #[case::empty("''", "''")]
    #[case::escapes("'a\\tb\\n'", "'a\tb\n'")]
    #[case::quote("'it\\'s'", "'it's'")]
    #[case::unicode("'\\u{1F600}'", "'😀'")]
    #[case::other_char("'\\q'", "'q'")]
    fn test_escaped_identifier(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(
            scan(input),
            Ok((String::new(), Token::Escaped(expected.into())))
        );
    }

    #[rstest]
    #[case::unterminated("'abc", "'")]
    #[case::trailing_backslash("\"abc\\", "\"")]
    fn test_escaped_identifier_missing_delimiter(#[case] input: &str, #[case] delimiter: &str) {
        assert_eq!(
            scan(input),
            Err(Some(Error::MissingDelimiter(delimiter.into())))
        );
    }

    #[rstest]
    #[case::spaces("  \t\n1", "1", true)]
    #[case::none("1", "1", false)]
    #[case::empty("", "", false)]
    fn test_skip_whitespace(#[case] input: &str, #[case] rest: &str, #[case] skipped: bool) {
        let (span, result) = skip_whitespace(Span::new(input));
        assert_eq!(*span.fragment(), rest);
        assert_eq!(result, skipped);
    }

    #[rstest]
    #[case("foo", true)]
    #[case("foo.bar", true)]
    #[case("_1", true)]
    #[case("1a", false)]
    #[case("foo.", false)]
    #[case("a b", false)]
    #[case("", false)]
    fn test_is_valid_identifier(#[case] name: &str, #[case] expected: bool) {
        assert_eq!(is_valid_identifier(name), expected);
    }

    #[rstest]
    #[case("+", true)]
    #[case("<=", true)]
    #[case("..<", true)]
    #[case("+a", false)]
    #[case("a", false)]
    #[case("", false)]
    fn test_is_valid_operator(#[case] name: &str, #[case] expected: bool) {
        assert_eq!(is_valid_operator(name), expected);
    }
}
