//! Character classes used by the scanner.
//!
//! The identifier and operator classes follow the Swift lexical grammar, so
//! expressions may use letters from any script and mathematical symbols as
//! operator names.

pub fn is_whitespace(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\r')
}

/// Characters that may start an identifier.
pub fn is_identifier_head(c: char) -> bool {
    matches!(
        c,
        'a'..='z'
            | 'A'..='Z'
            | '_'
            | '#'
            | '$'
            | '@'
            | '\u{00A8}'
            | '\u{00AA}'
            | '\u{00AD}'
            | '\u{00AF}'
            | '\u{00B2}'..='\u{00B5}'
            | '\u{00B7}'..='\u{00BA}'
            | '\u{00BC}'..='\u{00BE}'
            | '\u{00C0}'..='\u{00D6}'
            | '\u{00D8}'..='\u{00F6}'
            | '\u{00F8}'..='\u{00FF}'
            | '\u{0100}'..='\u{02FF}'
            | '\u{0370}'..='\u{167F}'
            | '\u{1681}'..='\u{180D}'
            | '\u{180F}'..='\u{1DBF}'
            | '\u{1E00}'..='\u{1FFF}'
            | '\u{200B}'..='\u{200D}'
            | '\u{202A}'..='\u{202E}'
            | '\u{203F}'..='\u{2040}'
            | '\u{2054}'
            | '\u{2060}'..='\u{206F}'
            | '\u{2070}'..='\u{20CF}'
            | '\u{2100}'..='\u{218F}'
            | '\u{2460}'..='\u{24FF}'
            | '\u{2776}'..='\u{2793}'
            | '\u{2C00}'..='\u{2DFF}'
            | '\u{2E80}'..='\u{2FFF}'
            | '\u{3004}'..='\u{3007}'
            | '\u{3021}'..='\u{302F}'
            | '\u{3031}'..='\u{303F}'
            | '\u{3040}'..='\u{D7FF}'
            | '\u{F900}'..='\u{FD3D}'
            | '\u{FD40}'..='\u{FDCF}'
            | '\u{FDF0}'..='\u{FE1F}'
            | '\u{FE30}'..='\u{FE44}'
            | '\u{FE47}'..='\u{FFFD}'
            | '\u{10000}'..='\u{1FFFD}'
            | '\u{20000}'..='\u{2FFFD}'
            | '\u{30000}'..='\u{3FFFD}'
            | '\u{40000}'..='\u{4FFFD}'
            | '\u{50000}'..='\u{5FFFD}'
            | '\u{60000}'..='\u{6FFFD}'
            | '\u{70000}'..='\u{7FFFD}'
            | '\u{80000}'..='\u{8FFFD}'
            | '\u{90000}'..='\u{9FFFD}'
            | '\u{A0000}'..='\u{AFFFD}'
            | '\u{B0000}'..='\u{BFFFD}'
            | '\u{C0000}'..='\u{CFFFD}'
            | '\u{D0000}'..='\u{DFFFD}'
            | '\u{E0000}'..='\u{EFFFD}'
    )
}

/// Characters that may continue an identifier.
pub fn is_identifier_tail(c: char) -> bool {
    is_identifier_head(c)
        || matches!(
            c,
            '0'..='9'
                | '\u{0300}'..='\u{036F}'
                | '\u{1DC0}'..='\u{1DFF}'
                | '\u{20D0}'..='\u{20FF}'
                | '\u{FE20}'..='\u{FE2F}'
        )
}

/// Characters an operator may be built from. `.` is handled separately since it
/// is only allowed at the start of an operator.
pub fn is_operator_char(c: char) -> bool {
    matches!(
        c,
        '/' | '='
            | '-'
            | '+'
            | '!'
            | '*'
            | '%'
            | '<'
            | '>'
            | '&'
            | '|'
            | '^'
            | '~'
            | '?'
            | ':'
            | '\u{00A1}'..='\u{00A7}'
            | '\u{00A9}'
            | '\u{00AB}'
            | '\u{00AC}'
            | '\u{00AE}'
            | '\u{00B0}'..='\u{00B1}'
            | '\u{00B6}'
            | '\u{00BB}'
            | '\u{00BF}'
            | '\u{00D7}'
            | '\u{00F7}'
            | '\u{2016}'..='\u{2017}'
            | '\u{2020}'..='\u{2027}'
            | '\u{2030}'..='\u{203E}'
            | '\u{2041}'..='\u{2053}'
            | '\u{2055}'..='\u{205E}'
            | '\u{2190}'..='\u{23FF}'
            | '\u{2500}'..='\u{2775}'
            | '\u{2794}'..='\u{2BFF}'
            | '\u{2E00}'..='\u{2E7F}'
            | '\u{3001}'..='\u{3003}'
            | '\u{3008}'..='\u{3020}'
            | '\u{3030}'
            | '\u{0300}'..='\u{036F}'
            | '\u{1DC0}'..='\u{1DFF}'
            | '\u{20D0}'..='\u{20FF}'
            | '\u{FE00}'..='\u{FE0F}'
            | '\u{FE20}'..='\u{FE2F}'
            | '\u{E0100}'..='\u{E01EF}'
    )
}
