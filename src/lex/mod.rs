#[cfg(test)]
mod tests;

use std::{ascii, borrow::Cow, fmt};

use logos::{Lexer, Logos};

use crate::error::ParseErrorKind;

#[derive(Debug, Clone, Logos, PartialEq)]
#[logos(extras = TokenExtras)]
#[logos(skip r"[\t\v\f\r\n ]+")]
pub(crate) enum Token<'a> {
    #[regex("[A-Za-z_][A-Za-z0-9_]*")]
    Ident(&'a str),
    #[regex(r"[0-9]", number)]
    #[regex(r"\.[0-9]", number)]
    Number(Number),
    #[regex(r#"'|""#, string)]
    String(Cow<'a, [u8]>),
    #[token(".")]
    Dot,
    #[token("-")]
    Minus,
    #[token("+")]
    Plus,
    #[token("(")]
    LeftParen,
    #[token(")")]
    RightParen,
    #[token("{")]
    LeftBrace,
    #[token("}")]
    RightBrace,
    #[token("[")]
    LeftBracket,
    #[token("]")]
    RightBracket,
    #[token("<")]
    LeftAngleBracket,
    #[token(">")]
    RightAngleBracket,
    #[token(",")]
    Comma,
    #[token("=")]
    Equals,
    #[token(":")]
    Colon,
    #[token(";")]
    Semicolon,
    #[token("/")]
    ForwardSlash,
    #[regex(r"//[^\n]*", line_comment)]
    LineComment(Cow<'a, str>),
    #[token("/*", block_comment)]
    BlockComment(Cow<'a, str>),
}

/// A decoded numeric literal.
///
/// A lexeme which overflows `u64` is retried as a float, and a float whose
/// magnitude overflows `f64` saturates to infinity, so e.g. `1e9999` lexes
/// without error.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Number {
    Int(u64),
    Float(f64),
}

impl Token<'_> {
    pub const SYNTAX: Token<'static> = Token::Ident("syntax");
    pub const PACKAGE: Token<'static> = Token::Ident("package");
    pub const IMPORT: Token<'static> = Token::Ident("import");
    pub const WEAK: Token<'static> = Token::Ident("weak");
    pub const PUBLIC: Token<'static> = Token::Ident("public");
    pub const ENUM: Token<'static> = Token::Ident("enum");
    pub const OPTION: Token<'static> = Token::Ident("option");
    pub const SERVICE: Token<'static> = Token::Ident("service");
    pub const RPC: Token<'static> = Token::Ident("rpc");
    pub const STREAM: Token<'static> = Token::Ident("stream");
    pub const RETURNS: Token<'static> = Token::Ident("returns");
    pub const EXTEND: Token<'static> = Token::Ident("extend");
    pub const MESSAGE: Token<'static> = Token::Ident("message");
    pub const OPTIONAL: Token<'static> = Token::Ident("optional");
    pub const REQUIRED: Token<'static> = Token::Ident("required");
    pub const REPEATED: Token<'static> = Token::Ident("repeated");
    pub const MAP: Token<'static> = Token::Ident("map");
    pub const ONEOF: Token<'static> = Token::Ident("oneof");
    pub const GROUP: Token<'static> = Token::Ident("group");
    pub const DOUBLE: Token<'static> = Token::Ident("double");
    pub const FLOAT: Token<'static> = Token::Ident("float");
    pub const INT32: Token<'static> = Token::Ident("int32");
    pub const INT64: Token<'static> = Token::Ident("int64");
    pub const UINT32: Token<'static> = Token::Ident("uint32");
    pub const UINT64: Token<'static> = Token::Ident("uint64");
    pub const SINT32: Token<'static> = Token::Ident("sint32");
    pub const SINT64: Token<'static> = Token::Ident("sint64");
    pub const FIXED32: Token<'static> = Token::Ident("fixed32");
    pub const FIXED64: Token<'static> = Token::Ident("fixed64");
    pub const SFIXED32: Token<'static> = Token::Ident("sfixed32");
    pub const SFIXED64: Token<'static> = Token::Ident("sfixed64");
    pub const BOOL: Token<'static> = Token::Ident("bool");
    pub const STRING: Token<'static> = Token::Ident("string");
    pub const BYTES: Token<'static> = Token::Ident("bytes");
    pub const RESERVED: Token<'static> = Token::Ident("reserved");
    pub const EXTENSIONS: Token<'static> = Token::Ident("extensions");
    pub const TO: Token<'static> = Token::Ident("to");
    pub const MAX: Token<'static> = Token::Ident("max");
    pub const INF: Token<'static> = Token::Ident("inf");
    pub const NAN: Token<'static> = Token::Ident("nan");

    /// Whether this token detaches a pending comment group from the next
    /// declaration. Every punctuation rune other than '.' does.
    pub fn is_detaching_punctuation(&self) -> bool {
        matches!(
            self,
            Token::Minus
                | Token::Plus
                | Token::LeftParen
                | Token::RightParen
                | Token::LeftBrace
                | Token::RightBrace
                | Token::LeftBracket
                | Token::RightBracket
                | Token::LeftAngleBracket
                | Token::RightAngleBracket
                | Token::Comma
                | Token::Equals
                | Token::Colon
                | Token::Semicolon
                | Token::ForwardSlash
        )
    }
}

impl fmt::Display for Token<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Ident(value) => write!(f, "{}", value),
            Token::Number(Number::Int(value)) => write!(f, "{}", value),
            Token::Number(Number::Float(value)) => {
                if value.fract() == 0.0 {
                    write!(f, "{:.1}", value)
                } else {
                    write!(f, "{}", value)
                }
            }
            Token::String(bytes) => {
                write!(f, "\"")?;
                for &ch in bytes.as_ref() {
                    write!(f, "{}", ascii::escape_default(ch))?;
                }
                write!(f, "\"")
            }
            Token::Dot => write!(f, "."),
            Token::Minus => write!(f, "-"),
            Token::Plus => write!(f, "+"),
            Token::LeftParen => write!(f, "("),
            Token::RightParen => write!(f, ")"),
            Token::LeftBrace => write!(f, "{{"),
            Token::RightBrace => write!(f, "}}"),
            Token::LeftBracket => write!(f, "["),
            Token::RightBracket => write!(f, "]"),
            Token::LeftAngleBracket => write!(f, "<"),
            Token::RightAngleBracket => write!(f, ">"),
            Token::Comma => write!(f, ","),
            Token::Equals => write!(f, "="),
            Token::Colon => write!(f, ":"),
            Token::Semicolon => write!(f, ";"),
            Token::ForwardSlash => write!(f, "/"),
            Token::LineComment(value) => write!(f, "//{}", value),
            Token::BlockComment(value) => write!(f, "/*{}*/", value),
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct TokenExtras {
    pub errors: Vec<ParseErrorKind>,
}

/// Scans the remainder of a numeric lexeme and decodes it.
///
/// The scan is a greedy run over `[0-9a-zA-Z._+-]` where a sign is only
/// accepted immediately after an exponent character, as in protoc.
/// Decoding dispatches on the lexeme: `0x`/`0X` prefixed lexemes
/// are hexadecimal, lexemes containing `.`, `e` or `E` are floats, lexemes
/// with a leading `0` are octal and anything else is decimal.
fn number<'a>(lex: &mut Lexer<'a, Token<'a>>) -> Number {
    let mut allow_sign = false;
    let mut len = 0;
    for &ch in lex.remainder().as_bytes() {
        match ch {
            b'+' | b'-' if !allow_sign => break,
            b'e' | b'E' => {
                allow_sign = true;
                len += 1;
            }
            b'0'..=b'9' | b'a'..=b'z' | b'A'..=b'Z' | b'.' | b'_' | b'+' | b'-' => {
                allow_sign = false;
                len += 1;
            }
            _ => break,
        }
    }
    lex.bump(len);

    let token = lex.slice();
    let span = lex.span();

    if let Some(hex) = token.strip_prefix("0x").or_else(|| token.strip_prefix("0X")) {
        return match u64::from_str_radix(hex, 16) {
            Ok(value) => Number::Int(value),
            Err(err) => {
                let kind = "hexadecimal integer";
                if err.kind() == &std::num::IntErrorKind::PosOverflow {
                    lex.extras.errors.push(ParseErrorKind::IntegerOutOfRange {
                        kind,
                        lexeme: hex.to_owned(),
                        span,
                    });
                } else {
                    lex.extras.errors.push(ParseErrorKind::InvalidNumber {
                        kind,
                        lexeme: token.to_owned(),
                        span,
                    });
                }
                Number::Int(0)
            }
        };
    }

    if token.contains('.') || token.contains('e') || token.contains('E') {
        return match parse_float(token) {
            Some(value) => Number::Float(value),
            None => {
                lex.extras.errors.push(ParseErrorKind::InvalidNumber {
                    kind: "float",
                    lexeme: token.to_owned(),
                    span,
                });
                Number::Float(0.0)
            }
        };
    }

    let (base, kind) = if token.starts_with('0') {
        (8, "octal integer")
    } else {
        (10, "integer")
    };
    match u64::from_str_radix(token, base) {
        Ok(value) => Number::Int(value),
        Err(err) => {
            if err.kind() == &std::num::IntErrorKind::PosOverflow {
                // Too big for an integer, but protoc accepts it as a
                // float.
                if let Some(value) = parse_float(token) {
                    return Number::Float(value);
                }
                lex.extras.errors.push(ParseErrorKind::IntegerOutOfRange {
                    kind,
                    lexeme: token.to_owned(),
                    span,
                });
            } else {
                lex.extras.errors.push(ParseErrorKind::InvalidNumber {
                    kind,
                    lexeme: token.to_owned(),
                    span,
                });
            }
            Number::Int(0)
        }
    }
}

fn parse_float(token: &str) -> Option<f64> {
    // Rust permits '_' separators in neither int nor float parsing, but be
    // explicit since the greedy scan accepts them into the lexeme.
    if token.contains('_') {
        return None;
    }
    // f64 parsing saturates to infinity on overflow.
    token.parse().ok()
}

fn string<'a>(lex: &mut Lexer<'a, Token<'a>>) -> Cow<'a, [u8]> {
    #[derive(Logos)]
    #[logos(subpattern hex = r"[0-9A-Fa-f]")]
    enum Component<'a> {
        #[regex(r#"[^\x00\n\\'"]+"#)]
        Unescaped(&'a str),
        #[regex(r#"['"]"#, terminator)]
        Terminator(u8),
        #[regex(r#"\\[xX](?&hex)(?&hex)?"#, hex_escape)]
        #[regex(r#"\\[0-7][0-7]?[0-7]?"#, oct_escape)]
        #[regex(r#"\\[abfnrtv?\\'"]"#, char_escape)]
        Byte(u8),
        #[regex(r#"\\u(?&hex)(?&hex)(?&hex)(?&hex)"#, short_unicode_escape)]
        #[regex(
            r#"\\U(?&hex)(?&hex)(?&hex)(?&hex)(?&hex)(?&hex)(?&hex)(?&hex)"#,
            long_unicode_escape
        )]
        Char(char),
    }

    fn terminator<'a>(lex: &mut Lexer<'a, Component<'a>>) -> u8 {
        debug_assert_eq!(lex.slice().len(), 1);
        lex.slice().as_bytes()[0]
    }

    fn hex_escape<'a>(lex: &mut Lexer<'a, Component<'a>>) -> u8 {
        u8::from_str_radix(&lex.slice()[2..], 16).expect("expected valid hex escape")
    }

    fn oct_escape<'a>(lex: &mut Lexer<'a, Component<'a>>) -> Result<u8, ()> {
        u32::from_str_radix(&lex.slice()[1..], 8)
            .expect("expected valid octal escape")
            .try_into()
            .map_err(drop)
    }

    fn char_escape<'a>(lex: &mut Lexer<'a, Component<'a>>) -> u8 {
        match lex.slice().as_bytes()[1] {
            b'a' => b'\x07',
            b'b' => b'\x08',
            b'f' => b'\x0c',
            b'n' => b'\n',
            b'r' => b'\r',
            b't' => b'\t',
            b'v' => b'\x0b',
            b'?' => b'?',
            b'\\' => b'\\',
            b'\'' => b'\'',
            b'"' => b'"',
            _ => unreachable!("failed to parse char escape"),
        }
    }

    fn short_unicode_escape<'a>(lex: &mut Lexer<'a, Component<'a>>) -> char {
        let value = u32::from_str_radix(&lex.slice()[2..], 16).expect("expected valid hex escape");
        // Surrogate halves decode to the replacement character rather
        // than erroring, as protoc does.
        char::from_u32(value).unwrap_or(char::REPLACEMENT_CHARACTER)
    }

    fn long_unicode_escape<'a>(lex: &mut Lexer<'a, Component<'a>>) -> Result<char, ()> {
        let value = u32::from_str_radix(&lex.slice()[2..], 16).expect("expected valid hex escape");
        if value > 0x10ffff {
            Err(())
        } else {
            Ok(char::from_u32(value).unwrap_or(char::REPLACEMENT_CHARACTER))
        }
    }

    let mut result: Option<Cow<'a, [u8]>> = None;

    let mut char_lexer = Component::lexer(lex.remainder());
    let terminator = lex.slice().as_bytes()[0];

    loop {
        match char_lexer.next() {
            Some(Ok(Component::Unescaped(s))) => cow_push_bytes(&mut result, s.as_bytes()),
            Some(Ok(Component::Terminator(t))) if t == terminator => {
                break;
            }
            Some(Ok(Component::Terminator(ch) | Component::Byte(ch))) => {
                result.get_or_insert_with(Cow::default).to_mut().push(ch)
            }
            Some(Ok(Component::Char(ch))) => {
                let mut buf = [0; 4];
                let ch = ch.encode_utf8(&mut buf);
                result
                    .get_or_insert_with(Cow::default)
                    .to_mut()
                    .extend_from_slice(ch.as_bytes())
            }
            Some(Err(())) => {
                let start = lex.span().end + char_lexer.span().start;
                let end = lex.span().end + char_lexer.span().end;
                let slice = char_lexer.slice();

                if slice.contains('\n') {
                    lex.extras
                        .errors
                        .push(ParseErrorKind::UnterminatedString { span: start..end });
                    break;
                } else if slice == "\0" {
                    lex.extras
                        .errors
                        .push(ParseErrorKind::NulInString { span: start..end });
                } else if slice.len() == 4 && slice.starts_with('\\') && slice[1..].bytes().all(|b| (b'0'..=b'7').contains(&b)) {
                    lex.extras
                        .errors
                        .push(ParseErrorKind::OctalEscapeOutOfRange { span: start..end });
                } else if slice.len() == 10 && slice.starts_with("\\U") {
                    lex.extras
                        .errors
                        .push(ParseErrorKind::UnicodeEscapeOutOfRange { span: start..end });
                } else {
                    match lex.extras.errors.last_mut() {
                        Some(ParseErrorKind::InvalidStringEscape { span: err_span })
                            if err_span.end == start =>
                        {
                            // Extend the span of the previous error rather
                            // than reporting each character separately.
                            *err_span = err_span.start..end;
                        }
                        _ => {
                            lex.extras
                                .errors
                                .push(ParseErrorKind::InvalidStringEscape { span: start..end });
                        }
                    }
                }
            }
            None => {
                lex.extras.errors.push(ParseErrorKind::UnexpectedEof {
                    expected: "string terminator".to_owned(),
                });
                break;
            }
        }
    }

    lex.bump(char_lexer.span().end);
    result.unwrap_or_default()
}

fn line_comment<'a>(lex: &mut Lexer<'a, Token<'a>>) -> Cow<'a, str> {
    let content = &lex.slice()[2..];
    if let Some(idx) = content.find('\0') {
        let start = lex.span().start + 2 + idx;
        lex.extras
            .errors
            .push(ParseErrorKind::InvalidControlCharacter {
                span: start..start + 1,
            });
    }
    Cow::Borrowed(content)
}

fn block_comment<'a>(lex: &mut Lexer<'a, Token<'a>>) -> Cow<'a, str> {
    let remainder = lex.remainder();
    let (content, len) = match remainder.find("*/") {
        Some(idx) => (&remainder[..idx], idx + 2),
        None => {
            lex.extras
                .errors
                .push(ParseErrorKind::UnterminatedBlockComment { span: lex.span() });
            (remainder, remainder.len())
        }
    };

    if let Some(idx) = content.find('\0') {
        let start = lex.span().end + idx;
        lex.extras
            .errors
            .push(ParseErrorKind::InvalidControlCharacter {
                span: start..start + 1,
            });
    }

    lex.bump(len);
    Cow::Borrowed(content)
}

fn cow_push_bytes<'a>(cow: &mut Option<Cow<'a, [u8]>>, s: &'a [u8]) {
    match cow {
        Some(cow) => cow.to_mut().extend_from_slice(s),
        None => *cow = Some(Cow::Borrowed(s)),
    }
}
