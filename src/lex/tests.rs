use super::*;

#[test]
fn simple_tokens() {
    let source = r#"hell0 052 42 0x2A 5. 0.5 0.42e+2 2e-4 .2e+3
        "hello \a\b\f\n\r\t\v\?\\\'\" \052 \x2a" 'hello 😀' _foo"#;
    let mut lexer = Token::lexer(source);

    assert_eq!(lexer.next().unwrap(), Ok(Token::Ident("hell0")));
    assert_eq!(lexer.next().unwrap(), Ok(Token::Number(Number::Int(42))));
    assert_eq!(lexer.next().unwrap(), Ok(Token::Number(Number::Int(42))));
    assert_eq!(lexer.next().unwrap(), Ok(Token::Number(Number::Int(42))));
    assert_eq!(lexer.next().unwrap(), Ok(Token::Number(Number::Float(5.))));
    assert_eq!(lexer.next().unwrap(), Ok(Token::Number(Number::Float(0.5))));
    assert_eq!(
        lexer.next().unwrap(),
        Ok(Token::Number(Number::Float(0.42e+2)))
    );
    assert_eq!(
        lexer.next().unwrap(),
        Ok(Token::Number(Number::Float(2e-4)))
    );
    assert_eq!(
        lexer.next().unwrap(),
        Ok(Token::Number(Number::Float(0.2e+3)))
    );
    assert_eq!(
        lexer.next().unwrap(),
        Ok(Token::String(
            b"hello \x07\x08\x0c\n\r\t\x0b?\\'\" * *".as_slice().into()
        ))
    );
    assert_eq!(
        lexer.next().unwrap(),
        Ok(Token::String("hello 😀".as_bytes().into()))
    );
    assert_eq!(lexer.next().unwrap(), Ok(Token::Ident("_foo")));
    assert_eq!(lexer.next(), None);

    assert_eq!(lexer.extras.errors, vec![]);
}

#[test]
fn greedy_number_scan() {
    // A sign is only accepted directly after an exponent character.
    let source = "1e+5+3 1.2.3";
    let mut lexer = Token::lexer(source);

    assert_eq!(lexer.next().unwrap(), Ok(Token::Number(Number::Float(1e5))));
    assert_eq!(lexer.next().unwrap(), Ok(Token::Plus));
    assert_eq!(lexer.next().unwrap(), Ok(Token::Number(Number::Int(3))));
    assert_eq!(
        lexer.next().unwrap(),
        Ok(Token::Number(Number::Float(0.0)))
    );
    assert_eq!(lexer.next(), None);

    assert_eq!(
        lexer.extras.errors,
        vec![ParseErrorKind::InvalidNumber {
            kind: "float",
            lexeme: "1.2.3".to_owned(),
            span: 7..12,
        }]
    );
}

#[test]
fn hex_literals() {
    let mut lexer = Token::lexer("0xFFFFFFFFFFFFFFFF");
    assert_eq!(
        lexer.next().unwrap(),
        Ok(Token::Number(Number::Int(u64::MAX)))
    );
    assert_eq!(lexer.next(), None);
    assert_eq!(lexer.extras.errors, vec![]);

    let mut lexer = Token::lexer("0x10000000000000000");
    assert_eq!(lexer.next().unwrap(), Ok(Token::Number(Number::Int(0))));
    assert_eq!(lexer.next(), None);
    assert_eq!(
        lexer.extras.errors,
        vec![ParseErrorKind::IntegerOutOfRange {
            kind: "hexadecimal integer",
            lexeme: "10000000000000000".to_owned(),
            span: 0..19,
        }]
    );

    let mut lexer = Token::lexer("0x1_0000_0000_0000_0000");
    assert_eq!(lexer.next().unwrap(), Ok(Token::Number(Number::Int(0))));
    assert_eq!(lexer.next(), None);
    assert_eq!(
        lexer.extras.errors,
        vec![ParseErrorKind::InvalidNumber {
            kind: "hexadecimal integer",
            lexeme: "0x1_0000_0000_0000_0000".to_owned(),
            span: 0..23,
        }]
    );
}

#[test]
fn float_overflow_is_infinity() {
    let mut lexer = Token::lexer("1e9999");
    assert_eq!(
        lexer.next().unwrap(),
        Ok(Token::Number(Number::Float(f64::INFINITY)))
    );
    assert_eq!(lexer.next(), None);
    assert_eq!(lexer.extras.errors, vec![]);
}

#[test]
fn decimal_overflow_becomes_float() {
    // 2^64 does not fit an integer literal, but lexes as a float.
    let mut lexer = Token::lexer("18446744073709551616");
    assert_eq!(
        lexer.next().unwrap(),
        Ok(Token::Number(Number::Float(18446744073709551616.0)))
    );
    assert_eq!(lexer.next(), None);
    assert_eq!(lexer.extras.errors, vec![]);
}

#[test]
fn octal_literals() {
    let mut lexer = Token::lexer("0 0755 08");
    assert_eq!(lexer.next().unwrap(), Ok(Token::Number(Number::Int(0))));
    assert_eq!(lexer.next().unwrap(), Ok(Token::Number(Number::Int(0o755))));
    assert_eq!(lexer.next().unwrap(), Ok(Token::Number(Number::Int(0))));
    assert_eq!(lexer.next(), None);
    assert_eq!(
        lexer.extras.errors,
        vec![ParseErrorKind::InvalidNumber {
            kind: "octal integer",
            lexeme: "08".to_owned(),
            span: 7..9,
        }]
    );
}

#[test]
fn dot_is_a_token_unless_followed_by_digit() {
    let mut lexer = Token::lexer(".foo .5");
    assert_eq!(lexer.next().unwrap(), Ok(Token::Dot));
    assert_eq!(lexer.next().unwrap(), Ok(Token::Ident("foo")));
    assert_eq!(lexer.next().unwrap(), Ok(Token::Number(Number::Float(0.5))));
    assert_eq!(lexer.next(), None);
    assert_eq!(lexer.extras.errors, vec![]);
}

#[test]
fn string_escapes() {
    let mut lexer = Token::lexer(r#""\xFF\101\nA""#);
    assert_eq!(
        lexer.next().unwrap(),
        Ok(Token::String(b"\xFF\x41\n\x41".as_slice().into()))
    );
    assert_eq!(lexer.next(), None);
    assert_eq!(lexer.extras.errors, vec![]);
}

#[test]
fn string_single_digit_hex_escape() {
    // \x followed by a single hex digit is accepted.
    let mut lexer = Token::lexer(r#""\xaZ""#);
    assert_eq!(
        lexer.next().unwrap(),
        Ok(Token::String(b"\nZ".as_slice().into()))
    );
    assert_eq!(lexer.next(), None);
    assert_eq!(lexer.extras.errors, vec![]);
}

#[test]
fn string_long_unicode_escape() {
    let mut lexer = Token::lexer(r#""\U0001F600""#);
    assert_eq!(
        lexer.next().unwrap(),
        Ok(Token::String("😀".as_bytes().into()))
    );
    assert_eq!(lexer.next(), None);
    assert_eq!(lexer.extras.errors, vec![]);

    let mut lexer = Token::lexer(r#""\U00110000""#);
    assert_eq!(lexer.next().unwrap(), Ok(Token::String(b"".as_slice().into())));
    assert_eq!(lexer.next(), None);
    assert_eq!(
        lexer.extras.errors,
        vec![ParseErrorKind::UnicodeEscapeOutOfRange { span: 1..11 }]
    );
}

#[test]
fn string_surrogate_escape_is_replacement_char() {
    let mut lexer = Token::lexer(r#""\ud800""#);
    assert_eq!(
        lexer.next().unwrap(),
        Ok(Token::String("\u{fffd}".as_bytes().into()))
    );
    assert_eq!(lexer.next(), None);
    assert_eq!(lexer.extras.errors, vec![]);
}

#[test]
fn string_octal_escape_out_of_range() {
    let mut lexer = Token::lexer(r#""\400""#);
    assert_eq!(lexer.next().unwrap(), Ok(Token::String(b"".as_slice().into())));
    assert_eq!(lexer.next(), None);
    assert_eq!(
        lexer.extras.errors,
        vec![ParseErrorKind::OctalEscapeOutOfRange { span: 1..5 }]
    );
}

#[test]
fn string_nul_character() {
    let mut lexer = Token::lexer("\"\0\" foo");
    assert_eq!(lexer.next().unwrap(), Ok(Token::String(b"".as_slice().into())));
    assert_eq!(lexer.next().unwrap(), Ok(Token::Ident("foo")));
    assert_eq!(lexer.next(), None);
    assert_eq!(
        lexer.extras.errors,
        vec![ParseErrorKind::NulInString { span: 1..2 }]
    );
}

#[test]
fn unterminated_string() {
    let source = "\"hello \n foo";
    let mut lexer = Token::lexer(source);
    assert_eq!(
        lexer.next().unwrap(),
        Ok(Token::String(b"hello ".as_slice().into()))
    );
    assert_eq!(lexer.next().unwrap(), Ok(Token::Ident("foo")));
    assert_eq!(lexer.next(), None);
    assert_eq!(
        lexer.extras.errors,
        vec![ParseErrorKind::UnterminatedString { span: 7..8 }]
    );
}

#[test]
fn string_eof_before_terminator() {
    let mut lexer = Token::lexer("\"hello");
    assert_eq!(
        lexer.next().unwrap(),
        Ok(Token::String(b"hello".as_slice().into()))
    );
    assert_eq!(lexer.next(), None);
    assert_eq!(
        lexer.extras.errors,
        vec![ParseErrorKind::UnexpectedEof {
            expected: "string terminator".to_owned(),
        }]
    );
}

#[test]
fn invalid_string_escape() {
    let mut lexer = Token::lexer(r#""\m" foo"#);
    assert_eq!(lexer.next().unwrap(), Ok(Token::String(b"m".as_slice().into())));
    assert_eq!(lexer.next().unwrap(), Ok(Token::Ident("foo")));
    assert_eq!(lexer.next(), None);
    assert_eq!(
        lexer.extras.errors,
        vec![ParseErrorKind::InvalidStringEscape { span: 1..2 }]
    );
}

#[test]
fn mismatched_quotes() {
    // A quote of the other style is an ordinary character.
    let mut lexer = Token::lexer(r#"'say "hi"'"#);
    assert_eq!(
        lexer.next().unwrap(),
        Ok(Token::String(b"say \"hi\"".as_slice().into()))
    );
    assert_eq!(lexer.next(), None);
    assert_eq!(lexer.extras.errors, vec![]);
}

#[test]
fn line_comment() {
    let source = "foo // bar \n quz";
    let mut lexer = Token::lexer(source);
    assert_eq!(lexer.next().unwrap(), Ok(Token::Ident("foo")));
    assert_eq!(lexer.next().unwrap(), Ok(Token::LineComment(" bar ".into())));
    assert_eq!(lexer.next().unwrap(), Ok(Token::Ident("quz")));
    assert_eq!(lexer.next(), None);
    assert_eq!(lexer.extras.errors, vec![]);
}

#[test]
fn block_comment() {
    let source = "foo /* bar\n */ quz";
    let mut lexer = Token::lexer(source);
    assert_eq!(lexer.next().unwrap(), Ok(Token::Ident("foo")));
    assert_eq!(
        lexer.next().unwrap(),
        Ok(Token::BlockComment(" bar\n ".into()))
    );
    assert_eq!(lexer.next().unwrap(), Ok(Token::Ident("quz")));
    assert_eq!(lexer.next(), None);
    assert_eq!(lexer.extras.errors, vec![]);
}

#[test]
fn block_comment_unterminated() {
    let source = "foo /* bar";
    let mut lexer = Token::lexer(source);
    assert_eq!(lexer.next().unwrap(), Ok(Token::Ident("foo")));
    assert_eq!(lexer.next().unwrap(), Ok(Token::BlockComment(" bar".into())));
    assert_eq!(lexer.next(), None);
    assert_eq!(
        lexer.extras.errors,
        vec![ParseErrorKind::UnterminatedBlockComment { span: 4..6 }]
    );
}

#[test]
fn forward_slash_is_a_token() {
    let mut lexer = Token::lexer("foo / bar");
    assert_eq!(lexer.next().unwrap(), Ok(Token::Ident("foo")));
    assert_eq!(lexer.next().unwrap(), Ok(Token::ForwardSlash));
    assert_eq!(lexer.next().unwrap(), Ok(Token::Ident("bar")));
    assert_eq!(lexer.next(), None);
    assert_eq!(lexer.extras.errors, vec![]);
}

#[test]
fn invalid_token() {
    let mut lexer = Token::lexer("@ foo");
    assert_eq!(lexer.next(), Some(Err(())));
    assert_eq!(lexer.next().unwrap(), Ok(Token::Ident("foo")));
    assert_eq!(lexer.next(), None);
    assert_eq!(lexer.extras.errors, vec![]);
}

#[test]
fn token_spans_cover_lexemes() {
    let source = "syntax = \"proto3\";";
    let mut lexer = Token::lexer(source);

    let mut reconstructed = String::new();
    let mut last_end = 0;
    while let Some(result) = lexer.next() {
        result.expect("unexpected lex error");
        let span = lexer.span();
        assert!(span.start >= last_end);
        reconstructed.push_str(&source[last_end..span.start]);
        reconstructed.push_str(&source[span.clone()]);
        last_end = span.end;
    }
    reconstructed.push_str(&source[last_end..]);
    assert_eq!(reconstructed, source);
    assert_eq!(lexer.extras.errors, vec![]);
}
