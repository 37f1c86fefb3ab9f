use super::*;
use crate::{lines::LineResolver, report::Tolerant};

fn parse(source: &str) -> Result<ast::File, Vec<ParseErrorKind>> {
    let lines = LineResolver::new(source);
    let mut reporter = Tolerant::new();
    let (file, errors) = parse_file("test.proto", source, &lines, &mut reporter);
    if errors.is_empty() {
        Ok(file)
    } else {
        Err(errors)
    }
}

fn parse_err(source: &str) -> Vec<ParseErrorKind> {
    parse(source).expect_err("expected parse to fail")
}

fn expects_semicolon(source: &str) {
    let errors = parse_err(source);
    assert!(
        matches!(&errors[0], ParseErrorKind::UnexpectedToken { expected, .. } if expected == "';'"),
        "expected missing-semicolon error, got {:?}",
        errors,
    );
}

#[test]
fn parse_empty_file() {
    let file = parse("").unwrap();
    assert_eq!(file.syntax, ast::Syntax::Proto2);
    assert_eq!(file.syntax_span, None);
    assert_eq!(file.package, None);
    assert!(file.imports.is_empty());
    assert!(file.items.is_empty());
}

#[test]
fn parse_syntax() {
    let file = parse("syntax = \"proto3\";").unwrap();
    assert_eq!(file.syntax, ast::Syntax::Proto3);
    assert!(file.syntax_span.is_some());

    let file = parse("syntax = 'proto2';").unwrap();
    assert_eq!(file.syntax, ast::Syntax::Proto2);

    // Adjacent string literals concatenate.
    let file = parse("syntax = 'pro' \"to3\";").unwrap();
    assert_eq!(file.syntax, ast::Syntax::Proto3);

    let errors = parse_err("syntax = 'proto4';");
    assert_eq!(
        errors,
        vec![ParseErrorKind::UnknownSyntax {
            syntax: "proto4".to_owned(),
            span: 9..17,
        }]
    );
}

#[test]
fn parse_package() {
    let file = parse("package foo.bar.baz;").unwrap();
    assert_eq!(file.package.as_ref().unwrap().name.to_string(), "foo.bar.baz");

    let errors = parse_err("package a; package b;");
    assert_eq!(
        errors,
        vec![ParseErrorKind::DuplicatePackage {
            first: 8..9,
            second: 19..20,
        }]
    );
}

#[test]
fn parse_import() {
    let file = parse("import 'a.proto'; import weak 'b.proto'; import public 'c.proto';").unwrap();
    assert_eq!(file.imports.len(), 3);
    assert_eq!(file.imports[0].kind, None);
    assert_eq!(file.imports[0].value.value, b"a.proto");
    assert!(matches!(
        file.imports[1].kind,
        Some((ast::ImportKind::Weak, _))
    ));
    assert!(matches!(
        file.imports[2].kind,
        Some((ast::ImportKind::Public, _))
    ));
}

#[test]
fn parse_message_fields() {
    let file = parse(
        "message M {
            int32 x = 1;
            optional string name = 2;
            repeated .foo.Bar bars = 3;
            Nested nested = 4;
        }",
    )
    .unwrap();

    let message = match &file.items[0] {
        ast::FileItem::Message(message) => message,
        item => panic!("expected message, got {:?}", item),
    };
    assert_eq!(message.name.value, "M");
    assert_eq!(message.body.items.len(), 4);

    match &message.body.items[2] {
        ast::MessageItem::Field(field) => {
            assert!(matches!(field.label, Some((ast::FieldLabel::Repeated, _))));
            match &field.kind {
                ast::FieldKind::Normal {
                    ty: ast::Ty::Named(name),
                    ..
                } => assert_eq!(name.to_string(), ".foo.Bar"),
                kind => panic!("expected named type, got {:?}", kind),
            }
        }
        item => panic!("expected field, got {:?}", item),
    }
}

#[test]
fn keywords_are_identifiers() {
    // Keywords are accepted wherever an identifier is grammatical.
    let file = parse(
        "message message {
            int32 map = 1;
            optional int32 option_value = 2;
            int32 group_ = 3;
            int32 reserved_ = 4;
        }",
    )
    .unwrap();
    let message = match &file.items[0] {
        ast::FileItem::Message(message) => message,
        item => panic!("expected message, got {:?}", item),
    };
    assert_eq!(message.name.value, "message");

    let file = parse("enum enum { syntax = 0; }").unwrap();
    match &file.items[0] {
        ast::FileItem::Enum(enum_) => {
            assert_eq!(enum_.name.value, "enum");
            assert_eq!(enum_.values[0].name.value, "syntax");
        }
        item => panic!("expected enum, got {:?}", item),
    }

    let file = parse("service service { rpc rpc (weak) returns (returns); }").unwrap();
    match &file.items[0] {
        ast::FileItem::Service(service) => {
            assert_eq!(service.name.value, "service");
            assert_eq!(service.methods[0].name.value, "rpc");
            assert_eq!(service.methods[0].input_ty.to_string(), "weak");
            assert_eq!(service.methods[0].output_ty.to_string(), "returns");
        }
        item => panic!("expected service, got {:?}", item),
    }
}

#[test]
fn missing_semicolons_are_errors() {
    expects_semicolon("syntax = \"proto3\"\nmessage Foo {}");
    expects_semicolon("syntax = \"proto3\"; package foo\nmessage Foo {}");
    expects_semicolon("syntax = \"proto3\"; import \"foo.proto\"\nmessage Foo {}");
    expects_semicolon("syntax = \"proto3\"; option (foo) = 1\nmessage Foo {}");
    expects_semicolon("message Foo { int32 bar = 1 }");
    expects_semicolon("message Foo { repeated int32 bar = 1 }");
    expects_semicolon("message Foo { int32 bar = 1 [foo = 1] }");
    expects_semicolon("message Foo { map<string, int32> bar = 1 }");
    expects_semicolon("message Foo { reserved \"FOO\" }");
    expects_semicolon("message Foo { option (foo) = 1 }");
    expects_semicolon("message Foo { oneof bar { int32 baz = 1 } }");
    expects_semicolon("extend Foo { int32 bar = 1 }");
    expects_semicolon("enum Foo { FOO = 0 }");
    expects_semicolon("enum Foo { FOO = 0 [foo = 1] }");
    expects_semicolon("enum Foo { option (foo) = 1 }");
    expects_semicolon("enum Foo { reserved \"FOO\" }");
    expects_semicolon("service Foo { rpc Bar (Baz) returns (Qux)\nrpc Qux (Baz) returns (Qux); }");
    expects_semicolon("service Foo { option (foo) = { bar: 1 } }");
    expects_semicolon(
        "service Foo { rpc Bar (Baz) returns (Qux) { option (foo) = { bar: 1 } } }",
    );
}

#[test]
fn stray_semicolons_are_lenient() {
    assert!(parse("syntax = \"proto3\";; message Foo {};").is_ok());
    assert!(parse("message Foo { ; int32 bar = 1;; };").is_ok());
    assert!(parse("enum Foo { ; FOO = 0;; };").is_ok());
    assert!(parse("service Foo { ; rpc Bar (A) returns (B);; };").is_ok());
    assert!(parse("message Foo { oneof bar { ; int32 baz = 1; }; }").is_ok());
    assert!(parse(
        "service Foo { rpc Bar (A) returns (B) { ; option (foo) = 1;; }; }"
    )
    .is_ok());
}

#[test]
fn empty_compact_options() {
    let errors = parse_err("message Foo { int32 bar = 1 []; }");
    assert_eq!(
        errors[0],
        ParseErrorKind::EmptyCompactOptions { span: 28..30 }
    );

    let errors = parse_err("enum Foo { FOO = 0 []; }");
    assert_eq!(
        errors[0],
        ParseErrorKind::EmptyCompactOptions { span: 19..21 }
    );
}

#[test]
fn compact_option_missing_value() {
    let source = "enum E { FOO = 0 [deprecated]; }";
    let errors = parse_err(source);
    let close = source.find(']').unwrap();
    assert_eq!(
        errors[0],
        ParseErrorKind::CompactOptionMissingValue {
            span: close..close + 1,
        }
    );

    let errors = parse_err(
        "message Foo { optional int32 bar = 1 [deprecated=true, default]; }",
    );
    assert!(matches!(
        errors[0],
        ParseErrorKind::CompactOptionMissingValue { .. }
    ));
}

#[test]
fn compact_options_trailing_comma() {
    let source = "message M { int32 x = 1 [default=1,]; }";
    let errors = parse_err(source);
    let comma = source.find(',').unwrap();
    assert_eq!(
        errors[0],
        ParseErrorKind::UnexpectedTrailingComma {
            span: comma..comma + 1,
        }
    );
}

#[test]
fn parse_options() {
    assert!(parse("option foo = 5;").is_ok());
    assert!(parse("option (foo.bar) = \"hello\";").is_ok());
    assert!(parse("option (foo).bar = true;").is_ok());
    assert!(parse("option foo.(bar.baz).qux = ident;").is_ok());
    assert!(parse("option ext.(.foo.bar) = 42;").is_ok());
    assert!(parse("option optimize_for = google.protobuf.SPEED;").is_ok());
    assert!(parse("option foo = -1.5;").is_ok());
    assert!(parse("option foo = -inf;").is_ok());
    assert!(parse("option foo = 'a' 'b';").is_ok());
    assert!(parse("option foo = {};").is_ok());
    assert!(parse("option (ext).foo = { foo: 5 };").is_ok());
    assert!(parse("option quz.(bar) = { foo: [blah] };").is_ok());
    assert!(parse("option baz = { foo: [<x:3>, <y{};z<a:-foo>,>] };").is_ok());
    assert!(parse("option any = { [type.googleapis.com/foo.bar]: { x: 1 } };").is_ok());

    assert!(parse("option ;").is_err());
    assert!(parse("option foo = =;").is_err());
    assert!(parse("option foo = -foo;").is_err());
    assert!(parse("option foo = {").is_err());
    assert!(parse("option foo = { x:1").is_err());
}

#[test]
fn message_literal_errors() {
    // Inputs that previously caused crashes in other implementations.
    assert!(parse("'';").is_err());
    assert!(parse(".").is_err());
    assert!(parse(
        "syntax = \"proto3\";
        message TestMessage {
          option (ext) = { bad_array: [1,] };
        }"
    )
    .is_err());
    assert!(parse(
        "syntax = \"proto3\";
        message TestMessage {
          option (ext) = { bad_array [ , ] };
        }"
    )
    .is_err());
}

#[test]
fn parse_oneof() {
    let file = parse(
        "message M {
            oneof value {
                int32 a = 1;
                string b = 2;
            }
        }",
    )
    .unwrap();
    let message = match &file.items[0] {
        ast::FileItem::Message(message) => message,
        item => panic!("expected message, got {:?}", item),
    };
    match &message.body.items[0] {
        ast::MessageItem::Oneof(oneof) => {
            assert_eq!(oneof.name.value, "value");
            assert_eq!(oneof.fields.len(), 2);
        }
        item => panic!("expected oneof, got {:?}", item),
    }

    let errors = parse_err("message M { oneof value { optional int32 a = 1; } }");
    assert!(matches!(
        errors[0],
        ParseErrorKind::OneofFieldWithLabel { .. }
    ));
}

#[test]
fn parse_map_field() {
    let file = parse("message M { map<string, int32> m = 7; }").unwrap();
    let message = match &file.items[0] {
        ast::FileItem::Message(message) => message,
        item => panic!("expected message, got {:?}", item),
    };
    match &message.body.items[0] {
        ast::MessageItem::Field(field) => {
            assert_eq!(field.name.value, "m");
            assert!(matches!(
                field.kind,
                ast::FieldKind::Map {
                    key_ty: ast::Ty::String,
                    value_ty: ast::Ty::Int32,
                    ..
                }
            ));
        }
        item => panic!("expected field, got {:?}", item),
    }

    let errors = parse_err("message M { map<float, int32> m = 1; }");
    assert!(matches!(
        errors[0],
        ParseErrorKind::InvalidMapFieldKeyType { .. }
    ));

    let errors = parse_err("message M { optional map<string, int32> m = 1; }");
    assert!(matches!(errors[0], ParseErrorKind::MapFieldWithLabel { .. }));
}

#[test]
fn parse_group() {
    let file = parse(
        "message M {
            optional group Foo = 1 {
                optional int32 x = 1;
            }
        }",
    )
    .unwrap();
    let message = match &file.items[0] {
        ast::FileItem::Message(message) => message,
        item => panic!("expected message, got {:?}", item),
    };
    match &message.body.items[0] {
        ast::MessageItem::Field(field) => {
            assert_eq!(field.name.value, "Foo");
            assert!(matches!(field.kind, ast::FieldKind::Group { .. }));
        }
        item => panic!("expected group field, got {:?}", item),
    }

    let errors = parse_err("message M { optional group foo = 1 {} }");
    assert!(matches!(errors[0], ParseErrorKind::InvalidGroupName { .. }));
}

#[test]
fn parse_reserved_and_extensions() {
    let file = parse(
        "message M {
            reserved 2, 15, 9 to 11;
            reserved \"foo\", \"bar\";
            extensions 100 to max;
            extensions 5, 10 to 20 [(verification) = DECLARATION];
        }",
    )
    .unwrap();
    let message = match &file.items[0] {
        ast::FileItem::Message(message) => message,
        item => panic!("expected message, got {:?}", item),
    };
    assert_eq!(message.body.reserved.len(), 2);
    assert_eq!(message.body.extensions.len(), 2);

    match &message.body.reserved[0].kind {
        ast::ReservedKind::Ranges(ranges) => {
            assert_eq!(ranges.len(), 3);
            assert!(matches!(ranges[0].end, ast::RangeEnd::None));
            assert!(matches!(ranges[2].end, ast::RangeEnd::Int(_)));
        }
        kind => panic!("expected ranges, got {:?}", kind),
    }
    match &message.body.extensions[0].ranges[0].end {
        ast::RangeEnd::Max(_) => (),
        end => panic!("expected max, got {:?}", end),
    }
}

#[test]
fn parse_enum_values() {
    let file = parse(
        "enum E {
            ZERO = 0;
            NEGATIVE = -1;
            BIG = 0x7FFFFFFF [deprecated = true];
            reserved -5 to -1, 100 to max;
        }",
    )
    .unwrap();
    match &file.items[0] {
        ast::FileItem::Enum(enum_) => {
            assert_eq!(enum_.values.len(), 3);
            assert!(enum_.values[1].number.negative);
            assert_eq!(enum_.values[2].number.value, 0x7FFFFFFF);
            assert!(enum_.values[2].options.is_some());
            assert_eq!(enum_.reserved.len(), 1);
        }
        item => panic!("expected enum, got {:?}", item),
    }
}

#[test]
fn parse_service_methods() {
    let file = parse(
        "service S {
            rpc Unary (In) returns (Out);
            rpc Client (stream In) returns (Out);
            rpc Both (stream In) returns (stream Out) {
                option deprecated = true;
            }
        }",
    )
    .unwrap();
    match &file.items[0] {
        ast::FileItem::Service(service) => {
            assert_eq!(service.methods.len(), 3);
            assert!(service.methods[0].client_streaming.is_none());
            assert!(service.methods[1].client_streaming.is_some());
            assert!(service.methods[1].server_streaming.is_none());
            assert!(service.methods[2].server_streaming.is_some());
            assert_eq!(service.methods[2].options.len(), 1);
        }
        item => panic!("expected service, got {:?}", item),
    }
}

#[test]
fn parse_extend() {
    let file = parse(
        "extend google.protobuf.FieldOptions {
            optional string tag = 50000;
        }",
    )
    .unwrap();
    match &file.items[0] {
        ast::FileItem::Extend(extend) => {
            assert_eq!(extend.extendee.to_string(), "google.protobuf.FieldOptions");
            assert_eq!(extend.fields.len(), 1);
        }
        item => panic!("expected extend, got {:?}", item),
    }
}

#[test]
fn trailing_comment_same_line() {
    let file = parse("message M {\n  int32 a = 1; // a comment\n  int32 b = 2;\n}").unwrap();
    let message = match &file.items[0] {
        ast::FileItem::Message(message) => message,
        item => panic!("expected message, got {:?}", item),
    };
    let (a, b) = match (&message.body.items[0], &message.body.items[1]) {
        (ast::MessageItem::Field(a), ast::MessageItem::Field(b)) => (a, b),
        items => panic!("expected fields, got {:?}", items),
    };
    assert_eq!(a.comments.trailing.as_deref(), Some(" a comment\n"));
    assert_eq!(b.comments.leading, None);
}

#[test]
fn comment_before_blank_line_attaches_to_previous_field() {
    let file = parse(
        "message M {\n  int32 a = 1;\n  // a comment\n\n  int32 b = 2;\n}",
    )
    .unwrap();
    let message = match &file.items[0] {
        ast::FileItem::Message(message) => message,
        item => panic!("expected message, got {:?}", item),
    };
    let (a, b) = match (&message.body.items[0], &message.body.items[1]) {
        (ast::MessageItem::Field(a), ast::MessageItem::Field(b)) => (a, b),
        items => panic!("expected fields, got {:?}", items),
    };
    assert_eq!(a.comments.trailing.as_deref(), Some(" a comment\n"));
    assert_eq!(b.comments.leading, None);
}

#[test]
fn comment_attaches_to_next_field_without_blank_line() {
    let file = parse(
        "message M {\n  int32 a = 1;\n  // b comment\n  int32 b = 2;\n}",
    )
    .unwrap();
    let message = match &file.items[0] {
        ast::FileItem::Message(message) => message,
        item => panic!("expected message, got {:?}", item),
    };
    let (a, b) = match (&message.body.items[0], &message.body.items[1]) {
        (ast::MessageItem::Field(a), ast::MessageItem::Field(b)) => (a, b),
        items => panic!("expected fields, got {:?}", items),
    };
    assert_eq!(a.comments.trailing, None);
    assert_eq!(b.comments.leading.as_deref(), Some(" b comment\n"));
}

#[test]
fn detached_and_leading_comments() {
    let file = parse("//detached\n\n/*leading*/\noption foo = 5;//trailing\n").unwrap();
    let option = &file.options[0];
    assert_eq!(option.comments.leading_detached, vec!["detached\n"]);
    assert_eq!(option.comments.leading.as_deref(), Some("leading"));
    assert_eq!(option.comments.trailing.as_deref(), Some("trailing\n"));
}

#[test]
fn merged_line_comments() {
    let file = parse("// one\n// two\nmessage M {}").unwrap();
    let message = match &file.items[0] {
        ast::FileItem::Message(message) => message,
        item => panic!("expected message, got {:?}", item),
    };
    assert_eq!(message.comments.leading.as_deref(), Some(" one\n two\n"));
}

#[test]
fn comment_attribution_is_stable() {
    let source = "// one\n\n// two\nmessage M { int32 a = 1; // x\n }";
    assert_eq!(parse(source).unwrap(), parse(source).unwrap());
}

#[test]
fn recovery_continues_after_bad_statement() {
    let errors = parse_err(
        "message M { int32 x = ; }
         message N { int32 y = bad bad; }
         message O { int32 z = 1; }",
    );
    // Both bad statements are reported.
    assert!(errors.len() >= 2, "got {:?}", errors);
}

#[test]
fn nesting_depth_is_bounded() {
    let mut source = String::from("message M ");
    for _ in 0..200 {
        source.push_str("{ message N ");
    }
    source.push_str(&"}".repeat(201));
    let errors = parse_err(&source);
    assert!(
        errors
            .iter()
            .any(|error| matches!(error, ParseErrorKind::NestingTooDeep { .. })),
        "got {:?}",
        errors,
    );
}
