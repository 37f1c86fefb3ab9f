mod comments;
#[cfg(test)]
mod tests;

use std::{mem::take, ops::ControlFlow};

use logos::Logos;

use crate::{
    ast,
    case::is_valid_group_name,
    error::ParseErrorKind,
    join_span,
    lex::{Number, Token},
    lines::LineResolver,
    report::{Diagnostic, Reporter},
    Span,
};

use self::comments::{CommentQueue, CommentToken};

/// Brace nesting deeper than this fails cleanly instead of exhausting the
/// stack on pathological inputs.
const MAX_NESTING_DEPTH: u32 = 100;

/// Parses a source file into an AST, reporting every diagnostic through
/// `reporter`. A best-effort AST is always produced; the returned errors
/// decide whether it is usable.
pub(crate) fn parse_file(
    name: &str,
    source: &str,
    lines: &LineResolver,
    reporter: &mut dyn Reporter,
) -> (ast::File, Vec<ParseErrorKind>) {
    let mut parser = Parser::new(name, source, lines, reporter);
    let file = parser.parse_file();
    (file, parser.errors)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldScope {
    Message,
    Extend,
    Oneof,
}

struct Parser<'a, 'r> {
    file_name: &'a str,
    source: &'a str,
    lexer: logos::Lexer<'a, Token<'a>>,
    peek: Option<(Token<'a>, Span)>,
    eof_reached: bool,
    comments: CommentQueue,
    lines: &'a LineResolver,
    errors: Vec<ParseErrorKind>,
    reporter: &'r mut dyn Reporter,
    aborted: bool,
    depth: u32,
}

impl<'a, 'r> Parser<'a, 'r> {
    fn new(
        file_name: &'a str,
        source: &'a str,
        lines: &'a LineResolver,
        reporter: &'r mut dyn Reporter,
    ) -> Self {
        Parser {
            file_name,
            source,
            lexer: Token::lexer(source),
            peek: None,
            eof_reached: false,
            comments: CommentQueue::new(),
            lines,
            errors: Vec::new(),
            reporter,
            aborted: false,
            depth: 0,
        }
    }

    fn parse_file(&mut self) -> ast::File {
        let mut file = ast::File {
            span: 0..self.source.len(),
            ..Default::default()
        };

        if self.peek_eq(&Token::SYNTAX) {
            match self.parse_syntax() {
                Ok((syntax, span, comments)) => {
                    file.syntax = syntax;
                    file.syntax_span = Some((span, comments));
                }
                Err(()) => self.recover(),
            }
        } else {
            self.warn(
                0..0,
                "no syntax specified; defaulting to proto2 syntax".to_owned(),
            );
        }

        loop {
            if self.aborted {
                break;
            }
            match self.peek() {
                None => break,
                Some((Token::Semicolon, _)) => {
                    self.bump();
                }
                Some((tok, _)) if tok == Token::PACKAGE => {
                    let comments = self.take_leading_comments();
                    match self.parse_package(comments) {
                        Ok(package) => {
                            if let Some(first) = &file.package {
                                self.add_error(ParseErrorKind::DuplicatePackage {
                                    first: first.name.span(),
                                    second: package.name.span(),
                                });
                            } else {
                                file.package = Some(package);
                            }
                        }
                        Err(()) => self.recover(),
                    }
                }
                Some((tok, _)) if tok == Token::IMPORT => {
                    let comments = self.take_leading_comments();
                    match self.parse_import(comments) {
                        Ok(import) => file.imports.push(import),
                        Err(()) => self.recover(),
                    }
                }
                Some((tok, _)) if tok == Token::OPTION => {
                    let comments = self.take_leading_comments();
                    match self.parse_option(comments) {
                        Ok(option) => file.options.push(option),
                        Err(()) => self.recover(),
                    }
                }
                Some((tok, _)) if tok == Token::MESSAGE => {
                    let comments = self.take_leading_comments();
                    match self.parse_message(comments) {
                        Ok(message) => file.items.push(ast::FileItem::Message(message)),
                        Err(()) => self.recover(),
                    }
                }
                Some((tok, _)) if tok == Token::ENUM => {
                    let comments = self.take_leading_comments();
                    match self.parse_enum(comments) {
                        Ok(enum_) => file.items.push(ast::FileItem::Enum(enum_)),
                        Err(()) => self.recover(),
                    }
                }
                Some((tok, _)) if tok == Token::SERVICE => {
                    let comments = self.take_leading_comments();
                    match self.parse_service(comments) {
                        Ok(service) => file.items.push(ast::FileItem::Service(service)),
                        Err(()) => self.recover(),
                    }
                }
                Some((tok, _)) if tok == Token::EXTEND => {
                    let comments = self.take_leading_comments();
                    match self.parse_extend(comments) {
                        Ok(extend) => file.items.push(ast::FileItem::Extend(extend)),
                        Err(()) => self.recover(),
                    }
                }
                _ => {
                    let _: Result<(), ()> = self.unexpected_token(
                        "'message', 'enum', 'service', 'extend', 'import', 'package', \
                         'option' or ';'",
                    );
                    self.recover();
                }
            }
        }

        file
    }

    fn parse_syntax(&mut self) -> Result<(ast::Syntax, Span, ast::Comments), ()> {
        let mut comments = self.take_leading_comments();
        let (_, start) = self.bump();

        self.expect_eq(Token::Equals)?;
        let value = self.parse_string_value()?;
        let syntax = match value.value.as_slice() {
            b"proto2" => ast::Syntax::Proto2,
            b"proto3" => ast::Syntax::Proto3,
            bytes => {
                self.add_error(ParseErrorKind::UnknownSyntax {
                    syntax: String::from_utf8_lossy(bytes).into_owned(),
                    span: value.span.clone(),
                });
                return Err(());
            }
        };
        let end = self.expect_eq(Token::Semicolon)?;

        self.claim_trailing(&mut comments);
        Ok((syntax, join_span(start, end), comments))
    }

    fn parse_package(&mut self, comments: ast::Comments) -> Result<ast::Package, ()> {
        let (_, start) = self.bump();
        let name = self.parse_full_ident()?;
        let end = self.expect_eq(Token::Semicolon)?;

        let mut package = ast::Package {
            span: join_span(start, end),
            comments,
            name,
        };
        self.claim_trailing(&mut package.comments);
        Ok(package)
    }

    fn parse_import(&mut self, comments: ast::Comments) -> Result<ast::Import, ()> {
        let (_, start) = self.bump();
        let kind = match self.peek() {
            Some((tok, span)) if tok == Token::WEAK => {
                self.bump();
                Some((ast::ImportKind::Weak, span))
            }
            Some((tok, span)) if tok == Token::PUBLIC => {
                self.bump();
                Some((ast::ImportKind::Public, span))
            }
            _ => None,
        };
        let value = self.parse_string_value()?;
        let end = self.expect_eq(Token::Semicolon)?;

        let mut import = ast::Import {
            span: join_span(start, end),
            comments,
            kind,
            value,
        };
        self.claim_trailing(&mut import.comments);
        Ok(import)
    }

    fn parse_option(&mut self, comments: ast::Comments) -> Result<ast::OptionDecl, ()> {
        let (_, start) = self.bump();
        let body = self.parse_option_body(false)?;
        let end = self.expect_eq(Token::Semicolon)?;

        let mut option = ast::OptionDecl {
            span: join_span(start, end),
            comments,
            body,
        };
        self.claim_trailing(&mut option.comments);
        Ok(option)
    }

    /// Parses `name = value`, as written in both `option` declarations and
    /// compact option lists.
    fn parse_option_body(&mut self, compact: bool) -> Result<ast::OptionBody, ()> {
        let mut name = Vec::new();
        let start = match self.peek() {
            Some((Token::LeftParen, span)) => {
                name.push(self.parse_extension_name_part()?);
                span
            }
            Some((Token::Ident(value), span)) => {
                self.bump();
                name.push(ast::OptionNamePart::Ident(ast::Ident::new(value, span.clone())));
                span
            }
            _ => return self.unexpected_token("an identifier or '('"),
        };

        loop {
            match self.peek() {
                Some((Token::Dot, _)) => {
                    self.bump();
                    match self.peek() {
                        Some((Token::LeftParen, _)) => {
                            name.push(self.parse_extension_name_part()?);
                        }
                        Some((Token::Ident(value), span)) => {
                            self.bump();
                            name.push(ast::OptionNamePart::Ident(ast::Ident::new(value, span)));
                        }
                        _ => return self.unexpected_token("an identifier or '('"),
                    }
                }
                Some((Token::Equals, _)) => {
                    self.bump();
                    break;
                }
                Some((Token::RightBracket | Token::Comma, span)) if compact => {
                    self.add_error(ParseErrorKind::CompactOptionMissingValue { span });
                    return Err(());
                }
                _ => return self.unexpected_token("'.' or '='"),
            }
        }

        let value = self.parse_option_value()?;
        Ok(ast::OptionBody {
            span: join_span(start, value.span()),
            name,
            value,
        })
    }

    fn parse_extension_name_part(&mut self) -> Result<ast::OptionNamePart, ()> {
        let open = self.expect_eq(Token::LeftParen)?;
        let name = self.parse_type_name()?;
        let close = self.expect_eq(Token::RightParen)?;
        Ok(ast::OptionNamePart::Extension {
            span: join_span(open, close),
            name,
        })
    }

    fn parse_option_value(&mut self) -> Result<ast::OptionValue, ()> {
        match self.peek() {
            Some((Token::Ident(_), _)) => Ok(ast::OptionValue::Ident(self.parse_full_ident()?)),
            Some((Token::Minus, span)) => {
                self.bump();
                match self.peek() {
                    Some((Token::Number(Number::Int(value)), num_span)) => {
                        self.bump();
                        Ok(ast::OptionValue::Int(ast::Int {
                            negative: true,
                            value,
                            span: join_span(span, num_span),
                        }))
                    }
                    Some((Token::Number(Number::Float(value)), num_span)) => {
                        self.bump();
                        Ok(ast::OptionValue::Float(ast::Float {
                            value: -value,
                            span: join_span(span, num_span),
                        }))
                    }
                    Some((tok, num_span)) if tok == Token::INF => {
                        self.bump();
                        Ok(ast::OptionValue::Float(ast::Float {
                            value: f64::NEG_INFINITY,
                            span: join_span(span, num_span),
                        }))
                    }
                    Some((tok, num_span)) if tok == Token::NAN => {
                        self.bump();
                        Ok(ast::OptionValue::Float(ast::Float {
                            value: f64::NAN,
                            span: join_span(span, num_span),
                        }))
                    }
                    _ => self.unexpected_token("a numeric literal"),
                }
            }
            Some((Token::Plus, _)) => {
                self.bump();
                match self.peek() {
                    Some((Token::Number(Number::Int(value)), span)) => {
                        self.bump();
                        Ok(ast::OptionValue::Int(ast::Int {
                            negative: false,
                            value,
                            span,
                        }))
                    }
                    Some((Token::Number(Number::Float(value)), span)) => {
                        self.bump();
                        Ok(ast::OptionValue::Float(ast::Float { value, span }))
                    }
                    _ => self.unexpected_token("a numeric literal"),
                }
            }
            Some((Token::Number(Number::Int(value)), span)) => {
                self.bump();
                Ok(ast::OptionValue::Int(ast::Int {
                    negative: false,
                    value,
                    span,
                }))
            }
            Some((Token::Number(Number::Float(value)), span)) => {
                self.bump();
                Ok(ast::OptionValue::Float(ast::Float { value, span }))
            }
            Some((Token::String(_), _)) => {
                Ok(ast::OptionValue::String(self.parse_string_value()?))
            }
            Some((Token::LeftBrace, span)) => {
                self.bump();
                Ok(ast::OptionValue::Aggregate(
                    self.parse_message_literal(span, Token::RightBrace)?,
                ))
            }
            _ => self.unexpected_token("a constant"),
        }
    }

    fn parse_message(&mut self, comments: ast::Comments) -> Result<ast::Message, ()> {
        let (_, start) = self.bump();
        let name = self.expect_ident()?;
        let (body, end) = self.parse_message_body_block(&start)?;

        let mut message = ast::Message {
            span: join_span(start, end),
            comments,
            name,
            body,
        };
        self.claim_trailing(&mut message.comments);
        Ok(message)
    }

    fn parse_message_body_block(&mut self, start: &Span) -> Result<(ast::MessageBody, Span), ()> {
        self.expect_eq(Token::LeftBrace)?;
        self.enter_depth(start)?;
        let body = self.parse_message_body();
        self.depth -= 1;
        let body = body?;

        let mut end = self.expect_eq(Token::RightBrace)?;
        if let Some((Token::Semicolon, span)) = self.peek() {
            self.bump();
            end = span;
        }
        Ok((body, end))
    }

    fn parse_message_body(&mut self) -> Result<ast::MessageBody, ()> {
        let mut body = ast::MessageBody::default();
        loop {
            if self.aborted {
                return Err(());
            }
            match self.peek() {
                Some((Token::RightBrace, _)) | None => return Ok(body),
                Some((Token::Semicolon, _)) => {
                    self.bump();
                }
                Some((tok, _)) if tok == Token::MESSAGE => {
                    let comments = self.take_leading_comments();
                    match self.parse_message(comments) {
                        Ok(message) => body.items.push(ast::MessageItem::Message(message)),
                        Err(()) => self.recover(),
                    }
                }
                Some((tok, _)) if tok == Token::ENUM => {
                    let comments = self.take_leading_comments();
                    match self.parse_enum(comments) {
                        Ok(enum_) => body.items.push(ast::MessageItem::Enum(enum_)),
                        Err(()) => self.recover(),
                    }
                }
                Some((tok, _)) if tok == Token::EXTEND => {
                    let comments = self.take_leading_comments();
                    match self.parse_extend(comments) {
                        Ok(extend) => body.items.push(ast::MessageItem::Extend(extend)),
                        Err(()) => self.recover(),
                    }
                }
                Some((tok, _)) if tok == Token::OPTION => {
                    let comments = self.take_leading_comments();
                    match self.parse_option(comments) {
                        Ok(option) => body.options.push(option),
                        Err(()) => self.recover(),
                    }
                }
                Some((tok, _)) if tok == Token::ONEOF => {
                    let comments = self.take_leading_comments();
                    match self.parse_oneof(comments) {
                        Ok(oneof) => body.items.push(ast::MessageItem::Oneof(oneof)),
                        Err(()) => self.recover(),
                    }
                }
                Some((tok, _)) if tok == Token::RESERVED => {
                    let comments = self.take_leading_comments();
                    match self.parse_reserved(comments) {
                        Ok(reserved) => body.reserved.push(reserved),
                        Err(()) => self.recover(),
                    }
                }
                Some((tok, _)) if tok == Token::EXTENSIONS => {
                    let comments = self.take_leading_comments();
                    match self.parse_extensions(comments) {
                        Ok(extensions) => body.extensions.push(extensions),
                        Err(()) => self.recover(),
                    }
                }
                Some((Token::Ident(_) | Token::Dot, _)) => {
                    let comments = self.take_leading_comments();
                    match self.parse_field(comments, FieldScope::Message) {
                        Ok(field) => body.items.push(ast::MessageItem::Field(field)),
                        Err(()) => self.recover(),
                    }
                }
                _ => {
                    let _: Result<(), ()> = self.unexpected_token(
                        "a message field, oneof, reserved range, enum, message, extension, \
                         option, ';' or '}'",
                    );
                    self.recover();
                }
            }
        }
    }

    fn parse_field(
        &mut self,
        comments: ast::Comments,
        scope: FieldScope,
    ) -> Result<ast::Field, ()> {
        let start = match self.peek() {
            Some((_, span)) => span,
            None => return self.unexpected_token("a field"),
        };

        let label = match self.peek() {
            Some((tok, span)) if tok == Token::OPTIONAL => {
                self.bump();
                Some((ast::FieldLabel::Optional, span))
            }
            Some((tok, span)) if tok == Token::REQUIRED => {
                self.bump();
                Some((ast::FieldLabel::Required, span))
            }
            Some((tok, span)) if tok == Token::REPEATED => {
                self.bump();
                Some((ast::FieldLabel::Repeated, span))
            }
            _ => None,
        };
        if scope == FieldScope::Oneof {
            if let Some((_, span)) = &label {
                self.add_error(ParseErrorKind::OneofFieldWithLabel { span: span.clone() });
            }
        }

        match self.peek() {
            Some((tok, _)) if tok == Token::GROUP => self.parse_group_field(comments, start, label),
            Some((tok, _)) if tok == Token::MAP => {
                if let Some((_, span)) = &label {
                    self.add_error(ParseErrorKind::MapFieldWithLabel { span: span.clone() });
                }
                self.parse_map_field(comments, start)
            }
            _ => {
                let (ty, ty_span) = self.parse_field_type()?;
                let name = self.expect_ident()?;
                self.expect_eq(Token::Equals)?;
                let number = self.parse_int()?;
                let options = self.parse_compact_options()?;
                let end = self.expect_eq(Token::Semicolon)?;

                let mut field = ast::Field {
                    span: join_span(start, end),
                    comments,
                    label,
                    name,
                    kind: ast::FieldKind::Normal { ty, ty_span },
                    number,
                    options,
                };
                self.claim_trailing(&mut field.comments);
                Ok(field)
            }
        }
    }

    fn parse_group_field(
        &mut self,
        comments: ast::Comments,
        start: Span,
        label: Option<(ast::FieldLabel, Span)>,
    ) -> Result<ast::Field, ()> {
        let (_, ty_span) = self.bump();
        let name = self.expect_ident()?;
        if !is_valid_group_name(&name.value) {
            self.add_error(ParseErrorKind::InvalidGroupName {
                span: name.span.clone(),
            });
        }
        self.expect_eq(Token::Equals)?;
        let number = self.parse_int()?;
        let options = self.parse_compact_options()?;
        let (body, end) = self.parse_message_body_block(&ty_span)?;

        let mut field = ast::Field {
            span: join_span(start, end),
            comments,
            label,
            name,
            kind: ast::FieldKind::Group { ty_span, body },
            number,
            options,
        };
        self.claim_trailing(&mut field.comments);
        Ok(field)
    }

    fn parse_map_field(
        &mut self,
        comments: ast::Comments,
        start: Span,
    ) -> Result<ast::Field, ()> {
        let (_, map_span) = self.bump();
        self.expect_eq(Token::LeftAngleBracket)?;
        let (key_ty, key_ty_span) = self.parse_field_type()?;
        if !is_valid_map_key(&key_ty) {
            self.add_error(ParseErrorKind::InvalidMapFieldKeyType {
                span: key_ty_span.clone(),
            });
        }
        self.expect_eq(Token::Comma)?;
        let (value_ty, value_ty_span) = self.parse_field_type()?;
        let close = self.expect_eq(Token::RightAngleBracket)?;
        let ty_span = join_span(map_span, close);

        let name = self.expect_ident()?;
        self.expect_eq(Token::Equals)?;
        let number = self.parse_int()?;
        let options = self.parse_compact_options()?;
        let end = self.expect_eq(Token::Semicolon)?;

        let mut field = ast::Field {
            span: join_span(start, end),
            comments,
            label: None,
            name,
            kind: ast::FieldKind::Map {
                ty_span,
                key_ty,
                key_ty_span,
                value_ty,
                value_ty_span,
            },
            number,
            options,
        };
        self.claim_trailing(&mut field.comments);
        Ok(field)
    }

    fn parse_field_type(&mut self) -> Result<(ast::Ty, Span), ()> {
        let scalar = match self.peek() {
            Some((tok, span)) if tok == Token::DOUBLE => Some((ast::Ty::Double, span)),
            Some((tok, span)) if tok == Token::FLOAT => Some((ast::Ty::Float, span)),
            Some((tok, span)) if tok == Token::INT32 => Some((ast::Ty::Int32, span)),
            Some((tok, span)) if tok == Token::INT64 => Some((ast::Ty::Int64, span)),
            Some((tok, span)) if tok == Token::UINT32 => Some((ast::Ty::Uint32, span)),
            Some((tok, span)) if tok == Token::UINT64 => Some((ast::Ty::Uint64, span)),
            Some((tok, span)) if tok == Token::SINT32 => Some((ast::Ty::Sint32, span)),
            Some((tok, span)) if tok == Token::SINT64 => Some((ast::Ty::Sint64, span)),
            Some((tok, span)) if tok == Token::FIXED32 => Some((ast::Ty::Fixed32, span)),
            Some((tok, span)) if tok == Token::FIXED64 => Some((ast::Ty::Fixed64, span)),
            Some((tok, span)) if tok == Token::SFIXED32 => Some((ast::Ty::Sfixed32, span)),
            Some((tok, span)) if tok == Token::SFIXED64 => Some((ast::Ty::Sfixed64, span)),
            Some((tok, span)) if tok == Token::BOOL => Some((ast::Ty::Bool, span)),
            Some((tok, span)) if tok == Token::STRING => Some((ast::Ty::String, span)),
            Some((tok, span)) if tok == Token::BYTES => Some((ast::Ty::Bytes, span)),
            _ => None,
        };
        if let Some((ty, span)) = scalar {
            self.bump();
            return Ok((ty, span));
        }

        match self.peek() {
            Some((Token::Dot | Token::Ident(_), _)) => {
                let name = self.parse_type_name()?;
                let span = name.span();
                Ok((ast::Ty::Named(name), span))
            }
            _ => self.unexpected_token("a field type"),
        }
    }

    fn parse_oneof(&mut self, comments: ast::Comments) -> Result<ast::Oneof, ()> {
        let (_, start) = self.bump();
        let name = self.expect_ident()?;
        self.expect_eq(Token::LeftBrace)?;

        let mut options = Vec::new();
        let mut fields = Vec::new();
        loop {
            if self.aborted {
                return Err(());
            }
            match self.peek() {
                Some((Token::RightBrace, _)) | None => break,
                Some((Token::Semicolon, _)) => {
                    self.bump();
                }
                Some((tok, _)) if tok == Token::OPTION => {
                    let comments = self.take_leading_comments();
                    match self.parse_option(comments) {
                        Ok(option) => options.push(option),
                        Err(()) => self.recover(),
                    }
                }
                Some((Token::Ident(_) | Token::Dot, _)) => {
                    let comments = self.take_leading_comments();
                    match self.parse_field(comments, FieldScope::Oneof) {
                        Ok(field) => fields.push(field),
                        Err(()) => self.recover(),
                    }
                }
                _ => {
                    let _: Result<(), ()> =
                        self.unexpected_token("a oneof field, option, ';' or '}'");
                    self.recover();
                }
            }
        }

        let mut end = self.expect_eq(Token::RightBrace)?;
        if let Some((Token::Semicolon, span)) = self.peek() {
            self.bump();
            end = span;
        }

        let mut oneof = ast::Oneof {
            span: join_span(start, end),
            comments,
            name,
            options,
            fields,
        };
        self.claim_trailing(&mut oneof.comments);
        Ok(oneof)
    }

    fn parse_extend(&mut self, comments: ast::Comments) -> Result<ast::Extend, ()> {
        let (_, start) = self.bump();
        let extendee = self.parse_type_name()?;
        self.expect_eq(Token::LeftBrace)?;

        let mut fields = Vec::new();
        loop {
            if self.aborted {
                return Err(());
            }
            match self.peek() {
                Some((Token::RightBrace, _)) | None => break,
                Some((Token::Semicolon, _)) => {
                    self.bump();
                }
                Some((Token::Ident(_) | Token::Dot, _)) => {
                    let comments = self.take_leading_comments();
                    match self.parse_field(comments, FieldScope::Extend) {
                        Ok(field) => fields.push(field),
                        Err(()) => self.recover(),
                    }
                }
                _ => {
                    let _: Result<(), ()> = self.unexpected_token("an extension field, ';' or '}'");
                    self.recover();
                }
            }
        }

        let mut end = self.expect_eq(Token::RightBrace)?;
        if let Some((Token::Semicolon, span)) = self.peek() {
            self.bump();
            end = span;
        }

        let mut extend = ast::Extend {
            span: join_span(start, end),
            comments,
            extendee,
            fields,
        };
        self.claim_trailing(&mut extend.comments);
        Ok(extend)
    }

    fn parse_reserved(&mut self, comments: ast::Comments) -> Result<ast::Reserved, ()> {
        let (_, start) = self.bump();

        let kind = match self.peek() {
            Some((Token::String(_), _)) => {
                let mut names = vec![self.parse_string_value()?];
                while self.bump_if_eq(Token::Comma) {
                    names.push(self.parse_string_value()?);
                }
                ast::ReservedKind::Names(names)
            }
            Some((Token::Number(_) | Token::Minus, _)) => {
                ast::ReservedKind::Ranges(self.parse_reserved_ranges()?)
            }
            _ => return self.unexpected_token("a positive integer or string"),
        };
        let end = self.expect_eq(Token::Semicolon)?;

        let mut reserved = ast::Reserved {
            span: join_span(start, end),
            comments,
            kind,
        };
        self.claim_trailing(&mut reserved.comments);
        Ok(reserved)
    }

    fn parse_extensions(&mut self, comments: ast::Comments) -> Result<ast::Extensions, ()> {
        let (_, start) = self.bump();
        let ranges = self.parse_reserved_ranges()?;
        let options = self.parse_compact_options()?;
        let end = self.expect_eq(Token::Semicolon)?;

        let mut extensions = ast::Extensions {
            span: join_span(start, end),
            comments,
            ranges,
            options,
        };
        self.claim_trailing(&mut extensions.comments);
        Ok(extensions)
    }

    fn parse_reserved_ranges(&mut self) -> Result<Vec<ast::ReservedRange>, ()> {
        let mut ranges = vec![self.parse_reserved_range()?];
        while self.bump_if_eq(Token::Comma) {
            ranges.push(self.parse_reserved_range()?);
        }
        Ok(ranges)
    }

    fn parse_reserved_range(&mut self) -> Result<ast::ReservedRange, ()> {
        let start = self.parse_int()?;
        let (end, span) = if self.bump_if_eq(Token::TO) {
            match self.peek() {
                Some((tok, max_span)) if tok == Token::MAX => {
                    self.bump();
                    let span = join_span(start.span.clone(), max_span.clone());
                    (ast::RangeEnd::Max(max_span), span)
                }
                _ => {
                    let end = self.parse_int()?;
                    let span = join_span(start.span.clone(), end.span.clone());
                    (ast::RangeEnd::Int(end), span)
                }
            }
        } else {
            (ast::RangeEnd::None, start.span.clone())
        };

        Ok(ast::ReservedRange { span, start, end })
    }

    fn parse_enum(&mut self, comments: ast::Comments) -> Result<ast::Enum, ()> {
        let (_, start) = self.bump();
        let name = self.expect_ident()?;
        self.expect_eq(Token::LeftBrace)?;

        let mut options = Vec::new();
        let mut values = Vec::new();
        let mut reserved = Vec::new();
        loop {
            if self.aborted {
                return Err(());
            }
            match self.peek() {
                Some((Token::RightBrace, _)) | None => break,
                Some((Token::Semicolon, _)) => {
                    self.bump();
                }
                Some((tok, _)) if tok == Token::OPTION => {
                    let comments = self.take_leading_comments();
                    match self.parse_option(comments) {
                        Ok(option) => options.push(option),
                        Err(()) => self.recover(),
                    }
                }
                Some((tok, _)) if tok == Token::RESERVED => {
                    let comments = self.take_leading_comments();
                    match self.parse_reserved(comments) {
                        Ok(r) => reserved.push(r),
                        Err(()) => self.recover(),
                    }
                }
                Some((Token::Ident(_), _)) => {
                    let comments = self.take_leading_comments();
                    match self.parse_enum_value(comments) {
                        Ok(value) => values.push(value),
                        Err(()) => self.recover(),
                    }
                }
                _ => {
                    let _: Result<(), ()> =
                        self.unexpected_token("an enum value, option, reserved range, ';' or '}'");
                    self.recover();
                }
            }
        }

        let mut end = self.expect_eq(Token::RightBrace)?;
        if let Some((Token::Semicolon, span)) = self.peek() {
            self.bump();
            end = span;
        }

        let mut enum_ = ast::Enum {
            span: join_span(start, end),
            comments,
            name,
            options,
            values,
            reserved,
        };
        self.claim_trailing(&mut enum_.comments);
        Ok(enum_)
    }

    fn parse_enum_value(&mut self, comments: ast::Comments) -> Result<ast::EnumValue, ()> {
        let name = self.expect_ident()?;
        self.expect_eq(Token::Equals)?;
        let number = self.parse_int()?;
        let options = self.parse_compact_options()?;
        let end = self.expect_eq(Token::Semicolon)?;

        let mut value = ast::EnumValue {
            span: join_span(name.span.clone(), end),
            comments,
            name,
            number,
            options,
        };
        self.claim_trailing(&mut value.comments);
        Ok(value)
    }

    fn parse_service(&mut self, comments: ast::Comments) -> Result<ast::Service, ()> {
        let (_, start) = self.bump();
        let name = self.expect_ident()?;
        self.expect_eq(Token::LeftBrace)?;

        let mut options = Vec::new();
        let mut methods = Vec::new();
        loop {
            if self.aborted {
                return Err(());
            }
            match self.peek() {
                Some((Token::RightBrace, _)) | None => break,
                Some((Token::Semicolon, _)) => {
                    self.bump();
                }
                Some((tok, _)) if tok == Token::OPTION => {
                    let comments = self.take_leading_comments();
                    match self.parse_option(comments) {
                        Ok(option) => options.push(option),
                        Err(()) => self.recover(),
                    }
                }
                Some((tok, _)) if tok == Token::RPC => {
                    let comments = self.take_leading_comments();
                    match self.parse_method(comments) {
                        Ok(method) => methods.push(method),
                        Err(()) => self.recover(),
                    }
                }
                _ => {
                    let _: Result<(), ()> = self.unexpected_token("'rpc', 'option', ';' or '}'");
                    self.recover();
                }
            }
        }

        let mut end = self.expect_eq(Token::RightBrace)?;
        if let Some((Token::Semicolon, span)) = self.peek() {
            self.bump();
            end = span;
        }

        let mut service = ast::Service {
            span: join_span(start, end),
            comments,
            name,
            options,
            methods,
        };
        self.claim_trailing(&mut service.comments);
        Ok(service)
    }

    fn parse_method(&mut self, comments: ast::Comments) -> Result<ast::Method, ()> {
        let (_, start) = self.bump();
        let name = self.expect_ident()?;

        self.expect_eq(Token::LeftParen)?;
        let client_streaming = match self.peek() {
            Some((tok, span)) if tok == Token::STREAM => {
                self.bump();
                Some(span)
            }
            _ => None,
        };
        let input_ty = self.parse_type_name()?;
        self.expect_eq(Token::RightParen)?;

        self.expect_eq(Token::RETURNS)?;

        self.expect_eq(Token::LeftParen)?;
        let server_streaming = match self.peek() {
            Some((tok, span)) if tok == Token::STREAM => {
                self.bump();
                Some(span)
            }
            _ => None,
        };
        let output_ty = self.parse_type_name()?;
        self.expect_eq(Token::RightParen)?;

        let mut options = Vec::new();
        let end = match self.peek() {
            Some((Token::Semicolon, span)) => {
                self.bump();
                span
            }
            Some((Token::LeftBrace, _)) => {
                self.bump();
                loop {
                    if self.aborted {
                        return Err(());
                    }
                    match self.peek() {
                        Some((Token::RightBrace, _)) | None => break,
                        Some((Token::Semicolon, _)) => {
                            self.bump();
                        }
                        Some((tok, _)) if tok == Token::OPTION => {
                            let comments = self.take_leading_comments();
                            match self.parse_option(comments) {
                                Ok(option) => options.push(option),
                                Err(()) => self.recover(),
                            }
                        }
                        _ => {
                            let _: Result<(), ()> =
                                self.unexpected_token("'option', ';' or '}'");
                            self.recover();
                        }
                    }
                }
                let mut end = self.expect_eq(Token::RightBrace)?;
                if let Some((Token::Semicolon, span)) = self.peek() {
                    self.bump();
                    end = span;
                }
                end
            }
            _ => return self.unexpected_token("';' or '{'"),
        };

        let mut method = ast::Method {
            span: join_span(start, end),
            comments,
            name,
            client_streaming,
            input_ty,
            server_streaming,
            output_ty,
            options,
        };
        self.claim_trailing(&mut method.comments);
        Ok(method)
    }

    fn parse_compact_options(&mut self) -> Result<Option<ast::OptionList>, ()> {
        let start = match self.peek() {
            Some((Token::LeftBracket, span)) => {
                self.bump();
                span
            }
            _ => return Ok(None),
        };

        if let Some((Token::RightBracket, close)) = self.peek() {
            self.bump();
            self.add_error(ParseErrorKind::EmptyCompactOptions {
                span: join_span(start, close),
            });
            return Err(());
        }

        let mut options = vec![self.parse_option_body(true)?];
        loop {
            match self.peek() {
                Some((Token::Comma, comma_span)) => {
                    self.bump();
                    if let Some((Token::RightBracket, _)) = self.peek() {
                        self.add_error(ParseErrorKind::UnexpectedTrailingComma { span: comma_span });
                        return Err(());
                    }
                    options.push(self.parse_option_body(true)?);
                }
                Some((Token::RightBracket, close)) => {
                    self.bump();
                    return Ok(Some(ast::OptionList {
                        span: join_span(start, close),
                        options,
                    }));
                }
                _ => return self.unexpected_token("',' or ']'"),
            }
        }
    }

    fn parse_message_literal(
        &mut self,
        start: Span,
        close: Token<'static>,
    ) -> Result<ast::MessageLiteral, ()> {
        self.enter_depth(&start)?;
        let result = self.parse_message_literal_inner(start, close);
        self.depth -= 1;
        result
    }

    fn parse_message_literal_inner(
        &mut self,
        start: Span,
        close: Token<'static>,
    ) -> Result<ast::MessageLiteral, ()> {
        let mut fields = Vec::new();
        loop {
            if self.aborted {
                return Err(());
            }
            match self.peek() {
                Some((tok, end)) if tok == close => {
                    self.bump();
                    return Ok(ast::MessageLiteral {
                        span: join_span(start, end),
                        fields,
                    });
                }
                None => {
                    return self.unexpected_token(format!("a message literal field or '{}'", close))
                }
                _ => fields.push(self.parse_message_literal_field()?),
            }
        }
    }

    fn parse_message_literal_field(&mut self) -> Result<ast::MessageLiteralField, ()> {
        let name = match self.peek() {
            Some((Token::Ident(value), span)) => {
                self.bump();
                ast::MessageLiteralFieldName::Ident(ast::Ident::new(value, span))
            }
            Some((Token::LeftBracket, open)) => {
                self.bump();
                let mut parts = vec![self.expect_ident()?.value];
                let close = loop {
                    match self.peek() {
                        Some((Token::Dot, _)) => {
                            self.bump();
                            parts.push(".".to_owned());
                            parts.push(self.expect_ident()?.value);
                        }
                        Some((Token::ForwardSlash, _)) => {
                            self.bump();
                            parts.push("/".to_owned());
                            parts.push(self.expect_ident()?.value);
                        }
                        Some((Token::RightBracket, close)) => {
                            self.bump();
                            break close;
                        }
                        _ => return self.unexpected_token("'.', '/' or ']'"),
                    }
                };
                ast::MessageLiteralFieldName::Extension {
                    span: join_span(open, close),
                    parts,
                }
            }
            _ => return self.unexpected_token("a message literal field name"),
        };

        let colon = self.bump_if_eq(Token::Colon);
        if !colon {
            // The colon is only optional before message and list values.
            match self.peek() {
                Some((Token::LeftBrace | Token::LeftAngleBracket | Token::LeftBracket, _)) => {}
                _ => return self.unexpected_token("':'"),
            }
        }
        let value = self.parse_message_literal_value()?;

        let separator = match self.peek() {
            Some((Token::Comma, _)) => {
                self.bump();
                Some(',')
            }
            Some((Token::Semicolon, _)) => {
                self.bump();
                Some(';')
            }
            _ => None,
        };

        let name_span = match &name {
            ast::MessageLiteralFieldName::Ident(ident) => ident.span.clone(),
            ast::MessageLiteralFieldName::Extension { span, .. } => span.clone(),
        };
        Ok(ast::MessageLiteralField {
            span: join_span(name_span, value_span(&value)),
            name,
            colon,
            value,
            separator,
        })
    }

    fn parse_message_literal_value(&mut self) -> Result<ast::MessageLiteralValue, ()> {
        match self.peek() {
            Some((Token::LeftBrace, span)) => {
                self.bump();
                Ok(ast::MessageLiteralValue::Message {
                    angle_brackets: false,
                    value: self.parse_message_literal(span, Token::RightBrace)?,
                })
            }
            Some((Token::LeftAngleBracket, span)) => {
                self.bump();
                Ok(ast::MessageLiteralValue::Message {
                    angle_brackets: true,
                    value: self.parse_message_literal(span, Token::RightAngleBracket)?,
                })
            }
            Some((Token::LeftBracket, open)) => {
                self.bump();
                let mut values = Vec::new();
                if let Some((Token::RightBracket, close)) = self.peek() {
                    self.bump();
                    return Ok(ast::MessageLiteralValue::List {
                        span: join_span(open, close),
                        values,
                    });
                }
                loop {
                    values.push(self.parse_message_literal_element()?);
                    match self.peek() {
                        Some((Token::Comma, _)) => {
                            self.bump();
                        }
                        Some((Token::RightBracket, close)) => {
                            self.bump();
                            return Ok(ast::MessageLiteralValue::List {
                                span: join_span(open, close),
                                values,
                            });
                        }
                        _ => return self.unexpected_token("',' or ']'"),
                    }
                }
            }
            _ => self.parse_message_literal_element(),
        }
    }

    /// A scalar or message value, as permitted inside a list.
    fn parse_message_literal_element(&mut self) -> Result<ast::MessageLiteralValue, ()> {
        match self.peek() {
            Some((Token::LeftBrace, span)) => {
                self.bump();
                Ok(ast::MessageLiteralValue::Message {
                    angle_brackets: false,
                    value: self.parse_message_literal(span, Token::RightBrace)?,
                })
            }
            Some((Token::LeftAngleBracket, span)) => {
                self.bump();
                Ok(ast::MessageLiteralValue::Message {
                    angle_brackets: true,
                    value: self.parse_message_literal(span, Token::RightAngleBracket)?,
                })
            }
            Some((Token::Minus, span)) => {
                self.bump();
                match self.peek() {
                    Some((Token::Number(Number::Int(value)), num_span)) => {
                        self.bump();
                        Ok(ast::MessageLiteralValue::Int(ast::Int {
                            negative: true,
                            value,
                            span: join_span(span, num_span),
                        }))
                    }
                    Some((Token::Number(Number::Float(value)), num_span)) => {
                        self.bump();
                        Ok(ast::MessageLiteralValue::Float(ast::Float {
                            value: -value,
                            span: join_span(span, num_span),
                        }))
                    }
                    Some((Token::Ident(value), num_span)) => {
                        self.bump();
                        Ok(ast::MessageLiteralValue::Ident {
                            negative: true,
                            value: ast::Ident::new(value, join_span(span, num_span)),
                        })
                    }
                    _ => self.unexpected_token("a numeric literal or identifier"),
                }
            }
            Some((Token::Ident(value), span)) => {
                self.bump();
                Ok(ast::MessageLiteralValue::Ident {
                    negative: false,
                    value: ast::Ident::new(value, span),
                })
            }
            Some((Token::Number(Number::Int(value)), span)) => {
                self.bump();
                Ok(ast::MessageLiteralValue::Int(ast::Int {
                    negative: false,
                    value,
                    span,
                }))
            }
            Some((Token::Number(Number::Float(value)), span)) => {
                self.bump();
                Ok(ast::MessageLiteralValue::Float(ast::Float { value, span }))
            }
            Some((Token::String(_), _)) => Ok(ast::MessageLiteralValue::String(
                self.parse_string_value()?,
            )),
            _ => self.unexpected_token("a message literal value"),
        }
    }

    fn parse_string_value(&mut self) -> Result<ast::StringValue, ()> {
        let mut result = match self.peek() {
            Some((Token::String(value), span)) => {
                self.bump();
                ast::StringValue {
                    value: value.into_owned(),
                    span,
                }
            }
            _ => return self.unexpected_token("a string literal"),
        };

        // Adjacent string literals are implicitly concatenated.
        while let Some((Token::String(value), span)) = self.peek() {
            self.bump();
            result.value.extend_from_slice(&value);
            result.span = join_span(result.span, span);
        }
        Ok(result)
    }

    fn parse_full_ident(&mut self) -> Result<ast::FullIdent, ()> {
        let mut parts = vec![self.expect_ident()?];
        while self.bump_if_eq(Token::Dot) {
            parts.push(self.expect_ident()?);
        }
        Ok(parts.into())
    }

    fn parse_type_name(&mut self) -> Result<ast::TypeName, ()> {
        match self.peek() {
            Some((Token::Dot | Token::Ident(_), _)) => (),
            _ => return self.unexpected_token("a type name"),
        }
        let leading_dot = match self.peek() {
            Some((Token::Dot, span)) => {
                self.bump();
                Some(span)
            }
            _ => None,
        };
        let name = self.parse_full_ident()?;
        Ok(ast::TypeName { leading_dot, name })
    }

    fn parse_int(&mut self) -> Result<ast::Int, ()> {
        let negative_span = match self.peek() {
            Some((Token::Minus, span)) => {
                self.bump();
                Some(span)
            }
            _ => None,
        };
        match self.peek() {
            Some((Token::Number(Number::Int(value)), span)) => {
                self.bump();
                let span = match negative_span.clone() {
                    Some(neg) => join_span(neg, span),
                    None => span,
                };
                Ok(ast::Int {
                    negative: negative_span.is_some(),
                    value,
                    span,
                })
            }
            _ => self.unexpected_token("an integer"),
        }
    }

    fn expect_ident(&mut self) -> Result<ast::Ident, ()> {
        match self.peek() {
            Some((Token::Ident(value), span)) => {
                self.bump();
                Ok(ast::Ident::new(value, span))
            }
            _ => self.unexpected_token("an identifier"),
        }
    }

    fn expect_eq(&mut self, t: Token) -> Result<Span, ()> {
        match self.peek() {
            Some((tok, _)) if tok == t => Ok(self.bump().1),
            _ => self.unexpected_token(format!("'{}'", t)),
        }
    }

    fn peek_eq(&mut self, t: &Token) -> bool {
        matches!(self.peek(), Some((tok, _)) if tok == *t)
    }

    fn bump_if_eq(&mut self, t: Token) -> bool {
        if self.peek_eq(&t) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn bump(&mut self) -> (Token<'a>, Span) {
        let (tok, span) = self
            .peek
            .take()
            .expect("called bump without peek returning Some()");
        self.comments.token_consumed(self.lines.line(span.end));
        (tok, span)
    }

    fn peek(&mut self) -> Option<(Token<'a>, Span)> {
        if self.peek.is_none() && !self.eof_reached {
            self.peek = self.lex_next();
        }
        self.peek.clone()
    }

    fn lex_next(&mut self) -> Option<(Token<'a>, Span)> {
        loop {
            match self.lexer.next() {
                Some(Ok(tok)) => {
                    self.drain_lexer_errors();
                    let span = self.lexer.span();
                    match tok {
                        Token::LineComment(text) => self.comments.push(CommentToken {
                            text: text.into_owned(),
                            start_line: self.lines.line(span.start),
                            end_line: self.lines.line(span.end),
                            block: false,
                        }),
                        Token::BlockComment(text) => self.comments.push(CommentToken {
                            text: text.into_owned(),
                            start_line: self.lines.line(span.start),
                            end_line: self.lines.line(span.end),
                            block: true,
                        }),
                        tok => {
                            self.comments.attribute(
                                self.lines.line(span.start),
                                tok.is_detaching_punctuation(),
                            );
                            return Some((tok, span));
                        }
                    }
                }
                Some(Err(())) => {
                    self.drain_lexer_errors();
                    let span = self.lexer.span();
                    let kind = match self.lexer.slice().bytes().next() {
                        Some(byte) if byte < 32 || byte == 127 => {
                            ParseErrorKind::InvalidControlCharacter { span }
                        }
                        _ => ParseErrorKind::InvalidCharacter { span },
                    };
                    self.add_error(kind);
                    if self.aborted {
                        return None;
                    }
                }
                None => {
                    self.drain_lexer_errors();
                    // The end of input acts as a sentinel terminal so any
                    // final comments attach as trailing comments of the
                    // last declaration.
                    self.comments
                        .attribute(self.lines.line(self.source.len()), true);
                    self.eof_reached = true;
                    return None;
                }
            }
        }
    }

    fn drain_lexer_errors(&mut self) {
        for error in take(&mut self.lexer.extras.errors) {
            self.add_error(error);
        }
    }

    fn take_leading_comments(&mut self) -> ast::Comments {
        let (leading_detached, leading) = self.comments.take_leading();
        ast::Comments {
            leading_detached,
            leading,
            trailing: None,
        }
    }

    /// Looks past the declaration's final token and claims any comment
    /// group attributed as its trailing comment.
    fn claim_trailing(&mut self, comments: &mut ast::Comments) {
        self.peek();
        comments.trailing = self.comments.take_trailing();
    }

    fn enter_depth(&mut self, span: &Span) -> Result<(), ()> {
        self.depth += 1;
        if self.depth > MAX_NESTING_DEPTH {
            self.depth -= 1;
            self.add_error(ParseErrorKind::NestingTooDeep { span: span.clone() });
            Err(())
        } else {
            Ok(())
        }
    }

    fn recover(&mut self) {
        if self.aborted {
            return;
        }
        // Resynchronize to the next statement boundary at this nesting
        // level.
        let mut depth = 0u32;
        while let Some((tok, _)) = self.peek() {
            match tok {
                Token::Semicolon if depth == 0 => {
                    self.bump();
                    return;
                }
                Token::LeftBrace => {
                    depth += 1;
                    self.bump();
                }
                Token::RightBrace => {
                    if depth == 0 {
                        return;
                    }
                    depth -= 1;
                    self.bump();
                    if depth == 0 {
                        self.bump_if_eq(Token::Semicolon);
                        return;
                    }
                }
                _ => {
                    self.bump();
                }
            }
        }
    }

    fn unexpected_token<T>(&mut self, expected: impl ToString) -> Result<T, ()> {
        match self.peek() {
            Some((found, span)) => {
                self.add_error(ParseErrorKind::UnexpectedToken {
                    expected: expected.to_string(),
                    found: found.to_string(),
                    span,
                });
                Err(())
            }
            None => {
                self.add_error(ParseErrorKind::UnexpectedEof {
                    expected: expected.to_string(),
                });
                Err(())
            }
        }
    }

    fn add_error(&mut self, kind: ParseErrorKind) {
        let diagnostic = self.diagnostic(kind.to_string(), kind.span());
        if let ControlFlow::Break(()) = self.reporter.report_error(&diagnostic) {
            self.aborted = true;
        }
        self.errors.push(kind);
    }

    fn warn(&mut self, span: Span, message: String) {
        let diagnostic = self.diagnostic(message, Some(span));
        self.reporter.report_warning(&diagnostic);
    }

    fn diagnostic(&self, message: String, span: Option<Span>) -> Diagnostic {
        let (line, column) = match &span {
            Some(span) => self.lines.resolve(span.start),
            None => self.lines.resolve(self.source.len()),
        };
        Diagnostic {
            file: self.file_name.to_owned(),
            line: line + 1,
            column: column + 1,
            span,
            message,
        }
    }
}

fn is_valid_map_key(ty: &ast::Ty) -> bool {
    matches!(
        ty,
        ast::Ty::Int32
            | ast::Ty::Int64
            | ast::Ty::Uint32
            | ast::Ty::Uint64
            | ast::Ty::Sint32
            | ast::Ty::Sint64
            | ast::Ty::Fixed32
            | ast::Ty::Fixed64
            | ast::Ty::Sfixed32
            | ast::Ty::Sfixed64
            | ast::Ty::Bool
            | ast::Ty::String
    )
}

fn value_span(value: &ast::MessageLiteralValue) -> Span {
    match value {
        ast::MessageLiteralValue::Message { value, .. } => value.span.clone(),
        ast::MessageLiteralValue::List { span, .. } => span.clone(),
        ast::MessageLiteralValue::Ident { value, .. } => value.span.clone(),
        ast::MessageLiteralValue::Int(int) => int.span.clone(),
        ast::MessageLiteralValue::Float(float) => float.span.clone(),
        ast::MessageLiteralValue::String(string) => string.span.clone(),
    }
}
