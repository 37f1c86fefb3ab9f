use std::fmt;

use miette::{Diagnostic, NamedSource, SourceCode};
use thiserror::Error;

use crate::{Span, MAX_MESSAGE_FIELD_NUMBER};

/// An error that may occur while parsing a protobuf source file.
#[derive(Error, Diagnostic)]
#[error("{}", kind)]
#[diagnostic(forward(kind))]
pub struct ParseError {
    kind: Box<ParseErrorKind>,
    #[related]
    related: Vec<ParseErrorKind>,
    file: String,
    #[source_code]
    source_code: NamedSource,
}

#[derive(Error, Clone, Debug, Diagnostic, PartialEq)]
pub(crate) enum ParseErrorKind {
    #[error("invalid character")]
    InvalidCharacter {
        #[label("found here")]
        span: Span,
    },
    #[error("invalid control character")]
    InvalidControlCharacter {
        #[label("found here")]
        span: Span,
    },
    #[error("invalid UTF-8 at offset {offset}")]
    InvalidUtf8 { offset: usize },
    #[error("value out of range for {kind}: {lexeme}")]
    IntegerOutOfRange {
        kind: &'static str,
        lexeme: String,
        #[label("defined here")]
        span: Span,
    },
    #[error("invalid syntax in {kind} value: {lexeme}")]
    InvalidNumber {
        kind: &'static str,
        lexeme: String,
        #[label("defined here")]
        span: Span,
    },
    #[error("null character ('\\0') not allowed in string literal")]
    NulInString {
        #[label("found here")]
        span: Span,
    },
    #[error("encountered end-of-line before end of string literal")]
    UnterminatedString {
        #[label("string ends here")]
        span: Span,
    },
    #[error("invalid string escape")]
    InvalidStringEscape {
        #[label("defined here")]
        span: Span,
    },
    #[error("octal escape is out of range, must be between 0 and 377")]
    OctalEscapeOutOfRange {
        #[label("defined here")]
        span: Span,
    },
    #[error("unicode escape is out of range, must be between 0 and 0x10ffff")]
    UnicodeEscapeOutOfRange {
        #[label("defined here")]
        span: Span,
    },
    #[error("string is not valid utf-8")]
    InvalidUtf8String {
        #[label("defined here")]
        span: Span,
    },
    #[error("block comment never terminates, unexpected EOF")]
    UnterminatedBlockComment {
        #[label("comment starts here")]
        span: Span,
    },
    #[error("unknown syntax '{syntax}'")]
    #[diagnostic(help("possible values are 'proto2' and 'proto3'"))]
    UnknownSyntax {
        syntax: String,
        #[label("defined here")]
        span: Span,
    },
    #[error("invalid group name")]
    #[diagnostic(help(
        "group names must consist of a capital letter followed by letters, numbers and underscores"
    ))]
    InvalidGroupName {
        #[label("defined here")]
        span: Span,
    },
    #[error("expected {expected}, but found '{found}'")]
    UnexpectedToken {
        expected: String,
        found: String,
        #[label("found here")]
        span: Span,
    },
    #[error("expected {expected}, but reached end of file")]
    UnexpectedEof { expected: String },
    #[error("compact options must have at least one option")]
    EmptyCompactOptions {
        #[label("defined here")]
        span: Span,
    },
    #[error("compact option must have a value")]
    CompactOptionMissingValue {
        #[label("found here")]
        span: Span,
    },
    #[error("unexpected ','")]
    UnexpectedTrailingComma {
        #[label("found here")]
        span: Span,
    },
    #[error("message numbers must be between 1 and {}", MAX_MESSAGE_FIELD_NUMBER)]
    InvalidMessageNumber {
        #[label("defined here")]
        span: Span,
    },
    #[error("enum numbers must be between {} and {}", i32::MIN, i32::MAX)]
    InvalidEnumNumber {
        #[label("defined here")]
        span: Span,
    },
    #[error("constant is out of range for int64")]
    NegativeIntegerOutOfRange {
        #[label("defined here")]
        span: Span,
    },
    #[error("a map field key type must be an integer, boolean or string")]
    InvalidMapFieldKeyType {
        #[label("defined here")]
        span: Span,
    },
    #[error("map fields cannot have labels")]
    MapFieldWithLabel {
        #[label("defined here")]
        span: Span,
    },
    #[error("oneof fields cannot have labels")]
    OneofFieldWithLabel {
        #[label("defined here")]
        span: Span,
    },
    #[error("'{name}' is already defined")]
    DuplicateName {
        name: String,
        #[label("first defined here…")]
        first: Span,
        #[label("…and again here")]
        second: Span,
    },
    #[error("multiple package names specified")]
    DuplicatePackage {
        #[label("defined here…")]
        first: Span,
        #[label("…and again here")]
        second: Span,
    },
    #[error("message nesting too deep")]
    NestingTooDeep {
        #[label("found here")]
        span: Span,
    },
    #[error("file is too large")]
    #[diagnostic(help("the maximum file length is 2,147,483,647 bytes"))]
    FileTooLarge,
}

impl ParseError {
    pub(crate) fn new(
        mut related: Vec<ParseErrorKind>,
        name: &str,
        source: impl SourceCode + Send + Sync + 'static,
    ) -> Self {
        debug_assert!(!related.is_empty());
        let kind = related.remove(0);
        ParseError {
            kind: Box::new(kind),
            related,
            file: name.to_owned(),
            source_code: NamedSource::new(name, source),
        }
    }

    #[cfg(test)]
    pub(crate) fn into_inner(mut self) -> Vec<ParseErrorKind> {
        self.related.insert(0, *self.kind);
        self.related
    }

    /// Gets the name of the file in which this error occurred.
    pub fn file(&self) -> &str {
        &self.file
    }

    /// Gets the primary source code span associated with this error, if any.
    pub fn span(&self) -> Option<Span> {
        self.kind.span()
    }
}

impl ParseErrorKind {
    pub(crate) fn span(&self) -> Option<Span> {
        match self {
            ParseErrorKind::InvalidCharacter { span } => Some(span.clone()),
            ParseErrorKind::InvalidControlCharacter { span } => Some(span.clone()),
            ParseErrorKind::InvalidUtf8 { offset } => Some(*offset..*offset),
            ParseErrorKind::IntegerOutOfRange { span, .. } => Some(span.clone()),
            ParseErrorKind::InvalidNumber { span, .. } => Some(span.clone()),
            ParseErrorKind::NulInString { span } => Some(span.clone()),
            ParseErrorKind::UnterminatedString { span } => Some(span.clone()),
            ParseErrorKind::InvalidStringEscape { span } => Some(span.clone()),
            ParseErrorKind::OctalEscapeOutOfRange { span } => Some(span.clone()),
            ParseErrorKind::UnicodeEscapeOutOfRange { span } => Some(span.clone()),
            ParseErrorKind::InvalidUtf8String { span } => Some(span.clone()),
            ParseErrorKind::UnterminatedBlockComment { span } => Some(span.clone()),
            ParseErrorKind::UnknownSyntax { span, .. } => Some(span.clone()),
            ParseErrorKind::InvalidGroupName { span } => Some(span.clone()),
            ParseErrorKind::UnexpectedToken { span, .. } => Some(span.clone()),
            ParseErrorKind::UnexpectedEof { .. } => None,
            ParseErrorKind::EmptyCompactOptions { span } => Some(span.clone()),
            ParseErrorKind::CompactOptionMissingValue { span } => Some(span.clone()),
            ParseErrorKind::UnexpectedTrailingComma { span } => Some(span.clone()),
            ParseErrorKind::InvalidMessageNumber { span } => Some(span.clone()),
            ParseErrorKind::InvalidEnumNumber { span } => Some(span.clone()),
            ParseErrorKind::NegativeIntegerOutOfRange { span } => Some(span.clone()),
            ParseErrorKind::InvalidMapFieldKeyType { span } => Some(span.clone()),
            ParseErrorKind::MapFieldWithLabel { span } => Some(span.clone()),
            ParseErrorKind::OneofFieldWithLabel { span } => Some(span.clone()),
            ParseErrorKind::DuplicateName { second, .. } => Some(second.clone()),
            ParseErrorKind::DuplicatePackage { second, .. } => Some(second.clone()),
            ParseErrorKind::NestingTooDeep { span } => Some(span.clone()),
            ParseErrorKind::FileTooLarge => None,
        }
    }
}

impl fmt::Debug for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(span) = self.span() {
            if let Ok(span_contents) = self.source_code.read_span(&span.into(), 0, 0) {
                write!(
                    f,
                    "{}:{}:{}: ",
                    self.file,
                    span_contents.line() + 1,
                    span_contents.column() + 1
                )?;
            }
        }

        write!(f, "{}", self)
    }
}
