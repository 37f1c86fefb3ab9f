//! Parsing of protobuf source files.
//!
//! This crate is the front-end of a protobuf compiler: a lexer, a parser
//! producing a position-annotated [AST](ast), and a translator from that
//! AST to a [`FileDescriptorProto`]. It looks only at the syntax of a
//! single file; resolving type names, interpreting options and reading
//! imported files are left to a linker.
//!
//! # Examples
//!
//! ```
//! # use protosrc::parse;
//! #
//! let source = r#"
//!     syntax = "proto3";
//!
//!     message Foo {
//!         Bar bar = 1;
//!     }
//! "#;
//! let file = parse("foo.proto", source).unwrap();
//! let descriptor = file.file_descriptor_proto();
//! assert_eq!(descriptor.name(), "foo.proto");
//! assert_eq!(descriptor.message_type[0].name(), "Foo");
//! assert_eq!(descriptor.message_type[0].field[0].type_name(), "Bar");
//! ```
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use prost_types::FileDescriptorProto;

pub mod ast;
pub mod report;

mod case;
mod error;
mod generate;
mod lex;
mod lines;
mod parse;
mod tag;

pub use self::error::ParseError;
pub use self::report::{Diagnostic, FailFast, Reporter, Tolerant};

/// A byte range into the original source text.
pub type Span = std::ops::Range<usize>;

const MAX_MESSAGE_FIELD_NUMBER: i32 = 536_870_911;
const MAX_FILE_LEN: usize = i32::MAX as usize;

/// The result of a successful parse: the AST and the descriptor derived
/// from it.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedFile {
    ast: ast::File,
    file: FileDescriptorProto,
}

impl ParsedFile {
    /// The syntax tree, with source spans and comments.
    pub fn ast(&self) -> &ast::File {
        &self.ast
    }

    /// The file descriptor, including source code info.
    pub fn file_descriptor_proto(&self) -> &FileDescriptorProto {
        &self.file
    }

    pub fn into_file_descriptor_proto(self) -> FileDescriptorProto {
        self.file
    }
}

/// Parses a single protobuf source file.
///
/// The returned descriptor's `name` is `name`, verbatim. All diagnostics
/// are collected before failing, so the returned error carries every
/// problem in the file, with shallow validation (duplicate names, numeric
/// bounds) included.
pub fn parse(name: &str, source: &str) -> Result<ParsedFile, ParseError> {
    let mut reporter = report::Tolerant::new();
    parse_with(name, source, &mut reporter)
}

/// Parses a source file that has not yet been checked for valid UTF-8,
/// such as the raw contents of a file on disk. A leading byte order mark
/// is skipped; spans are relative to the text that follows it.
pub fn parse_bytes(name: &str, source: &[u8]) -> Result<ParsedFile, ParseError> {
    let source = source.strip_prefix(b"\xef\xbb\xbf".as_slice()).unwrap_or(source);
    match std::str::from_utf8(source) {
        Ok(source) => parse(name, source),
        Err(err) => Err(ParseError::new(
            vec![error::ParseErrorKind::InvalidUtf8 {
                offset: err.valid_up_to(),
            }],
            name,
            String::from_utf8_lossy(source).into_owned(),
        )),
    }
}

/// Parses a source file, routing diagnostics through `reporter` as they
/// are found. The reporter decides how far parsing continues after an
/// error; the first error still fails the parse once it stops.
pub fn parse_with(
    name: &str,
    source: &str,
    reporter: &mut dyn Reporter,
) -> Result<ParsedFile, ParseError> {
    let source = source.strip_prefix('\u{feff}').unwrap_or(source);
    if source.len() > MAX_FILE_LEN {
        return Err(ParseError::new(
            vec![error::ParseErrorKind::FileTooLarge],
            name,
            String::new(),
        ));
    }

    let lines = lines::LineResolver::new(source);
    let (file_ast, errors) = parse::parse_file(name, source, &lines, reporter);
    if !errors.is_empty() {
        return Err(ParseError::new(errors, name, source.to_owned()));
    }

    let (file, errors) = generate::generate_file(name, &file_ast, &lines, true, reporter);
    if !errors.is_empty() {
        return Err(ParseError::new(errors, name, source.to_owned()));
    }

    Ok(ParsedFile {
        ast: file_ast,
        file,
    })
}

/// Parses a source file into an AST without deriving a descriptor.
pub fn parse_ast(
    name: &str,
    source: &str,
    reporter: &mut dyn Reporter,
) -> Result<ast::File, ParseError> {
    let source = source.strip_prefix('\u{feff}').unwrap_or(source);
    if source.len() > MAX_FILE_LEN {
        return Err(ParseError::new(
            vec![error::ParseErrorKind::FileTooLarge],
            name,
            String::new(),
        ));
    }

    let lines = lines::LineResolver::new(source);
    let (file_ast, errors) = parse::parse_file(name, source, &lines, reporter);
    if !errors.is_empty() {
        return Err(ParseError::new(errors, name, source.to_owned()));
    }
    Ok(file_ast)
}

/// Translates a previously parsed AST into a file descriptor.
///
/// `source` must be the text the AST was parsed from; it is used to
/// resolve spans for source code info and diagnostics. With `validate`
/// set, shallow well-formedness checks run too: unique names within each
/// scope and numeric bounds on field and enum numbers.
pub fn generate(
    name: &str,
    source: &str,
    file_ast: &ast::File,
    validate: bool,
    reporter: &mut dyn Reporter,
) -> Result<FileDescriptorProto, ParseError> {
    let source = source.strip_prefix('\u{feff}').unwrap_or(source);
    let lines = lines::LineResolver::new(source);
    let (file, errors) = generate::generate_file(name, file_ast, &lines, validate, reporter);
    if !errors.is_empty() {
        return Err(ParseError::new(errors, name, source.to_owned()));
    }
    Ok(file)
}

/// Resolves a byte offset to a 1-based (line, column) pair, for mapping
/// AST spans to user-visible positions.
pub fn source_position(source: &str, offset: usize) -> (i32, i32) {
    let (line, column) = lines::LineResolver::new(source).resolve(offset);
    (line + 1, column + 1)
}

fn index_to_i32(index: usize) -> i32 {
    // We enforce that all files parsed are at most i32::MAX bytes long, so
    // any index into a file fits into an i32.
    index.try_into().expect("index too large")
}

fn join_span(start: Span, end: Span) -> Span {
    start.start..end.end
}
