//! The abstract syntax tree produced by [`parse_ast`](crate::parse_ast).
//!
//! Every declaration node carries the byte span of its source text and the
//! comments attributed to it, so consumers such as formatters and language
//! servers can map nodes back to the original file. Spans nest: a parent
//! node's span covers the spans of all of its children.

use std::fmt;

use crate::{join_span, Span};

/// Comments attributed to a declaration.
///
/// `leading` is the comment group ending on the line before the
/// declaration, `leading_detached` holds earlier groups separated by blank
/// lines, and `trailing` is the group following the declaration's final
/// token. Line-comment groups keep one `\n`-terminated entry per line with
/// the `//` marker stripped; block comments keep their interior text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Comments {
    pub leading_detached: Vec<String>,
    pub leading: Option<String>,
    pub trailing: Option<String>,
}

/// The root of the syntax tree for one source file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct File {
    pub span: Span,
    pub comments: Comments,
    pub syntax: Syntax,
    /// Span and comments of the `syntax` declaration, when present.
    pub syntax_span: Option<(Span, Comments)>,
    pub package: Option<Package>,
    pub imports: Vec<Import>,
    pub options: Vec<OptionDecl>,
    pub items: Vec<FileItem>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Syntax {
    #[default]
    Proto2,
    Proto3,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FileItem {
    Message(Message),
    Enum(Enum),
    Service(Service),
    Extend(Extend),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ident {
    pub value: String,
    pub span: Span,
}

/// A dotted identifier such as `foo.bar.Baz`.
#[derive(Debug, Clone, PartialEq)]
pub struct FullIdent {
    pub parts: Vec<Ident>,
}

/// A type reference, optionally rooted with a leading dot.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeName {
    pub leading_dot: Option<Span>,
    pub name: FullIdent,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Int {
    pub negative: bool,
    pub value: u64,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Float {
    pub value: f64,
    pub span: Span,
}

/// A string value, possibly produced by concatenating adjacent literals.
/// The decoded value is a byte string; it need not be valid UTF-8.
#[derive(Debug, Clone, PartialEq)]
pub struct StringValue {
    pub value: Vec<u8>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Package {
    pub span: Span,
    pub comments: Comments,
    pub name: FullIdent,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Import {
    pub span: Span,
    pub comments: Comments,
    pub kind: Option<(ImportKind, Span)>,
    pub value: StringValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportKind {
    Weak,
    Public,
}

/// A full `option name = value;` declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct OptionDecl {
    pub span: Span,
    pub comments: Comments,
    pub body: OptionBody,
}

/// An option name and value, as used by both full declarations and the
/// entries of a compact option list.
#[derive(Debug, Clone, PartialEq)]
pub struct OptionBody {
    pub span: Span,
    pub name: Vec<OptionNamePart>,
    pub value: OptionValue,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OptionNamePart {
    Ident(Ident),
    /// A parenthesized extension name, e.g. the `(ext.name)` in
    /// `option (ext.name).field = 1;`.
    Extension { span: Span, name: TypeName },
}

/// A compact option list, `[name = value, …]`.
#[derive(Debug, Clone, PartialEq)]
pub struct OptionList {
    pub span: Span,
    pub options: Vec<OptionBody>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    /// An identifier constant, possibly dotted, such as `true` or
    /// `google.protobuf.SPEED`.
    Ident(FullIdent),
    Int(Int),
    Float(Float),
    String(StringValue),
    Aggregate(MessageLiteral),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub span: Span,
    pub comments: Comments,
    pub name: Ident,
    pub body: MessageBody,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageBody {
    pub items: Vec<MessageItem>,
    pub options: Vec<OptionDecl>,
    pub reserved: Vec<Reserved>,
    pub extensions: Vec<Extensions>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MessageItem {
    Field(Field),
    Message(Message),
    Enum(Enum),
    Extend(Extend),
    Oneof(Oneof),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub span: Span,
    pub comments: Comments,
    pub label: Option<(FieldLabel, Span)>,
    /// For groups this is the group's type name; the descriptor field name
    /// is derived by lowercasing it.
    pub name: Ident,
    pub kind: FieldKind,
    pub number: Int,
    pub options: Option<OptionList>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldLabel {
    Optional,
    Required,
    Repeated,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    Normal {
        ty: Ty,
        ty_span: Span,
    },
    Group {
        ty_span: Span,
        body: MessageBody,
    },
    Map {
        ty_span: Span,
        key_ty: Ty,
        key_ty_span: Span,
        value_ty: Ty,
        value_ty_span: Span,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Ty {
    Double,
    Float,
    Int32,
    Int64,
    Uint32,
    Uint64,
    Sint32,
    Sint64,
    Fixed32,
    Fixed64,
    Sfixed32,
    Sfixed64,
    Bool,
    String,
    Bytes,
    Named(TypeName),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Oneof {
    pub span: Span,
    pub comments: Comments,
    pub name: Ident,
    pub options: Vec<OptionDecl>,
    pub fields: Vec<Field>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Extend {
    pub span: Span,
    pub comments: Comments,
    pub extendee: TypeName,
    pub fields: Vec<Field>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reserved {
    pub span: Span,
    pub comments: Comments,
    pub kind: ReservedKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReservedKind {
    Ranges(Vec<ReservedRange>),
    Names(Vec<StringValue>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReservedRange {
    pub span: Span,
    pub start: Int,
    pub end: RangeEnd,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RangeEnd {
    /// A single number with no `to` clause.
    None,
    Int(Int),
    /// `to max`.
    Max(Span),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Extensions {
    pub span: Span,
    pub comments: Comments,
    pub ranges: Vec<ReservedRange>,
    pub options: Option<OptionList>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Enum {
    pub span: Span,
    pub comments: Comments,
    pub name: Ident,
    pub options: Vec<OptionDecl>,
    pub values: Vec<EnumValue>,
    pub reserved: Vec<Reserved>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumValue {
    pub span: Span,
    pub comments: Comments,
    pub name: Ident,
    pub number: Int,
    pub options: Option<OptionList>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Service {
    pub span: Span,
    pub comments: Comments,
    pub name: Ident,
    pub options: Vec<OptionDecl>,
    pub methods: Vec<Method>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Method {
    pub span: Span,
    pub comments: Comments,
    pub name: Ident,
    pub client_streaming: Option<Span>,
    pub input_ty: TypeName,
    pub server_streaming: Option<Span>,
    pub output_ty: TypeName,
    pub options: Vec<OptionDecl>,
}

/// A text-format message used as an option value, e.g.
/// `option (ext) = { foo: 1 bar { baz: "quz" } };`.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageLiteral {
    pub span: Span,
    pub fields: Vec<MessageLiteralField>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MessageLiteralField {
    pub span: Span,
    pub name: MessageLiteralFieldName,
    /// Whether a `:` was written; it is optional before message and list
    /// values.
    pub colon: bool,
    pub value: MessageLiteralValue,
    /// The `,` or `;` separator following this field, if written.
    pub separator: Option<char>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MessageLiteralFieldName {
    Ident(Ident),
    /// A bracketed extension name. The parts are the tokens between the
    /// brackets in source order, e.g. `["type.googleapis.com", "/",
    /// "foo", ".", "Bar"]`.
    Extension { span: Span, parts: Vec<String> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum MessageLiteralValue {
    Message {
        /// Whether the literal was delimited with `<`/`>` rather than
        /// `{`/`}`.
        angle_brackets: bool,
        value: MessageLiteral,
    },
    List {
        span: Span,
        values: Vec<MessageLiteralValue>,
    },
    Ident {
        negative: bool,
        value: Ident,
    },
    Int(Int),
    Float(Float),
    String(StringValue),
}

impl Ident {
    pub(crate) fn new(value: impl Into<String>, span: Span) -> Self {
        Ident {
            value: value.into(),
            span,
        }
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl FullIdent {
    pub fn span(&self) -> Span {
        join_span(
            self.parts.first().expect("empty FullIdent").span.clone(),
            self.parts.last().expect("empty FullIdent").span.clone(),
        )
    }
}

impl fmt::Display for FullIdent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for part in &self.parts {
            if !first {
                write!(f, ".")?;
            }
            write!(f, "{}", part)?;
            first = false;
        }
        Ok(())
    }
}

impl From<Ident> for FullIdent {
    fn from(value: Ident) -> Self {
        FullIdent { parts: vec![value] }
    }
}

impl From<Vec<Ident>> for FullIdent {
    fn from(parts: Vec<Ident>) -> Self {
        debug_assert!(!parts.is_empty());
        FullIdent { parts }
    }
}

impl TypeName {
    pub fn span(&self) -> Span {
        match &self.leading_dot {
            Some(dot) => join_span(dot.clone(), self.name.span()),
            None => self.name.span(),
        }
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.leading_dot.is_some() {
            write!(f, ".")?;
        }
        write!(f, "{}", self.name)
    }
}

impl fmt::Display for Syntax {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Syntax::Proto2 => write!(f, "proto2"),
            Syntax::Proto3 => write!(f, "proto3"),
        }
    }
}

impl FileItem {
    pub fn span(&self) -> Span {
        match self {
            FileItem::Message(message) => message.span.clone(),
            FileItem::Enum(enum_) => enum_.span.clone(),
            FileItem::Service(service) => service.span.clone(),
            FileItem::Extend(extend) => extend.span.clone(),
        }
    }
}

impl OptionValue {
    pub fn span(&self) -> Span {
        match self {
            OptionValue::Ident(ident) => ident.span(),
            OptionValue::Int(int) => int.span.clone(),
            OptionValue::Float(float) => float.span.clone(),
            OptionValue::String(string) => string.span.clone(),
            OptionValue::Aggregate(aggregate) => aggregate.span.clone(),
        }
    }
}

impl Int {
    /// The value as an `i64`, or `None` if it does not fit.
    pub fn as_i64(&self) -> Option<i64> {
        if self.negative {
            if self.value <= i64::MAX as u64 + 1 {
                Some((self.value as i128).wrapping_neg() as i64)
            } else {
                None
            }
        } else {
            i64::try_from(self.value).ok()
        }
    }

    /// The value as an `i32`, or `None` if it does not fit.
    pub fn as_i32(&self) -> Option<i32> {
        self.as_i64().and_then(|value| i32::try_from(value).ok())
    }
}
