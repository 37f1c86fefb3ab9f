use std::{
    collections::{hash_map::Entry, HashMap},
    fmt::Write,
    mem::take,
    ops::ControlFlow,
};

use prost_types::{
    descriptor_proto, field_descriptor_proto, source_code_info::Location, uninterpreted_option,
    DescriptorProto, EnumDescriptorProto, EnumOptions, EnumValueDescriptorProto, EnumValueOptions,
    ExtensionRangeOptions, FieldDescriptorProto, FieldOptions, FileDescriptorProto, FileOptions,
    MessageOptions, MethodDescriptorProto, MethodOptions, OneofDescriptorProto, OneofOptions,
    ServiceDescriptorProto, ServiceOptions, SourceCodeInfo, UninterpretedOption,
};

use crate::{
    ast,
    case::{to_json_name, to_pascal_case},
    error::ParseErrorKind,
    index_to_i32,
    lines::LineResolver,
    report::{Diagnostic, Reporter},
    tag, Span, MAX_MESSAGE_FIELD_NUMBER,
};

/// Translates an AST into a file descriptor.
///
/// With `validate` set, shallow well-formedness checks run alongside the
/// translation: name uniqueness within each scope and numeric bounds for
/// field and enum numbers. Deeper checks, such as type resolution and
/// option interpretation, are a linker's responsibility.
pub(crate) fn generate_file(
    name: &str,
    ast: &ast::File,
    lines: &LineResolver,
    validate: bool,
    reporter: &mut dyn Reporter,
) -> (FileDescriptorProto, Vec<ParseErrorKind>) {
    let mut ctx = Context {
        file_name: name,
        lines,
        syntax: ast.syntax,
        validate,
        path: Vec::new(),
        locations: Vec::new(),
        errors: Vec::new(),
        reporter,
        aborted: false,
    };

    let mut file = ctx.generate_file_descriptor(ast);
    file.name = Some(name.to_owned());
    file.source_code_info = Some(SourceCodeInfo {
        location: take(&mut ctx.locations),
    });
    (file, ctx.errors)
}

struct Context<'a, 'r> {
    file_name: &'a str,
    lines: &'a LineResolver,
    syntax: ast::Syntax,
    validate: bool,
    path: Vec<i32>,
    locations: Vec<Location>,
    errors: Vec<ParseErrorKind>,
    reporter: &'r mut dyn Reporter,
    aborted: bool,
}

/// Synthetic oneofs generated for proto3 optional fields. They are
/// appended after every declared oneof, so indices start at `base`.
struct SyntheticOneofs {
    base: usize,
    decls: Vec<OneofDescriptorProto>,
}

impl<'a, 'r> Context<'a, 'r> {
    fn generate_file_descriptor(&mut self, ast: &ast::File) -> FileDescriptorProto {
        self.add_location(ast.span.clone());

        let package = ast.package.as_ref().map(|package| {
            self.add_comments_for(
                &[tag::file::PACKAGE],
                package.span.clone(),
                &package.comments,
            );
            package.name.to_string()
        });

        let mut dependency = Vec::with_capacity(ast.imports.len());
        let mut public_dependency = Vec::new();
        let mut weak_dependency = Vec::new();
        for import in &ast.imports {
            let index = index_to_i32(dependency.len());

            self.add_comments_for(
                &[tag::file::DEPENDENCY, index],
                import.span.clone(),
                &import.comments,
            );

            dependency.push(self.utf8_string(&import.value));
            match import.kind {
                Some((ast::ImportKind::Public, _)) => {
                    self.add_location_for(
                        &[
                            tag::file::PUBLIC_DEPENDENCY,
                            index_to_i32(public_dependency.len()),
                        ],
                        import.span.clone(),
                    );
                    public_dependency.push(index);
                }
                Some((ast::ImportKind::Weak, _)) => {
                    self.add_location_for(
                        &[
                            tag::file::WEAK_DEPENDENCY,
                            index_to_i32(weak_dependency.len()),
                        ],
                        import.span.clone(),
                    );
                    weak_dependency.push(index);
                }
                None => (),
            }
        }

        let mut message_type = Vec::new();
        let mut enum_type = Vec::new();
        let mut service = Vec::new();
        let mut extension = Vec::new();
        let mut names = HashMap::new();

        for item in &ast.items {
            if self.aborted {
                break;
            }
            match item {
                ast::FileItem::Message(message_ast) => {
                    self.check_duplicate_name(&mut names, &message_ast.name);
                    self.path
                        .extend(&[tag::file::MESSAGE_TYPE, index_to_i32(message_type.len())]);
                    message_type.push(self.generate_message_descriptor(message_ast));
                    self.pop_path(2);
                }
                ast::FileItem::Enum(enum_ast) => {
                    self.check_duplicate_name(&mut names, &enum_ast.name);
                    self.path
                        .extend(&[tag::file::ENUM_TYPE, index_to_i32(enum_type.len())]);
                    enum_type.push(self.generate_enum_descriptor(enum_ast));
                    self.pop_path(2);
                }
                ast::FileItem::Service(service_ast) => {
                    self.check_duplicate_name(&mut names, &service_ast.name);
                    self.path
                        .extend(&[tag::file::SERVICE, index_to_i32(service.len())]);
                    service.push(self.generate_service_descriptor(service_ast));
                    self.pop_path(2);
                }
                ast::FileItem::Extend(extend_ast) => {
                    self.generate_extend_descriptors(
                        extend_ast,
                        tag::file::EXTENSION,
                        &mut extension,
                        tag::file::MESSAGE_TYPE,
                        &mut message_type,
                    );
                }
            }
        }

        self.path.push(tag::file::OPTIONS);
        let uninterpreted = self.generate_options(&ast.options);
        self.path.pop();
        let options = (!uninterpreted.is_empty()).then(|| FileOptions {
            uninterpreted_option: uninterpreted,
            ..Default::default()
        });

        if let Some((syntax_span, syntax_comments)) = &ast.syntax_span {
            self.add_comments_for(&[tag::file::SYNTAX], syntax_span.clone(), syntax_comments);
        }
        let syntax = ast.syntax_span.as_ref().map(|_| ast.syntax.to_string());

        FileDescriptorProto {
            name: None,
            package,
            dependency,
            public_dependency,
            weak_dependency,
            message_type,
            enum_type,
            service,
            extension,
            options,
            source_code_info: None,
            syntax,
        }
    }

    fn generate_message_descriptor(&mut self, ast: &ast::Message) -> DescriptorProto {
        self.add_comments(ast.span.clone(), &ast.comments);
        self.add_location_for(&[tag::message::NAME], ast.name.span.clone());

        DescriptorProto {
            name: Some(ast.name.value.clone()),
            ..self.generate_message_body_descriptor(&ast.body)
        }
    }

    fn generate_message_body_descriptor(&mut self, ast: &ast::MessageBody) -> DescriptorProto {
        let mut field = Vec::new();
        let mut extension = Vec::new();
        let mut nested_type = Vec::new();
        let mut enum_type = Vec::new();
        let mut oneof_decl = Vec::new();
        let mut extension_range = Vec::new();
        let mut reserved_range = Vec::new();
        let mut reserved_name = Vec::new();
        let mut names = HashMap::new();

        // Synthetic oneofs for proto3 optional fields are ordered after
        // every declared oneof.
        let real_oneofs = ast
            .items
            .iter()
            .filter(|item| matches!(item, ast::MessageItem::Oneof(_)))
            .count();
        let mut synthetic = SyntheticOneofs {
            base: real_oneofs,
            decls: Vec::new(),
        };

        for item in &ast.items {
            if self.aborted {
                break;
            }
            match item {
                ast::MessageItem::Field(field_ast) => {
                    self.check_duplicate_name(&mut names, &field_ast.name);
                    self.generate_field_descriptor(
                        field_ast,
                        tag::message::FIELD,
                        &mut field,
                        tag::message::NESTED_TYPE,
                        &mut nested_type,
                        None,
                        Some(&mut synthetic),
                        None,
                    );
                }
                ast::MessageItem::Oneof(oneof_ast) => {
                    self.check_duplicate_name(&mut names, &oneof_ast.name);
                    let index = index_to_i32(oneof_decl.len());
                    self.path.extend(&[tag::message::ONEOF_DECL, index]);
                    self.add_comments(oneof_ast.span.clone(), &oneof_ast.comments);
                    self.add_location_for(&[tag::oneof::NAME], oneof_ast.name.span.clone());
                    self.path.push(tag::oneof::OPTIONS);
                    let uninterpreted = self.generate_options(&oneof_ast.options);
                    self.path.pop();
                    self.pop_path(2);

                    oneof_decl.push(OneofDescriptorProto {
                        name: Some(oneof_ast.name.value.clone()),
                        options: (!uninterpreted.is_empty()).then(|| OneofOptions {
                            uninterpreted_option: uninterpreted,
                            ..Default::default()
                        }),
                    });

                    for field_ast in &oneof_ast.fields {
                        self.check_duplicate_name(&mut names, &field_ast.name);
                        self.generate_field_descriptor(
                            field_ast,
                            tag::message::FIELD,
                            &mut field,
                            tag::message::NESTED_TYPE,
                            &mut nested_type,
                            Some(index),
                            None,
                            None,
                        );
                    }
                }
                ast::MessageItem::Message(message_ast) => {
                    self.check_duplicate_name(&mut names, &message_ast.name);
                    self.path
                        .extend(&[tag::message::NESTED_TYPE, index_to_i32(nested_type.len())]);
                    nested_type.push(self.generate_message_descriptor(message_ast));
                    self.pop_path(2);
                }
                ast::MessageItem::Enum(enum_ast) => {
                    self.check_duplicate_name(&mut names, &enum_ast.name);
                    self.path
                        .extend(&[tag::message::ENUM_TYPE, index_to_i32(enum_type.len())]);
                    enum_type.push(self.generate_enum_descriptor(enum_ast));
                    self.pop_path(2);
                }
                ast::MessageItem::Extend(extend_ast) => {
                    self.generate_extend_descriptors(
                        extend_ast,
                        tag::message::EXTENSION,
                        &mut extension,
                        tag::message::NESTED_TYPE,
                        &mut nested_type,
                    );
                }
            }
        }

        for reserved in &ast.reserved {
            match &reserved.kind {
                ast::ReservedKind::Ranges(ranges) => {
                    self.path.push(tag::message::RESERVED_RANGE);
                    self.add_comments(reserved.span.clone(), &reserved.comments);
                    for range in ranges {
                        self.path.push(index_to_i32(reserved_range.len()));
                        self.add_location(range.span.clone());
                        reserved_range.push(self.generate_message_reserved_range(range));
                        self.path.pop();
                    }
                    self.path.pop();
                }
                ast::ReservedKind::Names(names) => {
                    self.path.push(tag::message::RESERVED_NAME);
                    self.add_comments(reserved.span.clone(), &reserved.comments);
                    for name in names {
                        self.path.push(index_to_i32(reserved_name.len()));
                        self.add_location(name.span.clone());
                        reserved_name.push(self.utf8_string(name));
                        self.path.pop();
                    }
                    self.path.pop();
                }
            }
        }

        self.path.push(tag::message::EXTENSION_RANGE);
        for extensions in &ast.extensions {
            self.add_comments(extensions.span.clone(), &extensions.comments);

            let uninterpreted = self.generate_option_list(&extensions.options);
            let options = (!uninterpreted.is_empty()).then(|| ExtensionRangeOptions {
                uninterpreted_option: uninterpreted,
                ..Default::default()
            });

            for range in &extensions.ranges {
                self.path.push(index_to_i32(extension_range.len()));
                self.add_location(range.span.clone());
                extension_range.push(self.generate_message_extension_range(range, options.clone()));
                self.path.pop();
            }
        }
        self.path.pop();

        self.path.push(tag::message::OPTIONS);
        let uninterpreted = self.generate_options(&ast.options);
        self.path.pop();
        let options = (!uninterpreted.is_empty()).then(|| MessageOptions {
            uninterpreted_option: uninterpreted,
            ..Default::default()
        });

        oneof_decl.extend(synthetic.decls);

        DescriptorProto {
            name: None,
            field,
            extension,
            nested_type,
            enum_type,
            extension_range,
            oneof_decl,
            options,
            reserved_range,
            reserved_name,
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn generate_field_descriptor(
        &mut self,
        ast: &ast::Field,
        field_tag: i32,
        fields: &mut Vec<FieldDescriptorProto>,
        message_tag: i32,
        messages: &mut Vec<DescriptorProto>,
        oneof_index: Option<i32>,
        mut synthetic: Option<&mut SyntheticOneofs>,
        extendee: Option<&ast::TypeName>,
    ) {
        let number = self.field_number(&ast.number);
        let index = index_to_i32(fields.len());

        let name;
        let r#type;
        let type_name;
        match &ast.kind {
            ast::FieldKind::Normal { ty, ty_span } => {
                name = ast.name.value.clone();

                self.path.extend(&[field_tag, index]);
                self.add_comments(ast.span.clone(), &ast.comments);
                self.add_location_for(&[tag::field::NAME], ast.name.span.clone());
                self.add_location_for(&[tag::field::NUMBER], ast.number.span.clone());
                if let Some((_, label_span)) = &ast.label {
                    self.add_location_for(&[tag::field::LABEL], label_span.clone());
                }
                match ty {
                    ast::Ty::Named(ty_name) => {
                        r#type = None;
                        type_name = Some(ty_name.to_string());
                        self.add_location_for(&[tag::field::TYPE_NAME], ty_span.clone());
                    }
                    scalar => {
                        r#type = Some(scalar_type(scalar));
                        type_name = None;
                        self.add_location_for(&[tag::field::TYPE], ty_span.clone());
                    }
                }
                self.pop_path(2);
            }
            ast::FieldKind::Group { ty_span, body } => {
                // The field is named by lowercasing the group name.
                name = ast.name.value.to_ascii_lowercase();
                r#type = Some(field_descriptor_proto::Type::Group);
                type_name = Some(ast.name.value.clone());

                self.path.extend(&[field_tag, index]);
                self.add_comments(ast.span.clone(), &ast.comments);
                self.add_location_for(&[tag::field::NUMBER], ast.number.span.clone());
                if let Some((_, label_span)) = &ast.label {
                    self.add_location_for(&[tag::field::LABEL], label_span.clone());
                }
                self.add_location_for(&[tag::field::TYPE], ty_span.clone());
                self.add_location_for(&[tag::field::TYPE_NAME], ast.name.span.clone());
                self.pop_path(2);

                self.path
                    .extend(&[message_tag, index_to_i32(messages.len())]);
                self.add_location_for(&[tag::message::NAME], ast.name.span.clone());
                let group = DescriptorProto {
                    name: Some(ast.name.value.clone()),
                    ..self.generate_message_body_descriptor(body)
                };
                self.pop_path(2);
                messages.push(group);
            }
            ast::FieldKind::Map {
                ty_span,
                key_ty,
                value_ty,
                ..
            } => {
                name = ast.name.value.clone();
                r#type = Some(field_descriptor_proto::Type::Message);
                let entry_name = to_pascal_case(&name) + "Entry";
                type_name = Some(entry_name.clone());

                self.path.extend(&[field_tag, index]);
                self.add_comments(ast.span.clone(), &ast.comments);
                self.add_location_for(&[tag::field::NAME], ast.name.span.clone());
                self.add_location_for(&[tag::field::NUMBER], ast.number.span.clone());
                self.add_location_for(&[tag::field::TYPE_NAME], ty_span.clone());
                self.pop_path(2);

                let (value_type, value_type_name) = match value_ty {
                    ast::Ty::Named(ty_name) => (None, Some(ty_name.to_string())),
                    scalar => (Some(scalar_type(scalar) as i32), None),
                };
                messages.push(DescriptorProto {
                    name: Some(entry_name),
                    field: vec![
                        FieldDescriptorProto {
                            name: Some("key".to_owned()),
                            json_name: Some("key".to_owned()),
                            number: Some(1),
                            label: Some(field_descriptor_proto::Label::Optional as i32),
                            r#type: Some(scalar_type(key_ty) as i32),
                            ..Default::default()
                        },
                        FieldDescriptorProto {
                            name: Some("value".to_owned()),
                            json_name: Some("value".to_owned()),
                            number: Some(2),
                            label: Some(field_descriptor_proto::Label::Optional as i32),
                            r#type: value_type,
                            type_name: value_type_name,
                            ..Default::default()
                        },
                    ],
                    options: Some(MessageOptions {
                        map_entry: Some(true),
                        ..Default::default()
                    }),
                    ..Default::default()
                });
            }
        }

        let mut proto3_optional = None;
        let mut oneof_index = oneof_index;
        if oneof_index.is_none()
            && self.syntax == ast::Syntax::Proto3
            && matches!(ast.label, Some((ast::FieldLabel::Optional, _)))
            && matches!(ast.kind, ast::FieldKind::Normal { .. })
            && extendee.is_none()
        {
            if let Some(synthetic) = synthetic.as_deref_mut() {
                proto3_optional = Some(true);
                oneof_index = Some(index_to_i32(synthetic.base + synthetic.decls.len()));
                synthetic.decls.push(OneofDescriptorProto {
                    name: Some(format!("_{}", name)),
                    options: None,
                });
            }
        }

        let label = match (&ast.label, &ast.kind) {
            (_, ast::FieldKind::Map { .. }) => field_descriptor_proto::Label::Repeated,
            (Some((ast::FieldLabel::Required, _)), _) => field_descriptor_proto::Label::Required,
            (Some((ast::FieldLabel::Repeated, _)), _) => field_descriptor_proto::Label::Repeated,
            _ => field_descriptor_proto::Label::Optional,
        };

        self.path.extend(&[field_tag, index, tag::field::OPTIONS]);
        let uninterpreted = self.generate_option_list(&ast.options);
        self.pop_path(3);
        let options = (!uninterpreted.is_empty()).then(|| FieldOptions {
            uninterpreted_option: uninterpreted,
            ..Default::default()
        });

        let json_name = Some(to_json_name(&name));
        fields.push(FieldDescriptorProto {
            name: Some(name),
            number,
            label: Some(label as i32),
            r#type: r#type.map(|t| t as i32),
            type_name,
            extendee: extendee.map(|extendee| extendee.to_string()),
            default_value: None,
            oneof_index,
            json_name,
            options,
            proto3_optional,
        });
    }

    fn generate_extend_descriptors(
        &mut self,
        ast: &ast::Extend,
        extension_tag: i32,
        extensions: &mut Vec<FieldDescriptorProto>,
        message_tag: i32,
        messages: &mut Vec<DescriptorProto>,
    ) {
        for field_ast in &ast.fields {
            self.generate_field_descriptor(
                field_ast,
                extension_tag,
                extensions,
                message_tag,
                messages,
                None,
                None,
                Some(&ast.extendee),
            );
        }
    }

    fn generate_enum_descriptor(&mut self, ast: &ast::Enum) -> EnumDescriptorProto {
        self.add_comments(ast.span.clone(), &ast.comments);
        self.add_location_for(&[tag::enum_::NAME], ast.name.span.clone());

        let mut value = Vec::with_capacity(ast.values.len());
        let mut names = HashMap::new();
        for value_ast in &ast.values {
            self.check_duplicate_name(&mut names, &value_ast.name);

            self.path
                .extend(&[tag::enum_::VALUE, index_to_i32(value.len())]);
            self.add_comments(value_ast.span.clone(), &value_ast.comments);
            self.add_location_for(&[tag::enum_value::NAME], value_ast.name.span.clone());
            self.add_location_for(&[tag::enum_value::NUMBER], value_ast.number.span.clone());

            self.path.push(tag::enum_value::OPTIONS);
            let uninterpreted = self.generate_option_list(&value_ast.options);
            self.path.pop();
            self.pop_path(2);

            value.push(EnumValueDescriptorProto {
                name: Some(value_ast.name.value.clone()),
                number: Some(self.enum_number(&value_ast.number)),
                options: (!uninterpreted.is_empty()).then(|| EnumValueOptions {
                    uninterpreted_option: uninterpreted,
                    ..Default::default()
                }),
            });
        }

        let mut reserved_range = Vec::new();
        let mut reserved_name = Vec::new();
        for reserved in &ast.reserved {
            match &reserved.kind {
                ast::ReservedKind::Ranges(ranges) => {
                    self.path.push(tag::enum_::RESERVED_RANGE);
                    self.add_comments(reserved.span.clone(), &reserved.comments);
                    for range in ranges {
                        self.path.push(index_to_i32(reserved_range.len()));
                        self.add_location(range.span.clone());
                        reserved_range.push(self.generate_enum_reserved_range(range));
                        self.path.pop();
                    }
                    self.path.pop();
                }
                ast::ReservedKind::Names(names) => {
                    self.path.push(tag::enum_::RESERVED_NAME);
                    self.add_comments(reserved.span.clone(), &reserved.comments);
                    for name in names {
                        self.path.push(index_to_i32(reserved_name.len()));
                        self.add_location(name.span.clone());
                        reserved_name.push(self.utf8_string(name));
                        self.path.pop();
                    }
                    self.path.pop();
                }
            }
        }

        self.path.push(tag::enum_::OPTIONS);
        let uninterpreted = self.generate_options(&ast.options);
        self.path.pop();
        let options = (!uninterpreted.is_empty()).then(|| EnumOptions {
            uninterpreted_option: uninterpreted,
            ..Default::default()
        });

        EnumDescriptorProto {
            name: Some(ast.name.value.clone()),
            value,
            options,
            reserved_range,
            reserved_name,
        }
    }

    fn generate_service_descriptor(&mut self, ast: &ast::Service) -> ServiceDescriptorProto {
        self.add_comments(ast.span.clone(), &ast.comments);
        self.add_location_for(&[tag::service::NAME], ast.name.span.clone());

        let mut method = Vec::with_capacity(ast.methods.len());
        let mut names = HashMap::new();
        for method_ast in &ast.methods {
            self.check_duplicate_name(&mut names, &method_ast.name);

            self.path
                .extend(&[tag::service::METHOD, index_to_i32(method.len())]);
            self.add_comments(method_ast.span.clone(), &method_ast.comments);
            self.add_location_for(&[tag::method::NAME], method_ast.name.span.clone());
            self.add_location_for(&[tag::method::INPUT_TYPE], method_ast.input_ty.span());
            self.add_location_for(&[tag::method::OUTPUT_TYPE], method_ast.output_ty.span());
            if let Some(span) = &method_ast.client_streaming {
                self.add_location_for(&[tag::method::CLIENT_STREAMING], span.clone());
            }
            if let Some(span) = &method_ast.server_streaming {
                self.add_location_for(&[tag::method::SERVER_STREAMING], span.clone());
            }

            self.path.push(tag::method::OPTIONS);
            let uninterpreted = self.generate_options(&method_ast.options);
            self.path.pop();
            self.pop_path(2);

            method.push(MethodDescriptorProto {
                name: Some(method_ast.name.value.clone()),
                input_type: Some(method_ast.input_ty.to_string()),
                output_type: Some(method_ast.output_ty.to_string()),
                options: (!uninterpreted.is_empty()).then(|| MethodOptions {
                    uninterpreted_option: uninterpreted,
                    ..Default::default()
                }),
                client_streaming: method_ast.client_streaming.as_ref().map(|_| true),
                server_streaming: method_ast.server_streaming.as_ref().map(|_| true),
            });
        }

        self.path.push(tag::service::OPTIONS);
        let uninterpreted = self.generate_options(&ast.options);
        self.path.pop();
        let options = (!uninterpreted.is_empty()).then(|| ServiceOptions {
            uninterpreted_option: uninterpreted,
            ..Default::default()
        });

        ServiceDescriptorProto {
            name: Some(ast.name.value.clone()),
            method,
            options,
        }
    }

    fn generate_options(&mut self, options: &[ast::OptionDecl]) -> Vec<UninterpretedOption> {
        let mut result = Vec::with_capacity(options.len());
        for option in options {
            self.path
                .extend(&[tag::UNINTERPRETED_OPTION, index_to_i32(result.len())]);
            self.add_comments(option.span.clone(), &option.comments);
            result.push(self.uninterpreted_option(&option.body));
            self.pop_path(2);
        }
        result
    }

    fn generate_option_list(&mut self, options: &Option<ast::OptionList>) -> Vec<UninterpretedOption> {
        let mut result = Vec::new();
        if let Some(list) = options {
            for body in &list.options {
                self.path
                    .extend(&[tag::UNINTERPRETED_OPTION, index_to_i32(result.len())]);
                self.add_location(body.span.clone());
                result.push(self.uninterpreted_option(body));
                self.pop_path(2);
            }
        }
        result
    }

    /// Converts an option to its uninterpreted descriptor form. Options
    /// are not resolved against their descriptors here; interpreting them
    /// requires type information only a linker has.
    fn uninterpreted_option(&mut self, body: &ast::OptionBody) -> UninterpretedOption {
        let name = body
            .name
            .iter()
            .map(|part| match part {
                ast::OptionNamePart::Ident(ident) => uninterpreted_option::NamePart {
                    name_part: ident.value.clone(),
                    is_extension: false,
                },
                ast::OptionNamePart::Extension { name, .. } => uninterpreted_option::NamePart {
                    name_part: name.to_string(),
                    is_extension: true,
                },
            })
            .collect();

        let mut option = UninterpretedOption {
            name,
            ..Default::default()
        };
        match &body.value {
            ast::OptionValue::Ident(ident) => {
                option.identifier_value = Some(ident.to_string());
            }
            ast::OptionValue::Int(int) if !int.negative => {
                option.positive_int_value = Some(int.value);
            }
            ast::OptionValue::Int(int) => match int.as_i64() {
                Some(value) => option.negative_int_value = Some(value),
                None => {
                    self.add_error(ParseErrorKind::NegativeIntegerOutOfRange {
                        span: int.span.clone(),
                    });
                }
            },
            ast::OptionValue::Float(float) => {
                option.double_value = Some(float.value);
            }
            ast::OptionValue::String(string) => {
                option.string_value = Some(string.value.clone());
            }
            ast::OptionValue::Aggregate(literal) => {
                option.aggregate_value = Some(serialize_message_literal(literal));
            }
        }
        option
    }

    fn generate_message_reserved_range(
        &mut self,
        range: &ast::ReservedRange,
    ) -> descriptor_proto::ReservedRange {
        let start = self.field_number(&range.start);
        let end = match &range.end {
            ast::RangeEnd::None => start.map(|start| start.saturating_add(1)),
            ast::RangeEnd::Int(int) => self.field_number(int).map(|end| end.saturating_add(1)),
            ast::RangeEnd::Max(_) => Some(MAX_MESSAGE_FIELD_NUMBER + 1),
        };

        descriptor_proto::ReservedRange { start, end }
    }

    fn generate_message_extension_range(
        &mut self,
        range: &ast::ReservedRange,
        options: Option<ExtensionRangeOptions>,
    ) -> descriptor_proto::ExtensionRange {
        let start = self.field_number(&range.start);
        let end = match &range.end {
            ast::RangeEnd::None => start.map(|start| start.saturating_add(1)),
            ast::RangeEnd::Int(int) => self.field_number(int).map(|end| end.saturating_add(1)),
            ast::RangeEnd::Max(_) => Some(MAX_MESSAGE_FIELD_NUMBER + 1),
        };

        descriptor_proto::ExtensionRange {
            start,
            end,
            options,
        }
    }

    fn generate_enum_reserved_range(
        &mut self,
        range: &ast::ReservedRange,
    ) -> prost_types::enum_descriptor_proto::EnumReservedRange {
        let start = self.enum_number(&range.start);
        let end = match &range.end {
            ast::RangeEnd::None => start,
            ast::RangeEnd::Int(int) => self.enum_number(int),
            ast::RangeEnd::Max(_) => i32::MAX,
        };

        prost_types::enum_descriptor_proto::EnumReservedRange {
            start: Some(start),
            end: Some(end),
        }
    }

    fn field_number(&mut self, int: &ast::Int) -> Option<i32> {
        match int.as_i64() {
            Some(value) if (1..=MAX_MESSAGE_FIELD_NUMBER as i64).contains(&value) => {
                Some(value as i32)
            }
            _ => {
                if self.validate {
                    self.add_error(ParseErrorKind::InvalidMessageNumber {
                        span: int.span.clone(),
                    });
                }
                Some(int.as_i32().unwrap_or_default())
            }
        }
    }

    fn enum_number(&mut self, int: &ast::Int) -> i32 {
        match int.as_i32() {
            Some(value) => value,
            None => {
                if self.validate {
                    self.add_error(ParseErrorKind::InvalidEnumNumber {
                        span: int.span.clone(),
                    });
                }
                0
            }
        }
    }

    fn utf8_string(&mut self, string: &ast::StringValue) -> String {
        match std::str::from_utf8(&string.value) {
            Ok(value) => value.to_owned(),
            Err(_) => {
                self.add_error(ParseErrorKind::InvalidUtf8String {
                    span: string.span.clone(),
                });
                String::from_utf8_lossy(&string.value).into_owned()
            }
        }
    }

    fn check_duplicate_name(&mut self, names: &mut HashMap<String, Span>, name: &ast::Ident) {
        if !self.validate {
            return;
        }
        match names.entry(name.value.clone()) {
            Entry::Occupied(entry) => {
                let first = entry.get().clone();
                self.add_error(ParseErrorKind::DuplicateName {
                    name: name.value.clone(),
                    first,
                    second: name.span.clone(),
                });
            }
            Entry::Vacant(entry) => {
                entry.insert(name.span.clone());
            }
        }
    }

    fn add_location(&mut self, span: Span) {
        let span = self.lines.resolve_span(span);
        self.locations.push(Location {
            path: self.path.clone(),
            span,
            ..Default::default()
        });
    }

    fn add_comments(&mut self, span: Span, comments: &ast::Comments) {
        let span = self.lines.resolve_span(span);
        self.locations.push(Location {
            path: self.path.clone(),
            span,
            leading_comments: comments.leading.clone(),
            trailing_comments: comments.trailing.clone(),
            leading_detached_comments: comments.leading_detached.clone(),
        });
    }

    fn add_location_for(&mut self, path_items: &[i32], span: Span) {
        self.path.extend_from_slice(path_items);
        self.add_location(span);
        self.pop_path(path_items.len());
    }

    fn add_comments_for(&mut self, path_items: &[i32], span: Span, comments: &ast::Comments) {
        self.path.extend_from_slice(path_items);
        self.add_comments(span, comments);
        self.pop_path(path_items.len());
    }

    fn pop_path(&mut self, n: usize) {
        self.path.truncate(self.path.len() - n);
    }

    fn add_error(&mut self, kind: ParseErrorKind) {
        let span = kind.span();
        let (line, column) = match &span {
            Some(span) => self.lines.resolve(span.start),
            None => (0, 0),
        };
        let diagnostic = Diagnostic {
            file: self.file_name.to_owned(),
            line: line + 1,
            column: column + 1,
            span,
            message: kind.to_string(),
        };
        if let ControlFlow::Break(()) = self.reporter.report_error(&diagnostic) {
            self.aborted = true;
        }
        self.errors.push(kind);
    }
}

fn scalar_type(ty: &ast::Ty) -> field_descriptor_proto::Type {
    match ty {
        ast::Ty::Double => field_descriptor_proto::Type::Double,
        ast::Ty::Float => field_descriptor_proto::Type::Float,
        ast::Ty::Int32 => field_descriptor_proto::Type::Int32,
        ast::Ty::Int64 => field_descriptor_proto::Type::Int64,
        ast::Ty::Uint32 => field_descriptor_proto::Type::Uint32,
        ast::Ty::Uint64 => field_descriptor_proto::Type::Uint64,
        ast::Ty::Sint32 => field_descriptor_proto::Type::Sint32,
        ast::Ty::Sint64 => field_descriptor_proto::Type::Sint64,
        ast::Ty::Fixed32 => field_descriptor_proto::Type::Fixed32,
        ast::Ty::Fixed64 => field_descriptor_proto::Type::Fixed64,
        ast::Ty::Sfixed32 => field_descriptor_proto::Type::Sfixed32,
        ast::Ty::Sfixed64 => field_descriptor_proto::Type::Sfixed64,
        ast::Ty::Bool => field_descriptor_proto::Type::Bool,
        ast::Ty::String => field_descriptor_proto::Type::String,
        ast::Ty::Bytes => field_descriptor_proto::Type::Bytes,
        ast::Ty::Named(_) => unreachable!("named types have no scalar type"),
    }
}

/// Serializes a message literal back to text form, with every token
/// separated by a single space, matching protoc's `aggregate_value`
/// output.
fn serialize_message_literal(literal: &ast::MessageLiteral) -> String {
    let mut tokens = Vec::new();
    push_literal_fields(&mut tokens, literal);
    tokens.join(" ")
}

fn push_literal_fields(tokens: &mut Vec<String>, literal: &ast::MessageLiteral) {
    for field in &literal.fields {
        match &field.name {
            ast::MessageLiteralFieldName::Ident(ident) => tokens.push(ident.value.clone()),
            ast::MessageLiteralFieldName::Extension { parts, .. } => {
                tokens.push("[".to_owned());
                tokens.extend(parts.iter().cloned());
                tokens.push("]".to_owned());
            }
        }
        if field.colon {
            tokens.push(":".to_owned());
        }
        push_literal_value(tokens, &field.value);
        if let Some(separator) = field.separator {
            tokens.push(separator.to_string());
        }
    }
}

fn push_literal_value(tokens: &mut Vec<String>, value: &ast::MessageLiteralValue) {
    match value {
        ast::MessageLiteralValue::Message {
            angle_brackets,
            value,
        } => {
            tokens.push(if *angle_brackets { "<" } else { "{" }.to_owned());
            push_literal_fields(tokens, value);
            tokens.push(if *angle_brackets { ">" } else { "}" }.to_owned());
        }
        ast::MessageLiteralValue::List { values, .. } => {
            tokens.push("[".to_owned());
            for (index, value) in values.iter().enumerate() {
                if index > 0 {
                    tokens.push(",".to_owned());
                }
                push_literal_value(tokens, value);
            }
            tokens.push("]".to_owned());
        }
        ast::MessageLiteralValue::Ident { negative, value } => {
            if *negative {
                tokens.push(format!("-{}", value.value));
            } else {
                tokens.push(value.value.clone());
            }
        }
        ast::MessageLiteralValue::Int(int) => {
            if int.negative {
                tokens.push(format!("-{}", int.value));
            } else {
                tokens.push(int.value.to_string());
            }
        }
        ast::MessageLiteralValue::Float(float) => tokens.push(format_float(float.value)),
        ast::MessageLiteralValue::String(string) => tokens.push(quote_bytes(&string.value)),
    }
}

fn format_float(value: f64) -> String {
    if value.is_infinite() {
        if value < 0.0 { "-inf" } else { "inf" }.to_owned()
    } else if value.is_nan() {
        "nan".to_owned()
    } else if value.fract() == 0.0 {
        format!("{:.1}", value)
    } else {
        value.to_string()
    }
}

fn quote_bytes(bytes: &[u8]) -> String {
    let mut result = String::with_capacity(bytes.len() + 2);
    result.push('"');
    for &byte in bytes {
        match byte {
            b'\n' => result.push_str("\\n"),
            b'\r' => result.push_str("\\r"),
            b'\t' => result.push_str("\\t"),
            b'"' => result.push_str("\\\""),
            b'\\' => result.push_str("\\\\"),
            0x20..=0x7e => result.push(byte as char),
            _ => write!(result, "\\x{:02x}", byte).expect("writing to string cannot fail"),
        }
    }
    result.push('"');
    result
}
