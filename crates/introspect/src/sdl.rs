//! SDL (Schema Definition Language) rendering of an introspected schema.

use crate::types::{
    IntrospectionDirective, IntrospectionField, IntrospectionInputValue, IntrospectionSchema,
    IntrospectionType, IntrospectionTypeRef,
};
use std::fmt::Write;

/// Built-in GraphQL scalar types that should not be included in generated SDL.
const BUILTIN_SCALARS: &[&str] = &["Int", "Float", "String", "Boolean", "ID"];

/// Built-in directives that should not be included in generated SDL.
const BUILTIN_DIRECTIVES: &[&str] = &["skip", "include", "deprecated", "specifiedBy", "oneOf"];

/// Which descriptions to emit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct SdlOptions {
    /// Descriptions of the schema, types and directives.
    pub type_descriptions: bool,
    /// Descriptions of object, interface and input object fields.
    pub field_descriptions: bool,
    /// Descriptions of field and directive arguments.
    pub argument_descriptions: bool,
    /// Descriptions of enum values.
    pub enum_value_descriptions: bool,
}

impl SdlOptions {
    /// Turns every description toggle on or off at once.
    #[must_use]
    pub const fn with_descriptions(include: bool) -> Self {
        Self {
            type_descriptions: include,
            field_descriptions: include,
            argument_descriptions: include,
            enum_value_descriptions: include,
        }
    }
}

/// Renders an introspected schema as SDL.
///
/// Built-in scalars, introspection types (names starting with `__`) and
/// built-in directives are omitted. A `schema` block is only written when a
/// root operation type has a non-default name or the schema has a
/// description to emit.
#[must_use]
#[tracing::instrument(skip_all, fields(
    types = schema.types.len(),
    directives = schema.directives.len()
))]
pub fn render_sdl(schema: &IntrospectionSchema, options: &SdlOptions) -> String {
    let mut sdl = String::new();

    write_schema_definition(&mut sdl, schema, options);

    for directive in &schema.directives {
        if BUILTIN_DIRECTIVES.contains(&directive.name.as_str()) {
            continue;
        }
        write_directive(&mut sdl, directive, options);
        sdl.push_str("\n\n");
    }

    let mut types_written = 0;
    for type_def in &schema.types {
        let name = type_def.name();
        if name.starts_with("__") || BUILTIN_SCALARS.contains(&name) {
            continue;
        }

        write_type(&mut sdl, type_def, options);
        sdl.push_str("\n\n");
        types_written += 1;
    }

    tracing::debug!(
        types_written,
        sdl_length = sdl.len(),
        "SDL generation complete"
    );
    sdl.trim_end().to_string()
}

fn write_schema_definition(sdl: &mut String, schema: &IntrospectionSchema, options: &SdlOptions) {
    let is_custom = |root: Option<&IntrospectionTypeRef>, default: &str| {
        root.is_some_and(|t| t.name != default)
    };
    let description = schema
        .description
        .as_ref()
        .filter(|_| options.type_descriptions);

    let needs_schema_def = description.is_some()
        || is_custom(schema.query_type.as_ref(), "Query")
        || is_custom(schema.mutation_type.as_ref(), "Mutation")
        || is_custom(schema.subscription_type.as_ref(), "Subscription");

    if !needs_schema_def {
        return;
    }

    write_description(sdl, description, 0);
    sdl.push_str("schema {\n");
    if let Some(ref query) = schema.query_type {
        writeln!(sdl, "  query: {}", query.name).unwrap();
    }
    if let Some(ref mutation) = schema.mutation_type {
        writeln!(sdl, "  mutation: {}", mutation.name).unwrap();
    }
    if let Some(ref subscription) = schema.subscription_type {
        writeln!(sdl, "  subscription: {}", subscription.name).unwrap();
    }
    sdl.push_str("}\n\n");
}

fn write_directive(sdl: &mut String, directive: &IntrospectionDirective, options: &SdlOptions) {
    write_description(
        sdl,
        directive.description.as_ref().filter(|_| options.type_descriptions),
        0,
    );
    write!(sdl, "directive @{}", directive.name).unwrap();
    write_arguments(sdl, &directive.args, 0, options);
    if directive.is_repeatable {
        sdl.push_str(" repeatable");
    }
    sdl.push_str(" on ");
    sdl.push_str(&directive.locations.join(" | "));
}

fn write_type(sdl: &mut String, type_def: &IntrospectionType, options: &SdlOptions) {
    write_description(
        sdl,
        type_def.description().filter(|_| options.type_descriptions),
        0,
    );

    match type_def {
        IntrospectionType::Scalar(t) => {
            write!(sdl, "scalar {}", t.name).unwrap();
            if let Some(ref url) = t.specified_by_url {
                write!(sdl, " @specifiedBy(url: \"{}\")", escape_string(url)).unwrap();
            }
        }
        IntrospectionType::Object(t) => {
            write!(sdl, "type {}", t.name).unwrap();
            write_implements(sdl, &t.interfaces);
            write_fields(sdl, &t.fields, options);
        }
        IntrospectionType::Interface(t) => {
            write!(sdl, "interface {}", t.name).unwrap();
            write_implements(sdl, &t.interfaces);
            write_fields(sdl, &t.fields, options);
        }
        IntrospectionType::Union(t) => {
            write!(sdl, "union {} = ", t.name).unwrap();
            let members: Vec<_> = t.possible_types.iter().map(|m| m.name.as_str()).collect();
            sdl.push_str(&members.join(" | "));
        }
        IntrospectionType::Enum(t) => {
            writeln!(sdl, "enum {} {{", t.name).unwrap();
            for value in &t.enum_values {
                write_description(
                    sdl,
                    value
                        .description
                        .as_ref()
                        .filter(|_| options.enum_value_descriptions),
                    1,
                );
                write!(sdl, "  {}", value.name).unwrap();
                write_deprecation(sdl, value.is_deprecated, value.deprecation_reason.as_ref());
                sdl.push('\n');
            }
            sdl.push('}');
        }
        IntrospectionType::InputObject(t) => {
            write!(sdl, "input {}", t.name).unwrap();
            if t.is_one_of {
                sdl.push_str(" @oneOf");
            }
            sdl.push_str(" {\n");
            for field in &t.input_fields {
                write_description(
                    sdl,
                    field.description.as_ref().filter(|_| options.field_descriptions),
                    1,
                );
                sdl.push_str("  ");
                write_input_value(sdl, field);
                sdl.push('\n');
            }
            sdl.push('}');
        }
    }
}

fn write_implements(sdl: &mut String, interfaces: &[IntrospectionTypeRef]) {
    if interfaces.is_empty() {
        return;
    }
    let names: Vec<_> = interfaces.iter().map(|i| i.name.as_str()).collect();
    write!(sdl, " implements {}", names.join(" & ")).unwrap();
}

fn write_fields(sdl: &mut String, fields: &[IntrospectionField], options: &SdlOptions) {
    if fields.is_empty() {
        sdl.push_str(" {\n}");
        return;
    }
    sdl.push_str(" {\n");
    for field in fields {
        write_field(sdl, field, 1, options);
    }
    sdl.push('}');
}

fn write_field(sdl: &mut String, field: &IntrospectionField, indent: usize, options: &SdlOptions) {
    let indent_str = "  ".repeat(indent);

    write_description(
        sdl,
        field.description.as_ref().filter(|_| options.field_descriptions),
        indent,
    );
    write!(sdl, "{indent_str}{}", field.name).unwrap();
    write_arguments(sdl, &field.args, indent, options);
    write!(sdl, ": {}", field.type_ref.to_type_string()).unwrap();
    write_deprecation(sdl, field.is_deprecated, field.deprecation_reason.as_ref());
    sdl.push('\n');
}

/// Writes an argument list, one argument per line when any argument has a
/// description to show.
fn write_arguments(
    sdl: &mut String,
    args: &[IntrospectionInputValue],
    indent: usize,
    options: &SdlOptions,
) {
    if args.is_empty() {
        return;
    }

    let multiline =
        options.argument_descriptions && args.iter().any(|arg| arg.description.is_some());

    if multiline {
        let indent_str = "  ".repeat(indent);
        sdl.push_str("(\n");
        for arg in args {
            write_description(sdl, arg.description.as_ref(), indent + 1);
            write!(sdl, "{indent_str}  ").unwrap();
            write_input_value(sdl, arg);
            sdl.push('\n');
        }
        write!(sdl, "{indent_str})").unwrap();
    } else {
        sdl.push('(');
        for (i, arg) in args.iter().enumerate() {
            if i > 0 {
                sdl.push_str(", ");
            }
            write_input_value(sdl, arg);
        }
        sdl.push(')');
    }
}

fn write_input_value(sdl: &mut String, value: &IntrospectionInputValue) {
    write!(sdl, "{}: {}", value.name, value.type_ref.to_type_string()).unwrap();
    if let Some(default) = &value.default_value {
        write!(sdl, " = {default}").unwrap();
    }
    write_deprecation(sdl, value.is_deprecated, value.deprecation_reason.as_ref());
}

fn write_deprecation(sdl: &mut String, is_deprecated: bool, reason: Option<&String>) {
    if !is_deprecated {
        return;
    }
    match reason {
        Some(reason) if reason != "No longer supported" => {
            write!(sdl, " @deprecated(reason: \"{}\")", escape_string(reason)).unwrap();
        }
        _ => sdl.push_str(" @deprecated"),
    }
}

fn write_description(sdl: &mut String, description: Option<&String>, indent: usize) {
    let Some(desc) = description.filter(|d| !d.is_empty()) else {
        return;
    };
    let indent_str = "  ".repeat(indent);
    if desc.contains('\n') {
        writeln!(sdl, "{indent_str}\"\"\"").unwrap();
        for line in desc.lines() {
            if line.is_empty() {
                sdl.push('\n');
            } else {
                writeln!(sdl, "{indent_str}{}", line.replace("\"\"\"", "\\\"\"\"")).unwrap();
            }
        }
        writeln!(sdl, "{indent_str}\"\"\"").unwrap();
    } else {
        writeln!(sdl, "{indent_str}\"{}\"", escape_string(desc)).unwrap();
    }
}

fn escape_string(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}
