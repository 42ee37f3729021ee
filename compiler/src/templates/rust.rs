use std::collections::{BTreeMap, BTreeSet};

use breeze_schema::{Message, Method, Schema, Service, Type};

use crate::{
    context::GenerationContext,
    error::BreezeError,
    templates::{to_pascal_case, to_snake_case},
    traits::{CodeTemplate, GeneratedFiles, Plugin},
    utils::quote,
};

pub const RUST: &str = "rust";

/// Option naming the generated crate.
pub const RUST_CRATE: &str = "rust_crate";
const DEFAULT_CRATE: &str = "breeze-generated";

/// Emits one Rust module per schema and a crate around them.
#[derive(Debug, Default)]
pub struct RustTemplate;

impl Plugin for RustTemplate {
    fn name(&self) -> &str {
        RUST
    }
}

impl CodeTemplate for RustTemplate {
    fn generate_code(&self, schema: &Schema, context: &GenerationContext) -> Result<GeneratedFiles, BreezeError> {
        let mut files = GeneratedFiles::new();
        let code = compile_schema_to_rust(schema, context)?;
        files.insert(format!("src/{}.rs", module_name(schema)), code.into_bytes());
        Ok(files)
    }

    /// Writes `Cargo.toml` and a `lib.rs` declaring every schema module.
    fn finalize_run(&self, context: &GenerationContext) -> Result<GeneratedFiles, BreezeError> {
        let crate_name = context
            .options()
            .get(RUST_CRATE)
            .filter(|n| !n.is_empty())
            .map(String::as_str)
            .unwrap_or(DEFAULT_CRATE);

        let manifest = format!(
            "[package]\nname = {}\nversion = \"0.1.0\"\nedition = \"2021\"\n\n[dependencies]\n",
            quote(crate_name)
        );

        let mut modules: BTreeMap<String, &str> = BTreeMap::new();
        for schema in context.schemas().values() {
            if let Some(other) = modules.insert(module_name(schema), &schema.name) {
                return Err(template_error(format!(
                    "schemas {} and {} map onto the same module {}",
                    quote(other),
                    quote(&schema.name),
                    quote(&module_name(schema))
                )));
            }
        }

        let mut lib = vec![header("all schemas"), String::new()];
        for module in modules.keys() {
            lib.push(format!("pub mod {};", module));
        }
        lib.push(String::new());

        let mut files = GeneratedFiles::new();
        files.insert("Cargo.toml".to_string(), manifest.into_bytes());
        files.insert("src/lib.rs".to_string(), lib.join("\n").into_bytes());
        Ok(files)
    }
}

fn template_error(msg: String) -> BreezeError {
    BreezeError::Template { template: RUST.to_string(), msg }
}

/// Fails when two source names map onto the same Rust identifier.
fn check_unique<'a>(owner: &str, identifiers: impl IntoIterator<Item = &'a String>) -> Result<(), BreezeError> {
    let mut seen = BTreeSet::new();
    for identifier in identifiers {
        if !seen.insert(identifier) {
            return Err(template_error(format!(
                "{} has more than one member named {} in Rust",
                quote(owner),
                quote(identifier)
            )));
        }
    }
    Ok(())
}

fn header(source: &str) -> String {
    format!("// Generated by breeze-generator from {}. Do not edit.", source)
}

/// Module name of a schema: its file stem in snake_case.
fn module_name(schema: &Schema) -> String {
    let stem: String = schema
        .stem()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    let mut name = to_snake_case(&stem);
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert(0, '_');
    }
    escape_rust_keyword(&name)
}

const RESERVED: &[&str] = &[
    "as", "async", "await", "break", "const", "continue", "crate", "dyn", "else", "enum", "extern",
    "false", "fn", "for", "if", "impl", "in", "let", "loop", "match", "mod", "move", "mut", "pub",
    "ref", "return", "self", "Self", "static", "struct", "super", "trait", "true", "type", "unsafe",
    "use", "where", "while",
];

/// Appends `_` to reserved words, e.g. `type_`.
fn escape_rust_keyword(s: &str) -> String {
    let mut ident = s.to_string();
    if RESERVED.contains(&s) {
        ident.push('_');
    }
    ident
}

/// How a message reference is spelled in the module of `schema`.
struct Reference {
    path:    String,
    is_enum: bool,
}

fn reference(name: &str, schema: &Schema, context: &GenerationContext) -> Result<Reference, BreezeError> {
    let message = context.resolve_name(name, schema).ok_or_else(|| BreezeError::Template {
        template: RUST.to_string(),
        msg:      format!("type {} used in {} is not defined", quote(name), quote(&schema.name)),
    })?;

    let qualified = if name.contains('.') { name.to_string() } else { schema.qualified_name(name) };
    let owner = context
        .schemas()
        .values()
        .find(|s| s.messages.contains_key(&message.name) && s.qualified_name(&message.name) == qualified);

    let type_name = to_pascal_case(&message.name);
    let path = match owner {
        Some(owner) if owner.name != schema.name => format!("super::{}::{}", module_name(owner), type_name),
        _ => type_name,
    };
    Ok(Reference { path, is_enum: message.is_enum() })
}

/// Maps a schema type onto a Rust type. Directly embedded messages are
/// boxed and optional so that recursive messages stay representable.
fn map_type(type_: &Type, schema: &Schema, context: &GenerationContext, nested: bool) -> Result<String, BreezeError> {
    let rust_type = match type_ {
        Type::Bool    => "bool".to_string(),
        Type::String  => "String".to_string(),
        Type::Byte    => "u8".to_string(),
        Type::Bytes   => "Vec<u8>".to_string(),
        Type::Int16   => "i16".to_string(),
        Type::Int32   => "i32".to_string(),
        Type::Int64   => "i64".to_string(),
        Type::Float32 => "f32".to_string(),
        Type::Float64 => "f64".to_string(),
        Type::Map { key, value } => {
            if matches!(**key, Type::Float32 | Type::Float64) {
                return Err(BreezeError::Template {
                    template: RUST.to_string(),
                    msg:      format!("float map keys are not supported: {}", type_),
                });
            }
            format!(
                "HashMap<{}, {}>",
                map_type(key, schema, context, true)?,
                map_type(value, schema, context, true)?
            )
        }
        Type::Array { value } => format!("Vec<{}>", map_type(value, schema, context, true)?),
        Type::Message { name } => {
            let reference = reference(name, schema, context)?;
            if reference.is_enum || nested {
                reference.path
            } else {
                format!("Option<Box<{}>>", reference.path)
            }
        }
    };
    Ok(rust_type)
}

fn uses_map(schema: &Schema) -> bool {
    let is_map = |t: &Type| t.to_string().contains("map<");
    schema.messages.values().flat_map(|m| m.fields()).any(|f| is_map(&f.type_))
        || schema.services.values().flat_map(|s| s.methods.values()).any(|m| {
            m.params.values().any(|p| is_map(&p.type_)) || m.return_type.as_ref().map(is_map).unwrap_or(false)
        })
}

/// Compiles one schema into the source of a Rust module.
pub fn compile_schema_to_rust(schema: &Schema, context: &GenerationContext) -> Result<String, BreezeError> {
    let mut rust_code: Vec<String> = Vec::new();

    rust_code.push(header(&schema.name));
    if !schema.package.is_empty() {
        rust_code.push(format!("// Package: {}", schema.package));
    }
    rust_code.push("#![allow(dead_code)]".to_string());
    rust_code.push(String::new());
    if uses_map(schema) {
        rust_code.push("use std::collections::HashMap;".to_string());
        rust_code.push(String::new());
    }

    for message in schema.messages.values() {
        if message.is_enum() {
            rust_code.push(generate_enum(message)?);
        } else {
            rust_code.push(generate_struct(message, schema, context)?);
        }
    }

    for service in schema.services.values() {
        rust_code.push(generate_service(service, schema, context)?);
    }

    Ok(rust_code.join("\n"))
}

fn doc_lines(message: &Message) -> Vec<String> {
    match &message.alias {
        Some(alias) => vec![format!("/// Alias: `{}`", alias)],
        None => Vec::new(),
    }
}

/// Generates a `#[repr(i32)]` enum with an ordinal lookup.
fn generate_enum(message: &Message) -> Result<String, BreezeError> {
    let enum_name = to_pascal_case(&message.name);
    let variants: Vec<(i32, String)> = message
        .enum_values()
        .map(|(ordinal, name)| (ordinal, escape_rust_keyword(&to_pascal_case(name))))
        .collect();
    check_unique(&message.name, variants.iter().map(|(_, variant)| variant))?;

    let mut lines = doc_lines(message);
    lines.push("#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]".to_string());
    lines.push("#[repr(i32)]".to_string());
    lines.push(format!("pub enum {} {{", enum_name));
    for (ordinal, variant) in &variants {
        lines.push(format!("    {} = {},", variant, ordinal));
    }
    lines.push("}".to_string());
    lines.push(String::new());

    lines.push(format!("impl {} {{", enum_name));
    lines.push("    pub fn from_i32(value: i32) -> Option<Self> {".to_string());
    lines.push("        match value {".to_string());
    for (ordinal, variant) in &variants {
        lines.push(format!("            {} => Some({}::{}),", ordinal, enum_name, variant));
    }
    lines.push("            _ => None,".to_string());
    lines.push("        }".to_string());
    lines.push("    }".to_string());
    lines.push("}".to_string());
    lines.push(String::new());

    // The lowest ordinal is the default, so structs holding the enum can derive Default.
    if let Some((_, first)) = variants.first() {
        lines.push(format!("impl Default for {} {{", enum_name));
        lines.push("    fn default() -> Self {".to_string());
        lines.push(format!("        {}::{}", enum_name, first));
        lines.push("    }".to_string());
        lines.push("}".to_string());
        lines.push(String::new());
    }
    Ok(lines.join("\n"))
}

/// Generates a struct with one public field per message field, in index order.
fn generate_struct(message: &Message, schema: &Schema, context: &GenerationContext) -> Result<String, BreezeError> {
    let names: Vec<String> = message
        .fields()
        .map(|field| escape_rust_keyword(&to_snake_case(&field.name)))
        .collect();
    check_unique(&message.name, &names)?;

    let mut lines = doc_lines(message);
    lines.push("#[derive(Debug, Clone, PartialEq, Default)]".to_string());
    lines.push(format!("pub struct {} {{", to_pascal_case(&message.name)));
    for (field, name) in message.fields().zip(&names) {
        lines.push(format!("    /// Index {}", field.index));
        lines.push(format!("    pub {}: {},", name, map_type(&field.type_, schema, context, false)?));
    }
    lines.push("}".to_string());
    lines.push(String::new());
    Ok(lines.join("\n"))
}

/// Generates a trait with one method per service method.
fn generate_service(service: &Service, schema: &Schema, context: &GenerationContext) -> Result<String, BreezeError> {
    let names: Vec<String> = service
        .methods
        .keys()
        .map(|name| escape_rust_keyword(&to_snake_case(name)))
        .collect();
    check_unique(&service.name, &names)?;

    let mut lines = vec![format!("pub trait {} {{", to_pascal_case(&service.name))];
    for method in service.methods.values() {
        lines.push(format!("    {};", method_signature(method, schema, context)?));
    }
    lines.push("}".to_string());
    lines.push(String::new());
    Ok(lines.join("\n"))
}

fn method_signature(method: &Method, schema: &Schema, context: &GenerationContext) -> Result<String, BreezeError> {
    let names: Vec<String> = method
        .params
        .values()
        .map(|param| escape_rust_keyword(&to_snake_case(&param.name)))
        .collect();
    check_unique(&method.name, &names)?;

    let mut params = vec!["&self".to_string()];
    for (param, name) in method.params.values().zip(&names) {
        params.push(format!("{}: {}", name, map_type(&param.type_, schema, context, true)?));
    }
    let ret = match &method.return_type {
        Some(t) => format!(" -> {}", map_type(t, schema, context, true)?),
        None => String::new(),
    };
    Ok(format!(
        "fn {}({}){}",
        escape_rust_keyword(&to_snake_case(&method.name)),
        params.join(", "),
        ret
    ))
}
