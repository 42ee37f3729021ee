use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Serialize, Serializer};
use thiserror::Error;

lazy_static! {
    static ref MESSAGE_NAME: Regex = Regex::new(r"^[A-Za-z_][\w.]*$").unwrap();
}

const MAP_PREFIX:   &str = "map<";
const ARRAY_PREFIX: &str = "array<";

/// Errors produced while reading type text.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TypeError {
    #[error("type is empty")]
    Empty,

    #[error("wrong map key type: {0}")]
    WrongMapKey(String),

    #[error("unbalanced container type: {0}")]
    Unbalanced(String),

    #[error("illegal type name: {0}")]
    IllegalName(String),
}

/// A field, parameter or return type.
///
/// Message references hold the (possibly qualified) name only. They are
/// resolved late, once every schema of a run is known.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Bool,
    String,
    Byte,
    Bytes,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    Map { key: Box<Type>, value: Box<Type> },
    Array { value: Box<Type> },
    Message { name: String },
}

impl Type {
    /// Primitive types are the only legal map keys.
    pub fn is_primitive(&self) -> bool {
        !matches!(self, Type::Map { .. } | Type::Array { .. } | Type::Message { .. })
    }

    pub fn message_name(&self) -> Option<&str> {
        match self {
            Type::Message { name } => Some(name),
            _ => None,
        }
    }

    /// Calls `f` for every message reference nested in this type.
    pub fn visit_messages<'a>(&'a self, f: &mut dyn FnMut(&'a str)) {
        match self {
            Type::Map { key, value } => {
                key.visit_messages(f);
                value.visit_messages(f);
            }
            Type::Array { value } => value.visit_messages(f),
            Type::Message { name } => f(name),
            _ => {}
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Bool               => f.write_str("bool"),
            Type::String             => f.write_str("string"),
            Type::Byte               => f.write_str("byte"),
            Type::Bytes              => f.write_str("bytes"),
            Type::Int16              => f.write_str("int16"),
            Type::Int32              => f.write_str("int32"),
            Type::Int64              => f.write_str("int64"),
            Type::Float32            => f.write_str("float32"),
            Type::Float64            => f.write_str("float64"),
            Type::Map { key, value } => write!(f, "map<{},{}>", key, value),
            Type::Array { value }    => write!(f, "array<{}>", value),
            Type::Message { name }   => f.write_str(name),
        }
    }
}

impl Serialize for Type {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Parse a type expression such as `map<string,array<pkg.Foo>>`.
///
/// With `strip_package` set, message references keep only the segment after
/// the last `.`; this is how the uniform-package mode flattens names.
pub fn parse_type(text: &str, strip_package: bool) -> Result<Type, TypeError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(TypeError::Empty);
    }

    let primitive = match text {
        "bool"           => Some(Type::Bool),
        "string"         => Some(Type::String),
        "byte"           => Some(Type::Byte),
        "bytes"          => Some(Type::Bytes),
        "int16"          => Some(Type::Int16),
        "int" | "int32"  => Some(Type::Int32),
        "int64"          => Some(Type::Int64),
        "float32"        => Some(Type::Float32),
        "float64"        => Some(Type::Float64),
        _                => None,
    };
    if let Some(t) = primitive {
        return Ok(t);
    }

    if let Some(inner) = container_inner(text, MAP_PREFIX)? {
        let comma = top_level_comma(inner).ok_or_else(|| TypeError::Unbalanced(text.to_string()))?;
        let key = parse_type(&inner[..comma], strip_package)?;
        if !key.is_primitive() {
            return Err(TypeError::WrongMapKey(text.to_string()));
        }
        let value = parse_type(&inner[comma + 1..], strip_package)?;
        return Ok(Type::Map { key: Box::new(key), value: Box::new(value) });
    }

    if let Some(inner) = container_inner(text, ARRAY_PREFIX)? {
        if top_level_comma(inner).is_some() {
            return Err(TypeError::Unbalanced(text.to_string()));
        }
        let value = parse_type(inner, strip_package)?;
        return Ok(Type::Array { value: Box::new(value) });
    }

    if !MESSAGE_NAME.is_match(text) || text.ends_with('.') || text.contains("..") {
        return Err(TypeError::IllegalName(text.to_string()));
    }
    let name = match text.rfind('.') {
        Some(dot) if strip_package => &text[dot + 1..],
        _ => text,
    };
    Ok(Type::Message { name: name.to_string() })
}

/// Returns the text between `prefix` and the closing `>`, if `text` is a
/// container of that kind. The brackets must balance exactly.
fn container_inner<'a>(text: &'a str, prefix: &str) -> Result<Option<&'a str>, TypeError> {
    if !text.starts_with(prefix) {
        return Ok(None);
    }
    let mut depth = 0usize;
    for (i, c) in text.char_indices() {
        match c {
            '<' => depth += 1,
            '>' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| TypeError::Unbalanced(text.to_string()))?;
                if depth == 0 && i != text.len() - 1 {
                    return Err(TypeError::Unbalanced(text.to_string()));
                }
            }
            _ => {}
        }
    }
    if depth != 0 || !text.ends_with('>') {
        return Err(TypeError::Unbalanced(text.to_string()));
    }
    Ok(Some(&text[prefix.len()..text.len() - 1]))
}

fn top_level_comma(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in text.char_indices() {
        match c {
            '<' => depth += 1,
            '>' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => return Some(i),
            _ => {}
        }
    }
    None
}

/// Length in bytes of the type expression at the start of `text`, leading
/// whitespace included.
///
/// The scanner descends into `map<`/`array<` so that a `,` or `>` only ends
/// the type once every bracket opened by it is closed again. A plain name
/// ends at the first character that cannot be part of a qualified name.
pub fn type_extent(text: &str) -> Result<usize, TypeError> {
    let start = text.len() - text.trim_start().len();
    let rest = &text[start..];

    if let Some(body) = rest.strip_prefix(MAP_PREFIX) {
        let mut pos = start + MAP_PREFIX.len();
        pos += type_extent(body)?;
        pos = expect_delimiter(text, pos, ',')?;
        pos += type_extent(&text[pos..])?;
        return expect_delimiter(text, pos, '>');
    }

    if let Some(body) = rest.strip_prefix(ARRAY_PREFIX) {
        let mut pos = start + ARRAY_PREFIX.len();
        pos += type_extent(body)?;
        return expect_delimiter(text, pos, '>');
    }

    let len = rest
        .find(|c: char| !(c.is_alphanumeric() || c == '_' || c == '.'))
        .unwrap_or(rest.len());
    if len == 0 {
        return Err(TypeError::Empty);
    }
    Ok(start + len)
}

/// Skips whitespace after `pos` and consumes `delimiter`, returning the
/// position just past it.
fn expect_delimiter(text: &str, pos: usize, delimiter: char) -> Result<usize, TypeError> {
    let rest = &text[pos..];
    let skipped = rest.len() - rest.trim_start().len();
    if rest[skipped..].starts_with(delimiter) {
        Ok(pos + skipped + delimiter.len_utf8())
    } else {
        Err(TypeError::Unbalanced(text.trim().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_keywords_keep_their_text() {
        for keyword in ["bool", "string", "byte", "bytes", "int16", "int32", "int64", "float32", "float64"] {
            let t = parse_type(keyword, false).unwrap();
            assert!(t.is_primitive());
            assert_eq!(t.to_string(), keyword);
        }
    }

    #[test]
    fn test_int_is_an_alias_for_int32() {
        assert_eq!(parse_type(" int ", false).unwrap(), Type::Int32);
        assert_eq!(parse_type("int", false).unwrap().to_string(), "int32");
    }

    #[test]
    fn test_map_key_must_be_primitive() {
        let err = parse_type("map<array<int32>,string>", false).unwrap_err();
        assert!(matches!(err, TypeError::WrongMapKey(_)), "got {:?}", err);

        let err = parse_type("map<Foo,string>", false).unwrap_err();
        assert!(matches!(err, TypeError::WrongMapKey(_)), "got {:?}", err);
    }

    #[test]
    fn test_map_with_container_value() {
        let t = parse_type("map<string,array<int32>>", false).unwrap();
        match t {
            Type::Map { key, value } => {
                assert_eq!(*key, Type::String);
                assert_eq!(*value, Type::Array { value: Box::new(Type::Int32) });
            }
            other => panic!("expected a map, got {:?}", other),
        }
    }

    #[test]
    fn test_deeply_nested_containers() {
        let text = "map<string, array<map<int64, array<array<pkg.Foo>>>>>";
        let t = parse_type(text, false).unwrap();
        assert_eq!(t.to_string(), "map<string,array<map<int64,array<array<pkg.Foo>>>>>");

        let mut names = Vec::new();
        t.visit_messages(&mut |n| names.push(n.to_string()));
        assert_eq!(names, vec!["pkg.Foo".to_string()]);
    }

    #[test]
    fn test_message_reference_and_strip_package() {
        assert_eq!(
            parse_type("pkg.a.Foo", false).unwrap(),
            Type::Message { name: "pkg.a.Foo".into() }
        );
        assert_eq!(
            parse_type("array<pkg.a.Foo>", true).unwrap(),
            Type::Array { value: Box::new(Type::Message { name: "Foo".into() }) }
        );
    }

    #[test]
    fn test_malformed_types() {
        assert_eq!(parse_type("   ", false).unwrap_err(), TypeError::Empty);
        assert!(matches!(parse_type("map<string,int32", false), Err(TypeError::Unbalanced(_))));
        assert!(matches!(parse_type("map<string>", false), Err(TypeError::Unbalanced(_))));
        assert!(matches!(parse_type("array<int32>>", false), Err(TypeError::Unbalanced(_))));
        assert!(matches!(parse_type("array<int32,string>", false), Err(TypeError::Unbalanced(_))));
        assert!(matches!(parse_type("foo bar", false), Err(TypeError::IllegalName(_))));
        assert!(matches!(parse_type("pkg.", false), Err(TypeError::IllegalName(_))));
    }

    #[test]
    fn test_extent_of_plain_names() {
        assert_eq!(type_extent("int32 a, string b").unwrap(), 5);
        assert_eq!(type_extent("  pkg.Foo x").unwrap(), 9);
        assert!(type_extent(" , x").is_err());
    }

    #[test]
    fn test_extent_skips_inner_commas() {
        let params = "map<string, array<map<string,int32>>> a, int64 b";
        let end = type_extent(params).unwrap();
        assert_eq!(&params[..end], "map<string, array<map<string,int32>>>");

        let rest = " array<int32 > values";
        let end = type_extent(rest).unwrap();
        assert_eq!(&rest[..end], " array<int32 >");
        assert_eq!(parse_type(&rest[..end], false).unwrap().to_string(), "array<int32>");
    }

    #[test]
    fn test_extent_rejects_unclosed_containers() {
        assert!(type_extent("map<string, int32 a").is_err());
        assert!(type_extent("array<map<string,int32> a").is_err());
    }
}
