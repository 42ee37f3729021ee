use std::collections::BTreeMap;

use serde::Serialize;

use crate::types::Type;

/// Free-form `key = value` annotations on a schema, message or service.
pub type Options = BTreeMap<String, String>;

/// Option key whose value becomes a message's alias.
pub const ALIAS: &str = "alias";

/// One parsed source file.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Schema {
    /// File name the schema was read from.
    pub name:        String,
    /// Package used for qualified names. Equal to `raw_package` unless a
    /// uniform package is in effect for the run.
    pub package:     String,
    /// Package as written in the file.
    pub raw_package: String,
    pub options:     Options,
    pub messages:    BTreeMap<String, Message>,
    pub services:    BTreeMap<String, Service>,
}

impl Schema {
    /// `package.Name`, or just `Name` for a schema without a package.
    pub fn qualified_name(&self, message: &str) -> String {
        if self.package.is_empty() {
            message.to_string()
        } else {
            format!("{}.{}", self.package, message)
        }
    }

    /// File name without its last extension, e.g. `user.v2` for `user.v2.breeze`.
    pub fn stem(&self) -> &str {
        match self.name.rfind('.') {
            Some(0) | None => &self.name,
            Some(dot) => &self.name[..dot],
        }
    }
}

/// A record or an enumeration; both share name, alias and options.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub name:    String,
    pub alias:   Option<String>,
    pub options: Options,
    pub body:    MessageBody,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum MessageBody {
    /// Fields keyed by their wire index.
    Fields(BTreeMap<u32, Field>),
    /// Enum value names keyed by ordinal.
    Enum(BTreeMap<i32, String>),
}

impl Message {
    pub fn is_enum(&self) -> bool {
        matches!(self.body, MessageBody::Enum(_))
    }

    /// Fields in index order; empty for enums.
    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        let fields = match &self.body {
            MessageBody::Fields(fields) => Some(fields.values()),
            MessageBody::Enum(_) => None,
        };
        fields.into_iter().flatten()
    }

    /// `(ordinal, name)` pairs in ordinal order; empty for records.
    pub fn enum_values(&self) -> impl Iterator<Item = (i32, &str)> {
        let values = match &self.body {
            MessageBody::Enum(values) => Some(values.iter()),
            MessageBody::Fields(_) => None,
        };
        values.into_iter().flatten().map(|(k, v)| (*k, v.as_str()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Field {
    pub index: u32,
    pub name:  String,
    #[serde(rename = "type")]
    pub type_: Type,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Service {
    pub name:    String,
    pub options: Options,
    pub methods: BTreeMap<String, Method>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Method {
    pub name:        String,
    /// Parameters keyed by position, starting at 0.
    pub params:      BTreeMap<usize, Param>,
    pub return_type: Option<Type>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Param {
    pub index: usize,
    pub name:  String,
    #[serde(rename = "type")]
    pub type_: Type,
}
