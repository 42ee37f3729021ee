use breeze_schema::{MessageBody, Schema, Type};

use crate::{error::BreezeError, utils::quote};

/// Structural checks run on every schema before it is ingested.
///
/// The breeze parser already rejects most of this while reading, but
/// schemas coming from other parsers only meet these rules here.
pub fn verify_schema(schema: &Schema) -> Result<(), BreezeError> {
    // 1) Something to generate
    if schema.messages.is_empty() && schema.services.is_empty() {
        return Err(BreezeError::Structural(format!(
            "schema is empty. schema: {}",
            quote(&schema.name)
        )));
    }

    // 2) Messages and enums are not empty, indices are positive
    for (name, message) in &schema.messages {
        match &message.body {
            MessageBody::Fields(fields) => {
                if fields.is_empty() {
                    return Err(BreezeError::Structural(format!(
                        "message field is empty. message: {}",
                        quote(name)
                    )));
                }
                for (index, field) in fields {
                    if *index == 0 || field.index != *index {
                        return Err(BreezeError::Structural(format!(
                            "The index of field {} in message {} is invalid",
                            quote(&field.name),
                            quote(name)
                        )));
                    }
                    check_map_keys(&field.type_)?;
                }
            }
            MessageBody::Enum(values) => {
                if values.is_empty() {
                    return Err(BreezeError::Structural(format!(
                        "enum value is empty. enum: {}",
                        quote(name)
                    )));
                }
            }
        }
    }

    // 3) Method signatures obey the same type rules
    for service in schema.services.values() {
        for method in service.methods.values() {
            for param in method.params.values() {
                check_map_keys(&param.type_)?;
            }
            if let Some(ret) = &method.return_type {
                check_map_keys(ret)?;
            }
        }
    }

    Ok(())
}

fn check_map_keys(type_: &Type) -> Result<(), BreezeError> {
    match type_ {
        Type::Map { key, value } => {
            if !key.is_primitive() {
                return Err(BreezeError::Structural(format!("wrong map key type: {}", type_)));
            }
            check_map_keys(value)
        }
        Type::Array { value } => check_map_keys(value),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use breeze_schema::{Field, Message, Options};

    use super::*;

    fn schema_with(body: MessageBody) -> Schema {
        let mut schema = Schema { name: "s.breeze".into(), ..Schema::default() };
        schema.messages.insert(
            "M".into(),
            Message { name: "M".into(), alias: None, options: Options::new(), body },
        );
        schema
    }

    #[test]
    fn test_empty_schema() {
        let err = verify_schema(&Schema::default()).unwrap_err();
        assert!(matches!(err, BreezeError::Structural(_)));
    }

    #[test]
    fn test_empty_bodies() {
        assert!(verify_schema(&schema_with(MessageBody::Fields(BTreeMap::new()))).is_err());
        assert!(verify_schema(&schema_with(MessageBody::Enum(BTreeMap::new()))).is_err());
    }

    #[test]
    fn test_map_keys_checked_for_hand_built_schemas() {
        let bad = Type::Map {
            key:   Box::new(Type::Message { name: "K".into() }),
            value: Box::new(Type::Int32),
        };
        let mut fields = BTreeMap::new();
        fields.insert(1, Field { index: 1, name: "m".into(), type_: Type::Array { value: Box::new(bad) } });
        assert!(verify_schema(&schema_with(MessageBody::Fields(fields))).is_err());
    }

    #[test]
    fn test_valid_schema() {
        let mut fields = BTreeMap::new();
        fields.insert(3, Field { index: 3, name: "m".into(), type_: Type::Bytes });
        assert!(verify_schema(&schema_with(MessageBody::Fields(fields))).is_ok());
    }
}
