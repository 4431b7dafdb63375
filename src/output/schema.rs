//! JSON Schema rendering and display names for [`TypeDescriptor`].

use std::fmt;

use serde_json::{json, Map, Value};

use super::TypeDescriptor;

impl TypeDescriptor {
    /// JSON Schema shown to the model in the session instructions.
    pub fn json_schema(&self) -> Value {
        match self {
            Self::String => json!({ "type": "string" }),
            Self::Integer => json!({ "type": "integer" }),
            Self::Float => json!({ "type": "number" }),
            Self::Boolean => json!({ "type": "boolean" }),
            Self::Null => json!({ "type": "null" }),
            Self::Any => json!({}),
            Self::List { items } => json!({ "type": "array", "items": items.json_schema() }),
            Self::Map { values } => json!({
                "type": "object",
                "additionalProperties": values.json_schema(),
            }),
            Self::Record { name, fields } => {
                let mut properties = Map::new();
                let mut required = Vec::new();
                for field in fields {
                    properties.insert(field.name.clone(), field.ty.json_schema());
                    if !field.ty.is_nullable() {
                        required.push(field.name.clone());
                    }
                }
                json!({
                    "title": name,
                    "type": "object",
                    "properties": properties,
                    "required": required,
                    "additionalProperties": false,
                })
            }
            Self::Union { members } => json!({
                "anyOf": members.iter().map(Self::json_schema).collect::<Vec<_>>(),
            }),
        }
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String => f.write_str("string"),
            Self::Integer => f.write_str("integer"),
            Self::Float => f.write_str("float"),
            Self::Boolean => f.write_str("boolean"),
            Self::Null => f.write_str("null"),
            Self::Any => f.write_str("any"),
            Self::List { items } => write!(f, "list<{items}>"),
            Self::Map { values } => write!(f, "map<{values}>"),
            Self::Record { name, .. } => f.write_str(name),
            Self::Union { members } => {
                for (i, member) in members.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" | ")?;
                    }
                    write!(f, "{member}")?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::Field;
    use super::*;

    #[test]
    fn record_schema_requires_non_nullable_fields() {
        let ty = TypeDescriptor::record(
            "Order",
            vec![
                Field::new("id", TypeDescriptor::Integer),
                Field::new("tags", TypeDescriptor::optional(TypeDescriptor::list(TypeDescriptor::String))),
            ],
        );
        let schema = ty.json_schema();
        assert_eq!(schema["required"], json!(["id"]));
        assert_eq!(schema["properties"]["tags"]["anyOf"][0]["items"]["type"], "string");
        assert_eq!(ty.to_string(), "Order");
    }

    #[test]
    fn display_names() {
        let ty = TypeDescriptor::optional(TypeDescriptor::map(TypeDescriptor::Float));
        assert_eq!(ty.to_string(), "map<float> | null");
    }
}
