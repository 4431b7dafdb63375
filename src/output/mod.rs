//! Structured output: coerce a model's final answer into a requested type.
//!
//! The answer is parsed as JSON when possible (after stripping markdown code
//! fences) and then walked against a [`TypeDescriptor`]. Small, unambiguous
//! mismatches are repaired; anything else is a [`QuarryError::Validation`].

pub mod schema;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use crate::error::{QuarryError, Result};

/// Shape of the value a caller asked for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TypeDescriptor {
    String,
    Integer,
    Float,
    Boolean,
    /// The absence marker.
    Null,
    /// Accepts any JSON value unchanged.
    Any,
    List { items: Box<TypeDescriptor> },
    Map { values: Box<TypeDescriptor> },
    Record { name: String, fields: Vec<Field> },
    Union { members: Vec<TypeDescriptor> },
}

/// One named field of a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeDescriptor,
}

impl Field {
    pub fn new(name: impl Into<String>, ty: TypeDescriptor) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

impl TypeDescriptor {
    pub fn list(items: TypeDescriptor) -> Self {
        Self::List {
            items: Box::new(items),
        }
    }

    pub fn map(values: TypeDescriptor) -> Self {
        Self::Map {
            values: Box::new(values),
        }
    }

    pub fn record(name: impl Into<String>, fields: Vec<Field>) -> Self {
        Self::Record {
            name: name.into(),
            fields,
        }
    }

    pub fn union(members: Vec<TypeDescriptor>) -> Self {
        Self::Union { members }
    }

    /// `ty | null`.
    pub fn optional(ty: TypeDescriptor) -> Self {
        Self::union(vec![ty, Self::Null])
    }

    /// Whether `null` is a valid value of this type.
    pub fn is_nullable(&self) -> bool {
        match self {
            Self::Null | Self::Any => true,
            Self::Union { members } => members.iter().any(Self::is_nullable),
            _ => false,
        }
    }

    /// Coerce a raw final answer.
    pub fn coerce(&self, raw: &str) -> Result<Value> {
        let value = parse_answer(raw);
        coerce_value(&value, self, "$").map_err(QuarryError::Validation)
    }

    /// Value returned when the session ran out of turns without an answer.
    pub fn exhausted(&self) -> Result<Value> {
        if self.is_nullable() {
            Ok(Value::Null)
        } else {
            Err(QuarryError::Validation(format!(
                "turn budget exhausted before an answer of type {self} was produced"
            )))
        }
    }
}

/// Parse the answer text as JSON, falling back to the trimmed text itself.
pub fn parse_answer(raw: &str) -> Value {
    let text = strip_code_fences(raw);
    serde_json::from_str(&text).unwrap_or(Value::String(text))
}

/// Strip markdown code fences from a response.
pub fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();
    if !trimmed.starts_with("```") {
        return trimmed.to_string();
    }
    let without_opening = trimmed.trim_start_matches('`');
    let without_opening = match without_opening.find('\n') {
        Some(idx) if !without_opening[..idx].trim().contains(' ') => &without_opening[idx + 1..],
        _ => without_opening,
    };
    without_opening
        .trim_end()
        .trim_end_matches('`')
        .trim()
        .to_string()
}

fn mismatch(path: &str, expected: &TypeDescriptor, got: &Value) -> String {
    format!("{path}: expected {expected}, got {got}")
}

fn coerce_value(value: &Value, ty: &TypeDescriptor, path: &str) -> std::result::Result<Value, String> {
    match ty {
        TypeDescriptor::Any => Ok(value.clone()),
        TypeDescriptor::Null => match value {
            Value::Null => Ok(Value::Null),
            Value::String(s) if s.trim().eq_ignore_ascii_case("null") => Ok(Value::Null),
            other => Err(mismatch(path, ty, other)),
        },
        TypeDescriptor::String => match value {
            Value::String(s) => Ok(Value::String(s.clone())),
            Value::Number(n) => Ok(Value::String(n.to_string())),
            Value::Bool(b) => Ok(Value::String(b.to_string())),
            other => Err(mismatch(path, ty, other)),
        },
        TypeDescriptor::Integer => coerce_integer(value).ok_or_else(|| mismatch(path, ty, value)),
        TypeDescriptor::Float => coerce_float(value).ok_or_else(|| mismatch(path, ty, value)),
        TypeDescriptor::Boolean => match value {
            Value::Bool(b) => Ok(Value::Bool(*b)),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" => Ok(Value::Bool(true)),
                "false" | "no" => Ok(Value::Bool(false)),
                _ => Err(mismatch(path, ty, value)),
            },
            other => Err(mismatch(path, ty, other)),
        },
        TypeDescriptor::List { items } => match value {
            Value::Array(values) => values
                .iter()
                .enumerate()
                .map(|(i, v)| coerce_value(v, items, &format!("{path}[{i}]")))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map(Value::Array),
            other => Err(mismatch(path, ty, other)),
        },
        TypeDescriptor::Map { values } => match value {
            Value::Object(map) => {
                let mut out = Map::new();
                for (key, v) in map {
                    out.insert(key.clone(), coerce_value(v, values, &format!("{path}.{key}"))?);
                }
                Ok(Value::Object(out))
            }
            other => Err(mismatch(path, ty, other)),
        },
        TypeDescriptor::Record { fields, .. } => match value {
            Value::Object(map) => {
                let mut out = Map::new();
                for field in fields {
                    let field_path = format!("{path}.{}", field.name);
                    let coerced = match map.get(&field.name) {
                        Some(v) => coerce_value(v, &field.ty, &field_path)?,
                        None if field.ty.is_nullable() => Value::Null,
                        None => return Err(format!("{field_path}: missing required field")),
                    };
                    out.insert(field.name.clone(), coerced);
                }
                Ok(Value::Object(out))
            }
            other => Err(mismatch(path, ty, other)),
        },
        TypeDescriptor::Union { members } => {
            let mut errors = Vec::new();
            for member in members {
                match coerce_value(value, member, path) {
                    Ok(v) => return Ok(v),
                    Err(e) => errors.push(e),
                }
            }
            if members.iter().any(|m| matches!(m, TypeDescriptor::Null)) {
                return Ok(Value::Null);
            }
            Err(format!("{path}: no member of {ty} matched ({})", errors.join("; ")))
        }
    }
}

fn coerce_integer(value: &Value) -> Option<Value> {
    match value {
        Value::Number(n) if n.is_i64() || n.is_u64() => Some(Value::Number(n.clone())),
        Value::Number(n) => n.as_f64().and_then(integral),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(i) = s.parse::<i64>() {
                return Some(Value::from(i));
            }
            s.parse::<f64>().ok().and_then(integral)
        }
        _ => None,
    }
}

fn integral(f: f64) -> Option<Value> {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
        Some(Value::from(f as i64))
    } else {
        None
    }
}

fn coerce_float(value: &Value) -> Option<Value> {
    let f = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    Number::from_f64(f).map(Value::Number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn strip_code_fences_variants() {
        assert_eq!(strip_code_fences(r#"{"key": "value"}"#), r#"{"key": "value"}"#);
        assert_eq!(strip_code_fences("```json\n{\"key\": 1}\n```"), r#"{"key": 1}"#);
        assert_eq!(strip_code_fences("```\n[1, 2]\n```"), "[1, 2]");
    }

    #[test]
    fn optional_integer_absorbs_unknown() {
        let ty = TypeDescriptor::optional(TypeDescriptor::Integer);
        assert_eq!(ty.coerce("unknown").unwrap(), Value::Null);
        assert_eq!(ty.coerce("42").unwrap(), json!(42));
    }

    #[test]
    fn plain_integer_rejects_unknown() {
        let err = TypeDescriptor::Integer.coerce("unknown").unwrap_err();
        assert!(matches!(err, QuarryError::Validation(_)));
    }

    #[test]
    fn scalar_repairs() {
        assert_eq!(TypeDescriptor::Integer.coerce("\"17\"").unwrap(), json!(17));
        assert_eq!(TypeDescriptor::Integer.coerce("3.0").unwrap(), json!(3));
        assert!(TypeDescriptor::Integer.coerce("3.5").is_err());
        assert_eq!(TypeDescriptor::Float.coerce("\"2.5\"").unwrap(), json!(2.5));
        assert_eq!(TypeDescriptor::Boolean.coerce("yes").unwrap(), json!(true));
        assert_eq!(TypeDescriptor::Boolean.coerce("\"False\"").unwrap(), json!(false));
        assert_eq!(TypeDescriptor::String.coerce("12").unwrap(), json!("12"));
        assert_eq!(TypeDescriptor::String.coerce("plain words").unwrap(), json!("plain words"));
    }

    #[test]
    fn list_of_strings_passes_unchanged() {
        let ty = TypeDescriptor::list(TypeDescriptor::String);
        let raw = r#"["A.public.orders", "A.public.customers"]"#;
        assert_eq!(
            ty.coerce(raw).unwrap(),
            json!(["A.public.orders", "A.public.customers"])
        );
    }

    #[test]
    fn records_fill_nullable_and_drop_unknown_fields() {
        let ty = TypeDescriptor::record(
            "Summary",
            vec![
                Field::new("total", TypeDescriptor::Integer),
                Field::new("note", TypeDescriptor::optional(TypeDescriptor::String)),
            ],
        );
        let value = ty.coerce(r#"{"total": "9", "extra": true}"#).unwrap();
        assert_eq!(value, json!({"total": 9, "note": null}));

        let err = ty.coerce(r#"{"note": "x"}"#).unwrap_err();
        assert!(err.to_string().contains("$.total: missing required field"));
    }

    #[test]
    fn union_takes_first_matching_member() {
        let ty = TypeDescriptor::union(vec![TypeDescriptor::Integer, TypeDescriptor::String]);
        assert_eq!(ty.coerce("7").unwrap(), json!(7));
        assert_eq!(ty.coerce("seven").unwrap(), json!("seven"));
        let strict = TypeDescriptor::union(vec![TypeDescriptor::Integer, TypeDescriptor::Boolean]);
        assert!(strict.coerce("[1]").is_err());
    }

    #[test]
    fn exhaustion_depends_on_nullability() {
        assert_eq!(
            TypeDescriptor::optional(TypeDescriptor::Float).exhausted().unwrap(),
            Value::Null
        );
        let err = TypeDescriptor::Float.exhausted().unwrap_err();
        assert!(err.to_string().contains("turn budget exhausted"));
    }
}
