//! Typed values.
//!
//! [`DecodedRecord`] is the codec's generic keyed view of one payload.
//! [`StructValue`] is the same data bound to a session's [`OutputSchema`],
//! checked field by field and stored in schema order.

use crate::error::{Result, SchemaError};
use crate::schema::{FieldKind, OutputSchema};
use base64::Engine;
use std::collections::HashMap;
use std::sync::Arc;

/// A single column value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Owned binary data
    Bytes(Vec<u8>),
    Float64(f64),
    Float32(f32),
    Int32(i32),
    Int64(i64),
    String(String),
    Null,
}

impl FieldValue {
    /// The field kind this value carries, or `None` for `Null`.
    pub fn kind(&self) -> Option<FieldKind> {
        match self {
            FieldValue::Bytes(_) => Some(FieldKind::Bytes),
            FieldValue::Float64(_) => Some(FieldKind::Float64),
            FieldValue::Float32(_) => Some(FieldKind::Float32),
            FieldValue::Int32(_) => Some(FieldKind::Int32),
            FieldValue::Int64(_) => Some(FieldKind::Int64),
            FieldValue::String(_) => Some(FieldKind::String),
            FieldValue::Null => None,
        }
    }

    fn kind_name(&self) -> String {
        self.kind()
            .map(|k| k.to_string())
            .unwrap_or_else(|| "NULL".to_string())
    }

    /// Render as JSON. Binary values are base64 encoded.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            FieldValue::Bytes(b) => {
                serde_json::Value::String(base64::engine::general_purpose::STANDARD.encode(b))
            }
            FieldValue::Float64(v) => serde_json::Number::from_f64(*v)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            FieldValue::Float32(v) => serde_json::Number::from_f64(f64::from(*v))
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            FieldValue::Int32(v) => serde_json::Value::from(*v),
            FieldValue::Int64(v) => serde_json::Value::from(*v),
            FieldValue::String(s) => serde_json::Value::String(s.clone()),
            FieldValue::Null => serde_json::Value::Null,
        }
    }
}

/// A decoded payload: column name to value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedRecord {
    pub fields: HashMap<String, FieldValue>,
}

impl DecodedRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: FieldValue) {
        self.fields.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl FromIterator<(String, FieldValue)> for DecodedRecord {
    fn from_iter<I: IntoIterator<Item = (String, FieldValue)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

/// A record value bound to an output schema.
///
/// Values are stored in schema field order. The schema is shared, never
/// copied, so every struct built for a session points at the same schema.
#[derive(Debug, Clone, PartialEq)]
pub struct StructValue {
    schema: Arc<OutputSchema>,
    values: Vec<FieldValue>,
}

impl StructValue {
    /// Bind a decoded record to `schema`.
    ///
    /// Every schema field must be present with a value of the field's kind.
    /// `Null` (or an absent value) is accepted for optional fields only.
    /// Columns in the record that the schema does not name are ignored.
    pub fn from_decoded(schema: &Arc<OutputSchema>, mut record: DecodedRecord) -> Result<Self> {
        let mut values = Vec::with_capacity(schema.fields.len());

        for field in &schema.fields {
            let value = match record.fields.remove(&field.name) {
                Some(value) => value,
                None if field.optional => FieldValue::Null,
                None => return Err(SchemaError::MissingField(field.name.clone())),
            };

            match value.kind() {
                Some(kind) if kind == field.kind => {}
                None if field.optional => {}
                _ => {
                    return Err(SchemaError::TypeMismatch {
                        field: field.name.clone(),
                        expected: field.kind.to_string(),
                        actual: value.kind_name(),
                    })
                }
            }

            values.push(value);
        }

        Ok(Self {
            schema: Arc::clone(schema),
            values,
        })
    }

    pub fn schema(&self) -> &Arc<OutputSchema> {
        &self.schema
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.schema.field(name).map(|(index, _)| &self.values[index])
    }

    pub fn values(&self) -> &[FieldValue] {
        &self.values
    }

    /// Render as a JSON object keyed by field name.
    pub fn to_json(&self) -> serde_json::Value {
        let map = self
            .schema
            .fields
            .iter()
            .zip(&self.values)
            .map(|(field, value)| (field.name.clone(), value.to_json()))
            .collect::<serde_json::Map<_, _>>();
        serde_json::Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::ColumnDescriptor;
    use crate::schema::translate_columns;

    fn schema() -> Arc<OutputSchema> {
        Arc::new(
            translate_columns(
                "users",
                &[
                    ColumnDescriptor::new("id", "long"),
                    ColumnDescriptor::new("avatar", "bytes"),
                    ColumnDescriptor::nullable("nickname", "string"),
                ],
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_from_decoded_orders_by_schema() {
        let schema = schema();
        let mut record = DecodedRecord::new();
        record.insert("nickname", FieldValue::String("bob".to_string()));
        record.insert("avatar", FieldValue::Bytes(vec![1, 2, 3]));
        record.insert("id", FieldValue::Int64(7));

        let value = StructValue::from_decoded(&schema, record).unwrap();

        assert!(Arc::ptr_eq(value.schema(), &schema));
        assert_eq!(
            value.values(),
            &[
                FieldValue::Int64(7),
                FieldValue::Bytes(vec![1, 2, 3]),
                FieldValue::String("bob".to_string()),
            ]
        );
        assert_eq!(value.get("id"), Some(&FieldValue::Int64(7)));
        assert_eq!(value.get("missing"), None);
    }

    #[test]
    fn test_optional_field_accepts_null_and_absence() {
        let schema = schema();
        let record: DecodedRecord = vec![
            ("id".to_string(), FieldValue::Int64(1)),
            ("avatar".to_string(), FieldValue::Bytes(vec![])),
        ]
        .into_iter()
        .collect();

        let value = StructValue::from_decoded(&schema, record).unwrap();
        assert_eq!(value.get("nickname"), Some(&FieldValue::Null));
    }

    #[test]
    fn test_required_field_rejects_null() {
        let schema = schema();
        let record: DecodedRecord = vec![
            ("id".to_string(), FieldValue::Null),
            ("avatar".to_string(), FieldValue::Bytes(vec![])),
        ]
        .into_iter()
        .collect();

        let err = StructValue::from_decoded(&schema, record).unwrap_err();
        assert_eq!(
            err,
            SchemaError::TypeMismatch {
                field: "id".to_string(),
                expected: "INT64".to_string(),
                actual: "NULL".to_string(),
            }
        );
    }

    #[test]
    fn test_kind_mismatch_and_missing_field() {
        let schema = schema();
        let record: DecodedRecord = vec![
            ("id".to_string(), FieldValue::Int32(1)),
            ("avatar".to_string(), FieldValue::Bytes(vec![])),
        ]
        .into_iter()
        .collect();
        assert!(matches!(
            StructValue::from_decoded(&schema, record),
            Err(SchemaError::TypeMismatch { .. })
        ));

        let record: DecodedRecord = vec![("id".to_string(), FieldValue::Int64(1))]
            .into_iter()
            .collect();
        assert_eq!(
            StructValue::from_decoded(&schema, record).unwrap_err(),
            SchemaError::MissingField("avatar".to_string())
        );
    }

    #[test]
    fn test_to_json_encodes_bytes_as_base64() {
        let schema = schema();
        let record: DecodedRecord = vec![
            ("id".to_string(), FieldValue::Int64(42)),
            ("avatar".to_string(), FieldValue::Bytes(b"hi".to_vec())),
        ]
        .into_iter()
        .collect();

        let json = StructValue::from_decoded(&schema, record)
            .unwrap()
            .to_json();

        assert_eq!(
            json,
            serde_json::json!({"id": 42, "avatar": "aGk=", "nickname": null})
        );
    }
}
