//! Avro decoder for table monitor payloads.
//!
//! A table monitor reports its row type as an Avro record schema and streams
//! every inserted row as one Avro binary datum. This module turns the schema
//! into column descriptors and the datums into [`DecodedRecord`]s.

use crate::error::{Error, Result};
use apache_avro::schema::{RecordField, SchemaKind};
use apache_avro::types::Value as AvroValue;
use apache_avro::Schema;
use gpudb_types::{ColumnDescriptor, DecodedRecord, FieldValue, SchemaError};

/// Parsed binary schema of a monitored table.
#[derive(Debug, Clone)]
pub struct BinarySchema {
    schema: Schema,
    columns: Vec<ColumnDescriptor>,
}

impl BinarySchema {
    /// Parse the Avro record schema returned at monitor creation.
    pub fn parse(type_schema: &str) -> Result<Self> {
        let schema = Schema::parse_str(type_schema)
            .map_err(|e| SchemaError::UnsupportedBinarySchema(e.to_string()))?;

        let columns = match &schema {
            Schema::Record(record) => record.fields.iter().map(column_for).collect(),
            other => {
                return Err(SchemaError::UnsupportedBinarySchema(format!(
                    "expected a record schema, got {:?}",
                    SchemaKind::from(other)
                ))
                .into())
            }
        };

        Ok(Self { schema, columns })
    }

    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    pub fn avro(&self) -> &Schema {
        &self.schema
    }
}

fn column_for(field: &RecordField) -> ColumnDescriptor {
    match &field.schema {
        Schema::Union(union) => {
            let variants = union.variants();
            let has_null = variants.iter().any(|s| matches!(s, Schema::Null));
            let non_null: Vec<&Schema> = variants
                .iter()
                .filter(|s| !matches!(s, Schema::Null))
                .collect();
            match non_null.as_slice() {
                [inner] if has_null => ColumnDescriptor::nullable(&field.name, type_name(inner)),
                _ => ColumnDescriptor::new(&field.name, "union"),
            }
        }
        other => ColumnDescriptor::new(&field.name, type_name(other)),
    }
}

fn type_name(schema: &Schema) -> String {
    match schema {
        Schema::Bytes => "bytes".to_string(),
        Schema::Double => "double".to_string(),
        Schema::Float => "float".to_string(),
        Schema::Int => "int".to_string(),
        Schema::Long => "long".to_string(),
        Schema::String => "string".to_string(),
        other => format!("{:?}", SchemaKind::from(other)).to_lowercase(),
    }
}

/// Decodes payload frames against one table's binary schema.
pub struct AvroDecoder {
    schema: BinarySchema,
}

impl AvroDecoder {
    pub fn new(schema: BinarySchema) -> Self {
        Self { schema }
    }

    /// Decode one payload into a keyed record. Binary column values are
    /// copied out of `payload` into owned buffers.
    pub fn decode(&self, payload: &[u8]) -> Result<DecodedRecord> {
        let mut reader = payload;
        let value = apache_avro::from_avro_datum(self.schema.avro(), &mut reader, None)
            .map_err(|e| Error::AvroDecode(e.to_string()))?;

        // A datum cut short inside a string decodes to Null instead of failing.
        if !value.validate(self.schema.avro()) {
            return Err(Error::AvroDecode(
                "payload does not match the table schema".to_string(),
            ));
        }
        if !reader.is_empty() {
            return Err(Error::AvroDecode(format!(
                "{} trailing bytes after record",
                reader.len()
            )));
        }

        let fields = match value {
            AvroValue::Record(fields) => fields,
            other => {
                return Err(Error::AvroDecode(format!(
                    "expected a record, got {other:?}"
                )))
            }
        };

        fields
            .into_iter()
            .map(|(name, value)| {
                let value = field_value(&name, value)?;
                Ok((name, value))
            })
            .collect()
    }
}

fn field_value(column: &str, value: AvroValue) -> Result<FieldValue> {
    match value {
        AvroValue::Null => Ok(FieldValue::Null),
        AvroValue::Bytes(bytes) => Ok(FieldValue::Bytes(bytes)),
        AvroValue::Fixed(_, bytes) => Ok(FieldValue::Bytes(bytes)),
        AvroValue::Double(v) => Ok(FieldValue::Float64(v)),
        AvroValue::Float(v) => Ok(FieldValue::Float32(v)),
        AvroValue::Int(v) => Ok(FieldValue::Int32(v)),
        AvroValue::Long(v) => Ok(FieldValue::Int64(v)),
        AvroValue::String(s) => Ok(FieldValue::String(s)),
        AvroValue::Union(_, inner) => field_value(column, *inner),
        other => Err(Error::AvroDecode(format!(
            "unsupported value for column {column}: {other:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::encode_row;

    const SCHEMA: &str = r#"{
        "type": "record",
        "name": "type_name",
        "fields": [
            {"name": "id", "type": "long"},
            {"name": "payload", "type": "bytes"},
            {"name": "score", "type": ["double", "null"]},
            {"name": "name", "type": "string"}
        ]
    }"#;

    #[test]
    fn test_columns_from_record_schema() {
        let schema = BinarySchema::parse(SCHEMA).unwrap();
        assert_eq!(
            schema.columns(),
            &[
                ColumnDescriptor::new("id", "long"),
                ColumnDescriptor::new("payload", "bytes"),
                ColumnDescriptor::nullable("score", "double"),
                ColumnDescriptor::new("name", "string"),
            ]
        );
    }

    #[test]
    fn test_unsupported_field_types_keep_their_name() {
        let schema = BinarySchema::parse(
            r#"{"type": "record", "name": "t", "fields": [
                {"name": "flag", "type": "boolean"},
                {"name": "either", "type": ["int", "string"]}
            ]}"#,
        )
        .unwrap();
        assert_eq!(schema.columns()[0].type_name, "boolean");
        assert_eq!(schema.columns()[1].type_name, "union");
        assert!(schema.columns().iter().all(|c| c.kind().is_none()));
    }

    #[test]
    fn test_non_record_schema_rejected() {
        let err = BinarySchema::parse(r#""string""#).unwrap_err();
        assert!(matches!(
            err,
            Error::Schema(SchemaError::UnsupportedBinarySchema(_))
        ));
        assert!(BinarySchema::parse("not json").is_err());
    }

    #[test]
    fn test_decode_row() {
        let schema = BinarySchema::parse(SCHEMA).unwrap();
        let payload = encode_row(
            &schema,
            vec![
                ("id", FieldValue::Int64(9)),
                ("payload", FieldValue::Bytes(vec![0xde, 0xad])),
                ("score", FieldValue::Null),
                ("name", FieldValue::String("nine".to_string())),
            ],
        )
        .unwrap();

        let decoder = AvroDecoder::new(schema);
        let record = decoder.decode(&payload).unwrap();

        assert_eq!(record.len(), 4);
        assert_eq!(record.get("id"), Some(&FieldValue::Int64(9)));
        assert_eq!(
            record.get("payload"),
            Some(&FieldValue::Bytes(vec![0xde, 0xad]))
        );
        assert_eq!(record.get("score"), Some(&FieldValue::Null));
        assert_eq!(
            record.get("name"),
            Some(&FieldValue::String("nine".to_string()))
        );
    }

    #[test]
    fn test_decode_nullable_present_value() {
        let schema = BinarySchema::parse(SCHEMA).unwrap();
        let payload = encode_row(
            &schema,
            vec![
                ("id", FieldValue::Int64(1)),
                ("payload", FieldValue::Bytes(vec![])),
                ("score", FieldValue::Float64(0.5)),
                ("name", FieldValue::String(String::new())),
            ],
        )
        .unwrap();
        let record = AvroDecoder::new(schema).decode(&payload).unwrap();
        assert_eq!(record.get("score"), Some(&FieldValue::Float64(0.5)));
    }

    #[test]
    fn test_decode_errors() {
        let schema = BinarySchema::parse(SCHEMA).unwrap();
        let payload = encode_row(
            &schema,
            vec![
                ("id", FieldValue::Int64(1)),
                ("payload", FieldValue::Bytes(vec![1])),
                ("score", FieldValue::Null),
                ("name", FieldValue::String("x".to_string())),
            ],
        )
        .unwrap();
        let decoder = AvroDecoder::new(schema);

        assert!(matches!(decoder.decode(&[]), Err(Error::AvroDecode(_))));

        let mut padded = payload.clone();
        padded.push(0);
        assert!(matches!(decoder.decode(&padded), Err(Error::AvroDecode(_))));

        assert!(matches!(
            decoder.decode(&payload[..payload.len() - 1]),
            Err(Error::AvroDecode(_))
        ));
    }

    #[test]
    fn test_truncated_string_is_rejected() {
        let schema = BinarySchema::parse(
            r#"{"type": "record", "name": "t", "fields": [
                {"name": "id", "type": "long"},
                {"name": "name", "type": "string"}
            ]}"#,
        )
        .unwrap();
        let decoder = AvroDecoder::new(schema);

        // id = 1, then a one-byte string whose byte is missing
        assert!(matches!(decoder.decode(&[2, 2]), Err(Error::AvroDecode(_))));
    }

    #[test]
    fn test_truncated_nullable_string_is_not_null() {
        let schema = BinarySchema::parse(
            r#"{"type": "record", "name": "t", "fields": [
                {"name": "id", "type": "long"},
                {"name": "nickname", "type": ["string", "null"]}
            ]}"#,
        )
        .unwrap();
        let payload = encode_row(
            &schema,
            vec![
                ("id", FieldValue::Int64(1)),
                ("nickname", FieldValue::String("bob".to_string())),
            ],
        )
        .unwrap();
        let decoder = AvroDecoder::new(schema);

        assert!(decoder.decode(&payload).is_ok());
        for cut in 1..=3 {
            assert!(
                matches!(
                    decoder.decode(&payload[..payload.len() - cut]),
                    Err(Error::AvroDecode(_))
                ),
                "payload cut by {cut} bytes"
            );
        }
    }
}
