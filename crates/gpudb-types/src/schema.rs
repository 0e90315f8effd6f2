//! Output schema and the column translator.
//!
//! The output schema is derived once per monitor session from the table's
//! column descriptors and then shared read-only (behind an `Arc`) by every
//! record the session produces.

use crate::column::{ColumnDescriptor, ColumnKind};
use crate::error::{Result, SchemaError};
use std::fmt;

/// Output field kinds exposed to record consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Bytes,
    Float64,
    Float32,
    Int32,
    Int64,
    String,
}

impl From<ColumnKind> for FieldKind {
    fn from(kind: ColumnKind) -> Self {
        match kind {
            ColumnKind::Bytes => FieldKind::Bytes,
            ColumnKind::Double => FieldKind::Float64,
            ColumnKind::Float => FieldKind::Float32,
            ColumnKind::Int => FieldKind::Int32,
            ColumnKind::Long => FieldKind::Int64,
            ColumnKind::String => FieldKind::String,
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldKind::Bytes => "BYTES",
            FieldKind::Float64 => "FLOAT64",
            FieldKind::Float32 => "FLOAT32",
            FieldKind::Int32 => "INT32",
            FieldKind::Int64 => "INT64",
            FieldKind::String => "STRING",
        };
        write!(f, "{name}")
    }
}

/// Kind of the record key (the per-session sequence number).
pub const KEY_KIND: FieldKind = FieldKind::Int64;

/// A named, typed field of the output schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub kind: FieldKind,
    /// Optional fields accept `FieldValue::Null`
    pub optional: bool,
}

/// Ordered record layout derived from a table's columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputSchema {
    /// Schema name (the monitored table's name)
    pub name: String,
    pub version: u32,
    pub fields: Vec<Field>,
}

impl OutputSchema {
    /// Look up a field and its position by name.
    pub fn field(&self, name: &str) -> Option<(usize, &Field)> {
        self.fields.iter().enumerate().find(|(_, f)| f.name == name)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }
}

/// Translate a table's column descriptors into its output schema.
///
/// Field order follows column order. The first column whose type is outside
/// the supported set fails the whole translation; no partial schema is
/// returned.
pub fn translate_columns(table_name: &str, columns: &[ColumnDescriptor]) -> Result<OutputSchema> {
    let fields = columns
        .iter()
        .map(|column| {
            let kind = column
                .kind()
                .ok_or_else(|| SchemaError::UnknownColumnType {
                    column: column.name.clone(),
                    type_name: column.type_name.clone(),
                })?;
            Ok(Field {
                name: column.name.clone(),
                kind: kind.into(),
                optional: column.nullable,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(OutputSchema {
        name: table_name.to_string(),
        version: 1,
        fields,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translate_all_kinds_in_order() {
        let columns = vec![
            ColumnDescriptor::new("blob", "bytes"),
            ColumnDescriptor::new("d", "double"),
            ColumnDescriptor::new("f", "float"),
            ColumnDescriptor::new("i", "int"),
            ColumnDescriptor::new("l", "long"),
            ColumnDescriptor::new("s", "string"),
        ];

        let schema = translate_columns("all_types", &columns).unwrap();

        assert_eq!(schema.name, "all_types");
        assert_eq!(schema.version, 1);
        let kinds: Vec<FieldKind> = schema.fields.iter().map(|f| f.kind).collect();
        assert_eq!(
            kinds,
            vec![
                FieldKind::Bytes,
                FieldKind::Float64,
                FieldKind::Float32,
                FieldKind::Int32,
                FieldKind::Int64,
                FieldKind::String,
            ]
        );
        let names: Vec<&str> = schema.field_names().collect();
        assert_eq!(names, vec!["blob", "d", "f", "i", "l", "s"]);
    }

    #[test]
    fn test_translate_preserves_reversed_order() {
        let columns = vec![
            ColumnDescriptor::new("z", "string"),
            ColumnDescriptor::new("a", "long"),
        ];
        let schema = translate_columns("t", &columns).unwrap();
        assert_eq!(schema.fields[0].name, "z");
        assert_eq!(schema.fields[1].name, "a");
        assert_eq!(schema.field("a").map(|(i, _)| i), Some(1));
    }

    #[test]
    fn test_translate_unknown_type_fails_without_partial_schema() {
        let columns = vec![
            ColumnDescriptor::new("id", "long"),
            ColumnDescriptor::new("active", "boolean"),
            ColumnDescriptor::new("name", "string"),
        ];

        let err = translate_columns("t", &columns).unwrap_err();

        assert_eq!(
            err,
            SchemaError::UnknownColumnType {
                column: "active".to_string(),
                type_name: "boolean".to_string(),
            }
        );
        assert_eq!(
            err.to_string(),
            "Unknown column type boolean for column active"
        );
    }

    #[test]
    fn test_nullable_column_becomes_optional_field() {
        let columns = vec![
            ColumnDescriptor::new("id", "int"),
            ColumnDescriptor::nullable("note", "string"),
        ];
        let schema = translate_columns("t", &columns).unwrap();
        assert!(!schema.fields[0].optional);
        assert!(schema.fields[1].optional);
    }

    #[test]
    fn test_empty_column_list() {
        let schema = translate_columns("empty", &[]).unwrap();
        assert!(schema.fields.is_empty());
    }
}
