//! Type definitions for the GPUdb table monitor bridge.
//!
//! This crate holds the data model shared by the monitor source crate and
//! anything consuming its records:
//!
//! ```text
//! binary schema → ColumnDescriptor → (translate_columns) → OutputSchema
//! payload frame → DecodedRecord → (StructValue::from_decoded) → StructValue
//! ```
//!
//! # Modules
//!
//! - [`column`] - Column descriptors and the closed set of supported column kinds
//! - [`schema`] - Output field kinds, the output schema and the column translator
//! - [`value`] - Typed field values, decoded records and schema-bound struct values
//! - [`error`] - Error types for translation and value binding

pub mod column;
pub mod error;
pub mod schema;
pub mod value;

pub use column::{ColumnDescriptor, ColumnKind};
pub use error::{Result, SchemaError};
pub use schema::{translate_columns, Field, FieldKind, OutputSchema, KEY_KIND};
pub use value::{DecodedRecord, FieldValue, StructValue};
