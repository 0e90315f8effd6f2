//! Column descriptors.
//!
//! A table monitor reports its row layout once, at creation time. Each column
//! becomes a [`ColumnDescriptor`] carrying the column name and the native type
//! name exactly as the remote system reported it. Whether that type is one the
//! bridge can carry is decided later, by the translator.

use std::fmt;

/// The closed set of native column kinds a table monitor can stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnKind {
    /// Binary blob (`bytes`)
    Bytes,
    /// 64-bit IEEE 754 float (`double`)
    Double,
    /// 32-bit IEEE 754 float (`float`)
    Float,
    /// 32-bit signed integer (`int`)
    Int,
    /// 64-bit signed integer (`long`)
    Long,
    /// UTF-8 string (`string`)
    String,
}

impl ColumnKind {
    /// Resolve a native type name. Returns `None` for anything outside the
    /// supported set.
    pub fn from_type_name(type_name: &str) -> Option<Self> {
        match type_name {
            "bytes" => Some(ColumnKind::Bytes),
            "double" => Some(ColumnKind::Double),
            "float" => Some(ColumnKind::Float),
            "int" => Some(ColumnKind::Int),
            "long" => Some(ColumnKind::Long),
            "string" => Some(ColumnKind::String),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            ColumnKind::Bytes => "bytes",
            ColumnKind::Double => "double",
            ColumnKind::Float => "float",
            ColumnKind::Int => "int",
            ColumnKind::Long => "long",
            ColumnKind::String => "string",
        }
    }
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

/// One column of a monitored table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    /// Column name, unique within the table
    pub name: String,
    /// Native type name as reported by the remote system
    pub type_name: String,
    /// Whether the column accepts nulls
    pub nullable: bool,
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            nullable: false,
        }
    }

    pub fn nullable(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            nullable: true,
            ..Self::new(name, type_name)
        }
    }

    /// The supported kind of this column, if any.
    pub fn kind(&self) -> Option<ColumnKind> {
        ColumnKind::from_type_name(&self.type_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_name_roundtrip() {
        for kind in [
            ColumnKind::Bytes,
            ColumnKind::Double,
            ColumnKind::Float,
            ColumnKind::Int,
            ColumnKind::Long,
            ColumnKind::String,
        ] {
            assert_eq!(ColumnKind::from_type_name(kind.type_name()), Some(kind));
        }
    }

    #[test]
    fn test_unknown_type_name() {
        assert_eq!(ColumnKind::from_type_name("boolean"), None);
        assert_eq!(ColumnKind::from_type_name("STRING"), None);
        assert_eq!(ColumnDescriptor::new("flag", "boolean").kind(), None);
    }
}
