//! Schemas for tables and query outputs.
//!
//! A schema is an ordered list of uniquely named, typed fields. Codec
//! layouts, plans, and output rows are all positional with respect to it.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::parser::DataType;

use super::PlanError;

/// A field in a schema (name + type).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Field {
    /// Column name.
    pub name: String,
    /// Data type.
    pub data_type: DataType,
}

impl Field {
    /// Creates a new field.
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }

    /// Returns the column name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.data_type)
    }
}

/// Ordered, uniquely named collection of fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    /// Fields in the schema.
    fields: Vec<Field>,
    /// Index by column name for fast lookup.
    index: HashMap<String, usize>,
}

/// Shared reference to a schema.
pub type SchemaRef = Arc<Schema>;

impl Schema {
    /// Creates an empty schema.
    pub fn empty() -> Self {
        Self {
            fields: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Creates a schema from a list of fields.
    ///
    /// Fails if two fields share a name.
    pub fn new(fields: Vec<Field>) -> Result<Self, PlanError> {
        let mut schema = Self {
            fields: Vec::with_capacity(fields.len()),
            index: HashMap::with_capacity(fields.len()),
        };
        for field in fields {
            schema.add_field(field)?;
        }
        Ok(schema)
    }

    /// Creates a schema from `(name, type)` pairs.
    pub fn from_pairs(pairs: &[(&str, DataType)]) -> Result<Self, PlanError> {
        Self::new(pairs.iter().map(|(n, t)| Field::new(*n, *t)).collect())
    }

    /// Appends a field to the schema.
    pub fn add_field(&mut self, field: Field) -> Result<(), PlanError> {
        if self.index.contains_key(&field.name) {
            return Err(PlanError::DuplicateColumn(field.name));
        }
        self.index.insert(field.name.clone(), self.fields.len());
        self.fields.push(field);
        Ok(())
    }

    /// Returns the number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if the schema has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Returns the fields.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Returns the field at the given index.
    pub fn field(&self, index: usize) -> Option<&Field> {
        self.fields.get(index)
    }

    /// Finds a field by name.
    pub fn field_by_name(&self, name: &str) -> Option<&Field> {
        self.index.get(name).and_then(|&i| self.fields.get(i))
    }

    /// Finds the index of a field by name.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Returns the column types in schema order.
    pub fn data_types(&self) -> impl Iterator<Item = DataType> + '_ {
        self.fields.iter().map(|f| f.data_type)
    }

    /// Returns true if every column has a fixed-width encoding.
    pub fn is_fixed_width(&self) -> bool {
        self.fields.iter().all(|f| f.data_type != DataType::Varchar)
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", field)?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_lookup() {
        let schema = Schema::from_pairs(&[
            ("col1", DataType::Int32),
            ("col2", DataType::Int16),
            ("col6", DataType::Varchar),
        ])
        .unwrap();

        assert_eq!(schema.len(), 3);
        assert_eq!(schema.index_of("col2"), Some(1));
        assert_eq!(schema.field_by_name("col6").unwrap().data_type, DataType::Varchar);
        assert!(schema.field_by_name("col9").is_none());
        assert!(!schema.is_fixed_width());
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let err = Schema::from_pairs(&[("a", DataType::Int32), ("a", DataType::Int64)]).unwrap_err();
        assert!(matches!(err, PlanError::DuplicateColumn(name) if name == "a"));
    }

    #[test]
    fn test_schema_display() {
        let schema = Schema::from_pairs(&[("x", DataType::Double), ("y", DataType::Int16)]).unwrap();
        assert_eq!(schema.to_string(), "[x: DOUBLE, y: INT16]");
        assert!(schema.is_fixed_width());
    }
}
