use std::fmt;

use itertools::Itertools;

use super::{Field, Type};

/// Describes the layout of a tuple: an ordered list of typed, optionally
/// named, fields. A schema must have at least one field.
#[derive(Debug, Clone)]
pub struct Schema {
    pub fields: Vec<Field>,
}

// Constructors
impl Schema {
    pub fn new(fields: Vec<Field>) -> Self {
        debug_assert!(!fields.is_empty(), "schema must contain at least one field");
        Self { fields }
    }

    /// Build an anonymous schema from a list of types.
    pub fn from_types(types: &[Type]) -> Self {
        Self::new(types.iter().map(|t| Field::anonymous(*t)).collect())
    }

    pub fn small_int_schema(width: usize) -> Self {
        let mut fields: Vec<Field> = Vec::new();
        for i in 0..width {
            fields.push(Field::new(&format!("int-column-{}", i), Type::Int32));
        }

        Self::new(fields)
    }

    /// Concatenate two schemas, the fields of `a` come first.
    pub fn merge(a: &Schema, b: &Schema) -> Schema {
        let mut fields = a.fields.clone();
        fields.extend(b.fields.iter().cloned());
        Self::new(fields)
    }
}

impl Schema {
    /// get tuple size in bytes
    pub fn get_size(&self) -> usize {
        self.fields.iter().map(|field| field.t.size()).sum()
    }

    pub fn fields_count(&self) -> usize {
        self.fields.len()
    }

    pub fn get_fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn get_field_type(&self, i: usize) -> Option<Type> {
        self.fields.get(i).map(|field| field.t)
    }

    pub fn get_field_name(&self, i: usize) -> Option<&str> {
        self.fields.get(i).and_then(|field| field.name.as_deref())
    }

    /// Index of the first field with the given name.
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields
            .iter()
            .position(|field| field.name.as_deref() == Some(name))
    }
}

/// Two schemas are equal if they have the same field types in the same
/// order, names are ignored.
impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        self.fields.len() == other.fields.len()
            && self
                .fields
                .iter()
                .zip(other.fields.iter())
                .all(|(a, b)| a.t == b.t)
    }
}

impl Eq for Schema {}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[{}]", self.fields.iter().join(", "))
    }
}
