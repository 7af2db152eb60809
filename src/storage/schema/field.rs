use std::fmt;

use super::Type;

#[derive(Debug, Clone)]
pub struct Field {
    pub name: Option<String>,
    pub t: Type,
}

impl Field {
    pub fn new(field_name: &str, field_type: Type) -> Field {
        Field {
            name: Some(field_name.to_string()),
            t: field_type,
        }
    }

    pub fn anonymous(field_type: Type) -> Field {
        Field {
            name: None,
            t: field_type,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}({})", self.name.as_deref().unwrap_or("null"), self.t)
    }
}
