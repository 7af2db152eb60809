use std::fmt;

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum Type {
    Bool,
    Int32,
    Int64,
    Float64,

    /// Variable length bytes with a fixed capacity. On disk it takes one
    /// length byte followed by `size` payload bytes.
    Bytes(u8),
}

impl Type {
    /// Get the size of the type in bytes.
    pub fn size(&self) -> usize {
        match self {
            Type::Bool => 1,
            Type::Int32 => 4,
            Type::Int64 | Type::Float64 => 8,
            // The first byte is the size of the bytes.
            //
            // We use fixed size now to calculate the size of the
            // tuple.
            Type::Bytes(size) => 1 + *size as usize,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Type::Bytes(size) => write!(f, "Bytes({})", size),
            _ => write!(f, "{:?}", self),
        }
    }
}
