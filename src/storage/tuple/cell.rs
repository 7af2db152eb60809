use std::{convert::TryInto, fmt};

use crate::{
    error::SmallError,
    io::{Serializeable, SmallReader, SmallWriter},
    storage::schema::Type,
    types::SmallResult,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Bool(bool),
    Int32(i32),
    Int64(i64),
    Float64(f64),
    String(String),
}

impl Cell {
    /// Whether the value can be stored in a field of the given type.
    pub fn conforms_to(&self, t: &Type) -> bool {
        match (self, t) {
            (Cell::Bool(_), Type::Bool)
            | (Cell::Int32(_), Type::Int32)
            | (Cell::Int64(_), Type::Int64)
            | (Cell::Float64(_), Type::Float64) => true,
            (Cell::String(v), Type::Bytes(size)) => v.len() <= *size as usize,
            _ => false,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Cell::Bool(v) => write!(f, "{}", v),
            Cell::Int32(v) => write!(f, "{}", v),
            Cell::Int64(v) => write!(f, "{}", v),
            Cell::Float64(v) => write!(f, "{}", v),
            Cell::String(v) => write!(f, "{}", v),
        }
    }
}

/// # Format
///
/// Numbers are big-endian. `Bytes(n)` is one length byte, the payload,
/// then zeros up to `n` payload bytes.
impl Serializeable for Cell {
    type Reference = Type;

    fn encode(&self, writer: &mut SmallWriter, t: &Type) -> SmallResult {
        if !self.conforms_to(t) {
            return Err(SmallError::SchemaMismatch(format!(
                "cell {:?} doesn't conform to type {}",
                self, t
            )));
        }

        match self {
            Cell::Bool(v) => writer.write_bytes(&[*v as u8]),
            Cell::Int32(v) => writer.write_bytes(&v.to_be_bytes()),
            Cell::Int64(v) => writer.write_bytes(&v.to_be_bytes()),
            Cell::Float64(v) => writer.write_bytes(&v.to_be_bytes()),
            Cell::String(v) => {
                writer.write_bytes(&[v.len() as u8]);
                writer.write_bytes(v.as_bytes());
                writer.write_zeros(t.size() - 1 - v.len());
            }
        }
        Ok(())
    }

    fn decode(reader: &mut SmallReader, t: &Type) -> SmallResult<Self> {
        let bytes = reader.read_exact(t.size())?;
        let cell = match t {
            Type::Bool => match bytes[0] {
                0 => Cell::Bool(false),
                1 => Cell::Bool(true),
                v => {
                    return Err(SmallError::Corrupted(format!(
                        "invalid bool byte: {}",
                        v
                    )))
                }
            },
            Type::Int32 => Cell::Int32(i32::from_be_bytes(fixed(bytes)?)),
            Type::Int64 => Cell::Int64(i64::from_be_bytes(fixed(bytes)?)),
            Type::Float64 => Cell::Float64(f64::from_be_bytes(fixed(bytes)?)),
            Type::Bytes(size) => {
                let len = bytes[0] as usize;
                if len > *size as usize {
                    return Err(SmallError::Corrupted(format!(
                        "string length {} exceeds capacity {}",
                        len, size
                    )));
                }
                let payload = bytes[1..1 + len].to_vec();
                let v = String::from_utf8(payload)
                    .map_err(|e| SmallError::Corrupted(e.to_string()))?;
                Cell::String(v)
            }
        };
        Ok(cell)
    }
}

fn fixed<const N: usize>(bytes: &[u8]) -> SmallResult<[u8; N]> {
    bytes
        .try_into()
        .map_err(|_| SmallError::Corrupted(format!("expect {} bytes, got {}", N, bytes.len())))
}
