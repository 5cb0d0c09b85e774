use std::cmp::Ordering;
use std::fmt;

use bytes::{Buf, BufMut};

use crate::common::{Result, StrataError};

use super::DataType;

/// Longest string a VARCHAR value can hold, bounded by its 1-byte length prefix.
pub const MAX_VARCHAR_LEN: usize = u8::MAX as usize;

/// Represents a typed value that can be stored in a tuple.
/// Each variant corresponds to a DataType and holds the actual data.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Boolean(bool),
    Int32(i32),
    Float32(f32),
    VarChar(String),
}

impl Value {
    /// Returns the DataType of this value. Strings report their own length.
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Boolean(_) => DataType::Boolean,
            Value::Int32(_) => DataType::Int32,
            Value::Float32(_) => DataType::Float32,
            Value::VarChar(s) => DataType::VarChar(s.len().min(MAX_VARCHAR_LEN) as u8),
        }
    }

    /// Returns true if this value can be stored in a column of `data_type`.
    pub fn fits(&self, data_type: &DataType) -> bool {
        match (self, data_type) {
            (Value::Boolean(_), DataType::Boolean)
            | (Value::Int32(_), DataType::Int32)
            | (Value::Float32(_), DataType::Float32) => true,
            (Value::VarChar(s), DataType::VarChar(n)) => s.len() <= *n as usize,
            _ => false,
        }
    }

    /// Number of bytes [`Value::serialize`] writes.
    pub fn serialized_size(&self) -> usize {
        match self {
            Value::Boolean(_) => 1,
            Value::Int32(_) | Value::Float32(_) => 4,
            Value::VarChar(s) => 1 + s.len(),
        }
    }

    /// Appends the encoded value to `buf`.
    pub fn serialize<B: BufMut>(&self, buf: &mut B) -> Result<()> {
        match self {
            Value::Boolean(b) => buf.put_u8(*b as u8),
            Value::Int32(v) => buf.put_i32_le(*v),
            Value::Float32(v) => buf.put_f32_le(*v),
            Value::VarChar(s) => {
                if s.len() > MAX_VARCHAR_LEN {
                    return Err(StrataError::ValueTooLong {
                        len: s.len(),
                        max: MAX_VARCHAR_LEN,
                    });
                }
                buf.put_u8(s.len() as u8);
                buf.put_slice(s.as_bytes());
            }
        }
        Ok(())
    }

    /// Decodes one value of `data_type` from the front of `buf`.
    pub fn deserialize<B: Buf>(buf: &mut B, data_type: &DataType) -> Result<Value> {
        let need = data_type.fixed_size().unwrap_or(1);
        if buf.remaining() < need {
            return Err(StrataError::TupleDecode(format!(
                "{} needs {} bytes, {} left",
                data_type,
                need,
                buf.remaining()
            )));
        }

        match data_type {
            DataType::Boolean => Ok(Value::Boolean(buf.get_u8() == 1)),
            DataType::Int32 => Ok(Value::Int32(buf.get_i32_le())),
            DataType::Float32 => Ok(Value::Float32(buf.get_f32_le())),
            DataType::VarChar(max) => {
                let len = buf.get_u8();
                if len > *max {
                    return Err(StrataError::TupleDecode(format!(
                        "varchar of {} bytes in a {} column",
                        len, data_type
                    )));
                }
                if buf.remaining() < len as usize {
                    return Err(StrataError::TupleDecode(format!(
                        "varchar of {} bytes truncated to {}",
                        len,
                        buf.remaining()
                    )));
                }
                let mut bytes = vec![0u8; len as usize];
                buf.copy_to_slice(&mut bytes);
                String::from_utf8(bytes)
                    .map(Value::VarChar)
                    .map_err(|e| StrataError::TupleDecode(e.to_string()))
            }
        }
    }

    /// Compares two values for ordering.
    /// Returns None if the values are not comparable (different types or NaN).
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Boolean(a), Value::Boolean(b)) => Some(a.cmp(b)),
            (Value::Int32(a), Value::Int32(b)) => Some(a.cmp(b)),
            (Value::Float32(a), Value::Float32(b)) => a.partial_cmp(b),
            (Value::Int32(a), Value::Float32(b)) => (*a as f32).partial_cmp(b),
            (Value::Float32(a), Value::Int32(b)) => a.partial_cmp(&(*b as f32)),
            (Value::VarChar(a), Value::VarChar(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::Int32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Value::Float32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::VarChar(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Int32(v) => write!(f, "{}", v),
            Value::Float32(v) => write!(f, "{:.6}", v),
            Value::VarChar(s) => write!(f, "{}", s),
        }
    }
}

// Convenience conversions
impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int32(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float32(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::VarChar(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::VarChar(v.to_string())
    }
}
