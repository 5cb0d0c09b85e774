use std::fmt;

/// Column types a tuple can hold, with their on-page encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    /// Boolean type: 1 byte (0 = false, 1 = true)
    Boolean,

    /// 32-bit signed integer: 4 bytes, little-endian
    Int32,

    /// 32-bit floating point: 4 bytes, IEEE 754, little-endian
    Float32,

    /// Variable-length character string of at most n bytes.
    /// Stored as: length (1 byte) + data
    VarChar(u8),
}

impl DataType {
    /// Returns true if every value of this type has the same encoded size.
    pub fn is_fixed_size(&self) -> bool {
        self.fixed_size().is_some()
    }

    /// Returns the fixed size in bytes, or None for variable-length types.
    pub fn fixed_size(&self) -> Option<usize> {
        match self {
            DataType::Boolean => Some(1),
            DataType::Int32 | DataType::Float32 => Some(4),
            DataType::VarChar(_) => None,
        }
    }

    /// Returns the maximum encoded size, length prefix included.
    pub fn max_size(&self) -> usize {
        match self {
            DataType::VarChar(n) => 1 + *n as usize,
            fixed => fixed.fixed_size().unwrap_or(0),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Boolean => write!(f, "BOOLEAN"),
            DataType::Int32 => write!(f, "INT32"),
            DataType::Float32 => write!(f, "FLOAT32"),
            DataType::VarChar(n) => write!(f, "VARCHAR({})", n),
        }
    }
}
