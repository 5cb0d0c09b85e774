use std::fmt;

use bytes::Buf;

use crate::common::{RecordId, Result, StrataError};

use super::{Schema, Value};

/// An ordered sequence of values plus the row id of where it is stored.
///
/// The encoding is the concatenation of each value's encoding in column
/// order; there is no header, so decoding needs the schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Tuple {
    /// Only valid for tuples read from or written to a page
    rid: RecordId,
    values: Vec<Value>,
}

impl Tuple {
    /// Creates a standalone tuple with an invalid row id.
    pub fn new(values: Vec<Value>) -> Self {
        Self {
            rid: RecordId::invalid(),
            values,
        }
    }

    pub fn with_rid(values: Vec<Value>, rid: RecordId) -> Self {
        Self { rid, values }
    }

    /// A tuple with no values.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn rid(&self) -> RecordId {
        self.rid
    }

    pub fn set_rid(&mut self, rid: RecordId) {
        self.rid = rid;
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn value(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Looks up a value by column name in `schema`.
    pub fn value_by_name(&self, schema: &Schema, name: &str) -> Option<&Value> {
        schema.column_index(name).and_then(|i| self.values.get(i))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Encoded size in bytes.
    pub fn size(&self) -> usize {
        self.values.iter().map(Value::serialized_size).sum()
    }

    /// Returns true if the values match the column types of `schema`.
    pub fn conforms_to(&self, schema: &Schema) -> bool {
        self.values.len() == schema.column_count()
            && self
                .values
                .iter()
                .zip(schema.columns())
                .all(|(v, c)| v.fits(c.data_type()))
    }

    /// Encodes the tuple.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(self.size());
        for value in &self.values {
            value.serialize(&mut buf)?;
        }
        Ok(buf)
    }

    /// Decodes a tuple laid out by `schema`. Bytes past the last column are
    /// an error.
    pub fn from_bytes(schema: &Schema, data: &[u8]) -> Result<Tuple> {
        let mut buf = data;
        let values = schema
            .columns()
            .map(|col| Value::deserialize(&mut buf, col.data_type()))
            .collect::<Result<Vec<_>>>()?;

        if buf.has_remaining() {
            return Err(StrataError::TupleDecode(format!(
                "{} trailing bytes after {} columns",
                buf.remaining(),
                schema.column_count()
            )));
        }
        Ok(Tuple::new(values))
    }
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, value) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", value)?;
        }
        write!(f, ")")
    }
}
