//! Record representation and serialization.
//!
//! A [`Record`] holds the declared column values of one row. The stored
//! image prefixes the tuple with the row id:
//!
//! ```text
//! +---------------------------+
//! | row id (i32 LE, 4 B)      |
//! +---------------------------+
//! | Null Bitmap (ceil(n/8) B) |  bit=1: NOT NULL, bit=0: NULL
//! +---------------------------+
//! | Value[0] (if not null)    |
//! | Value[1] (if not null)    |
//! | ...                       |
//! +---------------------------+
//! ```
//!
//! The implicit `__rowid__` column is the prefix; it is not part of the
//! bitmap or the value area.

use bytes::{Buf, BufMut};

use crate::datum::{SerializationError, Type, Value};

use super::RecordId;

/// A record: the declared column values of one row.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Column values in declaration order.
    pub values: Vec<Value>,
}

impl Record {
    /// Creates a record from values.
    pub fn new(values: Vec<Value>) -> Self {
        Record { values }
    }

    /// Size of the stored image, including the row id prefix.
    pub fn encoded_len(&self) -> usize {
        let bitmap = self.values.len().div_ceil(8);
        let values: usize = self.values.iter().map(|v| v.encoded_len()).sum();
        4 + bitmap + values
    }

    /// Encodes this record with its row id prefix into a fresh buffer.
    pub fn encode(&self, rid: RecordId) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        buf.put_i32_le(rid);

        let bitmap_len = self.values.len().div_ceil(8);
        let mut bitmap = vec![0u8; bitmap_len];
        for (i, v) in self.values.iter().enumerate() {
            if !v.is_null() {
                bitmap[i / 8] |= 1 << (i % 8);
            }
        }
        buf.put_slice(&bitmap);

        for v in &self.values {
            v.encode(&mut buf);
        }
        buf
    }

    /// Decodes a stored image against the declared column types.
    pub fn decode(bytes: &[u8], schema: &[Type]) -> Result<(RecordId, Record), SerializationError> {
        let mut buf = bytes;
        if buf.remaining() < 4 {
            return Err(SerializationError::UnexpectedEof {
                required: 4,
                available: buf.remaining(),
            });
        }
        let rid = buf.get_i32_le();

        let bitmap_len = schema.len().div_ceil(8);
        if buf.remaining() < bitmap_len {
            return Err(SerializationError::UnexpectedEof {
                required: bitmap_len,
                available: buf.remaining(),
            });
        }
        let mut bitmap = vec![0u8; bitmap_len];
        buf.copy_to_slice(&mut bitmap);

        let mut values = Vec::with_capacity(schema.len());
        for (i, ty) in schema.iter().enumerate() {
            if bitmap[i / 8] & (1 << (i % 8)) != 0 {
                values.push(Value::decode(&mut buf, *ty)?);
            } else {
                values.push(Value::Null);
            }
        }
        Ok((rid, Record::new(values)))
    }
}
