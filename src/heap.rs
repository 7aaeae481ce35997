//! Slotted heap pages and record images.
//!
//! Table rows are stored as records inside a chain of slotted pages. A
//! record image starts with the 4-byte row id followed by the encoded
//! column tuple; see [`Record`] for the exact layout. A [`Locator`] names
//! the physical position of a record and is what secondary indexes point at.

mod page;
mod record;

use std::fmt;

pub use page::{HeapPage, MAX_RECORD_SIZE, SlotId};
pub use record::Record;

use crate::datum::SerializationError;
use crate::storage::{PageId, StorageError};

/// Stable row identifier, assigned once at insert and never reused.
pub type RecordId = i32;

/// Physical position of a record: page plus slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Locator {
    /// Page holding the record.
    pub page: PageId,
    /// Slot within the page.
    pub slot: SlotId,
}

impl Locator {
    /// Smallest locator value; used as the low bound of index range scans.
    pub const MIN: Locator = Locator {
        page: PageId::new(0),
        slot: 0,
    };
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.page, self.slot)
    }
}

/// Errors from heap page and record handling.
#[derive(Debug)]
pub enum HeapError {
    /// Record larger than a page can hold.
    RecordTooLarge {
        /// Encoded record size.
        size: usize,
        /// Largest storable record.
        max: usize,
    },
    /// The slot is empty or out of range.
    SlotNotFound(Locator),
    /// Record bytes failed to decode against the schema.
    Serialization(SerializationError),
    /// Page I/O failure.
    Storage(StorageError),
}

impl fmt::Display for HeapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeapError::RecordTooLarge { size, max } => {
                write!(f, "record of {} bytes exceeds the maximum of {}", size, max)
            }
            HeapError::SlotNotFound(loc) => write!(f, "no record at {}", loc),
            HeapError::Serialization(e) => write!(f, "{}", e),
            HeapError::Storage(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for HeapError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            HeapError::Serialization(e) => Some(e),
            HeapError::Storage(e) => Some(e),
            _ => None,
        }
    }
}

impl From<SerializationError> for HeapError {
    fn from(e: SerializationError) -> Self {
        HeapError::Serialization(e)
    }
}

impl From<StorageError> for HeapError {
    fn from(e: StorageError) -> Self {
        HeapError::Storage(e)
    }
}
