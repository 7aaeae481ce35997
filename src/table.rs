//! Table management: schema, heap pages, rowid map, and secondary indexes.
//!
//! A [`TableManager`] owns everything physical about one table. Records are
//! reachable two ways: in rowid order through [`record_cursor`]
//! (the full-scan path) and by [`Locator`] (the index-probe path). Inserts
//! are assembled in a scratch temp record and committed atomically;
//! updates happen in place and never reassign the rowid.

use std::collections::BTreeMap;
use std::io::Write;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::catalog::TableSchema;
use crate::datum::{SerializationError, Type, Value};
use crate::heap::{HeapError, HeapPage, Locator, MAX_RECORD_SIZE, Record, RecordId};
use crate::index::{IndexKey, IndexManager};
use crate::storage::{PAGE_SIZE, PageId, Storage, StorageError};

/// Errors from table operations.
#[derive(Debug)]
pub enum TableError {
    /// Heap page or record failure.
    Heap(HeapError),
    /// No temp record has been initialized for the pending insert.
    NoTempRecord,
    /// Column id outside the declared columns.
    ColumnOutOfRange {
        /// Requested column id.
        column: usize,
        /// Declared column count.
        count: usize,
    },
}

impl std::fmt::Display for TableError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TableError::Heap(e) => write!(f, "{}", e),
            TableError::NoTempRecord => write!(f, "no pending insert record"),
            TableError::ColumnOutOfRange { column, count } => {
                write!(f, "column id {} out of range for {} columns", column, count)
            }
        }
    }
}

impl std::error::Error for TableError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TableError::Heap(e) => Some(e),
            _ => None,
        }
    }
}

impl From<HeapError> for TableError {
    fn from(e: HeapError) -> Self {
        TableError::Heap(e)
    }
}

impl From<StorageError> for TableError {
    fn from(e: StorageError) -> Self {
        TableError::Heap(HeapError::Storage(e))
    }
}

impl From<SerializationError> for TableError {
    fn from(e: SerializationError) -> Self {
        TableError::Heap(HeapError::Serialization(e))
    }
}

/// Mutable heap bookkeeping: the page chain and the rowid map.
struct HeapState {
    first_page: PageId,
    last_page: PageId,
    rows: BTreeMap<RecordId, Locator>,
    next_rowid: RecordId,
}

/// One table: schema, heap storage, rowid map, indexes, temp record.
///
/// All methods take `&self`; internal state sits behind locks so the
/// manager can be shared through `Arc` by the executor.
pub struct TableManager<S: Storage> {
    schema: TableSchema,
    value_types: Vec<Type>,
    storage: Arc<S>,
    heap: RwLock<HeapState>,
    indexes: RwLock<Vec<Option<Arc<IndexManager>>>>,
    temp: Mutex<Option<Vec<Value>>>,
}

impl<S: Storage> TableManager<S> {
    /// Creates an empty table on the given storage.
    pub fn create(storage: Arc<S>, schema: TableSchema) -> Self {
        let value_types = schema.value_types();
        let column_count = schema.columns().len();
        TableManager {
            schema,
            value_types,
            storage,
            heap: RwLock::new(HeapState {
                first_page: PageId::INVALID,
                last_page: PageId::INVALID,
                rows: BTreeMap::new(),
                next_rowid: 1,
            }),
            indexes: RwLock::new(vec![None; column_count]),
            temp: Mutex::new(None),
        }
    }

    /// Table name.
    pub fn name(&self) -> &str {
        self.schema.name()
    }

    /// Table schema.
    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    /// Resolves a column name (including `__rowid__`).
    pub fn lookup_column(&self, name: &str) -> Option<usize> {
        self.schema.lookup_column(name)
    }

    /// Type of a column by id.
    pub fn column_type(&self, cid: usize) -> Option<Type> {
        self.schema.column_type(cid)
    }

    /// The index on a column, if one exists.
    pub fn get_index(&self, cid: usize) -> Option<Arc<IndexManager>> {
        self.indexes.read().get(cid)?.clone()
    }

    /// Number of live rows.
    pub fn row_count(&self) -> usize {
        self.heap.read().rows.len()
    }

    fn load_page(&self, page_id: PageId) -> Result<HeapPage, TableError> {
        let mut buf = [0u8; PAGE_SIZE];
        self.storage.read_page(page_id, &mut buf)?;
        Ok(HeapPage::from_bytes(buf))
    }

    fn store_page(&self, page_id: PageId, page: &HeapPage) -> Result<(), TableError> {
        self.storage.write_page(page_id, page.as_bytes())?;
        Ok(())
    }

    /// Appends an encoded record, growing the page chain as needed.
    /// Must run under the heap write lock held by the caller.
    fn append_locked(
        &self,
        state: &mut HeapState,
        rid: RecordId,
        bytes: &[u8],
    ) -> Result<Locator, TableError> {
        if bytes.len() > MAX_RECORD_SIZE {
            return Err(HeapError::RecordTooLarge {
                size: bytes.len(),
                max: MAX_RECORD_SIZE,
            }
            .into());
        }

        if state.last_page.is_valid() {
            let mut page = self.load_page(state.last_page)?;
            if let Some(slot) = page.insert(bytes) {
                self.store_page(state.last_page, &page)?;
                let loc = Locator {
                    page: state.last_page,
                    slot,
                };
                state.rows.insert(rid, loc);
                return Ok(loc);
            }
        }

        let page_id = self.storage.allocate_page()?;
        let mut page = HeapPage::new();
        let slot = page.insert(bytes).ok_or(HeapError::RecordTooLarge {
            size: bytes.len(),
            max: MAX_RECORD_SIZE,
        })?;
        self.store_page(page_id, &page)?;

        if state.last_page.is_valid() {
            let mut prev = self.load_page(state.last_page)?;
            prev.set_next_page(page_id);
            self.store_page(state.last_page, &prev)?;
        } else {
            state.first_page = page_id;
        }
        state.last_page = page_id;

        let loc = Locator {
            page: page_id,
            slot,
        };
        state.rows.insert(rid, loc);
        Ok(loc)
    }

    /// Reads and decodes the record at a locator.
    pub fn read_row(&self, loc: Locator) -> Result<(RecordId, Record), TableError> {
        let page = self.load_page(loc.page)?;
        let bytes = page
            .record(loc.slot)
            .ok_or(HeapError::SlotNotFound(loc))?;
        Ok(Record::decode(bytes, &self.value_types)?)
    }

    /// The locator currently holding a rowid.
    pub fn locator_of(&self, rid: RecordId) -> Option<Locator> {
        self.heap.read().rows.get(&rid).copied()
    }

    /// Cursor over all records in ascending rowid order.
    ///
    /// The cursor re-seeks on every step, so rows may be modified or
    /// removed while a scan is in flight (UPDATE and DELETE rely on this).
    pub fn record_cursor(&self) -> RecordCursor<'_, S> {
        RecordCursor {
            table: self,
            last: None,
        }
    }

    /// Begins assembling a new row; unset columns default to NULL.
    pub fn init_temp_record(&self) {
        *self.temp.lock() = Some(vec![Value::Null; self.schema.columns().len()]);
    }

    /// Stores one column of the pending insert.
    ///
    /// Returns false when no temp record is active, the column id is out
    /// of range, the value does not fit the column type, or a VARCHAR
    /// length limit is exceeded.
    pub fn set_temp_value(&self, cid: usize, value: Value) -> bool {
        let mut temp = self.temp.lock();
        let Some(values) = temp.as_mut() else {
            return false;
        };
        let Some(col) = self.schema.columns().get(cid) else {
            return false;
        };
        if !col.data_type.accepts(&value) {
            return false;
        }
        if let Value::Text(s) = &value {
            if col.length > 0 && s.len() > col.length as usize {
                return false;
            }
        }
        values[cid] = value;
        true
    }

    /// Commits the pending temp record, returning the new rowid.
    pub fn insert_record(&self) -> Result<RecordId, TableError> {
        let values = self.temp.lock().take().ok_or(TableError::NoTempRecord)?;
        let record = Record::new(values);

        let (rid, loc) = {
            let mut state = self.heap.write();
            let rid = state.next_rowid;
            let bytes = record.encode(rid);
            let loc = self.append_locked(&mut state, rid, &bytes)?;
            state.next_rowid += 1;
            (rid, loc)
        };

        for (cid, index) in self.indexes.read().iter().enumerate() {
            if let (Some(index), Some(key)) = (
                index,
                IndexKey::new(record.values[cid].clone()),
            ) {
                index.insert(key, loc);
            }
        }
        Ok(rid)
    }

    /// Replaces one column of an existing row in place.
    ///
    /// The rowid is stable across updates; a record that no longer fits
    /// its slot is relocated without reassigning it. Returns false when
    /// the row does not exist or the rowid column is targeted.
    pub fn modify_record(&self, rid: RecordId, cid: usize, value: Value) -> Result<bool, TableError> {
        if cid >= self.schema.columns().len() {
            return Ok(false);
        }
        let Some(loc) = self.locator_of(rid) else {
            return Ok(false);
        };

        let (_, mut record) = self.read_row(loc)?;
        let old_values = record.values.clone();
        record.values[cid] = value;
        let bytes = record.encode(rid);

        let new_loc = {
            let mut state = self.heap.write();
            let mut page = self.load_page(loc.page)?;
            if page.replace(loc.slot, &bytes) {
                self.store_page(loc.page, &page)?;
                loc
            } else {
                page.delete(loc.slot);
                self.store_page(loc.page, &page)?;
                self.append_locked(&mut state, rid, &bytes)?
            }
        };

        let indexes = self.indexes.read();
        if new_loc == loc {
            if let Some(index) = indexes.get(cid).and_then(|i| i.as_ref()) {
                if let Some(old_key) = IndexKey::new(old_values[cid].clone()) {
                    index.remove(&old_key, loc);
                }
                if let Some(new_key) = IndexKey::new(record.values[cid].clone()) {
                    index.insert(new_key, loc);
                }
            }
        } else {
            // Relocation: every index entry for this row points at the old
            // locator and must be re-pointed.
            for (j, index) in indexes.iter().enumerate() {
                let Some(index) = index else { continue };
                if let Some(old_key) = IndexKey::new(old_values[j].clone()) {
                    index.remove(&old_key, loc);
                }
                if let Some(new_key) = IndexKey::new(record.values[j].clone()) {
                    index.insert(new_key, new_loc);
                }
            }
        }
        Ok(true)
    }

    /// Removes a row. Returns false when the rowid does not exist.
    pub fn remove_record(&self, rid: RecordId) -> Result<bool, TableError> {
        let Some(loc) = self.locator_of(rid) else {
            return Ok(false);
        };
        let (_, record) = self.read_row(loc)?;

        {
            let mut state = self.heap.write();
            let mut page = self.load_page(loc.page)?;
            page.delete(loc.slot);
            self.store_page(loc.page, &page)?;
            state.rows.remove(&rid);
        }

        for (cid, index) in self.indexes.read().iter().enumerate() {
            if let (Some(index), Some(key)) = (
                index,
                IndexKey::new(record.values[cid].clone()),
            ) {
                index.remove(&key, loc);
            }
        }
        Ok(true)
    }

    /// Returns true when any row holds `value` in the column.
    pub fn value_exists(&self, cid: usize, value: &Value) -> Result<bool, TableError> {
        let Some(key) = IndexKey::new(value.clone()) else {
            return Ok(false);
        };
        if let Some(index) = self.get_index(cid) {
            return Ok(index.contains_key(&key));
        }
        for item in self.record_cursor() {
            let (_, record) = item?;
            let found = record
                .values
                .get(cid)
                .and_then(|v| v.try_compare(value))
                .is_some_and(|o| o == std::cmp::Ordering::Equal);
            if found {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Builds an index over a declared column, backfilling existing rows.
    ///
    /// Returns false when the column is unknown, is the rowid column, or
    /// is already indexed.
    pub fn create_index(&self, column: &str) -> Result<bool, TableError> {
        let Some(cid) = self.schema.lookup_column(column) else {
            return Ok(false);
        };
        if cid >= self.schema.columns().len() || self.get_index(cid).is_some() {
            return Ok(false);
        }

        let index = IndexManager::new(cid);
        let entries: Vec<(RecordId, Locator)> = self
            .heap
            .read()
            .rows
            .iter()
            .map(|(&rid, &loc)| (rid, loc))
            .collect();
        for (_, loc) in entries {
            let (_, record) = self.read_row(loc)?;
            if let Some(key) = IndexKey::new(record.values[cid].clone()) {
                index.insert(key, loc);
            }
        }
        self.indexes.write()[cid] = Some(Arc::new(index));
        Ok(true)
    }

    /// Writes the `table.column` header of the declared columns.
    pub fn dump_header(&self, w: &mut dyn Write) -> std::io::Result<()> {
        for (i, col) in self.schema.columns().iter().enumerate() {
            if i != 0 {
                write!(w, ",")?;
            }
            write!(w, "{}.{}", self.name(), col.name)?;
        }
        Ok(())
    }

    /// Writes the declared column values of a record, comma-separated.
    pub fn dump_record(&self, w: &mut dyn Write, record: &Record) -> std::io::Result<()> {
        for (i, v) in record.values.iter().enumerate() {
            if i != 0 {
                write!(w, ",")?;
            }
            write!(w, "{}", v)?;
        }
        Ok(())
    }
}

/// Iterator over a table's records in ascending rowid order.
pub struct RecordCursor<'a, S: Storage> {
    table: &'a TableManager<S>,
    last: Option<RecordId>,
}

impl<S: Storage> Iterator for RecordCursor<'_, S> {
    type Item = Result<(RecordId, Record), TableError>;

    fn next(&mut self) -> Option<Self::Item> {
        let (rid, loc) = {
            let state = self.table.heap.read();
            let lower = match self.last {
                None => std::ops::Bound::Unbounded,
                Some(last) => std::ops::Bound::Excluded(last),
            };
            let (&rid, &loc) = state
                .rows
                .range((lower, std::ops::Bound::Unbounded))
                .next()?;
            (rid, loc)
        };
        self.last = Some(rid);
        Some(self.table.read_row(loc).map(|(_, record)| (rid, record)))
    }
}
