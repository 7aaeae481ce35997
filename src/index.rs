//! Ordered secondary indexes.
//!
//! An [`IndexManager`] maps column values to the [`Locator`]s of the rows
//! holding them, in key order. The only read operation the engine needs is
//! ordered iteration starting at `lower_bound(key)`; equality join probes
//! rely on that ordering to stop at the first non-matching row.
//!
//! NULL values are never indexed; a probe keyed by NULL is skipped by the
//! caller.

use std::collections::BTreeSet;
use std::ops::Bound;

use parking_lot::RwLock;

use crate::datum::Value;
use crate::heap::Locator;

/// An orderable index key wrapped around a non-NULL [`Value`].
///
/// Keys within one index always share the column's type; the cross-type
/// arm exists only to make the ordering total (keys order by type rank
/// first). Floats use total ordering, consistent with
/// [`Value::try_compare`].
#[derive(Debug, Clone)]
pub struct IndexKey(Value);

impl IndexKey {
    /// Wraps a value; returns `None` for NULL.
    pub fn new(value: Value) -> Option<IndexKey> {
        if value.is_null() {
            return None;
        }
        Some(IndexKey(value))
    }

    /// The wrapped value.
    pub fn value(&self) -> &Value {
        &self.0
    }

    fn type_rank(&self) -> u8 {
        match self.0 {
            Value::Int(_) | Value::Float(_) => 0,
            Value::Text(_) => 1,
            Value::Boolean(_) => 2,
            Value::Date(_) => 3,
            Value::Null => 4,
        }
    }
}

impl PartialEq for IndexKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == std::cmp::Ordering::Equal
    }
}

impl Eq for IndexKey {}

impl PartialOrd for IndexKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for IndexKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        match self.0.try_compare(&other.0) {
            Some(ord) => ord,
            None => self.type_rank().cmp(&other.type_rank()),
        }
    }
}

/// Ordered index over one column of one table.
pub struct IndexManager {
    column: usize,
    entries: RwLock<BTreeSet<(IndexKey, Locator)>>,
}

impl IndexManager {
    /// Creates an empty index over column `column`.
    pub fn new(column: usize) -> Self {
        IndexManager {
            column,
            entries: RwLock::new(BTreeSet::new()),
        }
    }

    /// The indexed column id.
    pub fn column(&self) -> usize {
        self.column
    }

    /// Number of indexed entries.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true when the index holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Adds an entry.
    pub fn insert(&self, key: IndexKey, locator: Locator) {
        self.entries.write().insert((key, locator));
    }

    /// Removes an entry. Returns false when it was absent.
    pub fn remove(&self, key: &IndexKey, locator: Locator) -> bool {
        self.entries.write().remove(&(key.clone(), locator))
    }

    /// Returns true when any row holds `key`.
    pub fn contains_key(&self, key: &IndexKey) -> bool {
        self.entries
            .read()
            .range((
                Bound::Included((key.clone(), Locator::MIN)),
                Bound::Unbounded,
            ))
            .next()
            .is_some_and(|(k, _)| k == key)
    }

    /// Ordered iteration starting at the first entry with `entry >= key`.
    pub fn scan_from(&self, key: &IndexKey) -> IndexCursor<'_> {
        IndexCursor {
            index: self,
            next_bound: Bound::Included((key.clone(), Locator::MIN)),
        }
    }
}

/// Cursor over index entries in key order.
///
/// Each step re-seeks past the previously returned entry instead of
/// holding a read guard across steps, so the scanned index may be
/// modified between steps (as UPDATE does while a scan drives it).
pub struct IndexCursor<'a> {
    index: &'a IndexManager,
    next_bound: Bound<(IndexKey, Locator)>,
}

impl Iterator for IndexCursor<'_> {
    type Item = (IndexKey, Locator);

    fn next(&mut self) -> Option<Self::Item> {
        let entries = self.index.entries.read();
        let entry = entries
            .range((self.next_bound.clone(), Bound::Unbounded))
            .next()
            .cloned()?;
        drop(entries);
        self.next_bound = Bound::Excluded(entry.clone());
        Some(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::PageId;

    fn loc(page: u32, slot: u16) -> Locator {
        Locator {
            page: PageId::new(page),
            slot,
        }
    }

    fn key(n: i32) -> IndexKey {
        IndexKey::new(Value::Int(n)).unwrap()
    }

    #[test]
    fn test_null_is_not_a_key() {
        assert!(IndexKey::new(Value::Null).is_none());
    }

    #[test]
    fn test_scan_from_lower_bound() {
        let index = IndexManager::new(0);
        index.insert(key(10), loc(0, 0));
        index.insert(key(20), loc(0, 1));
        index.insert(key(30), loc(1, 0));

        let hits: Vec<_> = index.scan_from(&key(15)).map(|(_, l)| l).collect();
        assert_eq!(hits, vec![loc(0, 1), loc(1, 0)]);

        let all: Vec<_> = index.scan_from(&key(i32::MIN)).map(|(_, l)| l).collect();
        assert_eq!(all.len(), 3);

        assert_eq!(index.scan_from(&key(31)).count(), 0);
    }

    #[test]
    fn test_duplicate_keys_ordered_by_locator() {
        let index = IndexManager::new(0);
        index.insert(key(5), loc(2, 1));
        index.insert(key(5), loc(1, 0));
        index.insert(key(5), loc(1, 7));

        let hits: Vec<_> = index.scan_from(&key(5)).map(|(_, l)| l).collect();
        assert_eq!(hits, vec![loc(1, 0), loc(1, 7), loc(2, 1)]);
    }

    #[test]
    fn test_remove_and_contains() {
        let index = IndexManager::new(2);
        index.insert(key(1), loc(0, 0));
        assert!(index.contains_key(&key(1)));
        assert!(!index.contains_key(&key(2)));
        assert!(index.remove(&key(1), loc(0, 0)));
        assert!(!index.remove(&key(1), loc(0, 0)));
        assert!(index.is_empty());
    }

    #[test]
    fn test_cursor_survives_concurrent_insert() {
        let index = IndexManager::new(0);
        index.insert(key(1), loc(0, 0));
        index.insert(key(3), loc(0, 1));

        let mut cursor = index.scan_from(&key(1));
        assert_eq!(cursor.next().map(|(_, l)| l), Some(loc(0, 0)));
        // Entry added mid-scan, ahead of the cursor position.
        index.insert(key(2), loc(0, 9));
        assert_eq!(cursor.next().map(|(_, l)| l), Some(loc(0, 9)));
        assert_eq!(cursor.next().map(|(_, l)| l), Some(loc(0, 1)));
        assert_eq!(cursor.next(), None);
    }

    #[test]
    fn test_float_and_int_keys_interleave() {
        let index = IndexManager::new(0);
        index.insert(IndexKey::new(Value::Float(1.5)).unwrap(), loc(0, 0));
        index.insert(key(1), loc(0, 1));
        index.insert(key(2), loc(0, 2));

        let hits: Vec<_> = index.scan_from(&key(1)).map(|(_, l)| l).collect();
        assert_eq!(hits, vec![loc(0, 1), loc(0, 0), loc(0, 2)]);
    }
}
