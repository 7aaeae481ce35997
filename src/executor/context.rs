//! Per-statement row cache and expression evaluation context.
//!
//! The row cache binds each active table to its currently-positioned row.
//! Every statement driver creates a fresh [`RowCache`] on entry and drops
//! it on every exit path, so no binding outlives its statement. The
//! iterator rebinds before each predicate evaluation; expression
//! evaluation reads column values through an [`EvalContext`] that pairs
//! the cache with the statement's table list.

use std::collections::HashMap;
use std::sync::Arc;

use crate::datum::Value;
use crate::heap::{Record, RecordId};
use crate::storage::Storage;
use crate::table::TableManager;

use super::error::ExecutorError;

/// The currently-positioned row of one table.
#[derive(Debug, Clone)]
pub struct CachedRow {
    /// Row id of the bound row.
    pub rid: RecordId,
    /// Decoded record of the bound row.
    pub record: Record,
}

/// Binding from table name to its currently-positioned row.
#[derive(Debug, Default)]
pub struct RowCache {
    bound: HashMap<String, CachedRow>,
}

impl RowCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        RowCache::default()
    }

    /// Binds (or rebinds) a table's current row.
    pub fn bind(&mut self, table: &str, rid: RecordId, record: Record) {
        match self.bound.get_mut(table) {
            Some(row) => {
                row.rid = rid;
                row.record = record;
            }
            None => {
                self.bound
                    .insert(table.to_string(), CachedRow { rid, record });
            }
        }
    }

    /// The bound row of a table, if any.
    pub fn get(&self, table: &str) -> Option<&CachedRow> {
        self.bound.get(table)
    }

    /// Drops every binding.
    pub fn clear(&mut self) {
        self.bound.clear();
    }

    /// Reads one column of a table's bound row.
    ///
    /// The implicit rowid column reads from the row id; `None` when the
    /// table has no bound row or the column id is out of range.
    pub fn column_value<S: Storage>(
        &self,
        table: &TableManager<S>,
        cid: usize,
    ) -> Option<Value> {
        let row = self.get(table.name())?;
        if cid == table.schema().rowid_index() {
            return Some(Value::Int(row.rid));
        }
        row.record.values.get(cid).cloned()
    }
}

/// Everything expression evaluation needs: the statement's tables and the
/// row cache holding their current rows.
pub struct EvalContext<'a, S: Storage> {
    /// Tables active in the current statement.
    pub tables: &'a [Arc<TableManager<S>>],
    /// Current row bindings.
    pub cache: &'a RowCache,
}

impl<'a, S: Storage> EvalContext<'a, S> {
    /// Creates a context over the given tables and cache.
    pub fn new(tables: &'a [Arc<TableManager<S>>], cache: &'a RowCache) -> Self {
        EvalContext { tables, cache }
    }

    /// Resolves a column reference against the bound rows.
    ///
    /// Unqualified names must match exactly one table; qualified names
    /// must name a table of the statement.
    pub fn resolve_column(
        &self,
        table: Option<&str>,
        column: &str,
    ) -> Result<Value, ExecutorError> {
        let (tm, cid) = match table {
            Some(name) => {
                let tm = self
                    .tables
                    .iter()
                    .find(|t| t.name() == name)
                    .ok_or_else(|| ExecutorError::TableNotFound {
                        name: name.to_string(),
                    })?;
                let cid = tm.lookup_column(column).ok_or_else(|| {
                    ExecutorError::ColumnNotFound {
                        name: format!("{}.{}", name, column),
                    }
                })?;
                (tm, cid)
            }
            None => {
                let mut found = None;
                for tm in self.tables {
                    if let Some(cid) = tm.lookup_column(column) {
                        if found.is_some() {
                            return Err(ExecutorError::AmbiguousColumn {
                                name: column.to_string(),
                            });
                        }
                        found = Some((tm, cid));
                    }
                }
                found.ok_or_else(|| ExecutorError::ColumnNotFound {
                    name: column.to_string(),
                })?
            }
        };

        self.cache
            .column_value(tm.as_ref(), cid)
            .ok_or_else(|| ExecutorError::RowNotBound {
                table: tm.name().to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ColumnInfo, ROWID_COLUMN, TableSchema};
    use crate::datum::Type;
    use crate::storage::MemoryStorage;

    fn table(name: &str, cols: &[(&str, Type)]) -> Arc<TableManager<MemoryStorage>> {
        let schema = TableSchema::new(
            name,
            cols.iter()
                .map(|(n, t)| ColumnInfo::new(*n, *t))
                .collect(),
        )
        .unwrap();
        Arc::new(TableManager::create(Arc::new(MemoryStorage::new()), schema))
    }

    #[test]
    fn test_bind_and_rebind() {
        let mut cache = RowCache::new();
        cache.bind("t", 1, Record::new(vec![Value::Int(10)]));
        cache.bind("t", 2, Record::new(vec![Value::Int(20)]));
        let row = cache.get("t").unwrap();
        assert_eq!(row.rid, 2);
        assert_eq!(row.record.values, vec![Value::Int(20)]);
        assert!(cache.get("other").is_none());
    }

    #[test]
    fn test_resolve_qualified_and_bare() {
        let t1 = table("t1", &[("a", Type::Int)]);
        let t2 = table("t2", &[("b", Type::Int)]);
        let tables = vec![t1, t2];

        let mut cache = RowCache::new();
        cache.bind("t1", 1, Record::new(vec![Value::Int(7)]));
        cache.bind("t2", 5, Record::new(vec![Value::Int(9)]));
        let ctx = EvalContext::new(&tables, &cache);

        assert_eq!(ctx.resolve_column(Some("t1"), "a").unwrap(), Value::Int(7));
        assert_eq!(ctx.resolve_column(None, "b").unwrap(), Value::Int(9));
        assert_eq!(
            ctx.resolve_column(Some("t2"), ROWID_COLUMN).unwrap(),
            Value::Int(5)
        );
    }

    #[test]
    fn test_resolve_errors() {
        let t1 = table("t1", &[("a", Type::Int)]);
        let t2 = table("t2", &[("a", Type::Int)]);
        let tables = vec![t1, t2];
        let cache = RowCache::new();
        let ctx = EvalContext::new(&tables, &cache);

        assert!(matches!(
            ctx.resolve_column(Some("nope"), "a"),
            Err(ExecutorError::TableNotFound { .. })
        ));
        assert!(matches!(
            ctx.resolve_column(Some("t1"), "zz"),
            Err(ExecutorError::ColumnNotFound { .. })
        ));
        assert!(matches!(
            ctx.resolve_column(None, "a"),
            Err(ExecutorError::AmbiguousColumn { .. })
        ));
        assert!(matches!(
            ctx.resolve_column(Some("t1"), "a"),
            Err(ExecutorError::RowNotBound { .. })
        ));
    }
}
