//! Database: the named-table registry and statement entry points.
//!
//! A [`Database`] owns the tables of one database and wires statements to
//! the executor. Statement entry points take two sinks: `data` receives
//! SELECT's CSV, `info` receives `[Info]`/`[Error]` diagnostic lines. Any
//! statement-aborting error is reported on `info` once and returned.

use std::fmt;
use std::io::Write;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::catalog::{CatalogError, TableSchema};
use crate::executor::{
    self, DeleteSummary, ExecutorError, InsertSummary, SelectSummary, UpdateSummary,
};
use crate::sql::{DeleteStmt, InsertStmt, SelectStmt, UpdateStmt};
use crate::storage::Storage;
use crate::table::{TableError, TableManager};

/// Errors from schema-level operations (DDL).
#[derive(Debug)]
pub enum DbError {
    /// A table with the same name already exists.
    TableExists { name: String },
    /// The named table does not exist.
    TableNotFound { name: String },
    /// Invalid schema.
    Catalog(CatalogError),
    /// Table-level failure while building an index.
    Table(TableError),
}

impl fmt::Display for DbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DbError::TableExists { name } => write!(f, "table \"{}\" already exists", name),
            DbError::TableNotFound { name } => write!(f, "table \"{}\" does not exist", name),
            DbError::Catalog(e) => write!(f, "{}", e),
            DbError::Table(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for DbError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DbError::Catalog(e) => Some(e),
            DbError::Table(e) => Some(e),
            _ => None,
        }
    }
}

impl From<CatalogError> for DbError {
    fn from(e: CatalogError) -> Self {
        DbError::Catalog(e)
    }
}

impl From<TableError> for DbError {
    fn from(e: TableError) -> Self {
        DbError::Table(e)
    }
}

/// One database: a set of named tables over a shared storage backend.
pub struct Database<S: Storage> {
    name: String,
    storage: Arc<S>,
    tables: RwLock<Vec<Arc<TableManager<S>>>>,
}

impl<S: Storage> Database<S> {
    /// Creates an empty database on a storage backend.
    pub fn new(name: impl Into<String>, storage: Arc<S>) -> Self {
        Database {
            name: name.into(),
            storage,
            tables: RwLock::new(Vec::new()),
        }
    }

    /// Database name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Looks up a table by name.
    pub fn get_table(&self, name: &str) -> Option<Arc<TableManager<S>>> {
        self.tables.read().iter().find(|t| t.name() == name).cloned()
    }

    /// Creates a table from a schema.
    pub fn create_table(&self, schema: TableSchema) -> Result<Arc<TableManager<S>>, DbError> {
        let mut tables = self.tables.write();
        if tables.iter().any(|t| t.name() == schema.name()) {
            return Err(DbError::TableExists {
                name: schema.name().to_string(),
            });
        }
        let table = Arc::new(TableManager::create(self.storage.clone(), schema));
        tables.push(table.clone());
        Ok(table)
    }

    /// Drops a table. Its pages are left to the storage backend.
    pub fn drop_table(&self, name: &str) -> Result<(), DbError> {
        let mut tables = self.tables.write();
        match tables.iter().position(|t| t.name() == name) {
            Some(i) => {
                tables.remove(i);
                Ok(())
            }
            None => Err(DbError::TableNotFound {
                name: name.to_string(),
            }),
        }
    }

    /// Builds a secondary index on `table.column`, backfilling existing
    /// rows. Returns false when the column is unknown or already indexed.
    pub fn create_index(&self, table: &str, column: &str) -> Result<bool, DbError> {
        let table = self.get_table(table).ok_or_else(|| DbError::TableNotFound {
            name: table.to_string(),
        })?;
        Ok(table.create_index(column)?)
    }

    fn resolve_tables(&self, names: &[String]) -> Result<Vec<Arc<TableManager<S>>>, ExecutorError> {
        names
            .iter()
            .map(|name| {
                self.get_table(name)
                    .ok_or_else(|| ExecutorError::TableNotFound { name: name.clone() })
            })
            .collect()
    }

    /// Reports a statement-aborting error on the info sink.
    fn report<T>(
        result: Result<T, ExecutorError>,
        info: &mut dyn Write,
    ) -> Result<T, ExecutorError> {
        if let Err(e) = &result {
            let _ = writeln!(info, "[Error] {}", e);
        }
        result
    }

    /// Runs a SELECT, writing CSV to `data` and diagnostics to `info`.
    pub fn select(
        &self,
        stmt: &SelectStmt,
        data: &mut dyn Write,
        info: &mut dyn Write,
    ) -> Result<SelectSummary, ExecutorError> {
        let result = self
            .resolve_tables(&stmt.tables)
            .and_then(|tables| executor::select_rows(&tables, stmt, data, info));
        Self::report(result, info)
    }

    /// Runs an UPDATE.
    pub fn update(
        &self,
        stmt: &UpdateStmt,
        info: &mut dyn Write,
    ) -> Result<UpdateSummary, ExecutorError> {
        let result = self
            .get_table(&stmt.table)
            .ok_or_else(|| ExecutorError::TableNotFound {
                name: stmt.table.clone(),
            })
            .and_then(|table| executor::update_rows(&table, stmt, info));
        Self::report(result, info)
    }

    /// Runs a DELETE.
    pub fn delete(
        &self,
        stmt: &DeleteStmt,
        info: &mut dyn Write,
    ) -> Result<DeleteSummary, ExecutorError> {
        let result = self
            .get_table(&stmt.table)
            .ok_or_else(|| ExecutorError::TableNotFound {
                name: stmt.table.clone(),
            })
            .and_then(|table| executor::delete_rows(&table, stmt, info));
        Self::report(result, info)
    }

    /// Runs an INSERT.
    pub fn insert(
        &self,
        stmt: &InsertStmt,
        info: &mut dyn Write,
    ) -> Result<InsertSummary, ExecutorError> {
        let result = self
            .get_table(&stmt.table)
            .ok_or_else(|| ExecutorError::TableNotFound {
                name: stmt.table.clone(),
            })
            .and_then(|table| executor::insert_rows(&table, stmt, info));
        Self::report(result, info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ColumnInfo;
    use crate::datum::Type;
    use crate::storage::MemoryStorage;

    fn db() -> Database<MemoryStorage> {
        Database::new("testdb", Arc::new(MemoryStorage::new()))
    }

    fn schema(name: &str) -> TableSchema {
        TableSchema::new(name, vec![ColumnInfo::new("a", Type::Int)]).unwrap()
    }

    #[test]
    fn test_create_and_drop_table() {
        let db = db();
        db.create_table(schema("t")).unwrap();
        assert!(db.get_table("t").is_some());
        assert!(matches!(
            db.create_table(schema("t")),
            Err(DbError::TableExists { .. })
        ));
        db.drop_table("t").unwrap();
        assert!(db.get_table("t").is_none());
        assert!(matches!(
            db.drop_table("t"),
            Err(DbError::TableNotFound { .. })
        ));
    }

    #[test]
    fn test_create_index_via_database() {
        let db = db();
        db.create_table(schema("t")).unwrap();
        assert!(db.create_index("t", "a").unwrap());
        assert!(!db.create_index("t", "a").unwrap());
        assert!(matches!(
            db.create_index("zz", "a"),
            Err(DbError::TableNotFound { .. })
        ));
    }

    #[test]
    fn test_select_unknown_table_reports_error() {
        let db = db();
        let stmt = SelectStmt {
            tables: vec!["missing".into()],
            exprs: vec![],
            where_clause: None,
        };
        let mut data = Vec::new();
        let mut info = Vec::new();
        let err = db.select(&stmt, &mut data, &mut info).unwrap_err();
        assert!(matches!(err, ExecutorError::TableNotFound { .. }));
        assert!(String::from_utf8(info)
            .unwrap()
            .contains("[Error] table \"missing\" does not exist"));
    }
}
