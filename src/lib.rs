//! relic: a small relational database engine.
//!
//! Tables live on disk as chains of slotted pages; secondary indexes map
//! column values to row locators in key order. The query execution core
//! walks physical rows through one iteration abstraction — choosing
//! between full scans and ordered index probes, planning a join order over
//! many tables from the predicate's equality conjuncts — and drives
//! SELECT (scalar and aggregate), UPDATE, DELETE, and INSERT through the
//! same iterator.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use relic::catalog::{ColumnInfo, TableSchema};
//! use relic::datum::Type;
//! use relic::db::Database;
//! use relic::sql::{Expr, BinaryOperator, InsertStmt, SelectStmt};
//! use relic::storage::MemoryStorage;
//!
//! let db = Database::new("example", Arc::new(MemoryStorage::new()));
//! let schema = TableSchema::new("t", vec![ColumnInfo::new("a", Type::Int)]).unwrap();
//! db.create_table(schema).unwrap();
//!
//! let mut info = Vec::new();
//! db.insert(
//!     &InsertStmt {
//!         table: "t".into(),
//!         columns: None,
//!         values: vec![vec![Expr::literal(1)], vec![Expr::literal(5)]],
//!     },
//!     &mut info,
//! )
//! .unwrap();
//!
//! let mut data = Vec::new();
//! let summary = db
//!     .select(
//!         &SelectStmt {
//!             tables: vec!["t".into()],
//!             exprs: vec![Expr::bare_column("a")],
//!             where_clause: Some(Expr::binary(
//!                 BinaryOperator::Gt,
//!                 Expr::bare_column("a"),
//!                 Expr::literal(2),
//!             )),
//!         },
//!         &mut data,
//!         &mut info,
//!     )
//!     .unwrap();
//! assert_eq!(summary.rows, 1);
//! assert_eq!(String::from_utf8(data).unwrap(), "a\n5\n");
//! ```

pub mod catalog;
pub mod datum;
pub mod db;
pub mod executor;
pub mod heap;
pub mod index;
pub mod sql;
pub mod storage;
pub mod table;
