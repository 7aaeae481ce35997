//! DML drivers: UPDATE, DELETE, INSERT.
//!
//! All three run against a single table. UPDATE drives the shared iterator
//! and modifies rows in place; DELETE runs two-phase (collect row ids,
//! then remove) so the scan cursor is never behind a just-removed row;
//! INSERT assembles each tuple in the table's temp record and commits it.

use std::io::Write;
use std::sync::Arc;

use crate::heap::{HeapError, RecordId};
use crate::sql::{DeleteStmt, InsertStmt, UpdateStmt};
use crate::storage::Storage;
use crate::table::{TableError, TableManager};

use super::context::{EvalContext, RowCache};
use super::error::ExecutorError;
use super::eval::eval;
use super::iterate::iterate;

/// Outcome of an UPDATE.
#[derive(Debug, PartialEq, Eq)]
pub struct UpdateSummary {
    /// Rows modified.
    pub updated: u64,
    /// Matching rows that could not be modified.
    pub failed: u64,
}

/// Outcome of a DELETE.
#[derive(Debug, PartialEq, Eq)]
pub struct DeleteSummary {
    /// Rows removed.
    pub deleted: u64,
}

/// Outcome of an INSERT.
#[derive(Debug, PartialEq, Eq)]
pub struct InsertSummary {
    /// Tuples committed.
    pub inserted: u64,
    /// Tuples that failed validation or did not fit.
    pub failed: u64,
}

/// Runs an UPDATE: for each row matching the WHERE clause, evaluates the
/// value expression against that row, checks it against the target
/// column's type, and modifies the record in place (rowids are stable).
pub fn update_rows<S: Storage>(
    table: &Arc<TableManager<S>>,
    stmt: &UpdateStmt,
    info: &mut dyn Write,
) -> Result<UpdateSummary, ExecutorError> {
    let cid = table
        .lookup_column(&stmt.column)
        .ok_or_else(|| ExecutorError::ColumnNotFound {
            name: format!("{}.{}", stmt.table, stmt.column),
        })?;
    let col_type = table
        .column_type(cid)
        .ok_or_else(|| ExecutorError::ColumnNotFound {
            name: format!("{}.{}", stmt.table, stmt.column),
        })?;

    let tables = std::slice::from_ref(table);
    let mut cache = RowCache::new();
    let mut updated: u64 = 0;
    let mut failed: u64 = 0;
    let mut consumer = |ctx: &EvalContext<'_, S>, rids: &[RecordId]| {
        let value = eval(&stmt.value, ctx)?;
        let found = value.type_name().to_string();
        let value = value
            .coerce_to(col_type)
            .ok_or(ExecutorError::TypeMismatch {
                expected: col_type.to_string(),
                found,
            })?;
        let ok = table.modify_record(rids[0], cid, value)?;
        updated += u64::from(ok);
        failed += u64::from(!ok);
        Ok(true)
    };
    iterate(
        tables,
        stmt.where_clause.as_ref(),
        &mut cache,
        info,
        &mut consumer,
    )?;

    writeln!(
        info,
        "[Info] {} row(s) updated, {} row(s) failed.",
        updated, failed
    )?;
    Ok(UpdateSummary { updated, failed })
}

/// Runs a DELETE in two phases: collect the row ids of matching rows
/// first, then remove them, so in-place removal never invalidates the
/// record cursor mid-scan.
pub fn delete_rows<S: Storage>(
    table: &Arc<TableManager<S>>,
    stmt: &DeleteStmt,
    info: &mut dyn Write,
) -> Result<DeleteSummary, ExecutorError> {
    let tables = std::slice::from_ref(table);
    let mut cache = RowCache::new();
    let mut delete_list: Vec<RecordId> = Vec::new();
    let mut consumer = |_ctx: &EvalContext<'_, S>, rids: &[RecordId]| {
        delete_list.push(rids[0]);
        Ok(true)
    };
    iterate(
        tables,
        stmt.where_clause.as_ref(),
        &mut cache,
        info,
        &mut consumer,
    )?;

    let mut deleted: u64 = 0;
    for rid in delete_list {
        deleted += u64::from(table.remove_record(rid)?);
    }
    writeln!(info, "[Info] {} row(s) deleted.", deleted)?;
    Ok(DeleteSummary { deleted })
}

/// Runs an INSERT: resolves the column list (explicit, or every declared
/// column), then per value tuple validates arity, evaluates each
/// expression, checks column types, and commits through the temp record.
///
/// An arity mismatch skips the tuple with a diagnostic; an evaluation or
/// type error aborts the statement.
pub fn insert_rows<S: Storage>(
    table: &Arc<TableManager<S>>,
    stmt: &InsertStmt,
    info: &mut dyn Write,
) -> Result<InsertSummary, ExecutorError> {
    let cols: Vec<usize> = match &stmt.columns {
        None => (0..table.schema().columns().len()).collect(),
        Some(names) => names
            .iter()
            .map(|name| {
                table
                    .lookup_column(name)
                    .ok_or_else(|| ExecutorError::ColumnNotFound {
                        name: format!("{}.{}", stmt.table, name),
                    })
            })
            .collect::<Result<_, _>>()?,
    };

    // INSERT values see no bound rows; column refs in them are errors.
    let cache = RowCache::new();
    let ctx = EvalContext::<S>::new(&[], &cache);

    let mut inserted: u64 = 0;
    let mut failed: u64 = 0;
    for tuple in &stmt.values {
        if tuple.len() != cols.len() {
            writeln!(
                info,
                "[Error] Column count mismatch: expected {}, got {}.",
                cols.len(),
                tuple.len()
            )?;
            continue;
        }

        table.init_temp_record();
        let mut ok = true;
        for (cid, expr) in cols.iter().zip(tuple) {
            let value = eval(expr, &ctx)?;
            let col_type =
                table
                    .column_type(*cid)
                    .ok_or_else(|| ExecutorError::ColumnNotFound {
                        name: format!("{}#{}", stmt.table, cid),
                    })?;
            let found = value.type_name().to_string();
            let value = value
                .coerce_to(col_type)
                .ok_or(ExecutorError::TypeMismatch {
                    expected: col_type.to_string(),
                    found,
                })?;
            if !table.set_temp_value(*cid, value) {
                ok = false;
                break;
            }
        }
        if ok {
            match table.insert_record() {
                Ok(_) => {}
                Err(TableError::Heap(HeapError::RecordTooLarge { .. })) => ok = false,
                Err(e) => return Err(e.into()),
            }
        }
        inserted += u64::from(ok);
        failed += u64::from(!ok);
    }

    writeln!(
        info,
        "[Info] {} row(s) inserted, {} row(s) failed.",
        inserted, failed
    )?;
    Ok(InsertSummary { inserted, failed })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ColumnInfo, TableSchema};
    use crate::datum::{Type, Value};
    use crate::sql::{BinaryOperator, Expr};
    use crate::storage::MemoryStorage;

    fn int_table(rows: &[i32]) -> Arc<TableManager<MemoryStorage>> {
        let schema = TableSchema::new("T", vec![ColumnInfo::new("a", Type::Int)]).unwrap();
        let tm = TableManager::create(Arc::new(MemoryStorage::new()), schema);
        for v in rows {
            tm.init_temp_record();
            assert!(tm.set_temp_value(0, Value::Int(*v)));
            tm.insert_record().unwrap();
        }
        Arc::new(tm)
    }

    fn values_of(table: &TableManager<MemoryStorage>) -> Vec<Value> {
        table
            .record_cursor()
            .map(|r| r.unwrap().1.values[0].clone())
            .collect()
    }

    #[test]
    fn test_update_matching_rows() {
        let table = int_table(&[1, 2, 3]);
        let stmt = UpdateStmt {
            table: "T".into(),
            column: "a".into(),
            value: Expr::literal(9),
            where_clause: Some(Expr::binary(
                BinaryOperator::Eq,
                Expr::bare_column("a"),
                Expr::literal(2),
            )),
        };
        let mut info = Vec::new();
        let summary = update_rows(&table, &stmt, &mut info).unwrap();
        assert_eq!(summary, UpdateSummary { updated: 1, failed: 0 });
        assert_eq!(
            values_of(&table),
            vec![Value::Int(1), Value::Int(9), Value::Int(3)]
        );
        let text = String::from_utf8(info).unwrap();
        assert!(text.contains("[Info] 1 row(s) updated, 0 row(s) failed."));
    }

    #[test]
    fn test_update_expression_reads_current_row() {
        let table = int_table(&[1, 2, 3]);
        let stmt = UpdateStmt {
            table: "T".into(),
            column: "a".into(),
            value: Expr::binary(
                BinaryOperator::Add,
                Expr::bare_column("a"),
                Expr::literal(10),
            ),
            where_clause: None,
        };
        let mut info = Vec::new();
        let summary = update_rows(&table, &stmt, &mut info).unwrap();
        assert_eq!(summary.updated, 3);
        assert_eq!(
            values_of(&table),
            vec![Value::Int(11), Value::Int(12), Value::Int(13)]
        );
    }

    #[test]
    fn test_update_type_error_aborts() {
        let table = int_table(&[1]);
        let stmt = UpdateStmt {
            table: "T".into(),
            column: "a".into(),
            value: Expr::literal("oops"),
            where_clause: None,
        };
        let mut info = Vec::new();
        let err = update_rows(&table, &stmt, &mut info).unwrap_err();
        assert!(matches!(err, ExecutorError::TypeMismatch { .. }));
        assert_eq!(values_of(&table), vec![Value::Int(1)]);
    }

    #[test]
    fn test_update_unknown_column() {
        let table = int_table(&[1]);
        let stmt = UpdateStmt {
            table: "T".into(),
            column: "zz".into(),
            value: Expr::literal(1),
            where_clause: None,
        };
        let mut info = Vec::new();
        assert!(matches!(
            update_rows(&table, &stmt, &mut info),
            Err(ExecutorError::ColumnNotFound { .. })
        ));
    }

    #[test]
    fn test_delete_with_predicate() {
        let table = int_table(&[1, 2, 3]);
        let stmt = DeleteStmt {
            table: "T".into(),
            where_clause: Some(Expr::binary(
                BinaryOperator::Ge,
                Expr::bare_column("a"),
                Expr::literal(2),
            )),
        };
        let mut info = Vec::new();
        let summary = delete_rows(&table, &stmt, &mut info).unwrap();
        assert_eq!(summary, DeleteSummary { deleted: 2 });
        assert_eq!(values_of(&table), vec![Value::Int(1)]);
        assert!(String::from_utf8(info)
            .unwrap()
            .contains("[Info] 2 row(s) deleted."));
    }

    #[test]
    fn test_delete_false_predicate_deletes_nothing() {
        let table = int_table(&[1, 2]);
        let stmt = DeleteStmt {
            table: "T".into(),
            where_clause: Some(Expr::literal(false)),
        };
        let mut info = Vec::new();
        let summary = delete_rows(&table, &stmt, &mut info).unwrap();
        assert_eq!(summary.deleted, 0);
        assert_eq!(values_of(&table).len(), 2);
    }

    #[test]
    fn test_insert_all_columns() {
        let table = int_table(&[]);
        let stmt = InsertStmt {
            table: "T".into(),
            columns: None,
            values: vec![vec![Expr::literal(5)], vec![Expr::literal(6)]],
        };
        let mut info = Vec::new();
        let summary = insert_rows(&table, &stmt, &mut info).unwrap();
        assert_eq!(summary, InsertSummary { inserted: 2, failed: 0 });
        assert_eq!(values_of(&table), vec![Value::Int(5), Value::Int(6)]);
    }

    #[test]
    fn test_insert_explicit_columns_and_null_default() {
        let schema = TableSchema::new(
            "T",
            vec![
                ColumnInfo::new("a", Type::Int),
                ColumnInfo::new("b", Type::Int),
            ],
        )
        .unwrap();
        let table = Arc::new(TableManager::create(
            Arc::new(MemoryStorage::new()),
            schema,
        ));
        let stmt = InsertStmt {
            table: "T".into(),
            columns: Some(vec!["b".into()]),
            values: vec![vec![Expr::literal(42)]],
        };
        let mut info = Vec::new();
        insert_rows(&table, &stmt, &mut info).unwrap();
        let (_, record) = table.record_cursor().next().unwrap().unwrap();
        assert_eq!(record.values, vec![Value::Null, Value::Int(42)]);
    }

    #[test]
    fn test_insert_arity_mismatch_skips_tuple() {
        let table = int_table(&[]);
        let stmt = InsertStmt {
            table: "T".into(),
            columns: None,
            values: vec![
                vec![Expr::literal(1), Expr::literal(2)],
                vec![Expr::literal(3)],
            ],
        };
        let mut info = Vec::new();
        let summary = insert_rows(&table, &stmt, &mut info).unwrap();
        assert_eq!(summary, InsertSummary { inserted: 1, failed: 0 });
        assert_eq!(values_of(&table), vec![Value::Int(3)]);
        assert!(String::from_utf8(info)
            .unwrap()
            .contains("[Error] Column count mismatch"));
    }

    #[test]
    fn test_insert_type_error_aborts() {
        let table = int_table(&[]);
        let stmt = InsertStmt {
            table: "T".into(),
            columns: None,
            values: vec![vec![Expr::literal("nope")]],
        };
        let mut info = Vec::new();
        assert!(matches!(
            insert_rows(&table, &stmt, &mut info),
            Err(ExecutorError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_insert_oversized_varchar_counts_failed() {
        let schema = TableSchema::new("T", vec![ColumnInfo::varchar("s", 4)]).unwrap();
        let table = Arc::new(TableManager::create(
            Arc::new(MemoryStorage::new()),
            schema,
        ));
        let stmt = InsertStmt {
            table: "T".into(),
            columns: None,
            values: vec![
                vec![Expr::literal("ok")],
                vec![Expr::literal("too long for the column")],
            ],
        };
        let mut info = Vec::new();
        let summary = insert_rows(&table, &stmt, &mut info).unwrap();
        assert_eq!(summary, InsertSummary { inserted: 1, failed: 1 });
    }
}
