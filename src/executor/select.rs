//! SELECT driver: projection, record dumps, and single-group aggregates.

use std::io::Write;
use std::sync::Arc;

use crate::datum::Value;
use crate::heap::RecordId;
use crate::sql::{AggregateFunction, Expr, SelectStmt};
use crate::storage::Storage;
use crate::table::TableManager;

use super::context::{EvalContext, RowCache};
use super::error::ExecutorError;
use super::eval::eval;
use super::iterate::iterate;

/// Outcome of a SELECT.
#[derive(Debug, PartialEq, Eq)]
pub struct SelectSummary {
    /// Rows selected (for aggregates: rows aggregated over).
    pub rows: u64,
}

/// Runs a SELECT over the resolved tables, writing CSV to `data` and
/// diagnostics to `info`.
///
/// The header line carries the expressions' source forms; an empty
/// projection emits the concatenated table headers instead and dumps whole
/// records per row. A selection list containing an aggregate expression
/// switches to the single-group aggregate path.
pub fn select_rows<S: Storage>(
    tables: &[Arc<TableManager<S>>],
    stmt: &SelectStmt,
    data: &mut dyn Write,
    info: &mut dyn Write,
) -> Result<SelectSummary, ExecutorError> {
    let is_aggregate = stmt.exprs.iter().any(Expr::is_aggregate);

    for (i, expr) in stmt.exprs.iter().enumerate() {
        if i != 0 {
            write!(data, ",")?;
        }
        write!(data, "{}", expr)?;
    }
    if stmt.exprs.is_empty() {
        for (i, table) in tables.iter().enumerate() {
            if i != 0 {
                write!(data, ",")?;
            }
            table.dump_header(data)?;
        }
    }
    writeln!(data)?;

    if is_aggregate {
        return select_aggregate(tables, stmt, data, info);
    }

    let mut cache = RowCache::new();
    let mut counter: u64 = 0;
    let mut consumer = |ctx: &EvalContext<'_, S>, _rids: &[RecordId]| {
        for (i, expr) in stmt.exprs.iter().enumerate() {
            let value = eval(expr, ctx)?;
            if i != 0 {
                write!(data, ",")?;
            }
            write!(data, "{}", value)?;
        }
        if stmt.exprs.is_empty() {
            for (i, table) in ctx.tables.iter().enumerate() {
                if i != 0 {
                    write!(data, ",")?;
                }
                if let Some(row) = ctx.cache.get(table.name()) {
                    table.dump_record(data, &row.record)?;
                }
            }
        }
        writeln!(data)?;
        counter += 1;
        Ok(true)
    };
    iterate(
        tables,
        stmt.where_clause.as_ref(),
        &mut cache,
        info,
        &mut consumer,
    )?;

    writeln!(info, "[Info] {} row(s) selected.", counter)?;
    Ok(SelectSummary { rows: counter })
}

/// Numeric accumulator; its type is fixed by the first row seen, and a
/// later row of the other numeric type is rejected.
enum Acc {
    Empty,
    Int(i32),
    Float(f32),
}

fn fold(acc: &mut Acc, func: AggregateFunction, value: Value) -> Result<(), ExecutorError> {
    match value {
        Value::Int(n) => match acc {
            Acc::Empty => {
                *acc = Acc::Int(n);
                Ok(())
            }
            Acc::Int(cur) => {
                *cur = match func {
                    AggregateFunction::Sum | AggregateFunction::Avg => {
                        cur.checked_add(n).ok_or(ExecutorError::IntegerOverflow)?
                    }
                    AggregateFunction::Min => (*cur).min(n),
                    AggregateFunction::Max => (*cur).max(n),
                    AggregateFunction::Count => *cur,
                };
                Ok(())
            }
            Acc::Float(_) => Err(ExecutorError::TypeMismatch {
                expected: "FLOAT".to_string(),
                found: "INT".to_string(),
            }),
        },
        Value::Float(x) => match acc {
            Acc::Empty => {
                *acc = Acc::Float(x);
                Ok(())
            }
            Acc::Float(cur) => {
                *cur = match func {
                    AggregateFunction::Sum | AggregateFunction::Avg => *cur + x,
                    AggregateFunction::Min => cur.min(x),
                    AggregateFunction::Max => cur.max(x),
                    AggregateFunction::Count => *cur,
                };
                Ok(())
            }
            Acc::Int(_) => Err(ExecutorError::TypeMismatch {
                expected: "INT".to_string(),
                found: "FLOAT".to_string(),
            }),
        },
        other => Err(ExecutorError::AggregateInput {
            found: other.type_name().to_string(),
        }),
    }
}

/// Single-group aggregate path: exactly one aggregate expression, one
/// output row.
///
/// COUNT never evaluates its argument. An empty input yields `NULL` (with
/// a diagnostic) for SUM/AVG/MIN/MAX and `0` for COUNT.
fn select_aggregate<S: Storage>(
    tables: &[Arc<TableManager<S>>],
    stmt: &SelectStmt,
    data: &mut dyn Write,
    info: &mut dyn Write,
) -> Result<SelectSummary, ExecutorError> {
    if stmt.exprs.len() != 1 {
        return Err(ExecutorError::AggregateArity {
            count: stmt.exprs.len(),
        });
    }
    let Expr::Aggregate { func, arg } = &stmt.exprs[0] else {
        return Err(ExecutorError::Internal(
            "aggregate select without aggregate expression".to_string(),
        ));
    };

    let mut cache = RowCache::new();
    let mut acc = Acc::Empty;
    let mut counter: u64 = 0;
    let mut consumer = |ctx: &EvalContext<'_, S>, _rids: &[RecordId]| {
        if *func != AggregateFunction::Count {
            let arg = arg.as_deref().ok_or_else(|| ExecutorError::AggregateInput {
                found: "*".to_string(),
            })?;
            fold(&mut acc, *func, eval(arg, ctx)?)?;
        }
        counter += 1;
        Ok(true)
    };
    iterate(
        tables,
        stmt.where_clause.as_ref(),
        &mut cache,
        info,
        &mut consumer,
    )?;

    match (*func, acc) {
        (AggregateFunction::Count, _) => writeln!(data, "{}", counter)?,
        (_, Acc::Empty) => {
            writeln!(info, "[Error] Aggregate over empty input.")?;
            writeln!(data, "NULL")?;
        }
        (AggregateFunction::Avg, Acc::Int(sum)) => {
            writeln!(data, "{}", Value::Float(sum as f32 / counter as f32))?;
        }
        (AggregateFunction::Avg, Acc::Float(sum)) => {
            writeln!(data, "{}", Value::Float(sum / counter as f32))?;
        }
        (_, Acc::Int(v)) => writeln!(data, "{}", v)?,
        (_, Acc::Float(v)) => writeln!(data, "{}", Value::Float(v))?,
    }

    writeln!(info, "[Info] {} row(s) selected.", counter)?;
    Ok(SelectSummary { rows: counter })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ColumnInfo, TableSchema};
    use crate::datum::Type;
    use crate::sql::BinaryOperator;
    use crate::storage::MemoryStorage;

    fn int_table(name: &str, col: &str, rows: &[i32]) -> Arc<TableManager<MemoryStorage>> {
        let schema = TableSchema::new(name, vec![ColumnInfo::new(col, Type::Int)]).unwrap();
        let tm = TableManager::create(Arc::new(MemoryStorage::new()), schema);
        for v in rows {
            tm.init_temp_record();
            assert!(tm.set_temp_value(0, Value::Int(*v)));
            tm.insert_record().unwrap();
        }
        Arc::new(tm)
    }

    fn run_select(
        tables: &[Arc<TableManager<MemoryStorage>>],
        stmt: &SelectStmt,
    ) -> (String, String, SelectSummary) {
        let mut data = Vec::new();
        let mut info = Vec::new();
        let summary = select_rows(tables, stmt, &mut data, &mut info).unwrap();
        (
            String::from_utf8(data).unwrap(),
            String::from_utf8(info).unwrap(),
            summary,
        )
    }

    #[test]
    fn test_projection_with_filter() {
        let t = int_table("T", "a", &[1, 2, 3, 4, 5]);
        let stmt = SelectStmt {
            tables: vec!["T".into()],
            exprs: vec![Expr::bare_column("a")],
            where_clause: Some(Expr::binary(
                BinaryOperator::Gt,
                Expr::bare_column("a"),
                Expr::literal(2),
            )),
        };
        let (data, info, summary) = run_select(std::slice::from_ref(&t), &stmt);
        assert_eq!(data, "a\n3\n4\n5\n");
        assert!(info.contains("[Info] 3 row(s) selected."));
        assert_eq!(summary.rows, 3);
    }

    #[test]
    fn test_empty_projection_dumps_records() {
        let t = int_table("T", "a", &[7]);
        let stmt = SelectStmt {
            tables: vec!["T".into()],
            exprs: vec![],
            where_clause: None,
        };
        let (data, _, _) = run_select(std::slice::from_ref(&t), &stmt);
        assert_eq!(data, "T.a\n7\n");
    }

    #[test]
    fn test_count_star() {
        let t = int_table("T", "a", &[1, 2, 3, 4, 5]);
        let stmt = SelectStmt {
            tables: vec!["T".into()],
            exprs: vec![Expr::aggregate(AggregateFunction::Count, None)],
            where_clause: Some(Expr::binary(
                BinaryOperator::Gt,
                Expr::bare_column("a"),
                Expr::literal(2),
            )),
        };
        let (data, _, summary) = run_select(std::slice::from_ref(&t), &stmt);
        assert_eq!(data, "COUNT(*)\n3\n");
        assert_eq!(summary.rows, 3);
    }

    #[test]
    fn test_sum_min_max_avg() {
        let t = int_table("T", "a", &[1, 2, 3, 4]);
        for (func, expected) in [
            (AggregateFunction::Sum, "10"),
            (AggregateFunction::Min, "1"),
            (AggregateFunction::Max, "4"),
            (AggregateFunction::Avg, "2.5"),
        ] {
            let stmt = SelectStmt {
                tables: vec!["T".into()],
                exprs: vec![Expr::aggregate(func, Some(Expr::bare_column("a")))],
                where_clause: None,
            };
            let (data, _, _) = run_select(std::slice::from_ref(&t), &stmt);
            let value = data.lines().nth(1).unwrap();
            assert_eq!(value, expected, "func {:?}", func);
        }
    }

    #[test]
    fn test_aggregate_over_empty_input() {
        let t = int_table("T", "a", &[]);
        let stmt = SelectStmt {
            tables: vec!["T".into()],
            exprs: vec![Expr::aggregate(
                AggregateFunction::Sum,
                Some(Expr::bare_column("a")),
            )],
            where_clause: None,
        };
        let (data, info, summary) = run_select(std::slice::from_ref(&t), &stmt);
        assert_eq!(data.lines().nth(1).unwrap(), "NULL");
        assert!(info.contains("[Error] Aggregate over empty input."));
        assert_eq!(summary.rows, 0);

        let stmt = SelectStmt {
            tables: vec!["T".into()],
            exprs: vec![Expr::aggregate(AggregateFunction::Count, None)],
            where_clause: None,
        };
        let (data, _, _) = run_select(std::slice::from_ref(&t), &stmt);
        assert_eq!(data.lines().nth(1).unwrap(), "0");
    }

    #[test]
    fn test_aggregate_rejects_non_numeric() {
        let schema = TableSchema::new("T", vec![ColumnInfo::varchar("s", 8)]).unwrap();
        let tm = TableManager::create(Arc::new(MemoryStorage::new()), schema);
        tm.init_temp_record();
        assert!(tm.set_temp_value(0, Value::Text("x".into())));
        tm.insert_record().unwrap();
        let tables = [Arc::new(tm)];

        let stmt = SelectStmt {
            tables: vec!["T".into()],
            exprs: vec![Expr::aggregate(
                AggregateFunction::Sum,
                Some(Expr::bare_column("s")),
            )],
            where_clause: None,
        };
        let mut data = Vec::new();
        let mut info = Vec::new();
        let err = select_rows(&tables, &stmt, &mut data, &mut info).unwrap_err();
        assert!(matches!(err, ExecutorError::AggregateInput { .. }));
    }

    #[test]
    fn test_aggregate_rejects_two_expressions() {
        let t = int_table("T", "a", &[1]);
        let stmt = SelectStmt {
            tables: vec!["T".into()],
            exprs: vec![
                Expr::aggregate(AggregateFunction::Count, None),
                Expr::bare_column("a"),
            ],
            where_clause: None,
        };
        let mut data = Vec::new();
        let mut info = Vec::new();
        let err = select_rows(std::slice::from_ref(&t), &stmt, &mut data, &mut info)
            .unwrap_err();
        assert!(matches!(err, ExecutorError::AggregateArity { count: 2 }));
    }
}
