//! Row iteration: single-table scans, the two-table index join, and the
//! many-table nested executor.
//!
//! One signature drives all traversal: [`iterate`] walks every row
//! combination of the given tables, binds each candidate into the row
//! cache, evaluates the predicate, and invokes the consumer only for
//! passing tuples. The consumer returns `Ok(false)` to halt; evaluation
//! errors abort the whole iteration through the `Result` channel.
//!
//! Dispatch by table count: one table scans directly; two tables first try
//! the index join and fall back to the general nested path; three or more
//! always take the nested path.

use std::io::Write;
use std::sync::Arc;

use crate::heap::RecordId;
use crate::index::IndexKey;
use crate::sql::{BinaryOperator, Expr};
use crate::storage::Storage;
use crate::table::TableManager;

use super::context::{EvalContext, RowCache};
use super::error::ExecutorError;
use super::eval::{as_bool, eval};
use super::planner::{JoinPlan, plan_joins};

/// Consumer invoked once per passing tuple.
///
/// Receives the evaluation context (tables plus bound rows) and the row
/// ids of the current combination, positioned like `ctx.tables`. Returns
/// `Ok(false)` to stop the iteration.
pub trait RowConsumer<S: Storage>:
    FnMut(&EvalContext<'_, S>, &[RecordId]) -> Result<bool, ExecutorError>
{
}

impl<S: Storage, F> RowConsumer<S> for F where
    F: FnMut(&EvalContext<'_, S>, &[RecordId]) -> Result<bool, ExecutorError>
{
}

/// Walks the rows of `tables`, invoking `consumer` for each combination
/// satisfying `cond` (absent ≡ TRUE). Emits the join-strategy info line
/// for multi-table statements.
pub fn iterate<S: Storage>(
    tables: &[Arc<TableManager<S>>],
    cond: Option<&Expr>,
    cache: &mut RowCache,
    info: &mut dyn Write,
    consumer: &mut impl RowConsumer<S>,
) -> Result<(), ExecutorError> {
    match tables.len() {
        0 => Ok(()),
        1 => scan_single(tables, cond, cache, consumer),
        2 => {
            if join_two_indexed(tables, cond, cache, info, consumer)? {
                writeln!(info, "[Info] Join two tables using index.")?;
                Ok(())
            } else {
                iterate_many(tables, cond, cache, info, consumer)?;
                writeln!(info, "[Info] Join two tables by enumerating.")?;
                Ok(())
            }
        }
        _ => {
            iterate_many(tables, cond, cache, info, consumer)?;
            writeln!(info, "[Info] Join many tables by enumerating.")?;
            Ok(())
        }
    }
}

/// Scans one table in rowid order, filtering by the predicate.
fn scan_single<S: Storage>(
    tables: &[Arc<TableManager<S>>],
    cond: Option<&Expr>,
    cache: &mut RowCache,
    consumer: &mut impl RowConsumer<S>,
) -> Result<(), ExecutorError> {
    let table = &tables[0];
    let mut rids = [0 as RecordId; 1];
    for item in table.record_cursor() {
        let (rid, record) = item?;
        cache.bind(table.name(), rid, record);
        if let Some(cond) = cond {
            let ctx = EvalContext::new(tables, cache);
            if !as_bool(&eval(cond, &ctx)?)? {
                continue;
            }
        }
        rids[0] = rid;
        let ctx = EvalContext::new(tables, cache);
        if !consumer(&ctx, &rids)? {
            break;
        }
    }
    Ok(())
}

/// Finds which of the two tables owns a column reference.
fn owner_of<S: Storage>(
    tables: &[Arc<TableManager<S>>],
    table: &Option<String>,
    column: &str,
) -> Option<usize> {
    match table {
        Some(name) => tables
            .iter()
            .position(|tm| tm.name() == name.as_str())
            .filter(|&i| tables[i].lookup_column(column).is_some()),
        None => {
            let mut found = None;
            for (i, tm) in tables.iter().enumerate() {
                if tm.lookup_column(column).is_some() {
                    if found.is_some() {
                        return None;
                    }
                    found = Some(i);
                }
            }
            found
        }
    }
}

/// Attempts the two-table equality index join.
///
/// Applies only when the predicate's root is an equality between column
/// refs of the two tables and at least one side is indexed; otherwise
/// declines with `Ok(false)` and the caller falls back to enumeration.
/// The driver side is full-scanned, the indexed side probed from
/// `lower_bound(key)`.
fn join_two_indexed<S: Storage>(
    tables: &[Arc<TableManager<S>>],
    cond: Option<&Expr>,
    cache: &mut RowCache,
    info: &mut dyn Write,
    consumer: &mut impl RowConsumer<S>,
) -> Result<bool, ExecutorError> {
    let Some(cond) = cond else {
        return Ok(false);
    };
    let Expr::Binary { op, left, right } = cond else {
        return Ok(false);
    };
    if *op != BinaryOperator::Eq {
        return Ok(false);
    }
    let (
        Expr::ColumnRef {
            table: lt,
            column: lc,
        },
        Expr::ColumnRef {
            table: rt,
            column: rc,
        },
    ) = (left.as_ref(), right.as_ref())
    else {
        return Ok(false);
    };

    let Some(li) = owner_of(tables, lt, lc) else {
        return Ok(false);
    };
    let Some(ri) = owner_of(tables, rt, rc) else {
        return Ok(false);
    };
    if li == ri {
        return Ok(false);
    }
    let Some(cid_l) = tables[li].lookup_column(lc) else {
        return Ok(false);
    };
    let Some(cid_r) = tables[ri].lookup_column(rc) else {
        return Ok(false);
    };

    // Prefer probing the right side's index; swap when only the left side
    // has one; decline when neither does.
    let idx_l = tables[li].get_index(cid_l);
    let idx_r = tables[ri].get_index(cid_r);
    let (driver, probe, driver_cid, probe_index) = match (idx_l, idx_r) {
        (_, Some(idx)) => (li, ri, cid_l, idx),
        (Some(idx), None) => (ri, li, cid_r, idx),
        (None, None) => {
            writeln!(info, "[Info] No index for {} and {}", left, right)?;
            return Ok(false);
        }
    };

    let pair = [tables[driver].clone(), tables[probe].clone()];
    let driver_table = &pair[0];
    let probe_table = &pair[1];
    let mut rids = [0 as RecordId; 2];

    for item in driver_table.record_cursor() {
        let (rid1, record) = item?;
        cache.bind(driver_table.name(), rid1, record);
        let Some(key_val) = cache.column_value(driver_table.as_ref(), driver_cid) else {
            continue;
        };
        let Some(key) = IndexKey::new(key_val) else {
            continue;
        };

        for (_, loc) in probe_index.scan_from(&key) {
            let (rid2, record) = probe_table.read_row(loc)?;
            cache.bind(probe_table.name(), rid2, record);
            let pass = {
                let ctx = EvalContext::new(&pair, cache);
                as_bool(&eval(cond, &ctx)?)?
            };
            // The probe is ordered and the join operator is equality, so
            // the first failing row ends the matching run; no later entry
            // can match this key. Any other operator must not take this
            // path.
            if !pass {
                break;
            }
            rids = [rid1, rid2];
            let ctx = EvalContext::new(&pair, cache);
            if !consumer(&ctx, &rids)? {
                return Ok(true);
            }
        }
    }
    Ok(true)
}

/// Plans and runs the general nested iteration.
fn iterate_many<S: Storage>(
    tables: &[Arc<TableManager<S>>],
    cond: Option<&Expr>,
    cache: &mut RowCache,
    info: &mut dyn Write,
    consumer: &mut impl RowConsumer<S>,
) -> Result<(), ExecutorError> {
    let plan = plan_joins(tables, cond, info)?;
    let mut rids = vec![0 as RecordId; tables.len()];
    nested(
        tables,
        &plan,
        cond,
        cache,
        &mut rids,
        consumer,
        tables.len() as isize - 1,
    )?;
    Ok(())
}

/// One level of the nested many-table iteration.
///
/// `now` counts down from `len - 1` (outermost) to `-1`, where the full
/// predicate runs once against the completely bound tuple. Chain positions
/// probe their index keyed by the outer neighbor's cached column and
/// re-check only the neighbor join conjunct, breaking on its first FALSE
/// (ordered probe + equality, as in the two-table join). Other positions
/// full-scan. Returns `Ok(false)` once the consumer stops.
fn nested<S: Storage>(
    tables: &[Arc<TableManager<S>>],
    plan: &JoinPlan<'_>,
    cond: Option<&Expr>,
    cache: &mut RowCache,
    rids: &mut [RecordId],
    consumer: &mut impl RowConsumer<S>,
    now: isize,
) -> Result<bool, ExecutorError> {
    if now < 0 {
        if let Some(cond) = cond {
            let pass = {
                let ctx = EvalContext::new(tables, cache);
                as_bool(&eval(cond, &ctx)?)?
            };
            if !pass {
                return Ok(true);
            }
        }
        let ctx = EvalContext::new(tables, cache);
        return consumer(&ctx, rids);
    }

    let pos = now as usize;
    let ti = plan.order[pos];
    let table = &tables[ti];

    match &plan.probes[pos] {
        None => {
            for item in table.record_cursor() {
                let (rid, record) = item?;
                cache.bind(table.name(), rid, record);
                rids[ti] = rid;
                if !nested(tables, plan, cond, cache, rids, consumer, now - 1)? {
                    return Ok(false);
                }
            }
        }
        Some(step) => {
            let outer = &tables[plan.order[pos + 1]];
            let Some(key_val) = cache.column_value(outer.as_ref(), step.key_column) else {
                return Ok(true);
            };
            let Some(key) = IndexKey::new(key_val) else {
                return Ok(true);
            };
            for (_, loc) in step.index.scan_from(&key) {
                let (rid, record) = table.read_row(loc)?;
                cache.bind(table.name(), rid, record);
                let pass = {
                    let ctx = EvalContext::new(tables, cache);
                    as_bool(&eval(step.join_cond, &ctx)?)?
                };
                if !pass {
                    break;
                }
                rids[ti] = rid;
                if !nested(tables, plan, cond, cache, rids, consumer, now - 1)? {
                    return Ok(false);
                }
            }
        }
    }
    Ok(true)
}
