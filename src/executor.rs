//! Query execution core.
//!
//! All row traversal funnels through one abstraction: [`iterate`] walks the
//! physical rows of one or more tables, binds each candidate row into the
//! per-statement [`RowCache`], evaluates the predicate, and hands passing
//! tuples to a consumer closure that may stop the iteration early.
//!
//! On top of that single surface sit:
//!
//! - the two-table index join and the many-table join planner/executor
//!   ([`iterate`], [`plan_joins`]), which pick between full scans and
//!   ordered index probes;
//! - expression evaluation over the bound rows ([`eval`]);
//! - the statement drivers: SELECT (scalar and single-group aggregate),
//!   UPDATE, DELETE, INSERT.
//!
//! The engine is single-threaded; consumers returning `false` are the only
//! cancellation mechanism, and evaluation errors short-circuit the
//! iteration through the `Result` channel.

mod context;
mod dml;
mod error;
mod eval;
mod iterate;
mod planner;
mod select;

pub use context::{CachedRow, EvalContext, RowCache};
pub use dml::{
    DeleteSummary, InsertSummary, UpdateSummary, delete_rows, insert_rows, update_rows,
};
pub use error::ExecutorError;
pub use eval::{as_bool, eval};
pub use iterate::{RowConsumer, iterate};
pub use planner::{JoinPlan, ProbeStep, plan_joins};
pub use select::{SelectSummary, select_rows};
