//! Many-table join planning.
//!
//! The planner turns the WHERE clause's equality conjuncts into a directed
//! join graph and picks an iteration order: `edge[a][b]` means table `a`
//! can be probed through its index once table `b` is positioned (`a` holds
//! an index on its side of the conjunct). A depth-limited DFS finds the
//! longest simple path through the graph; tables not on the path are
//! appended afterwards in ascending position and will be full-scanned.
//!
//! The resulting [`JoinPlan`] orders tables innermost-first: `order[0]` is
//! probed deepest, `order[len-1]` drives the outermost loop.

use std::io::Write;
use std::sync::Arc;

use crate::index::IndexManager;
use crate::sql::{BinaryOperator, Expr};
use crate::storage::Storage;
use crate::table::TableManager;

use super::error::ExecutorError;

/// An index probe binding one position of the plan.
pub struct ProbeStep<'a> {
    /// Index on the probed table (`order[i]`), over its join column.
    pub index: Arc<IndexManager>,
    /// Column id on the outer neighbor (`order[i+1]`) supplying the key.
    pub key_column: usize,
    /// The equality conjunct to re-check per probed row.
    pub join_cond: &'a Expr,
}

/// Iteration order and probe bindings for a many-table join.
pub struct JoinPlan<'a> {
    /// Permutation of table positions; `order[0]` innermost.
    pub order: Vec<usize>,
    /// Length of the index-connected prefix: positions `0..max_depth`
    /// carry a probe step.
    pub max_depth: usize,
    /// Probe step per position (`None` = full scan).
    pub probes: Vec<Option<ProbeStep<'a>>>,
}

/// An equality conjunct resolved against the statement's tables.
#[derive(Clone, Copy)]
struct EdgeCond<'a> {
    expr: &'a Expr,
    /// (table position, column id) of the conjunct's left column ref.
    left: (usize, usize),
    /// (table position, column id) of the conjunct's right column ref.
    right: (usize, usize),
}

/// Splits a predicate into its top-level AND conjuncts.
fn collect_conjuncts<'a>(expr: &'a Expr, out: &mut Vec<&'a Expr>) {
    match expr {
        Expr::Binary {
            op: BinaryOperator::And,
            left,
            right,
        } => {
            collect_conjuncts(left, out);
            collect_conjuncts(right, out);
        }
        other => out.push(other),
    }
}

/// Resolves one side of a join conjunct to `(table position, column id)`.
///
/// A qualified name must resolve (hard error otherwise); an unqualified
/// name resolves only when exactly one table owns the column, and yields
/// `None` (no edge) otherwise.
fn resolve_side<S: Storage>(
    tables: &[Arc<TableManager<S>>],
    table: &Option<String>,
    column: &str,
) -> Result<Option<(usize, usize)>, ExecutorError> {
    match table {
        Some(name) => {
            let t = tables
                .iter()
                .position(|tm| tm.name() == name.as_str())
                .ok_or_else(|| ExecutorError::TableNotFound { name: name.clone() })?;
            let c = tables[t]
                .lookup_column(column)
                .ok_or_else(|| ExecutorError::ColumnNotFound {
                    name: format!("{}.{}", name, column),
                })?;
            Ok(Some((t, c)))
        }
        None => {
            let mut found = None;
            for (t, tm) in tables.iter().enumerate() {
                if let Some(c) = tm.lookup_column(column) {
                    if found.is_some() {
                        return Ok(None);
                    }
                    found = Some((t, c));
                }
            }
            Ok(found)
        }
    }
}

/// DFS for the longest simple path through the join graph.
///
/// With `target == None`, explores exhaustively and records the best depth
/// reached. With `target == Some(d)`, stops at the first path of exactly
/// that depth, leaving it in `path[0..=d]`. Neighbors are tried in
/// ascending position so that equal-depth paths tie-break determinately.
fn longest_path(
    now: usize,
    depth: usize,
    edges: &[Vec<bool>],
    mark: &mut [bool],
    path: &mut [usize],
    target: Option<usize>,
    best: &mut usize,
) -> bool {
    mark[now] = true;
    path[depth] = now;
    if depth > *best {
        *best = depth;
    }
    if target == Some(depth) {
        return true;
    }
    for i in 0..edges.len() {
        if edges[now][i]
            && !mark[i]
            && longest_path(i, depth + 1, edges, mark, path, target, best)
        {
            return true;
        }
    }
    mark[now] = false;
    false
}

/// Plans the iteration order for a many-table join and emits the
/// iteration-order and index-use diagnostic lines.
pub fn plan_joins<'a, S: Storage>(
    tables: &[Arc<TableManager<S>>],
    cond: Option<&'a Expr>,
    info: &mut dyn Write,
) -> Result<JoinPlan<'a>, ExecutorError> {
    let n = tables.len();
    if n == 0 {
        return Ok(JoinPlan {
            order: Vec::new(),
            max_depth: 0,
            probes: Vec::new(),
        });
    }

    let mut conjuncts = Vec::new();
    if let Some(cond) = cond {
        collect_conjuncts(cond, &mut conjuncts);
    }

    // Join graph: edges[a][b] set when `a` is indexed on its side of an
    // equality conjunct with `b`, so positioning `b` first lets `a` be
    // probed by index.
    let mut edges = vec![vec![false; n]; n];
    let mut conds: Vec<Vec<Option<EdgeCond<'a>>>> = vec![vec![None; n]; n];

    for conjunct in conjuncts {
        let Expr::Binary {
            op: BinaryOperator::Eq,
            left,
            right,
        } = conjunct
        else {
            continue;
        };
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
            continue;
        };

        let Some(l) = resolve_side(tables, lt, lc)? else {
            continue;
        };
        let Some(r) = resolve_side(tables, rt, rc)? else {
            continue;
        };
        if l.0 == r.0 {
            continue;
        }

        let edge = EdgeCond {
            expr: conjunct,
            left: l,
            right: r,
        };
        if tables[r.0].get_index(r.1).is_some() {
            edges[r.0][l.0] = true;
            conds[r.0][l.0] = Some(edge);
        }
        if tables[l.0].get_index(l.1).is_some() {
            edges[l.0][r.0] = true;
            conds[l.0][r.0] = Some(edge);
        }
    }

    // Longest index-connected chain; first start achieving the maximum
    // depth wins.
    let mut mark = vec![false; n];
    let mut path = vec![0usize; n];
    let mut max_depth = 0;
    let mut start = 0;
    for i in 0..n {
        let mut best = 0;
        mark.fill(false);
        longest_path(i, 0, &edges, &mut mark, &mut path, None, &mut best);
        if best > max_depth {
            max_depth = best;
            start = i;
        }
    }
    mark.fill(false);
    let mut scratch = 0;
    let found = longest_path(
        start,
        0,
        &edges,
        &mut mark,
        &mut path,
        Some(max_depth),
        &mut scratch,
    );
    debug_assert!(found, "exact-depth rerun must reproduce the best path");

    // Complete the permutation: unused tables appended in ascending
    // position, full-scanned outside the chain.
    let mut used = vec![false; n];
    for &v in &path[..=max_depth] {
        used[v] = true;
    }
    let mut order: Vec<usize> = path[..=max_depth].to_vec();
    for (i, used) in used.iter().enumerate() {
        if !used {
            order.push(i);
        }
    }

    // Bind the probe of each chain position: the index on order[i] and the
    // key column on order[i+1], oriented by which side of the conjunct
    // belongs to order[i].
    let mut probes: Vec<Option<ProbeStep<'a>>> = Vec::with_capacity(n);
    for i in 0..n {
        if i >= max_depth {
            probes.push(None);
            continue;
        }
        let (a, b) = (order[i], order[i + 1]);
        let edge = conds[a][b].ok_or_else(|| {
            ExecutorError::Internal("index-connected chain lost its conjunct".to_string())
        })?;
        let (index_cid, key_column) = if edge.left.0 == a {
            (edge.left.1, edge.right.1)
        } else {
            (edge.right.1, edge.left.1)
        };
        let index = tables[a].get_index(index_cid).ok_or_else(|| {
            ExecutorError::Internal("index-connected chain lost its index".to_string())
        })?;
        probes.push(Some(ProbeStep {
            index,
            key_column,
            join_cond: edge.expr,
        }));
    }

    write!(info, "[Info] Iteration order: ")?;
    for i in 0..n {
        if i != 0 {
            write!(info, ", ")?;
        }
        write!(info, "{}", tables[order[n - 1 - i]].name())?;
    }
    writeln!(info)?;

    write!(info, "[Info] Index use: ")?;
    for i in 0..max_depth {
        if i != 0 {
            write!(info, ", ")?;
        }
        if let Some(edge) = conds[order[i]][order[i + 1]] {
            if let Expr::Binary { left, right, .. } = edge.expr {
                write!(info, "{}-{}", left, right)?;
            }
        }
    }
    writeln!(info)?;

    Ok(JoinPlan {
        order,
        max_depth,
        probes,
    })
}
