//! Executor-specific errors.

use crate::table::TableError;

/// Errors that can occur during query execution.
#[derive(Debug)]
pub enum ExecutorError {
    /// Referenced table does not exist.
    TableNotFound { name: String },

    /// Referenced column does not exist.
    ColumnNotFound { name: String },

    /// Column reference is ambiguous (matches multiple tables).
    AmbiguousColumn { name: String },

    /// A column was read from a table with no row bound in the row cache.
    RowNotBound { table: String },

    /// Type mismatch in expression evaluation or assignment.
    TypeMismatch { expected: String, found: String },

    /// Predicate did not evaluate to a boolean.
    NotBoolean { found: String },

    /// Integer overflow in arithmetic.
    IntegerOverflow,

    /// Division (or remainder) by zero.
    DivisionByZero,

    /// Aggregate call evaluated in a per-row context.
    MisplacedAggregate,

    /// Aggregate input value was neither INT nor FLOAT.
    AggregateInput { found: String },

    /// Aggregate SELECT with other than exactly one expression.
    AggregateArity { count: usize },

    /// Table-level failure (heap, storage, serialization).
    Table(TableError),

    /// Output sink failure.
    Io(std::io::Error),

    /// Broken internal invariant (planner bookkeeping).
    Internal(String),
}

impl std::fmt::Display for ExecutorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutorError::TableNotFound { name } => {
                write!(f, "table \"{}\" does not exist", name)
            }
            ExecutorError::ColumnNotFound { name } => {
                write!(f, "column \"{}\" does not exist", name)
            }
            ExecutorError::AmbiguousColumn { name } => {
                write!(f, "column reference \"{}\" is ambiguous", name)
            }
            ExecutorError::RowNotBound { table } => {
                write!(f, "no row bound for table \"{}\"", table)
            }
            ExecutorError::TypeMismatch { expected, found } => {
                write!(f, "type mismatch: expected {}, found {}", expected, found)
            }
            ExecutorError::NotBoolean { found } => {
                write!(f, "expected a boolean predicate, found {}", found)
            }
            ExecutorError::IntegerOverflow => write!(f, "integer overflow"),
            ExecutorError::DivisionByZero => write!(f, "division by zero"),
            ExecutorError::MisplacedAggregate => {
                write!(f, "aggregate call is only allowed in a selection list")
            }
            ExecutorError::AggregateInput { found } => {
                write!(f, "aggregate supports only INT and FLOAT input, found {}", found)
            }
            ExecutorError::AggregateArity { count } => {
                write!(
                    f,
                    "aggregate select supports exactly one expression, found {}",
                    count
                )
            }
            ExecutorError::Table(e) => write!(f, "{}", e),
            ExecutorError::Io(e) => write!(f, "output error: {}", e),
            ExecutorError::Internal(msg) => write!(f, "internal error: {}", msg),
        }
    }
}

impl std::error::Error for ExecutorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExecutorError::Table(e) => Some(e),
            ExecutorError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<TableError> for ExecutorError {
    fn from(e: TableError) -> Self {
        ExecutorError::Table(e)
    }
}

impl From<std::io::Error> for ExecutorError {
    fn from(e: std::io::Error) -> Self {
        ExecutorError::Io(e)
    }
}
