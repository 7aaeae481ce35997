//! Statement and expression AST consumed by the executor.
//!
//! The parser producing these nodes lives outside this crate; the engine
//! only defines the shapes it consumes. Expressions render back to their
//! source form through `Display`, which SELECT uses for CSV headers.

mod ast;

pub use ast::{
    AggregateFunction, BinaryOperator, DeleteStmt, Expr, InsertStmt, SelectStmt, UnaryOperator,
    UpdateStmt,
};
