//! AST node definitions.

use std::fmt;

use crate::datum::Value;

/// Binary operators, in predicate and arithmetic expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    /// Logical AND.
    And,
    /// Logical OR.
    Or,
    /// `=`
    Eq,
    /// `<>`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Mod,
}

impl BinaryOperator {
    /// Source form of the operator.
    pub const fn symbol(self) -> &'static str {
        match self {
            BinaryOperator::And => "AND",
            BinaryOperator::Or => "OR",
            BinaryOperator::Eq => "=",
            BinaryOperator::Ne => "<>",
            BinaryOperator::Lt => "<",
            BinaryOperator::Le => "<=",
            BinaryOperator::Gt => ">",
            BinaryOperator::Ge => ">=",
            BinaryOperator::Add => "+",
            BinaryOperator::Sub => "-",
            BinaryOperator::Mul => "*",
            BinaryOperator::Div => "/",
            BinaryOperator::Mod => "%",
        }
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    /// Arithmetic negation.
    Neg,
    /// Logical NOT.
    Not,
}

/// Aggregate functions. A SELECT list with an aggregate expression switches
/// the statement into single-group aggregate mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunction {
    /// COUNT — counts passing tuples; never evaluates its argument.
    Count,
    /// SUM of a numeric expression.
    Sum,
    /// AVG of a numeric expression.
    Avg,
    /// MIN of a numeric expression.
    Min,
    /// MAX of a numeric expression.
    Max,
}

impl fmt::Display for AggregateFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AggregateFunction::Count => "COUNT",
            AggregateFunction::Sum => "SUM",
            AggregateFunction::Avg => "AVG",
            AggregateFunction::Min => "MIN",
            AggregateFunction::Max => "MAX",
        };
        f.write_str(name)
    }
}

/// An expression tree node.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A literal value.
    Literal(Value),
    /// A column reference, optionally table-qualified.
    ColumnRef {
        /// Qualifying table name, if written.
        table: Option<String>,
        /// Column name.
        column: String,
    },
    /// A binary operation.
    Binary {
        /// Operator.
        op: BinaryOperator,
        /// Left operand.
        left: Box<Expr>,
        /// Right operand.
        right: Box<Expr>,
    },
    /// A unary operation.
    Unary {
        /// Operator.
        op: UnaryOperator,
        /// Operand.
        operand: Box<Expr>,
    },
    /// An aggregate call; `None` argument is `COUNT(*)`.
    Aggregate {
        /// Function.
        func: AggregateFunction,
        /// Argument expression, absent for `COUNT(*)`.
        arg: Option<Box<Expr>>,
    },
}

impl Expr {
    /// A literal node.
    pub fn literal(v: impl Into<Value>) -> Expr {
        Expr::Literal(v.into())
    }

    /// A table-qualified column reference.
    pub fn column(table: impl Into<String>, column: impl Into<String>) -> Expr {
        Expr::ColumnRef {
            table: Some(table.into()),
            column: column.into(),
        }
    }

    /// An unqualified column reference.
    pub fn bare_column(column: impl Into<String>) -> Expr {
        Expr::ColumnRef {
            table: None,
            column: column.into(),
        }
    }

    /// A binary node.
    pub fn binary(op: BinaryOperator, left: Expr, right: Expr) -> Expr {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// A unary node.
    pub fn unary(op: UnaryOperator, operand: Expr) -> Expr {
        Expr::Unary {
            op,
            operand: Box::new(operand),
        }
    }

    /// An aggregate call node.
    pub fn aggregate(func: AggregateFunction, arg: Option<Expr>) -> Expr {
        Expr::Aggregate {
            func,
            arg: arg.map(Box::new),
        }
    }

    /// Whether this selection expression is an aggregate call.
    pub fn is_aggregate(&self) -> bool {
        matches!(self, Expr::Aggregate { .. })
    }
}

/// Source-form rendering, used for CSV headers.
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal(Value::Text(s)) => write!(f, "'{}'", s),
            Expr::Literal(v) => write!(f, "{}", v),
            Expr::ColumnRef { table, column } => match table {
                Some(t) => write!(f, "{}.{}", t, column),
                None => f.write_str(column),
            },
            Expr::Binary { op, left, right } => {
                write!(f, "({} {} {})", left, op.symbol(), right)
            }
            Expr::Unary { op, operand } => match op {
                UnaryOperator::Neg => write!(f, "(-{})", operand),
                UnaryOperator::Not => write!(f, "(NOT {})", operand),
            },
            Expr::Aggregate { func, arg } => match arg {
                Some(arg) => write!(f, "{}({})", func, arg),
                None => write!(f, "{}(*)", func),
            },
        }
    }
}

/// A SELECT statement over one or more tables.
#[derive(Debug, Clone)]
pub struct SelectStmt {
    /// FROM tables, in source order.
    pub tables: Vec<String>,
    /// Projection expressions; empty means dump whole records.
    pub exprs: Vec<Expr>,
    /// WHERE predicate.
    pub where_clause: Option<Expr>,
}

/// An UPDATE statement assigning one column.
#[derive(Debug, Clone)]
pub struct UpdateStmt {
    /// Target table.
    pub table: String,
    /// Assigned column.
    pub column: String,
    /// Value expression, evaluated once per matching row.
    pub value: Expr,
    /// WHERE predicate.
    pub where_clause: Option<Expr>,
}

/// A DELETE statement.
#[derive(Debug, Clone)]
pub struct DeleteStmt {
    /// Target table.
    pub table: String,
    /// WHERE predicate.
    pub where_clause: Option<Expr>,
}

/// An INSERT statement with one or more value tuples.
#[derive(Debug, Clone)]
pub struct InsertStmt {
    /// Target table.
    pub table: String,
    /// Explicit column list; `None` means every declared column.
    pub columns: Option<Vec<String>>,
    /// Value tuples, one per row to insert.
    pub values: Vec<Vec<Expr>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_source_forms() {
        assert_eq!(Expr::column("T", "a").to_string(), "T.a");
        assert_eq!(Expr::bare_column("a").to_string(), "a");
        assert_eq!(
            Expr::aggregate(AggregateFunction::Count, None).to_string(),
            "COUNT(*)"
        );
        assert_eq!(
            Expr::aggregate(AggregateFunction::Sum, Some(Expr::bare_column("a"))).to_string(),
            "SUM(a)"
        );
        assert_eq!(
            Expr::binary(
                BinaryOperator::Gt,
                Expr::column("T", "a"),
                Expr::literal(2),
            )
            .to_string(),
            "(T.a > 2)"
        );
        assert_eq!(Expr::literal("x").to_string(), "'x'");
    }

    #[test]
    fn test_is_aggregate() {
        assert!(Expr::aggregate(AggregateFunction::Count, None).is_aggregate());
        assert!(!Expr::bare_column("a").is_aggregate());
    }
}
