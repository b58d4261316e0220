//! Expression AST types.
//!
//! The parser only produces the surface forms. [`Expression::TreatAs`],
//! [`Expression::Convert`] and [`Expression::Error`] are inserted by static
//! type checking in the stylesheet compiler.

use crate::functions;
use crate::types::{ItemType, SequenceType};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Literal(Literal),
    ContextItem,
    Variable(String),
    FunctionCall {
        name: String,
        args: Vec<Expression>,
    },
    BinaryOp {
        left: Box<Expression>,
        op: BinaryOperator,
        right: Box<Expression>,
    },
    Negate(Box<Expression>),
    StringConcat {
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Sequence(Vec<Expression>),
    IfExpr {
        condition: Box<Expression>,
        then_expr: Box<Expression>,
        else_expr: Box<Expression>,
    },
    /// Checks at run time that the value matches `sequence_type`.
    TreatAs {
        expr: Box<Expression>,
        sequence_type: SequenceType,
    },
    /// Casts untyped (or promotable numeric) items to `target`.
    Convert {
        expr: Box<Expression>,
        target: ItemType,
    },
    /// Stands in for an expression that failed to compile; raises `code` if evaluated.
    Error {
        code: String,
        message: String,
        static_type: SequenceType,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(String),
    Integer(i64),
    Double(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOperator {
    Or,
    And,
    Equals,
    NotEquals,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    Plus,
    Minus,
    Multiply,
    Divide,
    IntegerDivide,
    Modulo,
}

impl BinaryOperator {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOperator::Equals
                | BinaryOperator::NotEquals
                | BinaryOperator::LessThan
                | BinaryOperator::LessThanOrEqual
                | BinaryOperator::GreaterThan
                | BinaryOperator::GreaterThanOrEqual
        )
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOperator::Or | BinaryOperator::And)
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOperator::Or => "or",
            BinaryOperator::And => "and",
            BinaryOperator::Equals => "=",
            BinaryOperator::NotEquals => "!=",
            BinaryOperator::LessThan => "<",
            BinaryOperator::LessThanOrEqual => "<=",
            BinaryOperator::GreaterThan => ">",
            BinaryOperator::GreaterThanOrEqual => ">=",
            BinaryOperator::Plus => "+",
            BinaryOperator::Minus => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "div",
            BinaryOperator::IntegerDivide => "idiv",
            BinaryOperator::Modulo => "mod",
        }
    }
}

impl Expression {
    pub fn string(s: impl Into<String>) -> Self {
        Expression::Literal(Literal::String(s.into()))
    }

    pub fn integer(i: i64) -> Self {
        Expression::Literal(Literal::Integer(i))
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>, static_type: SequenceType) -> Self {
        Expression::Error {
            code: code.into(),
            message: message.into(),
            static_type,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Expression::Error { .. })
    }

    /// True if the value can be computed without a focus, variables or regex state.
    pub fn is_context_free(&self) -> bool {
        match self {
            Expression::Literal(_) => true,
            Expression::ContextItem | Expression::Variable(_) | Expression::Error { .. } => false,
            Expression::FunctionCall { name, args } => {
                !functions::depends_on_focus(name, args.len())
                    && args.iter().all(Expression::is_context_free)
            }
            Expression::BinaryOp { left, right, .. }
            | Expression::StringConcat { left, right } => {
                left.is_context_free() && right.is_context_free()
            }
            Expression::Negate(expr)
            | Expression::TreatAs { expr, .. }
            | Expression::Convert { expr, .. } => expr.is_context_free(),
            Expression::Sequence(items) => items.iter().all(Expression::is_context_free),
            Expression::IfExpr {
                condition,
                then_expr,
                else_expr,
            } => {
                condition.is_context_free()
                    && then_expr.is_context_free()
                    && else_expr.is_context_free()
            }
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Literal(Literal::String(s)) => write!(f, "'{}'", s.replace('\'', "''")),
            Expression::Literal(Literal::Integer(i)) => write!(f, "{}", i),
            Expression::Literal(Literal::Double(d)) => write!(f, "{:e}", d),
            Expression::ContextItem => f.write_str("."),
            Expression::Variable(name) => write!(f, "${}", name),
            Expression::FunctionCall { name, args } => {
                write!(f, "{}(", name)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                f.write_str(")")
            }
            Expression::BinaryOp { left, op, right } => {
                write!(f, "({} {} {})", left, op.symbol(), right)
            }
            Expression::Negate(expr) => write!(f, "-{}", expr),
            Expression::StringConcat { left, right } => write!(f, "({} || {})", left, right),
            Expression::Sequence(items) => {
                f.write_str("(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str(")")
            }
            Expression::IfExpr {
                condition,
                then_expr,
                else_expr,
            } => write!(f, "if ({}) then {} else {}", condition, then_expr, else_expr),
            Expression::TreatAs {
                expr,
                sequence_type,
            } => write!(f, "({} treat as {})", expr, sequence_type),
            Expression::Convert { expr, target } => write!(f, "convert({}, {})", expr, target),
            Expression::Error { code, .. } => write!(f, "error('{}')", code),
        }
    }
}
