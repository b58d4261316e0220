//! Static type inference.
//!
//! Reports the [`SequenceType`] an expression is guaranteed to produce and
//! surfaces reference errors (undeclared variables, unknown functions)
//! without evaluating anything.

use crate::ast::{BinaryOperator, Expression, Literal};
use crate::error::XPathError;
use crate::functions;
use crate::types::{Cardinality, ItemType, SequenceType};

/// Names and types in scope where an expression appears.
pub trait StaticContext {
    fn variable_type(&self, name: &str) -> Option<SequenceType>;

    /// `None` when nothing is known about the focus.
    fn context_item_type(&self) -> Option<ItemType> {
        None
    }
}

pub fn infer_type(expr: &Expression, cx: &dyn StaticContext) -> Result<SequenceType, XPathError> {
    match expr {
        Expression::Literal(Literal::String(_)) => Ok(SequenceType::single(ItemType::String)),
        Expression::Literal(Literal::Integer(_)) => Ok(SequenceType::SINGLE_INTEGER),
        Expression::Literal(Literal::Double(_)) => Ok(SequenceType::single(ItemType::Double)),
        Expression::ContextItem => Ok(SequenceType::single(
            cx.context_item_type().unwrap_or(ItemType::Item),
        )),
        Expression::Variable(name) => cx
            .variable_type(name)
            .ok_or_else(|| XPathError::UnknownVariable { name: name.clone() }),
        Expression::FunctionCall { name, args } => {
            let function = functions::lookup(name, args.len()).ok_or_else(|| {
                XPathError::UnknownFunction {
                    name: name.clone(),
                    arity: args.len(),
                }
            })?;
            for arg in args {
                infer_type(arg, cx)?;
            }
            Ok(function.return_type)
        }
        Expression::BinaryOp { left, op, right } => {
            let lhs = infer_type(left, cx)?;
            let rhs = infer_type(right, cx)?;
            if op.is_comparison() || op.is_logical() {
                Ok(SequenceType::single(ItemType::Boolean))
            } else {
                arithmetic_type(&lhs, *op, &rhs)
            }
        }
        Expression::Negate(inner) => {
            let operand = infer_type(inner, cx)?;
            if operand.is_empty_sequence() {
                return Ok(SequenceType::empty());
            }
            let item_type = numeric_operand(operand.item_type, "unary minus")?;
            Ok(SequenceType::new(item_type, numeric_cardinality(&[operand])))
        }
        Expression::StringConcat { left, right } => {
            infer_type(left, cx)?;
            infer_type(right, cx)?;
            Ok(SequenceType::single(ItemType::String))
        }
        Expression::Sequence(items) => items.iter().try_fold(SequenceType::empty(), |acc, item| {
            Ok(acc.concat(&infer_type(item, cx)?))
        }),
        Expression::IfExpr {
            condition,
            then_expr,
            else_expr,
        } => {
            infer_type(condition, cx)?;
            let then_type = infer_type(then_expr, cx)?;
            let else_type = infer_type(else_expr, cx)?;
            Ok(then_type.union(&else_type))
        }
        Expression::TreatAs { sequence_type, .. } => Ok(*sequence_type),
        Expression::Convert { expr, target } => {
            let inner = infer_type(expr, cx)?;
            Ok(SequenceType::new(*target, inner.cardinality))
        }
        Expression::Error { static_type, .. } => Ok(*static_type),
    }
}

fn numeric_operand(item_type: ItemType, operation: &str) -> Result<ItemType, XPathError> {
    match item_type {
        ItemType::UntypedAtomic => Ok(ItemType::Double),
        ItemType::Item | ItemType::AnyAtomic => Ok(ItemType::Numeric),
        t if t.is_numeric() => Ok(t),
        t => Err(XPathError::type_error(format!(
            "Operand of {} has static type {}, which is not numeric",
            operation, t
        ))),
    }
}

fn numeric_cardinality(operands: &[SequenceType]) -> Cardinality {
    if operands
        .iter()
        .all(|t| t.cardinality == Cardinality::ExactlyOne)
    {
        Cardinality::ExactlyOne
    } else {
        Cardinality::ZeroOrOne
    }
}

fn arithmetic_type(
    lhs: &SequenceType,
    op: BinaryOperator,
    rhs: &SequenceType,
) -> Result<SequenceType, XPathError> {
    if lhs.is_empty_sequence() || rhs.is_empty_sequence() {
        return Ok(SequenceType::empty());
    }

    let a = numeric_operand(lhs.item_type, op.symbol())?;
    let b = numeric_operand(rhs.item_type, op.symbol())?;

    let item_type = match (op, a, b) {
        (BinaryOperator::IntegerDivide, _, _) => ItemType::Integer,
        (BinaryOperator::Divide, ItemType::Integer, ItemType::Integer) => ItemType::Double,
        (_, ItemType::Integer, ItemType::Integer) => ItemType::Integer,
        (_, ItemType::Double, _) | (_, _, ItemType::Double) => ItemType::Double,
        _ => ItemType::Numeric,
    };

    Ok(SequenceType::new(item_type, numeric_cardinality(&[*lhs, *rhs])))
}
