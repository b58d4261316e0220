//! Evaluation of compiled expressions against a dynamic context.

use crate::ast::{BinaryOperator, Expression, Literal};
use crate::error::XPathError;
use crate::functions::{self, Dependency};
use crate::types::ItemType;
use crate::value::{AtomicValue, Sequence, effective_boolean_value};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::LazyLock;

static NO_VARIABLES: LazyLock<HashMap<String, Sequence>> = LazyLock::new(HashMap::new);

#[derive(Debug, Clone)]
pub struct DynamicContext<'a> {
    pub context_item: Option<AtomicValue>,
    pub variables: &'a HashMap<String, Sequence>,
    /// Captured groups of the current regex match; index 0 is the whole match.
    pub regex_groups: &'a [String],
}

impl DynamicContext<'static> {
    pub fn empty() -> Self {
        Self {
            context_item: None,
            variables: &NO_VARIABLES,
            regex_groups: &[],
        }
    }
}

impl<'a> DynamicContext<'a> {
    pub fn new(variables: &'a HashMap<String, Sequence>) -> Self {
        Self {
            context_item: None,
            variables,
            regex_groups: &[],
        }
    }

    pub fn with_context_item(mut self, item: Option<AtomicValue>) -> Self {
        self.context_item = item;
        self
    }

    pub fn with_regex_groups(mut self, groups: &'a [String]) -> Self {
        self.regex_groups = groups;
        self
    }
}

pub fn evaluate(expr: &Expression, cx: &DynamicContext) -> Result<Sequence, XPathError> {
    match expr {
        Expression::Literal(Literal::String(s)) => Ok(vec![AtomicValue::String(s.clone())]),
        Expression::Literal(Literal::Integer(i)) => Ok(vec![AtomicValue::Integer(*i)]),
        Expression::Literal(Literal::Double(d)) => Ok(vec![AtomicValue::Double(*d)]),
        Expression::ContextItem => cx
            .context_item
            .clone()
            .map(|item| vec![item])
            .ok_or(XPathError::NoContextItem),
        Expression::Variable(name) => {
            cx.variables
                .get(name)
                .cloned()
                .ok_or_else(|| XPathError::UnknownVariable { name: name.clone() })
        }
        Expression::FunctionCall { name, args } => evaluate_function(name, args, cx),
        Expression::BinaryOp { left, op, right } => match op {
            BinaryOperator::Or => {
                let result = effective_boolean_value(&evaluate(left, cx)?)?
                    || effective_boolean_value(&evaluate(right, cx)?)?;
                Ok(vec![AtomicValue::Boolean(result)])
            }
            BinaryOperator::And => {
                let result = effective_boolean_value(&evaluate(left, cx)?)?
                    && effective_boolean_value(&evaluate(right, cx)?)?;
                Ok(vec![AtomicValue::Boolean(result)])
            }
            op if op.is_comparison() => {
                let lhs = evaluate(left, cx)?;
                let rhs = evaluate(right, cx)?;
                general_compare(&lhs, *op, &rhs).map(|b| vec![AtomicValue::Boolean(b)])
            }
            op => {
                let lhs = evaluate(left, cx)?;
                let rhs = evaluate(right, cx)?;
                arithmetic(&lhs, *op, &rhs)
            }
        },
        Expression::Negate(inner) => {
            let value = evaluate(inner, cx)?;
            match single_numeric(&value, "unary minus")? {
                None => Ok(Vec::new()),
                Some(AtomicValue::Integer(i)) => i
                    .checked_neg()
                    .map(|n| vec![AtomicValue::Integer(n)])
                    .ok_or_else(overflow),
                Some(v) => Ok(vec![AtomicValue::Double(-v.as_double().unwrap_or(f64::NAN))]),
            }
        }
        Expression::StringConcat { left, right } => {
            let mut result = string_operand(&evaluate(left, cx)?)?;
            result.push_str(&string_operand(&evaluate(right, cx)?)?);
            Ok(vec![AtomicValue::String(result)])
        }
        Expression::Sequence(items) => {
            let mut result = Vec::new();
            for item in items {
                result.extend(evaluate(item, cx)?);
            }
            Ok(result)
        }
        Expression::IfExpr {
            condition,
            then_expr,
            else_expr,
        } => {
            if effective_boolean_value(&evaluate(condition, cx)?)? {
                evaluate(then_expr, cx)
            } else {
                evaluate(else_expr, cx)
            }
        }
        Expression::TreatAs {
            expr,
            sequence_type,
        } => {
            let value = evaluate(expr, cx)?;
            let item_ok = value.iter().all(|item| sequence_type.item_type.matches(item));
            if sequence_type.cardinality.matches(value.len()) && item_ok {
                Ok(value)
            } else {
                Err(XPathError::type_error(format!(
                    "Required item type of value is {}; supplied value has {} item(s) ({})",
                    sequence_type,
                    value.len(),
                    value
                        .iter()
                        .map(|v| v.item_type().name())
                        .collect::<Vec<_>>()
                        .join(", ")
                )))
            }
        }
        Expression::Convert { expr, target } => evaluate(expr, cx)?
            .into_iter()
            .map(|item| convert_item(item, *target))
            .collect(),
        Expression::Error { code, message, .. } => Err(XPathError::dynamic(code.clone(), message.clone())),
    }
}

/// Evaluates and requires exactly one item.
pub fn evaluate_single(expr: &Expression, cx: &DynamicContext) -> Result<AtomicValue, XPathError> {
    let mut value = evaluate(expr, cx)?;
    match value.len() {
        1 => Ok(value.remove(0)),
        n => Err(XPathError::type_error(format!(
            "A sequence of {} items is not allowed where exactly one item is required",
            n
        ))),
    }
}

fn convert_item(item: AtomicValue, target: ItemType) -> Result<AtomicValue, XPathError> {
    match (&item, target) {
        (AtomicValue::UntypedAtomic(_), t) if t != ItemType::UntypedAtomic => item.cast_to(t),
        (AtomicValue::Integer(_), ItemType::Double) => item.cast_to(ItemType::Double),
        _ => Ok(item),
    }
}

fn evaluate_function(
    name: &str,
    args: &[Expression],
    cx: &DynamicContext,
) -> Result<Sequence, XPathError> {
    let function = functions::lookup(name, args.len()).ok_or_else(|| XPathError::UnknownFunction {
        name: name.to_string(),
        arity: args.len(),
    })?;

    if function.dependency == Dependency::ContextWhenNoArgs
        && args.is_empty()
        && cx.context_item.is_none()
    {
        return Err(XPathError::NoContextItem);
    }

    let values = args
        .iter()
        .map(|arg| evaluate(arg, cx))
        .collect::<Result<Vec<_>, _>>()?;
    (function.implementation)(&values, cx)
}

fn string_operand(value: &[AtomicValue]) -> Result<String, XPathError> {
    match value {
        [] => Ok(String::new()),
        [item] => Ok(item.to_string()),
        _ => Err(XPathError::type_error(
            "A sequence of more than one item is not allowed as an operand of '||'",
        )),
    }
}

fn single_numeric(value: &[AtomicValue], operation: &str) -> Result<Option<AtomicValue>, XPathError> {
    match value {
        [] => Ok(None),
        [AtomicValue::UntypedAtomic(_)] => value[0].cast_to(ItemType::Double).map(Some),
        [item @ (AtomicValue::Integer(_) | AtomicValue::Double(_))] => Ok(Some(item.clone())),
        [item] => Err(XPathError::type_error(format!(
            "Operand of {} has type {}, which is not numeric",
            operation,
            item.item_type()
        ))),
        _ => Err(XPathError::type_error(format!(
            "A sequence of more than one item is not allowed as an operand of {}",
            operation
        ))),
    }
}

fn overflow() -> XPathError {
    XPathError::dynamic("FOAR0002", "Integer overflow")
}

fn not_arithmetic(op: BinaryOperator) -> XPathError {
    XPathError::type_error(format!("'{}' is not an arithmetic operator", op.symbol()))
}

fn arithmetic(
    lhs: &[AtomicValue],
    op: BinaryOperator,
    rhs: &[AtomicValue],
) -> Result<Sequence, XPathError> {
    let (Some(a), Some(b)) = (single_numeric(lhs, op.symbol())?, single_numeric(rhs, op.symbol())?)
    else {
        return Ok(Vec::new());
    };

    let result = match (a, b) {
        (AtomicValue::Integer(x), AtomicValue::Integer(y)) => match op {
            BinaryOperator::Plus => AtomicValue::Integer(x.checked_add(y).ok_or_else(overflow)?),
            BinaryOperator::Minus => AtomicValue::Integer(x.checked_sub(y).ok_or_else(overflow)?),
            BinaryOperator::Multiply => {
                AtomicValue::Integer(x.checked_mul(y).ok_or_else(overflow)?)
            }
            BinaryOperator::Divide => {
                if y == 0 {
                    return Err(XPathError::DivisionByZero);
                }
                AtomicValue::Double(x as f64 / y as f64)
            }
            BinaryOperator::IntegerDivide => {
                if y == 0 {
                    return Err(XPathError::DivisionByZero);
                }
                AtomicValue::Integer(x.checked_div(y).ok_or_else(overflow)?)
            }
            BinaryOperator::Modulo => {
                if y == 0 {
                    return Err(XPathError::DivisionByZero);
                }
                AtomicValue::Integer(x.checked_rem(y).ok_or_else(overflow)?)
            }
            other => return Err(not_arithmetic(other)),
        },
        (a, b) => {
            let x = a.as_double().unwrap_or(f64::NAN);
            let y = b.as_double().unwrap_or(f64::NAN);
            match op {
                BinaryOperator::Plus => AtomicValue::Double(x + y),
                BinaryOperator::Minus => AtomicValue::Double(x - y),
                BinaryOperator::Multiply => AtomicValue::Double(x * y),
                BinaryOperator::Divide => AtomicValue::Double(x / y),
                BinaryOperator::Modulo => AtomicValue::Double(x % y),
                BinaryOperator::IntegerDivide => {
                    if y == 0.0 {
                        return Err(XPathError::DivisionByZero);
                    }
                    let quotient = (x / y).trunc();
                    if !quotient.is_finite() {
                        return Err(XPathError::dynamic(
                            "FOAR0002",
                            "Integer division result is out of range",
                        ));
                    }
                    AtomicValue::Integer(quotient as i64)
                }
                other => return Err(not_arithmetic(other)),
            }
        }
    };
    Ok(vec![result])
}

/// Existential comparison: true if any pair of items satisfies `op`.
fn general_compare(
    lhs: &[AtomicValue],
    op: BinaryOperator,
    rhs: &[AtomicValue],
) -> Result<bool, XPathError> {
    for a in lhs {
        for b in rhs {
            if let Some(ordering) = compare_atomic(a, b)?
                && ordering_satisfies(ordering, op)
            {
                return Ok(true);
            }
        }
    }
    Ok(false)
}

fn ordering_satisfies(ordering: Ordering, op: BinaryOperator) -> bool {
    match op {
        BinaryOperator::Equals => ordering == Ordering::Equal,
        BinaryOperator::NotEquals => ordering != Ordering::Equal,
        BinaryOperator::LessThan => ordering == Ordering::Less,
        BinaryOperator::LessThanOrEqual => ordering != Ordering::Greater,
        BinaryOperator::GreaterThan => ordering == Ordering::Greater,
        BinaryOperator::GreaterThanOrEqual => ordering != Ordering::Less,
        _ => false,
    }
}

/// `None` means the values are unordered (a NaN was involved).
fn compare_atomic(a: &AtomicValue, b: &AtomicValue) -> Result<Option<Ordering>, XPathError> {
    use AtomicValue::*;
    match (a, b) {
        (String(x) | UntypedAtomic(x), String(y) | UntypedAtomic(y)) => Ok(Some(x.cmp(y))),
        (Boolean(x), Boolean(y)) => Ok(Some(x.cmp(y))),
        (Integer(x), Integer(y)) => Ok(Some(x.cmp(y))),
        (UntypedAtomic(_), Boolean(_)) => compare_atomic(&a.cast_to(ItemType::Boolean)?, b),
        (Boolean(_), UntypedAtomic(_)) => compare_atomic(a, &b.cast_to(ItemType::Boolean)?),
        (UntypedAtomic(_), Integer(_) | Double(_)) => {
            compare_atomic(&a.cast_to(ItemType::Double)?, b)
        }
        (Integer(_) | Double(_), UntypedAtomic(_)) => {
            compare_atomic(a, &b.cast_to(ItemType::Double)?)
        }
        (Integer(_) | Double(_), Integer(_) | Double(_)) => {
            let x = a.as_double().unwrap_or(f64::NAN);
            let y = b.as_double().unwrap_or(f64::NAN);
            Ok(x.partial_cmp(&y))
        }
        _ => Err(XPathError::type_error(format!(
            "Cannot compare {} with {}",
            a.item_type(),
            b.item_type()
        ))),
    }
}
