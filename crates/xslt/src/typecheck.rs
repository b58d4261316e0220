//! Static type checking of bound expressions against required types.

use crate::context::StaticScope;
use crate::error::{ErrorKind, ErrorSink};
use crate::tree::NodeRef;
use scrivener_xpath::{Expression, ItemType, SequenceType, XPathError, infer_type};
use std::fmt;

/// Names the place an expression occupies, for error messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Role {
    pub instruction: String,
    pub attribute: String,
}

impl Role {
    pub fn new(instruction: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self {
            instruction: instruction.into(),
            attribute: attribute.into(),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/@{}", self.instruction, self.attribute)
    }
}

/// Item types an untyped value is cast to before use.
fn accepts_conversion(required: ItemType) -> bool {
    required.is_atomic() && !matches!(required, ItemType::AnyAtomic | ItemType::UntypedAtomic)
}

/// Checks `expr` against `required`.
///
/// Returns the expression unchanged when its static type already fits,
/// wrapped in a conversion or a run-time check when it might fit, and an
/// error placeholder (with the error recorded) when it cannot fit.
pub fn static_type_check(
    expr: Expression,
    required: &SequenceType,
    role: &Role,
    scope: &StaticScope,
    sink: &mut ErrorSink,
    node: &NodeRef,
) -> Expression {
    if expr.is_error() {
        return expr;
    }

    let actual = match infer_type(&expr, scope) {
        Ok(t) => t,
        Err(err) => {
            let kind = match err {
                XPathError::TypeError(_) => ErrorKind::Type,
                _ => ErrorKind::Syntax,
            };
            sink.xpath(kind, &err, node);
            return Expression::error(err.code(), err.to_string(), *required);
        }
    };

    if required.subsumes(&actual) {
        return expr;
    }

    let mut expr = expr;
    let mut item_type = actual.item_type;
    if !actual.is_empty_sequence() && accepts_conversion(required.item_type) {
        let promotes_to_double = required.item_type == ItemType::Double
            && matches!(item_type, ItemType::Integer | ItemType::Numeric);
        if item_type.subsumes(ItemType::UntypedAtomic) || promotes_to_double {
            expr = Expression::Convert {
                expr: Box::new(expr),
                target: required.item_type,
            };
            if matches!(item_type, ItemType::UntypedAtomic | ItemType::Integer) {
                item_type = required.item_type;
            }
        }
    }

    let converted = SequenceType::new(item_type, actual.cardinality);
    if required.subsumes(&converted) {
        return expr;
    }

    let cardinality_fits = required.cardinality.intersects(actual.cardinality);
    let item_fits = actual.is_empty_sequence() || required.item_type.overlaps(item_type);
    if cardinality_fits && item_fits {
        return Expression::TreatAs {
            expr: Box::new(expr),
            sequence_type: *required,
        };
    }

    let message = if !item_fits {
        format!(
            "Required item type of {} is {}; supplied value has item type {}",
            role, required.item_type, actual.item_type
        )
    } else {
        format!(
            "Required cardinality of {} is {}; supplied value has type {}",
            role, required, actual
        )
    };
    sink.report(ErrorKind::Type, "XPTY0004", message.clone(), node);
    Expression::error("XPTY0004", message, *required)
}

/// Type-checks the expression in `slot`, replacing it with the result.
pub fn check_in_place(
    slot: &mut Expression,
    required: &SequenceType,
    role: &Role,
    scope: &StaticScope,
    sink: &mut ErrorSink,
    node: &NodeRef,
) {
    let expr = std::mem::replace(slot, Expression::ContextItem);
    *slot = static_type_check(expr, required, role, scope, sink, node);
}
