//! Atomic values and sequences produced by evaluation.

use crate::error::XPathError;
use crate::types::ItemType;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum AtomicValue {
    String(String),
    UntypedAtomic(String),
    Boolean(bool),
    Integer(i64),
    Double(f64),
}

pub type Sequence = Vec<AtomicValue>;

impl AtomicValue {
    pub fn item_type(&self) -> ItemType {
        match self {
            AtomicValue::String(_) => ItemType::String,
            AtomicValue::UntypedAtomic(_) => ItemType::UntypedAtomic,
            AtomicValue::Boolean(_) => ItemType::Boolean,
            AtomicValue::Integer(_) => ItemType::Integer,
            AtomicValue::Double(_) => ItemType::Double,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            AtomicValue::Integer(i) => Some(*i as f64),
            AtomicValue::Double(d) => Some(*d),
            _ => None,
        }
    }

    pub fn cast_to(&self, target: ItemType) -> Result<AtomicValue, XPathError> {
        let invalid = || {
            XPathError::dynamic(
                "FORG0001",
                format!("Cannot cast '{}' to {}", self, target),
            )
        };

        match target {
            ItemType::Item | ItemType::AnyAtomic => Ok(self.clone()),
            ItemType::String => Ok(AtomicValue::String(self.to_string())),
            ItemType::UntypedAtomic => Ok(AtomicValue::UntypedAtomic(self.to_string())),
            ItemType::Boolean => match self {
                AtomicValue::Boolean(b) => Ok(AtomicValue::Boolean(*b)),
                AtomicValue::Integer(i) => Ok(AtomicValue::Boolean(*i != 0)),
                AtomicValue::Double(d) => Ok(AtomicValue::Boolean(*d != 0.0 && !d.is_nan())),
                AtomicValue::String(s) | AtomicValue::UntypedAtomic(s) => match s.trim() {
                    "true" | "1" => Ok(AtomicValue::Boolean(true)),
                    "false" | "0" => Ok(AtomicValue::Boolean(false)),
                    _ => Err(invalid()),
                },
            },
            ItemType::Integer => match self {
                AtomicValue::Integer(i) => Ok(AtomicValue::Integer(*i)),
                AtomicValue::Double(d) if d.is_finite() => Ok(AtomicValue::Integer(d.trunc() as i64)),
                AtomicValue::Double(_) => Err(XPathError::dynamic(
                    "FOCA0002",
                    format!("Cannot convert {} to xs:integer", self),
                )),
                AtomicValue::Boolean(b) => Ok(AtomicValue::Integer(i64::from(*b))),
                AtomicValue::String(s) | AtomicValue::UntypedAtomic(s) => s
                    .trim()
                    .parse::<i64>()
                    .map(AtomicValue::Integer)
                    .map_err(|_| invalid()),
            },
            ItemType::Double | ItemType::Numeric => match self {
                AtomicValue::Integer(i) if target == ItemType::Numeric => {
                    Ok(AtomicValue::Integer(*i))
                }
                AtomicValue::Integer(i) => Ok(AtomicValue::Double(*i as f64)),
                AtomicValue::Double(d) => Ok(AtomicValue::Double(*d)),
                AtomicValue::Boolean(b) => Ok(AtomicValue::Double(if *b { 1.0 } else { 0.0 })),
                AtomicValue::String(s) | AtomicValue::UntypedAtomic(s) => {
                    parse_double(s).map(AtomicValue::Double).ok_or_else(invalid)
                }
            },
        }
    }
}

fn parse_double(s: &str) -> Option<f64> {
    match s.trim() {
        "INF" => Some(f64::INFINITY),
        "-INF" => Some(f64::NEG_INFINITY),
        "NaN" => Some(f64::NAN),
        other => other.parse::<f64>().ok(),
    }
}

impl fmt::Display for AtomicValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AtomicValue::String(s) | AtomicValue::UntypedAtomic(s) => f.write_str(s),
            AtomicValue::Boolean(b) => write!(f, "{}", b),
            AtomicValue::Integer(i) => write!(f, "{}", i),
            AtomicValue::Double(d) => {
                if d.is_nan() {
                    f.write_str("NaN")
                } else if d.is_infinite() {
                    f.write_str(if *d > 0.0 { "INF" } else { "-INF" })
                } else if d.fract() == 0.0 && d.abs() < 1e15 {
                    write!(f, "{}", *d as i64)
                } else {
                    write!(f, "{}", d)
                }
            }
        }
    }
}

/// Joins the string values of a sequence with `separator`.
pub fn string_join(sequence: &[AtomicValue], separator: &str) -> String {
    sequence
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(separator)
}

pub fn effective_boolean_value(sequence: &[AtomicValue]) -> Result<bool, XPathError> {
    match sequence {
        [] => Ok(false),
        [AtomicValue::Boolean(b)] => Ok(*b),
        [AtomicValue::String(s)] | [AtomicValue::UntypedAtomic(s)] => Ok(!s.is_empty()),
        [AtomicValue::Integer(i)] => Ok(*i != 0),
        [AtomicValue::Double(d)] => Ok(*d != 0.0 && !d.is_nan()),
        _ => Err(XPathError::dynamic(
            "FORG0006",
            "Effective boolean value is not defined for a sequence of two or more atomic values",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn casts_untyped_values() {
        let untyped = AtomicValue::UntypedAtomic(" 42 ".to_string());
        assert_eq!(
            untyped.cast_to(ItemType::Integer).unwrap(),
            AtomicValue::Integer(42)
        );
        assert!(
            AtomicValue::String("abc".to_string())
                .cast_to(ItemType::Integer)
                .is_err()
        );
    }

    #[test]
    fn doubles_print_canonically() {
        assert_eq!(AtomicValue::Double(2.0).to_string(), "2");
        assert_eq!(AtomicValue::Double(2.5).to_string(), "2.5");
        assert_eq!(AtomicValue::Double(f64::NEG_INFINITY).to_string(), "-INF");
    }

    #[test]
    fn effective_boolean_value_rejects_long_sequences() {
        let seq = vec![AtomicValue::Integer(1), AtomicValue::Integer(2)];
        assert!(effective_boolean_value(&seq).is_err());
        assert!(!effective_boolean_value(&[]).unwrap());
    }
}
