//! A small XPath expression language for stylesheet compilation.
//!
//! Covers parsing, static type inference against a [`StaticContext`] and
//! evaluation of atomic-valued expressions.

pub mod ast;
pub mod avt;
pub mod engine;
pub mod error;
pub mod functions;
pub mod parser;
pub mod pattern;
pub mod static_type;
pub mod types;
pub mod value;

pub use ast::{BinaryOperator, Expression, Literal};
pub use avt::{Avt, AvtPart, parse_avt};
pub use engine::{DynamicContext, evaluate, evaluate_single};
pub use error::XPathError;
pub use parser::parse_expression;
pub use pattern::compile_regex;
pub use static_type::{StaticContext, infer_type};
pub use types::{Cardinality, ItemType, SequenceType, parse_sequence_type};
pub use value::{AtomicValue, Sequence, effective_boolean_value, string_join};
