//! Built-in instruction kinds.

pub mod analyze_string;
pub mod call_template;
pub mod content;
pub mod declarations;
pub mod schedule;

use crate::element::{CompiledChild, ValidatedElement};
use crate::instruction::{CompiledNode, Instruction};
use crate::registry::InstructionRegistry;
use scrivener_xpath::SequenceType;
use std::sync::Arc;

pub use self::content::UnknownInstruction;

pub fn register_core(registry: &mut InstructionRegistry) {
    registry
        .register(Arc::new(declarations::StylesheetKind::new("stylesheet")))
        .register(Arc::new(declarations::StylesheetKind::new("transform")))
        .register(Arc::new(declarations::TemplateKind))
        .register(Arc::new(declarations::ParamKind))
        .register(Arc::new(call_template::CallTemplateKind))
        .register(Arc::new(call_template::WithParamKind))
        .register(Arc::new(analyze_string::AnalyzeStringKind))
        .register(Arc::new(analyze_string::BranchKind::matching()))
        .register(Arc::new(analyze_string::BranchKind::non_matching()))
        .register(Arc::new(content::TextKind))
        .register(Arc::new(content::ValueOfKind::new("value-of")))
        .register(Arc::new(content::ValueOfKind::new("sequence")))
        .register(Arc::new(content::FallbackKind));
}

pub fn register_interactive(registry: &mut InstructionRegistry) {
    registry.register(Arc::new(schedule::ScheduleActionKind));
}

/// Collects compiled instruction children into one instruction. Fallback
/// content and declarations are left out.
pub(crate) fn sequence_body(children: Vec<CompiledChild>) -> Instruction {
    let mut items: Vec<Instruction> = children
        .into_iter()
        .filter_map(|child| match child.node {
            CompiledNode::Instruction(instruction) => Some(instruction),
            _ => None,
        })
        .collect();
    match items.len() {
        0 => Instruction::Empty,
        1 => items.remove(0),
        _ => Instruction::Sequence(items),
    }
}

/// Result type of a sequence constructor: its children's types in order.
pub(crate) fn sequence_result_type(element: &ValidatedElement) -> SequenceType {
    element
        .children
        .iter()
        .filter(|child| !child.name().is_some_and(|n| n.is_xsl_named("fallback")))
        .fold(SequenceType::empty(), |acc, child| acc.concat(&child.result_type()))
}
