//! `ixsl:schedule-action`: run a named template later.
//!
//! The only permitted child is a single `xsl:call-template`, which is
//! always compiled as a tail call.

use crate::binder::AttributeSpec;
use crate::context::CompilationUnit;
use crate::element::{CompiledChild, ValidatedElement};
use crate::error::CompileFailure;
use crate::instruction::{CompiledNode, Instruction, ScheduleInstruction};
use crate::registry::InstructionKind;
use crate::tree::ExpandedName;
use crate::validator::{ChildPolicy, ChildSlot, Occurs, SlotPolicy};
use log::trace;
use scrivener_xpath::SequenceType;

const SINGLE_CALL_MESSAGE: &str =
    "ixsl:schedule-action must contain a single xsl:call-template instruction";

pub struct ScheduleActionKind;

static SCHEDULE_SCHEMA: &[AttributeSpec] =
    &[AttributeSpec::expression("wait", SequenceType::SINGLE_INTEGER)];

impl InstructionKind for ScheduleActionKind {
    fn name(&self) -> ExpandedName {
        ExpandedName::ixsl("schedule-action")
    }

    fn schema(&self) -> &[AttributeSpec] {
        SCHEDULE_SCHEMA
    }

    fn child_policy(&self) -> ChildPolicy {
        ChildPolicy::Slots(
            SlotPolicy::new()
                .slot(ChildSlot::new(
                    ExpandedName::xsl("call-template"),
                    Occurs::ExactlyOne,
                    "XTSE0010",
                    SINGLE_CALL_MESSAGE,
                ))
                .disallowed_message(SINGLE_CALL_MESSAGE),
        )
    }

    fn result_type(&self, _element: &ValidatedElement) -> SequenceType {
        SequenceType::empty()
    }

    fn compile(
        &self,
        element: &ValidatedElement,
        children: Vec<CompiledChild>,
        _unit: &mut CompilationUnit,
    ) -> Result<CompiledNode, CompileFailure> {
        let mut call = children
            .into_iter()
            .find_map(|child| match child.node {
                CompiledNode::Instruction(Instruction::CallTemplate(call)) => Some(call),
                _ => None,
            })
            .ok_or(CompileFailure::Reported)?;
        call.tail_call = true;

        let wait = element.attributes.expression("wait").cloned();
        trace!(
            "Scheduling call of '{}' ({})",
            call.name,
            if wait.is_some() { "delayed" } else { "immediate" }
        );
        Ok(CompiledNode::Instruction(Instruction::Schedule(
            ScheduleInstruction { call, wait },
        )))
    }
}
