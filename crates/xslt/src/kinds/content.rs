use super::{sequence_body, sequence_result_type};
use crate::binder::AttributeSpec;
use crate::context::{CompilationUnit, StaticScope};
use crate::element::{CompiledChild, ValidatedElement, ValidatedNode};
use crate::error::CompileFailure;
use crate::instruction::{CompiledNode, Instruction};
use crate::registry::InstructionKind;
use crate::tree::ExpandedName;
use crate::validator::{ChildPolicy, SlotPolicy};
use scrivener_xpath::{Avt, ItemType, SequenceType};

/// `xsl:text`: literal text, whitespace preserved.
pub struct TextKind;

static TEXT_SCHEMA: &[AttributeSpec] = &[AttributeSpec::yes_no("disable-output-escaping")];

impl InstructionKind for TextKind {
    fn name(&self) -> ExpandedName {
        ExpandedName::xsl("text")
    }

    fn schema(&self) -> &[AttributeSpec] {
        TEXT_SCHEMA
    }

    fn child_policy(&self) -> ChildPolicy {
        ChildPolicy::Slots(SlotPolicy::new().allow_text())
    }

    fn result_type(&self, _element: &ValidatedElement) -> SequenceType {
        SequenceType::single(ItemType::String)
    }

    fn compile(
        &self,
        element: &ValidatedElement,
        _children: Vec<CompiledChild>,
        _unit: &mut CompilationUnit,
    ) -> Result<CompiledNode, CompileFailure> {
        let text: String = element
            .children
            .iter()
            .filter_map(|child| match child {
                ValidatedNode::Text { text, .. } => Some(text.as_str()),
                ValidatedNode::Element(_) => None,
            })
            .collect();
        Ok(CompiledNode::Instruction(Instruction::Text(text)))
    }
}

/// `xsl:value-of` and `xsl:sequence`: the string value of `select`.
pub struct ValueOfKind {
    local: &'static str,
}

impl ValueOfKind {
    pub fn new(local: &'static str) -> Self {
        Self { local }
    }
}

static VALUE_OF_SCHEMA: &[AttributeSpec] = &[
    AttributeSpec::expression("select", SequenceType::ATOMIC_SEQUENCE)
        .required()
        .recovery("."),
    AttributeSpec::template("separator").default_value(" "),
];

static SEQUENCE_SCHEMA: &[AttributeSpec] = &[AttributeSpec::expression(
    "select",
    SequenceType::ATOMIC_SEQUENCE,
)
.required()
.recovery(".")];

impl InstructionKind for ValueOfKind {
    fn name(&self) -> ExpandedName {
        ExpandedName::xsl(self.local)
    }

    fn schema(&self) -> &[AttributeSpec] {
        if self.local == "sequence" {
            SEQUENCE_SCHEMA
        } else {
            VALUE_OF_SCHEMA
        }
    }

    fn child_policy(&self) -> ChildPolicy {
        ChildPolicy::Empty
    }

    fn result_type(&self, _element: &ValidatedElement) -> SequenceType {
        if self.local == "sequence" {
            SequenceType::ATOMIC_SEQUENCE
        } else {
            SequenceType::single(ItemType::String)
        }
    }

    fn compile(
        &self,
        element: &ValidatedElement,
        _children: Vec<CompiledChild>,
        _unit: &mut CompilationUnit,
    ) -> Result<CompiledNode, CompileFailure> {
        let select = element
            .attributes
            .expression("select")
            .cloned()
            .ok_or(CompileFailure::Reported)?;
        let separator = element
            .attributes
            .template("separator")
            .cloned()
            .unwrap_or_else(|| Avt::Static(" ".to_string()));
        Ok(CompiledNode::Instruction(Instruction::ValueOf {
            select,
            separator,
        }))
    }
}

/// `xsl:fallback`: content used only when the parent is not recognized.
pub struct FallbackKind;

impl InstructionKind for FallbackKind {
    fn name(&self) -> ExpandedName {
        ExpandedName::xsl("fallback")
    }

    fn schema(&self) -> &[AttributeSpec] {
        &[]
    }

    fn child_policy(&self) -> ChildPolicy {
        ChildPolicy::sequence_constructor()
    }

    fn result_type(&self, element: &ValidatedElement) -> SequenceType {
        sequence_result_type(element)
    }

    fn compile(
        &self,
        _element: &ValidatedElement,
        children: Vec<CompiledChild>,
        _unit: &mut CompilationUnit,
    ) -> Result<CompiledNode, CompileFailure> {
        Ok(CompiledNode::Fallback(sequence_body(children)))
    }
}

/// Stands in for any element with no registered kind. It compiles to its
/// `xsl:fallback` content, and is an error when there is none.
pub struct UnknownInstruction {
    name: ExpandedName,
}

impl UnknownInstruction {
    pub fn new(name: ExpandedName) -> Self {
        Self { name }
    }
}

impl InstructionKind for UnknownInstruction {
    fn name(&self) -> ExpandedName {
        self.name.clone()
    }

    fn schema(&self) -> &[AttributeSpec] {
        &[]
    }

    fn checks_attributes(&self) -> bool {
        false
    }

    fn child_policy(&self) -> ChildPolicy {
        ChildPolicy::sequence_constructor()
    }

    fn validate(
        &self,
        element: &mut ValidatedElement,
        _scope: &StaticScope,
        unit: &mut CompilationUnit,
    ) {
        let fallback = ExpandedName::xsl("fallback");
        if element.children_named(&fallback).next().is_none() {
            let message = if self.name.namespace.is_none() {
                format!("Literal result element {} is not supported here", self.name)
            } else {
                format!("Unknown instruction {} has no xsl:fallback", self.name)
            };
            unit.errors.structural("XTSE0010", message, &element.node);
            element.compilable = false;
        }
    }

    fn result_type(&self, element: &ValidatedElement) -> SequenceType {
        let fallback = ExpandedName::xsl("fallback");
        element
            .children_named(&fallback)
            .fold(SequenceType::empty(), |acc, child| acc.concat(&child.result_type))
    }

    fn compile(
        &self,
        _element: &ValidatedElement,
        children: Vec<CompiledChild>,
        _unit: &mut CompilationUnit,
    ) -> Result<CompiledNode, CompileFailure> {
        let content: Vec<CompiledChild> = children
            .into_iter()
            .filter_map(|child| match child.node {
                CompiledNode::Fallback(instruction) => Some(CompiledChild {
                    name: child.name,
                    node: CompiledNode::Instruction(instruction),
                }),
                _ => None,
            })
            .collect();
        if content.is_empty() {
            return Err(CompileFailure::Reported);
        }
        Ok(CompiledNode::Instruction(sequence_body(content)))
    }
}
