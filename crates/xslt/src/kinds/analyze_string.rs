//! `xsl:analyze-string` and its two branch elements.

use super::{sequence_body, sequence_result_type};
use crate::binder::AttributeSpec;
use crate::context::{CompilationUnit, StaticScope};
use crate::element::{CompiledChild, PreparedElement, ValidatedElement};
use crate::error::{CompileFailure, ErrorKind};
use crate::instruction::{AnalyzeStringInstruction, CompiledNode, Instruction};
use crate::registry::{Category, InstructionKind};
use crate::tree::{ExpandedName, NodeRef};
use crate::validator::{ChildPolicy, ChildSlot, Occurs, SlotPolicy};
use log::debug;
use scrivener_xpath::pattern::matches_empty_string;
use scrivener_xpath::{ItemType, SequenceType, compile_regex};

const MATCHING: &str = "matching-substring";
const NON_MATCHING: &str = "non-matching-substring";

pub struct AnalyzeStringKind;

static ANALYZE_STRING_SCHEMA: &[AttributeSpec] = &[
    AttributeSpec::expression("select", SequenceType::OPTIONAL_STRING)
        .required()
        .recovery("."),
    AttributeSpec::template("regex").required().recovery("xxx"),
    AttributeSpec::template("flags").default_value(""),
];

impl InstructionKind for AnalyzeStringKind {
    fn name(&self) -> ExpandedName {
        ExpandedName::xsl("analyze-string")
    }

    fn schema(&self) -> &[AttributeSpec] {
        ANALYZE_STRING_SCHEMA
    }

    fn child_policy(&self) -> ChildPolicy {
        let matching = ExpandedName::xsl(MATCHING);
        let non_matching = ExpandedName::xsl(NON_MATCHING);
        ChildPolicy::Slots(
            SlotPolicy::new()
                .slot(ChildSlot::new(
                    matching.clone(),
                    Occurs::AtMostOne,
                    "XTSE0010",
                    "xsl:matching-substring element must only appear once",
                ))
                .slot(ChildSlot::new(
                    non_matching.clone(),
                    Occurs::AtMostOne,
                    "XTSE0010",
                    "xsl:non-matching-substring element must only appear once",
                ))
                .require_any(
                    vec![matching, non_matching],
                    "XTSE1130",
                    "At least one xsl:matching-substring or xsl:non-matching-substring element must be present",
                )
                .disallowed_message(
                    "Only xsl:matching-substring and xsl:non-matching-substring are allowed here",
                ),
        )
    }

    fn validate(&self, element: &mut ValidatedElement, _scope: &StaticScope, unit: &mut CompilationUnit) {
        if !unit.config.validate_static_regex {
            return;
        }
        let Some(flags) = element.attributes.template("flags").and_then(|f| f.as_static()) else {
            return;
        };
        let regex = element.attributes.template("regex").and_then(|r| r.as_static());

        if let Some(problem) = check_fixed_regex(regex, flags) {
            let (code, message) = problem;
            unit.errors.report(ErrorKind::Syntax, code, message, &element.node);
            element.compilable = false;
        }
    }

    fn result_type(&self, element: &ValidatedElement) -> SequenceType {
        let item_type = element
            .child_elements()
            .filter(|child| child.name.is_xsl_named(MATCHING) || child.name.is_xsl_named(NON_MATCHING))
            .map(|child| child.result_type)
            .filter(|t| !t.is_empty_sequence())
            .map(|t| t.item_type)
            .reduce(ItemType::common_supertype)
            .unwrap_or(ItemType::Item);
        SequenceType::any(item_type)
    }

    fn compile(
        &self,
        element: &ValidatedElement,
        children: Vec<CompiledChild>,
        unit: &mut CompilationUnit,
    ) -> Result<CompiledNode, CompileFailure> {
        let input = element
            .attributes
            .expression("select")
            .cloned()
            .ok_or(CompileFailure::Reported)?;
        let regex = element
            .attributes
            .template("regex")
            .cloned()
            .ok_or(CompileFailure::Reported)?;
        let flags = element
            .attributes
            .template("flags")
            .cloned()
            .ok_or(CompileFailure::Reported)?;

        let mut matching = None;
        let mut non_matching = None;
        for child in children {
            let (Some(name), CompiledNode::Instruction(body)) = (child.name, child.node) else {
                continue;
            };
            let slot = if name.is_xsl_named(MATCHING) {
                &mut matching
            } else if name.is_xsl_named(NON_MATCHING) {
                &mut non_matching
            } else {
                continue;
            };
            *slot = branch(body, &element.node, unit).map(Box::new);
        }

        Ok(CompiledNode::Instruction(Instruction::AnalyzeString(
            AnalyzeStringInstruction {
                input,
                regex,
                flags,
                matching,
                non_matching,
            },
        )))
    }
}

/// Simplifies one branch. A failure is recorded here and only drops this
/// branch.
fn branch(body: Instruction, node: &NodeRef, unit: &mut CompilationUnit) -> Option<Instruction> {
    if !unit.config.simplify_branches {
        return Some(body);
    }
    match body.simplify() {
        Ok(simplified) => Some(simplified),
        Err(err) => {
            debug!("Dropping analyze-string branch: {}", err);
            unit.errors.xpath(ErrorKind::PropagatedCompile, &err, node);
            None
        }
    }
}

/// Checks fixed flags, and the regex too when it is fixed.
fn check_fixed_regex(regex: Option<&str>, flags: &str) -> Option<(&'static str, String)> {
    let pattern = regex.unwrap_or("");
    match compile_regex(pattern, flags) {
        Err(err) if err.code() == "FORX0001" => Some(("XTDE1145", err.to_string())),
        Err(err) => regex.map(|_| ("XTDE1140", err.to_string())),
        Ok(compiled) if regex.is_some() && matches_empty_string(&compiled) => Some((
            "XTDE1150",
            format!("The regular expression '{}' matches a zero-length string", pattern),
        )),
        Ok(_) => None,
    }
}

/// `xsl:matching-substring` or `xsl:non-matching-substring`. The context
/// item inside either branch is the current substring.
pub struct BranchKind {
    local: &'static str,
}

impl BranchKind {
    pub fn matching() -> Self {
        Self { local: MATCHING }
    }

    pub fn non_matching() -> Self {
        Self { local: NON_MATCHING }
    }
}

impl InstructionKind for BranchKind {
    fn name(&self) -> ExpandedName {
        ExpandedName::xsl(self.local)
    }

    fn category(&self) -> Category {
        Category::Declaration
    }

    fn schema(&self) -> &[AttributeSpec] {
        &[]
    }

    fn child_policy(&self) -> ChildPolicy {
        ChildPolicy::sequence_constructor()
    }

    fn child_scope(&self, _element: &PreparedElement, scope: &StaticScope) -> StaticScope {
        scope.clone().with_context_item(ItemType::String)
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
        Ok(CompiledNode::Instruction(sequence_body(children)))
    }
}
