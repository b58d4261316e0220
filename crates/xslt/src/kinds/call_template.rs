use super::declarations::{has_content, param_value};
use crate::binder::AttributeSpec;
use crate::context::{CompilationUnit, StaticScope};
use crate::element::{CompiledChild, ValidatedElement};
use crate::error::CompileFailure;
use crate::instruction::{CallTemplateInstruction, CompiledNode, Instruction, WithParam};
use crate::registry::{Category, InstructionKind};
use crate::tree::ExpandedName;
use crate::typecheck::{Role, check_in_place};
use crate::validator::{ChildPolicy, ChildSlot, SlotPolicy};
use scrivener_xpath::SequenceType;
use std::collections::HashSet;

/// `xsl:call-template`, checked against the named template's signature.
pub struct CallTemplateKind;

static CALL_TEMPLATE_SCHEMA: &[AttributeSpec] = &[AttributeSpec::name("name").required()];

impl InstructionKind for CallTemplateKind {
    fn name(&self) -> ExpandedName {
        ExpandedName::xsl("call-template")
    }

    fn schema(&self) -> &[AttributeSpec] {
        CALL_TEMPLATE_SCHEMA
    }

    fn child_policy(&self) -> ChildPolicy {
        ChildPolicy::Slots(SlotPolicy::new().slot(ChildSlot::any(ExpandedName::xsl("with-param"))))
    }

    fn validate(&self, element: &mut ValidatedElement, scope: &StaticScope, unit: &mut CompilationUnit) {
        let Some(name) = element.attributes.name("name").map(str::to_string) else {
            return;
        };
        let Some(signature) = unit.names.template(&name).cloned() else {
            unit.errors.structural(
                "XTSE0650",
                format!("No template exists named '{}'", name),
                &element.node,
            );
            return;
        };

        let mut supplied = HashSet::new();
        for with_param in element.child_elements_mut() {
            let Some(param_name) = with_param.attributes.name("name").map(str::to_string) else {
                continue;
            };
            if !supplied.insert(param_name.clone()) {
                unit.errors.structural(
                    "XTSE0670",
                    format!("Duplicate parameter ${} in call of '{}'", param_name, name),
                    &with_param.node,
                );
                continue;
            }
            let Some(declared) = signature.param(&param_name) else {
                unit.errors.structural(
                    "XTSE0680",
                    format!("Template '{}' declares no parameter ${}", name, param_name),
                    &with_param.node,
                );
                continue;
            };
            if let Some(required) = declared.as_type
                && let Some(select) = with_param.attributes.expression_mut("select")
            {
                check_in_place(
                    select,
                    &required,
                    &Role::new("xsl:with-param", "select"),
                    scope,
                    &mut unit.errors,
                    &with_param.node,
                );
            }
        }

        for param in signature.params.iter().filter(|p| p.required) {
            if !supplied.contains(&param.name) {
                unit.errors.structural(
                    "XTSE0690",
                    format!(
                        "No value supplied for required parameter ${} of template '{}'",
                        param.name, name
                    ),
                    &element.node,
                );
            }
        }
    }

    fn compile(
        &self,
        element: &ValidatedElement,
        children: Vec<CompiledChild>,
        _unit: &mut CompilationUnit,
    ) -> Result<CompiledNode, CompileFailure> {
        let name = element
            .attributes
            .name("name")
            .ok_or(CompileFailure::Reported)?
            .to_string();
        let params = children
            .into_iter()
            .filter_map(|child| match child.node {
                CompiledNode::WithParam(param) => Some(param),
                _ => None,
            })
            .collect();
        Ok(CompiledNode::Instruction(Instruction::CallTemplate(
            CallTemplateInstruction {
                name,
                params,
                tail_call: false,
            },
        )))
    }
}

/// `xsl:with-param` inside a call.
pub struct WithParamKind;

static WITH_PARAM_SCHEMA: &[AttributeSpec] = &[
    AttributeSpec::name("name").required(),
    AttributeSpec::expression("select", SequenceType::ITEM_SEQUENCE),
];

impl InstructionKind for WithParamKind {
    fn name(&self) -> ExpandedName {
        ExpandedName::xsl("with-param")
    }

    fn category(&self) -> Category {
        Category::Declaration
    }

    fn schema(&self) -> &[AttributeSpec] {
        WITH_PARAM_SCHEMA
    }

    fn child_policy(&self) -> ChildPolicy {
        ChildPolicy::sequence_constructor()
    }

    fn validate(&self, element: &mut ValidatedElement, _scope: &StaticScope, unit: &mut CompilationUnit) {
        if element.attributes.contains("select") && has_content(element) {
            unit.errors.structural(
                "XTSE0620",
                "xsl:with-param must not have both a select attribute and content",
                &element.node,
            );
        }
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
        let name = element
            .attributes
            .name("name")
            .ok_or(CompileFailure::Reported)?
            .to_string();
        Ok(CompiledNode::WithParam(WithParam {
            name,
            value: param_value(element, children),
        }))
    }
}
