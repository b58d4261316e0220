//! Top-level declarations: the stylesheet element, named templates and
//! their parameters.

use super::sequence_body;
use crate::binder::AttributeSpec;
use crate::context::{CompilationUnit, ParamSignature, StaticScope, TemplateSignature};
use crate::element::{CompiledChild, PreparedElement, ValidatedElement, ValidatedNode};
use crate::error::CompileFailure;
use crate::instruction::{CompiledNode, Executable, NamedTemplate, ParamValue, TemplateParam};
use crate::registry::{Category, InstructionKind};
use crate::tree::ExpandedName;
use crate::typecheck::{Role, check_in_place};
use crate::validator::{ChildPolicy, ChildSlot, SlotPolicy};
use log::debug;
use scrivener_xpath::SequenceType;
use std::collections::HashSet;
use std::sync::Arc;

/// `xsl:stylesheet` and its synonym `xsl:transform`.
pub struct StylesheetKind {
    local: &'static str,
}

impl StylesheetKind {
    pub fn new(local: &'static str) -> Self {
        Self { local }
    }
}

static STYLESHEET_SCHEMA: &[AttributeSpec] = &[
    AttributeSpec::text("version").required().recovery("3.0"),
    AttributeSpec::text("id"),
];

impl InstructionKind for StylesheetKind {
    fn name(&self) -> ExpandedName {
        ExpandedName::xsl(self.local)
    }

    fn category(&self) -> Category {
        Category::Declaration
    }

    fn schema(&self) -> &[AttributeSpec] {
        STYLESHEET_SCHEMA
    }

    fn child_policy(&self) -> ChildPolicy {
        ChildPolicy::Slots(SlotPolicy::new().slot(ChildSlot::any(ExpandedName::xsl("template"))))
    }

    fn result_type(&self, _element: &ValidatedElement) -> SequenceType {
        SequenceType::empty()
    }

    fn compile(
        &self,
        _element: &ValidatedElement,
        children: Vec<CompiledChild>,
        _unit: &mut CompilationUnit,
    ) -> Result<CompiledNode, CompileFailure> {
        let mut executable = Executable::default();
        for child in children {
            if let CompiledNode::Template(template) = child.node {
                debug!("Compiled template '{}'", template.name);
                executable
                    .templates
                    .insert(template.name.clone(), Arc::new(template));
            }
        }
        Ok(CompiledNode::Stylesheet(executable))
    }
}

/// A named `xsl:template`.
pub struct TemplateKind;

static TEMPLATE_SCHEMA: &[AttributeSpec] = &[
    AttributeSpec::name("name").required(),
    AttributeSpec::sequence_type("as"),
];

fn param_signature(param: &PreparedElement) -> Option<ParamSignature> {
    Some(ParamSignature {
        name: param.attributes.name("name")?.to_string(),
        required: param.attributes.flag("required").unwrap_or(false),
        as_type: param.attributes.sequence_type("as"),
    })
}

fn declared_params(template: &PreparedElement) -> impl Iterator<Item = ParamSignature> + '_ {
    template
        .child_elements()
        .filter(|child| child.name.is_xsl_named("param"))
        .filter_map(param_signature)
}

impl InstructionKind for TemplateKind {
    fn name(&self) -> ExpandedName {
        ExpandedName::xsl("template")
    }

    fn category(&self) -> Category {
        Category::Declaration
    }

    fn schema(&self) -> &[AttributeSpec] {
        TEMPLATE_SCHEMA
    }

    fn child_policy(&self) -> ChildPolicy {
        ChildPolicy::SequenceConstructor {
            leading: Some(ExpandedName::xsl("param")),
        }
    }

    fn child_scope(&self, element: &PreparedElement, scope: &StaticScope) -> StaticScope {
        declared_params(element).fold(scope.clone(), |scope, param| {
            let sequence_type = param.as_type.unwrap_or(SequenceType::ITEM_SEQUENCE);
            scope.with_variable(param.name, sequence_type)
        })
    }

    fn declare(&self, element: &PreparedElement, unit: &mut CompilationUnit) {
        let Some(name) = element.attributes.name("name") else {
            return;
        };
        let signature = TemplateSignature {
            name: name.to_string(),
            params: declared_params(element).collect(),
            node: element.node.clone(),
        };
        if let Err(previous) = unit.names.declare_template(signature) {
            let message = format!(
                "Duplicate named template '{}'; first declared at line {}",
                name, previous.node.location
            );
            unit.errors.structural("XTSE0660", message, &element.node);
        }
    }

    fn validate(&self, element: &mut ValidatedElement, _scope: &StaticScope, unit: &mut CompilationUnit) {
        let param = ExpandedName::xsl("param");
        let mut seen = HashSet::new();
        for child in element.children_named(&param) {
            if let Some(name) = child.attributes.name("name")
                && !seen.insert(name)
            {
                unit.errors.structural(
                    "XTSE0580",
                    format!("Duplicate parameter ${} in template", name),
                    &child.node,
                );
            }
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

        let mut params = Vec::new();
        let mut body = Vec::with_capacity(children.len());
        for child in children {
            match child.node {
                CompiledNode::Param(param) => params.push(param),
                _ => body.push(child),
            }
        }

        let mut body = sequence_body(body);
        body.mark_tail_call();
        Ok(CompiledNode::Template(NamedTemplate { name, params, body }))
    }
}

/// `xsl:param` inside a template.
pub struct ParamKind;

static PARAM_SCHEMA: &[AttributeSpec] = &[
    AttributeSpec::name("name").required(),
    AttributeSpec::expression("select", SequenceType::ITEM_SEQUENCE),
    AttributeSpec::sequence_type("as"),
    AttributeSpec::yes_no("required").default_value("no"),
];

/// Whether `element` has content other than `xsl:fallback`.
pub(crate) fn has_content(element: &ValidatedElement) -> bool {
    element.children.iter().any(|child| match child {
        ValidatedNode::Element(e) => !e.name.is_xsl_named("fallback"),
        ValidatedNode::Text { .. } => true,
    })
}

impl InstructionKind for ParamKind {
    fn name(&self) -> ExpandedName {
        ExpandedName::xsl("param")
    }

    fn category(&self) -> Category {
        Category::Declaration
    }

    fn schema(&self) -> &[AttributeSpec] {
        PARAM_SCHEMA
    }

    fn child_policy(&self) -> ChildPolicy {
        ChildPolicy::sequence_constructor()
    }

    fn validate(&self, element: &mut ValidatedElement, scope: &StaticScope, unit: &mut CompilationUnit) {
        let has_select = element.attributes.contains("select");
        if has_select && has_content(element) {
            unit.errors.structural(
                "XTSE0620",
                "xsl:param must not have both a select attribute and content",
                &element.node,
            );
        }

        if element.attributes.flag("required") == Some(true) && (has_select || has_content(element)) {
            unit.errors.structural(
                "XTSE0010",
                "A required parameter must not have a default value",
                &element.node,
            );
        }

        if let Some(required) = element.attributes.sequence_type("as")
            && let Some(select) = element.attributes.expression_mut("select")
        {
            check_in_place(
                select,
                &required,
                &Role::new("xsl:param", "select"),
                scope,
                &mut unit.errors,
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
        Ok(CompiledNode::Param(TemplateParam {
            name,
            required: element.attributes.flag("required").unwrap_or(false),
            as_type: element.attributes.sequence_type("as"),
            default: param_value(element, children),
        }))
    }
}

/// The value a param or with-param supplies: its select, its content, or nothing.
pub(crate) fn param_value(element: &ValidatedElement, children: Vec<CompiledChild>) -> ParamValue {
    if let Some(select) = element.attributes.expression("select") {
        return ParamValue::Select(select.clone());
    }
    if has_content(element) {
        return ParamValue::Content(Box::new(sequence_body(children)));
    }
    ParamValue::Absent
}
