//! The compile driver.
//!
//! A stylesheet passes through four phases, each over the whole tree:
//!
//! 1. **Bind** (top-down): every element is looked up in the registry and its
//!    raw attributes are bound against the kind's schema, giving a tree of
//!    [`PreparedElement`]s.
//! 2. **Declare**: kinds publish names other elements refer to, such as
//!    named templates and their parameters.
//! 3. **Validate** (bottom-up): children are validated first, in the scope
//!    their parent gives them, then checked against the parent's child
//!    policy. The parent's own expressions are type-checked and its kind
//!    runs any extra checks, giving [`ValidatedElement`]s.
//! 4. **Compile** (bottom-up): each compilable element receives its compiled
//!    children and produces a [`CompiledNode`].
//!
//! No phase stops at the first problem. Errors are recorded in the unit's
//! [`ErrorSink`](crate::error::ErrorSink) and the result carries both the
//! tree and every error found.

use crate::binder::{BoundAttributes, BoundValue, ExpressionParser, XPathParser, bind_attributes};
use crate::config::CompilerConfig;
use crate::context::{CompilationUnit, StaticScope};
use crate::element::{CompiledChild, PreparedElement, PreparedNode, ValidatedElement, ValidatedNode};
use crate::error::{CompileFailure, ErrorKind, StaticError, StaticErrors, XsltError};
use crate::instruction::{CompiledNode, Executable, Instruction};
use crate::kinds::UnknownInstruction;
use crate::parser::parse_stylesheet;
use crate::registry::InstructionRegistry;
use crate::tree::{NodeId, NodeKind, StyleTree};
use crate::typecheck::{Role, check_in_place};
use crate::validator::check_children;
use log::{debug, trace};
use scrivener_xpath::SequenceType;
use std::sync::Arc;

#[derive(Clone)]
pub struct Compiler {
    registry: InstructionRegistry,
    parser: Arc<dyn ExpressionParser + Send + Sync>,
    config: CompilerConfig,
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new(CompilerConfig::default())
    }
}

impl Compiler {
    pub fn new(config: CompilerConfig) -> Self {
        Self {
            registry: InstructionRegistry::standard(&config),
            parser: Arc::new(XPathParser),
            config,
        }
    }

    pub fn with_registry(mut self, registry: InstructionRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_parser(mut self, parser: Arc<dyn ExpressionParser + Send + Sync>) -> Self {
        self.parser = parser;
        self
    }

    pub fn registry_mut(&mut self) -> &mut InstructionRegistry {
        &mut self.registry
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    pub fn compile(&self, tree: &StyleTree) -> CompilationResult {
        let mut unit = CompilationUnit::new(&self.registry, self.parser.as_ref(), &self.config);

        debug!("Binding attributes");
        let PreparedNode::Element(root) = prepare(tree, tree.root(), &mut unit) else {
            return CompilationResult::default();
        };

        debug!("Collecting declarations");
        declare(&root, &mut unit);

        debug!("Validating");
        let validated = validate(root, &StaticScope::default(), &mut unit);

        debug!("Compiling");
        let output = compile_element(&validated, &mut unit);

        let (errors, suppressed) = unit.errors.into_parts();
        debug!(
            "Compilation finished with {} error(s), {} suppressed",
            errors.len(),
            suppressed
        );
        CompilationResult {
            output,
            errors,
            suppressed,
        }
    }

    pub fn compile_str(&self, source: &str) -> Result<CompilationResult, XsltError> {
        let tree = parse_stylesheet(source)?;
        Ok(self.compile(&tree))
    }
}

/// A compiled tree together with every static error found on the way.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompilationResult {
    /// Absent when the root element itself could not be compiled.
    pub output: Option<CompiledNode>,
    pub errors: Vec<StaticError>,
    /// Errors counted but not recorded because of `max_errors`.
    pub suppressed: usize,
}

impl CompilationResult {
    pub fn executable(&self) -> Option<&Executable> {
        match &self.output {
            Some(CompiledNode::Stylesheet(executable)) => Some(executable),
            _ => None,
        }
    }

    /// The compiled root, if it is an instruction.
    pub fn instruction(&self) -> Option<&Instruction> {
        match &self.output {
            Some(CompiledNode::Instruction(instruction)) => Some(instruction),
            _ => None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.errors.is_empty() && self.suppressed == 0 && self.output.is_some()
    }

    pub fn into_result(self) -> Result<Executable, XsltError> {
        if !self.errors.is_empty() {
            return Err(XsltError::Static(StaticErrors(self.errors)));
        }
        if self.suppressed > 0 {
            return Err(XsltError::compile(format!(
                "{} static error(s) found but not recorded",
                self.suppressed
            )));
        }
        match self.output {
            Some(CompiledNode::Stylesheet(executable)) => Ok(executable),
            _ => Err(XsltError::compile(
                "The root element must be xsl:stylesheet or xsl:transform",
            )),
        }
    }
}

/// Parses and compiles `source` with the default configuration.
pub fn compile_stylesheet(source: &str) -> Result<Executable, XsltError> {
    Compiler::default().compile_str(source)?.into_result()
}

fn prepare(tree: &StyleTree, id: NodeId, unit: &mut CompilationUnit) -> PreparedNode {
    let style_node = tree.node(id);
    let node = style_node.node_ref();
    let (name, raw) = match &style_node.kind {
        NodeKind::Element { name, attributes } => (name, attributes),
        NodeKind::Text(text) => {
            return PreparedNode::Text {
                text: text.clone(),
                node,
            };
        }
    };

    let kind = unit.registry.lookup(name).unwrap_or_else(|| {
        trace!("No kind registered for {}", name);
        Arc::new(UnknownInstruction::new(name.clone()))
    });

    let attributes = if kind.checks_attributes() {
        bind_attributes(name, raw, kind.schema(), unit.parser, &mut unit.errors, &node)
    } else {
        BoundAttributes::default()
    };

    let children = tree
        .children(id)
        .map(|(child, _)| prepare(tree, child, unit))
        .collect();

    PreparedNode::Element(PreparedElement {
        name: name.clone(),
        node,
        kind,
        attributes,
        children,
    })
}

fn declare(element: &PreparedElement, unit: &mut CompilationUnit) {
    element.kind.declare(element, unit);
    for child in element.child_elements() {
        declare(child, unit);
    }
}

fn validate(element: PreparedElement, scope: &StaticScope, unit: &mut CompilationUnit) -> ValidatedElement {
    trace!("Validating {}", element.node);
    let child_scope = element.kind.child_scope(&element, scope);
    let PreparedElement {
        name,
        node,
        kind,
        mut attributes,
        children,
    } = element;

    let children = children
        .into_iter()
        .map(|child| match child {
            PreparedNode::Element(e) => ValidatedNode::Element(validate(e, &child_scope, unit)),
            PreparedNode::Text { text, node } => ValidatedNode::Text { text, node },
        })
        .collect();
    let check = check_children(&kind.child_policy(), &name, &node, children, &mut unit.errors);

    let instruction = name.to_string();
    for attribute in attributes.iter_mut() {
        let role = Role::new(instruction.as_str(), attribute.name);
        let required = attribute.required_type;
        match &mut attribute.value {
            BoundValue::Expression(expr) => {
                check_in_place(expr, &required, &role, scope, &mut unit.errors, &node)
            }
            BoundValue::Template(avt) => {
                for expr in avt.expressions_mut() {
                    check_in_place(
                        expr,
                        &SequenceType::ATOMIC_SEQUENCE,
                        &role,
                        scope,
                        &mut unit.errors,
                        &node,
                    );
                }
            }
            _ => {}
        }
    }

    let mut validated = ValidatedElement {
        name,
        node,
        kind: kind.clone(),
        attributes,
        children: check.retained,
        compilable: check.valid,
        result_type: SequenceType::ITEM_SEQUENCE,
    };
    kind.validate(&mut validated, scope, unit);
    validated.result_type = kind.result_type(&validated);
    validated
}

fn compile_node(node: &ValidatedNode, unit: &mut CompilationUnit) -> Option<CompiledChild> {
    match node {
        ValidatedNode::Text { text, .. } => Some(CompiledChild {
            name: None,
            node: CompiledNode::Instruction(Instruction::Text(text.clone())),
        }),
        ValidatedNode::Element(element) => {
            compile_element(element, unit).map(|compiled| CompiledChild {
                name: Some(element.name.clone()),
                node: compiled,
            })
        }
    }
}

fn compile_element(element: &ValidatedElement, unit: &mut CompilationUnit) -> Option<CompiledNode> {
    if !element.compilable {
        trace!("Skipping {}", element.node);
        return None;
    }

    let children = element
        .children
        .iter()
        .filter_map(|child| compile_node(child, unit))
        .collect();

    match element.kind.compile(element, children, unit) {
        Ok(compiled) => Some(compiled),
        Err(CompileFailure::Error { code, message }) => {
            unit.errors
                .report(ErrorKind::PropagatedCompile, code, message, &element.node);
            None
        }
        Err(CompileFailure::Reported) => None,
    }
}
