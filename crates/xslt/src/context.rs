//! Compile-wide state shared by every node.

use crate::binder::ExpressionParser;
use crate::config::CompilerConfig;
use crate::error::ErrorSink;
use crate::registry::InstructionRegistry;
use crate::tree::NodeRef;
use scrivener_xpath::{ItemType, SequenceType, StaticContext};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub struct ParamSignature {
    pub name: String,
    pub required: bool,
    pub as_type: Option<SequenceType>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TemplateSignature {
    pub name: String,
    pub params: Vec<ParamSignature>,
    pub node: NodeRef,
}

impl TemplateSignature {
    pub fn param(&self, name: &str) -> Option<&ParamSignature> {
        self.params.iter().find(|p| p.name == name)
    }
}

/// Names declared anywhere in the stylesheet, filled by the declaration pass.
#[derive(Debug, Default)]
pub struct NameTables {
    templates: HashMap<String, TemplateSignature>,
}

impl NameTables {
    /// Returns the earlier declaration if `name` is already taken.
    pub fn declare_template(&mut self, signature: TemplateSignature) -> Result<(), &TemplateSignature> {
        if self.templates.contains_key(&signature.name) {
            return Err(&self.templates[&signature.name]);
        }
        self.templates.insert(signature.name.clone(), signature);
        Ok(())
    }

    pub fn template(&self, name: &str) -> Option<&TemplateSignature> {
        self.templates.get(name)
    }
}

pub struct CompilationUnit<'a> {
    pub registry: &'a InstructionRegistry,
    pub parser: &'a dyn ExpressionParser,
    pub config: &'a CompilerConfig,
    pub names: NameTables,
    pub errors: ErrorSink,
}

impl<'a> CompilationUnit<'a> {
    pub fn new(
        registry: &'a InstructionRegistry,
        parser: &'a dyn ExpressionParser,
        config: &'a CompilerConfig,
    ) -> Self {
        Self {
            registry,
            parser,
            config,
            names: NameTables::default(),
            errors: ErrorSink::new(config.max_errors),
        }
    }
}

/// Variables and focus visible where an expression appears.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StaticScope {
    variables: HashMap<String, SequenceType>,
    context_item: Option<ItemType>,
}

impl StaticScope {
    pub fn with_variable(mut self, name: impl Into<String>, sequence_type: SequenceType) -> Self {
        self.variables.insert(name.into(), sequence_type);
        self
    }

    pub fn with_context_item(mut self, item_type: ItemType) -> Self {
        self.context_item = Some(item_type);
        self
    }
}

impl StaticContext for StaticScope {
    fn variable_type(&self, name: &str) -> Option<SequenceType> {
        self.variables.get(name).copied()
    }

    fn context_item_type(&self) -> Option<ItemType> {
        self.context_item
    }
}
