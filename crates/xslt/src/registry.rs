//! Instruction kinds and the registry that dispatches on them.
//!
//! Shared compiler code never names a particular instruction: it looks the
//! element up here and calls through [`InstructionKind`].

use crate::binder::AttributeSpec;
use crate::config::CompilerConfig;
use crate::context::{CompilationUnit, StaticScope};
use crate::element::{CompiledChild, PreparedElement, ValidatedElement};
use crate::error::CompileFailure;
use crate::instruction::CompiledNode;
use crate::kinds;
use crate::tree::ExpandedName;
use crate::validator::ChildPolicy;
use scrivener_xpath::SequenceType;
use std::collections::HashMap;
use std::sync::Arc;

/// Where an element may appear.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    /// Allowed in any sequence constructor.
    Instruction,
    /// Only allowed where a parent policy names it.
    Declaration,
}

pub trait InstructionKind: Send + Sync {
    fn name(&self) -> ExpandedName;

    fn category(&self) -> Category {
        Category::Instruction
    }

    fn schema(&self) -> &[AttributeSpec];

    /// False for kinds that accept whatever attributes they are given.
    fn checks_attributes(&self) -> bool {
        true
    }

    fn child_policy(&self) -> ChildPolicy;

    /// The static scope this element's children are validated in.
    fn child_scope(&self, _element: &PreparedElement, scope: &StaticScope) -> StaticScope {
        scope.clone()
    }

    /// Declaration pass, run over the whole tree before validation.
    fn declare(&self, _element: &PreparedElement, _unit: &mut CompilationUnit) {}

    /// Kind-specific checks after children and attributes are validated.
    fn validate(
        &self,
        _element: &mut ValidatedElement,
        _scope: &StaticScope,
        _unit: &mut CompilationUnit,
    ) {
    }

    fn result_type(&self, _element: &ValidatedElement) -> SequenceType {
        SequenceType::ITEM_SEQUENCE
    }

    fn compile(
        &self,
        element: &ValidatedElement,
        children: Vec<CompiledChild>,
        unit: &mut CompilationUnit,
    ) -> Result<CompiledNode, CompileFailure>;
}

#[derive(Clone, Default)]
pub struct InstructionRegistry {
    kinds: HashMap<ExpandedName, Arc<dyn InstructionKind>>,
}

impl InstructionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in kinds; `ixsl:` extensions only when the config enables them.
    pub fn standard(config: &CompilerConfig) -> Self {
        let mut registry = Self::new();
        kinds::register_core(&mut registry);
        if config.interactive_extensions {
            kinds::register_interactive(&mut registry);
        }
        registry
    }

    /// Adds a kind, replacing any kind registered under the same name.
    pub fn register(&mut self, kind: Arc<dyn InstructionKind>) -> &mut Self {
        self.kinds.insert(kind.name(), kind);
        self
    }

    pub fn lookup(&self, name: &ExpandedName) -> Option<Arc<dyn InstructionKind>> {
        self.kinds.get(name).cloned()
    }

    pub fn contains(&self, name: &ExpandedName) -> bool {
        self.kinds.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}
