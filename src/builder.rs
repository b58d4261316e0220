use crate::error::ScrivenerError;
use scrivener_xslt::{Compiler, CompilerConfig, ExpressionParser, InstructionKind};
use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;

/// A builder for creating a configured [`Compiler`].
#[derive(Default)]
pub struct CompilerBuilder {
    config: CompilerConfig,
    extra_kinds: Vec<Arc<dyn InstructionKind>>,
    parser: Option<Arc<dyn ExpressionParser + Send + Sync>>,
}

impl CompilerBuilder {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn with_config(mut self, config: CompilerConfig) -> Self {
        self.config = config;
        self
    }

    /// Loads settings from a JSON file. Fields left out keep their defaults.
    pub fn with_config_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, ScrivenerError> {
        let path_ref = path.as_ref();
        let source = fs::read_to_string(path_ref).map_err(|e| {
            ScrivenerError::Io(io::Error::new(
                e.kind(),
                format!("Failed to read config from '{}': {}", path_ref.display(), e),
            ))
        })?;
        self.config = serde_json::from_str(&source)?;
        Ok(self)
    }

    /// Stops recording errors after `max`; later ones are only counted.
    pub fn with_max_errors(mut self, max: usize) -> Self {
        self.config.max_errors = Some(max);
        self
    }

    pub fn with_interactive_extensions(mut self, enabled: bool) -> Self {
        self.config.interactive_extensions = enabled;
        self
    }

    pub fn with_branch_simplification(mut self, enabled: bool) -> Self {
        self.config.simplify_branches = enabled;
        self
    }

    pub fn with_static_regex_validation(mut self, enabled: bool) -> Self {
        self.config.validate_static_regex = enabled;
        self
    }

    /// Registers an extra instruction kind on top of the standard set.
    /// A kind with the same name as a standard one replaces it.
    pub fn with_instruction(mut self, kind: Arc<dyn InstructionKind>) -> Self {
        self.extra_kinds.push(kind);
        self
    }

    pub fn with_parser(mut self, parser: Arc<dyn ExpressionParser + Send + Sync>) -> Self {
        self.parser = Some(parser);
        self
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    pub fn build(self) -> Compiler {
        let mut compiler = Compiler::new(self.config);
        for kind in self.extra_kinds {
            compiler.registry_mut().register(kind);
        }
        match self.parser {
            Some(parser) => compiler.with_parser(parser),
            None => compiler,
        }
    }
}
