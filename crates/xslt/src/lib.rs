//! # scrivener-xslt
//!
//! Stylesheet compiler. Turns a tree of instruction elements into an
//! executable instruction tree.
//!
//! ## Architecture
//!
//! Compilation runs in phases over the whole [`StyleTree`]:
//!
//! 1. **Binding** ([`binder`]): raw attribute text becomes typed expressions
//!    and attribute value templates, per the schema of each instruction kind.
//! 2. **Declaration**: named templates and their parameters are collected
//!    into the unit's name tables.
//! 3. **Validation** ([`validator`], [`typecheck`]): child cardinality rules
//!    and static type checks, bottom-up.
//! 4. **Compilation** ([`compiler`]): each kind turns its validated element
//!    and compiled children into a [`CompiledNode`].
//!
//! Instruction kinds live in [`kinds`] and are looked up through the
//! [`InstructionRegistry`]; the shared phases never name a particular kind.
//! Problems are recorded, not thrown, so one pass reports every error it
//! can find.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use scrivener_xslt::{Compiler, Executor, QueueScheduler};
//! use std::collections::HashMap;
//!
//! let result = Compiler::default().compile_str(source)?;
//! for error in &result.errors {
//!     eprintln!("{}", error);
//! }
//! let executable = result.into_result()?;
//!
//! let mut scheduler = QueueScheduler::new();
//! let text = Executor::new(&executable, &mut scheduler).call_template("main", HashMap::new(), None)?;
//! ```

pub mod binder;
pub mod compiler;
pub mod config;
pub mod context;
pub mod element;
pub mod error;
pub mod executor;
pub mod instruction;
pub mod kinds;
pub mod parser;
pub mod registry;
pub mod tree;
pub mod typecheck;
pub mod validator;

pub use binder::{AttributeKind, AttributeSpec, BoundAttributes, ExpressionParser, XPathParser};
pub use compiler::{CompilationResult, Compiler, compile_stylesheet};
pub use config::CompilerConfig;
pub use context::{CompilationUnit, StaticScope};
pub use error::{
    CompileFailure, ErrorKind, ErrorSink, ExecutionError, StaticError, StaticErrors, XsltError,
};
pub use executor::{Executor, QueueScheduler, ScheduledCall, Scheduler};
pub use instruction::{
    AnalyzeStringInstruction, CallTemplateInstruction, CompiledNode, Executable, Instruction,
    NamedTemplate, ParamValue, ScheduleInstruction, TemplateParam, WithParam,
};
pub use parser::parse_stylesheet;
pub use registry::{Category, InstructionKind, InstructionRegistry};
pub use tree::{ExpandedName, IXSL_NS, Location, NodeRef, StyleTree, XSL_NS};
pub use validator::{ChildPolicy, ChildSlot, Occurs, SlotPolicy};

#[cfg(test)]
mod tests;

#[cfg(any(test, feature = "testing"))]
pub mod test_helpers {
    use crate::compiler::{CompilationResult, Compiler};
    use crate::config::CompilerConfig;
    use crate::error::{ExecutionError, XsltError};
    use crate::executor::{Executor, QueueScheduler, ScheduledCall};
    use crate::tree::{IXSL_NS, XSL_NS};
    use scrivener_xpath::AtomicValue;
    use std::collections::HashMap;

    /// Wraps `body` in a stylesheet element declaring the `xsl` and `ixsl` prefixes.
    pub fn stylesheet(body: &str) -> String {
        format!(
            r#"<xsl:stylesheet version="3.0" xmlns:xsl="{}" xmlns:ixsl="{}">{}</xsl:stylesheet>"#,
            XSL_NS, IXSL_NS, body
        )
    }

    /// Wraps `body` in a template named `main`.
    pub fn main_template(body: &str) -> String {
        stylesheet(&format!(r#"<xsl:template name="main">{}</xsl:template>"#, body))
    }

    pub fn compile(source: &str) -> CompilationResult {
        compile_with(source, CompilerConfig::default())
    }

    pub fn compile_with(source: &str, config: CompilerConfig) -> CompilationResult {
        Compiler::new(config)
            .compile_str(source)
            .expect("stylesheet XML should parse")
    }

    /// Error codes in the order they were recorded.
    pub fn codes(result: &CompilationResult) -> Vec<&str> {
        result.errors.iter().map(|e| e.code.as_str()).collect()
    }

    /// Compiles `source`, runs template `main` and returns its output and
    /// any calls it scheduled.
    pub fn run_main(
        source: &str,
        context_item: Option<&str>,
    ) -> Result<(String, Vec<ScheduledCall>), XsltError> {
        let executable = Compiler::default().compile_str(source)?.into_result()?;
        let mut scheduler = QueueScheduler::new();
        let output = Executor::new(&executable, &mut scheduler).call_template(
            "main",
            HashMap::new(),
            context_item.map(|s| AtomicValue::String(s.to_string())),
        )?;
        Ok((output, scheduler.drain()))
    }

    pub fn run_error(source: &str) -> ExecutionError {
        match run_main(source, None) {
            Err(XsltError::Execution(err)) => err,
            other => panic!("expected an execution error, got {:?}", other.map(|r| r.0)),
        }
    }
}
