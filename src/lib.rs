//! # scrivener
//!
//! Compiles stylesheets into executable instruction trees, reporting every
//! static error found in one pass, and runs named templates together with
//! the calls they schedule.
//!
//! ```rust,ignore
//! use scrivener::{CompilerBuilder, Report, run_template};
//!
//! let compiler = CompilerBuilder::new().with_max_errors(20).build();
//! let result = scrivener::check_file(&compiler, "ticker.xsl")?;
//! print!("{}", Report::new("ticker.xsl", &result).to_text());
//!
//! let outputs = run_template(result.into_result()?, "main", None).await?;
//! ```

pub mod builder;
pub mod diagnostics;
pub mod error;
pub mod runner;

pub use builder::CompilerBuilder;
pub use diagnostics::Report;
pub use error::ScrivenerError;
pub use runner::{RunOutput, Runner, run_template};

pub use scrivener_xpath as xpath;
pub use scrivener_xslt as xslt;
pub use scrivener_xslt::{
    CompilationResult, CompiledNode, Compiler, CompilerConfig, ErrorKind, Executable, Executor,
    InstructionKind, InstructionRegistry, QueueScheduler, ScheduledCall, StaticError, XsltError,
};

use std::fs;
use std::io;
use std::path::Path;

/// Reads and compiles the stylesheet at `path`. Static errors are in the
/// returned result; only unreadable files and malformed XML are `Err`.
pub fn check_file<P: AsRef<Path>>(compiler: &Compiler, path: P) -> Result<CompilationResult, ScrivenerError> {
    let path_ref = path.as_ref();
    let source = fs::read_to_string(path_ref).map_err(|e| {
        ScrivenerError::Io(io::Error::new(
            e.kind(),
            format!("Failed to read stylesheet from '{}': {}", path_ref.display(), e),
        ))
    })?;
    Ok(compiler.compile_str(&source)?)
}
