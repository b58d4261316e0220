use crate::tree::NodeRef;
use log::warn;
use scrivener_xpath::XPathError;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum XsltError {
    #[error("XML parse error: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error("{0}")]
    Static(StaticErrors),

    #[error("Compile error: {0}")]
    Compile(String),

    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),
}

impl XsltError {
    pub fn compile(msg: impl Into<String>) -> Self {
        Self::Compile(msg.into())
    }
}

#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("No template named '{0}'")]
    UnknownTemplate(String),

    #[error("Required parameter ${param} of template '{template}' was not supplied")]
    MissingParameter { template: String, param: String },

    #[error("Dynamic error [{code}]: {message}")]
    Dynamic { code: String, message: String },

    #[error("Template call depth exceeded {0}")]
    DepthExceeded(usize),

    #[error(transparent)]
    XPath(#[from] XPathError),
}

impl ExecutionError {
    pub fn dynamic(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Dynamic {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn code(&self) -> &str {
        match self {
            ExecutionError::UnknownTemplate(_) => "XTDE0640",
            ExecutionError::MissingParameter { .. } => "XTDE0700",
            ExecutionError::Dynamic { code, .. } => code,
            ExecutionError::DepthExceeded(_) => "SXLM0001",
            ExecutionError::XPath(e) => e.code(),
        }
    }
}

/// Which compile phase detected a static error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    Structural,
    Type,
    Syntax,
    PropagatedCompile,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StaticError {
    pub kind: ErrorKind,
    pub code: String,
    pub message: String,
    pub node: NodeRef,
}

impl fmt::Display for StaticError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} in {}: {}", self.code, self.node, self.message)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StaticErrors(pub Vec<StaticError>);

impl fmt::Display for StaticErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} static error(s) in stylesheet", self.0.len())?;
        if let Some(first) = self.0.first() {
            write!(f, "; first: {}", first)?;
        }
        Ok(())
    }
}

/// Append-only store of static errors for one compilation.
#[derive(Debug, Default)]
pub struct ErrorSink {
    errors: Vec<StaticError>,
    max_errors: Option<usize>,
    suppressed: usize,
}

impl ErrorSink {
    pub fn new(max_errors: Option<usize>) -> Self {
        Self {
            errors: Vec::new(),
            max_errors,
            suppressed: 0,
        }
    }

    pub fn record(&mut self, error: StaticError) {
        if self.max_errors.is_some_and(|max| self.errors.len() >= max) {
            self.suppressed += 1;
            return;
        }
        warn!("{}", error);
        self.errors.push(error);
    }

    pub fn report(
        &mut self,
        kind: ErrorKind,
        code: impl Into<String>,
        message: impl Into<String>,
        node: &NodeRef,
    ) {
        self.record(StaticError {
            kind,
            code: code.into(),
            message: message.into(),
            node: node.clone(),
        });
    }

    pub fn structural(&mut self, code: &str, message: impl Into<String>, node: &NodeRef) {
        self.report(ErrorKind::Structural, code, message, node);
    }

    /// Records an expression-level failure under its own code.
    pub fn xpath(&mut self, kind: ErrorKind, error: &XPathError, node: &NodeRef) {
        self.report(kind, error.code(), error.to_string(), node);
    }

    pub fn errors(&self) -> &[StaticError] {
        &self.errors
    }

    pub fn len(&self) -> usize {
        self.errors.len() + self.suppressed
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn suppressed(&self) -> usize {
        self.suppressed
    }

    pub fn into_parts(self) -> (Vec<StaticError>, usize) {
        (self.errors, self.suppressed)
    }
}

/// Why a kind's compile produced no node.
#[derive(Debug, Clone, PartialEq)]
pub enum CompileFailure {
    /// A new failure, recorded by the driver at the failing node.
    Error { code: String, message: String },
    /// Already explained by an earlier recorded error.
    Reported,
}

impl CompileFailure {
    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Error {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl From<XPathError> for CompileFailure {
    fn from(err: XPathError) -> Self {
        Self::error(err.code(), err.to_string())
    }
}
