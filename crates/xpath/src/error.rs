use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum XPathError {
    #[error("Parse error in '{expression}': {message}")]
    ParseError { expression: String, message: String },

    #[error("Unbalanced curly brackets in template '{template}': {message}")]
    TemplateError {
        code: &'static str,
        template: String,
        message: String,
    },

    #[error("Variable '${name}' has not been declared")]
    UnknownVariable { name: String },

    #[error("Unknown function '{name}' with {arity} argument(s)")]
    UnknownFunction { name: String, arity: usize },

    #[error("Type error: {0}")]
    TypeError(String),

    #[error("Dynamic error [{code}]: {message}")]
    Dynamic { code: String, message: String },

    #[error("Context item is required but not set")]
    NoContextItem,

    #[error("Division by zero")]
    DivisionByZero,
}

impl XPathError {
    pub fn parse(expression: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ParseError {
            expression: expression.into(),
            message: message.into(),
        }
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::TypeError(message.into())
    }

    pub fn dynamic(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Dynamic {
            code: code.into(),
            message: message.into(),
        }
    }

    /// The W3C error code this error is reported under.
    pub fn code(&self) -> &str {
        match self {
            XPathError::ParseError { .. } => "XPST0003",
            XPathError::TemplateError { code, .. } => code,
            XPathError::UnknownVariable { .. } => "XPST0008",
            XPathError::UnknownFunction { .. } => "XPST0017",
            XPathError::TypeError(_) => "XPTY0004",
            XPathError::Dynamic { code, .. } => code,
            XPathError::NoContextItem => "XPDY0002",
            XPathError::DivisionByZero => "FOAR0001",
        }
    }

    /// True for errors detected without evaluating anything.
    pub fn is_static(&self) -> bool {
        matches!(
            self,
            XPathError::ParseError { .. }
                | XPathError::TemplateError { .. }
                | XPathError::UnknownVariable { .. }
                | XPathError::UnknownFunction { .. }
        )
    }
}
