use serde::{Deserialize, Serialize};

/// Knobs for one compilation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CompilerConfig {
    /// Stop recording after this many errors; later ones are only counted.
    pub max_errors: Option<usize>,
    /// Register the `ixsl:` interactive extension instructions.
    pub interactive_extensions: bool,
    /// Simplify analyze-string branches after compiling them.
    pub simplify_branches: bool,
    /// Check fixed regex and flags values at compile time.
    pub validate_static_regex: bool,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            max_errors: None,
            interactive_extensions: true,
            simplify_branches: true,
            validate_static_regex: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let config: CompilerConfig =
            serde_json::from_str(r#"{ "max-errors": 5, "interactive-extensions": false }"#)
                .unwrap();
        assert_eq!(config.max_errors, Some(5));
        assert!(!config.interactive_extensions);
        assert!(config.simplify_branches);
        assert!(config.validate_static_regex);
    }
}
