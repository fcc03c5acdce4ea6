//! Error types for Trellis Core.

use thiserror::Error;

/// Result type alias for Trellis operations.
pub type Result<T> = std::result::Result<T, TrellisError>;

/// Main error type for the Trellis engine.
#[derive(Debug, Error)]
pub enum TrellisError {
    /// No suggestion/theme combination produced a template.
    #[error("No template found for '{template}' (suggestions: {suggestions:?})")]
    TemplateNotFound {
        template: String,
        suggestions: Vec<String>,
    },

    /// A theme-supplied hook failed.
    #[error("Hook error: {0}")]
    Hook(String),

    /// Template compilation or evaluation failed.
    #[error("Render error: {0}")]
    Render(String),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML manifest could not be parsed.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl TrellisError {
    /// Shorthand for hook failures raised from closures.
    pub fn hook(message: impl Into<String>) -> Self {
        Self::Hook(message.into())
    }

    /// Whether this error means template resolution came up empty.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::TemplateNotFound { .. })
    }
}

impl From<handlebars::RenderError> for TrellisError {
    fn from(err: handlebars::RenderError) -> Self {
        Self::Render(err.to_string())
    }
}
