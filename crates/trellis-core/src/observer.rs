//! Diagnostics for problems the engine recovers from.

use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::warn;

/// Non-fatal events the engine reports instead of failing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// A theme's ancestry loops back onto a theme already in the tree.
    CircularParent { theme: String, ancestor: String },

    /// An element branch failed to render and was replaced by empty content.
    RenderFailed { template: Option<String>, error: String },

    /// A template wrapper failed; the unwrapped content was kept.
    WrapperFailed { wrapper: String, error: String },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::CircularParent { theme, ancestor } => write!(
                f,
                "theme '{}' has a circular parent relationship through '{}'; ancestry truncated",
                theme, ancestor
            ),
            Diagnostic::RenderFailed { template, error } => match template {
                Some(template) => write!(f, "failed to render '{}': {}", template, error),
                None => write!(f, "failed to render element children: {}", error),
            },
            Diagnostic::WrapperFailed { wrapper, error } => {
                write!(f, "template wrapper '{}' failed: {}", wrapper, error)
            }
        }
    }
}

/// Receiver for engine diagnostics.
pub trait DiagnosticSink: Send + Sync {
    /// Called for every diagnostic, in the order they occur.
    fn report(&self, diagnostic: Diagnostic);
}

pub type SinkPtr = Arc<dyn DiagnosticSink>;

/// Forwards diagnostics to `tracing` at warn level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn report(&self, diagnostic: Diagnostic) {
        warn!("{}", diagnostic);
    }
}

/// Keeps diagnostics in memory for the caller to inspect.
#[derive(Debug, Default)]
pub struct CollectingSink {
    collected: Mutex<Vec<Diagnostic>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything reported so far.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.collected
            .lock()
            .map(|collected| collected.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.diagnostics().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DiagnosticSink for CollectingSink {
    fn report(&self, diagnostic: Diagnostic) {
        if let Ok(mut collected) = self.collected.lock() {
            collected.push(diagnostic);
        }
    }
}
