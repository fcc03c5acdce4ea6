//! Theme tree composition.
//!
//! Turns a theme's parent chain into a finite, root-first list of
//! [`ThemeInstance`]s with inherited options and locals.

use super::{Theme, ThemeOptions};
use crate::observer::{Diagnostic, DiagnosticSink};
use serde_json::{Map, Value};
use std::ops::Deref;
use std::sync::Arc;
use tracing::debug;

/// One theme as placed in a tree.
///
/// Dereferences to the shared [`Theme`] declaration; the effective options and
/// locals computed for this tree live here.
#[derive(Debug)]
pub struct ThemeInstance {
    declaration: Arc<Theme>,
    parent: Option<usize>,
    options: ThemeOptions,
    locals: Map<String, Value>,
}

impl ThemeInstance {
    /// The shared declaration this instance was built from.
    pub fn declaration(&self) -> &Arc<Theme> {
        &self.declaration
    }

    /// Whether this instance was built from `theme`.
    pub fn is_instance_of(&self, theme: &Arc<Theme>) -> bool {
        Arc::ptr_eq(&self.declaration, theme)
    }

    /// Position of the parent instance in the tree, `None` for the root.
    pub fn parent_index(&self) -> Option<usize> {
        self.parent
    }

    /// Effective options: the parent's, overridden by this theme's.
    pub fn options(&self) -> &ThemeOptions {
        &self.options
    }

    /// Effective locals: the parent's, overridden by this theme's.
    pub fn locals(&self) -> &Map<String, Value> {
        &self.locals
    }
}

impl Deref for ThemeInstance {
    type Target = Theme;

    fn deref(&self) -> &Theme {
        &self.declaration
    }
}

/// The ordered theme hierarchy an engine renders with.
#[derive(Debug, Default)]
pub struct ThemeTree {
    themes: Vec<Arc<ThemeInstance>>,
    public_paths: Vec<String>,
}

impl ThemeTree {
    /// Build the tree for `theme`, optionally rooted in `default_theme`.
    ///
    /// Circular ancestry is cut at the first repeated theme and reported to
    /// `sink`; the result is always finite.
    pub fn build(
        theme: &Arc<Theme>,
        default_theme: Option<&Arc<Theme>>,
        sink: &dyn DiagnosticSink,
    ) -> Self {
        let mut chain = vec![Arc::clone(theme)];
        let mut current = Arc::clone(theme);

        while let Some(parent) = current.parent() {
            if chain.iter().any(|placed| Arc::ptr_eq(placed, &parent)) {
                sink.report(Diagnostic::CircularParent {
                    theme: current.name().to_string(),
                    ancestor: parent.name().to_string(),
                });
                break;
            }
            chain.insert(0, Arc::clone(&parent));
            current = parent;
        }

        if let Some(default_theme) = default_theme {
            if !chain.iter().any(|placed| Arc::ptr_eq(placed, default_theme)) {
                chain.insert(0, Arc::clone(default_theme));
            }
        }

        let mut themes: Vec<Arc<ThemeInstance>> = Vec::with_capacity(chain.len());
        let mut public_paths = Vec::new();

        for (index, declaration) in chain.into_iter().enumerate() {
            let parent = index.checked_sub(1);
            let (options, locals) = match parent.map(|i| &themes[i]) {
                Some(parent) => {
                    let mut locals = parent.locals.clone();
                    locals.extend(declaration.declared_locals().clone());
                    (declaration.declared_options().merged_over(&parent.options), locals)
                }
                None => (
                    declaration.declared_options().clone(),
                    declaration.declared_locals().clone(),
                ),
            };

            if let Some(public_path) = declaration.public_path() {
                let mut public_path = public_path.to_string();
                if !public_path.ends_with('/') {
                    public_path.push('/');
                }
                public_paths.insert(0, public_path);
            }

            debug!("Placed theme '{}' at depth {}", declaration.name(), index);
            themes.push(Arc::new(ThemeInstance {
                declaration,
                parent,
                options,
                locals,
            }));
        }

        Self {
            themes,
            public_paths,
        }
    }

    /// Instances, root first.
    pub fn themes(&self) -> &[Arc<ThemeInstance>] {
        &self.themes
    }

    /// Instances, most specific first.
    pub fn leaf_first(&self) -> impl Iterator<Item = &Arc<ThemeInstance>> {
        self.themes.iter().rev()
    }

    pub fn root(&self) -> Option<&Arc<ThemeInstance>> {
        self.themes.first()
    }

    pub fn leaf(&self) -> Option<&Arc<ThemeInstance>> {
        self.themes.last()
    }

    pub fn len(&self) -> usize {
        self.themes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.themes.is_empty()
    }

    /// The tree member built from `theme`.
    pub fn instance_of(&self, theme: &Arc<Theme>) -> Option<Arc<ThemeInstance>> {
        self.themes
            .iter()
            .find(|instance| instance.is_instance_of(theme))
            .cloned()
    }

    /// Public asset paths, most specific theme first.
    pub fn public_paths(&self) -> &[String] {
        &self.public_paths
    }
}
