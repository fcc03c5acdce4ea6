//! Theme declarations.
//!
//! A [`Theme`] is declared once and shared as `Arc<Theme>`. Its parent link is
//! a weak reference that can be set after construction, so a theme can be
//! re-parented (or accidentally made circular) without leaking. Everything the
//! engine computes for a theme lives on the tree's
//! [`ThemeInstance`](super::ThemeInstance), never on the declaration.

use crate::hooks::{
    FileRenderer, InitializeHook, RequestProcessor, TemplateFn, VariablesProcessor,
};
use crate::{ElementType, RenderRequest, Result, ThemeEngine, Variables};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock, Weak};

/// Extension used for template files when no theme configures one.
pub const DEFAULT_TEMPLATE_EXTENSION: &str = "html";

/// Where a template comes from.
#[derive(Clone)]
pub enum TemplateSource {
    /// Rendered by calling a function.
    Inline(Arc<dyn TemplateFn>),
    /// Rendered from a file, relative to the engine's base path.
    File(PathBuf),
}

impl TemplateSource {
    /// Wrap an async closure as an inline template.
    pub fn inline<F, Fut>(f: F) -> Self
    where
        F: Fn(Variables) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String>> + Send + 'static,
    {
        TemplateSource::Inline(Arc::new(f))
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        TemplateSource::File(path.into())
    }

    /// The file path, if this is a file template.
    pub fn as_path(&self) -> Option<&Path> {
        match self {
            TemplateSource::File(path) => Some(path),
            TemplateSource::Inline(_) => None,
        }
    }

    pub fn is_inline(&self) -> bool {
        matches!(self, TemplateSource::Inline(_))
    }
}

impl fmt::Debug for TemplateSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateSource::Inline(_) => f.write_str("Inline(<fn>)"),
            TemplateSource::File(path) => f.debug_tuple("File").field(path).finish(),
        }
    }
}

/// Inherited theme configuration.
///
/// Each field left unset falls through to the parent theme's effective value.
#[derive(Clone, Default)]
pub struct ThemeOptions {
    /// File extension for template lookups, without the dot.
    pub template_extension: Option<String>,

    /// Renderer for template files, replacing the default renderer.
    pub renderer: Option<Arc<dyn FileRenderer>>,

    /// Element-type overrides applied on top of the engine's registry.
    pub element_types: Option<HashMap<String, ElementType>>,

    /// Free-form options, merged key by key.
    pub extra: Map<String, Value>,
}

impl ThemeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_template_extension(mut self, extension: impl Into<String>) -> Self {
        self.template_extension = Some(extension.into());
        self
    }

    pub fn with_renderer<F, Fut>(mut self, renderer: F) -> Self
    where
        F: Fn(PathBuf, Variables) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String>> + Send + 'static,
    {
        self.renderer = Some(Arc::new(renderer));
        self
    }

    pub fn with_element_type(mut self, name: impl Into<String>, element_type: ElementType) -> Self {
        self.element_types
            .get_or_insert_with(HashMap::new)
            .insert(name.into(), element_type);
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Effective template extension.
    pub fn extension(&self) -> &str {
        self.template_extension
            .as_deref()
            .unwrap_or(DEFAULT_TEMPLATE_EXTENSION)
    }

    /// Overlay these options on top of `parent`.
    pub fn merged_over(&self, parent: &ThemeOptions) -> ThemeOptions {
        let mut extra = parent.extra.clone();
        extra.extend(self.extra.clone());

        ThemeOptions {
            template_extension: self
                .template_extension
                .clone()
                .or_else(|| parent.template_extension.clone()),
            renderer: self.renderer.clone().or_else(|| parent.renderer.clone()),
            element_types: self
                .element_types
                .clone()
                .or_else(|| parent.element_types.clone()),
            extra,
        }
    }
}

impl fmt::Debug for ThemeOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThemeOptions")
            .field("template_extension", &self.template_extension)
            .field("renderer", &self.renderer.as_ref().map(|_| "<fn>"))
            .field(
                "element_types",
                &self.element_types.as_ref().map(|types| types.keys().collect::<Vec<_>>()),
            )
            .field("extra", &self.extra)
            .finish()
    }
}

/// A theme declaration.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use trellis_core::Theme;
///
/// let parent = Arc::new(Theme::new("base").with_template_path("base/"));
/// let child = Arc::new(Theme::new("child").with_template_path("child/").with_parent(&parent));
/// assert!(Arc::ptr_eq(&child.parent().unwrap(), &parent));
/// ```
#[derive(Default)]
pub struct Theme {
    name: String,
    parent: RwLock<Option<Weak<Theme>>>,
    template_path: Option<PathBuf>,
    public_path: Option<String>,
    templates: HashMap<String, TemplateSource>,
    preprocessor: Option<Arc<dyn RequestProcessor>>,
    processor: Option<Arc<dyn RequestProcessor>>,
    preprocessors: HashMap<String, Arc<dyn VariablesProcessor>>,
    processors: HashMap<String, Arc<dyn VariablesProcessor>>,
    options: ThemeOptions,
    locals: Map<String, Value>,
    initialize: Option<InitializeHook>,
}

impl Theme {
    /// Create an empty theme.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Set the parent theme. Only a weak link is kept.
    pub fn with_parent(self, parent: &Arc<Theme>) -> Self {
        self.set_parent(Some(parent));
        self
    }

    /// Replace the parent link on a shared declaration.
    pub fn set_parent(&self, parent: Option<&Arc<Theme>>) {
        let mut link = self.parent.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        *link = parent.map(Arc::downgrade);
    }

    /// The parent theme, if set and still alive.
    pub fn parent(&self) -> Option<Arc<Theme>> {
        self.parent
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .as_ref()
            .and_then(Weak::upgrade)
    }

    pub fn with_template_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.template_path = Some(path.into());
        self
    }

    pub fn template_path(&self) -> Option<&Path> {
        self.template_path.as_deref()
    }

    pub fn with_public_path(mut self, path: impl Into<String>) -> Self {
        self.public_path = Some(path.into());
        self
    }

    pub fn public_path(&self) -> Option<&str> {
        self.public_path.as_deref()
    }

    /// Declare a template by name.
    pub fn with_template(mut self, name: impl Into<String>, source: TemplateSource) -> Self {
        self.templates.insert(name.into(), source);
        self
    }

    /// Declare an inline template.
    pub fn with_inline_template<F, Fut>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Variables) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String>> + Send + 'static,
    {
        self.with_template(name, TemplateSource::inline(f))
    }

    /// Point a template name at a specific file.
    pub fn with_template_file(self, name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.with_template(name, TemplateSource::file(path))
    }

    pub fn template(&self, name: &str) -> Option<&TemplateSource> {
        self.templates.get(name)
    }

    pub fn templates(&self) -> &HashMap<String, TemplateSource> {
        &self.templates
    }

    /// Global hook run in the first phase of preprocessing.
    pub fn with_preprocessor<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(RenderRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<RenderRequest>> + Send + 'static,
    {
        self.preprocessor = Some(Arc::new(f));
        self
    }

    /// Global hook run in the third phase of preprocessing.
    pub fn with_processor<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(RenderRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<RenderRequest>> + Send + 'static,
    {
        self.processor = Some(Arc::new(f));
        self
    }

    /// Hook run in the second phase, only for `template`.
    pub fn with_template_preprocessor<F, Fut>(mut self, template: impl Into<String>, f: F) -> Self
    where
        F: Fn(Variables) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Variables>> + Send + 'static,
    {
        self.preprocessors.insert(template.into(), Arc::new(f));
        self
    }

    /// Hook run in the fourth phase, only for `template`.
    pub fn with_template_processor<F, Fut>(mut self, template: impl Into<String>, f: F) -> Self
    where
        F: Fn(Variables) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Variables>> + Send + 'static,
    {
        self.processors.insert(template.into(), Arc::new(f));
        self
    }

    pub fn preprocessor(&self) -> Option<&Arc<dyn RequestProcessor>> {
        self.preprocessor.as_ref()
    }

    pub fn processor(&self) -> Option<&Arc<dyn RequestProcessor>> {
        self.processor.as_ref()
    }

    pub fn template_preprocessor(&self, template: &str) -> Option<&Arc<dyn VariablesProcessor>> {
        self.preprocessors.get(template)
    }

    pub fn template_processor(&self, template: &str) -> Option<&Arc<dyn VariablesProcessor>> {
        self.processors.get(template)
    }

    pub fn with_options(mut self, options: ThemeOptions) -> Self {
        self.options = options;
        self
    }

    /// Options as declared on this theme, before inheritance.
    pub fn declared_options(&self) -> &ThemeOptions {
        &self.options
    }

    pub fn with_locals(mut self, locals: Map<String, Value>) -> Self {
        self.locals = locals;
        self
    }

    pub fn with_local(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.locals.insert(key.into(), value.into());
        self
    }

    /// Locals as declared on this theme, before inheritance.
    pub fn declared_locals(&self) -> &Map<String, Value> {
        &self.locals
    }

    /// Hook invoked with the engine each time a theme tree containing this
    /// theme is built.
    pub fn on_initialize<F>(mut self, f: F) -> Self
    where
        F: Fn(&ThemeEngine) + Send + Sync + 'static,
    {
        self.initialize = Some(Arc::new(f));
        self
    }

    pub fn initialize_hook(&self) -> Option<&InitializeHook> {
        self.initialize.as_ref()
    }
}

impl fmt::Debug for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Theme")
            .field("name", &self.name)
            .field("parent", &self.parent().map(|p| p.name.clone()))
            .field("template_path", &self.template_path)
            .field("public_path", &self.public_path)
            .field("templates", &self.templates)
            .field("options", &self.options)
            .field("locals", &self.locals)
            .finish_non_exhaustive()
    }
}
