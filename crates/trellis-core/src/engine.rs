//! Theme Engine - The main orchestrator for themed rendering.
//!
//! This module owns the configuration, the theme tree and the injected
//! collaborators, and ties preprocessing, resolution and dispatch together.

use crate::cache::{cache_key, Cache, CacheEntry};
use crate::config::{EngineConfig, EngineOption};
use crate::fs::{FileSystem, LocalFileSystem};
use crate::hooks::{FileRenderer, TemplateFn};
use crate::observer::{SinkPtr, TracingSink};
use crate::resolver::ResolvedTemplate;
use crate::theme::{TemplateSource, Theme, ThemeInstance, ThemeTree};
use crate::{template, BlockContext, ElementType, RenderRequest, Result, Variables};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// The main engine for themed rendering.
///
/// Configuration changes take `&mut self`; rendering takes `&self` and works
/// on a snapshot of the theme tree.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use serde_json::json;
/// use trellis_core::{EngineConfig, Theme, ThemeEngine};
///
/// # async fn run() -> trellis_core::Result<()> {
/// let parent = Arc::new(Theme::new("base").with_template_path("base/"));
/// let theme = Arc::new(Theme::new("blog").with_template_path("blog/").with_parent(&parent));
///
/// let engine = ThemeEngine::new(EngineConfig::default().with_plain(false)).with_theme(theme);
/// let html = engine.render("front_page", &json!({ "title": "Hello" })).await?;
/// # Ok(())
/// # }
/// ```
pub struct ThemeEngine {
    /// Global configuration.
    pub(crate) config: EngineConfig,

    /// Where template files are read from.
    pub(crate) fs: Arc<dyn FileSystem>,

    /// Lookup cache, shared by all renders.
    pub(crate) cache: Arc<dyn Cache>,

    /// Receiver for non-fatal problems.
    pub(crate) sink: SinkPtr,

    /// The active (leaf) theme declaration.
    theme: Option<Arc<Theme>>,

    /// Theme placed at the root of every tree.
    default_theme: Option<Arc<Theme>>,

    /// Current tree; replaced wholesale on every rebuild.
    tree: Arc<ThemeTree>,
}

impl ThemeEngine {
    /// Create a new engine reading from the local disk.
    pub fn new(config: EngineConfig) -> Self {
        let cache = config.cache.build();
        Self {
            config,
            fs: Arc::new(LocalFileSystem),
            cache,
            sink: Arc::new(TracingSink),
            theme: None,
            default_theme: None,
            tree: Arc::new(ThemeTree::default()),
        }
    }

    /// Create an engine configured from environment variables.
    pub fn from_env() -> Self {
        Self::new(EngineConfig::from_env())
    }

    /// Use another file system.
    pub fn with_file_system(mut self, fs: Arc<dyn FileSystem>) -> Self {
        self.fs = fs;
        self
    }

    /// Send diagnostics somewhere else than the log.
    pub fn with_sink(mut self, sink: SinkPtr) -> Self {
        self.sink = sink;
        self
    }

    /// Use a custom cache implementation.
    pub fn with_cache_backend(mut self, cache: Arc<dyn Cache>) -> Self {
        self.cache = cache;
        self
    }

    /// Set the active theme.
    pub fn with_theme(mut self, theme: Arc<Theme>) -> Self {
        self.set_theme(theme);
        self
    }

    /// Set the default theme.
    pub fn with_default_theme(mut self, theme: Arc<Theme>) -> Self {
        self.set_default_theme(Some(theme));
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Change one option.
    pub fn set_option(&mut self, option: EngineOption) -> &mut Self {
        debug!("Setting option '{}'", option.key());
        match option {
            EngineOption::Path(path) => self.config.path = path,
            EngineOption::DefaultToPlain(plain) => self.config.default_to_plain = plain,
            EngineOption::Locals(locals) => self.config.locals = locals,
            EngineOption::Cache(setting) => {
                self.cache = setting.build();
                self.config.cache = setting;
            }
            EngineOption::Theme(theme) => self.set_theme(theme),
            EngineOption::DefaultTheme(theme) => self.set_default_theme(theme),
            EngineOption::ElementTypes(types) => self.config.element_types = types,
        }
        self
    }

    /// Change several options. A new theme is applied after everything else,
    /// so it is built against the new configuration.
    pub fn set_options(&mut self, options: impl IntoIterator<Item = EngineOption>) -> &mut Self {
        let mut theme = None;
        for option in options {
            match option {
                EngineOption::Theme(t) => theme = Some(t),
                other => {
                    self.set_option(other);
                }
            }
        }
        if let Some(theme) = theme {
            self.set_theme(theme);
        }
        self
    }

    /// Activate `theme` and build its tree.
    ///
    /// Every theme in the new tree that has an initialize hook gets it called
    /// with this engine.
    #[instrument(skip(self, theme), fields(theme = %theme.name()))]
    pub fn set_theme(&mut self, theme: Arc<Theme>) {
        let tree = Arc::new(ThemeTree::build(
            &theme,
            self.default_theme.as_ref(),
            self.sink.as_ref(),
        ));
        info!("Theme tree built with {} themes", tree.len());

        self.theme = Some(theme);
        self.tree = Arc::clone(&tree);

        for instance in tree.themes() {
            if let Some(initialize) = instance.initialize_hook() {
                debug!("Initializing theme '{}'", instance.name());
                initialize(self);
            }
        }
    }

    /// Set or clear the default theme; rebuilds the tree if a theme is active.
    pub fn set_default_theme(&mut self, theme: Option<Arc<Theme>>) {
        self.default_theme = theme;
        self.rebuild_theme();
    }

    /// Rebuild the tree for the active theme. Does nothing without one.
    pub fn rebuild_theme(&mut self) {
        if let Some(theme) = self.theme.clone() {
            self.set_theme(theme);
        }
    }

    /// The active theme declaration.
    pub fn theme(&self) -> Option<&Arc<Theme>> {
        self.theme.as_ref()
    }

    pub fn default_theme(&self) -> Option<&Arc<Theme>> {
        self.default_theme.as_ref()
    }

    /// Snapshot of the current theme tree.
    pub fn tree(&self) -> Arc<ThemeTree> {
        Arc::clone(&self.tree)
    }

    /// The tree member built from `theme`.
    pub fn theme_instance(&self, theme: &Arc<Theme>) -> Option<Arc<ThemeInstance>> {
        self.tree.instance_of(theme)
    }

    /// Public asset paths, most specific theme first.
    pub fn public_paths(&self) -> Vec<String> {
        self.tree.public_paths().to_vec()
    }

    /// Read a cache entry by composite key.
    pub fn get_cache<S: AsRef<str>>(&self, key: &[S]) -> Option<CacheEntry> {
        self.cache.get(&cache_key(key))
    }

    /// Store a cache entry by composite key. A disabled cache drops it.
    pub fn set_cache<S: AsRef<str>>(&self, key: &[S], value: CacheEntry) {
        self.cache.set(&cache_key(key), value);
    }

    /// Register a global element type.
    pub fn register_element_type(
        &mut self,
        name: impl Into<String>,
        element_type: ElementType,
    ) -> &mut Self {
        self.config.element_types.insert(name.into(), element_type);
        self
    }

    /// A registered global element type.
    pub fn element_type(&self, name: &str) -> Option<&ElementType> {
        self.config.element_types.get(name)
    }

    /// Render `template` with `variables`.
    #[instrument(skip(self, variables), fields(template = %template))]
    pub async fn render(&self, template: &str, variables: &Value) -> Result<String> {
        info!("Rendering template: {}", template);
        self.render_in(template, variables, None).await
    }

    /// Render `template` inside an existing block scope.
    #[instrument(skip(self, variables, context), fields(template = %template))]
    pub async fn render_with_context(
        &self,
        template: &str,
        variables: &Value,
        context: BlockContext,
    ) -> Result<String> {
        debug!("Rendering template with context: {}", template);
        self.render_in(template, variables, Some(context)).await
    }

    async fn render_in(
        &self,
        template: &str,
        variables: &Value,
        context: Option<BlockContext>,
    ) -> Result<String> {
        let request = self.preprocess(template, variables, context).await?;
        let resolved = self.find_template(&request.template, &request.variables).await?;
        self.render_template(request, resolved).await
    }

    /// Render a resolved template.
    ///
    /// Locals fill in whatever the variables leave undefined, theme locals
    /// before engine locals.
    pub async fn render_template(
        &self,
        request: RenderRequest,
        resolved: ResolvedTemplate,
    ) -> Result<String> {
        let RenderRequest {
            mut variables,
            context,
            ..
        } = request;
        variables.fill_defaults(resolved.theme.locals());
        variables.fill_defaults(&self.config.locals);
        variables.bind(context);

        match resolved.to_render {
            TemplateSource::Inline(render) => render.render(variables).await,
            TemplateSource::File(path) => match resolved.theme.options().renderer.clone() {
                Some(renderer) => renderer.render(path, variables).await,
                None => self.default_render(&path, &variables).await,
            },
        }
    }

    /// Read a template file and either return it verbatim or evaluate it.
    pub async fn default_render(&self, path: &Path, variables: &Variables) -> Result<String> {
        let source = self.fs.read(&self.config.path.join(path)).await?;
        if self.config.default_to_plain {
            return Ok(source);
        }
        template::compile(&source)?.render(variables)
    }
}

impl Default for ThemeEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}
