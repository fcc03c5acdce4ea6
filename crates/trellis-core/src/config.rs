//! # Trellis Configuration
//!
//! Engine configuration: programmatic defaults, builder methods, environment
//! variables, and the option setter surface used by
//! [`ThemeEngine::set_option`](crate::ThemeEngine::set_option).

use crate::cache::{Cache, CacheConfig, LruCache, NoCache};
use crate::{ElementType, Theme};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// How lookups are cached.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum CacheSetting {
    /// Nothing is cached.
    #[default]
    Disabled,
    /// LRU cache with the default maximum weight.
    Enabled,
    /// LRU cache with the given maximum weight.
    MaxWeight(usize),
    /// LRU cache with a full configuration.
    Config(CacheConfig),
}

impl CacheSetting {
    /// Parse `true`/`false`/`1`/`0` or a maximum weight.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "true" | "1" | "on" => Some(CacheSetting::Enabled),
            "false" | "0" | "off" => Some(CacheSetting::Disabled),
            other => other.parse().ok().map(CacheSetting::MaxWeight),
        }
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self, CacheSetting::Disabled)
    }

    /// Create the cache this setting describes.
    pub fn build(&self) -> Arc<dyn Cache> {
        match self {
            CacheSetting::Disabled => Arc::new(NoCache),
            CacheSetting::Enabled => Arc::new(LruCache::default()),
            CacheSetting::MaxWeight(max) => {
                Arc::new(LruCache::new(CacheConfig::default().with_max_weight(*max)))
            }
            CacheSetting::Config(config) => Arc::new(LruCache::new(*config)),
        }
    }
}

impl From<bool> for CacheSetting {
    fn from(enabled: bool) -> Self {
        if enabled {
            CacheSetting::Enabled
        } else {
            CacheSetting::Disabled
        }
    }
}

impl From<usize> for CacheSetting {
    fn from(max_weight: usize) -> Self {
        CacheSetting::MaxWeight(max_weight)
    }
}

/// Global configuration for a [`ThemeEngine`](crate::ThemeEngine).
///
/// # Example
/// ```rust
/// use trellis_core::EngineConfig;
///
/// let config = EngineConfig::default()
///     .with_path("site/")
///     .with_plain(false)
///     .with_cache(true);
/// assert!(config.cache.is_enabled());
/// ```
#[derive(Clone)]
pub struct EngineConfig {
    /// Root that relative template paths are resolved against.
    /// Default: "./", Env: TRELLIS_PATH
    pub path: PathBuf,

    /// Return template files verbatim instead of compiling them.
    /// Default: true, Env: TRELLIS_PLAIN=false
    pub default_to_plain: bool,

    /// Data merged into every render.
    pub locals: Map<String, Value>,

    /// Lookup caching.
    /// Default: disabled, Env: TRELLIS_CACHE=true|false|<max weight>
    pub cache: CacheSetting,

    /// Globally registered element types.
    pub element_types: HashMap<String, ElementType>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./"),
            default_to_plain: true,
            locals: Map::new(),
            cache: CacheSetting::Disabled,
            element_types: HashMap::new(),
        }
    }
}

impl fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineConfig")
            .field("path", &self.path)
            .field("default_to_plain", &self.default_to_plain)
            .field("locals", &self.locals)
            .field("cache", &self.cache)
            .field("element_types", &self.element_types.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl EngineConfig {
    /// Create a config from environment variables.
    /// Falls back to defaults for missing or unparsable variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(v) = env::var("TRELLIS_PATH") {
            config.path = PathBuf::from(v);
        }
        if let Ok(v) = env::var("TRELLIS_PLAIN") {
            config.default_to_plain = v.to_lowercase() != "false" && v != "0";
        }
        if let Ok(v) = env::var("TRELLIS_CACHE") {
            if let Some(cache) = CacheSetting::parse(&v) {
                config.cache = cache;
            }
        }

        config
    }

    /// Builder: Set the template root.
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = path.into();
        self
    }

    /// Builder: Return files verbatim (`true`) or compile them (`false`).
    pub fn with_plain(mut self, plain: bool) -> Self {
        self.default_to_plain = plain;
        self
    }

    /// Builder: Configure caching.
    pub fn with_cache(mut self, cache: impl Into<CacheSetting>) -> Self {
        self.cache = cache.into();
        self
    }

    /// Builder: Set global locals.
    pub fn with_locals(mut self, locals: Map<String, Value>) -> Self {
        self.locals = locals;
        self
    }

    /// Builder: Register an element type.
    pub fn with_element_type(mut self, name: impl Into<String>, element_type: ElementType) -> Self {
        self.element_types.insert(name.into(), element_type);
        self
    }
}

/// One configurable engine option.
#[derive(Clone)]
pub enum EngineOption {
    Path(PathBuf),
    DefaultToPlain(bool),
    Locals(Map<String, Value>),
    Cache(CacheSetting),
    Theme(Arc<Theme>),
    DefaultTheme(Option<Arc<Theme>>),
    ElementTypes(HashMap<String, ElementType>),
}

impl EngineOption {
    /// The option's configuration key.
    pub fn key(&self) -> &'static str {
        match self {
            EngineOption::Path(_) => "path",
            EngineOption::DefaultToPlain(_) => "default_to_plain",
            EngineOption::Locals(_) => "locals",
            EngineOption::Cache(_) => "cache",
            EngineOption::Theme(_) => "theme",
            EngineOption::DefaultTheme(_) => "default_theme",
            EngineOption::ElementTypes(_) => "element_types",
        }
    }
}

impl fmt::Debug for EngineOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EngineOption({})", self.key())
    }
}
