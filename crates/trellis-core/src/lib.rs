//! # Trellis Core
//!
//! Core library for theme inheritance, template resolution and element
//! rendering.
//!
//! Themes extend parent themes. Given a template name and some data, the
//! engine runs the themes' hooks over the data, finds the most specific
//! template for the name and its suggestions, and renders it. Composite
//! documents are rendered from element trees that share state through blocks.
//!
//! ## Features
//!
//! - Theme trees with option/local inheritance and cycle detection
//! - Suggestion-driven template lookup with a bounded cache
//! - Ordered preprocessing/processing hooks
//! - Recursive element rendering with wrappers, types and blocks
//!
//! ## Example
//!
//! ```rust,ignore
//! use trellis_core::prelude::*;
//! use serde_json::json;
//!
//! let base = Arc::new(Theme::new("base").with_template_path("base/"));
//! let blog = Arc::new(Theme::new("blog").with_template_path("blog/").with_parent(&base));
//!
//! let engine = ThemeEngine::new(EngineConfig::from_env()).with_theme(blog);
//! let page = engine.render_tree(json!({
//!     "template_wrappers": "page",
//!     "children": [{ "type": "title", "title": "Hello" }]
//! })).await;
//! ```

pub mod cache;
pub mod config;
pub mod context;
pub mod element;
pub mod engine;
pub mod error;
pub mod fs;
pub mod hooks;
pub mod observer;
pub mod pipeline;
pub mod recursive;
pub mod request;
pub mod resolver;
pub mod template;
pub mod theme;

pub use cache::{Cache, CacheConfig, CacheEntry, LruCache, NoCache};
pub use config::{CacheSetting, EngineConfig, EngineOption};
pub use context::{BlockContext, BlockValue};
pub use element::{Element, ElementType};
pub use engine::ThemeEngine;
pub use error::{Result, TrellisError};
pub use fs::{FileSystem, LocalFileSystem, MemoryFileSystem};
pub use observer::{CollectingSink, Diagnostic, DiagnosticSink, TracingSink};
pub use request::{RenderRequest, Variables};
pub use resolver::ResolvedTemplate;
pub use theme::{TemplateSource, Theme, ThemeInstance, ThemeManifest, ThemeOptions, ThemeTree};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::{
        BlockContext, Element, ElementType, EngineConfig, EngineOption, Result, Theme,
        ThemeEngine, ThemeManifest, ThemeOptions, TrellisError, Variables,
    };
    pub use std::sync::Arc;
}
