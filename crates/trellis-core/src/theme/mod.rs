//! Themes and theme trees.
//!
//! - [`Theme`]: a shared, declared bundle of templates, hooks and options
//! - [`ThemeTree`]: the root-first chain of [`ThemeInstance`]s an engine renders with
//! - [`ThemeManifest`]: serde description of hook-free themes

mod manifest;
#[allow(clippy::module_inception)]
mod theme;
mod tree;

pub use manifest::ThemeManifest;
pub use theme::{TemplateSource, Theme, ThemeOptions, DEFAULT_TEMPLATE_EXTENSION};
pub use tree::{ThemeInstance, ThemeTree};
