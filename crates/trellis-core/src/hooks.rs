//! Hook traits for themes and elements.
//!
//! Every hook is an async function from input to output-or-failure. Closures
//! returning futures implement the traits directly, so themes can be declared
//! inline:
//!
//! ```rust,ignore
//! let theme = Theme::new("child").with_preprocessor(|mut request: RenderRequest| async move {
//!     request.variables.push_suggestion("page_front");
//!     Ok(request)
//! });
//! ```

use crate::{Element, RenderRequest, Result, ThemeEngine, Variables};
use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

/// A global `preprocessor` / `processor` hook; sees the whole request.
#[async_trait]
pub trait RequestProcessor: Send + Sync {
    async fn process(&self, request: RenderRequest) -> Result<RenderRequest>;
}

/// A per-template hook; sees only the variable bag.
#[async_trait]
pub trait VariablesProcessor: Send + Sync {
    async fn process(&self, variables: Variables) -> Result<Variables>;
}

/// An inline template implementation.
#[async_trait]
pub trait TemplateFn: Send + Sync {
    async fn render(&self, variables: Variables) -> Result<String>;
}

/// A theme-specific renderer for template files.
#[async_trait]
pub trait FileRenderer: Send + Sync {
    async fn render(&self, path: PathBuf, variables: Variables) -> Result<String>;
}

/// Runs before an element renders; may replace the element.
#[async_trait]
pub trait PreRender: Send + Sync {
    async fn pre_render(&self, element: Element) -> Result<Element>;
}

/// Runs after an element renders; receives the content and the element data.
#[async_trait]
pub trait PostRender: Send + Sync {
    async fn post_render(&self, content: String, element: Value) -> Result<String>;
}

/// Called once per theme when a theme tree is built.
pub type InitializeHook = Arc<dyn Fn(&ThemeEngine) + Send + Sync>;

#[async_trait]
impl<F, Fut> RequestProcessor for F
where
    F: Fn(RenderRequest) -> Fut + Send + Sync,
    Fut: Future<Output = Result<RenderRequest>> + Send + 'static,
{
    async fn process(&self, request: RenderRequest) -> Result<RenderRequest> {
        (self)(request).await
    }
}

#[async_trait]
impl<F, Fut> VariablesProcessor for F
where
    F: Fn(Variables) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Variables>> + Send + 'static,
{
    async fn process(&self, variables: Variables) -> Result<Variables> {
        (self)(variables).await
    }
}

#[async_trait]
impl<F, Fut> TemplateFn for F
where
    F: Fn(Variables) -> Fut + Send + Sync,
    Fut: Future<Output = Result<String>> + Send + 'static,
{
    async fn render(&self, variables: Variables) -> Result<String> {
        (self)(variables).await
    }
}

#[async_trait]
impl<F, Fut> FileRenderer for F
where
    F: Fn(PathBuf, Variables) -> Fut + Send + Sync,
    Fut: Future<Output = Result<String>> + Send + 'static,
{
    async fn render(&self, path: PathBuf, variables: Variables) -> Result<String> {
        (self)(path, variables).await
    }
}

#[async_trait]
impl<F, Fut> PreRender for F
where
    F: Fn(Element) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Element>> + Send + 'static,
{
    async fn pre_render(&self, element: Element) -> Result<Element> {
        (self)(element).await
    }
}

#[async_trait]
impl<F, Fut> PostRender for F
where
    F: Fn(String, Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<String>> + Send + 'static,
{
    async fn post_render(&self, content: String, element: Value) -> Result<String> {
        (self)(content, element).await
    }
}
