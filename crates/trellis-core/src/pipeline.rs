//! The preprocessing pipeline.
//!
//! Four phases, each walking the tree root to leaf:
//!
//! 1. every theme's `preprocessor`
//! 2. every theme's `preprocessors[template]`
//! 3. every theme's `processor`
//! 4. every theme's `processors[template]`
//!
//! Hooks run strictly one after another and each sees the previous output.

use crate::{BlockContext, RenderRequest, Result, ThemeEngine};
use serde_json::Value;
use tracing::{debug, instrument};

impl ThemeEngine {
    /// Run every hook of the theme tree over a new request for `template`.
    ///
    /// `variables` is copied, never modified. The request ends up bound to
    /// `context`, or to a fresh context when none is given, whatever the
    /// hooks did to it.
    #[instrument(skip(self, variables, context), fields(template = %template))]
    pub async fn preprocess(
        &self,
        template: &str,
        variables: &Value,
        context: Option<BlockContext>,
    ) -> Result<RenderRequest> {
        let context = context.unwrap_or_default();
        let tree = self.tree();
        let mut request = RenderRequest::new(template, variables, context.clone());

        for theme in tree.themes() {
            if let Some(hook) = theme.preprocessor() {
                debug!("preprocessor of '{}'", theme.name());
                request = hook.process(request).await?;
            }
        }
        for theme in tree.themes() {
            if let Some(hook) = theme.template_preprocessor(template) {
                debug!("'{}' preprocessor of '{}'", template, theme.name());
                request.variables = hook.process(request.variables).await?;
            }
        }
        for theme in tree.themes() {
            if let Some(hook) = theme.processor() {
                debug!("processor of '{}'", theme.name());
                request = hook.process(request).await?;
            }
        }
        for theme in tree.themes() {
            if let Some(hook) = theme.template_processor(template) {
                debug!("'{}' processor of '{}'", template, theme.name());
                request.variables = hook.process(request.variables).await?;
            }
        }

        request.variables.bind(context.clone());
        request.context = context;
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemoryFileSystem;
    use crate::{EngineConfig, Theme, TrellisError, Variables};
    use futures::future::{ready, Ready};
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    type Log = Arc<Mutex<Vec<(&'static str, i64)>>>;

    fn bump(variables: &mut Variables) -> i64 {
        let order = variables.get("order").and_then(Value::as_i64).unwrap_or(0) + 1;
        variables.insert("order", order);
        order
    }

    fn request_hook(
        log: &Log,
        label: &'static str,
    ) -> impl Fn(RenderRequest) -> Ready<Result<RenderRequest>> + Send + Sync + 'static {
        let log = Arc::clone(log);
        move |mut request: RenderRequest| {
            let order = bump(&mut request.variables);
            log.lock().unwrap().push((label, order));
            ready(Ok(request))
        }
    }

    fn variables_hook(
        log: &Log,
        label: &'static str,
    ) -> impl Fn(Variables) -> Ready<Result<Variables>> + Send + Sync + 'static {
        let log = Arc::clone(log);
        move |mut variables: Variables| {
            let order = bump(&mut variables);
            log.lock().unwrap().push((label, order));
            ready(Ok(variables))
        }
    }

    fn hooked(name: &'static str, log: &Log) -> Theme {
        Theme::new(name)
            .with_preprocessor(request_hook(log, "preprocessor"))
            .with_processor(request_hook(log, "processor"))
            .with_template_preprocessor("foo_bar", variables_hook(log, "template preprocessor"))
            .with_template_processor("foo_bar", variables_hook(log, "template processor"))
    }

    fn engine_for(child: &Arc<Theme>) -> ThemeEngine {
        ThemeEngine::new(EngineConfig::default())
            .with_file_system(Arc::new(MemoryFileSystem::new()))
            .with_theme(Arc::clone(child))
    }

    #[tokio::test]
    async fn test_phase_order() {
        let log: Log = Arc::default();
        let parent = Arc::new(hooked("parent", &log));
        let child = Arc::new(hooked("child", &log).with_parent(&parent));
        let engine = engine_for(&child);

        let request = engine.preprocess("foo_bar", &json!({}), None).await.unwrap();

        assert_eq!(request.variables.get("order"), Some(&json!(8)));
        let labels: Vec<&str> = log.lock().unwrap().iter().map(|(label, _)| *label).collect();
        assert_eq!(
            labels,
            vec![
                "preprocessor",
                "preprocessor",
                "template preprocessor",
                "template preprocessor",
                "processor",
                "processor",
                "template processor",
                "template processor",
            ]
        );
        let orders: Vec<i64> = log.lock().unwrap().iter().map(|(_, order)| *order).collect();
        assert_eq!(orders, (1..=8).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_other_templates_skip_template_hooks() {
        let log: Log = Arc::default();
        let child = Arc::new(hooked("child", &log));
        let engine = engine_for(&child);

        let request = engine.preprocess("other", &json!({}), None).await.unwrap();
        assert_eq!(request.variables.get("order"), Some(&json!(2)));
    }

    #[tokio::test]
    async fn test_without_hooks() {
        let child = Arc::new(Theme::new("plain").with_template_path("simpleTheme/"));
        let engine = engine_for(&child);

        let request = engine
            .preprocess("foo_bar", &json!({ "name": "Kalle" }), None)
            .await
            .unwrap();
        assert_eq!(request.template, "foo_bar");
        assert_eq!(request.variables.get_str("name"), Some("Kalle"));
    }

    #[tokio::test]
    async fn test_input_is_not_mutated() {
        let log: Log = Arc::default();
        let child = Arc::new(hooked("child", &log));
        let engine = engine_for(&child);
        let input = json!({ "order": 10 });

        let request = engine.preprocess("foo_bar", &input, None).await.unwrap();
        assert_eq!(request.variables.get("order"), Some(&json!(14)));
        assert_eq!(input, json!({ "order": 10 }));
    }

    #[tokio::test]
    async fn test_context_is_reattached() {
        let child = Arc::new(Theme::new("child").with_preprocessor(
            |mut request: RenderRequest| async move {
                request.context = BlockContext::new();
                request.variables.bind(BlockContext::new());
                Ok(request)
            },
        ));
        let engine = engine_for(&child);
        let ctx = BlockContext::new();

        let request = engine
            .preprocess("foo_bar", &json!({}), Some(ctx.clone()))
            .await
            .unwrap();
        assert!(request.context.same_scope(&ctx));
        assert!(request.variables.block().same_scope(&ctx));
    }

    #[tokio::test]
    async fn test_hook_failure_propagates() {
        let child = Arc::new(Theme::new("child").with_processor(|_request: RenderRequest| async {
            Err::<RenderRequest, _>(TrellisError::hook("nope"))
        }));
        let engine = engine_for(&child);

        let err = engine.preprocess("foo_bar", &json!({}), None).await.unwrap_err();
        assert!(matches!(err, TrellisError::Hook(_)));
    }
}
