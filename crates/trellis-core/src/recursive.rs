//! Recursive rendering of element trees.
//!
//! Each node renders either its own template or its children, then passes the
//! result through its wrappers and post-render hooks. Failures stay inside
//! the node that caused them: the node contributes what it could and the
//! problem goes to the diagnostic sink.

use crate::hooks::{PostRender, PreRender};
use crate::observer::Diagnostic;
use crate::{Element, Result, ThemeEngine};
use futures::future::{join_all, BoxFuture, FutureExt};
use serde_json::{Map, Value};
use std::mem;
use tracing::debug;

const WRAPPER_ELEMENT: &str = "element";
const WRAPPER_CONTENT: &str = "content";
const WRAPPER_VARIABLES: &str = "variables";

impl ThemeEngine {
    /// Render an element tree from JSON.
    pub async fn render_tree(&self, tree: Value) -> String {
        let mut element = Element::from_value(tree);
        self.render_element(&mut element).await
    }

    /// Render one element and everything below it.
    ///
    /// Never fails. After the call `element` reflects what its type and
    /// pre-render hooks made of it, and its render context holds the blocks
    /// its children wrote.
    pub fn render_element<'a>(&'a self, element: &'a mut Element) -> BoxFuture<'a, String> {
        async move {
            self.apply_element_type(element);

            let original = element.clone();
            let mut content = match self.run_pre_renders(element).await {
                Ok(()) => self.render_content(element).await,
                Err(e) => {
                    *element = original;
                    self.sink.report(Diagnostic::RenderFailed {
                        template: element.template.clone(),
                        error: e.to_string(),
                    });
                    String::new()
                }
            };

            for wrapper in element.template_wrappers.clone() {
                let variables = wrapper_variables(element, &content);
                match self
                    .render_with_context(&wrapper, &variables, element.render_context.clone())
                    .await
                {
                    Ok(wrapped) => content = wrapped,
                    Err(e) => self.sink.report(Diagnostic::WrapperFailed {
                        wrapper,
                        error: e.to_string(),
                    }),
                }
            }

            for hook in element.post_renders.clone() {
                match hook.post_render(content.clone(), element.to_value()).await {
                    Ok(processed) => content = processed,
                    Err(e) => self.sink.report(Diagnostic::RenderFailed {
                        template: element.template.clone(),
                        error: e.to_string(),
                    }),
                }
            }

            format!(
                "{}{}{}",
                element.prefix.as_deref().unwrap_or_default(),
                content,
                element.suffix.as_deref().unwrap_or_default()
            )
        }
        .boxed()
    }

    /// Merge the global type, then the leaf theme's override.
    fn apply_element_type(&self, element: &mut Element) {
        let Some(name) = element.element_type.clone() else {
            return;
        };

        if let Some(global) = self.config.element_types.get(&name) {
            global.apply_to(element);
        }

        let tree = self.tree();
        let themed = tree
            .leaf()
            .and_then(|leaf| leaf.options().element_types.as_ref())
            .and_then(|types| types.get(&name));
        if let Some(themed) = themed {
            themed.apply_to(element);
        }
    }

    async fn run_pre_renders(&self, element: &mut Element) -> Result<()> {
        for hook in element.pre_renders.clone() {
            let current = mem::take(element);
            *element = hook.pre_render(current).await?;
        }
        Ok(())
    }

    /// The node's own template, or its children in order.
    async fn render_content(&self, element: &mut Element) -> String {
        let content = match element.template.clone() {
            Some(template) => {
                let variables = element.to_value();
                match self
                    .render_with_context(&template, &variables, element.render_context.clone())
                    .await
                {
                    Ok(content) => content,
                    Err(e) => {
                        self.sink.report(Diagnostic::RenderFailed {
                            template: Some(template),
                            error: e.to_string(),
                        });
                        String::new()
                    }
                }
            }
            None => {
                debug!("Rendering {} children", element.children.len());
                join_all(
                    element
                        .children
                        .iter_mut()
                        .map(|child| self.render_element(child)),
                )
                .await
                .concat()
            }
        };

        for child in &element.children {
            element.render_context.merge_from(&child.render_context);
        }
        content
    }
}

/// `{...fields.variables, element, content}`
fn wrapper_variables(element: &Element, content: &str) -> Value {
    let mut variables = match element.fields.get(WRAPPER_VARIABLES) {
        Some(Value::Object(map)) => map.clone(),
        _ => Map::new(),
    };
    variables.insert(WRAPPER_ELEMENT.into(), element.to_value());
    variables.insert(WRAPPER_CONTENT.into(), Value::String(content.to_string()));
    Value::Object(variables)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemoryFileSystem;
    use crate::observer::CollectingSink;
    use crate::{
        EngineConfig, ElementType, Theme, ThemeOptions, TrellisError, Variables,
    };
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Fixture {
        engine: ThemeEngine,
        sink: Arc<CollectingSink>,
    }

    fn fixture(config: EngineConfig, files: &[(&str, &str)], child: Theme) -> Fixture {
        let fs = MemoryFileSystem::new();
        for (path, content) in files {
            fs.insert(*path, *content);
        }
        let parent = Arc::new(Theme::new("parent").with_template_path("parentTheme/"));
        let child = Arc::new(child.with_template_path("subTheme/").with_parent(&parent));
        let sink = Arc::new(CollectingSink::new());
        let engine = ThemeEngine::new(config)
            .with_file_system(Arc::new(fs))
            .with_sink(sink.clone())
            .with_theme(child);
        Fixture { engine, sink }
    }

    fn plain(files: &[(&str, &str)]) -> Fixture {
        fixture(EngineConfig::default(), files, Theme::new("child"))
    }

    #[tokio::test]
    async fn test_iterates_over_all_children() {
        let f = plain(&[
            ("parentTheme/123.html", "987 "),
            ("parentTheme/234.html", "876 "),
            ("parentTheme/345.html", "765 "),
            ("parentTheme/456.html", "654 "),
        ]);

        let out = f
            .engine
            .render_tree(json!({
                "children": [
                    { "template": "123" },
                    { "template": "345" },
                    { "children": [
                        { "template": "234" },
                        { "template": "456" },
                        { "empty": "This does nothing, but that is okay" }
                    ]}
                ]
            }))
            .await;
        assert_eq!(out, "987 765 876 654 ");
        assert!(f.sink.is_empty());
    }

    #[tokio::test]
    async fn test_template_overrides_children() {
        let f = plain(&[
            ("parentTheme/123.html", "987 "),
            ("parentTheme/345.html", "765 "),
            ("parentTheme/567.html", "543 "),
        ]);

        let out = f
            .engine
            .render_tree(json!({
                "children": [
                    { "template": "123" },
                    { "template": "345" },
                    { "template": "567", "children": [
                        { "template": "234" },
                        { "template": "456" }
                    ]}
                ]
            }))
            .await;
        assert_eq!(out, "987 765 543 ");
    }

    #[tokio::test]
    async fn test_missing_child_renders_empty() {
        let f = plain(&[("parentTheme/123.html", "987 "), ("parentTheme/567.html", "543 ")]);

        let out = f
            .engine
            .render_tree(json!({
                "children": [
                    { "template": "123" },
                    { "template": "345" },
                    { "template": "567" }
                ]
            }))
            .await;
        assert_eq!(out, "987 543 ");
        assert_eq!(f.sink.len(), 1);
        assert!(matches!(
            &f.sink.diagnostics()[0],
            Diagnostic::RenderFailed { template: Some(t), .. } if t == "345"
        ));
    }

    #[tokio::test]
    async fn test_pre_render_adds_post_render() {
        let f = plain(&[("parentTheme/123.html", "987")]);
        let mut element = Element::new()
            .with_template("123")
            .with_pre_render(|element: Element| async move {
                Ok(element.with_post_render(|content: String, _element: Value| async move {
                    Ok(content + "6")
                }))
            });

        assert_eq!(f.engine.render_element(&mut element).await, "9876");
        assert_eq!(element.post_renders.len(), 1);
    }

    #[tokio::test]
    async fn test_post_render_sees_element() {
        let f = plain(&[("parentTheme/123.html", "987")]);
        let mut element = Element::new()
            .with_template("123")
            .with_field("title", "Hello")
            .with_post_render(|content: String, element: Value| async move {
                Ok(format!("{}:{}", element["title"].as_str().unwrap_or_default(), content))
            });

        assert_eq!(f.engine.render_element(&mut element).await, "Hello:987");
    }

    #[tokio::test]
    async fn test_pre_render_failure_keeps_decoration() {
        let f = plain(&[("parentTheme/123.html", "987")]);
        let mut element = Element::new()
            .with_template("123")
            .with_prefix("<p>")
            .with_suffix("</p>")
            .with_pre_render(|_element: Element| async {
                Err::<Element, _>(TrellisError::hook("broken"))
            });

        assert_eq!(f.engine.render_element(&mut element).await, "<p></p>");
        assert_eq!(element.template.as_deref(), Some("123"));
        assert_eq!(f.sink.len(), 1);
    }

    #[tokio::test]
    async fn test_template_wrappers() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let child = Theme::new("child").with_inline_template("musse", move |vars: Variables| {
            counter.fetch_add(1, Ordering::SeqCst);
            async move {
                Ok(format!(
                    "musse {} pigg",
                    vars.get_str("content").unwrap_or_default()
                ))
            }
        });
        let f = fixture(EngineConfig::default(), &[("parentTheme/123.html", "987")], child);

        let out = f
            .engine
            .render_tree(json!({
                "template_wrappers": ["musse", "missing-wrapper"],
                "template": "123"
            }))
            .await;
        assert_eq!(out, "musse 987 pigg");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(f.sink.len(), 1);
        assert!(matches!(
            &f.sink.diagnostics()[0],
            Diagnostic::WrapperFailed { wrapper, .. } if wrapper == "missing-wrapper"
        ));
    }

    #[tokio::test]
    async fn test_wrapper_sees_element_and_variables() {
        let f = fixture(
            EngineConfig::default().with_plain(false),
            &[
                ("parentTheme/x.html", "X"),
                ("parentTheme/wrap.html", "{{site}}:{{element.title}}:{{{content}}}"),
            ],
            Theme::new("child"),
        );

        let out = f
            .engine
            .render_tree(json!({
                "template": "x",
                "title": "Start",
                "variables": { "site": "Ankeborg" },
                "template_wrappers": "wrap",
                "prefix": "before",
                "suffix": "after"
            }))
            .await;
        assert_eq!(out, "beforeAnkeborg:Start:Xafter");
    }

    #[tokio::test]
    async fn test_element_types() {
        let child = Theme::new("child").with_options(
            ThemeOptions::new().with_element_type("car", ElementType::new().with_field("brand", "Volvo")),
        );
        let config = EngineConfig::default()
            .with_plain(false)
            .with_element_type("name", ElementType::new().with_template("name"))
            .with_element_type(
                "car",
                ElementType::new().with_template("car").with_field("brand", "Saab"),
            );
        let mut f = fixture(
            config,
            &[
                ("parentTheme/name.html", "{{name}} "),
                ("parentTheme/person.html", "{{occupation}} "),
                ("parentTheme/car.html", "{{brand}} {{model}} "),
            ],
            child,
        );
        f.engine
            .register_element_type("person", ElementType::new().with_template("person"));

        let out = f
            .engine
            .render_tree(json!({
                "children": [
                    { "type": "name", "name": "Oskar" },
                    { "type": "name", "name": "Sixten" },
                    { "type": "missing", "name": "Kalle", "template": "name" },
                    { "type": "person", "occupation": "Coder" },
                    { "type": "car", "model": "P1800" }
                ]
            }))
            .await;
        assert_eq!(out, "Oskar Sixten Kalle Coder Volvo P1800 ");
        assert_eq!(
            f.engine.element_type("person").and_then(|t| t.template.as_deref()),
            Some("person")
        );
    }

    #[tokio::test]
    async fn test_blocks_flow_up_the_hierarchy() {
        let f = fixture(
            EngineConfig::default().with_plain(false),
            &[
                ("parentTheme/123.html", r#"{{block "foo" "bar"}}"#),
                ("parentTheme/456.html", r#"Sibling:{{block "foo"}}"#),
                ("parentTheme/789.html", r#"{{block "foo"}}{{{content}}}{{block "foo"}}"#),
            ],
            Theme::new("child"),
        );

        let out = f
            .engine
            .render_tree(json!({
                "template_wrappers": ["789"],
                "children": [
                    { "template": "123" },
                    { "template": "456" }
                ]
            }))
            .await;
        assert_eq!(out, "barSibling:bar");
    }

    #[tokio::test]
    async fn test_typed_children_start_with_empty_blocks() {
        let page = ElementType::from_value(json!({
            "template_wrappers": "wrap",
            "children": [{ "template": "css" }]
        }));
        let f = fixture(
            EngineConfig::default().with_plain(false).with_element_type("page", page),
            &[
                ("parentTheme/css.html", r#"{{block "css" "a.css "}}"#),
                ("parentTheme/wrap.html", r#"[{{block "css"}}]"#),
            ],
            Theme::new("child"),
        );

        let first = f.engine.render_tree(json!({ "type": "page" })).await;
        let second = f.engine.render_tree(json!({ "type": "page" })).await;
        assert_eq!(first, "[a.css ]");
        assert_eq!(second, first);

        let siblings = f
            .engine
            .render_tree(json!({ "children": [{ "type": "page" }, { "type": "page" }] }))
            .await;
        assert_eq!(siblings, "[a.css ][a.css ]");
        assert!(f.sink.diagnostics().is_empty());
    }

    #[tokio::test]
    async fn test_child_blocks_concatenate_in_order() {
        let f = fixture(
            EngineConfig::default().with_plain(false),
            &[
                ("parentTheme/a.html", r#"{{block "css" "a.css "}}"#),
                ("parentTheme/b.html", r#"{{block "css" "b.css"}}"#),
            ],
            Theme::new("child"),
        );
        let mut element = Element::from_value(json!({
            "render_context": { "css": "base.css " },
            "children": [{ "template": "a" }, { "template": "b" }]
        }));

        f.engine.render_element(&mut element).await;
        assert_eq!(
            element.render_context.get("css"),
            Some(json!("base.css a.css b.css"))
        );
    }
}
