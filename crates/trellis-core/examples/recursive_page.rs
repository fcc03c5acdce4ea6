//! Renders a small page from an element tree.
//!
//! Prints `Title: Hi ---Welcome!--- CSS: original.css`

use serde_json::json;
use std::sync::Arc;
use trellis_core::{ElementType, EngineConfig, Theme, ThemeEngine, ThemeOptions, Variables};

#[tokio::main]
async fn main() -> trellis_core::Result<()> {
    tracing_subscriber::fmt::init();

    let theme = Arc::new(
        Theme::new("cool")
            .with_inline_template("title", |vars: Variables| async move {
                vars.block().append("css", "original.css");
                Ok(format!("Title: {} ", vars.get_str("value").unwrap_or_default()))
            })
            .with_inline_template("subtitle", |vars: Variables| async move {
                Ok(vars.get_str("value").unwrap_or_default().to_string())
            })
            .with_inline_template("page", |vars: Variables| async move {
                let css = vars.block().get("css").unwrap_or_default();
                Ok(format!(
                    "{} CSS: {}",
                    vars.get_str("content").unwrap_or_default(),
                    css.as_str().unwrap_or_default()
                ))
            })
            .with_options(ThemeOptions::new().with_element_type(
                "subtitle",
                ElementType::new().with_prefix("---").with_suffix("---"),
            )),
    );

    let config = EngineConfig::default()
        .with_plain(false)
        .with_element_type("title", ElementType::new().with_template("title"))
        .with_element_type(
            "subtitle",
            ElementType::new()
                .with_template("subtitle")
                .with_prefix("***")
                .with_suffix("***"),
        );
    let engine = ThemeEngine::new(config).with_theme(theme);

    let page = engine
        .render_tree(json!({
            "template_wrappers": ["page"],
            "children": [
                { "type": "title", "value": "Hi" },
                { "type": "subtitle", "value": "Welcome!" }
            ]
        }))
        .await;

    println!("{}", page);
    Ok(())
}
