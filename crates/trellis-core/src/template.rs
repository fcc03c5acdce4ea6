//! String templates.
//!
//! Template files are compiled with handlebars. Every render gets a `block`
//! helper bound to that render's [`BlockContext`]:
//!
//! ```text
//! {{block "css" "page.css"}}      append to a block
//! {{block "css" "only.css" true}} replace a block
//! {{block "css"}}                 read a block
//! ```

use crate::{BlockContext, Result, TrellisError, Variables};
use handlebars::{
    Context, Handlebars, Helper, HelperDef, HelperResult, Output, RenderContext,
    RenderErrorReason,
};
use serde_json::Value;

const ROOT_TEMPLATE: &str = "__root";

/// A parsed template, ready to render against any variable bag.
#[derive(Debug, Clone)]
pub struct CompiledTemplate {
    template: handlebars::Template,
}

/// Compile template source.
///
/// # Example
///
/// ```
/// use trellis_core::{template, BlockContext, Variables};
/// use serde_json::json;
///
/// let compiled = template::compile("{{name}} Anka").unwrap();
/// let vars = Variables::from_value(&json!({ "name": "Kalle" }), BlockContext::new());
/// assert_eq!(compiled.render(&vars).unwrap(), "Kalle Anka");
/// ```
pub fn compile(source: &str) -> Result<CompiledTemplate> {
    let template = handlebars::Template::compile(source)
        .map_err(|e| TrellisError::Render(e.to_string()))?;
    Ok(CompiledTemplate { template })
}

impl CompiledTemplate {
    /// Evaluate against `variables`, with `block` bound to its context.
    pub fn render(&self, variables: &Variables) -> Result<String> {
        let mut registry = Handlebars::new();
        registry.register_helper("block", Box::new(BlockHelper::new(variables.block().clone())));
        registry.register_template(ROOT_TEMPLATE, self.template.clone());
        Ok(registry.render(ROOT_TEMPLATE, variables)?)
    }
}

/// The `block` helper.
struct BlockHelper {
    context: BlockContext,
}

impl BlockHelper {
    fn new(context: BlockContext) -> Self {
        Self { context }
    }
}

impl HelperDef for BlockHelper {
    fn call<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        _: &'reg Handlebars<'reg>,
        _: &'rc Context,
        _: &mut RenderContext<'reg, 'rc>,
        out: &mut dyn Output,
    ) -> HelperResult {
        let name = h
            .param(0)
            .and_then(|p| p.value().as_str())
            .ok_or(RenderErrorReason::ParamNotFoundForIndex("block", 0))?;
        let value = h.param(1).map(|p| p.value().clone());
        let force = h
            .param(2)
            .and_then(|p| p.value().as_bool())
            .unwrap_or(false);

        if let Some(stored) = self.context.block(name, value, force) {
            match stored {
                Value::String(text) => out.write(&text)?,
                other => out.write(&other.to_string())?,
            }
        }
        Ok(())
    }
}
