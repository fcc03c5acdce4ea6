//! Template resolution.
//!
//! Finds the theme and the template artifact for a template name and the
//! suggestions hooks added to the variables. The last suggestion is the most
//! specific one; for each suggestion the tree is searched leaf first.

use crate::cache::{cache_key, CacheEntry};
use crate::theme::{TemplateSource, ThemeInstance};
use crate::{Result, ThemeEngine, TrellisError, Variables};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, instrument};

const TEMPLATE_KEY: &str = "template";
const TEMPLATE_FILES_KEY: &str = "templateFiles";

/// The outcome of a successful lookup.
#[derive(Debug, Clone)]
pub struct ResolvedTemplate {
    /// The tree member that provided the template.
    pub theme: Arc<ThemeInstance>,
    /// What to render.
    pub to_render: TemplateSource,
}

impl ThemeEngine {
    /// Locate the template for `template`, trying every suggestion in
    /// `variables` against every theme in the tree.
    #[instrument(skip(self, variables), fields(template = %template))]
    pub async fn find_template(
        &self,
        template: &str,
        variables: &Variables,
    ) -> Result<ResolvedTemplate> {
        let tree = self.tree();

        let mut suggestions = vec![template.to_string()];
        suggestions.extend(variables.suggestions());

        for suggestion in suggestions.iter().rev() {
            for theme in tree.leaf_first() {
                if let Some(source) = theme.template(suggestion) {
                    debug!("'{}' is declared by theme '{}'", suggestion, theme.name());
                    return Ok(ResolvedTemplate {
                        theme: Arc::clone(theme),
                        to_render: source.clone(),
                    });
                }

                if theme.template_path().is_none() {
                    continue;
                }

                if let Some(path) = self.template_file_exists(theme, suggestion).await? {
                    debug!("'{}' resolved to {}", suggestion, path.display());
                    return Ok(ResolvedTemplate {
                        theme: Arc::clone(theme),
                        to_render: TemplateSource::File(path),
                    });
                }
            }
        }

        Err(TrellisError::TemplateNotFound {
            template: template.to_string(),
            suggestions: suggestions.into_iter().skip(1).collect(),
        })
    }

    /// Look for the file implementing `template` under the theme's template
    /// path.
    ///
    /// The first `_` in the name becomes `-` and the effective template
    /// extension is appended. Files in shallower directories win. The
    /// returned path is relative to the engine's base path.
    pub async fn template_file_exists(
        &self,
        theme: &ThemeInstance,
        template: &str,
    ) -> Result<Option<PathBuf>> {
        let Some(template_path) = theme.template_path() else {
            return Ok(None);
        };

        let file_name = format!(
            "{}.{}",
            template.replacen('_', "-", 1),
            theme.options().extension()
        );
        let dir = template_path.to_string_lossy();
        let key = cache_key(&[TEMPLATE_KEY, dir.as_ref(), file_name.as_str()]);

        match self.cache.get(&key) {
            Some(CacheEntry::Path(path)) => return Ok(Some(path)),
            Some(CacheEntry::Missing) => return Ok(None),
            _ => {}
        }

        let found = self
            .template_files(template_path)
            .await?
            .iter()
            .find(|path| path.file_name().and_then(|name| name.to_str()) == Some(file_name.as_str()))
            .cloned();

        let entry = match &found {
            Some(path) => CacheEntry::Path(path.clone()),
            None => CacheEntry::Missing,
        };
        self.cache.set(&key, entry);

        Ok(found)
    }

    /// Every file below `template_path`, shallowest first, then by name.
    async fn template_files(&self, template_path: &Path) -> Result<Arc<Vec<PathBuf>>> {
        let key = cache_key(&[TEMPLATE_FILES_KEY, template_path.to_string_lossy().as_ref()]);
        if let Some(CacheEntry::Files(files)) = self.cache.get(&key) {
            return Ok(files);
        }

        let root = self.config.path.join(template_path);
        let listed = match self.fs.list(&root).await {
            Ok(listed) => listed,
            // Missing template root: the theme simply has no files.
            Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        let mut files: Vec<PathBuf> = listed
            .into_iter()
            .map(|relative| template_path.join(relative))
            .collect();
        files.sort_by(|a, b| {
            a.components()
                .count()
                .cmp(&b.components().count())
                .then_with(|| a.cmp(b))
        });
        debug!("Listed {} template files under {}", files.len(), root.display());

        let files = Arc::new(files);
        self.cache.set(&key, CacheEntry::Files(Arc::clone(&files)));
        Ok(files)
    }
}
