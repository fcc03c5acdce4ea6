//! Declarative theme manifests.
//!
//! Themes without hooks can be described in YAML or JSON:
//!
//! ```yaml
//! name: blog
//! template_path: templates/
//! public_path: public/
//! template_extension: hbs
//! templates:
//!   front_page: templates/special/front.hbs
//! locals:
//!   site_name: My Blog
//! element_types:
//!   title:
//!     template: title
//!     prefix: "<h1>"
//!     suffix: "</h1>"
//! ```

use super::{Theme, ThemeOptions};
use crate::{ElementType, Result, TrellisError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Serializable description of a theme.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThemeManifest {
    pub name: String,
    pub template_path: Option<PathBuf>,
    pub public_path: Option<String>,
    pub template_extension: Option<String>,
    /// Template name → file path.
    pub templates: BTreeMap<String, PathBuf>,
    pub locals: Map<String, Value>,
    /// Element type name → element type declaration.
    pub element_types: BTreeMap<String, Value>,
    /// Free-form options.
    pub options: Map<String, Value>,
}

impl ThemeManifest {
    pub fn from_yaml_str(source: &str) -> Result<Self> {
        Ok(serde_yaml_ng::from_str(source)?)
    }

    pub fn from_json_str(source: &str) -> Result<Self> {
        Ok(serde_json::from_str(source)?)
    }

    /// Load a manifest file, picking the format from its extension.
    ///
    /// Relative paths inside the manifest are resolved against the
    /// manifest's directory.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = tokio::fs::read_to_string(path).await?;

        let manifest = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml_str(&source)?,
            Some("json") => Self::from_json_str(&source)?,
            other => {
                return Err(TrellisError::Config(format!(
                    "unsupported manifest format {:?} for {}",
                    other.unwrap_or(""),
                    path.display()
                )))
            }
        };

        let base = path.parent().unwrap_or_else(|| Path::new(""));
        Ok(manifest.relative_to(base))
    }

    /// Resolve relative template paths against `base`.
    pub fn relative_to(mut self, base: &Path) -> Self {
        if base.as_os_str().is_empty() {
            return self;
        }
        if let Some(template_path) = self.template_path.take() {
            self.template_path = Some(join_dir(base, &template_path));
        }
        for path in self.templates.values_mut() {
            *path = base.join(&*path);
        }
        self
    }

    /// Build the theme declaration.
    pub fn into_theme(self) -> Theme {
        let mut options = ThemeOptions::new();
        options.template_extension = self.template_extension;
        options.extra = self.options;
        for (name, declaration) in self.element_types {
            options = options.with_element_type(name, ElementType::from_value(declaration));
        }

        let mut theme = Theme::new(self.name)
            .with_options(options)
            .with_locals(self.locals);
        if let Some(template_path) = self.template_path {
            theme = theme.with_template_path(template_path);
        }
        if let Some(public_path) = self.public_path {
            theme = theme.with_public_path(public_path);
        }
        for (name, path) in self.templates {
            theme = theme.with_template_file(name, path);
        }
        theme
    }
}

/// Join keeping a trailing separator, since template paths name directories.
fn join_dir(base: &Path, dir: &Path) -> PathBuf {
    let mut joined = base.join(dir).into_os_string();
    if !joined.to_string_lossy().ends_with('/') {
        joined.push("/");
    }
    PathBuf::from(joined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const BLOG: &str = r#"
name: blog
template_path: templates/
public_path: public
template_extension: hbs
templates:
  front_page: special/front.hbs
locals:
  site_name: My Blog
element_types:
  title:
    template: title
    prefix: "<h1>"
options:
  columns: 2
"#;

    #[test]
    fn test_yaml_manifest_builds_theme() {
        let manifest = ThemeManifest::from_yaml_str(BLOG).unwrap();
        assert_eq!(manifest.name, "blog");

        let theme = manifest.into_theme();
        assert_eq!(theme.name(), "blog");
        assert_eq!(theme.template_path(), Some(Path::new("templates/")));
        assert_eq!(theme.public_path(), Some("public"));
        assert_eq!(theme.declared_options().extension(), "hbs");
        assert_eq!(theme.declared_options().extra["columns"], json!(2));
        assert_eq!(theme.declared_locals()["site_name"], json!("My Blog"));

        let types = theme.declared_options().element_types.as_ref().unwrap();
        assert_eq!(types["title"].template.as_deref(), Some("title"));
        assert_eq!(types["title"].prefix.as_deref(), Some("<h1>"));
        assert!(theme.template("front_page").is_some());
    }

    #[test]
    fn test_json_manifest_defaults() {
        let manifest = ThemeManifest::from_json_str(r#"{ "name": "bare" }"#).unwrap();
        assert_eq!(manifest.template_path, None);
        assert!(manifest.templates.is_empty());
    }

    #[test]
    fn test_relative_paths() {
        let manifest = ThemeManifest::from_yaml_str(BLOG)
            .unwrap()
            .relative_to(Path::new("themes/blog"));

        assert_eq!(manifest.template_path, Some(PathBuf::from("themes/blog/templates/")));
        assert_eq!(
            manifest.templates["front_page"],
            PathBuf::from("themes/blog/special/front.hbs")
        );
    }

    #[tokio::test]
    async fn test_load_rejects_unknown_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("theme.toml");
        std::fs::write(&path, "name = 'x'").unwrap();
        assert!(matches!(ThemeManifest::load(&path).await, Err(TrellisError::Config(_))));

        let path = dir.path().join("theme.yaml");
        std::fs::write(&path, "name: x\ntemplate_path: tpl\n").unwrap();
        let manifest = ThemeManifest::load(&path).await.unwrap();
        assert_eq!(manifest.template_path, Some(dir.path().join("tpl/")));
    }
}
