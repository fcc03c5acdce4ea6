use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use log::{debug, info};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use trellis_core::{EngineConfig, Theme, ThemeEngine, ThemeManifest};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory template paths are resolved against (default: $TRELLIS_PATH or ./)
    #[arg(long, global = true)]
    base: Option<PathBuf>,

    /// Disable lookup caching
    #[arg(long, global = true)]
    no_cache: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a template by name
    Render {
        /// Template name
        template: String,

        /// Theme manifests, root theme first
        #[arg(short, long = "theme", required = true)]
        themes: Vec<PathBuf>,

        /// JSON file with the template variables
        #[arg(long)]
        vars: Option<PathBuf>,

        /// Evaluate template files instead of printing them verbatim
        #[arg(long)]
        compile: bool,
    },

    /// Render an element tree from a JSON file
    Tree {
        /// Path to the element JSON
        element: PathBuf,

        /// Theme manifests, root theme first
        #[arg(short, long = "theme", required = true)]
        themes: Vec<PathBuf>,

        /// Evaluate template files instead of printing them verbatim
        #[arg(long)]
        compile: bool,
    },

    /// Print the public asset paths of a theme chain
    Paths {
        /// Theme manifests, root theme first
        #[arg(short, long = "theme", required = true)]
        themes: Vec<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenv().ok();

    // Initialize logging
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("warn"));

    let cli = Cli::parse();

    match &cli.command {
        Commands::Render {
            template,
            themes,
            vars,
            compile,
        } => {
            let (engine, _chain) = build_engine(&cli, themes, *compile).await?;
            let variables = match vars {
                Some(path) => read_json(path).await?,
                None => json!({}),
            };

            info!("Rendering '{}'", template);
            let output = engine
                .render(template, &variables)
                .await
                .with_context(|| format!("Failed to render '{}'", template))?;
            println!("{}", output);
        }
        Commands::Tree {
            element,
            themes,
            compile,
        } => {
            let (engine, _chain) = build_engine(&cli, themes, *compile).await?;
            let tree = read_json(element).await?;

            info!("Rendering element tree from {:?}", element);
            println!("{}", engine.render_tree(tree).await);
        }
        Commands::Paths { themes } => {
            let (engine, _chain) = build_engine(&cli, themes, false).await?;
            for path in engine.public_paths() {
                println!("{}", path);
            }
        }
    }

    Ok(())
}

/// Build an engine over the given theme chain.
///
/// The declarations are returned alongside the engine: themes only hold weak
/// links to their parents.
async fn build_engine(
    cli: &Cli,
    manifests: &[PathBuf],
    compile: bool,
) -> Result<(ThemeEngine, Vec<Arc<Theme>>)> {
    let mut config = EngineConfig::from_env();
    if let Some(base) = &cli.base {
        config = config.with_path(base);
    }
    if compile {
        config = config.with_plain(false);
    }
    if cli.no_cache {
        config = config.with_cache(false);
    } else if std::env::var_os("TRELLIS_CACHE").is_none() {
        config = config.with_cache(true);
    }
    debug!("Engine config: {:?}", config);

    let chain = load_chain(manifests).await?;
    let Some(leaf) = chain.last() else {
        bail!("At least one theme manifest is required");
    };

    let engine = ThemeEngine::new(config).with_theme(Arc::clone(leaf));
    Ok((engine, chain))
}

async fn load_chain(manifests: &[PathBuf]) -> Result<Vec<Arc<Theme>>> {
    let mut chain: Vec<Arc<Theme>> = Vec::with_capacity(manifests.len());

    for path in manifests {
        let manifest = ThemeManifest::load(path)
            .await
            .with_context(|| format!("Failed to load theme manifest {:?}", path))?;
        info!("Loaded theme '{}' from {:?}", manifest.name, path);

        let mut theme = manifest.into_theme();
        if let Some(parent) = chain.last() {
            theme = theme.with_parent(parent);
        }
        chain.push(Arc::new(theme));
    }

    Ok(chain)
}

async fn read_json(path: &Path) -> Result<Value> {
    let source = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {:?}", path))?;
    serde_json::from_str(&source).with_context(|| format!("Invalid JSON in {:?}", path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_render() {
        let cli = Cli::parse_from([
            "trellis", "--base", "site/", "render", "front_page", "-t", "base.yaml", "-t",
            "blog.yaml", "--compile",
        ]);
        assert_eq!(cli.base, Some(PathBuf::from("site/")));
        match cli.command {
            Commands::Render {
                template,
                themes,
                compile,
                vars,
            } => {
                assert_eq!(template, "front_page");
                assert_eq!(themes.len(), 2);
                assert!(compile);
                assert!(vars.is_none());
            }
            _ => panic!("expected render"),
        }
    }

    #[tokio::test]
    async fn test_load_chain_links_parents() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("base.yaml");
        let blog = dir.path().join("blog.json");
        std::fs::write(&base, "name: base\npublic_path: base/public\n").unwrap();
        std::fs::write(&blog, r#"{ "name": "blog", "public_path": "blog/public/" }"#).unwrap();

        let chain = load_chain(&[base, blog]).await.unwrap();
        assert_eq!(chain.len(), 2);
        assert_eq!(chain[1].parent().unwrap().name(), "base");

        let engine = ThemeEngine::default().with_theme(Arc::clone(&chain[1]));
        assert_eq!(engine.public_paths(), vec!["blog/public/", "base/public/"]);
    }
}
