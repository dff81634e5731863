//! Builds the `FsWorkspace`/`Config` pair every subcommand runs against,
//! and resolves a CLI path argument to the `file:` URI `md-core` expects.

use anyhow::{Context, Result};
use md_core::{Config, FsWorkspace, Uri};
use std::path::{Path, PathBuf};

pub async fn load(root: &Path, config_path: Option<&Path>) -> Result<(FsWorkspace, Config)> {
    let root = root
        .canonicalize()
        .with_context(|| format!("workspace root '{}' does not exist", root.display()))?;

    let config = match config_path {
        Some(path) => load_config_file(path).await?,
        None => {
            let default_path = root.join(".mdls.toml");
            if default_path.is_file() {
                load_config_file(&default_path).await?
            } else {
                Config::default()
            }
        },
    };

    let extensions = config.markdown_file_extensions.clone();
    Ok((FsWorkspace::new(vec![root], extensions), config))
}

async fn load_config_file(path: &Path) -> Result<Config> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading config file '{}'", path.display()))?;
    Config::from_toml_str(&text).with_context(|| format!("parsing config file '{}'", path.display()))
}

/// Resolve a CLI-supplied path (relative to `root` unless already absolute)
/// to a `file:` URI.
#[must_use]
pub fn resolve_uri(root: &Path, file: &Path) -> Uri {
    let absolute: PathBuf = if file.is_absolute() { file.to_path_buf() } else { root.join(file) };
    Uri::parse(&format!("file://{}", absolute.to_string_lossy()))
}

/// The inverse of [`resolve_uri`]: the filesystem path a `file:` URI names,
/// or `None` for any other scheme.
#[must_use]
pub fn uri_to_path(uri: &Uri) -> Option<PathBuf> {
    (uri.scheme() == "file").then(|| PathBuf::from(uri.path()))
}
