//! Process-wide, immutable-per-session configuration (spec §6).
//!
//! Grounded on `blz-core/src/config.rs`: a plain `serde`-derived struct,
//! loadable from TOML, with `Default` supplying the spec's implied
//! defaults. Unlike `blz`'s config (which is a hierarchical, per-source,
//! filesystem-backed settings system), this engine's configuration is
//! exactly the enumerated options spec §6 names — deliberately smaller,
//! since the spec calls it out as "enumerated options only."

use crate::error::{Error, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// How a rewritten internal link path should express a Markdown file
/// extension (spec §4.13).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum PreferredMdPathExtensionStyle {
    /// Preserve whatever the original link did.
    #[default]
    Auto,
    /// Always include the extension.
    IncludeExtension,
    /// Always omit the extension.
    RemoveExtension,
}

/// Process-wide configuration (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Extensions (no leading dot) tried in order when resolving a path
    /// with no extension or verifying a `.md`-fallback candidate. The
    /// first entry is the default extension used by link-rewriting code.
    pub markdown_file_extensions: Vec<String>,
    /// Extensions known to never be Markdown; a link pointing at one of
    /// these skips the `.md` fallback entirely.
    pub known_linked_to_file_extensions: Vec<String>,
    /// Glob patterns (matched against URI paths) excluded from workspace
    /// enumeration and diagnostics.
    pub exclude_paths: Vec<String>,
    /// How rewritten links should express the Markdown extension.
    pub preferred_md_path_extension_style: PreferredMdPathExtensionStyle,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            markdown_file_extensions: vec!["md".to_string(), "markdown".to_string()],
            known_linked_to_file_extensions: Vec::new(),
            exclude_paths: Vec::new(),
            preferred_md_path_extension_style: PreferredMdPathExtensionStyle::Auto,
        }
    }
}

impl Config {
    /// Parse configuration from a TOML document.
    ///
    /// # Errors
    /// Returns [`Error::Config`] if the TOML is malformed.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration back to TOML.
    ///
    /// # Errors
    /// Returns [`Error::Config`] if serialization fails (effectively
    /// infallible for this struct's shape).
    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    fn validate(&self) -> Result<()> {
        if self.markdown_file_extensions.is_empty() {
            return Err(Error::Config(
                "markdown_file_extensions must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// The default Markdown extension (the first configured entry),
    /// without a leading dot.
    #[must_use]
    pub fn default_extension(&self) -> &str {
        self.markdown_file_extensions
            .first()
            .map(String::as_str)
            .unwrap_or("md")
    }

    /// Whether `path`'s extension matches one of the configured Markdown
    /// extensions (case-insensitive).
    #[must_use]
    pub fn is_markdown_path(&self, path: &str) -> bool {
        extension_of(path).is_some_and(|ext| {
            self.markdown_file_extensions
                .iter()
                .any(|known| known.eq_ignore_ascii_case(&ext))
        })
    }

    /// Whether `path`'s extension is known to never be Markdown, meaning
    /// the `.md` fallback should not be attempted on it.
    #[must_use]
    pub fn is_known_non_markdown(&self, path: &str) -> bool {
        extension_of(path).is_some_and(|ext| {
            self.known_linked_to_file_extensions
                .iter()
                .any(|known| known.eq_ignore_ascii_case(&ext))
        })
    }

    /// Build a [`GlobSet`] matcher for `exclude_paths`.
    ///
    /// # Errors
    /// Returns [`Error::Config`] if a glob pattern is malformed.
    pub fn exclude_matcher(&self) -> Result<GlobSet> {
        build_glob_set(&self.exclude_paths)
    }
}

/// Build a [`GlobSet`] from a list of glob patterns (shared by `Config`'s
/// `excludePaths` and diagnostics' per-request `ignoreLinks`).
///
/// # Errors
/// Returns [`Error::Config`] if a glob pattern is malformed.
pub fn build_glob_set(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

fn extension_of(path: &str) -> Option<String> {
    Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_extensions() {
        let c = Config::default();
        assert_eq!(c.default_extension(), "md");
        assert!(c.is_markdown_path("a/b.md"));
        assert!(!c.is_markdown_path("a/b.txt"));
    }

    #[test]
    fn rejects_empty_extension_list() {
        let toml = "markdown_file_extensions = []\n";
        assert!(Config::from_toml_str(toml).is_err());
    }

    #[test]
    fn roundtrips_through_toml() {
        let c = Config::default();
        let s = c.to_toml_string().unwrap();
        let parsed = Config::from_toml_str(&s).unwrap();
        assert_eq!(parsed.markdown_file_extensions, c.markdown_file_extensions);
    }

    #[test]
    fn exclude_matcher_matches_glob() {
        let c = Config {
            exclude_paths: vec!["**/node_modules/**".to_string()],
            ..Config::default()
        };
        let set = c.exclude_matcher().unwrap();
        assert!(set.is_match("a/node_modules/b.md"));
        assert!(!set.is_match("a/src/b.md"));
    }
}
