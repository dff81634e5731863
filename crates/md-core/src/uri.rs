//! A minimal URI value type (spec §3 "URI").
//!
//! Documents in this system are addressed by arbitrary schemes —
//! `file:`, `untitled:`, or whatever an embedding editor uses — so the
//! workspace's URIs are not always valid `http`/`https` URLs. [`Uri`] is a
//! small hand-rolled parser rather than a wrapper over [`url::Url`],
//! because `Url::parse` rejects several forms this crate must round-trip
//! exactly (bare `untitled:Untitled-1`, Windows-drive `file:` paths without
//! a double-slash authority). `url` itself is still used where percent
//! encoding of path segments is needed (see [`crate::link`]).

use std::fmt;

/// A parsed URI: scheme, optional authority, slash-normalized path, and
/// optional query/fragment.
///
/// Equality and hashing use the full string form (spec §3: "Equality for
/// caching uses the full string form").
#[derive(Debug, Clone)]
pub struct Uri {
    scheme: String,
    authority: Option<String>,
    path: String,
    query: Option<String>,
    fragment: Option<String>,
}

impl Uri {
    /// Parse a URI string.
    ///
    /// Accepts `scheme:path`, `scheme:///path`, and `scheme://authority/path`
    /// forms, each with optional `?query` and `#fragment` suffixes.
    #[must_use]
    pub fn parse(input: &str) -> Self {
        let (without_fragment, fragment) = match input.split_once('#') {
            Some((head, frag)) => (head, Some(frag.to_string())),
            None => (input, None),
        };
        let (without_query, query) = match without_fragment.split_once('?') {
            Some((head, q)) => (head, Some(q.to_string())),
            None => (without_fragment, None),
        };

        let Some(colon) = without_query.find(':') else {
            // No scheme at all: treat the whole thing as a path (relative
            // references resolved elsewhere never reach this branch, but
            // defend against it anyway).
            return Self {
                scheme: String::new(),
                authority: None,
                path: normalize_slashes(without_query),
                query,
                fragment,
            };
        };

        let scheme = without_query[..colon].to_string();
        let rest = &without_query[colon + 1..];

        let (authority, path) = if let Some(after_slashes) = rest.strip_prefix("//") {
            match after_slashes.find('/') {
                Some(idx) => (
                    Some(after_slashes[..idx].to_string()),
                    normalize_slashes(&after_slashes[idx..]),
                ),
                None => (Some(after_slashes.to_string()), String::new()),
            }
        } else {
            (None, normalize_slashes(rest))
        };

        Self {
            scheme,
            authority,
            path,
            query,
            fragment,
        }
    }

    /// Build a URI directly from parts (used by resolution code that
    /// already has a scheme/authority/path in hand).
    #[must_use]
    pub fn from_parts(
        scheme: impl Into<String>,
        authority: Option<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            scheme: scheme.into(),
            authority,
            path: normalize_slashes(&path.into()),
            query: None,
            fragment: None,
        }
    }

    #[must_use]
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    #[must_use]
    pub fn authority(&self) -> Option<&str> {
        self.authority.as_deref()
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    #[must_use]
    pub fn fragment(&self) -> Option<&str> {
        self.fragment.as_deref()
    }

    /// This URI with the fragment removed.
    #[must_use]
    pub fn without_fragment(&self) -> Self {
        Self {
            fragment: None,
            ..self.clone()
        }
    }

    /// This URI with its fragment replaced.
    #[must_use]
    pub fn with_fragment(&self, fragment: Option<String>) -> Self {
        Self {
            fragment,
            ..self.clone()
        }
    }

    /// This URI with its path replaced (fragment/query preserved).
    #[must_use]
    pub fn with_path(&self, path: impl Into<String>) -> Self {
        Self {
            path: normalize_slashes(&path.into()),
            ..self.clone()
        }
    }

    /// The path's final `/`-delimited segment, with any extension removed.
    #[must_use]
    pub fn file_stem(&self) -> &str {
        let name = self.path.rsplit('/').next().unwrap_or("");
        match name.rfind('.') {
            Some(0) | None => name,
            Some(idx) => &name[..idx],
        }
    }

    /// The path's extension (without the leading `.`), lowercased.
    #[must_use]
    pub fn extension(&self) -> Option<String> {
        let name = self.path.rsplit('/').next().unwrap_or("");
        match name.rfind('.') {
            Some(0) | None => None,
            Some(idx) => Some(name[idx + 1..].to_ascii_lowercase()),
        }
    }

    /// The `/`-joined directory containing this URI's path (no trailing
    /// slash, `""` if the path has no parent).
    #[must_use]
    pub fn dirname(&self) -> &str {
        match self.path.rfind('/') {
            Some(idx) => &self.path[..idx],
            None => "",
        }
    }

    /// Join a relative (non-absolute, non-scheme-qualified) path segment
    /// onto this URI's directory.
    #[must_use]
    pub fn join(&self, relative: &str) -> Self {
        let base = self.dirname();
        let joined = if base.is_empty() {
            relative.to_string()
        } else {
            format!("{base}/{relative}")
        };
        self.with_path(resolve_dot_segments(&joined))
    }

    /// Whether `other`'s path lies at or under this URI's path, same
    /// scheme+authority.
    #[must_use]
    pub fn is_ancestor_of(&self, other: &Self) -> bool {
        if self.scheme != other.scheme || self.authority != other.authority {
            return false;
        }
        let base = self.path.trim_end_matches('/');
        other.path == base || other.path.starts_with(&format!("{base}/"))
    }

    /// Rewrite `other` (a descendant of `self`) to be a descendant of
    /// `new_base` instead, preserving the relative suffix.
    #[must_use]
    pub fn rebase(&self, other: &Self, new_base: &Self) -> Option<Self> {
        let base = self.path.trim_end_matches('/');
        let suffix = if other.path == base {
            String::new()
        } else {
            other.path.strip_prefix(&format!("{base}/"))?.to_string()
        };
        let new_base_path = new_base.path.trim_end_matches('/');
        let new_path = if suffix.is_empty() {
            new_base_path.to_string()
        } else {
            format!("{new_base_path}/{suffix}")
        };
        Some(other.with_path(new_path).rescheme_from(new_base))
    }

    fn rescheme_from(&self, other: &Self) -> Self {
        Self {
            scheme: other.scheme.clone(),
            authority: other.authority.clone(),
            ..self.clone()
        }
    }
}

fn normalize_slashes(path: &str) -> String {
    path.replace('\\', "/")
}

/// Resolve `.`/`..` segments in a `/`-joined path.
fn resolve_dot_segments(path: &str) -> String {
    let absolute = path.starts_with('/');
    let mut out: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {},
            ".." => {
                if out.last().is_some_and(|s| *s != "..") {
                    out.pop();
                } else if !absolute {
                    out.push("..");
                }
            },
            other => out.push(other),
        }
    }
    let joined = out.join("/");
    if absolute {
        format!("/{joined}")
    } else {
        joined
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.scheme)?;
        if let Some(authority) = &self.authority {
            write!(f, "//{authority}")?;
        }
        write!(f, "{}", self.path)?;
        if let Some(query) = &self.query {
            write!(f, "?{query}")?;
        }
        if let Some(fragment) = &self.fragment {
            write!(f, "#{fragment}")?;
        }
        Ok(())
    }
}

impl PartialEq for Uri {
    fn eq(&self, other: &Self) -> bool {
        self.to_string() == other.to_string()
    }
}
impl Eq for Uri {}

impl std::hash::Hash for Uri {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.to_string().hash(state);
    }
}

impl From<&str> for Uri {
    fn from(value: &str) -> Self {
        Self::parse(value)
    }
}

impl From<String> for Uri {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_file_uri_with_fragment() {
        let uri = Uri::parse("file:///a/b/doc.md#section-one");
        assert_eq!(uri.scheme(), "file");
        assert_eq!(uri.path(), "/a/b/doc.md");
        assert_eq!(uri.fragment(), Some("section-one"));
    }

    #[test]
    fn parses_untitled_scheme_without_authority() {
        let uri = Uri::parse("untitled:Untitled-1");
        assert_eq!(uri.scheme(), "untitled");
        assert_eq!(uri.path(), "Untitled-1");
        assert_eq!(uri.authority(), None);
    }

    #[test]
    fn join_resolves_dot_segments() {
        let base = Uri::parse("file:///a/b/doc.md");
        let joined = base.join("../c.md");
        assert_eq!(joined.path(), "/a/c.md");
    }

    #[test]
    fn ancestor_and_rebase() {
        let old_dir = Uri::parse("file:///old");
        let new_dir = Uri::parse("file:///new/sub");
        let target = Uri::parse("file:///old/doc.md");
        assert!(old_dir.is_ancestor_of(&target));
        let rebased = old_dir.rebase(&target, &new_dir).unwrap();
        assert_eq!(rebased.path(), "/new/sub/doc.md");
    }

    #[test]
    fn equality_is_full_string_form() {
        assert_eq!(
            Uri::parse("file:///a.md"),
            Uri::parse("file:///a.md"),
        );
        assert_ne!(Uri::parse("file:///a.md"), Uri::parse("file:///A.md"));
    }
}
