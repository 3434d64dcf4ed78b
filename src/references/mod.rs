//! Reference resolution
//!
//! Maps citation strings produced by the answering service (document names,
//! often with file extensions and page suffixes) to canonical document URLs.
//! The mapping table is configuration data loaded from TOML:
//!
//! ```toml
//! url_markers = ["http", "drive.google.com"]
//!
//! [[document]]
//! name = "Access Control Policy"
//! url = "https://example.com/access-control"
//! ```
//!
//! Unresolved citations yield `None` and are rendered as plain text.

use crate::error::{Result, TriageError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Built-in mapping table shipped with the crate
pub const DEFAULT_DOCUMENTS_TOML: &str = include_str!("../../config-templates/documents.toml");

/// Extensions stripped from a citation before matching
const MAX_STRIPPED_EXTENSIONS: usize = 2;

/// One mapping table entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentEntry {
    pub name: String,
    pub url: String,
}

/// Mapping table file structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentMap {
    /// Substrings that mark a citation as already being a link
    #[serde(default = "default_url_markers")]
    pub url_markers: Vec<String>,
    /// Entries in table order (order breaks ties between equal-length keys)
    #[serde(default)]
    pub document: Vec<DocumentEntry>,
}

fn default_url_markers() -> Vec<String> {
    vec!["http".to_string(), "drive.google.com".to_string()]
}

impl Default for DocumentMap {
    fn default() -> Self {
        Self {
            url_markers: default_url_markers(),
            document: Vec::new(),
        }
    }
}

impl DocumentMap {
    /// Parse a mapping table from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load a mapping table from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| TriageError::Io {
            source: e,
            context: format!("Failed to read document mapping file: {:?}", path),
        })?;
        Self::from_toml(&content)
    }

    /// The mapping table shipped in `config-templates/documents.toml`
    pub fn builtin() -> Result<Self> {
        Self::from_toml(DEFAULT_DOCUMENTS_TOML)
    }

    /// Load `path` if it exists, else fall back to the built-in table
    pub fn load_or_builtin(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::from_file(path)
        } else {
            tracing::debug!("Document mapping file {:?} not found, using built-in table", path);
            Self::builtin()
        }
    }

    /// Build from `(name, url)` pairs
    pub fn from_pairs<N, U>(pairs: impl IntoIterator<Item = (N, U)>) -> Self
    where
        N: Into<String>,
        U: Into<String>,
    {
        Self {
            url_markers: default_url_markers(),
            document: pairs
                .into_iter()
                .map(|(name, url)| DocumentEntry {
                    name: name.into(),
                    url: url.into(),
                })
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.document.len()
    }

    pub fn is_empty(&self) -> bool {
        self.document.is_empty()
    }
}

/// A citation together with its resolved link, if any
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedReference {
    pub citation: String,
    pub url: Option<String>,
}

/// How a citation was resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    /// Citation already was a URL
    Url,
    Exact,
    Substring,
}

/// Resolves citations against a [`DocumentMap`]
#[derive(Debug, Clone)]
pub struct ReferenceResolver {
    map: DocumentMap,
}

impl ReferenceResolver {
    pub fn new(map: DocumentMap) -> Self {
        Self { map }
    }

    pub fn document_map(&self) -> &DocumentMap {
        &self.map
    }

    /// Resolve a citation to a URL, or `None` to render it as plain text
    pub fn resolve(&self, citation: &str) -> Option<String> {
        self.resolve_with_kind(citation).map(|(url, _)| url)
    }

    /// Resolve a citation and report which rule matched
    pub fn resolve_with_kind(&self, citation: &str) -> Option<(String, MatchKind)> {
        if self.looks_like_url(citation) {
            return Some((citation.to_string(), MatchKind::Url));
        }

        let key = normalize_citation(citation);
        if key.is_empty() {
            return None;
        }

        if let Some(entry) = self.map.document.iter().find(|e| e.name == key) {
            return Some((entry.url.clone(), MatchKind::Exact));
        }

        // Longest key wins; first in table order on ties
        let best = self
            .map
            .document
            .iter()
            .filter(|e| !e.name.is_empty())
            .filter(|e| key.contains(e.name.as_str()) || e.name.contains(key))
            .fold(None::<&DocumentEntry>, |best, e| match best {
                Some(b) if b.name.len() >= e.name.len() => Some(b),
                _ => Some(e),
            });

        match best {
            Some(entry) => {
                tracing::debug!(citation, document = %entry.name, "Reference resolved by substring");
                Some((entry.url.clone(), MatchKind::Substring))
            }
            None => None,
        }
    }

    /// Resolve every citation of a record, preserving order
    pub fn resolve_all(&self, citations: &[String]) -> Vec<ResolvedReference> {
        citations
            .iter()
            .map(|citation| ResolvedReference {
                citation: citation.clone(),
                url: self.resolve(citation),
            })
            .collect()
    }

    fn looks_like_url(&self, citation: &str) -> bool {
        citation.contains("://")
            || self
                .map
                .url_markers
                .iter()
                .any(|marker| !marker.is_empty() && citation.contains(marker.as_str()))
    }
}

/// Text before the first comma, minus up to two trailing extensions, trimmed
pub fn normalize_citation(citation: &str) -> &str {
    let mut key = citation.split(',').next().unwrap_or_default();
    for _ in 0..MAX_STRIPPED_EXTENSIONS {
        key = strip_extension(key);
    }
    key.trim()
}

/// Remove a trailing `.ext` where `ext` is non-empty and holds no `.` or `/`
fn strip_extension(s: &str) -> &str {
    match s.rfind('.') {
        Some(idx) if idx + 1 < s.len() && !s[idx + 1..].contains('/') => &s[..idx],
        _ => s,
    }
}
