//! Tutor text discovery.
//!
//! Sources are scanned for a labelled, double-quoted string field
//! (`tutorText: "..."` by default). No parsing of the host language is done;
//! the field pattern alone decides what counts as tutor text.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use regex::Regex;
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::key::derive_key;
use crate::template::{expand, looks_like_template, ParameterTable};

/// Field label used by the lesson content files.
pub const DEFAULT_FIELD: &str = "tutorText";

/// The concrete texts implied by the current corpus, in first-seen order,
/// each mapped to its artifact key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DesiredState {
    entries: IndexMap<String, String>,
}

impl DesiredState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `text -> key` unless `text` is already present. Returns whether
    /// the entry was added.
    pub fn insert(&mut self, text: String, key: String) -> bool {
        if self.entries.contains_key(&text) {
            return false;
        }
        self.entries.insert(text, key);
        true
    }

    pub fn key_for(&self, text: &str) -> Option<&str> {
        self.entries.get(text).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.values().any(|k| k == key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(t, k)| (t.as_str(), k.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'a> IntoIterator for &'a DesiredState {
    type Item = (&'a String, &'a String);
    type IntoIter = indexmap::map::Iter<'a, String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Collapse escaped newlines, unescape quotes and trim a raw field match.
pub fn normalize(raw: &str) -> String {
    raw.replace("\\n", " ").replace("\\\"", "\"").trim().to_string()
}

/// List every file under `root` with the given extension, sorted by path.
///
/// `root` may also name a single file, which is returned as-is.
pub fn discover_sources(root: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    if !root.exists() {
        return Err(Error::CorpusNotFound(root.to_path_buf()));
    }
    if root.is_file() {
        return Ok(vec![root.to_path_buf()]);
    }

    let mut sources: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                log::warn!("Skipping unreadable corpus entry: {err}");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| path.extension().and_then(|e| e.to_str()) == Some(extension))
        .collect();
    sources.sort();
    Ok(sources)
}

/// Builds a [`DesiredState`] from raw source text.
pub struct CorpusExtractor {
    field_re: Regex,
    params: ParameterTable,
    key_prefix: String,
}

impl CorpusExtractor {
    /// Create an extractor for `field: "..."` occurrences.
    pub fn new(
        field: &str,
        params: ParameterTable,
        key_prefix: impl Into<String>,
    ) -> Result<Self> {
        // Body: any run of non-quote, non-backslash chars or escape pairs, so an
        // escaped quote never ends the match.
        let pattern = format!(r#"(?s){}:\s*"((?:[^"\\]|\\.)*)""#, regex::escape(field));
        Ok(Self {
            field_re: Regex::new(&pattern)?,
            params,
            key_prefix: key_prefix.into(),
        })
    }

    /// Normalised, non-empty field values found in `source`, in order.
    pub fn matches(&self, source: &str) -> Vec<String> {
        self.field_re
            .captures_iter(source)
            .filter_map(|caps| caps.get(1))
            .map(|m| normalize(m.as_str()))
            .filter(|text| !text.is_empty())
            .collect()
    }

    /// Fold one source blob into `state`. Returns the number of field values
    /// found, including ones that expanded to nothing.
    pub fn extract_into(&self, source: &str, state: &mut DesiredState) -> usize {
        let found = self.matches(source);
        for text in &found {
            if looks_like_template(text) {
                for (concrete, key) in expand(text, &self.params, &self.key_prefix) {
                    state.insert(concrete, key);
                }
            } else {
                let key = derive_key(text, &self.key_prefix);
                state.insert(text.clone(), key);
            }
        }
        found.len()
    }

    /// Build the desired state from in-memory sources, processed in the given order.
    pub fn extract<I, S>(&self, sources: I) -> DesiredState
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut state = DesiredState::new();
        for source in sources {
            self.extract_into(source.as_ref(), &mut state);
        }
        state
    }

    /// Scan every matching file under `root` in lexicographic path order.
    ///
    /// Fails with [`Error::CorpusNotFound`] when `root` is missing and with
    /// [`Error::NoTemplates`] when no tutor text yields a concrete string.
    /// Unreadable files are skipped.
    pub fn extract_dir(&self, root: &Path, extension: &str) -> Result<DesiredState> {
        let sources = discover_sources(root, extension)?;
        let mut state = DesiredState::new();
        let mut found = 0usize;

        for path in &sources {
            let content = match std::fs::read_to_string(path) {
                Ok(content) => content,
                Err(err) => {
                    log::warn!("Skipping {}: {err}", path.display());
                    continue;
                }
            };
            let n = self.extract_into(&content, &mut state);
            log::debug!("{}: {n} tutor text fields", path.display());
            found += n;
        }

        log::info!(
            "Found {} unique tutor text segments ({found} fields in {} files)",
            state.len(),
            sources.len()
        );

        if state.is_empty() {
            return Err(Error::NoTemplates(root.to_path_buf()));
        }
        Ok(state)
    }
}
