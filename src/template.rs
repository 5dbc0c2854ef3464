//! Placeholder detection and combinatorial expansion of tutor templates.
//!
//! A template such as `"Your perimeter is {currentPerimeter}."` expands into
//! one concrete string per declared value of `currentPerimeter`. Every
//! occurrence of a placeholder is its own substitution site, so a name that
//! appears twice draws from its value set independently at each site and the
//! output grows as the product of all site value-set sizes. Nothing caps that
//! product; keep parameter tables small.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::key::derive_key;

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid regex"))
}

/// A single substitution value. JSON parameter files may list numbers or
/// strings; both are rendered to their display text.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawValue {
    Text(String),
    Int(i64),
    Float(f64),
}

impl RawValue {
    fn into_text(self) -> String {
        match self {
            RawValue::Text(s) => s,
            RawValue::Int(n) => n.to_string(),
            RawValue::Float(f) => f.to_string(),
        }
    }
}

/// Mapping from placeholder name to its ordered substitution values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ParameterTable {
    params: BTreeMap<String, Vec<String>>,
}

impl<'de> Deserialize<'de> for ParameterTable {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = BTreeMap::<String, Vec<RawValue>>::deserialize(deserializer)?;
        let mut table = ParameterTable::new();
        for (name, values) in raw {
            if values.is_empty() {
                return Err(serde::de::Error::custom(format!(
                    "parameter '{name}' has no values"
                )));
            }
            table.insert(name, values.into_iter().map(RawValue::into_text));
        }
        Ok(table)
    }
}

impl ParameterTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table used by the tutor lessons.
    ///
    /// `currentPerimeter` covers every perimeter of a rectangle whose sides
    /// are whole units between 1 and 9: the even numbers 4 through 36.
    pub fn tutor_defaults() -> Self {
        let mut table = Self::new();
        table.insert(
            "currentPerimeter",
            (4..=36).step_by(2).map(|n: u32| n.to_string()),
        );
        table
    }

    /// Declare (or replace) the values for a placeholder name. Duplicate
    /// values are dropped, keeping first-seen order. An empty value list is
    /// ignored, so the name stays undeclared.
    pub fn insert<I, S>(&mut self, name: impl Into<String>, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for value in values {
            let value = value.into();
            if !unique.contains(&value) {
                unique.push(value);
            }
        }
        if unique.is_empty() {
            return;
        }
        self.params.insert(name.into(), unique);
    }

    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.params.get(name).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

/// Ordered placeholder names in `template`, one entry per occurrence.
pub fn placeholders(template: &str) -> Vec<&str> {
    placeholder_re()
        .captures_iter(template)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
        .collect()
}

/// True when a normalised string should be routed through expansion.
pub fn looks_like_template(text: &str) -> bool {
    text.contains('{') && text.contains('}')
}

/// Expand `template` into every concrete string it can produce.
///
/// Fails with [`Error::MissingParameter`] when any placeholder has no entry in
/// `params`.
pub fn try_expand(template: &str, params: &ParameterTable) -> Result<Vec<String>> {
    let sites = placeholders(template);

    let mut value_sets = Vec::with_capacity(sites.len());
    for name in &sites {
        let values = params.get(name).ok_or_else(|| Error::MissingParameter {
            template: template.to_string(),
            name: name.to_string(),
        })?;
        value_sets.push((*name, values));
    }

    // Fold over the sites in order. Each step fills the leftmost remaining
    // occurrence of that site's name in every partial string.
    let mut expanded = vec![template.to_string()];
    for (name, values) in value_sets {
        let token = format!("{{{name}}}");
        let mut next = Vec::with_capacity(expanded.len() * values.len());
        for partial in &expanded {
            for value in values {
                next.push(partial.replacen(&token, value, 1));
            }
        }
        expanded = next;
    }

    Ok(expanded)
}

/// Expand `template` and pair each concrete string with its artifact key.
///
/// A template with an undeclared placeholder is logged and contributes
/// nothing. A template without placeholders yields itself.
pub fn expand(template: &str, params: &ParameterTable, key_prefix: &str) -> Vec<(String, String)> {
    match try_expand(template, params) {
        Ok(texts) => texts
            .into_iter()
            .map(|text| {
                let key = derive_key(&text, key_prefix);
                (text, key)
            })
            .collect(),
        Err(err) => {
            log::warn!("Skipping template: {err}");
            Vec::new()
        }
    }
}
