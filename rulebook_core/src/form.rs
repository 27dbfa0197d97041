//! Form boundary: block-shaped editable values and their string encoding.
//!
//! Every form field is a string so it can be bound straight to a text
//! control. Parsing back never fails: blank or unparseable input is unset.

use crate::exercises::ExerciseLookup;
use crate::ExerciseSummary;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Parse an integer field. Blank, fractional or non-numeric input is unset.
pub fn parse_int(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(value) = trimmed.parse::<i64>() {
        return Some(value);
    }
    // "60.0" is still an integer
    match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() && value.fract() == 0.0 && value.abs() < 9.0e15 => {
            Some(value as i64)
        }
        _ => None,
    }
}

/// Parse a decimal field. Blank, non-numeric or non-finite input is unset.
pub fn parse_num(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|value| value.is_finite())
}

/// Parse a text field. Whitespace-only input is unset; anything else is kept as typed.
pub fn parse_text(raw: &str) -> Option<String> {
    if raw.trim().is_empty() {
        None
    } else {
        Some(raw.to_string())
    }
}

/// Editable value of one block.
///
/// `fields` holds block-level values, `entries` holds one map per row for
/// list-shaped blocks (giant sets, circuits). `exercises` carries resolved
/// exercise metadata for display and takes part in equality like any other
/// content.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FormValue {
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entries: Vec<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub exercises: BTreeMap<String, ExerciseSummary>,
}

impl FormValue {
    /// Build a form from block-level `(key, value)` pairs
    pub fn from_pairs(pairs: &[(&str, &str)]) -> Self {
        FormValue {
            fields: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            ..Default::default()
        }
    }

    /// Append an entry built from `(key, value)` pairs
    pub fn with_entry(mut self, pairs: &[(&str, &str)]) -> Self {
        self.entries.push(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        );
        self
    }

    /// Block-level value; missing keys read as empty
    pub fn field(&self, key: &str) -> &str {
        self.fields.get(key).map(String::as_str).unwrap_or("")
    }

    pub fn set_field(&mut self, key: &str, value: impl Into<String>) {
        self.fields.insert(key.to_string(), value.into());
    }

    /// Value of `key` in entry `index`; missing entries or keys read as empty
    pub fn entry_field(&self, index: usize, key: &str) -> &str {
        self.entries
            .get(index)
            .and_then(|entry| entry.get(key))
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Set `key` in entry `index`, growing the entry list if needed
    pub fn set_entry_field(&mut self, index: usize, key: &str, value: impl Into<String>) {
        if self.entries.len() <= index {
            self.entries.resize_with(index + 1, BTreeMap::new);
        }
        self.entries[index].insert(key.to_string(), value.into());
    }

    /// Every exercise id referenced by the form, in field order
    pub fn exercise_ids(&self) -> Vec<&str> {
        let block_level = self
            .fields
            .iter()
            .filter(|(key, _)| key.ends_with("exercise_id"));
        let per_entry = self
            .entries
            .iter()
            .flat_map(|entry| entry.iter())
            .filter(|(key, _)| key.ends_with("exercise_id"));

        block_level
            .chain(per_entry)
            .map(|(_, id)| id.trim())
            .filter(|id| !id.is_empty())
            .collect()
    }

    /// Rebuild the exercise metadata from the ids currently in the form.
    ///
    /// Unknown ids are simply left unresolved.
    pub fn resolve_exercises(&mut self, lookup: &dyn ExerciseLookup) {
        let resolved: BTreeMap<String, ExerciseSummary> = self
            .exercise_ids()
            .into_iter()
            .filter_map(|id| lookup.lookup(id).map(|summary| (id.to_string(), summary)))
            .collect();
        self.exercises = resolved;
    }
}
