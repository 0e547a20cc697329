//! Raw survey records at the transport boundary
//!
//! A record is the untrusted, possibly incomplete view of one survey
//! response. It carries raw strings only; encoding happens downstream.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One raw survey response, keyed by column name.
///
/// An absent key and an empty cell both count as a missing value. Extra
/// keys the schema does not know are carried along and ignored by the
/// assembler.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    values: BTreeMap<String, String>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw value for a column. Empty cells are reported as missing.
    pub fn get(&self, column: &str) -> Option<&str> {
        match self.values.get(column) {
            Some(v) if !v.trim().is_empty() => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn set(&mut self, column: impl Into<String>, value: impl Into<String>) {
        self.values.insert(column.into(), value.into());
    }

    pub fn contains(&self, column: &str) -> bool {
        self.values.contains_key(column)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl FromIterator<(String, String)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}
