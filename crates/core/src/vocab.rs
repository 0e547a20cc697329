//! Per-column vocabularies mapping raw strings to dense integer codes
//!
//! A vocabulary is fit once during training and read-only afterwards.
//! Codes are a dense range [0, cardinality) assigned in sorted order of the
//! distinct normalized values, so two fits over the same data always agree.

use crate::errors::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Literal that missing and unseen values normalize to.
pub const UNKNOWN: &str = "Unknown";

/// Bijection between a column's known raw values and dense integer codes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Vocabulary {
    column: String,
    /// Known values in sorted order; a value's code is its position.
    values: Vec<String>,
    /// Reverse mapping from value to code.
    index: HashMap<String, i64>,
}

/// Normalize one raw cell: absent and blank cells become the literal
/// "Unknown", everything else is trimmed.
pub fn normalize_cell(raw: Option<&str>) -> &str {
    match raw {
        Some(v) if !v.trim().is_empty() => v.trim(),
        _ => UNKNOWN,
    }
}

impl Vocabulary {
    /// Fit a vocabulary over a column's training cells.
    ///
    /// Every distinct normalized value gets a code. "Unknown" enters the
    /// known set only when the training data actually contains a missing
    /// cell, so serving-time fallback behavior mirrors what training saw.
    pub fn fit<'a, I>(column: impl Into<String>, cells: I) -> Self
    where
        I: IntoIterator<Item = Option<&'a str>>,
    {
        let mut distinct = BTreeSet::new();
        for cell in cells {
            distinct.insert(normalize_cell(cell).to_string());
        }

        let values: Vec<String> = distinct.into_iter().collect();
        let index = values
            .iter()
            .enumerate()
            .map(|(code, value)| (value.clone(), code as i64))
            .collect();

        Self {
            column: column.into(),
            values,
            index,
        }
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    /// Number of known values (codes occupy [0, len)).
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn contains(&self, value: &str) -> bool {
        self.index.contains_key(value)
    }

    /// Code for a known value, if any.
    pub fn code_of(&self, value: &str) -> Option<i64> {
        self.index.get(value).copied()
    }

    /// Known values in code order.
    pub fn values(&self) -> &[String] {
        &self.values
    }

    /// Encode one raw cell. Total over any input:
    /// known value -> its code; unseen value -> the "Unknown" code when the
    /// training data produced one; otherwise code 0, silently aliasing the
    /// value to whatever label holds code 0.
    pub fn encode(&self, raw: Option<&str>) -> i64 {
        let value = normalize_cell(raw);

        if let Some(code) = self.code_of(value) {
            return code;
        }
        if let Some(code) = self.code_of(UNKNOWN) {
            return code;
        }
        0
    }

    /// Decode a code back to its raw value. A code outside the dense range
    /// signals artifact corruption and is a hard error.
    pub fn decode(&self, code: i64) -> Result<&str> {
        if code < 0 || code as usize >= self.values.len() {
            return Err(CoreError::InvalidCode {
                column: self.column.clone(),
                code,
                cardinality: self.values.len(),
            });
        }
        Ok(&self.values[code as usize])
    }
}
