//! Feature assembly: raw record to positional integer vector
//!
//! `assemble` is total over any record shape. Missing, extra, or malformed
//! fields degrade to defaults instead of failing the request; the output
//! length and order always match the schema exactly.

use crate::record::Record;
use crate::schema::{ColumnKind, FeatureSchema};
use crate::vocab::Vocabulary;
use std::collections::BTreeMap;

/// Ordered feature vector matching one schema.
pub type FeatureVector = Vec<i64>;

fn numeric_value(raw: Option<&str>, default: i64) -> i64 {
    raw.map(str::trim)
        .filter(|v| !v.is_empty())
        .and_then(|v| v.parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .map(|v| v.round() as i64)
        .unwrap_or(default)
}

/// Build the exact feature vector a classifier expects.
///
/// For every schema column in order: categorical cells go through the
/// column's vocabulary (with its unknown fallback), numeric cells are
/// parsed directly. A column with no vocabulary encodes to its default.
/// Keys in the record that the schema does not name are ignored.
pub fn assemble(
    record: &Record,
    schema: &FeatureSchema,
    vocabularies: &BTreeMap<String, Vocabulary>,
) -> FeatureVector {
    let mut features = Vec::with_capacity(schema.len());

    for column in schema.columns() {
        let raw = record.get(&column.name);
        let value = match column.kind {
            ColumnKind::Categorical => match vocabularies.get(&column.name) {
                Some(vocab) => vocab.encode(raw),
                None => column.default,
            },
            ColumnKind::Numeric => numeric_value(raw, column.default),
        };
        features.push(value);
    }

    features
}

/// Assemble a whole dataset into a training matrix.
pub fn assemble_matrix(
    records: &[Record],
    schema: &FeatureSchema,
    vocabularies: &BTreeMap<String, Vocabulary>,
) -> Vec<FeatureVector> {
    records
        .iter()
        .map(|record| assemble(record, schema, vocabularies))
        .collect()
}
