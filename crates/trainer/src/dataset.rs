//! CSV survey dataset loading and preprocessing
//!
//! Reads a labeled survey CSV (header row, string cells, two target
//! columns) and provides deterministic shuffling and splitting.

use anyhow::{Context, Result};
use std::path::Path;
use triage_core::Record;

/// Labeled training dataset: raw records plus both target columns.
#[derive(Clone, Debug)]
pub struct SurveyDataset {
    pub records: Vec<Record>,
    pub conditions: Vec<String>,
    pub treatments: Vec<String>,
    /// Feature columns in file order (targets excluded)
    pub feature_columns: Vec<String>,
}

/// Parse one CSV line into trimmed cells, stripping surrounding quotes.
fn parse_line(line: &str) -> Vec<String> {
    line.split(',')
        .map(|cell| {
            let cell = cell.trim();
            cell.strip_prefix('"')
                .and_then(|c| c.strip_suffix('"'))
                .unwrap_or(cell)
                .to_string()
        })
        .collect()
}

/// Read a header-addressed CSV into raw records. Blank cells stay in the
/// record as empty strings and read back as missing.
pub fn read_records_csv<P: AsRef<Path>>(path: P) -> Result<(Vec<String>, Vec<Record>)> {
    let content = std::fs::read_to_string(path.as_ref())
        .with_context(|| format!("Failed to read CSV file {}", path.as_ref().display()))?;

    let mut lines = content.lines().enumerate().filter(|(_, line)| {
        let line = line.trim();
        !line.is_empty() && !line.starts_with('#')
    });

    let (_, header_line) = lines.next().context("CSV file has no header row")?;
    let header = parse_line(header_line);

    let mut records = Vec::new();
    for (line_idx, line) in lines {
        let cells = parse_line(line);
        if cells.len() != header.len() {
            anyhow::bail!(
                "Line {}: expected {} cells, got {}",
                line_idx + 1,
                header.len(),
                cells.len()
            );
        }

        let record: Record = header.iter().cloned().zip(cells).collect();
        records.push(record);
    }

    Ok((header, records))
}

impl SurveyDataset {
    /// Load a labeled dataset. Every column except the two targets is a
    /// feature column; every row must carry both labels.
    pub fn from_csv<P: AsRef<Path>>(
        path: P,
        condition_column: &str,
        treatment_column: &str,
    ) -> Result<Self> {
        let (header, records) = read_records_csv(path)?;

        for target in [condition_column, treatment_column] {
            if !header.iter().any(|c| c == target) {
                anyhow::bail!("Target column {target:?} not found in CSV header");
            }
        }

        let feature_columns: Vec<String> = header
            .iter()
            .filter(|c| c.as_str() != condition_column && c.as_str() != treatment_column)
            .cloned()
            .collect();

        let mut conditions = Vec::with_capacity(records.len());
        let mut treatments = Vec::with_capacity(records.len());

        for (row_idx, record) in records.iter().enumerate() {
            let condition = record
                .get(condition_column)
                .with_context(|| format!("Row {}: missing {condition_column} label", row_idx + 1))?;
            let treatment = record
                .get(treatment_column)
                .with_context(|| format!("Row {}: missing {treatment_column} label", row_idx + 1))?;
            conditions.push(condition.to_string());
            treatments.push(treatment.to_string());
        }

        if records.is_empty() {
            anyhow::bail!("Dataset is empty");
        }

        Ok(Self {
            records,
            conditions,
            treatments,
            feature_columns,
        })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Deterministically shuffle rows using a seeded content hash.
    pub fn shuffle(&mut self, seed: i64) {
        let n = self.records.len();

        let mut order: Vec<(u64, usize)> = (0..n)
            .map(|i| (row_key(&self.records[i], i, seed), i))
            .collect();
        order.sort();

        let mut records = Vec::with_capacity(n);
        let mut conditions = Vec::with_capacity(n);
        let mut treatments = Vec::with_capacity(n);

        for (_, idx) in order {
            records.push(self.records[idx].clone());
            conditions.push(self.conditions[idx].clone());
            treatments.push(self.treatments[idx].clone());
        }

        self.records = records;
        self.conditions = conditions;
        self.treatments = treatments;
    }

    /// Split off the last `test_percent` percent of rows as a test set.
    pub fn split(&self, test_percent: u32) -> (SurveyDataset, SurveyDataset) {
        let n = self.records.len();
        let test_len = (n * test_percent.min(100) as usize) / 100;
        let train_len = n - test_len;

        let take = |range: std::ops::Range<usize>| SurveyDataset {
            records: self.records[range.clone()].to_vec(),
            conditions: self.conditions[range.clone()].to_vec(),
            treatments: self.treatments[range.clone()].to_vec(),
            feature_columns: self.feature_columns.clone(),
        };

        (take(0..train_len), take(train_len..n))
    }
}

/// Seeded order key for one row. Hashes the seed, the row position, and
/// every cell so equal rows still order stably.
fn row_key(record: &Record, index: usize, seed: i64) -> u64 {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&seed.to_le_bytes());
    hasher.update(&(index as u64).to_le_bytes());
    for (column, value) in record.iter() {
        hasher.update(column.as_bytes());
        hasher.update(&[0]);
        hasher.update(value.as_bytes());
        hasher.update(&[0]);
    }

    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&hasher.finalize().as_bytes()[..8]);
    u64::from_le_bytes(bytes)
}
