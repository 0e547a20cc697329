//! Ordered feature schema shared by training and serving
//!
//! The schema pins the exact positional layout a classifier expects.
//! Training and serving must agree on membership and order; the only
//! tolerated difference is a column declared optional-with-default.

use crate::errors::{CoreError, Result};
use serde::{Deserialize, Serialize};

/// How a column's raw value turns into a feature.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ColumnKind {
    /// Encoded through the column's vocabulary.
    Categorical,
    /// Parsed integer used directly.
    Numeric,
}

/// One position in the feature layout.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SchemaColumn {
    pub name: String,
    pub kind: ColumnKind,
    /// Optional columns may be absent from a serving-time schema override;
    /// their value then comes from `default`.
    #[serde(default)]
    pub optional: bool,
    /// Feature value substituted when an optional column is not served.
    #[serde(default)]
    pub default: i64,
}

impl SchemaColumn {
    pub fn categorical(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ColumnKind::Categorical,
            optional: false,
            default: 0,
        }
    }

    pub fn numeric(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ColumnKind::Numeric,
            optional: false,
            default: 0,
        }
    }

    pub fn optional_with_default(mut self, default: i64) -> Self {
        self.optional = true;
        self.default = default;
        self
    }
}

/// The ordered sequence of columns a classifier expects.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeatureSchema {
    columns: Vec<SchemaColumn>,
}

impl FeatureSchema {
    pub fn new(columns: Vec<SchemaColumn>) -> Self {
        Self { columns }
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn columns(&self) -> &[SchemaColumn] {
        &self.columns
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn column(&self, name: &str) -> Option<&SchemaColumn> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Check a serving-time schema (e.g. a migration override) against this
    /// trained schema. Membership and order must match exactly; the served
    /// schema may only skip columns declared optional. Any other
    /// discrepancy is a hard error, never a silent reorder.
    pub fn ensure_compatible(&self, served: &FeatureSchema) -> Result<()> {
        let mut served_iter = served.columns.iter().peekable();

        for trained in &self.columns {
            match served_iter.peek() {
                Some(col) if col.name == trained.name => {
                    if col.kind != trained.kind {
                        return Err(CoreError::SchemaMismatch(format!(
                            "column {} changed kind between training and serving",
                            trained.name
                        )));
                    }
                    served_iter.next();
                }
                _ if trained.optional => continue,
                Some(col) => {
                    return Err(CoreError::SchemaMismatch(format!(
                        "expected column {} but serving schema has {}",
                        trained.name, col.name
                    )));
                }
                None => {
                    return Err(CoreError::SchemaMismatch(format!(
                        "serving schema is missing required column {}",
                        trained.name
                    )));
                }
            }
        }

        if let Some(extra) = served_iter.next() {
            return Err(CoreError::SchemaMismatch(format!(
                "serving schema has unexpected column {}",
                extra.name
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trained() -> FeatureSchema {
        FeatureSchema::new(vec![
            SchemaColumn::numeric("Age"),
            SchemaColumn::categorical("Gender"),
            SchemaColumn::categorical("MoodSwings").optional_with_default(1),
            SchemaColumn::categorical("family_history"),
        ])
    }

    #[test]
    fn test_identical_schema_is_compatible() {
        let schema = trained();
        assert!(schema.ensure_compatible(&schema).is_ok());
    }

    #[test]
    fn test_optional_column_may_be_skipped() {
        let served = FeatureSchema::new(vec![
            SchemaColumn::numeric("Age"),
            SchemaColumn::categorical("Gender"),
            SchemaColumn::categorical("family_history"),
        ]);
        assert!(trained().ensure_compatible(&served).is_ok());
    }

    #[test]
    fn test_missing_required_column_fails() {
        let served = FeatureSchema::new(vec![
            SchemaColumn::numeric("Age"),
            SchemaColumn::categorical("family_history"),
        ]);
        assert!(matches!(
            trained().ensure_compatible(&served),
            Err(CoreError::SchemaMismatch(_))
        ));
    }

    #[test]
    fn test_reordered_schema_fails() {
        let served = FeatureSchema::new(vec![
            SchemaColumn::categorical("Gender"),
            SchemaColumn::numeric("Age"),
            SchemaColumn::categorical("MoodSwings"),
            SchemaColumn::categorical("family_history"),
        ]);
        assert!(trained().ensure_compatible(&served).is_err());
    }

    #[test]
    fn test_extra_column_fails() {
        let served = FeatureSchema::new(vec![
            SchemaColumn::numeric("Age"),
            SchemaColumn::categorical("Gender"),
            SchemaColumn::categorical("MoodSwings"),
            SchemaColumn::categorical("family_history"),
            SchemaColumn::categorical("Country"),
        ]);
        assert!(trained().ensure_compatible(&served).is_err());
    }

    #[test]
    fn test_kind_change_fails() {
        let served = FeatureSchema::new(vec![
            SchemaColumn::categorical("Age"),
            SchemaColumn::categorical("Gender"),
            SchemaColumn::categorical("MoodSwings"),
            SchemaColumn::categorical("family_history"),
        ]);
        assert!(trained().ensure_compatible(&served).is_err());
    }
}
