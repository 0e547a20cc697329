//! Per-deployment record normalization
//!
//! One rule table keyed by column name replaces the per-dataset cleanup
//! functions a survey deployment would otherwise hand-roll. Rules are
//! declared in TOML and applied identically during training and serving.

use crate::errors::{CoreError, Result};
use crate::record::Record;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Synonym group collapsing free-text spellings into one canonical value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CanonicalGroup {
    pub canonical: String,
    /// Lowercased spellings that map to `canonical`.
    pub matches: Vec<String>,
}

/// Cleanup rule for a single column.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ColumnRule {
    /// Collapse free text into a small canonical set. Values matching no
    /// group take the fallback.
    Canonicalize {
        groups: Vec<CanonicalGroup>,
        fallback: String,
    },
    /// Coerce to an integer, substituting `default` when the value is
    /// absent, unparsable, or outside the configured bounds.
    Numeric {
        default: i64,
        #[serde(default)]
        min: Option<i64>,
        #[serde(default)]
        max: Option<i64>,
    },
}

impl ColumnRule {
    pub fn is_numeric(&self) -> bool {
        matches!(self, ColumnRule::Numeric { .. })
    }

    fn apply(&self, raw: Option<&str>) -> Option<String> {
        match self {
            ColumnRule::Canonicalize { groups, fallback } => {
                let value = raw?.trim();
                let lowered = value.to_lowercase();
                for group in groups {
                    if group.canonical.eq_ignore_ascii_case(value)
                        || group.matches.iter().any(|m| m == &lowered)
                    {
                        return Some(group.canonical.clone());
                    }
                }
                Some(fallback.clone())
            }
            ColumnRule::Numeric { default, min, max } => {
                let parsed = raw
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .and_then(|v| v.parse::<f64>().ok())
                    .filter(|v| v.is_finite())
                    .map(|v| v.round() as i64);

                let value = match parsed {
                    Some(v) => {
                        let below = min.map(|m| v < m).unwrap_or(false);
                        let above = max.map(|m| v > m).unwrap_or(false);
                        if below || above {
                            *default
                        } else {
                            v
                        }
                    }
                    None => *default,
                };
                Some(value.to_string())
            }
        }
    }
}

/// Rule table for one deployment.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct NormalizationRules {
    rules: BTreeMap<String, ColumnRule>,
}

impl NormalizationRules {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_rule(mut self, column: impl Into<String>, rule: ColumnRule) -> Self {
        self.rules.insert(column.into(), rule);
        self
    }

    pub fn rule_for(&self, column: &str) -> Option<&ColumnRule> {
        self.rules.get(column)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ColumnRule)> {
        self.rules.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Apply every rule to its column in place. A canonicalize rule leaves
    /// an absent column absent; a numeric rule always materializes a value.
    pub fn apply(&self, record: &mut Record) {
        for (column, rule) in &self.rules {
            let raw = record.get(column).map(str::to_string);
            if let Some(cleaned) = rule.apply(raw.as_deref()) {
                record.set(column.clone(), cleaned);
            }
        }
    }

    pub fn from_toml_str(input: &str) -> Result<Self> {
        toml::from_str(input).map_err(|e| CoreError::Serialization(e.to_string()))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Rule set matching the survey dataset this system was built around:
    /// free-text gender collapsed to {Male, Female, Other} and an age
    /// column defaulted to 30 with plausibility bounds.
    pub fn survey_defaults() -> Self {
        let male = CanonicalGroup {
            canonical: "Male".to_string(),
            matches: [
                "male",
                "m",
                "male-ish",
                "maile",
                "cis male",
                "mal",
                "male (cis)",
                "make",
                "man",
                "msle",
                "mail",
                "malr",
                "cis man",
                "guy (-ish) ^_^",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        };
        let female = CanonicalGroup {
            canonical: "Female".to_string(),
            matches: [
                "female",
                "f",
                "woman",
                "femake",
                "cis-female/femme",
                "female (cis)",
                "femail",
                "cis female",
                "trans-female",
                "trans woman",
                "female (trans)",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        };

        Self::empty()
            .with_rule(
                "Gender",
                ColumnRule::Canonicalize {
                    groups: vec![male, female],
                    fallback: "Other".to_string(),
                },
            )
            .with_rule(
                "Age",
                ColumnRule::Numeric {
                    default: 30,
                    min: Some(18),
                    max: Some(100),
                },
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gender_spellings_collapse() {
        let rules = NormalizationRules::survey_defaults();

        for raw in ["male", "M", "Cis Male", "msle", "guy (-ish) ^_^"] {
            let mut record = Record::new();
            record.set("Gender", raw);
            rules.apply(&mut record);
            assert_eq!(record.get("Gender"), Some("Male"), "raw {raw:?}");
        }

        let mut record = Record::new();
        record.set("Gender", "Trans Woman");
        rules.apply(&mut record);
        assert_eq!(record.get("Gender"), Some("Female"));

        let mut record = Record::new();
        record.set("Gender", "nonbinary");
        rules.apply(&mut record);
        assert_eq!(record.get("Gender"), Some("Other"));
    }

    #[test]
    fn test_absent_column_stays_absent_for_canonicalize() {
        let rules = NormalizationRules::survey_defaults();
        let mut record = Record::new();
        rules.apply(&mut record);
        assert_eq!(record.get("Gender"), None);
    }

    #[test]
    fn test_non_numeric_age_takes_default() {
        let rules = NormalizationRules::survey_defaults();

        let mut record = Record::new();
        record.set("Age", "thirty");
        rules.apply(&mut record);
        assert_eq!(record.get("Age"), Some("30"));
    }

    #[test]
    fn test_absent_age_takes_default() {
        let rules = NormalizationRules::survey_defaults();
        let mut record = Record::new();
        rules.apply(&mut record);
        assert_eq!(record.get("Age"), Some("30"));
    }

    #[test]
    fn test_out_of_bounds_age_takes_default() {
        let rules = NormalizationRules::survey_defaults();

        for raw in ["8", "250", "-3"] {
            let mut record = Record::new();
            record.set("Age", raw);
            rules.apply(&mut record);
            assert_eq!(record.get("Age"), Some("30"), "raw {raw:?}");
        }
    }

    #[test]
    fn test_valid_age_passes_through_rounded() {
        let rules = NormalizationRules::survey_defaults();

        let mut record = Record::new();
        record.set("Age", "29.6");
        rules.apply(&mut record);
        assert_eq!(record.get("Age"), Some("30"));

        let mut record = Record::new();
        record.set("Age", "29");
        rules.apply(&mut record);
        assert_eq!(record.get("Age"), Some("29"));
    }

    #[test]
    fn test_toml_round_trip() {
        let toml_src = r#"
[Gender]
kind = "canonicalize"
fallback = "Other"

[[Gender.groups]]
canonical = "Male"
matches = ["male", "m"]

[Age]
kind = "numeric"
default = 30
min = 18
max = 100
"#;
        let rules = NormalizationRules::from_toml_str(toml_src).unwrap();
        assert!(rules.rule_for("Gender").is_some());
        assert!(rules.rule_for("Age").map(ColumnRule::is_numeric).unwrap());

        let mut record = Record::new();
        record.set("Gender", "M");
        rules.apply(&mut record);
        assert_eq!(record.get("Gender"), Some("Male"));
    }

    #[test]
    fn test_apply_is_idempotent() {
        let rules = NormalizationRules::survey_defaults();
        let mut record = Record::new();
        record.set("Gender", "femail");
        record.set("Age", "thirty");

        rules.apply(&mut record);
        let once = record.clone();
        rules.apply(&mut record);
        assert_eq!(record, once);
    }
}
