//! Atomic artifact sets
//!
//! One training run produces one bundle: feature schema, per-column
//! vocabularies, two classifiers, and their target vocabularies. The
//! bundle is stored as one opaque bincode file per member plus a JSON
//! manifest holding a blake3 hash for each member. The manifest is written
//! last, so a partially written set is indistinguishable from an absent
//! one; loading verifies every hash, so members from different runs never
//! combine into a served set.

use crate::errors::{CoreError, Result};
use crate::forest::ForestModel;
use crate::schema::FeatureSchema;
use crate::vocab::Vocabulary;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

pub const MANIFEST_FILE: &str = "manifest.json";
pub const SCHEMA_FILE: &str = "schema.bin";
pub const ENCODERS_FILE: &str = "encoders.bin";
pub const CONDITION_MODEL_FILE: &str = "condition_model.bin";
pub const CONDITION_LABELS_FILE: &str = "condition_labels.bin";
pub const TREATMENT_MODEL_FILE: &str = "treatment_model.bin";
pub const TREATMENT_LABELS_FILE: &str = "treatment_labels.bin";

const MEMBER_FILES: [&str; 6] = [
    SCHEMA_FILE,
    ENCODERS_FILE,
    CONDITION_MODEL_FILE,
    CONDITION_LABELS_FILE,
    TREATMENT_MODEL_FILE,
    TREATMENT_LABELS_FILE,
];

/// Everything one training run produced, immutable once loaded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArtifactSet {
    pub schema: FeatureSchema,
    pub vocabularies: BTreeMap<String, Vocabulary>,
    pub condition_model: ForestModel,
    pub condition_labels: Vocabulary,
    pub treatment_model: ForestModel,
    pub treatment_labels: Vocabulary,
}

/// Manifest binding the member files of one training run.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Manifest {
    version: String,
    run_id: String,
    created_at: i64,
    /// blake3 hex digest per member file
    members: BTreeMap<String, String>,
}

impl ArtifactSet {
    /// Check the cross-member invariants that make the bundle servable.
    pub fn validate(&self) -> Result<()> {
        for (model, labels, target) in [
            (&self.condition_model, &self.condition_labels, "condition"),
            (&self.treatment_model, &self.treatment_labels, "treatment"),
        ] {
            model
                .validate()
                .map_err(|e| CoreError::ArtifactMismatch(format!("{target} model: {e}")))?;

            if model.feature_count != self.schema.len() {
                return Err(CoreError::ArtifactMismatch(format!(
                    "{target} model expects {} features but schema has {}",
                    model.feature_count,
                    self.schema.len()
                )));
            }
            if model.n_classes as usize != labels.len() {
                return Err(CoreError::ArtifactMismatch(format!(
                    "{target} model has {} classes but its label vocabulary has {}",
                    model.n_classes,
                    labels.len()
                )));
            }
        }

        for column in self.schema.columns() {
            if column.kind == crate::schema::ColumnKind::Categorical
                && !self.vocabularies.contains_key(&column.name)
            {
                return Err(CoreError::ArtifactMismatch(format!(
                    "no vocabulary for categorical column {}",
                    column.name
                )));
            }
        }

        Ok(())
    }

    /// Write the whole set under `dir`. Member files land first (via a
    /// temp-file rename each), the manifest goes last.
    pub fn save(&self, dir: impl AsRef<Path>) -> Result<()> {
        let dir = dir.as_ref();
        self.validate()?;
        fs::create_dir_all(dir)?;

        let mut members = BTreeMap::new();
        let encoded: [(&str, Vec<u8>); 6] = [
            (SCHEMA_FILE, bincode::serialize(&self.schema)?),
            (ENCODERS_FILE, bincode::serialize(&self.vocabularies)?),
            (CONDITION_MODEL_FILE, bincode::serialize(&self.condition_model)?),
            (CONDITION_LABELS_FILE, bincode::serialize(&self.condition_labels)?),
            (TREATMENT_MODEL_FILE, bincode::serialize(&self.treatment_model)?),
            (TREATMENT_LABELS_FILE, bincode::serialize(&self.treatment_labels)?),
        ];

        for (name, bytes) in &encoded {
            write_atomic(dir, name, bytes)?;
            members.insert(
                name.to_string(),
                hex::encode(blake3::hash(bytes).as_bytes()),
            );
        }

        // The run id ties the members together: it hashes their digests in
        // manifest order.
        let mut run_hasher = blake3::Hasher::new();
        for digest in members.values() {
            run_hasher.update(digest.as_bytes());
        }

        let manifest = Manifest {
            version: crate::VERSION.to_string(),
            run_id: hex::encode(run_hasher.finalize().as_bytes()),
            created_at: chrono::Utc::now().timestamp(),
            members,
        };

        let manifest_bytes = serde_json::to_vec_pretty(&manifest)?;
        write_atomic(dir, MANIFEST_FILE, &manifest_bytes)?;

        tracing::info!(run_id = %manifest.run_id, dir = %dir.display(), "artifact set saved");
        Ok(())
    }

    /// Load a complete set from `dir`, or fail without exposing any part
    /// of it. Absent or unreadable members map to `ArtifactMissing`; a
    /// member whose hash disagrees with the manifest maps to
    /// `ArtifactMismatch`.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();

        let manifest_bytes = read_member(dir, MANIFEST_FILE)?;
        let manifest: Manifest = serde_json::from_slice(&manifest_bytes)
            .map_err(|e| CoreError::ArtifactMissing(format!("{MANIFEST_FILE}: {e}")))?;

        let mut raw = BTreeMap::new();
        for name in MEMBER_FILES {
            let bytes = read_member(dir, name)?;

            let expected = manifest.members.get(name).ok_or_else(|| {
                CoreError::ArtifactMismatch(format!("manifest does not list {name}"))
            })?;
            let actual = hex::encode(blake3::hash(&bytes).as_bytes());
            if &actual != expected {
                return Err(CoreError::ArtifactMismatch(format!(
                    "{name} does not match the manifest (different training run?)"
                )));
            }

            raw.insert(name, bytes);
        }

        let set = ArtifactSet {
            schema: decode(&raw, SCHEMA_FILE)?,
            vocabularies: decode(&raw, ENCODERS_FILE)?,
            condition_model: decode(&raw, CONDITION_MODEL_FILE)?,
            condition_labels: decode(&raw, CONDITION_LABELS_FILE)?,
            treatment_model: decode(&raw, TREATMENT_MODEL_FILE)?,
            treatment_labels: decode(&raw, TREATMENT_LABELS_FILE)?,
        };

        set.validate()?;
        tracing::info!(run_id = %manifest.run_id, dir = %dir.display(), "artifact set loaded");
        Ok(set)
    }
}

fn write_atomic(dir: &Path, name: &str, bytes: &[u8]) -> Result<()> {
    let tmp = dir.join(format!("{name}.tmp"));
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, dir.join(name))?;
    Ok(())
}

fn read_member(dir: &Path, name: &str) -> Result<Vec<u8>> {
    fs::read(dir.join(name))
        .map_err(|e| CoreError::ArtifactMissing(format!("{}: {e}", dir.join(name).display())))
}

fn decode<T: DeserializeOwned>(raw: &BTreeMap<&str, Vec<u8>>, name: &str) -> Result<T> {
    bincode::deserialize(&raw[name])
        .map_err(|e| CoreError::ArtifactMismatch(format!("{name}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forest::{ModelMetadata, Node, Tree};
    use crate::schema::SchemaColumn;

    fn leaf_model(class: u32, n_classes: u32, feature_count: usize) -> ForestModel {
        ForestModel {
            trees: vec![Tree {
                nodes: vec![Node {
                    feature_index: 0,
                    threshold: 0,
                    left: 0,
                    right: 0,
                    class: Some(class),
                }],
            }],
            n_classes,
            feature_count,
            metadata: ModelMetadata::default(),
        }
    }

    fn sample_set() -> ArtifactSet {
        let schema = FeatureSchema::new(vec![
            SchemaColumn::numeric("Age"),
            SchemaColumn::categorical("family_history"),
        ]);

        let mut vocabularies = BTreeMap::new();
        vocabularies.insert(
            "family_history".to_string(),
            Vocabulary::fit("family_history", vec![Some("Yes"), Some("No")]),
        );

        ArtifactSet {
            schema,
            vocabularies,
            condition_model: leaf_model(1, 3, 2),
            condition_labels: Vocabulary::fit(
                "condition",
                vec![Some("Anxiety"), Some("Depression"), Some("Stress")],
            ),
            treatment_model: leaf_model(0, 2, 2),
            treatment_labels: Vocabulary::fit("treatment", vec![Some("Yes"), Some("No")]),
        }
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let set = sample_set();

        set.save(dir.path()).unwrap();
        let loaded = ArtifactSet::load(dir.path()).unwrap();
        assert_eq!(loaded, set);
    }

    #[test]
    fn test_missing_member_fails_load() {
        let dir = tempfile::tempdir().unwrap();
        sample_set().save(dir.path()).unwrap();

        fs::remove_file(dir.path().join(TREATMENT_MODEL_FILE)).unwrap();

        assert!(matches!(
            ArtifactSet::load(dir.path()),
            Err(CoreError::ArtifactMissing(_))
        ));
    }

    #[test]
    fn test_missing_manifest_reads_as_not_present() {
        let dir = tempfile::tempdir().unwrap();
        sample_set().save(dir.path()).unwrap();

        fs::remove_file(dir.path().join(MANIFEST_FILE)).unwrap();

        assert!(matches!(
            ArtifactSet::load(dir.path()),
            Err(CoreError::ArtifactMissing(_))
        ));
    }

    #[test]
    fn test_tampered_member_fails_load() {
        let dir = tempfile::tempdir().unwrap();
        sample_set().save(dir.path()).unwrap();

        let path = dir.path().join(CONDITION_LABELS_FILE);
        let mut bytes = fs::read(&path).unwrap();
        bytes.push(0);
        fs::write(&path, bytes).unwrap();

        assert!(matches!(
            ArtifactSet::load(dir.path()),
            Err(CoreError::ArtifactMismatch(_))
        ));
    }

    #[test]
    fn test_member_from_other_run_fails_load() {
        let dir_a = tempfile::tempdir().unwrap();
        let dir_b = tempfile::tempdir().unwrap();

        sample_set().save(dir_a.path()).unwrap();

        let mut other = sample_set();
        other.treatment_model = leaf_model(1, 2, 2);
        other.save(dir_b.path()).unwrap();

        fs::copy(
            dir_b.path().join(TREATMENT_MODEL_FILE),
            dir_a.path().join(TREATMENT_MODEL_FILE),
        )
        .unwrap();

        assert!(matches!(
            ArtifactSet::load(dir_a.path()),
            Err(CoreError::ArtifactMismatch(_))
        ));
    }

    #[test]
    fn test_validate_rejects_label_cardinality_drift() {
        let mut set = sample_set();
        set.treatment_labels =
            Vocabulary::fit("treatment", vec![Some("Yes"), Some("No"), Some("Maybe")]);
        assert!(matches!(
            set.validate(),
            Err(CoreError::ArtifactMismatch(_))
        ));
    }

    #[test]
    fn test_validate_rejects_missing_vocabulary() {
        let mut set = sample_set();
        set.vocabularies.clear();
        assert!(set.validate().is_err());
    }
}
