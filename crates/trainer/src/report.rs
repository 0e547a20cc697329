//! Evaluation reports for operator review
//!
//! Accuracy plus per-class precision and recall, kept in per-mille
//! integers so reports are identical across platforms. Advisory only; the
//! pipeline never gates on these numbers.

use serde::{Deserialize, Serialize};
use std::fmt;
use triage_core::Vocabulary;

fn permille(numerator: usize, denominator: usize) -> u32 {
    if denominator == 0 {
        0
    } else {
        (numerator * 1000 / denominator) as u32
    }
}

fn fmt_permille(value: u32) -> String {
    format!("{}.{:03}", value / 1000, value % 1000)
}

/// Per-class confusion counts and derived rates
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClassReport {
    pub label: String,
    pub support: usize,
    pub true_positives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
    pub precision_permille: u32,
    pub recall_permille: u32,
}

/// Evaluation of one target on a held-out split
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EvaluationReport {
    pub target: String,
    pub total: usize,
    pub correct: usize,
    pub accuracy_permille: u32,
    pub classes: Vec<ClassReport>,
}

/// Compare predictions against truth, both as label ids of `labels`.
pub fn evaluate(
    target: &str,
    predictions: &[u32],
    truth: &[u32],
    labels: &Vocabulary,
) -> EvaluationReport {
    assert_eq!(predictions.len(), truth.len());

    let n_classes = labels.len();
    let mut tp = vec![0usize; n_classes];
    let mut fp = vec![0usize; n_classes];
    let mut fn_ = vec![0usize; n_classes];
    let mut correct = 0usize;

    for (&pred, &actual) in predictions.iter().zip(truth) {
        let pred = pred as usize;
        let actual = actual as usize;
        if pred == actual {
            correct += 1;
            if pred < n_classes {
                tp[pred] += 1;
            }
        } else {
            if pred < n_classes {
                fp[pred] += 1;
            }
            if actual < n_classes {
                fn_[actual] += 1;
            }
        }
    }

    let classes = (0..n_classes)
        .map(|class| ClassReport {
            label: labels.values()[class].clone(),
            support: tp[class] + fn_[class],
            true_positives: tp[class],
            false_positives: fp[class],
            false_negatives: fn_[class],
            precision_permille: permille(tp[class], tp[class] + fp[class]),
            recall_permille: permille(tp[class], tp[class] + fn_[class]),
        })
        .collect();

    EvaluationReport {
        target: target.to_string(),
        total: truth.len(),
        correct,
        accuracy_permille: permille(correct, truth.len()),
        classes,
    }
}

impl fmt::Display for EvaluationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{}: accuracy {} ({}/{})",
            self.target,
            fmt_permille(self.accuracy_permille),
            self.correct,
            self.total
        )?;
        writeln!(
            f,
            "  {:<24} {:>8} {:>10} {:>8}",
            "class", "support", "precision", "recall"
        )?;
        for class in &self.classes {
            writeln!(
                f,
                "  {:<24} {:>8} {:>10} {:>8}",
                class.label,
                class.support,
                fmt_permille(class.precision_permille),
                fmt_permille(class.recall_permille)
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels() -> Vocabulary {
        Vocabulary::fit("condition", vec![Some("Anxiety"), Some("Stress")])
    }

    #[test]
    fn test_perfect_predictions() {
        let truth = vec![0, 1, 0, 1];
        let report = evaluate("condition", &truth, &truth, &labels());

        assert_eq!(report.accuracy_permille, 1000);
        assert_eq!(report.correct, 4);
        for class in &report.classes {
            assert_eq!(class.precision_permille, 1000);
            assert_eq!(class.recall_permille, 1000);
        }
    }

    #[test]
    fn test_confusion_counts() {
        // truth:       0 0 1 1
        // predictions: 0 1 1 0
        let report = evaluate("condition", &[0, 1, 1, 0], &[0, 0, 1, 1], &labels());

        assert_eq!(report.accuracy_permille, 500);

        let anxiety = &report.classes[0];
        assert_eq!(anxiety.support, 2);
        assert_eq!(anxiety.true_positives, 1);
        assert_eq!(anxiety.false_positives, 1);
        assert_eq!(anxiety.false_negatives, 1);
        assert_eq!(anxiety.precision_permille, 500);
        assert_eq!(anxiety.recall_permille, 500);
    }

    #[test]
    fn test_absent_class_reports_zero() {
        let report = evaluate("condition", &[0, 0], &[0, 0], &labels());
        let stress = &report.classes[1];
        assert_eq!(stress.support, 0);
        assert_eq!(stress.precision_permille, 0);
        assert_eq!(stress.recall_permille, 0);
    }

    #[test]
    fn test_display_renders_all_classes() {
        let report = evaluate("condition", &[0, 1], &[0, 1], &labels());
        let text = report.to_string();
        assert!(text.contains("Anxiety"));
        assert!(text.contains("Stress"));
        assert!(text.contains("accuracy 1.000"));
    }
}
