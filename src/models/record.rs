//! Record types flowing through the pipeline.
//!
//! K_i: SourceExample → ContrastRecord → NormalizedRecord. Each stage creates
//! a new value; nothing is updated in place.

use super::label::{Label, label_code};
use serde::{Deserialize, Serialize};

/// Labeled (premise, hypothesis) pair from the source corpus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceExample {
    pub premise: String,
    pub hypothesis: String,
    pub label: Label,
}

impl SourceExample {
    pub fn new(premise: impl Into<String>, hypothesis: impl Into<String>, label: Label) -> Self {
        Self {
            premise: premise.into(),
            hypothesis: hypothesis.into(),
            label,
        }
    }
}

/// One perturbed example produced by the generation engine.
///
/// Field order is the on-disk order of the per-transition artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContrastRecord {
    pub premise: String,
    pub original_hypothesis: String,
    pub perturbed_hypothesis: String,
    pub original_label: Label,
    pub new_label: Label,
}

impl ContrastRecord {
    /// Combine a source example with the model's perturbed hypothesis.
    ///
    /// The labels come from the transition, not the example, so every record
    /// of a batch carries the transition's `from`/`to` pair.
    pub fn new(example: &SourceExample, from: Label, to: Label, perturbed: String) -> Self {
        Self {
            premise: example.premise.clone(),
            original_hypothesis: example.hypothesis.clone(),
            perturbed_hypothesis: perturbed,
            original_label: from,
            new_label: to,
        }
    }

    /// Flatten into the training format.
    pub fn normalize(&self) -> NormalizedRecord {
        NormalizedRecord {
            premise: self.premise.clone(),
            hypothesis: self.perturbed_hypothesis.clone(),
            label: self.new_label.code(),
        }
    }
}

/// Training-ready record: one JSON object per JSONL line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    pub premise: String,
    pub hypothesis: String,
    /// Canonical code of the new label, or -1 when the label was unmapped.
    pub label: i64,
}

impl NormalizedRecord {
    /// Build from raw artifact fields, mapping the symbolic label.
    pub fn from_parts(premise: String, hypothesis: String, new_label: &str) -> Self {
        Self {
            premise,
            hypothesis,
            label: label_code(new_label),
        }
    }

    pub fn is_unmapped(&self) -> bool {
        Label::from_code(self.label).is_none()
    }
}

/// Outcome counts for one transition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionStats {
    /// Examples handed to the engine
    pub requested: usize,
    /// Records produced
    pub produced: usize,
    /// Examples dropped because the completion service failed
    pub failed: usize,
    /// Examples dropped because the validation hook rejected the output
    #[serde(default)]
    pub rejected: usize,
}

impl TransitionStats {
    pub fn dropped(&self) -> usize {
        self.failed + self.rejected
    }
}

/// Statistics for a whole generation run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunStats {
    pub transitions: usize,
    pub total_requested: usize,
    pub total_produced: usize,
    pub total_dropped: usize,
    pub runtime_secs: f64,
    /// Records per hour
    pub throughput_per_hour: f64,
    /// Produced / requested (0.0 - 1.0)
    pub success_rate: f64,
}

impl RunStats {
    pub fn record(&mut self, stats: &TransitionStats) {
        self.transitions += 1;
        self.total_requested += stats.requested;
        self.total_produced += stats.produced;
        self.total_dropped += stats.dropped();
    }

    /// Calculate derived stats.
    pub fn finalize(&mut self) {
        if self.total_requested > 0 {
            self.success_rate = self.total_produced as f64 / self.total_requested as f64;
        }
        if self.runtime_secs > 0.0 {
            self.throughput_per_hour = self.total_produced as f64 / self.runtime_secs * 3600.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contrast_record_field_order() {
        let example = SourceExample::new(
            "A man is running.",
            "A man is sleeping.",
            Label::Contradiction,
        );
        let record = ContrastRecord::new(
            &example,
            Label::Contradiction,
            Label::Entailment,
            "A man is moving.".to_string(),
        );
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(
            json,
            r#"{"premise":"A man is running.","original_hypothesis":"A man is sleeping.","perturbed_hypothesis":"A man is moving.","original_label":"contradiction","new_label":"entailment"}"#
        );
    }

    #[test]
    fn test_normalize_scenario() {
        let example = SourceExample::new(
            "A man is running.",
            "A man is sleeping.",
            Label::Contradiction,
        );
        let record = ContrastRecord::new(
            &example,
            Label::Contradiction,
            Label::Entailment,
            "A man is moving.".to_string(),
        );
        let normalized = record.normalize();
        assert_eq!(
            serde_json::to_string(&normalized).unwrap(),
            r#"{"premise":"A man is running.","hypothesis":"A man is moving.","label":0}"#
        );
        assert!(!normalized.is_unmapped());
    }

    #[test]
    fn test_unmapped_label_gets_sentinel() {
        let record = NormalizedRecord::from_parts("p".into(), "h".into(), "entails");
        assert_eq!(record.label, -1);
        assert!(record.is_unmapped());
    }

    #[test]
    fn test_run_stats_finalize() {
        let mut stats = RunStats::default();
        stats.record(&TransitionStats {
            requested: 10,
            produced: 8,
            failed: 1,
            rejected: 1,
        });
        stats.record(&TransitionStats {
            requested: 10,
            produced: 10,
            failed: 0,
            rejected: 0,
        });
        stats.runtime_secs = 3600.0;
        stats.finalize();
        assert_eq!(stats.transitions, 2);
        assert_eq!(stats.total_dropped, 2);
        assert!((stats.success_rate - 0.9).abs() < 1e-9);
        assert!((stats.throughput_per_hour - 18.0).abs() < 1e-9);
    }
}
