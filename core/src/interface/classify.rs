use crate::interface::persist::FeatureRecord;
use crate::prelude::{FeatureError, FeatureResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Probability at or above which a candidate is labelled astrophysical.
pub const DECISION_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub candidate_id: String,
    pub probability: f64,
    pub label: u8,
}

impl Classification {
    pub fn from_probability(candidate_id: impl Into<String>, probability: f64) -> FeatureResult<Self> {
        if !(0.0..=1.0).contains(&probability) {
            return Err(FeatureError::configuration(
                "probability",
                format!("{} is outside [0, 1]", probability),
            ));
        }
        Ok(Self {
            candidate_id: candidate_id.into(),
            probability,
            label: u8::from(probability >= DECISION_THRESHOLD),
        })
    }

    pub fn is_positive(&self) -> bool {
        self.label == 1
    }
}

/// Scores a persisted feature file.
pub trait Classifier {
    fn name(&self) -> &str;

    fn score(&self, record: &FeatureRecord) -> FeatureResult<f64>;

    fn classify(&self, path: &Path) -> FeatureResult<Classification> {
        let record = FeatureRecord::load(path)?;
        let probability = self.score(&record)?;
        log::debug!("{}: {} -> p={:.3}", self.name(), record.id, probability);
        Classification::from_probability(record.id, probability)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_follows_threshold() {
        assert_eq!(Classification::from_probability("a", 0.5).unwrap().label, 1);
        assert_eq!(Classification::from_probability("a", 0.49).unwrap().label, 0);
        assert!(Classification::from_probability("a", 1.0).unwrap().is_positive());
        assert!(!Classification::from_probability("a", 0.0).unwrap().is_positive());
    }

    #[test]
    fn probability_outside_unit_interval_is_rejected() {
        for p in [-0.1, 1.5, f64::NAN] {
            assert!(matches!(
                Classification::from_probability("a", p),
                Err(FeatureError::Configuration { .. })
            ));
        }
    }

    struct Fixed(f64);

    impl Classifier for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        fn score(&self, _record: &FeatureRecord) -> FeatureResult<f64> {
            Ok(self.0)
        }
    }

    #[test]
    fn missing_feature_file_is_a_persist_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = Fixed(0.9).classify(&dir.path().join("absent.json"));
        assert!(matches!(result, Err(FeatureError::Persist(_))));
    }
}
