use serde::{Deserialize, Serialize};
use std::path::Path;

/// Probability at or above which a customer is flagged as churning.
pub const DEFAULT_BUSINESS_THRESHOLD: f64 = 0.40;

/// Business thresholds shared by evaluation and the serving layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Churn decision threshold. Recall is measured at this cut-off.
    pub business_threshold: f64,
    /// Probability at or above which a customer is labelled high risk.
    pub high_risk_threshold: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            business_threshold: DEFAULT_BUSINESS_THRESHOLD,
            high_risk_threshold: 0.70,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    High,
    Medium,
    Low,
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskLevel::High => write!(f, "High"),
            RiskLevel::Medium => write!(f, "Medium"),
            RiskLevel::Low => write!(f, "Low"),
        }
    }
}

#[derive(Deserialize)]
struct ThresholdFile {
    threshold: f64,
}

impl ScoringConfig {
    pub fn risk_level(&self, probability: f64) -> RiskLevel {
        if probability >= self.high_risk_threshold {
            RiskLevel::High
        } else if probability >= self.business_threshold {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    /// Override the business threshold from a tuned `{"threshold": f}` file.
    ///
    /// A missing or unreadable file keeps the configured value.
    pub fn with_threshold_file(mut self, path: &Path) -> Self {
        if !path.exists() {
            return self;
        }
        let parsed = std::fs::read_to_string(path)
            .map_err(|e| e.to_string())
            .and_then(|s| serde_json::from_str::<ThresholdFile>(&s).map_err(|e| e.to_string()));
        match parsed {
            Ok(file) if (0.0..=1.0).contains(&file.threshold) => {
                self.business_threshold = file.threshold;
            }
            Ok(file) => {
                log::warn!(
                    "Ignoring threshold {} from {:?}: outside [0, 1]",
                    file.threshold,
                    path
                );
            }
            Err(e) => log::warn!("Failed to read threshold file {:?}: {}", path, e),
        }
        self
    }

    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if !(0.0..=1.0).contains(&self.business_threshold) {
            errors.push(format!(
                "scoring.business_threshold must be in [0, 1], got {}",
                self.business_threshold
            ));
        }
        if !(0.0..=1.0).contains(&self.high_risk_threshold) {
            errors.push(format!(
                "scoring.high_risk_threshold must be in [0, 1], got {}",
                self.high_risk_threshold
            ));
        }
        if self.high_risk_threshold < self.business_threshold {
            errors.push("scoring.high_risk_threshold must not be below business_threshold".into());
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn risk_bands() {
        let cfg = ScoringConfig::default();
        assert_eq!(cfg.risk_level(0.70), RiskLevel::High);
        assert_eq!(cfg.risk_level(0.40), RiskLevel::Medium);
        assert_eq!(cfg.risk_level(0.39), RiskLevel::Low);
    }

    #[test]
    fn threshold_file_overrides_default() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("threshold.json");
        std::fs::write(&path, r#"{"threshold": 0.35}"#).unwrap();
        let cfg = ScoringConfig::default().with_threshold_file(&path);
        assert_eq!(cfg.business_threshold, 0.35);
    }

    #[test]
    fn missing_or_bad_threshold_file_keeps_default() {
        let dir = TempDir::new().unwrap();
        let missing = ScoringConfig::default().with_threshold_file(&dir.path().join("nope.json"));
        assert_eq!(missing.business_threshold, DEFAULT_BUSINESS_THRESHOLD);

        let bad = dir.path().join("threshold.json");
        std::fs::write(&bad, r#"{"threshold": 3.0}"#).unwrap();
        let cfg = ScoringConfig::default().with_threshold_file(&bad);
        assert_eq!(cfg.business_threshold, DEFAULT_BUSINESS_THRESHOLD);
    }

    #[test]
    fn validate_flags_inverted_bands() {
        let cfg = ScoringConfig { business_threshold: 0.8, high_risk_threshold: 0.7 };
        assert_eq!(cfg.validate().len(), 1);
    }
}
