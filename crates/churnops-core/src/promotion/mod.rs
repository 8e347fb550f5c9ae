/// Promotion rule: does a freshly trained candidate replace production?
///
/// The candidate must not lose churn recall against the production model and
/// must clear an absolute ROC-AUC floor. Both comparisons are inclusive. The
/// decision is a pure function of the two metric pairs and the policy.
use serde::{Deserialize, Serialize};

use crate::error::{InvalidMetrics, MetricsRole};
use crate::types::{non_finite_as_null, ModelMetrics};

/// Identifier recorded with every decision so audits know which rule produced it.
pub const RULE_VERSION: &str = "recall-non-regression+auc-floor/v1";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromotionPolicy {
    /// Minimum candidate ROC-AUC, inclusive.
    pub min_roc_auc: f64,
}

impl Default for PromotionPolicy {
    fn default() -> Self {
        Self { min_roc_auc: 0.82 }
    }
}

impl PromotionPolicy {
    pub fn validate(&self) -> Vec<String> {
        if (0.0..=1.0).contains(&self.min_roc_auc) {
            Vec::new()
        } else {
            vec![format!("promotion.min_roc_auc must be in [0, 1], got {}", self.min_roc_auc)]
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromotionOutcome {
    Promote,
    Keep,
}

impl std::fmt::Display for PromotionOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PromotionOutcome::Promote => write!(f, "promote"),
            PromotionOutcome::Keep => write!(f, "keep"),
        }
    }
}

/// Why production was kept.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum KeepReason {
    RecallRegressed {
        #[serde(with = "non_finite_as_null")]
        candidate: f64,
        #[serde(with = "non_finite_as_null")]
        current: f64,
    },
    RocAucBelowFloor {
        #[serde(with = "non_finite_as_null")]
        candidate: f64,
        floor: f64,
    },
    InvalidMetrics { error: InvalidMetrics },
}

impl std::fmt::Display for KeepReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeepReason::RecallRegressed { candidate, current } => {
                write!(f, "recall_churn {:.4} < current {:.4}", candidate, current)
            }
            KeepReason::RocAucBelowFloor { candidate, floor } => {
                write!(f, "roc_auc {:.4} < floor {:.2}", candidate, floor)
            }
            KeepReason::InvalidMetrics { error } => write!(f, "invalid metrics: {}", error),
        }
    }
}

/// Outcome of comparing a candidate against production, with its inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromotionDecision {
    pub outcome: PromotionOutcome,
    pub current: ModelMetrics,
    pub candidate: ModelMetrics,
    pub rule_version: String,
    pub min_roc_auc: f64,
    /// Empty exactly when `outcome` is `Promote`.
    pub keep_reasons: Vec<KeepReason>,
}

impl PromotionDecision {
    pub fn is_promote(&self) -> bool {
        self.outcome == PromotionOutcome::Promote
    }
}

/// Both rule conditions. Any NaN operand makes its comparison false.
pub fn rule_holds(current: &ModelMetrics, candidate: &ModelMetrics, min_roc_auc: f64) -> bool {
    candidate.recall_churn >= current.recall_churn && candidate.roc_auc >= min_roc_auc
}

#[derive(Debug, Clone, Default)]
pub struct PromotionDecider {
    policy: PromotionPolicy,
}

impl PromotionDecider {
    pub fn new(policy: PromotionPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &PromotionPolicy {
        &self.policy
    }

    /// Decide Promote or Keep. Malformed metrics are reported instead of compared.
    pub fn decide(
        &self,
        current: &ModelMetrics,
        candidate: &ModelMetrics,
    ) -> std::result::Result<PromotionDecision, InvalidMetrics> {
        current.validate(MetricsRole::Current)?;
        candidate.validate(MetricsRole::Candidate)?;

        let mut keep_reasons = Vec::new();
        if !(candidate.recall_churn >= current.recall_churn) {
            keep_reasons.push(KeepReason::RecallRegressed {
                candidate: candidate.recall_churn,
                current: current.recall_churn,
            });
        }
        if !(candidate.roc_auc >= self.policy.min_roc_auc) {
            keep_reasons.push(KeepReason::RocAucBelowFloor {
                candidate: candidate.roc_auc,
                floor: self.policy.min_roc_auc,
            });
        }

        let outcome = if rule_holds(current, candidate, self.policy.min_roc_auc) {
            PromotionOutcome::Promote
        } else {
            PromotionOutcome::Keep
        };
        debug_assert_eq!(outcome == PromotionOutcome::Promote, keep_reasons.is_empty());

        Ok(self.decision(outcome, current, candidate, keep_reasons))
    }

    /// Like `decide`, but invalid metrics become a logged Keep.
    pub fn decide_fail_closed(&self, current: &ModelMetrics, candidate: &ModelMetrics) -> PromotionDecision {
        match self.decide(current, candidate) {
            Ok(decision) => decision,
            Err(error) => {
                log::warn!("Keeping production model: {}", error);
                self.decision(
                    PromotionOutcome::Keep,
                    current,
                    candidate,
                    vec![KeepReason::InvalidMetrics { error }],
                )
            }
        }
    }

    fn decision(
        &self,
        outcome: PromotionOutcome,
        current: &ModelMetrics,
        candidate: &ModelMetrics,
        keep_reasons: Vec<KeepReason>,
    ) -> PromotionDecision {
        PromotionDecision {
            outcome,
            current: *current,
            candidate: *candidate,
            rule_version: RULE_VERSION.to_string(),
            min_roc_auc: self.policy.min_roc_auc,
            keep_reasons,
        }
    }
}
