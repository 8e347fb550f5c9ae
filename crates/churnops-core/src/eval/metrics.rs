/// Classification metrics computed from scored test predictions.
///
/// The trainer is external, but the numbers the promotion rule compares are
/// computed here so every candidate is scored the same way regardless of which
/// tool produced its predictions.
use serde::{Deserialize, Serialize};

use crate::types::{non_finite_as_null, ModelMetrics};

/// One test-set row: the true label and the model's churn probability.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoredSample {
    pub churned: bool,
    pub probability: f64,
}

impl ScoredSample {
    pub fn new(churned: bool, probability: f64) -> Self {
        Self { churned, probability }
    }
}

/// Confusion matrix with churn as the positive class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub true_negative: u64,
    pub false_positive: u64,
    pub false_negative: u64,
    pub true_positive: u64,
}

impl ConfusionMatrix {
    pub fn positives(&self) -> u64 {
        self.true_positive + self.false_negative
    }

    pub fn negatives(&self) -> u64 {
        self.true_negative + self.false_positive
    }

    /// TP / (TP + FN). NaN when the test set has no churners.
    pub fn recall(&self) -> f64 {
        let p = self.positives();
        if p == 0 {
            return f64::NAN;
        }
        self.true_positive as f64 / p as f64
    }

    /// TP / (TP + FP), or 0 when nothing was predicted as churn.
    pub fn precision(&self) -> f64 {
        let predicted = self.true_positive + self.false_positive;
        if predicted == 0 {
            return 0.0;
        }
        self.true_positive as f64 / predicted as f64
    }

    pub fn f1(&self) -> f64 {
        let p = self.precision();
        let r = self.recall();
        if r.is_nan() || p + r == 0.0 {
            return 0.0;
        }
        2.0 * p * r / (p + r)
    }

    /// `[[tn, fp], [fn, tp]]`, the layout scikit-learn reports.
    pub fn as_rows(&self) -> [[u64; 2]; 2] {
        [
            [self.true_negative, self.false_positive],
            [self.false_negative, self.true_positive],
        ]
    }
}

/// Full evaluation of one candidate at the business threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub metrics: ModelMetrics,
    #[serde(with = "non_finite_as_null")]
    pub precision_churn: f64,
    #[serde(with = "non_finite_as_null")]
    pub f1_churn: f64,
    pub confusion: ConfusionMatrix,
    pub threshold: f64,
    pub samples: u64,
}

impl EvaluationReport {
    pub fn summary(&self) -> String {
        format!(
            "ROC-AUC: {:.4} | Recall churn: {:.4} | Precision churn: {:.4} | F1 churn: {:.4} ({} samples, threshold {:.2})",
            self.metrics.roc_auc,
            self.metrics.recall_churn,
            self.precision_churn,
            self.f1_churn,
            self.samples,
            self.threshold,
        )
    }
}

/// Count outcomes with `probability >= threshold` predicted as churn.
pub fn confusion_at(samples: &[ScoredSample], threshold: f64) -> ConfusionMatrix {
    let mut cm = ConfusionMatrix::default();
    for s in samples {
        let predicted = s.probability >= threshold;
        match (s.churned, predicted) {
            (true, true) => cm.true_positive += 1,
            (true, false) => cm.false_negative += 1,
            (false, true) => cm.false_positive += 1,
            (false, false) => cm.true_negative += 1,
        }
    }
    cm
}

/// Area under the ROC curve via the rank-sum statistic.
///
/// Tied scores get their average rank, so a constant scorer yields 0.5.
/// Returns NaN when either class is absent or any probability is NaN.
pub fn roc_auc(samples: &[ScoredSample]) -> f64 {
    let n_pos = samples.iter().filter(|s| s.churned).count();
    let n_neg = samples.len() - n_pos;
    if n_pos == 0 || n_neg == 0 || samples.iter().any(|s| s.probability.is_nan()) {
        return f64::NAN;
    }

    let mut sorted: Vec<&ScoredSample> = samples.iter().collect();
    sorted.sort_by(|a, b| a.probability.total_cmp(&b.probability));

    let mut positive_rank_sum = 0.0f64;
    let mut i = 0;
    while i < sorted.len() {
        let mut j = i;
        while j + 1 < sorted.len() && sorted[j + 1].probability == sorted[i].probability {
            j += 1;
        }
        // Ranks are 1-based; the tie group i..=j shares the mean of its ranks.
        let avg_rank = (i + j) as f64 / 2.0 + 1.0;
        let positives_in_group = sorted[i..=j].iter().filter(|s| s.churned).count();
        positive_rank_sum += avg_rank * positives_in_group as f64;
        i = j + 1;
    }

    let n_pos = n_pos as f64;
    let n_neg = n_neg as f64;
    let u = positive_rank_sum - n_pos * (n_pos + 1.0) / 2.0;
    u / (n_pos * n_neg)
}

/// Compute the report the promotion rule consumes.
pub fn evaluate(samples: &[ScoredSample], threshold: f64) -> EvaluationReport {
    let confusion = confusion_at(samples, threshold);
    EvaluationReport {
        metrics: ModelMetrics::new(roc_auc(samples), confusion.recall()),
        precision_churn: confusion.precision(),
        f1_churn: confusion.f1(),
        confusion,
        threshold,
        samples: samples.len() as u64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(churned: bool, p: f64) -> ScoredSample {
        ScoredSample::new(churned, p)
    }

    #[test]
    fn perfect_separation_is_one() {
        let samples = vec![s(false, 0.1), s(false, 0.2), s(true, 0.8), s(true, 0.9)];
        assert!((roc_auc(&samples) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn reversed_scores_are_zero() {
        let samples = vec![s(true, 0.1), s(true, 0.2), s(false, 0.8), s(false, 0.9)];
        assert!(roc_auc(&samples).abs() < 1e-12);
    }

    #[test]
    fn constant_scores_are_half() {
        let samples = vec![s(true, 0.5), s(false, 0.5), s(true, 0.5), s(false, 0.5)];
        assert!((roc_auc(&samples) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn partial_overlap_matches_pair_count() {
        // Pairs (pos, neg): (0.35,0.1) win, (0.35,0.4) loss, (0.8,0.1) win, (0.8,0.4) win → 3/4.
        let samples = vec![s(false, 0.1), s(true, 0.35), s(false, 0.4), s(true, 0.8)];
        assert!((roc_auc(&samples) - 0.75).abs() < 1e-12);
    }

    #[test]
    fn tie_across_classes_counts_half() {
        // (0.5 pos vs 0.5 neg) tie = 0.5, (0.5 pos vs 0.1 neg) win = 1 → 1.5/2.
        let samples = vec![s(false, 0.1), s(false, 0.5), s(true, 0.5)];
        assert!((roc_auc(&samples) - 0.75).abs() < 1e-12);
    }

    #[test]
    fn single_class_auc_is_nan() {
        assert!(roc_auc(&[s(true, 0.3), s(true, 0.9)]).is_nan());
        assert!(roc_auc(&[]).is_nan());
    }

    #[test]
    fn threshold_is_inclusive() {
        let cm = confusion_at(&[s(true, 0.40), s(false, 0.40), s(true, 0.39)], 0.40);
        assert_eq!(cm.true_positive, 1);
        assert_eq!(cm.false_positive, 1);
        assert_eq!(cm.false_negative, 1);
        assert_eq!(cm.true_negative, 0);
    }

    #[test]
    fn report_combines_metrics() {
        let samples = vec![
            s(false, 0.05),
            s(false, 0.30),
            s(false, 0.45),
            s(true, 0.42),
            s(true, 0.70),
            s(true, 0.20),
        ];
        let report = evaluate(&samples, 0.40);
        assert_eq!(report.samples, 6);
        assert_eq!(report.confusion.as_rows(), [[2, 1], [1, 2]]);
        assert!((report.metrics.recall_churn - 2.0 / 3.0).abs() < 1e-12);
        assert!((report.precision_churn - 2.0 / 3.0).abs() < 1e-12);
        assert!((report.f1_churn - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn no_positives_gives_nan_recall_and_zero_f1() {
        let cm = confusion_at(&[s(false, 0.9), s(false, 0.1)], 0.4);
        assert!(cm.recall().is_nan());
        assert_eq!(cm.precision(), 0.0);
        assert_eq!(cm.f1(), 0.0);
    }
}
