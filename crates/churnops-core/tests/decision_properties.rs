use churnops_core::{
    PromotionDecider, PromotionOutcome, RetrainingSignals, RetrainingTrigger, TriggerEvaluator,
    ModelMetrics,
};
use proptest::prelude::*;

const MIN_AUC: f64 = 0.82;
const RECALL_FLOOR: f64 = 0.70;

fn unit() -> impl Strategy<Value = f64> {
    0.0f64..=1.0
}

proptest! {
    #[test]
    fn promote_iff_both_conditions_hold(
        cur_auc in unit(), cur_recall in unit(), cand_auc in unit(), cand_recall in unit()
    ) {
        let current = ModelMetrics::new(cur_auc, cur_recall);
        let candidate = ModelMetrics::new(cand_auc, cand_recall);
        let decision = PromotionDecider::default().decide(&current, &candidate).unwrap();

        let expected = cand_recall >= cur_recall && cand_auc >= MIN_AUC;
        prop_assert_eq!(decision.outcome == PromotionOutcome::Promote, expected);
        prop_assert_eq!(decision.keep_reasons.is_empty(), expected);
    }

    #[test]
    fn equal_recall_at_floor_always_promotes(recall in unit()) {
        let current = ModelMetrics::new(0.95, recall);
        let candidate = ModelMetrics::new(MIN_AUC, recall);
        let decision = PromotionDecider::default().decide(&current, &candidate).unwrap();
        prop_assert_eq!(decision.outcome, PromotionOutcome::Promote);
    }

    #[test]
    fn decide_is_deterministic(
        cur_auc in unit(), cur_recall in unit(), cand_auc in unit(), cand_recall in unit()
    ) {
        let decider = PromotionDecider::default();
        let current = ModelMetrics::new(cur_auc, cur_recall);
        let candidate = ModelMetrics::new(cand_auc, cand_recall);
        let a = decider.decide(&current, &candidate).unwrap();
        let b = decider.decide(&current, &candidate).unwrap();
        prop_assert_eq!(a, b);
    }

    #[test]
    fn out_of_range_candidate_never_promotes(cand_auc in 1.0001f64..10.0, cand_recall in unit()) {
        let decider = PromotionDecider::default();
        let current = ModelMetrics::new(0.83, 0.5);
        let candidate = ModelMetrics::new(cand_auc, cand_recall);
        prop_assert!(decider.decide(&current, &candidate).is_err());
        prop_assert_eq!(
            decider.decide_fail_closed(&current, &candidate).outcome,
            PromotionOutcome::Keep
        );
    }

    #[test]
    fn degradation_fires_iff_recall_below_floor(recall in unit()) {
        let outcome = TriggerEvaluator::default()
            .should_retrain(&RetrainingSignals::new().with_recent_recall(recall));
        prop_assert_eq!(outcome.retrain, recall < RECALL_FLOOR);
        prop_assert_eq!(
            outcome.triggers.contains(&RetrainingTrigger::PerformanceDegradation),
            recall < RECALL_FLOOR
        );
    }

    #[test]
    fn manual_request_always_fires(
        new_data in any::<bool>(), drift in proptest::option::of(any::<bool>()), recall in proptest::option::of(unit())
    ) {
        let signals = RetrainingSignals {
            new_data_available: new_data,
            recent_recall: recall,
            drift_detected: drift,
            manual_request: true,
            prediction_shift: None,
        };
        let outcome = TriggerEvaluator::default().should_retrain(&signals);
        prop_assert!(outcome.retrain);
        prop_assert!(outcome.triggers.contains(&RetrainingTrigger::ManualRequest));
    }
}
