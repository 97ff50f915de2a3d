//! Property tests for the clustering primitives.

use approx::relative_eq;
use proptest::collection::hash_map;
use proptest::prelude::*;
use tc_core::{
    ClusterId, DistanceStats, Fading, IdfTable, MicroCluster, TermFrequencies, ThresholdPolicy,
    decay_factor, fade, tfidf_cosine_distance,
};

fn term_frequencies() -> impl Strategy<Value = TermFrequencies> {
    hash_map("[a-f]{1,2}", 0.1f64..10.0, 1..8)
}

fn distances() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(0.0f64..=1.0, 0..12)
}

fn stats_of(distances: &[f64]) -> DistanceStats {
    distances
        .iter()
        .enumerate()
        .map(|(i, &d)| (i as ClusterId, d))
        .collect()
}

proptest! {
    #[test]
    fn prop_merge_conserves_faded_weight(
        a in term_frequencies(),
        b in term_frequencies(),
        t_a in 0.0f64..100.0,
        gap in 0.0f64..100.0,
        lag in 0.0f64..100.0,
        decay_rate in 0.0001f64..0.1,
    ) {
        let fading = Fading::new(decay_rate, 50.0, false);
        let t_b = t_a + gap;
        let now = t_b + lag;
        let mut left = MicroCluster::from_observation(0, &a, t_a, Some("a"));
        let right = MicroCluster::from_observation(1, &b, t_b, Some("b"));
        let expected = left.weight_at(now, &fading) + right.weight_at(now, &fading);

        left.merge(right, now, &fading);

        prop_assert!(relative_eq!(left.weight(), expected, max_relative = 1e-12));
        prop_assert_eq!(left.observation_count(), 2);
        prop_assert_eq!(left.record_ids().len(), 2);
        prop_assert_eq!(left.time(), now);
        for (term, f) in &b {
            let faded = f * fading.factor(t_b, now);
            prop_assert!(left.frequency(term) >= faded * (1.0 - 1e-12));
        }
    }

    #[test]
    fn prop_decay_is_monotone(
        weight in 0.0f64..1000.0,
        e1 in 0.0f64..1000.0,
        extra in 0.0f64..1000.0,
        decay_rate in 0.0f64..1.0,
    ) {
        let early = fade(weight, e1, decay_rate);
        let late = fade(weight, e1 + extra, decay_rate);
        prop_assert!(late <= early);
        prop_assert!(early <= weight);
        prop_assert!(late >= 0.0);
    }

    #[test]
    fn prop_decay_factor_never_grows(elapsed in -1000.0f64..1000.0, decay_rate in 0.0f64..1.0) {
        let factor = decay_factor(elapsed, decay_rate);
        prop_assert!(factor > 0.0 && factor <= 1.0);
    }

    #[test]
    fn prop_distance_is_bounded_and_symmetric(a in term_frequencies(), b in term_frequencies()) {
        let ca = MicroCluster::from_observation(0, &a, 0.0, None);
        let cb = MicroCluster::from_observation(1, &b, 0.0, None);
        let idf = IdfTable::from_clusters([&ca, &cb]);

        let ab = tfidf_cosine_distance(&ca, &cb, &idf);
        let ba = tfidf_cosine_distance(&cb, &ca, &idf);
        prop_assert!((0.0..=1.0).contains(&ab), "distance {} out of range", ab);
        prop_assert!(relative_eq!(ab, ba, epsilon = 1e-9));
    }

    #[test]
    fn prop_self_distance_is_zero(a in term_frequencies(), b in term_frequencies()) {
        let ca = MicroCluster::from_observation(0, &a, 0.0, None);
        let cb = MicroCluster::from_observation(1, &b, 0.0, None);
        let idf = IdfTable::from_clusters([&ca, &cb]);
        prop_assert_eq!(tfidf_cosine_distance(&ca, &ca, &idf), 0.0);
    }

    #[test]
    fn prop_distance_ignores_scale(
        a in term_frequencies(),
        b in term_frequencies(),
        exponent in 150i32..300,
    ) {
        let scale = 10f64.powi(exponent);
        let huge: TermFrequencies = a.iter().map(|(t, f)| (t.clone(), f * scale)).collect();
        let ca = MicroCluster::from_observation(0, &a, 0.0, None);
        let ch = MicroCluster::from_observation(1, &huge, 0.0, None);
        let cb = MicroCluster::from_observation(2, &b, 0.0, None);
        let idf = IdfTable::from_clusters([&ca, &ch, &cb]);

        prop_assert_eq!(tfidf_cosine_distance(&ch, &ch, &idf), 0.0);
        prop_assert_eq!(tfidf_cosine_distance(&ca, &ch, &idf), 0.0);
        let small = tfidf_cosine_distance(&ca, &cb, &idf);
        let large = tfidf_cosine_distance(&ch, &cb, &idf);
        prop_assert!(relative_eq!(small, large, epsilon = 1e-9));
    }

    #[test]
    fn prop_fixed_policy_merges_below_radius(ds in distances(), radius in 0.0f64..=1.0) {
        let stats = stats_of(&ds);
        let decision = ThresholdPolicy::Fixed { radius }.decide(&stats);
        let below = stats.nearest.is_some() && stats.min < radius;
        prop_assert_eq!(decision.cluster_id.is_some(), below);
        prop_assert_eq!(decision.candidates, ds.len());
    }

    #[test]
    fn prop_nearest_is_first_minimum(ds in distances()) {
        let stats = stats_of(&ds);
        let first_min = ds
            .iter()
            .enumerate()
            .filter(|(_, d)| **d < 1.0)
            .min_by(|x, y| x.1.total_cmp(y.1).then(x.0.cmp(&y.0)))
            .map(|(i, _)| i as ClusterId);
        prop_assert_eq!(stats.nearest, first_min);
    }

    #[test]
    fn prop_adaptive_cutoff_at_most_mean_of_others(ds in distances(), sigma in 0.0f64..3.0) {
        let stats = stats_of(&ds);
        let policy = ThresholdPolicy::Adaptive { sigma };
        match policy.threshold(&stats) {
            None => {
                prop_assert!(ds.len() < 2);
                prop_assert!(policy.decide(&stats).cluster_id.is_none());
            }
            Some(cutoff) => {
                let mu = (stats.sum - stats.min) / (stats.count - 1) as f64;
                prop_assert!(cutoff <= mu + 1e-12);
                if let Some(id) = policy.decide(&stats).cluster_id {
                    prop_assert_eq!(Some(id), stats.nearest);
                    prop_assert!(stats.min < cutoff);
                }
            }
        }
    }
}
