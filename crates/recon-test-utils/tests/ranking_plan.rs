//! Ranking and scoring properties over generated routes.

use proptest::prelude::*;
use recon_kernel::prelude::*;
use recon_kernel::scoring::clamp_score;
use recon_test_utils::*;

#[test]
fn test_resilience_ladder_ranks_descending() {
    let candidates = rank_routes(&create_resilience_ladder(), &RankingPolicy::default(), 3);
    let ranked: Vec<(&str, usize)> = candidates
        .iter()
        .map(|c| (c.route_id.as_str(), c.rank))
        .collect();
    assert_eq!(ranked, vec![("route-80", 1), ("route-60", 2), ("route-40", 3)]);
}

#[test]
fn test_objectives_lift_score() {
    let plain = create_route("plain", 50.0, 2);
    let weighted = create_route_with_objectives("weighted", 50.0, &[2.0, 4.0]);
    let candidates = rank_routes(&[plain, weighted], &RankingPolicy::default(), 2);
    assert_eq!(candidates[0].route_id.as_str(), "weighted");
    assert!((candidates[0].score - candidates[1].score - 30.0).abs() < 1e-9);
}

proptest! {
    #[test]
    fn prop_confidence_always_clamped(
        resilience in -500.0f64..500.0,
        weights in proptest::collection::vec(-50.0f64..50.0, 0..5),
        age in 0.0f64..1000.0,
    ) {
        let route = create_route_with_objectives("r", resilience, &weights).with_age_hours(age);
        let candidate = &rank_routes(&[route], &RankingPolicy::default(), 1)[0];
        prop_assert!((0.0..=100.0).contains(&candidate.confidence));
        prop_assert_eq!(candidate.confidence, clamp_score(candidate.score));
    }

    #[test]
    fn prop_ranking_is_input_order_independent(
        scores in proptest::collection::vec(0.0f64..100.0, 1..12),
        top in 1usize..12,
    ) {
        let routes: Vec<Route> = scores
            .iter()
            .enumerate()
            .map(|(i, s)| create_route(&format!("route-{i}"), *s, 1))
            .collect();
        let mut reversed = routes.clone();
        reversed.reverse();

        let policy = RankingPolicy::default();
        prop_assert_eq!(rank_routes(&routes, &policy, top), rank_routes(&reversed, &policy, top));
    }

    #[test]
    fn prop_band_is_monotonic(a in -10.0f64..110.0, b in -10.0f64..110.0) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(RiskBand::from_score(lo) <= RiskBand::from_score(hi));
    }
}
