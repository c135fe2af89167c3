//! Route ranking tests
//!
//! Goal weighting, tie-breaks, provider failures, and order stability.

mod fixtures;

use proptest::prelude::*;

use saferoute::canned::CannedRoutes;
use saferoute::preference::OptimizationGoal;
use saferoute::ranking::{generate, rank, GenerationError, RankOptions, RouteId, Score};

use fixtures::{request, scenario_candidates, DownProvider, FixedProvider, TestCandidate};

fn ids(list: &[u32]) -> Vec<RouteId> {
    list.iter().copied().map(RouteId).collect()
}

// ============================================================================
// Goal Weighting
// ============================================================================

#[test]
fn test_safety_goal_prefers_safe_route() {
    let set = rank(OptimizationGoal::Safety, scenario_candidates(), &RankOptions::default())
        .expect("ranked");

    assert_eq!(set.ids(), ids(&[1, 2, 3]));
    assert_eq!(set.recommended().id, RouteId(1), "safest route should be recommended");
}

#[test]
fn test_fastest_goal_prefers_quick_route() {
    let set = rank(OptimizationGoal::Fastest, scenario_candidates(), &RankOptions::default())
        .expect("ranked");

    assert_eq!(set.ids(), ids(&[3, 2, 1]));
    assert!(set.is_recommended(RouteId(3)));
    assert!(!set.is_recommended(RouteId(1)));
}

#[test]
fn test_eco_goal_prefers_clean_route() {
    let set = rank(OptimizationGoal::Eco, scenario_candidates(), &RankOptions::default())
        .expect("ranked");

    assert_eq!(set.recommended().id, RouteId(1));
}

#[test]
fn test_pollution_polarity_is_inverted() {
    // Same ETA and safety; only pollution differs. Low pollution must win.
    let candidates = vec![
        TestCandidate::new(1).pollution(Score::High).build(),
        TestCandidate::new(2).pollution(Score::Low).build(),
    ];
    let set = rank(OptimizationGoal::Eco, candidates, &RankOptions::default()).expect("ranked");
    assert_eq!(set.ids(), ids(&[2, 1]), "lower pollution should rank higher");
}

#[test]
fn test_safety_polarity_is_direct() {
    let candidates = vec![
        TestCandidate::new(1).safety(Score::Low).build(),
        TestCandidate::new(2).safety(Score::High).build(),
    ];
    let set = rank(OptimizationGoal::Safety, candidates, &RankOptions::default()).expect("ranked");
    assert_eq!(set.ids(), ids(&[2, 1]), "higher safety should rank higher");
}

#[test]
fn test_custom_weights() {
    let mut options = RankOptions::default();
    options.safety.safety = 0.0;
    options.safety.pollution = 0.0;
    options.safety.time = 1.0;

    let set = rank(OptimizationGoal::Safety, scenario_candidates(), &options).expect("ranked");
    assert_eq!(set.ids(), ids(&[3, 2, 1]), "time-only weights should rank by eta");
}

#[test]
fn test_equal_fitness_breaks_on_eta() {
    // Candidate 1 trades one safety tier for one pollution tier, so under
    // equal safety/pollution weights both score the same apart from time.
    let mut options = RankOptions::default();
    options.eco.safety = 0.5;
    options.eco.pollution = 0.5;
    options.eco.time = 0.0;

    let candidates = vec![
        TestCandidate::new(1).eta(700).safety(Score::High).pollution(Score::High).build(),
        TestCandidate::new(2).eta(650).safety(Score::Low).pollution(Score::Low).build(),
    ];
    let set = rank(OptimizationGoal::Eco, candidates, &options).expect("ranked");
    assert_eq!(set.ids(), ids(&[2, 1]), "lower eta should win a fitness tie");
}

// ============================================================================
// Generation
// ============================================================================

#[test]
fn test_generate_uses_provider_and_goal() {
    let provider = FixedProvider(scenario_candidates());
    let set = generate(&request(OptimizationGoal::Fastest), &provider, &RankOptions::default())
        .expect("generated");

    assert_eq!(set.goal(), OptimizationGoal::Fastest);
    assert_eq!(set.ids(), ids(&[3, 2, 1]));
}

#[test]
fn test_generate_no_route() {
    let provider = FixedProvider(Vec::new());
    let err = generate(&request(OptimizationGoal::Safety), &provider, &RankOptions::default())
        .unwrap_err();
    assert!(matches!(err, GenerationError::NoRouteFound));
}

#[test]
fn test_generate_provider_failure() {
    let err = generate(&request(OptimizationGoal::Safety), &DownProvider, &RankOptions::default())
        .unwrap_err();
    assert!(matches!(err, GenerationError::Provider(_)));
}

#[test]
fn test_canned_routes_rank_like_scenarios() {
    let safety = generate(&request(OptimizationGoal::Safety), &CannedRoutes, &RankOptions::default())
        .expect("generated");
    assert_eq!(safety.recommended().display_name, "Safest Route");

    let fastest = generate(&request(OptimizationGoal::Fastest), &CannedRoutes, &RankOptions::default())
        .expect("generated");
    assert_eq!(fastest.recommended().display_name, "Fastest Route");
}

#[test]
fn test_select_carries_steps() {
    let candidates = vec![
        TestCandidate::new(1).steps(4).build(),
        TestCandidate::new(2).eta(300).steps(2).build(),
    ];
    let set = rank(OptimizationGoal::Fastest, candidates, &RankOptions::default()).expect("ranked");

    assert_eq!(set.steps_for(RouteId(1)).map(<[_]>::len), Some(4));
    let selected = set.select(RouteId(2)).expect("route 2 present");
    assert_eq!(selected.candidate.id, RouteId(2));
    assert_eq!(selected.steps.len(), 2);
    assert!(set.select(RouteId(99)).is_none());

    let top = set.into_recommended();
    assert_eq!(top.candidate.id, RouteId(2));
}

// ============================================================================
// Properties
// ============================================================================

fn score() -> impl Strategy<Value = Score> {
    prop_oneof![Just(Score::Low), Just(Score::Medium), Just(Score::High)]
}

fn goal() -> impl Strategy<Value = OptimizationGoal> {
    prop_oneof![
        Just(OptimizationGoal::Safety),
        Just(OptimizationGoal::Fastest),
        Just(OptimizationGoal::Eco),
    ]
}

fn candidate_set() -> impl Strategy<Value = Vec<saferoute::ranking::RawCandidate>> {
    prop::collection::vec((60u32..7200, score(), score()), 1..8).prop_map(|metrics| {
        metrics
            .into_iter()
            .enumerate()
            .map(|(i, (eta, safety, pollution))| {
                TestCandidate::new(i as u32 + 1)
                    .eta(eta)
                    .safety(safety)
                    .pollution(pollution)
                    .build()
            })
            .collect()
    })
}

proptest! {
    #[test]
    fn prop_order_independent_of_input_order(
        candidates in candidate_set(),
        goal in goal(),
        seed in any::<u64>(),
    ) {
        let options = RankOptions::default();
        let baseline = rank(goal, candidates.clone(), &options).unwrap();

        // Deterministic shuffle driven by the seed.
        let mut shuffled = candidates;
        let n = shuffled.len();
        let mut state = seed;
        for i in (1..n).rev() {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let j = (state >> 33) as usize % (i + 1);
            shuffled.swap(i, j);
        }
        let reshuffled = rank(goal, shuffled, &options).unwrap();

        prop_assert_eq!(baseline.ids(), reshuffled.ids());
    }

    #[test]
    fn prop_non_empty_unique_and_sorted(candidates in candidate_set(), goal in goal()) {
        let count = candidates.len();
        let set = rank(goal, candidates, &RankOptions::default()).unwrap();

        prop_assert_eq!(set.len(), count);
        let mut unique = set.ids();
        unique.sort();
        unique.dedup();
        prop_assert_eq!(unique.len(), count);

        let fitness: Vec<f64> = set
            .ids()
            .into_iter()
            .map(|id| set.fitness_of(id).unwrap())
            .collect();
        for pair in fitness.windows(2) {
            prop_assert!(pair[0] + 1e-9 >= pair[1], "not descending: {:?}", fitness);
        }
    }
}
