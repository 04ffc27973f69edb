use std::f64::consts::PI;

use epskill::{reference::ReferenceEngine, CompetitorId, InferenceEngine, Outcome};

const TOL: f64 = 1e-9;

fn outcome(winner: usize, loser: usize) -> Outcome {
    Outcome::new(CompetitorId(winner), CompetitorId(loser))
}

fn assert_close(actual: f64, expected: f64, tol: f64, what: &str) {
    assert!(
        (actual - expected).abs() <= tol * expected.abs().max(1.0),
        "{what}: {actual} != {expected}"
    );
}

#[test]
fn single_match_matches_closed_form() {
    let mut engine = InferenceEngine::new(["winner", "loser"], [outcome(0, 1)]).unwrap();
    engine.run(100).unwrap();

    // With a single factor, the fixed point is the exact posterior of a
    // N(0, 1) skill given that N(0, 3) performance difference is positive.
    let mean = (2.0 / (3.0 * PI)).sqrt();
    let precision = 1.0 / (1.0 - 2.0 / (3.0 * PI));

    let winner = engine.marginal(CompetitorId(0)).unwrap();
    let loser = engine.marginal(CompetitorId(1)).unwrap();
    assert!(winner.mean > loser.mean);
    assert_close(winner.mean, mean, TOL, "winner mean");
    assert_close(loser.mean, -mean, TOL, "loser mean");
    assert_close(winner.precision, precision, TOL, "winner precision");
    assert_close(loser.precision, precision, TOL, "loser precision");
}

#[test]
fn transitive_results_rank_in_order() {
    let mut engine = InferenceEngine::new(
        ["a", "b", "c"],
        [outcome(0, 1), outcome(1, 2), outcome(0, 2)],
    )
    .unwrap();
    engine.run(50).unwrap();

    assert_eq!(
        engine.rank(),
        vec![CompetitorId(0), CompetitorId(1), CompetitorId(2)]
    );
    let means: Vec<f64> = engine.marginals().map(|(_, skill)| skill.mean).collect();
    assert!(means[0] > means[1] && means[1] > means[2], "{means:?}");
}

#[test]
fn one_more_round_at_fixed_point_is_stable() {
    let log = [
        outcome(0, 1),
        outcome(1, 2),
        outcome(2, 3),
        outcome(0, 3),
        outcome(3, 1),
        outcome(2, 0),
    ];
    let mut engine = InferenceEngine::new(["a", "b", "c", "d"], log).unwrap();
    engine.run(500).unwrap();
    let before: Vec<_> = engine.marginals().collect();

    engine.run(1).unwrap();
    for ((_, old), (id, new)) in before.iter().zip(engine.marginals()) {
        assert!((old.mean - new.mean).abs() < 1e-5, "competitor {id} mean moved");
        assert!(
            (old.precision - new.precision).abs() < 1e-5,
            "competitor {id} precision moved"
        );
    }
}

#[test]
fn array_engine_agrees_with_reference() {
    let names = ["a", "b", "c", "d", "e", "f"];
    let log = [
        outcome(0, 1),
        outcome(0, 2),
        outcome(1, 2),
        outcome(2, 1),
        outcome(3, 0),
        outcome(4, 3),
        outcome(1, 4),
        outcome(0, 1),
        outcome(2, 4),
    ];

    for iterations in [0, 1, 2, 10, 60] {
        let mut engine = InferenceEngine::new(names, log).unwrap();
        engine.run(iterations).unwrap();
        let mut reference = ReferenceEngine::new(names.len(), log).unwrap();
        reference.run(iterations).unwrap();

        for (id, skill) in engine.marginals() {
            let expected = reference.marginal(id).unwrap();
            assert_close(skill.mean, expected.mean, TOL, "mean");
            assert_close(skill.precision, expected.precision, TOL, "precision");
        }
    }
}

#[test]
fn reference_rejects_the_same_logs() {
    assert!(ReferenceEngine::new(2, [outcome(0, 0)]).is_err());
    assert!(ReferenceEngine::new(2, [outcome(0, 2)]).is_err());
}
