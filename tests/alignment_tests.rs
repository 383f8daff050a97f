mod common;

use common::l_shape;
use otalign::cloud::{PointCloud, WeightedPoint};
use otalign::config::ObjectiveParams;
use otalign::objective::{AlignmentObjective, CostMetric, Objective, TransformKind};
use otalign::optimizer::{NoProgress, Pso, PsoConfig};
use otalign::{AlignError, CancelToken, Vector};
use rstest::rstest;

const DELTA: f64 = 0.01;

fn params(transform: TransformKind, metric: CostMetric) -> ObjectiveParams {
    ObjectiveParams {
        transform,
        metric,
        rotation_penalty: 0.0,
        scale_penalty: 0.0,
    }
}

#[rstest]
#[case(CostMetric::Euclidean)]
#[case(CostMetric::SquaredEuclidean)]
fn test_undoing_the_shift_costs_almost_nothing(#[case] metric: CostMetric) {
    let reference = l_shape();
    let candidate = reference.translated(-1.5, 2.0);
    let obj = AlignmentObjective::new(
        &reference,
        &candidate,
        &params(TransformKind::Translation, metric),
        DELTA,
    )
    .unwrap();

    let aligned = obj.evaluate(&Vector::new(vec![1.5, -2.0])).unwrap();
    let untouched = obj.evaluate(&Vector::zeros(2)).unwrap();
    assert!(aligned <= DELTA, "aligned fitness {}", aligned);
    assert!(untouched > 1.0, "unaligned fitness {}", untouched);
}

#[test]
fn test_undoing_a_rotation_costs_almost_nothing() {
    let reference = l_shape();
    let candidate = reference.rotated_about(reference.center_of_mass(), 0.5);
    let obj = AlignmentObjective::new(
        &reference,
        &candidate,
        &params(TransformKind::TranslationRotation, CostMetric::Euclidean),
        DELTA,
    )
    .unwrap();

    let fitness = obj.evaluate(&Vector::new(vec![0.0, 0.0, -0.5])).unwrap();
    assert!(fitness <= DELTA, "fitness {}", fitness);
}

#[test]
fn test_swarm_recovers_translation() {
    let reference = l_shape();
    let candidate = reference.translated(-1.5, 2.0);
    let obj = AlignmentObjective::new(
        &reference,
        &candidate,
        &params(TransformKind::Translation, CostMetric::Euclidean),
        DELTA,
    )
    .unwrap();

    let cfg = PsoConfig {
        swarm_size: 20,
        inertia_weight: 0.729,
        personal_best_weight: 1.49445,
        neighborhood_best_weight: 1.49445,
        ..PsoConfig::with_region(Vector::new(vec![5.0, 5.0]))
    };
    let pso = Pso::new(cfg).unwrap();

    let best = (1..=3u64)
        .map(|seed| pso.run(&obj, Some(seed), &NoProgress).unwrap())
        .min_by(|a, b| a.fitness.total_cmp(&b.fitness))
        .unwrap();

    let err = best
        .location
        .subtract(&Vector::new(vec![1.5, -2.0]))
        .unwrap()
        .norm();
    assert!(err < 0.1, "recovered {} (off by {})", best.location, err);
    assert!(best.fitness < 0.05);
}

#[test]
fn test_unequal_sizes_are_padded() {
    let reference = l_shape();
    let candidate = PointCloud::new(vec![
        WeightedPoint::new(0.0, 0.0, 1.0),
        WeightedPoint::new(1.0, 1.0, 1.0),
    ])
    .unwrap();
    let obj = AlignmentObjective::new(
        &reference,
        &candidate,
        &ObjectiveParams::default(),
        DELTA,
    )
    .unwrap();
    assert_eq!(obj.size(), reference.len());

    let (_, mapping) = obj.mapping_for(&Vector::zeros(5)).unwrap();
    let moved: f64 = mapping.flows().iter().sum();
    assert!((moved - 1.0).abs() < 1e-6);
}

#[test]
fn test_massless_cloud_is_rejected() {
    let empty = PointCloud::new(vec![WeightedPoint::new(0.0, 0.0, 0.0)]).unwrap();
    let res = AlignmentObjective::new(&l_shape(), &empty, &ObjectiveParams::default(), DELTA);
    assert!(matches!(res, Err(AlignError::Validation(_))));
}

#[test]
fn test_cancel_reaches_the_solver() {
    let token = CancelToken::new();
    let obj = AlignmentObjective::new(
        &l_shape(),
        &l_shape().translated(1.0, 1.0),
        &ObjectiveParams::default(),
        DELTA,
    )
    .unwrap()
    .with_cancel(token.clone());

    assert!(obj.evaluate(&Vector::zeros(5)).is_ok());
    token.cancel();
    assert!(matches!(
        obj.evaluate(&Vector::zeros(5)),
        Err(AlignError::Cancelled)
    ));
}
