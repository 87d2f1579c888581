use approx::assert_relative_eq;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;
use sfm_core::{
    nalgebra::{UnitVector3, Vector3},
    BinaryMeasurement,
};
use std::collections::BTreeMap;
use translation_recovery::{DirectionMeasurement, NoiseModel, TranslationRecovery};

const HUBER_K: f64 = 1.345;
const SIGMA: f64 = 0.01;

fn square() -> Vec<Vector3<f64>> {
    vec![
        Vector3::new(0.0, 0.0, 0.0),
        Vector3::new(1.0, 0.0, 0.0),
        Vector3::new(1.0, 1.0, 0.0),
        Vector3::new(0.0, 1.0, 0.0),
    ]
}

fn grid() -> Vec<Vector3<f64>> {
    (0..9)
        .map(|ix| Vector3::new((ix % 3) as f64, (ix / 3) as f64, 0.0))
        .collect()
}

/// Directions from `a` towards `b` for every pair of points.
fn all_pairs(points: &[Vector3<f64>]) -> Vec<DirectionMeasurement<usize>> {
    (0..points.len())
        .flat_map(|a| ((a + 1)..points.len()).map(move |b| (a, b)))
        .map(|(a, b)| BinaryMeasurement::new(a, b, UnitVector3::new_normalize(points[b] - points[a])))
        .collect()
}

fn assert_recovered(recovered: &BTreeMap<usize, Vector3<f64>>, points: &[Vector3<f64>], epsilon: f64) {
    assert_eq!(recovered.len(), points.len());
    for (ix, point) in points.iter().enumerate() {
        assert_relative_eq!(recovered[&ix], *point, epsilon = epsilon);
    }
}

#[test]
fn square_is_recovered_exactly() {
    let points = square();
    let recovered = TranslationRecovery::default()
        .run(&all_pairs(&points), 1.0, &[], &BTreeMap::new())
        .unwrap();
    assert_recovered(&recovered, &points, 1e-6);
}

#[test]
fn scale_factor_sets_first_edge_length() {
    let points = square();
    let recovered = TranslationRecovery::default()
        .run(&all_pairs(&points), 2.5, &[], &BTreeMap::new())
        .unwrap();
    let scaled: Vec<_> = points.iter().map(|p| p * 2.5).collect();
    assert_recovered(&recovered, &scaled, 1e-6);
}

#[test]
fn priors_override_scale() {
    let points: Vec<_> = square().iter().map(|p| p * 3.0).collect();
    let between = [BinaryMeasurement::new(1, 2, points[2] - points[1])];
    let initial = points.iter().copied().enumerate().collect();
    let recovered = TranslationRecovery::default()
        .run(&all_pairs(&points), 1.0, &between, &initial)
        .unwrap();
    assert_recovered(&recovered, &points, 1e-6);
}

#[test]
fn disconnected_variables_are_left_out() {
    let points = square();
    let mut relative = all_pairs(&points);
    relative.push(BinaryMeasurement::new(
        10,
        11,
        UnitVector3::new_normalize(Vector3::z()),
    ));
    let recovered = TranslationRecovery::default()
        .run(&relative, 1.0, &[], &BTreeMap::new())
        .unwrap();
    assert!(!recovered.contains_key(&10));
    assert!(!recovered.contains_key(&11));
    assert_recovered(&recovered, &points, 1e-6);
}

#[test]
fn robust_noise_tolerates_flipped_direction() {
    let points = grid();
    let mut relative = all_pairs(&points);
    let flipped = relative
        .iter()
        .position(|m| m.key1 == 0 && m.key2 == 8)
        .unwrap();
    relative[flipped].measured = -relative[flipped].measured;
    let recovered = TranslationRecovery::new(NoiseModel::isotropic(SIGMA).huber(HUBER_K))
        .run(&relative, 1.0, &[], &BTreeMap::new())
        .unwrap();
    assert_recovered(&recovered, &points, 1e-2);
}

#[test]
fn noisy_directions_stay_close() {
    let mut rng = Pcg64::seed_from_u64(0);
    let points = grid();
    let relative: Vec<_> = all_pairs(&points)
        .into_iter()
        .map(|mut m| {
            let noise = Vector3::new(
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
            ) * 1e-3;
            m.measured = UnitVector3::new_normalize(m.measured.into_inner() + noise);
            m
        })
        .collect();
    let recovered = TranslationRecovery::new(NoiseModel::isotropic(SIGMA).huber(HUBER_K))
        .run(&relative, 1.0, &[], &BTreeMap::new())
        .unwrap();
    assert_recovered(&recovered, &points, 5e-2);
}

#[test]
fn many_cameras_with_landmarks_are_recovered() {
    const CAMERAS: usize = 120;
    const LANDMARKS: usize = 1200;
    const LANDMARK_KEY: usize = 10_000;

    let mut rng = Pcg64::seed_from_u64(7);
    let mut random_point = |scale: f64, height: f64| {
        Vector3::new(
            rng.gen_range(-scale..scale),
            rng.gen_range(-scale..scale),
            height + rng.gen_range(-1.0..1.0),
        )
    };
    let cameras: Vec<_> = (0..CAMERAS).map(|_| random_point(20.0, 0.0)).collect();
    let landmarks: Vec<_> = (0..LANDMARKS).map(|_| random_point(25.0, 10.0)).collect();
    let origin = cameras[0];
    let position = |key: usize| {
        if key >= LANDMARK_KEY {
            landmarks[key - LANDMARK_KEY] - origin
        } else {
            cameras[key] - origin
        }
    };
    let direction =
        |a: usize, b: usize| BinaryMeasurement::new(a, b, UnitVector3::new_normalize(position(b) - position(a)));

    let mut relative: Vec<_> = (0..CAMERAS)
        .flat_map(|a| ((a + 1)..CAMERAS.min(a + 4)).map(move |b| (a, b)))
        .map(|(a, b)| direction(a, b))
        .collect();
    let mut observer = Pcg64::seed_from_u64(8);
    for landmark in 0..LANDMARKS {
        let first = observer.gen_range(0..CAMERAS);
        for offset in [0, 17, 41, 73] {
            relative.push(direction((first + offset) % CAMERAS, LANDMARK_KEY + landmark));
        }
    }

    let scale = (position(1) - position(0)).norm();
    let recovered = TranslationRecovery::default()
        .run(&relative, scale, &[], &BTreeMap::new())
        .unwrap();
    assert_eq!(recovered.len(), CAMERAS + LANDMARKS);
    for (&key, translation) in &recovered {
        assert_relative_eq!(*translation, position(key), epsilon = 1e-6);
    }
}
