use crate::ProjectionSamplingMethod;
use log::*;
use rand::{seq::index, Rng};
use rand_distr::StandardNormal;
use sfm_core::nalgebra::{UnitVector3, Vector3};

/// Directions shorter than this are resampled rather than normalized.
const MIN_SAMPLE_NORM: f64 = 1e-9;

/// Samples the projection directions used by 1DSfM.
///
/// At most `max_directions` directions are returned. Sampling from the input measurements returns fewer when
/// there are fewer measurements, and no measurements produce no directions regardless of the method.
pub fn sample_projection_directions<R: Rng + ?Sized>(
    method: ProjectionSamplingMethod,
    measurements: &[UnitVector3<f64>],
    max_directions: usize,
    rng: &mut R,
) -> Vec<UnitVector3<f64>> {
    if measurements.is_empty() {
        return vec![];
    }
    match method {
        ProjectionSamplingMethod::SampleInputMeasurements => {
            let amount = max_directions.min(measurements.len());
            index::sample(rng, measurements.len(), amount)
                .into_iter()
                .map(|ix| measurements[ix])
                .collect()
        }
        ProjectionSamplingMethod::SampleWithInputDensity => {
            sample_kde_directions(measurements, max_directions, rng)
        }
        ProjectionSamplingMethod::SampleWithUniformDensity => {
            sample_random_directions(max_directions, rng)
        }
    }
}

/// Samples directions uniformly over the unit sphere.
pub fn sample_random_directions<R: Rng + ?Sized>(
    num_samples: usize,
    rng: &mut R,
) -> Vec<UnitVector3<f64>> {
    (0..num_samples)
        .map(|_| sample_normalized(rng, |rng| standard_normal(rng)))
        .collect()
}

/// Samples directions from an isotropic Gaussian kernel density estimate over `directions`.
///
/// The kernel bandwidth follows Scott's rule. Samples are projected back onto the sphere. Fewer than two directions
/// do not define a density, so uniform directions are sampled instead.
pub fn sample_kde_directions<R: Rng + ?Sized>(
    directions: &[UnitVector3<f64>],
    num_samples: usize,
    rng: &mut R,
) -> Vec<UnitVector3<f64>> {
    if directions.len() < 2 {
        debug!("too few directions for a density estimate, sampling uniformly");
        return sample_random_directions(num_samples, rng);
    }
    let count = directions.len() as f64;
    let mean = directions
        .iter()
        .map(|direction| direction.into_inner())
        .sum::<Vector3<f64>>()
        / count;
    let variance = directions
        .iter()
        .map(|direction| (direction.into_inner() - mean).norm_squared())
        .sum::<f64>()
        / (3.0 * (count - 1.0));
    let bandwidth = variance.sqrt() * count.powf(-1.0 / 7.0);
    (0..num_samples)
        .map(|_| {
            sample_normalized(rng, |rng| {
                let center = directions[rng.gen_range(0..directions.len())].into_inner();
                center + standard_normal(rng) * bandwidth
            })
        })
        .collect()
}

fn standard_normal<R: Rng + ?Sized>(rng: &mut R) -> Vector3<f64> {
    Vector3::new(
        rng.sample(StandardNormal),
        rng.sample(StandardNormal),
        rng.sample(StandardNormal),
    )
}

/// Draws from `sample` until the result can be normalized.
fn sample_normalized<R: Rng + ?Sized>(
    rng: &mut R,
    mut sample: impl FnMut(&mut R) -> Vector3<f64>,
) -> UnitVector3<f64> {
    loop {
        if let Some(direction) = UnitVector3::try_new(sample(rng), MIN_SAMPLE_NORM) {
            return direction;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg64;

    fn measurements() -> Vec<UnitVector3<f64>> {
        vec![
            UnitVector3::new_normalize(Vector3::new(1.0, 0.1, 0.0)),
            UnitVector3::new_normalize(Vector3::new(1.0, -0.1, 0.0)),
            UnitVector3::new_normalize(Vector3::new(1.0, 0.0, 0.1)),
        ]
    }

    #[test]
    fn input_sampling_draws_without_replacement() {
        let mut rng = Pcg64::seed_from_u64(0);
        let measurements = measurements();
        let sampled = sample_projection_directions(
            ProjectionSamplingMethod::SampleInputMeasurements,
            &measurements,
            2000,
            &mut rng,
        );
        assert_eq!(sampled.len(), measurements.len());
        for measurement in &measurements {
            assert_eq!(sampled.iter().filter(|&s| s == measurement).count(), 1);
        }
    }

    #[test]
    fn density_sampling_stays_near_measurements() {
        let mut rng = Pcg64::seed_from_u64(1);
        let sampled = sample_projection_directions(
            ProjectionSamplingMethod::SampleWithInputDensity,
            &measurements(),
            500,
            &mut rng,
        );
        assert_eq!(sampled.len(), 500);
        let mean_x = sampled.iter().map(|d| d.x).sum::<f64>() / 500.0;
        assert!(mean_x > 0.9, "mean x was {}", mean_x);
    }

    #[test]
    fn uniform_sampling_is_centered() {
        let mut rng = Pcg64::seed_from_u64(2);
        let sampled = sample_random_directions(4000, &mut rng);
        let mean: Vector3<f64> = sampled.iter().map(|d| d.into_inner()).sum::<Vector3<f64>>() / 4000.0;
        assert!(mean.norm() < 0.05, "mean was {}", mean);
        assert!(sampled.iter().all(|d| (d.norm() - 1.0).abs() < 1e-12));
    }

    #[test]
    fn no_measurements_sample_nothing() {
        let mut rng = Pcg64::seed_from_u64(3);
        assert!(sample_projection_directions(
            ProjectionSamplingMethod::SampleWithUniformDensity,
            &[],
            2000,
            &mut rng
        )
        .is_empty());
    }
}
