use crate::graph::{direction_measurements, Node, NodeIndex};
use crate::{AveragingError, AveragingSettings, Inliers};
use log::*;
use sfm_core::{
    nalgebra::{Rotation3, Vector3},
    BinaryMeasurement, CameraToCamera, CameraToWorld, Pose, PosePrior,
};
use std::collections::BTreeMap;
use translation_recovery::{NoiseModel, TranslationMeasurement, TranslationRecovery};

/// Recovers a translation for every camera from the inlier directions.
///
/// Relative pose priors `i2Ti1` become world frame translation priors `wRi2 * i2ti1` on `t(i1) - t(i2)`.
/// When there are any, they fix the scale and `scale_factor` is ignored. Absolute pose priors seed the
/// translations of their cameras.
///
/// Cameras without a rotation, or that the solver could not connect to the rest, get `None`.
pub(crate) fn recover_translations(
    settings: &AveragingSettings,
    num_images: usize,
    inliers: &Inliers,
    w_r_i: &[Option<Rotation3<f64>>],
    relative_priors: &BTreeMap<(usize, usize), PosePrior<CameraToCamera>>,
    absolute_priors: &[Option<PosePrior<CameraToWorld>>],
    scale_factor: f64,
) -> Result<Vec<Option<Vector3<f64>>>, AveragingError> {
    info!(
        "using {} track measurements and {} camera measurements",
        inliers.landmark_directions.len(),
        inliers.camera_directions.len()
    );

    let mut index = NodeIndex::default();
    let relative = direction_measurements(
        &mut index,
        &inliers.camera_directions,
        &inliers.landmark_directions,
    );

    let between: Vec<TranslationMeasurement<usize>> = relative_priors
        .iter()
        .filter_map(|(&(i1, i2), prior)| {
            let w_r_i2 = match w_r_i.get(i2).copied().flatten() {
                Some(rotation) => rotation,
                None => {
                    warn!("ignoring prior between {} and {}: camera {} has no rotation", i1, i2, i2);
                    return None;
                }
            };
            Some(BinaryMeasurement::new(
                index.insert(Node::Camera(i2)),
                index.insert(Node::Camera(i1)),
                w_r_i2 * prior.value.translation(),
            ))
        })
        .collect();

    let initial: BTreeMap<usize, Vector3<f64>> = absolute_priors
        .iter()
        .enumerate()
        .filter_map(|(camera, prior)| {
            let key = index.key(Node::Camera(camera))?;
            Some((key, prior.as_ref()?.value.translation()))
        })
        .collect();

    let mut direction_noise = NoiseModel::isotropic(settings.noise_sigma);
    if settings.robust_measurement_noise {
        direction_noise = direction_noise.huber(settings.huber_k);
    }
    let translations = TranslationRecovery::new(direction_noise)
        .between_noise(NoiseModel::isotropic(settings.prior_sigma))
        .anchor_sigma(settings.prior_sigma)
        .patience(settings.recovery_patience)
        .run(&relative, scale_factor, &between, &initial)?;

    let mut w_t_i = vec![None; num_images];
    for (key, translation) in translations {
        if let Some(Node::Camera(camera)) = index.node(key) {
            if camera < num_images && matches!(w_r_i.get(camera), Some(Some(_))) {
                w_t_i[camera] = Some(translation);
            }
        }
    }
    Ok(w_t_i)
}
