use sfm_core::Track2d;
use sfm_pinhole::Calibration;
use std::cmp::Reverse;
use std::collections::BTreeSet;

/// A track needs at least this many camera rays to help disambiguate outliers.
pub const MIN_TRACK_LENGTH: usize = 3;

/// Picks the tracks used to augment the measurement graph with camera to landmark directions.
///
/// Every track is restricted to the `valid_cameras` that also have intrinsics. Tracks left with fewer than
/// [`MIN_TRACK_LENGTH`] observations are dropped, and of the rest the longest
/// `tracks_to_cameras_ratio * valid_cameras.len()` are returned, longest first. Equally long tracks keep their
/// input order.
pub fn select_tracks_for_averaging(
    tracks: &[Track2d],
    valid_cameras: &BTreeSet<usize>,
    intrinsics: &[Option<Calibration>],
    tracks_to_cameras_ratio: f64,
) -> Vec<Track2d> {
    let max_tracks = (valid_cameras.len() as f64 * tracks_to_cameras_ratio) as usize;
    let calibrated_cameras: BTreeSet<usize> = valid_cameras
        .iter()
        .copied()
        .filter(|&camera| matches!(intrinsics.get(camera), Some(Some(_))))
        .collect();
    let mut selected: Vec<Track2d> = tracks
        .iter()
        .map(|track| track.select_for_cameras(&calibrated_cameras))
        .filter(|track| track.len() >= MIN_TRACK_LENGTH)
        .collect();
    selected.sort_by_key(|track| Reverse(track.len()));
    selected.truncate(max_tracks);
    selected
}
