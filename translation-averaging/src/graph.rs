use crate::{LandmarkDirections, RelativeDirections};
use sfm_core::BinaryMeasurement;
use std::collections::BTreeMap;
use translation_recovery::DirectionMeasurement;

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// A vertex of the augmented measurement graph.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Node {
    /// A camera, by its index in the camera list.
    Camera(usize),
    /// A landmark, by the index of its track among the selected tracks.
    Landmark(usize),
}

/// A bidirectional map between graph nodes and the dense keys the solvers work with.
///
/// Keys are handed out in insertion order starting at `0`.
#[derive(Debug, Clone, Default)]
pub(crate) struct NodeIndex {
    nodes: Vec<Node>,
    keys: BTreeMap<Node, usize>,
}

impl NodeIndex {
    /// Retrieves the key of `node`, assigning the next free key if it has none yet.
    pub(crate) fn insert(&mut self, node: Node) -> usize {
        let next = self.nodes.len();
        let key = *self.keys.entry(node).or_insert(next);
        if key == next {
            self.nodes.push(node);
        }
        key
    }

    pub(crate) fn key(&self, node: Node) -> Option<usize> {
        self.keys.get(&node).copied()
    }

    pub(crate) fn node(&self, key: usize) -> Option<Node> {
        self.nodes.get(key).copied()
    }

    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }
}

/// Converts camera to camera and camera to landmark directions into measurements between solver keys.
///
/// A relative direction `w_i2Ui1` keyed by `(i1, i2)` points from camera `i2` towards camera `i1`, so its
/// measurement goes from `i2` to `i1`. A landmark direction keyed by `(track_id, camera)` goes from the camera
/// to the landmark. Camera measurements come first, each group in key order.
pub(crate) fn direction_measurements(
    index: &mut NodeIndex,
    w_i2_u_i1: &RelativeDirections,
    w_c_u_l: &LandmarkDirections,
) -> Vec<DirectionMeasurement<usize>> {
    let cameras = w_i2_u_i1.iter().map(|(&(i1, i2), &direction)| {
        BinaryMeasurement::new(
            index.insert(Node::Camera(i2)),
            index.insert(Node::Camera(i1)),
            direction,
        )
    });
    let mut measurements: Vec<_> = cameras.collect();
    measurements.extend(w_c_u_l.iter().map(|(&(track_id, camera), &direction)| {
        BinaryMeasurement::new(
            index.insert(Node::Camera(camera)),
            index.insert(Node::Landmark(track_id)),
            direction,
        )
    }));
    measurements
}
