#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// A measurement relating two variables of an estimation problem.
///
/// For directions, `measured` points from the variable `key1` towards the variable `key2`.
/// For translations, `measured` is `t(key2) - t(key1)`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct BinaryMeasurement<K, T> {
    pub key1: K,
    pub key2: K,
    pub measured: T,
}

impl<K, T> BinaryMeasurement<K, T> {
    pub fn new(key1: K, key2: K, measured: T) -> Self {
        Self {
            key1,
            key2,
            measured,
        }
    }
}
