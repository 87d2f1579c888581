use sfm_core::nalgebra::{Matrix3, Vector3};

/// An isotropic Gaussian noise model on 3-dimensional errors, optionally made robust with a Huber loss.
///
/// The robust variant rescales the whitened residual `r` to `r'` such that `0.5 * |r'|^2` equals the Huber loss
/// of `|r|`. A least squares solver minimizing `0.5 * |r'|^2` therefore minimizes the Huber loss directly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoiseModel {
    sigma: f64,
    huber: Option<f64>,
}

impl NoiseModel {
    /// Every component of the error has standard deviation `sigma`.
    pub fn isotropic(sigma: f64) -> Self {
        Self { sigma, huber: None }
    }

    /// Wraps the model in a Huber loss with threshold `k`, in units of standard deviations.
    #[must_use]
    pub fn huber(self, k: f64) -> Self {
        Self {
            huber: Some(k),
            ..self
        }
    }

    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    /// Whitens an error, returning the residual and the derivative of the residual with respect to the error.
    pub fn whiten(&self, error: &Vector3<f64>) -> (Vector3<f64>, Matrix3<f64>) {
        let whitened = error / self.sigma;
        let scale = Matrix3::identity() / self.sigma;
        let k = match self.huber {
            Some(k) => k,
            None => return (whitened, scale),
        };
        let norm = whitened.norm();
        if norm <= k {
            return (whitened, scale);
        }
        let root = (2.0 * k * norm - k * k).sqrt();
        let gain = root / norm;
        let gain_derivative = ((k / root) * norm - root) / (norm * norm);
        let reweighting =
            Matrix3::identity() * gain + whitened * whitened.transpose() * (gain_derivative / norm);
        (whitened * gain, reweighting * scale)
    }

    /// The loss this model assigns to an error, `0.5 * |r'|^2`.
    pub fn loss(&self, error: &Vector3<f64>) -> f64 {
        0.5 * self.whiten(error).0.norm_squared()
    }
}
