use pano_core::Real;
use serde::{Deserialize, Serialize};

/// Robust residual re-weighting kernels.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RobustKernel {
    /// No robustness, pure L2 (quadratic).
    #[default]
    None,
    /// Huber weighting with threshold `sigma`.
    Huber { sigma: Real },
}

impl RobustKernel {
    /// Apply the kernel to a raw residual component.
    ///
    /// For Huber, `w(e) = e` inside the threshold and
    /// `sign(e) · sqrt(σ·(2|e| − σ))` beyond it: sub-quadratic cost growth
    /// that bounds outlier influence without discarding the term.
    pub fn weight(self, e: Real) -> Real {
        match self {
            RobustKernel::None => e,
            RobustKernel::Huber { sigma } => {
                let a = e.abs();
                if a <= sigma {
                    e
                } else {
                    e.signum() * (sigma * (2.0 * a - sigma)).sqrt()
                }
            }
        }
    }
}
