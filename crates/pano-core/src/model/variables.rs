//! Optimizable per-image variables.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A per-image variable that can be optimized and linked across images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variable {
    // Geometric: orientation and lens.
    Yaw,
    Pitch,
    Roll,
    Hfov,
    RadialA,
    RadialB,
    RadialC,
    ShiftD,
    ShiftE,
    // Photometric: exposure and white balance.
    Exposure,
    WhiteBalanceRed,
    WhiteBalanceBlue,
    // Photometric: radial vignetting polynomial plus center shift.
    VignetteB,
    VignetteC,
    VignetteD,
    VignetteCenterX,
    VignetteCenterY,
    // Photometric: response curve coefficients.
    ResponseA,
    ResponseB,
    ResponseC,
    ResponseD,
    ResponseE,
}

impl Variable {
    pub const ALL: [Variable; 22] = [
        Variable::Yaw,
        Variable::Pitch,
        Variable::Roll,
        Variable::Hfov,
        Variable::RadialA,
        Variable::RadialB,
        Variable::RadialC,
        Variable::ShiftD,
        Variable::ShiftE,
        Variable::Exposure,
        Variable::WhiteBalanceRed,
        Variable::WhiteBalanceBlue,
        Variable::VignetteB,
        Variable::VignetteC,
        Variable::VignetteD,
        Variable::VignetteCenterX,
        Variable::VignetteCenterY,
        Variable::ResponseA,
        Variable::ResponseB,
        Variable::ResponseC,
        Variable::ResponseD,
        Variable::ResponseE,
    ];

    /// Exposure / white balance group.
    pub fn is_exposure(self) -> bool {
        matches!(
            self,
            Variable::Exposure | Variable::WhiteBalanceRed | Variable::WhiteBalanceBlue
        )
    }

    /// Vignetting group (polynomial coefficients and center shift).
    pub fn is_vignetting(self) -> bool {
        matches!(
            self,
            Variable::VignetteB
                | Variable::VignetteC
                | Variable::VignetteD
                | Variable::VignetteCenterX
                | Variable::VignetteCenterY
        )
    }

    /// Response-curve group.
    pub fn is_response(self) -> bool {
        matches!(
            self,
            Variable::ResponseA
                | Variable::ResponseB
                | Variable::ResponseC
                | Variable::ResponseD
                | Variable::ResponseE
        )
    }

    /// Any photometric variable (exposure, vignetting, or response).
    pub fn is_photometric(self) -> bool {
        self.is_exposure() || self.is_vignetting() || self.is_response()
    }

    /// Any geometric variable (pose or lens).
    pub fn is_geometric(self) -> bool {
        !self.is_photometric()
    }

    /// Orientation-only subset used by the pairwise control-point cleaner.
    pub fn is_position(self) -> bool {
        matches!(self, Variable::Yaw | Variable::Pitch | Variable::Roll)
    }
}

/// An ordered set of variables requested for optimization.
pub type VarSet = BTreeSet<Variable>;

/// Convenience constructor for a [`VarSet`].
pub fn var_set(vars: &[Variable]) -> VarSet {
    vars.iter().copied().collect()
}
