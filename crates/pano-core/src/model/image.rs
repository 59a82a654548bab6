//! Per-image geometric and photometric state.

use super::Variable;
use crate::math::{Pt2, Real};
use serde::{Deserialize, Serialize};

/// Response-curve model mapping linear scene radiance to device values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseType {
    /// Identity response, device value equals radiance.
    Linear,
    /// Parametric five-coefficient curve realized as a lookup table.
    Emor,
}

/// A source image of the panorama.
///
/// Holds every optimizable variable plus the logical pixel size the
/// geometric transform operates on. Link state lives on the [`super::Panorama`],
/// not here, so that groups can be recomputed transitively.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SrcImage {
    pub width: usize,
    pub height: usize,
    /// Inactive images are skipped by statistics and optimization.
    pub active: bool,

    // Orientation in degrees.
    pub yaw: Real,
    pub pitch: Real,
    pub roll: Real,
    /// Horizontal field of view in degrees.
    pub hfov: Real,
    // Radial distortion polynomial a·r³ + b·r² + c·r + (1 − a − b − c).
    pub radial_a: Real,
    pub radial_b: Real,
    pub radial_c: Real,
    // Principal point shift in pixels.
    pub shift_d: Real,
    pub shift_e: Real,

    /// Exposure value; the linear gain is `2^(-exposure)`.
    pub exposure: Real,
    pub wb_red: Real,
    pub wb_blue: Real,
    // Vignetting polynomial 1 + b·r² + c·r⁴ + d·r⁶ in normalized radius.
    pub vig_b: Real,
    pub vig_c: Real,
    pub vig_d: Real,
    // Vignetting center shift in pixels.
    pub vig_center_x: Real,
    pub vig_center_y: Real,

    pub response_type: ResponseType,
    /// Response coefficients, meaningful for [`ResponseType::Emor`].
    pub response: [Real; 5],

    /// Positive mask polygons in image pixel coordinates.
    #[serde(default)]
    pub masks: Vec<Vec<Pt2>>,
}

impl SrcImage {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            active: true,
            yaw: 0.0,
            pitch: 0.0,
            roll: 0.0,
            hfov: 50.0,
            radial_a: 0.0,
            radial_b: 0.0,
            radial_c: 0.0,
            shift_d: 0.0,
            shift_e: 0.0,
            exposure: 0.0,
            wb_red: 1.0,
            wb_blue: 1.0,
            vig_b: 0.0,
            vig_c: 0.0,
            vig_d: 0.0,
            vig_center_x: 0.0,
            vig_center_y: 0.0,
            response_type: ResponseType::Emor,
            response: [0.0; 5],
            masks: Vec::new(),
        }
    }

    /// Read any optimizable variable by tag.
    pub fn var(&self, v: Variable) -> Real {
        match v {
            Variable::Yaw => self.yaw,
            Variable::Pitch => self.pitch,
            Variable::Roll => self.roll,
            Variable::Hfov => self.hfov,
            Variable::RadialA => self.radial_a,
            Variable::RadialB => self.radial_b,
            Variable::RadialC => self.radial_c,
            Variable::ShiftD => self.shift_d,
            Variable::ShiftE => self.shift_e,
            Variable::Exposure => self.exposure,
            Variable::WhiteBalanceRed => self.wb_red,
            Variable::WhiteBalanceBlue => self.wb_blue,
            Variable::VignetteB => self.vig_b,
            Variable::VignetteC => self.vig_c,
            Variable::VignetteD => self.vig_d,
            Variable::VignetteCenterX => self.vig_center_x,
            Variable::VignetteCenterY => self.vig_center_y,
            Variable::ResponseA => self.response[0],
            Variable::ResponseB => self.response[1],
            Variable::ResponseC => self.response[2],
            Variable::ResponseD => self.response[3],
            Variable::ResponseE => self.response[4],
        }
    }

    /// Write any optimizable variable by tag.
    pub fn set_var(&mut self, v: Variable, value: Real) {
        match v {
            Variable::Yaw => self.yaw = value,
            Variable::Pitch => self.pitch = value,
            Variable::Roll => self.roll = value,
            Variable::Hfov => self.hfov = value,
            Variable::RadialA => self.radial_a = value,
            Variable::RadialB => self.radial_b = value,
            Variable::RadialC => self.radial_c = value,
            Variable::ShiftD => self.shift_d = value,
            Variable::ShiftE => self.shift_e = value,
            Variable::Exposure => self.exposure = value,
            Variable::WhiteBalanceRed => self.wb_red = value,
            Variable::WhiteBalanceBlue => self.wb_blue = value,
            Variable::VignetteB => self.vig_b = value,
            Variable::VignetteC => self.vig_c = value,
            Variable::VignetteD => self.vig_d = value,
            Variable::VignetteCenterX => self.vig_center_x = value,
            Variable::VignetteCenterY => self.vig_center_y = value,
            Variable::ResponseA => self.response[0] = value,
            Variable::ResponseB => self.response[1] = value,
            Variable::ResponseC => self.response[2] = value,
            Variable::ResponseD => self.response[3] = value,
            Variable::ResponseE => self.response[4] = value,
        }
    }

    /// Evaluate the vignetting attenuation polynomial at a squared radius
    /// normalized so the image diagonal half-length is 1.
    pub fn vignetting_at(&self, r2: Real) -> Real {
        let r4 = r2 * r2;
        1.0 + self.vig_b * r2 + self.vig_c * r4 + self.vig_d * r4 * r2
    }

    /// Whether the pixel lies inside any positive mask polygon.
    pub fn in_masks(&self, p: Pt2) -> bool {
        self.masks.iter().any(|m| crate::math::point_in_polygon(p, m))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn var_accessors_cover_every_variable() {
        let mut img = SrcImage::new(100, 80);
        for (i, v) in Variable::ALL.iter().enumerate() {
            let value = 0.5 + i as Real;
            img.set_var(*v, value);
            assert_eq!(img.var(*v), value, "{v:?} did not round-trip");
        }
    }

    #[test]
    fn vignetting_is_unity_without_coefficients() {
        let img = SrcImage::new(10, 10);
        assert_eq!(img.vignetting_at(0.7), 1.0);
    }

    #[test]
    fn image_roundtrips_through_json_with_masks() {
        let mut img = SrcImage::new(640, 480);
        img.yaw = 12.5;
        img.exposure = -0.7;
        img.masks
            .push(vec![Pt2::new(1.0, 2.0), Pt2::new(30.0, 2.0), Pt2::new(15.0, 40.0)]);
        let json = serde_json::to_string(&img).unwrap();
        let back: SrcImage = serde_json::from_str(&json).unwrap();
        assert_eq!(back.yaw, img.yaw);
        assert_eq!(back.masks.len(), 1);
        assert!(back.in_masks(Pt2::new(15.0, 10.0)));
    }
}
