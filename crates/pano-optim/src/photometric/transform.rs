//! Per-image photometric transforms.
//!
//! Forward direction maps linear scene radiance to device values:
//! white balance and exposure gain, then radial vignetting, then the
//! response curve. The inverse undoes the chain. Both directions always
//! operate on a monotone-clamped response so the optimizer evaluates a
//! valid transform even when candidate parameters imply a non-monotonic
//! curve; the violation itself is reported as a penalty term.

use pano_core::{Pt2, Real, ResponseType, SrcImage};

/// Resolution of the tabulated response curve.
pub const RESPONSE_LUT_SIZE: usize = 1024;

/// Tabulated monotone response curve with its monotonicity violation.
#[derive(Debug, Clone)]
pub struct ResponseCurve {
    lut: Vec<Real>,
    /// Sum of squared negative forward differences of the raw curve,
    /// scaled by the table size. Zero for a monotone parameter set.
    pub monotonicity_penalty: Real,
}

impl ResponseCurve {
    /// Build the curve for a response type and coefficient set.
    ///
    /// The parametric curve is a smooth deviation from identity that keeps
    /// the endpoints fixed: `f(x) = x + Σ cₖ·sin(π(k+1)x)/(π(k+1))`.
    pub fn new(ty: ResponseType, coeffs: &[Real; 5]) -> Self {
        let mut lut = Vec::with_capacity(RESPONSE_LUT_SIZE);
        match ty {
            ResponseType::Linear => {
                for i in 0..RESPONSE_LUT_SIZE {
                    lut.push(i as Real / (RESPONSE_LUT_SIZE - 1) as Real);
                }
            }
            ResponseType::Emor => {
                for i in 0..RESPONSE_LUT_SIZE {
                    let x = i as Real / (RESPONSE_LUT_SIZE - 1) as Real;
                    let mut v = x;
                    for (k, c) in coeffs.iter().enumerate() {
                        let f = (k + 1) as Real * std::f64::consts::PI;
                        v += c * (f * x).sin() / f;
                    }
                    lut.push(v);
                }
            }
        }

        let mut penalty = 0.0;
        for i in 1..lut.len() {
            let d = lut[i] - lut[i - 1];
            if d < 0.0 {
                penalty += d * d;
            }
        }
        penalty *= RESPONSE_LUT_SIZE as Real;

        // Monotone clamp: running max, bounded to [0, 1].
        let mut run = 0.0_f64;
        for v in lut.iter_mut() {
            run = run.max(v.clamp(0.0, 1.0));
            *v = run;
        }

        Self {
            lut,
            monotonicity_penalty: penalty,
        }
    }

    /// Radiance to device value; input clamped to [0, 1].
    pub fn apply(&self, v: Real) -> Real {
        let v = v.clamp(0.0, 1.0);
        let pos = v * (self.lut.len() - 1) as Real;
        let lo = pos.floor() as usize;
        let hi = (lo + 1).min(self.lut.len() - 1);
        let frac = pos - lo as Real;
        self.lut[lo] * (1.0 - frac) + self.lut[hi] * frac
    }

    /// Device value to radiance by inverting the monotone table.
    pub fn invert(&self, v: Real) -> Real {
        let v = v.clamp(0.0, 1.0);
        let n = self.lut.len();
        if v <= self.lut[0] {
            return 0.0;
        }
        if v >= self.lut[n - 1] {
            return 1.0;
        }
        // First index with lut[idx] >= v.
        let mut lo = 0usize;
        let mut hi = n - 1;
        while hi - lo > 1 {
            let mid = (lo + hi) / 2;
            if self.lut[mid] >= v {
                hi = mid;
            } else {
                lo = mid;
            }
        }
        let d = self.lut[hi] - self.lut[lo];
        let frac = if d > 1e-12 { (v - self.lut[lo]) / d } else { 0.0 };
        (lo as Real + frac) / (n - 1) as Real
    }
}

/// Fully assembled photometric transform for one image.
#[derive(Debug, Clone)]
pub struct ImagePhotometric {
    curve: ResponseCurve,
    /// Linear gain `2^(-exposure)`.
    gain: Real,
    wb: [Real; 3],
    vig: [Real; 3],
    vig_center: (Real, Real),
    center: (Real, Real),
    /// Squared half-diagonal, the vignetting radius unit.
    half_diag2: Real,
}

impl ImagePhotometric {
    pub fn new(image: &SrcImage) -> Self {
        let cx = image.width as Real / 2.0;
        let cy = image.height as Real / 2.0;
        Self {
            curve: ResponseCurve::new(image.response_type, &image.response),
            gain: (-image.exposure).exp2(),
            wb: [image.wb_red, 1.0, image.wb_blue],
            vig: [image.vig_b, image.vig_c, image.vig_d],
            vig_center: (image.vig_center_x, image.vig_center_y),
            center: (cx, cy),
            half_diag2: cx * cx + cy * cy,
        }
    }

    pub fn monotonicity_penalty(&self) -> Real {
        self.curve.monotonicity_penalty
    }

    /// Vignetting attenuation at an image position, floored away from zero
    /// so the inverse transform stays finite.
    pub fn vignetting(&self, pos: Pt2) -> Real {
        let dx = pos.x - self.center.0 - self.vig_center.0;
        let dy = pos.y - self.center.1 - self.vig_center.1;
        let r2 = (dx * dx + dy * dy) / self.half_diag2.max(1e-12);
        let r4 = r2 * r2;
        let v = 1.0 + self.vig[0] * r2 + self.vig[1] * r4 + self.vig[2] * r4 * r2;
        v.max(1e-3)
    }

    /// Linear scene radiance to device value.
    pub fn forward(&self, radiance: [Real; 3], pos: Pt2) -> [Real; 3] {
        let vig = self.vignetting(pos);
        let mut out = [0.0; 3];
        for c in 0..3 {
            let lin = radiance[c] * self.wb[c] * self.gain * vig;
            out[c] = self.curve.apply(lin);
        }
        out
    }

    /// Device value to linear scene radiance.
    pub fn inverse(&self, device: [Real; 3], pos: Pt2) -> [Real; 3] {
        let vig = self.vignetting(pos);
        let mut out = [0.0; 3];
        for c in 0..3 {
            let lin = self.curve.invert(device[c]);
            out[c] = lin / (self.wb[c] * self.gain * vig);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_curve_is_identity() {
        let curve = ResponseCurve::new(ResponseType::Linear, &[0.0; 5]);
        assert_eq!(curve.monotonicity_penalty, 0.0);
        for v in [0.0, 0.25, 0.5, 0.99, 1.0] {
            assert!((curve.apply(v) - v).abs() < 1e-9);
            assert!((curve.invert(v) - v).abs() < 1e-3);
        }
    }

    #[test]
    fn emor_curve_roundtrips_when_monotone() {
        let curve = ResponseCurve::new(ResponseType::Emor, &[0.2, -0.05, 0.01, 0.0, 0.0]);
        assert_eq!(curve.monotonicity_penalty, 0.0);
        for v in [0.1, 0.35, 0.6, 0.85] {
            let roundtrip = curve.invert(curve.apply(v));
            assert!((roundtrip - v).abs() < 1e-3, "v = {v}: got {roundtrip}");
        }
    }

    #[test]
    fn wild_coefficients_produce_penalty_but_stay_monotone() {
        let curve = ResponseCurve::new(ResponseType::Emor, &[-3.0, 2.0, -1.0, 0.5, 0.2]);
        assert!(curve.monotonicity_penalty > 0.0);
        for i in 1..curve.lut.len() {
            assert!(curve.lut[i] >= curve.lut[i - 1]);
        }
    }

    #[test]
    fn forward_inverse_roundtrip_with_exposure_and_vignetting() {
        let mut img = SrcImage::new(200, 100);
        img.exposure = -1.0;
        img.wb_red = 1.2;
        img.wb_blue = 0.9;
        img.vig_b = -0.2;
        img.response_type = ResponseType::Linear;
        let phot = ImagePhotometric::new(&img);

        let pos = Pt2::new(30.0, 40.0);
        let radiance = [0.2, 0.3, 0.1];
        let device = phot.forward(radiance, pos);
        let back = phot.inverse(device, pos);
        for c in 0..3 {
            assert!((back[c] - radiance[c]).abs() < 1e-6, "channel {c}");
        }
    }

    #[test]
    fn exposure_gain_doubles_per_negative_stop() {
        let mut img = SrcImage::new(100, 100);
        img.response_type = ResponseType::Linear;
        img.exposure = -1.0;
        let phot = ImagePhotometric::new(&img);
        let center = Pt2::new(50.0, 50.0);
        let device = phot.forward([0.25, 0.25, 0.25], center);
        assert!((device[1] - 0.5).abs() < 1e-9);
    }
}
