//! Mathematical utilities and type definitions.

use nalgebra::{Matrix3, Point2, Vector2, Vector3};

/// Scalar type used throughout the library (currently `f64`).
pub type Real = f64;

/// 2D vector with [`Real`] components.
pub type Vec2 = Vector2<Real>;
/// 3D vector with [`Real`] components.
pub type Vec3 = Vector3<Real>;
/// 2D point with [`Real`] coordinates.
pub type Pt2 = Point2<Real>;
/// 3×3 matrix with [`Real`] entries.
pub type Mat3 = Matrix3<Real>;

/// Convert degrees to radians.
#[inline]
pub fn deg_to_rad(d: Real) -> Real {
    d * std::f64::consts::PI / 180.0
}

/// Convert radians to degrees.
#[inline]
pub fn rad_to_deg(r: Real) -> Real {
    r * 180.0 / std::f64::consts::PI
}

/// Even-odd rule point-in-polygon test.
///
/// Vertices are taken in order; the polygon is implicitly closed. Points on
/// an edge may fall on either side.
pub fn point_in_polygon(p: Pt2, polygon: &[Pt2]) -> bool {
    if polygon.len() < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = polygon.len() - 1;
    for i in 0..polygon.len() {
        let (a, b) = (polygon[i], polygon[j]);
        if (a.y > p.y) != (b.y > p.y) {
            let x_cross = a.x + (p.y - a.y) / (b.y - a.y) * (b.x - a.x);
            if p.x < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degrees_radians_roundtrip() {
        for d in [-180.0, -90.0, 0.0, 45.0, 360.0] {
            assert!((rad_to_deg(deg_to_rad(d)) - d).abs() < 1e-12);
        }
    }

    #[test]
    fn point_in_polygon_square() {
        let square = [
            Pt2::new(0.0, 0.0),
            Pt2::new(10.0, 0.0),
            Pt2::new(10.0, 10.0),
            Pt2::new(0.0, 10.0),
        ];
        assert!(point_in_polygon(Pt2::new(5.0, 5.0), &square));
        assert!(!point_in_polygon(Pt2::new(15.0, 5.0), &square));
        assert!(!point_in_polygon(Pt2::new(5.0, -1.0), &square));
    }

    #[test]
    fn point_in_polygon_concave() {
        // L-shape: the notch at the top right is outside.
        let ell = [
            Pt2::new(0.0, 0.0),
            Pt2::new(10.0, 0.0),
            Pt2::new(10.0, 5.0),
            Pt2::new(5.0, 5.0),
            Pt2::new(5.0, 10.0),
            Pt2::new(0.0, 10.0),
        ];
        assert!(point_in_polygon(Pt2::new(2.0, 8.0), &ell));
        assert!(!point_in_polygon(Pt2::new(8.0, 8.0), &ell));
    }
}
