//! Image ↔ panorama coordinate transforms.
//!
//! Forward pipeline (image pixel to canvas pixel):
//! center/shift → inverse radial distortion → rectilinear ray →
//! yaw/pitch/roll rotation → output projection.
//!
//! The frame is x-right, y-down, z-forward. Yaw rotates about y, pitch
//! about x, roll about the optical axis.

use crate::math::{deg_to_rad, Mat3, Pt2, Real, Vec3};
use crate::model::{PanoOptions, Projection, SrcImage};

/// Precomputed mapping between one source image and the panorama canvas.
#[derive(Debug, Clone)]
pub struct ImageTransform {
    src_w: Real,
    src_h: Real,
    /// Source focal length in pixels.
    focal: Real,
    shift_d: Real,
    shift_e: Real,
    /// Distortion polynomial (a, b, c, d) with d = 1 − a − b − c.
    radial: [Real; 4],
    /// Distortion radius unit: half the smaller image dimension.
    radius_scale: Real,
    /// Image-to-world rotation.
    rot: Mat3,
    inv_rot: Mat3,
    projection: Projection,
    pano_w: Real,
    pano_h: Real,
    hfov_rad: Real,
    vfov_rad: Real,
    /// Canvas focal length for rectilinear output.
    pano_focal: Real,
}

impl ImageTransform {
    pub fn new(image: &SrcImage, options: &PanoOptions) -> Self {
        let src_w = image.width as Real;
        let src_h = image.height as Real;
        let focal = src_w / (2.0 * deg_to_rad(image.hfov / 2.0).tan());

        let (a, b, c) = (image.radial_a, image.radial_b, image.radial_c);
        let radial = [a, b, c, 1.0 - a - b - c];

        let yaw = deg_to_rad(image.yaw);
        let pitch = deg_to_rad(image.pitch);
        let roll = deg_to_rad(image.roll);
        let ry = Mat3::new(
            yaw.cos(),
            0.0,
            yaw.sin(),
            0.0,
            1.0,
            0.0,
            -yaw.sin(),
            0.0,
            yaw.cos(),
        );
        let rx = Mat3::new(
            1.0,
            0.0,
            0.0,
            0.0,
            pitch.cos(),
            -pitch.sin(),
            0.0,
            pitch.sin(),
            pitch.cos(),
        );
        let rz = Mat3::new(
            roll.cos(),
            -roll.sin(),
            0.0,
            roll.sin(),
            roll.cos(),
            0.0,
            0.0,
            0.0,
            1.0,
        );
        let rot = ry * rx * rz;
        let inv_rot = rot.transpose();

        let pano_w = options.width as Real;
        let pano_h = options.height as Real;
        let hfov_rad = deg_to_rad(options.hfov);
        let vfov_rad = deg_to_rad(options.vfov());
        let pano_focal = pano_w / (2.0 * (hfov_rad / 2.0).tan().max(1e-9));

        Self {
            src_w,
            src_h,
            focal,
            shift_d: image.shift_d,
            shift_e: image.shift_e,
            radial,
            radius_scale: src_w.min(src_h) / 2.0,
            rot,
            inv_rot,
            projection: options.projection,
            pano_w,
            pano_h,
            hfov_rad,
            vfov_rad,
            pano_focal,
        }
    }

    /// Forward distortion: ideal radius to observed radius, both in
    /// normalized units.
    fn distort(&self, r: Real) -> Real {
        let [a, b, c, d] = self.radial;
        (((a * r + b) * r + c) * r + d) * r
    }

    /// Inverse distortion by Newton iteration; the polynomial is close to
    /// identity for sane lens parameters, so a handful of steps suffices.
    fn undistort(&self, r_obs: Real) -> Real {
        let [a, b, c, d] = self.radial;
        let mut r = r_obs;
        for _ in 0..10 {
            let f = (((a * r + b) * r + c) * r + d) * r - r_obs;
            let df = ((4.0 * a * r + 3.0 * b) * r + 2.0 * c) * r + d;
            if df.abs() < 1e-12 {
                break;
            }
            let step = f / df;
            r -= step;
            if step.abs() < 1e-10 {
                break;
            }
        }
        r
    }

    /// Map an image pixel to a world-space unit ray.
    fn image_to_ray(&self, p: Pt2) -> Vec3 {
        let x = p.x - self.src_w / 2.0 - self.shift_d;
        let y = p.y - self.src_h / 2.0 - self.shift_e;
        let r_obs = (x * x + y * y).sqrt() / self.radius_scale;
        let scale = if r_obs > 1e-12 {
            self.undistort(r_obs) / r_obs
        } else {
            1.0
        };
        let v = Vec3::new(x * scale, y * scale, self.focal);
        (self.rot * v).normalize()
    }

    /// Map a world ray back to an image pixel, if it lands inside the frame.
    fn ray_to_image(&self, ray: Vec3) -> Option<Pt2> {
        let v = self.inv_rot * ray;
        if v.z <= 1e-9 {
            return None;
        }
        let x = v.x / v.z * self.focal;
        let y = v.y / v.z * self.focal;
        let r_ideal = (x * x + y * y).sqrt() / self.radius_scale;
        let scale = if r_ideal > 1e-12 {
            self.distort(r_ideal) / r_ideal
        } else {
            1.0
        };
        let px = x * scale + self.src_w / 2.0 + self.shift_d;
        let py = y * scale + self.src_h / 2.0 + self.shift_e;
        if px >= 0.0 && px < self.src_w && py >= 0.0 && py < self.src_h {
            Some(Pt2::new(px, py))
        } else {
            None
        }
    }

    fn ray_to_pano(&self, ray: Vec3) -> Option<Pt2> {
        let lon = ray.x.atan2(ray.z);
        let lat = (ray.y / ray.norm()).asin();
        match self.projection {
            Projection::Equirectangular => Some(Pt2::new(
                (lon / self.hfov_rad + 0.5) * self.pano_w,
                (lat / self.vfov_rad + 0.5) * self.pano_h,
            )),
            Projection::Cylindrical => {
                let half_v = (self.vfov_rad / 2.0).tan();
                Some(Pt2::new(
                    (lon / self.hfov_rad + 0.5) * self.pano_w,
                    (lat.tan() / (2.0 * half_v) + 0.5) * self.pano_h,
                ))
            }
            Projection::Rectilinear => {
                if ray.z <= 1e-9 {
                    return None;
                }
                Some(Pt2::new(
                    ray.x / ray.z * self.pano_focal + self.pano_w / 2.0,
                    ray.y / ray.z * self.pano_focal + self.pano_h / 2.0,
                ))
            }
        }
    }

    fn pano_to_ray(&self, p: Pt2) -> Vec3 {
        match self.projection {
            Projection::Equirectangular => {
                let lon = (p.x / self.pano_w - 0.5) * self.hfov_rad;
                let lat = (p.y / self.pano_h - 0.5) * self.vfov_rad;
                Vec3::new(lat.cos() * lon.sin(), lat.sin(), lat.cos() * lon.cos())
            }
            Projection::Cylindrical => {
                let lon = (p.x / self.pano_w - 0.5) * self.hfov_rad;
                let half_v = (self.vfov_rad / 2.0).tan();
                let ty = (p.y / self.pano_h - 0.5) * 2.0 * half_v;
                Vec3::new(lon.sin(), ty, lon.cos()).normalize()
            }
            Projection::Rectilinear => Vec3::new(
                (p.x - self.pano_w / 2.0) / self.pano_focal,
                (p.y - self.pano_h / 2.0) / self.pano_focal,
                1.0,
            )
            .normalize(),
        }
    }

    /// Image pixel to canvas pixel.
    pub fn image_to_pano(&self, p: Pt2) -> Option<Pt2> {
        self.ray_to_pano(self.image_to_ray(p))
    }

    /// Canvas pixel to image pixel; `None` outside the image frame.
    pub fn pano_to_image(&self, p: Pt2) -> Option<Pt2> {
        self.ray_to_image(self.pano_to_ray(p))
    }

    /// Map a pixel of this image into another image's pixel space.
    pub fn image_to_other(&self, other: &ImageTransform, p: Pt2) -> Option<Pt2> {
        other.ray_to_image(self.image_to_ray(p))
    }
}
