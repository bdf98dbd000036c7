//! Pinhole camera profile and the camera configuration of a tracker.

use nalgebra::Matrix3;

/// Pinhole camera with radial and tangential distortion.
///
/// The default value is an invalid camera (zero resolution); trackers treat it
/// as "unknown" and derive a camera from the frame source instead.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PinholeCamera {
    pub width: u32,
    pub height: u32,
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
    /// Radial (k1, k2) and tangential (p1, p2) distortion.
    pub distortion: [f64; 4],
}

impl PinholeCamera {
    pub fn new(width: u32, height: u32, fx: f64, fy: f64, cx: f64, cy: f64) -> Self {
        Self {
            width,
            height,
            fx,
            fy,
            cx,
            cy,
            distortion: [0.0; 4],
        }
    }

    /// Camera with square pixels and the principal point in the image center.
    pub fn from_fov_x(width: u32, height: u32, fov_x: f64) -> Self {
        let f = width as f64 * 0.5 / (fov_x * 0.5).tan();
        Self::new(width, height, f, f, width as f64 * 0.5, height as f64 * 0.5)
    }

    pub fn with_distortion(mut self, k1: f64, k2: f64, p1: f64, p2: f64) -> Self {
        self.distortion = [k1, k2, p1, p2];
        self
    }

    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0 && self.fx > 0.0 && self.fy > 0.0
    }

    pub fn has_distortion(&self) -> bool {
        self.distortion.iter().any(|d| *d != 0.0)
    }

    /// Horizontal field of view in radians.
    pub fn fov_x(&self) -> f64 {
        2.0 * (self.width as f64 * 0.5 / self.fx).atan()
    }

    /// Intrinsic matrix K.
    pub fn intrinsics(&self) -> Matrix3<f64> {
        Matrix3::new(self.fx, 0.0, self.cx, 0.0, self.fy, self.cy, 0.0, 0.0, 1.0)
    }

    pub fn matches_resolution(&self, width: u32, height: u32) -> bool {
        self.width == width && self.height == height
    }
}

/// Camera profile together with how much the tracker may trust it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraConfiguration {
    pub camera: PinholeCamera,
    /// Expected precision of the profile; `None` when unknown.
    pub precision: Option<f64>,
    /// Whether the tracking algorithm should refine the profile.
    pub optimize: bool,
}

impl CameraConfiguration {
    /// An invalid camera cannot be trusted, so optimization is forced and the
    /// precision is dropped.
    pub fn new(camera: PinholeCamera, precision: Option<f64>, optimize: bool) -> Self {
        if camera.is_valid() {
            Self {
                camera,
                precision,
                optimize,
            }
        } else {
            Self::unknown()
        }
    }

    pub fn unknown() -> Self {
        Self {
            camera: PinholeCamera::default(),
            precision: None,
            optimize: true,
        }
    }
}

impl Default for CameraConfiguration {
    fn default() -> Self {
        Self::unknown()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_from_fov_roundtrips_fov() {
        let fov = 65f64.to_radians();
        let camera = PinholeCamera::from_fov_x(640, 480, fov);
        assert!(camera.is_valid());
        assert_relative_eq!(camera.fov_x(), fov, epsilon = 1e-12);
        assert_eq!(camera.intrinsics()[(0, 2)], 320.0);
        assert_eq!(camera.intrinsics()[(2, 2)], 1.0);
    }

    #[test]
    fn test_invalid_camera_forces_optimization() {
        let config = CameraConfiguration::new(PinholeCamera::default(), Some(0.5), false);
        assert!(config.optimize);
        assert_eq!(config.precision, None);

        let camera = PinholeCamera::new(320, 240, 300.0, 300.0, 160.0, 120.0);
        let config = CameraConfiguration::new(camera, Some(0.5), false);
        assert!(!config.optimize);
        assert_eq!(config.precision, Some(0.5));
        assert_eq!(config.camera, camera);
    }

    #[test]
    fn test_distortion_flag() {
        let camera = PinholeCamera::new(10, 10, 5.0, 5.0, 5.0, 5.0);
        assert!(!camera.has_distortion());
        assert!(camera.with_distortion(0.1, 0.0, 0.0, 0.0).has_distortion());
    }
}
