use std::sync::Arc;

use stereo_core::Keypoint;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Source of predicted frame1 positions for frame0 keypoints.
///
/// Predictions land in frame1, so all rows are frame1 rows.
pub trait StereoGeometry {
    /// Pixel rows of frame1's image. Sizes the row lookup table, which indexes
    /// frame1 keypoints, so for a camera pair this is the second camera's height.
    fn image_height(&self) -> u32;

    /// Predicted (x, y) of `keypoint` in frame1, or `None` if it cannot be predicted
    fn predict_keypoint(&self, frame0_index: usize, keypoint: &Keypoint) -> Option<(f32, f32)>;
}

impl<G: StereoGeometry + ?Sized> StereoGeometry for Arc<G> {
    fn image_height(&self) -> u32 {
        (**self).image_height()
    }

    fn predict_keypoint(&self, frame0_index: usize, keypoint: &Keypoint) -> Option<(f32, f32)> {
        (**self).predict_keypoint(frame0_index, keypoint)
    }
}

impl<G: StereoGeometry + ?Sized> StereoGeometry for &G {
    fn image_height(&self) -> u32 {
        (**self).image_height()
    }

    fn predict_keypoint(&self, frame0_index: usize, keypoint: &Keypoint) -> Option<(f32, f32)> {
        (**self).predict_keypoint(frame0_index, keypoint)
    }
}

/// Pinhole camera intrinsics without distortion
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PinholeCamera {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
    pub width: u32,
    pub height: u32,
}

impl PinholeCamera {
    pub fn new(fx: f64, fy: f64, cx: f64, cy: f64, width: u32, height: u32) -> Self {
        Self { fx, fy, cx, cy, width, height }
    }

    /// Pixel (u, v) to normalized image coordinates, i.e. K^-1 [u v 1]^T
    pub fn normalize(&self, u: f64, v: f64) -> (f64, f64) {
        ((u - self.cx) / self.fx, (v - self.cy) / self.fy)
    }

    /// Normalized image coordinates back to pixels
    pub fn denormalize(&self, x_n: f64, y_n: f64) -> (f64, f64) {
        (x_n * self.fx + self.cx, y_n * self.fy + self.cy)
    }
}

/// Row-major 3x3 rotation taking frame0 bearings into frame1
pub type Rotation = [[f64; 3]; 3];

pub const IDENTITY_ROTATION: Rotation = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];

/// Predicts keypoint positions from the inter-frame rotation.
///
/// Translation is ignored, which is exact for points at infinity and a good
/// approximation for small baselines.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RotationPredictor {
    pub camera0: PinholeCamera,
    pub camera1: PinholeCamera,
    pub rotation_1_0: Rotation,
}

impl RotationPredictor {
    pub fn new(camera0: PinholeCamera, camera1: PinholeCamera, rotation_1_0: Rotation) -> Self {
        Self { camera0, camera1, rotation_1_0 }
    }

    /// Same camera in both frames
    pub fn monocular(camera: PinholeCamera, rotation_1_0: Rotation) -> Self {
        Self::new(camera, camera, rotation_1_0)
    }

    /// Rotation about the camera's optical (z) axis, useful for synthetic setups
    pub fn rotation_about_z(angle: f64) -> Rotation {
        let (s, c) = angle.sin_cos();
        [[c, -s, 0.0], [s, c, 0.0], [0.0, 0.0, 1.0]]
    }
}

impl StereoGeometry for RotationPredictor {
    fn image_height(&self) -> u32 {
        self.camera1.height
    }

    fn predict_keypoint(&self, _frame0_index: usize, keypoint: &Keypoint) -> Option<(f32, f32)> {
        let (xn, yn) = self.camera0.normalize(keypoint.x as f64, keypoint.y as f64);
        let bearing = [xn, yn, 1.0];
        let r = &self.rotation_1_0;
        let rotated: [f64; 3] = std::array::from_fn(|i| r[i][0] * bearing[0] + r[i][1] * bearing[1] + r[i][2] * bearing[2]);

        if rotated[2] <= f64::EPSILON {
            return None;
        }
        let (u, v) = self.camera1.denormalize(rotated[0] / rotated[2], rotated[1] / rotated[2]);
        if !u.is_finite() || !v.is_finite() {
            return None;
        }
        Some((u as f32, v as f32))
    }
}

/// Predictions computed elsewhere, one per frame0 keypoint
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PredictedPositions {
    pub image_height: u32,
    pub positions: Vec<Option<(f32, f32)>>,
}

impl PredictedPositions {
    pub fn new(image_height: u32, positions: Vec<Option<(f32, f32)>>) -> Self {
        Self { image_height, positions }
    }

    /// Predicts every keypoint at its own frame0 position
    pub fn identity(image_height: u32, keypoints: &[Keypoint]) -> Self {
        Self::new(image_height, keypoints.iter().map(|kp| Some((kp.x, kp.y))).collect())
    }
}

impl StereoGeometry for PredictedPositions {
    fn image_height(&self) -> u32 {
        self.image_height
    }

    fn predict_keypoint(&self, frame0_index: usize, _keypoint: &Keypoint) -> Option<(f32, f32)> {
        self.positions.get(frame0_index).copied().flatten()
    }
}
