#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Key-point ≙ detected corner + orientation (radians) with subpixel precision
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Keypoint {
    pub x: f32, // Column, subpixel
    pub y: f32, // Row, subpixel
    #[cfg_attr(feature = "serde", serde(default))]
    pub angle: f32,
}

impl Keypoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y, angle: 0.0 }
    }
}

/// 256-bit binary descriptor = 32 bytes
pub type Descriptor = [u8; 32];

/// Number of differing bits between two packed binary descriptors.
#[inline]
pub fn hamming_distance(a: &[u8], b: &[u8]) -> u32 {
    debug_assert_eq!(a.len(), b.len());
    a.iter()
        .zip(b.iter())
        .map(|(&x, &y)| (x ^ y).count_ones())
        .sum()
}

#[derive(Debug, Clone, PartialEq)]
pub enum FrameError {
    EmptyDescriptor,
    InvalidDescriptorData { expected_len: usize, actual_len: usize },
    NonFiniteKeypoint { index: usize },
}

impl std::fmt::Display for FrameError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrameError::EmptyDescriptor => {
                write!(f, "Descriptor length must be at least one byte")
            }
            FrameError::InvalidDescriptorData { expected_len, actual_len } => {
                write!(f, "Descriptor data length mismatch: expected {}, got {}", expected_len, actual_len)
            }
            FrameError::NonFiniteKeypoint { index } => {
                write!(f, "Keypoint {} has a non-finite position", index)
            }
        }
    }
}

impl std::error::Error for FrameError {}

/// Read access to the keypoints and descriptors of one frame.
///
/// Keypoints and descriptors are aligned by index. All descriptors of a frame
/// share the same length.
pub trait KeypointFrame {
    fn num_keypoints(&self) -> usize;
    fn keypoint(&self, index: usize) -> Keypoint;
    fn descriptor(&self, index: usize) -> &[u8];
    fn descriptor_size_bits(&self) -> u32;
}

/// Keypoints of a single image with their binary descriptors stored row-major
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct VisualFrame {
    keypoints: Vec<Keypoint>,
    descriptor_bytes: usize,
    descriptors: Vec<u8>,
}

impl VisualFrame {
    /// Creates a frame from flat descriptor storage (`descriptor_bytes` per keypoint)
    pub fn new(keypoints: Vec<Keypoint>, descriptors: Vec<u8>, descriptor_bytes: usize) -> Result<Self, FrameError> {
        let frame = Self {
            keypoints,
            descriptor_bytes,
            descriptors,
        };
        frame.validate()?;
        Ok(frame)
    }

    /// Creates a frame from fixed-size descriptors, e.g. 32-byte ORB descriptors
    pub fn from_descriptors<const N: usize>(keypoints: Vec<Keypoint>, descriptors: &[[u8; N]]) -> Result<Self, FrameError> {
        let flat = descriptors.iter().flat_map(|d| d.iter().copied()).collect();
        Self::new(keypoints, flat, N)
    }

    /// Checks descriptor layout and keypoint positions
    pub fn validate(&self) -> Result<(), FrameError> {
        if self.descriptor_bytes == 0 {
            return Err(FrameError::EmptyDescriptor);
        }
        let expected_len = self.keypoints.len() * self.descriptor_bytes;
        if self.descriptors.len() != expected_len {
            return Err(FrameError::InvalidDescriptorData {
                expected_len,
                actual_len: self.descriptors.len(),
            });
        }
        if let Some(index) = self.keypoints.iter().position(|kp| !kp.x.is_finite() || !kp.y.is_finite()) {
            return Err(FrameError::NonFiniteKeypoint { index });
        }
        Ok(())
    }

    pub fn keypoints(&self) -> &[Keypoint] {
        &self.keypoints
    }

    pub fn descriptor_bytes(&self) -> usize {
        self.descriptor_bytes
    }

    pub fn len(&self) -> usize {
        self.keypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keypoints.is_empty()
    }
}

impl KeypointFrame for VisualFrame {
    fn num_keypoints(&self) -> usize {
        self.keypoints.len()
    }

    fn keypoint(&self, index: usize) -> Keypoint {
        self.keypoints[index]
    }

    fn descriptor(&self, index: usize) -> &[u8] {
        let start = index * self.descriptor_bytes;
        &self.descriptors[start..start + self.descriptor_bytes]
    }

    fn descriptor_size_bits(&self) -> u32 {
        (self.descriptor_bytes * 8) as u32
    }
}

/// Number of worker threads used when none is configured
pub fn default_threads() -> usize {
    num_cpus::get().max(1)
}

/// Initialize Rayon thread pool with the specified number of threads
pub fn init_thread_pool(n_threads: usize) -> Result<(), rayon::ThreadPoolBuildError> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(n_threads)
        .build_global()
}
