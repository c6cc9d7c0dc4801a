use stereo_core::FrameError;

/// Internal invariant broken by the caller or by the matcher itself.
///
/// A correct caller never observes one of these; the running invocation is
/// aborted as soon as one is detected.
#[derive(Debug, Clone, PartialEq)]
pub enum ContractViolation {
    NonPositiveHalfWindow(u32),
    ScoreOutOfRange(f64),
    MalformedRowTable { row: usize, value: usize, view_len: usize },
    UnsortedView { position: usize },
    IndexOutOfRange { index: usize, len: usize },
}

impl std::fmt::Display for ContractViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContractViolation::NonPositiveHalfWindow(w) => {
                write!(f, "Search window half side must be > 0, got {}", w)
            }
            ContractViolation::ScoreOutOfRange(s) => {
                write!(f, "Matching score {} outside (0, 1]", s)
            }
            ContractViolation::MalformedRowTable { row, value, view_len } => {
                write!(f, "Row table entry {} for row {} is invalid for a view of {} keypoints", value, row, view_len)
            }
            ContractViolation::UnsortedView { position } => {
                write!(f, "Sorted keypoint view decreases in row at position {}", position)
            }
            ContractViolation::IndexOutOfRange { index, len } => {
                write!(f, "Keypoint index {} out of range for {} keypoints", index, len)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MatchError {
    InvalidImageHeight(u32),
    InvalidThreshold { name: &'static str, value: f64 },
    InvalidWindow { initial: u32, escalated: u32 },
    DescriptorSizeMismatch { frame0_bits: u32, frame1_bits: u32 },
    Frame(FrameError),
    Contract(ContractViolation),
}

impl MatchError {
    /// True for programming defects, false for rejected input
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, MatchError::Contract(_))
    }
}

impl std::fmt::Display for MatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchError::InvalidImageHeight(h) => {
                write!(f, "Invalid image height: {} (must be > 0)", h)
            }
            MatchError::InvalidThreshold { name, value } => {
                write!(f, "Invalid {}: {} (must be in (0, 1])", name, value)
            }
            MatchError::InvalidWindow { initial, escalated } => {
                write!(f, "Invalid search windows: initial {} / escalated {} (need 0 < initial <= escalated)", initial, escalated)
            }
            MatchError::DescriptorSizeMismatch { frame0_bits, frame1_bits } => {
                write!(f, "Descriptor size mismatch: frame0 has {} bits, frame1 has {} bits", frame0_bits, frame1_bits)
            }
            MatchError::Frame(e) => write!(f, "Frame error: {}", e),
            MatchError::Contract(v) => write!(f, "Contract violation: {}", v),
        }
    }
}

impl std::error::Error for MatchError {}

impl From<FrameError> for MatchError {
    fn from(err: FrameError) -> Self {
        MatchError::Frame(err)
    }
}

impl From<ContractViolation> for MatchError {
    fn from(violation: ContractViolation) -> Self {
        MatchError::Contract(violation)
    }
}

pub type MatchResult<T> = Result<T, MatchError>;
