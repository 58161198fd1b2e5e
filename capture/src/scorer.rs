//! Age-scoring trait.

use crate::{CaptureError, Frame};

/// One scorer observation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AgeScore {
    /// Estimated age in whole years.
    pub age: u32,
    /// Scorer confidence in `[0, 1]`.
    pub confidence: f32,
}

impl AgeScore {
    pub fn new(age: u32, confidence: f32) -> Self {
        Self { age, confidence }
    }

    /// Whether the confidence lies in `[0, 1]` (NaN is rejected).
    pub fn is_well_formed(&self) -> bool {
        (0.0..=1.0).contains(&self.confidence)
    }
}

/// An on-device image-to-age inference function.
///
/// The pipeline makes no assumption about how the score is produced.
pub trait AgeScorer: Send + Sync {
    fn score(&self, frame: &Frame) -> Result<AgeScore, CaptureError>;
}
