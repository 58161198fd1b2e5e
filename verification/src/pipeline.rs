//! Sub-pipeline seams used by the orchestrator.
//!
//! The orchestrator depends on these traits rather than on the concrete
//! estimator and presenter so either can be replaced (or faked in tests).

use async_trait::async_trait;

use crate::error::{ChallengeError, EstimationError};
use crate::estimator::{AgeEstimate, SamplingParams};
use crate::presenter::QuizOutcome;
use crate::stop::StopToken;

/// Produces an age estimate for the subject in front of the device.
#[async_trait]
pub trait AgeEstimation: Send + Sync {
    async fn estimate(
        &self,
        params: &SamplingParams,
        stop: &StopToken,
    ) -> Result<AgeEstimate, EstimationError>;
}

/// Runs a knowledge quiz. Unanswered questions count as wrong, not as errors.
#[async_trait]
pub trait ChallengeQuiz: Send + Sync {
    async fn run_quiz(&self, question_count: usize) -> Result<QuizOutcome, ChallengeError>;
}
