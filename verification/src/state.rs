//! Verification state machine states.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a verification run currently is.
///
/// Owned and mutated only by the orchestrator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VerificationState {
    #[default]
    NotStarted,
    InitializingCapture,
    CapturingSubject,
    AnalyzingSubject,
    PresentingChallenges,
    AwaitingAnswers,
    Verifying,
    Passed,
    Failed,
}

impl fmt::Display for VerificationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NotStarted => "not started",
            Self::InitializingCapture => "initializing capture",
            Self::CapturingSubject => "capturing subject",
            Self::AnalyzingSubject => "analyzing subject",
            Self::PresentingChallenges => "presenting challenges",
            Self::AwaitingAnswers => "awaiting answers",
            Self::Verifying => "verifying",
            Self::Passed => "passed",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}
