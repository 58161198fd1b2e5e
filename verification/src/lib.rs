//! On-device age verification.
//!
//! Two independent checks feed one pass/fail verdict:
//! 1. **Facial estimate**: several frames are scored by an on-device model; the
//!    median age of the confident samples must meet the minimum age.
//! 2. **Challenge quiz**: a few easy knowledge questions, each with a timeout.
//!
//! A passed verdict is cached with an expiry so the subject is not re-checked
//! every session. Nothing biometric is ever persisted: samples and frames are
//! wiped as soon as the estimate is computed, and the cached record holds only
//! a flag and two timestamps.
//!
//! The [`VerificationOrchestrator`] owns the state machine and the verdict.
//! Hardware, inference, storage and presentation are injected collaborators.

pub mod config;
pub mod error;
pub mod estimator;
pub mod events;
pub mod orchestrator;
pub mod pipeline;
pub mod presenter;
pub mod question;
pub mod state;
pub mod stop;
pub mod verdict;

pub use config::{ChallengeConfig, FacialConfig, VerificationConfig};
pub use error::{ChallengeError, ConfigError, EstimationError, VerificationError};
pub use estimator::{aggregate_samples, median_age, AgeEstimate, AgeSample, FacialAgeEstimator, SamplingParams};
pub use events::{ChannelSink, EventSink, NoopSink, PresentedQuestion, VerificationEvent};
pub use orchestrator::{Collaborators, VerificationOrchestrator, VerificationOutcome};
pub use pipeline::{AgeEstimation, ChallengeQuiz};
pub use presenter::{AnswerSender, AnswerSubmission, ChallengePresenter, ChallengeSettings, QuizOutcome};
pub use question::{ChallengeQuestion, ChallengeQuestionSet, Difficulty, QuestionCategory};
pub use state::VerificationState;
pub use stop::StopToken;
pub use verdict::{CachedVerdict, VerdictCache};
