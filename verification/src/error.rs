use std::time::Duration;

use thiserror::Error;

/// Failures of the facial age estimator.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum EstimationError {
    #[error("capture device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("capture device not ready: {0}")]
    DeviceTimeout(String),

    #[error("no sample reached confidence {min_confidence:.2} ({collected} collected)")]
    LowConfidence { collected: usize, min_confidence: f32 },

    #[error("sampling stopped before any sample was collected")]
    Stopped,

    /// An unexpected failure inside an estimator implementation.
    #[error("estimation failed: {0}")]
    Internal(String),
}

/// Failures of the challenge quiz. Timeouts are not errors; only misuse is.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ChallengeError {
    #[error("requested {requested} questions but the pool only has {available}")]
    NotEnoughQuestions { requested: usize, available: usize },

    #[error("a quiz needs at least one question")]
    NoQuestionsRequested,

    #[error("invalid question '{text}': {reason}")]
    InvalidQuestion { text: String, reason: String },

    /// An unexpected failure inside a quiz implementation.
    #[error("quiz failed: {0}")]
    Internal(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// The single error channel of a verification run.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum VerificationError {
    #[error("verification for {0} is already in progress")]
    AlreadyInProgress(String),

    #[error("capture initialization failed: {0}")]
    CaptureInit(EstimationError),

    #[error("analysis failed: {0}")]
    Analysis(EstimationError),

    #[error("estimated age {estimated} is below the minimum of {minimum}")]
    Underage { estimated: u32, minimum: u32 },

    #[error("challenge failed: {correct}/{total} correct, {required} required")]
    ChallengeFailed {
        correct: usize,
        total: usize,
        required: usize,
    },

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("verification step failed: {0}")]
    Step(String),
}

impl VerificationError {
    /// Text suitable for showing to the person being verified.
    pub fn user_message(&self) -> String {
        match self {
            Self::AlreadyInProgress(_) => {
                "A verification is already running. Please wait for it to finish.".to_string()
            }
            Self::CaptureInit(_) => "The camera could not be started. Check that it is \
                                     connected and that camera permission is granted."
                .to_string(),
            Self::Analysis(EstimationError::LowConfidence { .. }) => {
                "We couldn't get a clear view of your face. Move to a well-lit spot, \
                 face the camera directly, and try again."
                    .to_string()
            }
            Self::Analysis(_) => "Face analysis was interrupted. Please try again.".to_string(),
            Self::Underage { minimum, .. } => {
                format!("You must be at least {minimum} years old to continue.")
            }
            Self::ChallengeFailed {
                correct,
                total,
                required,
            } => format!(
                "You answered {correct}/{total} questions correctly; {required} are required."
            ),
            Self::Configuration(_) | Self::Step(_) => {
                "Verification could not be completed. Please try again later.".to_string()
            }
        }
    }
}

impl From<EstimationError> for VerificationError {
    fn from(e: EstimationError) -> Self {
        match e {
            EstimationError::DeviceUnavailable(_) | EstimationError::DeviceTimeout(_) => {
                Self::CaptureInit(e)
            }
            EstimationError::LowConfidence { .. } | EstimationError::Stopped => Self::Analysis(e),
            EstimationError::Internal(_) => Self::Step(e.to_string()),
        }
    }
}

impl From<ChallengeError> for VerificationError {
    fn from(e: ChallengeError) -> Self {
        match e {
            ChallengeError::Internal(_) => Self::Step(e.to_string()),
            _ => Self::Configuration(e.to_string()),
        }
    }
}

impl From<ConfigError> for VerificationError {
    fn from(e: ConfigError) -> Self {
        Self::Configuration(e.to_string())
    }
}

impl From<agegate_store::StoreError> for VerificationError {
    fn from(e: agegate_store::StoreError) -> Self {
        Self::Step(e.to_string())
    }
}

/// Human-readable duration for error messages.
pub(crate) fn describe_timeout(timeout: Duration) -> String {
    format!("no ready signal within {:.1}s", timeout.as_secs_f64())
}
