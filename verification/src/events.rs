//! Observational events for a presentation layer.
//!
//! The pipeline emits events and never waits on whoever consumes them.

use tokio::sync::mpsc;

use crate::error::VerificationError;
use crate::presenter::QuizOutcome;
use crate::question::{Difficulty, QuestionCategory};
use crate::state::VerificationState;
use crate::verdict::CachedVerdict;

/// A question as shown to the subject. The correct index is withheld.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PresentedQuestion {
    /// 1-based position within the quiz.
    pub position: usize,
    pub total: usize,
    pub text: String,
    pub answers: Vec<String>,
    pub category: QuestionCategory,
    pub difficulty: Difficulty,
}

#[derive(Clone, Debug, PartialEq)]
pub enum VerificationEvent {
    StateChanged {
        from: VerificationState,
        to: VerificationState,
    },
    /// Fraction of the run completed, in `[0, 1]`.
    Progress(f32),
    QuestionPresented(PresentedQuestion),
    QuestionAnswered {
        position: usize,
        correct: bool,
        timed_out: bool,
    },
    ChallengesComplete(QuizOutcome),
    Passed {
        verdict: CachedVerdict,
        from_cache: bool,
    },
    Failed(VerificationError),
}

/// Receives pipeline events. Implementations must not block.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: VerificationEvent);
}

/// Discards every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn emit(&self, _event: VerificationEvent) {}
}

/// Forwards events into an unbounded channel.
#[derive(Clone, Debug)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<VerificationEvent>,
}

impl ChannelSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<VerificationEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: VerificationEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("event receiver dropped, discarding event");
        }
    }
}
