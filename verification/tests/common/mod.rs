//! Shared fakes and wiring for the verification integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use agegate_nullables::{NullClock, NullStore};
use agegate_store::KeyValueStore;
use agegate_types::SubjectId;
use agegate_verification::{
    AgeEstimate, AgeEstimation, ChallengeError, ChallengeQuiz, ChannelSink, Collaborators,
    EstimationError, QuizOutcome, SamplingParams, StopToken, VerificationConfig,
    VerificationEvent, VerificationOrchestrator,
};
use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::Notify;

pub const NOW: u64 = 1_700_000_000;

/// Estimator fake returning a fixed result and counting calls.
pub struct FakeEstimator {
    result: Result<AgeEstimate, EstimationError>,
    panics: bool,
    calls: AtomicUsize,
}

impl FakeEstimator {
    pub fn age(age: u32, confidence: f32) -> Self {
        Self::returning(Ok(AgeEstimate {
            age,
            confidence,
            samples_used: 5,
        }))
    }

    pub fn returning(result: Result<AgeEstimate, EstimationError>) -> Self {
        Self {
            result,
            panics: false,
            calls: AtomicUsize::new(0),
        }
    }

    /// An estimator whose implementation blows up mid-run.
    pub fn panicking() -> Self {
        Self {
            panics: true,
            ..Self::returning(Err(EstimationError::Stopped))
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AgeEstimation for FakeEstimator {
    async fn estimate(
        &self,
        _params: &SamplingParams,
        _stop: &StopToken,
    ) -> Result<AgeEstimate, EstimationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.panics {
            panic!("inference backend crashed");
        }
        self.result.clone()
    }
}

/// Quiz fake with a fixed score; optionally blocks until released.
pub struct FakeQuiz {
    correct: usize,
    passing_score: usize,
    gate: Option<Arc<Notify>>,
    error: Option<ChallengeError>,
    calls: AtomicUsize,
}

impl FakeQuiz {
    pub fn scoring(correct: usize, passing_score: usize) -> Self {
        Self {
            correct,
            passing_score,
            gate: None,
            error: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// A quiz that fails with `error` instead of scoring.
    pub fn failing(error: ChallengeError) -> Self {
        Self {
            error: Some(error),
            ..Self::scoring(0, 2)
        }
    }

    /// A quiz that waits for `gate.notify_one()` before completing.
    pub fn gated(correct: usize, passing_score: usize, gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::scoring(correct, passing_score)
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChallengeQuiz for FakeQuiz {
    async fn run_quiz(&self, question_count: usize) -> Result<QuizOutcome, ChallengeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if let Some(error) = &self.error {
            return Err(error.clone());
        }
        Ok(QuizOutcome {
            passed: self.correct >= self.passing_score,
            correct: self.correct,
            total: question_count,
            required: self.passing_score,
        })
    }
}

pub struct Rig {
    pub orch: Arc<VerificationOrchestrator>,
    pub estimator: Arc<FakeEstimator>,
    pub quiz: Arc<FakeQuiz>,
    pub store: Arc<NullStore>,
    pub clock: Arc<NullClock>,
    pub events: UnboundedReceiver<VerificationEvent>,
}

pub fn rig(estimator: FakeEstimator, quiz: FakeQuiz) -> Rig {
    rig_with(estimator, quiz, Arc::new(NullStore::new()), VerificationConfig::default())
}

pub fn rig_with(
    estimator: FakeEstimator,
    quiz: FakeQuiz,
    store: Arc<NullStore>,
    config: VerificationConfig,
) -> Rig {
    let estimator = Arc::new(estimator);
    let quiz = Arc::new(quiz);
    let clock = Arc::new(NullClock::new(NOW));
    let (sink, events) = ChannelSink::channel();
    let orch = VerificationOrchestrator::new(
        SubjectId::local(),
        config,
        Collaborators {
            estimator: estimator.clone(),
            quiz: quiz.clone(),
            store: store.clone() as Arc<dyn KeyValueStore>,
            clock: clock.clone(),
            events: Arc::new(sink),
        },
    );
    Rig {
        orch: Arc::new(orch),
        estimator,
        quiz,
        store,
        clock,
        events,
    }
}

pub fn drain(rx: &mut UnboundedReceiver<VerificationEvent>) -> Vec<VerificationEvent> {
    let mut out = Vec::new();
    while let Ok(event) = rx.try_recv() {
        out.push(event);
    }
    out
}
