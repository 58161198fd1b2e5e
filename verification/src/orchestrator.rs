//! Verification orchestrator sequences the facial estimate and the challenge
//! quiz into a single verification run and owns the cached verdict.
//!
//! A run is:
//! 1. Short-circuit to `Passed` if a valid passed verdict is cached.
//! 2. Facial estimate (if enabled); underage or any estimator error fails the run.
//! 3. Challenge quiz (if enabled); a score below the passing score fails the run.
//! 4. Issue and persist a new verdict, then `Passed`.
//!
//! Failures are never cached, so a failed attempt is always retried in full.

use std::any::Any;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use agegate_capture::{AgeScorer, CaptureDevice};
use agegate_store::KeyValueStore;
use agegate_types::{Clock, SubjectId};
use agegate_utils::{format_duration, StatsCounter};
use futures_util::FutureExt;

use crate::config::VerificationConfig;
use crate::error::VerificationError;
use crate::estimator::{AgeEstimate, FacialAgeEstimator, SamplingParams};
use crate::events::{EventSink, VerificationEvent};
use crate::pipeline::{AgeEstimation, ChallengeQuiz};
use crate::presenter::{AnswerSender, ChallengePresenter, ChallengeSettings, QuizOutcome};
use crate::question::ChallengeQuestionSet;
use crate::state::VerificationState;
use crate::stop::StopToken;
use crate::verdict::{CachedVerdict, VerdictCache};

/// Counter names reported by [`VerificationOrchestrator::stats`].
pub const STAT_NAMES: &[&str] = &["runs", "cache_hits", "passed", "failed", "rejected_concurrent"];

/// Progress checkpoints reported to the event sink.
const PROGRESS_CAPTURE_START: f32 = 0.1;
const PROGRESS_FACIAL_DONE: f32 = 0.5;
const PROGRESS_CHALLENGES_START: f32 = 0.6;
const PROGRESS_CHALLENGES_DONE: f32 = 0.9;
const PROGRESS_COMPLETE: f32 = 1.0;

/// Everything the orchestrator talks to.
pub struct Collaborators {
    pub estimator: Arc<dyn AgeEstimation>,
    pub quiz: Arc<dyn ChallengeQuiz>,
    pub store: Arc<dyn KeyValueStore>,
    pub clock: Arc<dyn Clock>,
    pub events: Arc<dyn EventSink>,
}

impl Collaborators {
    /// Wire the standard estimator and presenter (built-in question pool).
    ///
    /// Returns the answer handle the presentation layer uses to submit answers.
    pub fn standard(
        config: &VerificationConfig,
        device: Arc<dyn CaptureDevice>,
        scorer: Arc<dyn AgeScorer>,
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        events: Arc<dyn EventSink>,
    ) -> (Self, AnswerSender) {
        let estimator = FacialAgeEstimator::new(device, scorer, clock.clone());
        let presenter = ChallengePresenter::new(
            ChallengeQuestionSet::builtin(),
            ChallengeSettings::from(&config.challenge),
            events.clone(),
        );
        let answers = presenter.answer_sender();
        let collaborators = Self {
            estimator: Arc::new(estimator),
            quiz: Arc::new(presenter),
            store,
            clock,
            events,
        };
        (collaborators, answers)
    }
}

/// What a successful run produced.
#[derive(Clone, Debug, PartialEq)]
pub struct VerificationOutcome {
    pub verdict: CachedVerdict,
    /// `true` when a cached verdict short-circuited the run.
    pub from_cache: bool,
    pub estimate: Option<AgeEstimate>,
    pub quiz: Option<QuizOutcome>,
}

/// Clears the running flag when a run ends, however it ends.
struct RunGuard<'a>(&'a AtomicBool);

impl<'a> RunGuard<'a> {
    fn try_acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// One orchestrator per verification subject.
pub struct VerificationOrchestrator {
    subject: SubjectId,
    config: VerificationConfig,
    estimator: Arc<dyn AgeEstimation>,
    quiz: Arc<dyn ChallengeQuiz>,
    cache: VerdictCache,
    clock: Arc<dyn Clock>,
    events: Arc<dyn EventSink>,
    state: Mutex<VerificationState>,
    verdict: Mutex<Option<CachedVerdict>>,
    running: AtomicBool,
    stop: Mutex<Option<StopToken>>,
    stats: StatsCounter,
}

impl VerificationOrchestrator {
    /// Create an orchestrator and load the subject's cached verdict.
    ///
    /// A store that cannot be read is logged and treated as holding no verdict.
    pub fn new(subject: SubjectId, config: VerificationConfig, parts: Collaborators) -> Self {
        let cache = VerdictCache::new(parts.store, &subject);
        let verdict = match cache.load() {
            Ok(verdict) => verdict,
            Err(e) => {
                tracing::warn!(%subject, error = %e, "could not read cached verdict");
                None
            }
        };
        if let Some(v) = &verdict {
            let now = parts.clock.now();
            tracing::debug!(
                %subject,
                valid = v.is_valid(now),
                remaining = %format_duration(v.expires_at.secs_until(now)),
                "loaded cached verdict"
            );
        }
        Self {
            subject,
            config,
            estimator: parts.estimator,
            quiz: parts.quiz,
            cache,
            clock: parts.clock,
            events: parts.events,
            state: Mutex::new(VerificationState::NotStarted),
            verdict: Mutex::new(verdict),
            running: AtomicBool::new(false),
            stop: Mutex::new(None),
            stats: StatsCounter::new(STAT_NAMES),
        }
    }

    pub fn subject(&self) -> &SubjectId {
        &self.subject
    }

    pub fn config(&self) -> &VerificationConfig {
        &self.config
    }

    pub fn current_state(&self) -> VerificationState {
        *self.state.lock().unwrap()
    }

    /// The cached verdict, if any (valid or not).
    pub fn cached_verdict(&self) -> Option<CachedVerdict> {
        *self.verdict.lock().unwrap()
    }

    /// Whether a verification run is currently executing.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// `Passed` in this session, or a valid passed verdict is cached.
    pub fn is_verified(&self) -> bool {
        self.current_state() == VerificationState::Passed || self.valid_verdict().is_some()
    }

    /// Whole days until the cached verdict expires, rounded up; 0 without one.
    pub fn days_until_reverification(&self) -> u64 {
        let now = self.clock.now();
        self.cached_verdict()
            .map(|v| v.days_remaining(now))
            .unwrap_or(0)
    }

    /// Delete the cached verdict so the next run verifies from scratch.
    ///
    /// A run already in flight keeps going and keeps its own state.
    pub fn force_reverification(&self) -> Result<(), VerificationError> {
        *self.verdict.lock().unwrap() = None;
        let cleared = self.cache.clear();
        if !self.is_running() {
            self.transition(VerificationState::NotStarted);
        }
        tracing::info!(subject = %self.subject, "forced re-verification");
        cleared.map_err(VerificationError::from)
    }

    /// Ask a running facial estimate to stop after the current sample.
    ///
    /// Returns `false` if no estimate is running.
    pub fn stop_capture(&self) -> bool {
        match self.stop.lock().unwrap().as_ref() {
            Some(token) => {
                token.stop();
                true
            }
            None => false,
        }
    }

    pub fn stats(&self) -> BTreeMap<&'static str, u64> {
        self.stats.snapshot()
    }

    /// Run a verification.
    ///
    /// Returns [`VerificationError::AlreadyInProgress`] without touching any
    /// state if another run is executing for this subject.
    pub async fn start_verification(&self) -> Result<VerificationOutcome, VerificationError> {
        let Some(_run) = RunGuard::try_acquire(&self.running) else {
            self.stats.increment("rejected_concurrent");
            return Err(VerificationError::AlreadyInProgress(
                self.subject.to_string(),
            ));
        };
        self.stats.increment("runs");

        if let Some(verdict) = self.valid_verdict() {
            self.stats.increment("cache_hits");
            tracing::info!(
                subject = %self.subject,
                remaining = %format_duration(verdict.expires_at.secs_until(self.clock.now())),
                "cached verdict still valid, skipping verification"
            );
            self.transition(VerificationState::Passed);
            self.progress(PROGRESS_COMPLETE);
            self.events.emit(VerificationEvent::Passed {
                verdict,
                from_cache: true,
            });
            return Ok(VerificationOutcome {
                verdict,
                from_cache: true,
                estimate: None,
                quiz: None,
            });
        }

        match self.run_pipeline().await {
            Ok(outcome) => {
                self.stats.increment("passed");
                self.events.emit(VerificationEvent::Passed {
                    verdict: outcome.verdict,
                    from_cache: false,
                });
                Ok(outcome)
            }
            Err(e) => {
                self.stats.increment("failed");
                tracing::warn!(subject = %self.subject, error = %e, "verification failed");
                self.transition(VerificationState::Failed);
                self.events.emit(VerificationEvent::Failed(e.clone()));
                Err(e)
            }
        }
    }

    async fn run_pipeline(&self) -> Result<VerificationOutcome, VerificationError> {
        self.config.validate()?;

        let estimate = if self.config.require_facial_check {
            Some(self.run_facial_check().await?)
        } else {
            None
        };

        let quiz = if self.config.require_challenge_check {
            Some(self.run_challenges().await?)
        } else {
            None
        };

        if estimate.is_none() && quiz.is_none() {
            tracing::warn!(subject = %self.subject, "both checks disabled, passing without checks");
        }

        self.transition(VerificationState::Verifying);
        let verdict = CachedVerdict::issue(self.clock.now(), self.config.cache_ttl_days);
        if let Err(e) = self.cache.save(&verdict) {
            tracing::error!(subject = %self.subject, error = %e, "failed to persist verdict");
        }
        *self.verdict.lock().unwrap() = Some(verdict);
        tracing::info!(
            subject = %self.subject,
            expires_at = %verdict.expires_at,
            "verification passed"
        );
        self.transition(VerificationState::Passed);
        self.progress(PROGRESS_COMPLETE);

        Ok(VerificationOutcome {
            verdict,
            from_cache: false,
            estimate,
            quiz,
        })
    }

    async fn run_facial_check(&self) -> Result<AgeEstimate, VerificationError> {
        self.transition(VerificationState::InitializingCapture);
        self.progress(PROGRESS_CAPTURE_START);

        let stop = StopToken::new();
        *self.stop.lock().unwrap() = Some(stop.clone());
        self.transition(VerificationState::CapturingSubject);
        let params = SamplingParams::from(&self.config.facial);
        let result = AssertUnwindSafe(self.estimator.estimate(&params, &stop))
            .catch_unwind()
            .await;
        *self.stop.lock().unwrap() = None;

        self.transition(VerificationState::AnalyzingSubject);
        let estimate = result.map_err(|panic| step_panicked("age estimation", panic))??;
        if estimate.age < self.config.minimum_age {
            return Err(VerificationError::Underage {
                estimated: estimate.age,
                minimum: self.config.minimum_age,
            });
        }
        self.progress(PROGRESS_FACIAL_DONE);
        Ok(estimate)
    }

    async fn run_challenges(&self) -> Result<QuizOutcome, VerificationError> {
        self.transition(VerificationState::PresentingChallenges);
        self.progress(PROGRESS_CHALLENGES_START);
        self.transition(VerificationState::AwaitingAnswers);

        let outcome = AssertUnwindSafe(self.quiz.run_quiz(self.config.required_challenge_count))
            .catch_unwind()
            .await
            .map_err(|panic| step_panicked("challenge quiz", panic))??;
        if !outcome.passed {
            return Err(VerificationError::ChallengeFailed {
                correct: outcome.correct,
                total: outcome.total,
                required: outcome.required,
            });
        }
        self.progress(PROGRESS_CHALLENGES_DONE);
        Ok(outcome)
    }

    fn valid_verdict(&self) -> Option<CachedVerdict> {
        let now = self.clock.now();
        self.cached_verdict().filter(|v| v.is_valid(now))
    }

    fn transition(&self, to: VerificationState) {
        let from = {
            let mut state = self.state.lock().unwrap();
            std::mem::replace(&mut *state, to)
        };
        if from != to {
            tracing::info!(subject = %self.subject, %from, %to, "verification state changed");
            self.events.emit(VerificationEvent::StateChanged { from, to });
        }
    }

    fn progress(&self, fraction: f32) {
        self.events.emit(VerificationEvent::Progress(fraction));
    }
}

/// A sub-pipeline panicked; report it as a failed step.
fn step_panicked(step: &str, panic: Box<dyn Any + Send>) -> VerificationError {
    let reason = panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown cause");
    tracing::error!(step, reason, "verification step panicked");
    VerificationError::Step(format!("{step} panicked: {reason}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ChallengeError, EstimationError};
    use crate::events::ChannelSink;
    use agegate_nullables::{NullClock, NullStore};
    use agegate_types::{Timestamp, SECS_PER_DAY};
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    const NOW: u64 = 1_700_000_000;

    struct FixedEstimate {
        result: Result<AgeEstimate, EstimationError>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl AgeEstimation for FixedEstimate {
        async fn estimate(
            &self,
            _params: &SamplingParams,
            _stop: &StopToken,
        ) -> Result<AgeEstimate, EstimationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.clone()
        }
    }

    struct FixedQuiz {
        correct: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ChallengeQuiz for FixedQuiz {
        async fn run_quiz(&self, count: usize) -> Result<QuizOutcome, ChallengeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(QuizOutcome {
                passed: self.correct >= 2,
                correct: self.correct,
                total: count,
                required: 2,
            })
        }
    }

    struct Harness {
        orch: VerificationOrchestrator,
        estimator: Arc<FixedEstimate>,
        quiz: Arc<FixedQuiz>,
        clock: Arc<NullClock>,
        events: tokio::sync::mpsc::UnboundedReceiver<VerificationEvent>,
    }

    fn harness(config: VerificationConfig, age: u32, correct: usize) -> Harness {
        let estimator = Arc::new(FixedEstimate {
            result: Ok(AgeEstimate {
                age,
                confidence: 0.9,
                samples_used: 5,
            }),
            calls: AtomicUsize::new(0),
        });
        let quiz = Arc::new(FixedQuiz {
            correct,
            calls: AtomicUsize::new(0),
        });
        let clock = Arc::new(NullClock::new(NOW));
        let (sink, events) = ChannelSink::channel();
        let orch = VerificationOrchestrator::new(
            SubjectId::local(),
            config,
            Collaborators {
                estimator: estimator.clone(),
                quiz: quiz.clone(),
                store: Arc::new(NullStore::new()),
                clock: clock.clone(),
                events: Arc::new(sink),
            },
        );
        Harness {
            orch,
            estimator,
            quiz,
            clock,
            events,
        }
    }

    fn drain(rx: &mut tokio::sync::mpsc::UnboundedReceiver<VerificationEvent>) -> Vec<VerificationEvent> {
        let mut out = Vec::new();
        while let Ok(e) = rx.try_recv() {
            out.push(e);
        }
        out
    }

    #[tokio::test]
    async fn state_walks_the_full_sequence() {
        let mut h = harness(VerificationConfig::default(), 30, 3);
        h.orch.start_verification().await.unwrap();
        let states: Vec<VerificationState> = drain(&mut h.events)
            .into_iter()
            .filter_map(|e| match e {
                VerificationEvent::StateChanged { to, .. } => Some(to),
                _ => None,
            })
            .collect();
        assert_eq!(
            states,
            vec![
                VerificationState::InitializingCapture,
                VerificationState::CapturingSubject,
                VerificationState::AnalyzingSubject,
                VerificationState::PresentingChallenges,
                VerificationState::AwaitingAnswers,
                VerificationState::Verifying,
                VerificationState::Passed,
            ]
        );
    }

    #[tokio::test]
    async fn progress_checkpoints_are_increasing() {
        let mut h = harness(VerificationConfig::default(), 30, 3);
        h.orch.start_verification().await.unwrap();
        let progress: Vec<f32> = drain(&mut h.events)
            .into_iter()
            .filter_map(|e| match e {
                VerificationEvent::Progress(p) => Some(p),
                _ => None,
            })
            .collect();
        assert_eq!(progress.first(), Some(&0.1));
        assert!(progress.contains(&0.5));
        assert_eq!(progress.last(), Some(&1.0));
        assert!(progress.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test]
    async fn facial_only_config_skips_quiz() {
        let config = VerificationConfig {
            require_challenge_check: false,
            ..VerificationConfig::default()
        };
        let h = harness(config, 30, 0);
        let outcome = h.orch.start_verification().await.unwrap();
        assert!(outcome.quiz.is_none());
        assert_eq!(h.quiz.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn challenge_only_config_skips_estimator() {
        let config = VerificationConfig {
            require_facial_check: false,
            ..VerificationConfig::default()
        };
        let h = harness(config, 5, 3);
        let outcome = h.orch.start_verification().await.unwrap();
        assert!(outcome.estimate.is_none());
        assert_eq!(h.estimator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn invalid_config_fails_without_running_checks() {
        let mut config = VerificationConfig::default();
        config.challenge.passing_score = 10;
        let h = harness(config, 30, 3);
        let err = h.orch.start_verification().await.unwrap_err();
        assert!(matches!(err, VerificationError::Configuration(_)));
        assert_eq!(h.orch.current_state(), VerificationState::Failed);
        assert_eq!(h.estimator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn is_verified_and_days_remaining_after_pass() {
        let h = harness(VerificationConfig::default(), 30, 3);
        assert!(!h.orch.is_verified());
        assert_eq!(h.orch.days_until_reverification(), 0);
        h.orch.start_verification().await.unwrap();
        assert!(h.orch.is_verified());
        assert_eq!(h.orch.days_until_reverification(), 30);
        h.clock.advance(SECS_PER_DAY + 1);
        assert_eq!(h.orch.days_until_reverification(), 29);
    }

    #[tokio::test]
    async fn force_reverification_resets_state_and_cache() {
        let h = harness(VerificationConfig::default(), 30, 3);
        h.orch.start_verification().await.unwrap();
        h.orch.force_reverification().unwrap();
        assert_eq!(h.orch.current_state(), VerificationState::NotStarted);
        assert!(!h.orch.is_verified());
        assert_eq!(h.orch.cached_verdict(), None);

        h.orch.start_verification().await.unwrap();
        assert_eq!(h.estimator.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn stats_count_runs_and_cache_hits() {
        let h = harness(VerificationConfig::default(), 30, 3);
        h.orch.start_verification().await.unwrap();
        h.orch.start_verification().await.unwrap();
        let stats = h.orch.stats();
        assert_eq!(stats["runs"], 2);
        assert_eq!(stats["passed"], 1);
        assert_eq!(stats["cache_hits"], 1);
    }

    #[tokio::test]
    async fn stop_capture_without_run_is_noop() {
        let h = harness(VerificationConfig::default(), 30, 3);
        assert!(!h.orch.stop_capture());
    }

    #[tokio::test]
    async fn verdict_expires_ttl_days_after_issue() {
        let h = harness(VerificationConfig::default(), 30, 3);
        let outcome = h.orch.start_verification().await.unwrap();
        assert_eq!(outcome.verdict.verified_at, Timestamp::new(NOW));
        assert_eq!(
            outcome.verdict.expires_at,
            Timestamp::new(NOW + 30 * SECS_PER_DAY)
        );
    }
}
