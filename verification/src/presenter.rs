//! Challenge quiz presenter.
//!
//! Questions are presented one at a time. Each waits for an externally
//! submitted answer until its deadline; a missing answer counts as wrong and the
//! quiz moves on. Submissions carry the 1-based position they answer, so an
//! answer that arrives after its question timed out is ignored.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::config::ChallengeConfig;
use crate::error::ChallengeError;
use crate::events::{EventSink, PresentedQuestion, VerificationEvent};
use crate::pipeline::ChallengeQuiz;
use crate::question::{ChallengeQuestion, ChallengeQuestionSet};

/// Buffered submissions; answers are tiny and a person answers slowly.
const ANSWER_CHANNEL_CAPACITY: usize = 16;

/// Stand-in deadline when a timeout is too large to add to the clock.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// `now + timeout`, saturating to a far-future deadline instead of overflowing.
fn deadline_after(timeout: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(timeout).unwrap_or(now + FAR_FUTURE)
}

#[derive(Clone, Debug, PartialEq)]
pub struct ChallengeSettings {
    pub question_timeout: Duration,
    pub passing_score: usize,
    pub shuffle_questions: bool,
    pub shuffle_answers: bool,
}

impl From<&ChallengeConfig> for ChallengeSettings {
    fn from(config: &ChallengeConfig) -> Self {
        Self {
            question_timeout: config.question_timeout(),
            passing_score: config.passing_score,
            shuffle_questions: config.shuffle_questions,
            shuffle_answers: config.shuffle_answers,
        }
    }
}

impl Default for ChallengeSettings {
    fn default() -> Self {
        Self::from(&ChallengeConfig::default())
    }
}

/// The result of a completed quiz.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizOutcome {
    pub passed: bool,
    pub correct: usize,
    pub total: usize,
    pub required: usize,
}

/// An answer to the question at `position` (1-based).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AnswerSubmission {
    pub position: usize,
    pub answer_index: usize,
}

/// Handle for the presentation layer to submit answers.
#[derive(Clone, Debug)]
pub struct AnswerSender {
    tx: mpsc::Sender<AnswerSubmission>,
}

impl AnswerSender {
    /// Submit an answer. Returns `false` if the presenter is gone.
    pub async fn submit(&self, position: usize, answer_index: usize) -> bool {
        self.tx
            .send(AnswerSubmission {
                position,
                answer_index,
            })
            .await
            .is_ok()
    }

    /// Submit without waiting. Returns `false` if the buffer is full or the presenter is gone.
    pub fn try_submit(&self, position: usize, answer_index: usize) -> bool {
        self.tx
            .try_send(AnswerSubmission {
                position,
                answer_index,
            })
            .is_ok()
    }
}

/// Working state of one quiz; dropped when the quiz ends.
struct QuizRun {
    questions: Vec<ChallengeQuestion>,
    correct: usize,
}

pub struct ChallengePresenter {
    pool: ChallengeQuestionSet,
    settings: ChallengeSettings,
    sender: AnswerSender,
    answers: tokio::sync::Mutex<mpsc::Receiver<AnswerSubmission>>,
    rng: std::sync::Mutex<StdRng>,
    events: Arc<dyn EventSink>,
}

impl ChallengePresenter {
    pub fn new(
        pool: ChallengeQuestionSet,
        settings: ChallengeSettings,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self::with_rng(pool, settings, events, StdRng::from_entropy())
    }

    /// Deterministic question order and answer placement, for tests and replays.
    pub fn seeded(
        pool: ChallengeQuestionSet,
        settings: ChallengeSettings,
        events: Arc<dyn EventSink>,
        seed: u64,
    ) -> Self {
        Self::with_rng(pool, settings, events, StdRng::seed_from_u64(seed))
    }

    fn with_rng(
        pool: ChallengeQuestionSet,
        settings: ChallengeSettings,
        events: Arc<dyn EventSink>,
        rng: StdRng,
    ) -> Self {
        let (tx, rx) = mpsc::channel(ANSWER_CHANNEL_CAPACITY);
        Self {
            pool,
            settings,
            sender: AnswerSender { tx },
            answers: tokio::sync::Mutex::new(rx),
            rng: std::sync::Mutex::new(rng),
            events,
        }
    }

    /// A handle for submitting answers to this presenter.
    pub fn answer_sender(&self) -> AnswerSender {
        self.sender.clone()
    }

    pub fn settings(&self) -> &ChallengeSettings {
        &self.settings
    }

    fn prepare(&self, count: usize) -> Result<QuizRun, ChallengeError> {
        let mut rng = self.rng.lock().unwrap();
        let selected = self
            .pool
            .select(count, self.settings.shuffle_questions, &mut *rng)?;
        let questions = selected
            .into_iter()
            .map(|q| {
                if self.settings.shuffle_answers {
                    q.with_shuffled_answers(&mut *rng)
                } else {
                    q.clone()
                }
            })
            .collect();
        Ok(QuizRun {
            questions,
            correct: 0,
        })
    }

    /// Wait for an answer to `position` until `deadline`.
    async fn await_answer(
        answers: &mut mpsc::Receiver<AnswerSubmission>,
        position: usize,
        deadline: Instant,
    ) -> Option<usize> {
        loop {
            match tokio::time::timeout_at(deadline, answers.recv()).await {
                Ok(Some(sub)) if sub.position == position => return Some(sub.answer_index),
                Ok(Some(stale)) => {
                    tracing::debug!(
                        expected = position,
                        got = stale.position,
                        "ignoring answer for another question"
                    );
                }
                Ok(None) | Err(_) => return None,
            }
        }
    }
}

#[async_trait]
impl ChallengeQuiz for ChallengePresenter {
    async fn run_quiz(&self, question_count: usize) -> Result<QuizOutcome, ChallengeError> {
        let mut run = self.prepare(question_count)?;
        let total = run.questions.len();

        let mut answers = self.answers.lock().await;
        while answers.try_recv().is_ok() {}

        for (i, question) in run.questions.iter().enumerate() {
            let position = i + 1;
            self.events
                .emit(VerificationEvent::QuestionPresented(PresentedQuestion {
                    position,
                    total,
                    text: question.text.clone(),
                    answers: question.answers.clone(),
                    category: question.category,
                    difficulty: question.difficulty,
                }));

            let deadline = deadline_after(self.settings.question_timeout);
            let submitted = Self::await_answer(&mut answers, position, deadline).await;
            let correct = submitted.is_some_and(|a| question.is_correct(a));
            if correct {
                run.correct += 1;
            }
            tracing::debug!(position, correct, timed_out = submitted.is_none(), "question answered");
            self.events.emit(VerificationEvent::QuestionAnswered {
                position,
                correct,
                timed_out: submitted.is_none(),
            });
        }

        let outcome = QuizOutcome {
            passed: run.correct >= self.settings.passing_score,
            correct: run.correct,
            total,
            required: self.settings.passing_score,
        };
        tracing::info!(
            correct = outcome.correct,
            total = outcome.total,
            passed = outcome.passed,
            "challenges complete"
        );
        self.events
            .emit(VerificationEvent::ChallengesComplete(outcome));
        Ok(outcome)
    }
}
