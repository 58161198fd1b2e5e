//! Full pipeline runs with the real estimator and presenter over null hardware.

use std::sync::Arc;

use agegate_capture::AgeScore;
use agegate_nullables::{NullCaptureDevice, NullClock, NullScorer, NullStore};
use agegate_store::KeyValueStore;
use agegate_store_lmdb::LmdbEnvironment;
use agegate_types::SubjectId;
use agegate_verification::{
    AnswerSender, ChallengePresenter, ChallengeQuestionSet, ChallengeSettings, ChannelSink,
    Collaborators, EstimationError, FacialAgeEstimator, PresentedQuestion, VerificationConfig,
    VerificationError, VerificationEvent, VerificationOrchestrator, VerificationState,
};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;

const NOW: u64 = 1_700_000_000;

struct Setup {
    orch: Arc<VerificationOrchestrator>,
    estimator: Arc<FacialAgeEstimator>,
    device: Arc<NullCaptureDevice>,
    answers: AnswerSender,
    events: UnboundedReceiver<VerificationEvent>,
}

fn setup(scorer: NullScorer, store: Arc<dyn KeyValueStore>) -> Setup {
    let config = VerificationConfig::default();
    let device = Arc::new(NullCaptureDevice::new());
    let clock = Arc::new(NullClock::new(NOW));
    let (sink, events) = ChannelSink::channel();
    let sink = Arc::new(sink);
    let estimator = Arc::new(FacialAgeEstimator::new(
        device.clone(),
        Arc::new(scorer),
        clock.clone(),
    ));
    let presenter = ChallengePresenter::seeded(
        ChallengeQuestionSet::builtin(),
        ChallengeSettings::from(&config.challenge),
        sink.clone(),
        42,
    );
    let answers = presenter.answer_sender();
    let orch = VerificationOrchestrator::new(
        SubjectId::local(),
        config,
        Collaborators {
            estimator: estimator.clone(),
            quiz: Arc::new(presenter),
            store,
            clock,
            events: sink,
        },
    );
    Setup {
        orch: Arc::new(orch),
        estimator,
        device,
        answers,
        events,
    }
}

fn correct_index(question: &PresentedQuestion) -> usize {
    let pool = ChallengeQuestionSet::builtin();
    let source = pool
        .questions()
        .iter()
        .find(|q| q.text == question.text)
        .expect("presented question comes from the pool");
    question
        .answers
        .iter()
        .position(|a| a == source.correct_answer())
        .expect("correct answer is offered")
}

/// Answer every question (correctly when `right`) until the run finishes.
fn answer_all(
    answers: AnswerSender,
    mut events: UnboundedReceiver<VerificationEvent>,
    right: bool,
) -> JoinHandle<Vec<VerificationEvent>> {
    tokio::spawn(async move {
        let mut seen = Vec::new();
        while let Some(event) = events.recv().await {
            if let VerificationEvent::QuestionPresented(q) = &event {
                let correct = correct_index(q);
                let index = if right {
                    correct
                } else {
                    (correct + 1) % q.answers.len()
                };
                answers.submit(q.position, index).await;
            }
            let done = matches!(
                event,
                VerificationEvent::Passed { .. } | VerificationEvent::Failed(_)
            );
            seen.push(event);
            if done {
                break;
            }
        }
        seen
    })
}

#[tokio::test(start_paused = true)]
async fn adult_answering_correctly_is_verified() {
    let s = setup(NullScorer::constant(27, 0.9), Arc::new(NullStore::new()));
    let answerer = answer_all(s.answers.clone(), s.events, true);

    let outcome = s.orch.start_verification().await.unwrap();
    let seen = answerer.await.unwrap();

    assert_eq!(outcome.estimate.map(|e| e.age), Some(27));
    let quiz = outcome.quiz.unwrap();
    assert_eq!((quiz.correct, quiz.total), (3, 3));
    assert!(s.orch.is_verified());
    assert_eq!(s.device.capture_count(), 5);
    assert_eq!(s.device.release_count(), 1);
    assert!(!s.device.is_held());
    assert_eq!(s.estimator.retained_samples().await, 0);
    assert!(seen
        .iter()
        .any(|e| matches!(e, VerificationEvent::Passed { from_cache: false, .. })));
}

#[tokio::test(start_paused = true)]
async fn wrong_answers_fail_after_facial_pass() {
    let s = setup(NullScorer::constant(40, 0.9), Arc::new(NullStore::new()));
    let answerer = answer_all(s.answers.clone(), s.events, false);

    let err = s.orch.start_verification().await.unwrap_err();
    answerer.await.unwrap();

    assert_eq!(
        err,
        VerificationError::ChallengeFailed {
            correct: 0,
            total: 3,
            required: 2
        }
    );
    assert!(!s.orch.is_verified());
    assert_eq!(s.estimator.retained_samples().await, 0);
}

#[tokio::test(start_paused = true)]
async fn outlier_sample_does_not_move_median() {
    let scores = vec![
        AgeScore::new(24, 0.9),
        AgeScore::new(25, 0.9),
        AgeScore::new(26, 0.9),
        AgeScore::new(8, 0.95),
        AgeScore::new(25, 0.9),
    ];
    let s = setup(NullScorer::new(scores), Arc::new(NullStore::new()));
    let answerer = answer_all(s.answers.clone(), s.events, true);

    let outcome = s.orch.start_verification().await.unwrap();
    answerer.await.unwrap();

    assert_eq!(outcome.estimate.unwrap().age, 25);
}

#[tokio::test(start_paused = true)]
async fn unconfident_samples_fail_analysis_and_release_device() {
    let s = setup(NullScorer::constant(30, 0.2), Arc::new(NullStore::new()));

    let err = s.orch.start_verification().await.unwrap_err();

    assert_eq!(
        err,
        VerificationError::Analysis(EstimationError::LowConfidence {
            collected: 5,
            min_confidence: 0.7
        })
    );
    assert!(!s.device.is_held());
    assert_eq!(s.estimator.retained_samples().await, 0);
    assert_eq!(s.orch.current_state(), VerificationState::Failed);
}

#[tokio::test(start_paused = true)]
async fn stop_capture_interrupts_sampling() {
    let s = setup(NullScorer::constant(30, 0.9), Arc::new(NullStore::new()));
    let run = {
        let orch = s.orch.clone();
        tokio::spawn(async move { orch.start_verification().await })
    };
    while s.orch.current_state() != VerificationState::CapturingSubject {
        tokio::task::yield_now().await;
    }

    assert!(s.orch.stop_capture());
    let err = run.await.unwrap().unwrap_err();

    assert_eq!(err, VerificationError::Analysis(EstimationError::Stopped));
    assert!(!s.orch.stop_capture());
    assert!(!s.device.is_held());
    assert_eq!(s.estimator.retained_samples().await, 0);
}

#[tokio::test(start_paused = true)]
async fn verdict_persists_in_lmdb_across_restart() {
    let dir = tempfile::tempdir().unwrap();

    {
        let env = LmdbEnvironment::open_default(dir.path()).unwrap();
        let s = setup(NullScorer::constant(30, 0.9), Arc::new(env.kv_store()));
        let answerer = answer_all(s.answers.clone(), s.events, true);
        s.orch.start_verification().await.unwrap();
        answerer.await.unwrap();
    }

    let env = LmdbEnvironment::open_default(dir.path()).unwrap();
    let s = setup(NullScorer::constant(30, 0.9), Arc::new(env.kv_store()));
    assert!(s.orch.is_verified());
    assert_eq!(s.orch.days_until_reverification(), 30);

    let outcome = s.orch.start_verification().await.unwrap();
    assert!(outcome.from_cache);
    assert_eq!(s.device.acquire_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn stop_capture_after_some_samples_still_verifies() {
    let s = setup(NullScorer::constant(33, 0.9), Arc::new(NullStore::new()));
    let answerer = answer_all(s.answers.clone(), s.events, true);
    let run = {
        let orch = s.orch.clone();
        tokio::spawn(async move { orch.start_verification().await })
    };

    // Default interval is 0.5s: two samples are in by 1.2s.
    tokio::time::sleep(std::time::Duration::from_millis(1_200)).await;
    assert!(s.orch.stop_capture());

    let outcome = run.await.unwrap().unwrap();
    answerer.await.unwrap();
    let estimate = outcome.estimate.unwrap();
    assert_eq!(estimate.samples_used, 2);
    assert_eq!(estimate.age, 33);
    assert_eq!(s.device.capture_count(), 2);
    assert!(s.orch.is_verified());
}
