//! Terminal front end for a verification run.
//!
//! Prints pipeline events and forwards numbered answers typed on stdin to the
//! challenge presenter.

use agegate_verification::{AnswerSender, PresentedQuestion, VerificationEvent};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::UnboundedReceiver;

/// Drive the terminal until the run reports its result.
pub async fn run(mut events: UnboundedReceiver<VerificationEvent>, answers: AnswerSender) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut current: Option<PresentedQuestion> = None;
    let mut stdin_open = true;

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                let finished = matches!(
                    event,
                    VerificationEvent::Passed { .. } | VerificationEvent::Failed(_)
                );
                print_event(&event);
                match event {
                    VerificationEvent::QuestionPresented(q) => current = Some(q),
                    VerificationEvent::QuestionAnswered { .. } => current = None,
                    _ => {}
                }
                if finished {
                    break;
                }
            }
            line = lines.next_line(), if stdin_open => {
                match line {
                    Ok(Some(line)) => submit_line(&line, current.as_ref(), &answers).await,
                    Ok(None) => stdin_open = false,
                    Err(e) => {
                        tracing::warn!(error = %e, "stdin read failed, answers disabled");
                        stdin_open = false;
                    }
                }
            }
        }
    }
}

async fn submit_line(line: &str, question: Option<&PresentedQuestion>, answers: &AnswerSender) {
    let Some(question) = question else {
        println!("  (no question is waiting for an answer)");
        return;
    };
    match line.trim().parse::<usize>() {
        Ok(choice) if (1..=question.answers.len()).contains(&choice) => {
            if !answers.submit(question.position, choice - 1).await {
                tracing::warn!("presenter stopped accepting answers");
            }
        }
        _ => println!("  enter a number from 1 to {}", question.answers.len()),
    }
}

fn print_event(event: &VerificationEvent) {
    match event {
        VerificationEvent::StateChanged { to, .. } => println!("[{to}]"),
        VerificationEvent::Progress(_) => {}
        VerificationEvent::QuestionPresented(q) => {
            println!();
            println!("Question {}/{}: {}", q.position, q.total, q.text);
            for (i, answer) in q.answers.iter().enumerate() {
                println!("  {}. {}", i + 1, answer);
            }
        }
        VerificationEvent::QuestionAnswered {
            correct, timed_out, ..
        } => {
            if *timed_out {
                println!("  time is up");
            } else if *correct {
                println!("  correct");
            } else {
                println!("  incorrect");
            }
        }
        VerificationEvent::ChallengesComplete(outcome) => {
            println!(
                "Challenges: {}/{} correct ({} required)",
                outcome.correct, outcome.total, outcome.required
            );
        }
        VerificationEvent::Passed { from_cache, .. } => {
            if *from_cache {
                println!("Verified (cached verdict).");
            } else {
                println!("Verified.");
            }
        }
        VerificationEvent::Failed(e) => println!("Not verified: {}", e.user_message()),
    }
}
