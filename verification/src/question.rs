//! Challenge question pool.
//!
//! Questions are easy for a person and carry no personal data. Pool entries are
//! immutable; a quiz works on copies whose answers may be reordered.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::ChallengeError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuestionCategory {
    General,
    Math,
    Science,
    Geography,
    Language,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

/// A multiple-choice question.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeQuestion {
    pub text: String,
    pub answers: Vec<String>,
    pub correct_answer_index: usize,
    pub category: QuestionCategory,
    pub difficulty: Difficulty,
}

impl ChallengeQuestion {
    pub fn new(
        text: impl Into<String>,
        answers: Vec<String>,
        correct_answer_index: usize,
        category: QuestionCategory,
        difficulty: Difficulty,
    ) -> Result<Self, ChallengeError> {
        let question = Self {
            text: text.into(),
            answers,
            correct_answer_index,
            category,
            difficulty,
        };
        question.validate()?;
        Ok(question)
    }

    /// At least two answers, distinct answer strings, correct index in range.
    pub fn validate(&self) -> Result<(), ChallengeError> {
        let invalid = |reason: &str| ChallengeError::InvalidQuestion {
            text: self.text.clone(),
            reason: reason.to_string(),
        };
        if self.answers.len() < 2 {
            return Err(invalid("needs at least two answers"));
        }
        if self.correct_answer_index >= self.answers.len() {
            return Err(invalid("correct answer index out of range"));
        }
        let mut seen = HashSet::new();
        if !self.answers.iter().all(|a| seen.insert(a.as_str())) {
            return Err(invalid("duplicate answer text"));
        }
        Ok(())
    }

    pub fn correct_answer(&self) -> &str {
        &self.answers[self.correct_answer_index]
    }

    pub fn is_correct(&self, answer_index: usize) -> bool {
        answer_index == self.correct_answer_index
    }

    /// A working copy with the answers permuted.
    ///
    /// The new correct index is found by looking up the original correct text in
    /// the permuted list, so the right answer never changes.
    pub fn with_shuffled_answers<R: Rng + ?Sized>(&self, rng: &mut R) -> Self {
        let correct = self.correct_answer();
        let mut answers = self.answers.clone();
        answers.shuffle(rng);
        match answers.iter().position(|a| a == correct) {
            Some(correct_answer_index) => Self {
                text: self.text.clone(),
                answers,
                correct_answer_index,
                category: self.category,
                difficulty: self.difficulty,
            },
            None => self.clone(),
        }
    }
}

/// A validated, immutable pool of questions.
#[derive(Clone, Debug)]
pub struct ChallengeQuestionSet {
    questions: Vec<ChallengeQuestion>,
}

impl ChallengeQuestionSet {
    pub fn new(questions: Vec<ChallengeQuestion>) -> Result<Self, ChallengeError> {
        for q in &questions {
            q.validate()?;
        }
        Ok(Self { questions })
    }

    /// The pool shipped with the crate.
    pub fn builtin() -> Self {
        Self {
            questions: builtin_questions(),
        }
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn questions(&self) -> &[ChallengeQuestion] {
        &self.questions
    }

    pub fn by_category(&self, category: QuestionCategory) -> Vec<&ChallengeQuestion> {
        self.questions
            .iter()
            .filter(|q| q.category == category)
            .collect()
    }

    pub fn by_difficulty(&self, difficulty: Difficulty) -> Vec<&ChallengeQuestion> {
        self.questions
            .iter()
            .filter(|q| q.difficulty == difficulty)
            .collect()
    }

    /// Pick `count` distinct questions.
    ///
    /// With `shuffle` the pool is permuted uniformly and the first `count` are
    /// taken; otherwise the first `count` in declared order.
    pub fn select<R: Rng + ?Sized>(
        &self,
        count: usize,
        shuffle: bool,
        rng: &mut R,
    ) -> Result<Vec<&ChallengeQuestion>, ChallengeError> {
        if count == 0 {
            return Err(ChallengeError::NoQuestionsRequested);
        }
        if count > self.questions.len() {
            return Err(ChallengeError::NotEnoughQuestions {
                requested: count,
                available: self.questions.len(),
            });
        }
        let mut order: Vec<usize> = (0..self.questions.len()).collect();
        if shuffle {
            order.shuffle(rng);
        }
        Ok(order
            .into_iter()
            .take(count)
            .map(|i| &self.questions[i])
            .collect())
    }
}

fn q(
    text: &str,
    answers: &[&str],
    correct: usize,
    category: QuestionCategory,
    difficulty: Difficulty,
) -> ChallengeQuestion {
    ChallengeQuestion {
        text: text.to_string(),
        answers: answers.iter().map(|a| a.to_string()).collect(),
        correct_answer_index: correct,
        category,
        difficulty,
    }
}

fn builtin_questions() -> Vec<ChallengeQuestion> {
    use Difficulty::*;
    use QuestionCategory::*;
    vec![
        q("How many days are in a week?", &["5", "7", "10", "12"], 1, General, Easy),
        q("Which of these is a fruit?", &["Carrot", "Potato", "Apple", "Onion"], 2, General, Easy),
        q("What color is grass in summer?", &["Green", "Purple", "Orange", "White"], 0, General, Easy),
        q("How many hours are in a day?", &["12", "20", "24", "30"], 2, General, Easy),
        q("What is 7 + 5?", &["10", "12", "13", "15"], 1, Math, Easy),
        q("What is 9 × 6?", &["45", "54", "56", "63"], 1, Math, Medium),
        q("What is half of 150?", &["50", "65", "75", "85"], 2, Math, Medium),
        q("Which number is prime?", &["21", "27", "29", "33"], 2, Math, Hard),
        q("What do plants need to make food from sunlight?", &["Salt", "Chlorophyll", "Sand", "Iron"], 1, Science, Medium),
        q("At what temperature does water boil at sea level (°C)?", &["50", "90", "100", "120"], 2, Science, Medium),
        q("Which planet is closest to the Sun?", &["Venus", "Mars", "Mercury", "Earth"], 2, Science, Hard),
        q("Which of these is an ocean?", &["Sahara", "Pacific", "Amazon", "Everest"], 1, Geography, Easy),
        q("On which continent is Egypt?", &["Asia", "Europe", "Africa", "South America"], 2, Geography, Medium),
        q("Which word is the opposite of 'cold'?", &["Wet", "Hot", "Soft", "Dark"], 1, Language, Easy),
        q("Which word rhymes with 'cat'?", &["Dog", "Hat", "Cup", "Tree"], 1, Language, Easy),
        q("What is the plural of 'mouse'?", &["Mouses", "Mousen", "Mice", "Meese"], 2, Language, Medium),
    ]
}
