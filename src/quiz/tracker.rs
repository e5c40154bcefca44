use log::debug;

use super::profile::ProfileStore;
use super::selector::tier_for;
use super::store::StorageError;
use super::{Difficulty, Question};

/// Performance gained on a correct answer and lost on a wrong one.
pub const PERFORMANCE_STEP: f64 = 0.08;

#[derive(Debug, Clone, PartialEq)]
pub struct AnswerOutcome {
    pub correct: bool,
    pub correct_answer: String,
    /// Performance after the answer was applied.
    pub performance: f64,
    /// Stored display level of the profile.
    pub level: Difficulty,
    /// Tier the next question will be drawn from.
    pub next_tier: Difficulty,
}

pub fn performance_delta(correct: bool) -> f64 {
    if correct {
        PERFORMANCE_STEP
    } else {
        -PERFORMANCE_STEP
    }
}

/// Scores `given` against the question's answer and records the result on
/// the player's profile.
pub fn apply_answer(
    profiles: &mut ProfileStore,
    player: &str,
    question: &Question,
    given: &str,
) -> Result<AnswerOutcome, StorageError> {
    let correct = question.is_correct(given);
    let profile = profiles.record_answer(
        player,
        &question.question,
        given,
        &question.answer,
        performance_delta(correct),
    )?;
    debug!(
        "{} answered {:?} ({}), performance now {:.2}",
        player,
        given,
        if correct { "correct" } else { "wrong" },
        profile.performance
    );

    Ok(AnswerOutcome {
        correct,
        correct_answer: question.answer.clone(),
        performance: profile.performance,
        level: profile.level,
        next_tier: tier_for(profile.performance),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quiz::store::default_questions;
    use tempfile::TempDir;

    fn profiles_in(dir: &TempDir) -> ProfileStore {
        ProfileStore::open(dir.path().join("profiles.json")).unwrap()
    }

    #[test]
    fn test_correct_answer_raises_performance() {
        let dir = TempDir::new().unwrap();
        let mut profiles = profiles_in(&dir);
        profiles.get_or_create("Test").unwrap();
        let questions = default_questions();
        let question = &questions[3];

        let outcome = apply_answer(&mut profiles, "Test", question, "Salomon").unwrap();
        assert!(outcome.correct);
        assert!((outcome.performance - 0.58).abs() < 1e-9);
        assert_eq!(outcome.next_tier, Difficulty::Intermediate);
        assert_eq!(outcome.level, Difficulty::Beginner);
    }

    #[test]
    fn test_wrong_answer_lowers_performance() {
        let dir = TempDir::new().unwrap();
        let mut profiles = profiles_in(&dir);
        profiles.get_or_create("Test").unwrap();
        let questions = default_questions();
        let question = &questions[0];

        let outcome = apply_answer(&mut profiles, "Test", question, "Moïse").unwrap();
        assert!(!outcome.correct);
        assert_eq!(outcome.correct_answer, "Noé");
        assert!((outcome.performance - 0.42).abs() < 1e-9);

        let event = &profiles.get("Test").unwrap().history[0];
        assert_eq!(event.given, "Moïse");
        assert_eq!(event.correct, "Noé");
    }

    #[test]
    fn test_performance_stays_in_range() {
        let dir = TempDir::new().unwrap();
        let mut profiles = profiles_in(&dir);
        profiles.get_or_create("Test").unwrap();
        let questions = default_questions();
        let question = &questions[0];

        for _ in 0..20 {
            let outcome = apply_answer(&mut profiles, "Test", question, "Noé").unwrap();
            assert!(outcome.performance <= 1.0);
        }
        assert_eq!(profiles.get("Test").unwrap().performance, 1.0);
        assert_eq!(tier_for(1.0), Difficulty::Expert);

        for _ in 0..20 {
            let outcome = apply_answer(&mut profiles, "Test", question, "David").unwrap();
            assert!(outcome.performance >= 0.0);
        }
        assert_eq!(profiles.get("Test").unwrap().performance, 0.0);
    }

    #[test]
    fn test_delta_sign() {
        assert_eq!(performance_delta(true), 0.08);
        assert_eq!(performance_delta(false), -0.08);
    }
}
