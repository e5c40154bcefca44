//! Picks the next question from the tier matching a player's performance.

use log::info;
use rand::seq::SliceRandom;
use rand::Rng;
use thiserror::Error;

use super::store::{QuestionStore, StorageError};
use super::template::{GenerateError, TemplateTable};
use super::{Difficulty, Question};

/// A tier holding fewer questions than this gets one synthesized question
/// before selection.
pub const MIN_POOL_SIZE: usize = 2;

#[derive(Debug, Error)]
pub enum SelectError {
    #[error("could not synthesize a question: {0}")]
    Generate(#[from] GenerateError),

    #[error("could not store the synthesized question: {0}")]
    Storage(#[from] StorageError),

    #[error("no {0} question available")]
    EmptyPool(Difficulty),
}

/// `floor(performance * 3)` clamped to `0..=2`; saturates at Expert.
pub fn tier_index(performance: f64) -> usize {
    let scaled = (performance * 3.0).floor();
    if scaled.is_nan() || scaled < 0.0 {
        return 0;
    }
    (scaled as usize).min(Difficulty::ALL.len() - 1)
}

pub fn tier_for(performance: f64) -> Difficulty {
    Difficulty::ALL[tier_index(performance)]
}

/// Chooses a question at the tier for `performance`, synthesizing and
/// storing one first when the tier is nearly empty.
pub fn select_question<R: Rng + ?Sized>(
    performance: f64,
    store: &mut QuestionStore,
    table: &TemplateTable,
    rng: &mut R,
) -> Result<Question, SelectError> {
    let difficulty = tier_for(performance);
    let in_tier = |q: &&Question| q.difficulty == difficulty;

    let available = store.questions().iter().filter(in_tier).count();
    if available < MIN_POOL_SIZE {
        let topic = table.random_topic(rng);
        let question = table.generate_question(topic, difficulty, store.questions(), rng)?;
        info!(
            "Only {} {} questions left, adding a generated {} question",
            available, difficulty, topic
        );
        store.append(question)?;
    }

    let pool: Vec<&Question> = store.questions().iter().filter(in_tier).collect();
    pool.choose(rng)
        .map(|q| (*q).clone())
        .ok_or(SelectError::EmptyPool(difficulty))
}
