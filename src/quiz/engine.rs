//! The adaptive question engine, as seen by the chat front-end.

use std::collections::BTreeMap;

use log::info;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use super::narration::Narrator;
use super::profile::{Profile, ProfileStore};
use super::selector::{select_question, SelectError};
use super::store::{ImportError, QuestionStore, StorageError};
use super::template::{GenerateError, TemplateTable};
use super::tracker::{apply_answer, AnswerOutcome};
use super::{Difficulty, Question, Topic};
use crate::config::Config;

const THINKING_PROMPTS: [&str; 3] = [
    "Analyse de ta progression… ",
    "Calcul de la prochaine question… ",
    "Connexion à la base de la sagesse divine… ✨",
];

pub const NEXT_QUESTION_PROMPT: &str = "Préparation de la question suivante…";

/// Owns both stores, the template table and the randomness used to pick
/// and synthesize questions.
pub struct Engine {
    questions: QuestionStore,
    profiles: ProfileStore,
    templates: TemplateTable,
    narrator: Narrator,
    rng: StdRng,
}

impl Engine {
    pub fn new(
        questions: QuestionStore,
        profiles: ProfileStore,
        templates: TemplateTable,
        narrator: Narrator,
    ) -> Self {
        Self {
            questions,
            profiles,
            templates,
            narrator,
            rng: StdRng::from_entropy(),
        }
    }

    pub fn open(config: &Config, narrator: Narrator) -> Result<Self, StorageError> {
        let questions = QuestionStore::open(&config.questions_file)?;
        let profiles = ProfileStore::open(&config.profiles_file)?;
        let templates = match &config.templates_file {
            Some(path) => {
                info!("Loading question templates from {}", path.display());
                TemplateTable::load(path)?
            }
            None => TemplateTable::builtin(),
        };
        Ok(Self::new(questions, profiles, templates, narrator))
    }

    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    pub fn get_or_create(&mut self, name: &str) -> Result<Profile, StorageError> {
        let profile = self.profiles.get_or_create(name)?.clone();
        self.narrator.say(format!(
            "Bienvenue {}. Préparons votre entraînement biblique.",
            name
        ));
        Ok(profile)
    }

    pub fn profile(&self, name: &str) -> Option<&Profile> {
        self.profiles.get(name)
    }

    pub fn profiles(&self) -> &BTreeMap<String, Profile> {
        self.profiles.profiles()
    }

    pub fn select_next(&mut self, performance: f64) -> Result<Question, SelectError> {
        let question = select_question(
            performance,
            &mut self.questions,
            &self.templates,
            &mut self.rng,
        )?;
        self.narrator.say(format!("Question : {}", question.question));
        Ok(question)
    }

    pub fn record_answer(
        &mut self,
        player: &str,
        question: &Question,
        given: &str,
    ) -> Result<AnswerOutcome, StorageError> {
        let outcome = apply_answer(&mut self.profiles, player, question, given)?;
        self.narrator.say(if outcome.correct {
            "Bonne réponse. Bravo."
        } else {
            "Mauvaise réponse. Ne t'inquiète pas, on réessaiera."
        });
        Ok(outcome)
    }

    /// Synthesizes a question without storing it; see [`Engine::add_question`].
    pub fn generate_one(
        &mut self,
        topic: Topic,
        difficulty: Difficulty,
    ) -> Result<Question, GenerateError> {
        self.templates.generate_question(
            topic,
            difficulty,
            self.questions.questions(),
            &mut self.rng,
        )
    }

    pub fn add_question(&mut self, question: Question) -> Result<(), StorageError> {
        self.questions.append(question)
    }

    pub fn import_batch(&mut self, payload: &str) -> Result<usize, ImportError> {
        self.questions.import_batch(payload)
    }

    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    pub fn random_topic(&mut self) -> Topic {
        self.templates.random_topic(&mut self.rng)
    }

    pub fn random_difficulty(&mut self) -> Difficulty {
        *Difficulty::ALL
            .choose(&mut self.rng)
            .unwrap_or(&Difficulty::Intermediate)
    }

    /// A short "thinking" line shown before the first question of a run.
    pub fn thinking_prompt(&mut self) -> &'static str {
        let prompt = THINKING_PROMPTS
            .choose(&mut self.rng)
            .copied()
            .unwrap_or(NEXT_QUESTION_PROMPT);
        self.narrator.say(prompt);
        prompt
    }

    pub fn narrate(&self, cue: impl Into<String>) {
        self.narrator.say(cue);
    }
}
