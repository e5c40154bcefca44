pub mod engine;
pub mod narration;
pub mod profile;
pub mod selector;
pub mod store;
pub mod template;
pub mod tracker;

use std::fmt;

use log::warn;
use serde::{Deserialize, Deserializer};

/// Difficulty tier of a question. Ordered from easiest to hardest.
///
/// Serialised with the French labels used by the question and profile files;
/// the English names are accepted when reading.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    serde::Serialize,
    serde::Deserialize,
)]
pub enum Difficulty {
    #[default]
    #[serde(rename = "Débutant", alias = "Beginner")]
    Beginner,
    #[serde(rename = "Intermédiaire", alias = "Intermediate")]
    Intermediate,
    #[serde(rename = "Expert")]
    Expert,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [
        Difficulty::Beginner,
        Difficulty::Intermediate,
        Difficulty::Expert,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Difficulty::Beginner => "Débutant",
            Difficulty::Intermediate => "Intermédiaire",
            Difficulty::Expert => "Expert",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Topics that have entries in the template table.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub enum Topic {
    #[serde(rename = "Histoire")]
    Histoire,
    #[serde(rename = "Vie de Jésus")]
    VieDeJesus,
    #[serde(rename = "Prophétie")]
    Prophetie,
    #[serde(rename = "Sagesse")]
    Sagesse,
}

impl Topic {
    pub const ALL: [Topic; 4] = [
        Topic::Histoire,
        Topic::VieDeJesus,
        Topic::Prophetie,
        Topic::Sagesse,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Topic::Histoire => "Histoire",
            Topic::VieDeJesus => "Vie de Jésus",
            Topic::Prophetie => "Prophétie",
            Topic::Sagesse => "Sagesse",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

fn default_topic() -> String {
    "Général".to_string()
}

/// Reads a difficulty label, falling back to the default tier for labels
/// this version does not know.
fn lenient_difficulty<'de, D>(deserializer: D) -> Result<Difficulty, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    match serde_json::from_value(value.clone()) {
        Ok(difficulty) => Ok(difficulty),
        Err(_) => {
            warn!(
                "Unknown difficulty {}, treating the question as {}",
                value,
                Difficulty::default()
            );
            Ok(Difficulty::default())
        }
    }
}

/// A multiple-choice question. Never mutated once created.
///
/// `answer` is expected to be one of `options`, but imported records are
/// not checked. Keys this struct does not know are kept in `extra` and
/// written back on save.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Question {
    pub question: String,
    pub options: Vec<String>,
    #[serde(default)]
    pub answer: String,
    #[serde(default, deserialize_with = "lenient_difficulty")]
    pub difficulty: Difficulty,
    #[serde(default = "default_topic")]
    pub topic: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Question {
    pub fn new(
        question: impl Into<String>,
        options: Vec<String>,
        answer: impl Into<String>,
        difficulty: Difficulty,
        topic: impl Into<String>,
    ) -> Self {
        Self {
            question: question.into(),
            options,
            answer: answer.into(),
            difficulty,
            topic: topic.into(),
            extra: serde_json::Map::new(),
        }
    }

    pub fn is_correct(&self, given: &str) -> bool {
        given == self.answer
    }

    pub fn has_option(&self, text: &str) -> bool {
        self.options.iter().any(|o| o == text)
    }
}
