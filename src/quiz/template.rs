use std::collections::BTreeMap;
use std::path::Path;

use log::debug;
use rand::seq::SliceRandom;
use rand::Rng;
use thiserror::Error;

use super::store::{read_json, StorageError};
use super::{Difficulty, Question, Topic};

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("no template for {0} and no stored question to fall back on")]
    EmptyStore(Topic),
}

/// Slot values for one variation of a template, e.g. `{"indice": "le semeur"}`.
pub type Filler = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Template {
    /// Question text with `{name}` slots.
    pub text: String,
    pub options: Vec<String>,
}

impl Template {
    /// A template without options cannot yield an answer and is never used.
    pub fn is_usable(&self) -> bool {
        !self.options.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TopicTemplates {
    #[serde(default)]
    pub templates: Vec<Template>,
    #[serde(default)]
    pub fillers: Vec<Filler>,
}

/// Question templates per topic. Adding content means editing the table
/// (or the JSON file it is loaded from), not the generator.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct TemplateTable {
    topics: BTreeMap<Topic, TopicTemplates>,
}

impl TemplateTable {
    pub fn new(topics: BTreeMap<Topic, TopicTemplates>) -> Self {
        Self { topics }
    }

    pub fn load(path: &Path) -> Result<Self, StorageError> {
        read_json(path)
    }

    pub fn builtin() -> Self {
        fn template(text: &str, options: [&str; 4]) -> Template {
            Template {
                text: text.to_string(),
                options: options.iter().map(|o| o.to_string()).collect(),
            }
        }
        fn filler(slot: &str, value: &str) -> Filler {
            Filler::from([(slot.to_string(), value.to_string())])
        }

        let mut topics = BTreeMap::new();
        topics.insert(
            Topic::Histoire,
            TopicTemplates {
                templates: vec![
                    template("Qui a {action} ?", ["Moïse", "Abraham", "Noé", "David"]),
                    template(
                        "Quel personnage biblique est lié à {indice} ?",
                        ["Moïse", "Josué", "Samuel", "David"],
                    ),
                ],
                fillers: vec![
                    filler("action", "construit l'arche"),
                    filler("action", "ouvert la mer Rouge"),
                    filler("indice", "le désert"),
                ],
            },
        );
        topics.insert(
            Topic::Prophetie,
            TopicTemplates {
                templates: vec![template(
                    "Quel prophète est associé à {indice} ?",
                    ["Ésaïe", "Jérémie", "Ézéchiel", "Daniel"],
                )],
                fillers: vec![
                    filler("indice", "les ossements desséchés"),
                    filler("indice", "la vision nocturne"),
                ],
            },
        );
        topics.insert(
            Topic::VieDeJesus,
            TopicTemplates {
                templates: vec![template(
                    "Dans quel évangile trouve-t-on la parabole de {indice} ?",
                    ["Matthieu", "Marc", "Luc", "Jean"],
                )],
                fillers: vec![
                    filler("indice", "le bon samaritain"),
                    filler("indice", "le semeur"),
                ],
            },
        );
        topics.insert(
            Topic::Sagesse,
            TopicTemplates {
                templates: vec![template(
                    "Quel livre contient principalement des conseils et proverbes ?",
                    ["Proverbes", "Psaumes", "Ésaïe", "Romains"],
                )],
                fillers: vec![filler("indice", "la sagesse du roi")],
            },
        );
        Self { topics }
    }

    pub fn get(&self, topic: Topic) -> Option<&TopicTemplates> {
        self.topics.get(&topic)
    }

    /// Topics with at least one usable template.
    pub fn topics(&self) -> Vec<Topic> {
        self.topics
            .iter()
            .filter(|(_, entry)| entry.templates.iter().any(Template::is_usable))
            .map(|(topic, _)| *topic)
            .collect()
    }

    /// Picks a registered topic, or any topic when the table is empty.
    pub fn random_topic<R: Rng + ?Sized>(&self, rng: &mut R) -> Topic {
        let registered = self.topics();
        let candidates: &[Topic] = if registered.is_empty() {
            &Topic::ALL
        } else {
            &registered
        };
        *candidates.choose(rng).unwrap_or(&Topic::Histoire)
    }

    /// Builds a question for `topic` at `difficulty`.
    ///
    /// The options are shuffled and whichever lands first becomes the answer,
    /// so the answer is not tied to the meaning of the question text.
    /// Topics without templates, or whose templates all lack options, reuse
    /// a random question from `fallback_pool` with its difficulty replaced.
    pub fn generate_question<R: Rng + ?Sized>(
        &self,
        topic: Topic,
        difficulty: Difficulty,
        fallback_pool: &[Question],
        rng: &mut R,
    ) -> Result<Question, GenerateError> {
        let entry = self.get(topic);
        let template = entry.and_then(|e| {
            let usable: Vec<&Template> = e.templates.iter().filter(|t| t.is_usable()).collect();
            usable.choose(rng).copied()
        });
        let (Some(entry), Some(template)) = (entry, template) else {
            debug!("No template for {}, reusing a stored question", topic);
            let base = fallback_pool
                .choose(rng)
                .ok_or(GenerateError::EmptyStore(topic))?;
            return Ok(Question {
                difficulty,
                ..base.clone()
            });
        };

        let no_slots = Filler::new();
        let filler = entry.fillers.choose(rng).unwrap_or(&no_slots);
        let text = fill_slots(&template.text, filler).unwrap_or_else(|| template.text.clone());

        let mut options = template.options.clone();
        options.shuffle(rng);
        let answer = options.first().cloned().unwrap_or_default();

        Ok(Question::new(text, options, answer, difficulty, topic.label()))
    }
}

/// Replaces `{name}` slots with filler values; `{{` and `}}` are literal braces.
/// Only bare named fields are supported: format specs and conversions such as
/// `{indice:>5}` or `{indice!r}` are treated as unknown slot names.
/// Returns `None` when a slot has no value or a brace is unbalanced.
pub fn fill_slots(template: &str, filler: &Filler) -> Option<String> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some('{') | None => return None,
                        Some(ch) => name.push(ch),
                    }
                }
                out.push_str(filler.get(&name)?);
            }
            '}' => return None,
            _ => out.push(c),
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quiz::store::default_questions;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_fill_slots() {
        let filler = Filler::from([("indice".to_string(), "le semeur".to_string())]);
        assert_eq!(
            fill_slots("La parabole de {indice} ?", &filler).as_deref(),
            Some("La parabole de le semeur ?")
        );
        assert_eq!(
            fill_slots("Pas de champ {{ici}}", &filler).as_deref(),
            Some("Pas de champ {ici}")
        );
        assert_eq!(fill_slots("Qui a {action} ?", &filler), None);
        assert_eq!(fill_slots("Ouvert {indice", &filler), None);
        assert_eq!(fill_slots("Fermé }", &filler), None);
    }

    #[test]
    fn test_format_specs_are_not_slots() {
        let filler = Filler::from([("indice".to_string(), "le semeur".to_string())]);
        assert_eq!(fill_slots("Parabole de {indice:>5} ?", &filler), None);
        assert_eq!(fill_slots("Parabole de {indice!r} ?", &filler), None);
    }

    #[test]
    fn test_template_without_options_is_skipped() {
        let table: TemplateTable = serde_json::from_str(
            r#"{"Sagesse": {"templates": [{"text": "Qui ?", "options": []}], "fillers": []}}"#,
        )
        .unwrap();
        let mut rng = StdRng::seed_from_u64(4);

        assert!(table.topics().is_empty());
        let result = table.generate_question(Topic::Sagesse, Difficulty::Expert, &[], &mut rng);
        assert!(matches!(result, Err(GenerateError::EmptyStore(Topic::Sagesse))));

        let pool = default_questions();
        for _ in 0..20 {
            let q = table
                .generate_question(Topic::Sagesse, Difficulty::Expert, &pool, &mut rng)
                .unwrap();
            assert!(!q.answer.is_empty());
            assert!(q.has_option(&q.answer));
        }
    }

    #[test]
    fn test_usable_template_wins_over_empty_one() {
        let table: TemplateTable = serde_json::from_str(
            r#"{"Sagesse": {"templates": [{"text": "Qui ?", "options": []},
                                          {"text": "Quel roi ?", "options": ["Salomon", "Saül"]}]}}"#,
        )
        .unwrap();
        let mut rng = StdRng::seed_from_u64(9);

        assert_eq!(table.topics(), vec![Topic::Sagesse]);
        for _ in 0..20 {
            let q = table
                .generate_question(Topic::Sagesse, Difficulty::Beginner, &[], &mut rng)
                .unwrap();
            assert_eq!(q.question, "Quel roi ?");
            assert!(q.has_option(&q.answer));
        }
    }

    #[test]
    fn test_missing_slot_keeps_template_text() {
        let mut topics = BTreeMap::new();
        topics.insert(
            Topic::Histoire,
            TopicTemplates {
                templates: vec![Template {
                    text: "Qui a {action} ?".to_string(),
                    options: vec!["Moïse".into(), "Noé".into()],
                }],
                fillers: vec![Filler::from([("indice".to_string(), "le désert".to_string())])],
            },
        );
        let table = TemplateTable::new(topics);
        let mut rng = StdRng::seed_from_u64(1);

        let q = table
            .generate_question(Topic::Histoire, Difficulty::Expert, &[], &mut rng)
            .unwrap();
        assert_eq!(q.question, "Qui a {action} ?");
    }

    #[test]
    fn test_generated_answer_is_an_option() {
        let table = TemplateTable::builtin();
        let mut rng = StdRng::seed_from_u64(42);

        for _ in 0..200 {
            let topic = table.random_topic(&mut rng);
            let q = table
                .generate_question(topic, Difficulty::Intermediate, &[], &mut rng)
                .unwrap();
            assert!(q.has_option(&q.answer));
            assert_eq!(q.answer, q.options[0]);
            assert_eq!(q.options.len(), 4);
            assert_eq!(q.difficulty, Difficulty::Intermediate);
            assert_eq!(q.topic, topic.label());
        }
    }

    #[test]
    fn test_options_are_a_permutation_of_the_template() {
        let table = TemplateTable::builtin();
        let mut rng = StdRng::seed_from_u64(7);

        let q = table
            .generate_question(Topic::Sagesse, Difficulty::Beginner, &[], &mut rng)
            .unwrap();
        let mut options = q.options.clone();
        options.sort();
        assert_eq!(options, vec!["Proverbes", "Psaumes", "Romains", "Ésaïe"]);
        assert_eq!(
            q.question,
            "Quel livre contient principalement des conseils et proverbes ?"
        );
    }

    #[test]
    fn test_filled_question_text() {
        let table = TemplateTable::builtin();
        let mut rng = StdRng::seed_from_u64(3);

        for _ in 0..20 {
            let q = table
                .generate_question(Topic::VieDeJesus, Difficulty::Beginner, &[], &mut rng)
                .unwrap();
            assert!(
                q.question == "Dans quel évangile trouve-t-on la parabole de le bon samaritain ?"
                    || q.question == "Dans quel évangile trouve-t-on la parabole de le semeur ?"
            );
        }
    }

    #[test]
    fn test_unregistered_topic_falls_back_to_store() {
        let table = TemplateTable::default();
        let pool = default_questions();
        let mut rng = StdRng::seed_from_u64(11);

        let q = table
            .generate_question(Topic::Prophetie, Difficulty::Expert, &pool, &mut rng)
            .unwrap();
        assert_eq!(q.difficulty, Difficulty::Expert);
        let base = pool
            .iter()
            .find(|b| b.question == q.question)
            .expect("fallback copies a stored question");
        assert_eq!(base.options, q.options);
        assert_eq!(base.answer, q.answer);
        assert_eq!(base.topic, q.topic);
    }

    #[test]
    fn test_fallback_with_empty_store_fails() {
        let table = TemplateTable::default();
        let mut rng = StdRng::seed_from_u64(0);
        let result = table.generate_question(Topic::Sagesse, Difficulty::Beginner, &[], &mut rng);
        assert!(matches!(result, Err(GenerateError::EmptyStore(Topic::Sagesse))));
    }

    #[test]
    fn test_random_topic_uses_registered_topics() {
        let mut topics = BTreeMap::new();
        topics.insert(Topic::Sagesse, TemplateTable::builtin().topics[&Topic::Sagesse].clone());
        topics.insert(Topic::Histoire, TopicTemplates::default());
        let table = TemplateTable::new(topics);
        let mut rng = StdRng::seed_from_u64(5);

        assert_eq!(table.topics(), vec![Topic::Sagesse]);
        for _ in 0..10 {
            assert_eq!(table.random_topic(&mut rng), Topic::Sagesse);
        }
    }

    #[test]
    fn test_table_json_shape() {
        let table = TemplateTable::builtin();
        let json = serde_json::to_value(&table).unwrap();
        assert!(json["Vie de Jésus"]["templates"].is_array());
        assert_eq!(json["Sagesse"]["fillers"][0]["indice"], "la sagesse du roi");

        let back: TemplateTable = serde_json::from_value(json).unwrap();
        assert_eq!(back, table);
    }
}
