//! Durable question collection backed by a pretty-printed JSON array.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use super::{Difficulty, Question};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error on {}: {}", .path.display(), .source)]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{} does not contain valid data: {}", .path.display(), .source)]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Errors from importing an externally supplied batch of questions.
/// The store is left untouched whenever one of these is returned.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("the import must be a JSON array of questions")]
    NotAnArray,

    #[error("invalid import data: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, StorageError> {
    let content = fs::read_to_string(path).map_err(|source| StorageError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| StorageError::Corrupt {
        path: path.to_path_buf(),
        source,
    })
}

/// Writes to a sibling temporary file first, then renames it over `path`.
pub(crate) fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StorageError> {
    let content = serde_json::to_string_pretty(value).map_err(|source| StorageError::Corrupt {
        path: path.to_path_buf(),
        source,
    })?;

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    let io_err = |source| StorageError::Io {
        path: path.to_path_buf(),
        source,
    };
    fs::write(&tmp_path, content).map_err(io_err)?;
    fs::rename(&tmp_path, path).map_err(io_err)?;
    Ok(())
}

fn warn_unanswerable(questions: &[Question]) {
    for q in questions.iter().filter(|q| !q.has_option(&q.answer)) {
        warn!(
            "Question {:?} has answer {:?}, which is not one of its options",
            q.question, q.answer
        );
    }
}

/// Questions written to a fresh question file.
pub fn default_questions() -> Vec<Question> {
    let options = |opts: [&str; 4]| opts.iter().map(|o| o.to_string()).collect::<Vec<_>>();
    vec![
        Question::new(
            "Qui a construit l'arche ?",
            options(["Moïse", "Abraham", "Noé", "David"]),
            "Noé",
            Difficulty::Beginner,
            "Histoire",
        ),
        Question::new(
            "Combien d'apôtres Jésus avait-il ?",
            options(["7", "10", "12", "14"]),
            "12",
            Difficulty::Beginner,
            "Vie de Jésus",
        ),
        Question::new(
            "Quel prophète a été avalé par un grand poisson ?",
            options(["Jonas", "Ésaïe", "Élie", "Daniel"]),
            "Jonas",
            Difficulty::Beginner,
            "Prophétie",
        ),
        Question::new(
            "Quel roi est célèbre pour sa sagesse ?",
            options(["Saül", "David", "Salomon", "Josias"]),
            "Salomon",
            Difficulty::Intermediate,
            "Sagesse",
        ),
        Question::new(
            "Dans quel livre trouve-t-on la vision des ossements desséchés ?",
            options(["Ézéchiel", "Daniel", "Jérémie", "Osée"]),
            "Ézéchiel",
            Difficulty::Expert,
            "Prophétie",
        ),
    ]
}

pub struct QuestionStore {
    path: PathBuf,
    questions: Vec<Question>,
}

impl QuestionStore {
    /// Loads the store, seeding the backing file first if it does not exist.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let questions = Self::load(&path)?;
        warn_unanswerable(&questions);
        info!(
            "Loaded {} questions from {}",
            questions.len(),
            path.display()
        );
        Ok(Self { path, questions })
    }

    pub fn load(path: &Path) -> Result<Vec<Question>, StorageError> {
        if !path.exists() {
            debug!("{} is missing, writing the default questions", path.display());
            write_json(path, &default_questions())?;
        }
        read_json(path)
    }

    pub fn save(&self) -> Result<(), StorageError> {
        write_json(&self.path, &self.questions)
    }

    pub fn append(&mut self, question: Question) -> Result<(), StorageError> {
        self.questions.push(question);
        if let Err(e) = self.save() {
            self.questions.pop();
            return Err(e);
        }
        Ok(())
    }

    /// Appends every question of a JSON array and persists the result.
    /// Returns the number of imported questions.
    pub fn import_batch(&mut self, payload: &str) -> Result<usize, ImportError> {
        let value: serde_json::Value = serde_json::from_str(payload)?;
        if !value.is_array() {
            return Err(ImportError::NotAnArray);
        }
        let batch: Vec<Question> = serde_json::from_value(value)?;
        let count = batch.len();
        warn_unanswerable(&batch);

        let previous_len = self.questions.len();
        self.questions.extend(batch);
        if let Err(e) = self.save() {
            self.questions.truncate(previous_len);
            return Err(e.into());
        }
        info!("Imported {} questions", count);
        Ok(count)
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
