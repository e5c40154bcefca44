//! Player profiles keyed by name, persisted as one JSON object.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{Local, TimeZone, Utc};
use log::{debug, info};

use super::store::{read_json, write_json, StorageError};
use super::Difficulty;

/// Number of answer events kept per profile. Older events are dropped first.
pub const HISTORY_LIMIT: usize = 200;

pub const INITIAL_PERFORMANCE: f64 = 0.5;

/// Current time as fractional Unix seconds, the format used in the profile file.
pub fn now_timestamp() -> f64 {
    Utc::now().timestamp_millis() as f64 / 1000.0
}

fn initial_performance() -> f64 {
    INITIAL_PERFORMANCE
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AnswerEvent {
    pub question: String,
    pub given: String,
    pub correct: String,
    pub time: f64,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Profile {
    /// Skill estimate in `[0, 1]`. The only input to difficulty selection.
    #[serde(default = "initial_performance")]
    pub performance: f64,
    /// Shown to the player, never used for selection.
    #[serde(default)]
    pub level: Difficulty,
    #[serde(default)]
    pub history: Vec<AnswerEvent>,
    #[serde(default)]
    pub created: f64,
}

impl Profile {
    pub fn new() -> Self {
        Self {
            performance: INITIAL_PERFORMANCE,
            level: Difficulty::Beginner,
            history: Vec::new(),
            created: now_timestamp(),
        }
    }

    /// Performance as a whole percentage, for display.
    pub fn percent(&self) -> u32 {
        (self.performance * 100.0) as u32
    }

    pub fn created_date(&self) -> String {
        Local
            .timestamp_opt(self.created as i64, 0)
            .single()
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "-".to_string())
    }

    fn record(&mut self, event: AnswerEvent, performance_delta: f64) {
        self.history.push(event);
        if self.history.len() > HISTORY_LIMIT {
            let excess = self.history.len() - HISTORY_LIMIT;
            self.history.drain(..excess);
        }
        self.performance = (self.performance + performance_delta).clamp(0.0, 1.0);
    }
}

impl Default for Profile {
    fn default() -> Self {
        Self::new()
    }
}

pub struct ProfileStore {
    path: PathBuf,
    profiles: BTreeMap<String, Profile>,
}

impl ProfileStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let profiles = Self::load(&path)?;
        info!(
            "Loaded {} profiles from {}",
            profiles.len(),
            path.display()
        );
        Ok(Self { path, profiles })
    }

    /// Reads the profile file. A missing file is created holding an empty mapping.
    pub fn load(path: &Path) -> Result<BTreeMap<String, Profile>, StorageError> {
        if !path.exists() {
            debug!("{} is missing, starting with no profiles", path.display());
            let empty = BTreeMap::<String, Profile>::new();
            write_json(path, &empty)?;
            return Ok(empty);
        }
        read_json(path)
    }

    pub fn save(&self) -> Result<(), StorageError> {
        write_json(&self.path, &self.profiles)
    }

    /// Returns the named profile, creating and persisting a fresh one for an unseen name.
    pub fn get_or_create(&mut self, name: &str) -> Result<&Profile, StorageError> {
        if !self.profiles.contains_key(name) {
            self.profiles.insert(name.to_string(), Profile::new());
            if let Err(e) = self.save() {
                self.profiles.remove(name);
                return Err(e);
            }
            info!("Created profile for {}", name);
        }
        // Present in both branches above.
        Ok(&self.profiles[name])
    }

    /// Appends an answer event, shifts the performance by `performance_delta`
    /// (clamped to `[0, 1]`) and persists every profile.
    pub fn record_answer(
        &mut self,
        name: &str,
        question: &str,
        given: &str,
        correct: &str,
        performance_delta: f64,
    ) -> Result<&Profile, StorageError> {
        let previous = self.profiles.get(name).cloned();
        let event = AnswerEvent {
            question: question.to_string(),
            given: given.to_string(),
            correct: correct.to_string(),
            time: now_timestamp(),
        };
        self.profiles
            .entry(name.to_string())
            .or_default()
            .record(event, performance_delta);

        if let Err(e) = self.save() {
            match previous {
                Some(profile) => self.profiles.insert(name.to_string(), profile),
                None => self.profiles.remove(name),
            };
            return Err(e);
        }
        Ok(&self.profiles[name])
    }

    pub fn get(&self, name: &str) -> Option<&Profile> {
        self.profiles.get(name)
    }

    pub fn profiles(&self) -> &BTreeMap<String, Profile> {
        &self.profiles
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
