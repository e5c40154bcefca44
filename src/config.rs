use std::path::PathBuf;

const DEFAULT_QUESTIONS_FILE: &str = "bible_questions_ai.json";
const DEFAULT_PROFILES_FILE: &str = "profiles.json";
const DEFAULT_DIALOGUE_DB: &str = "db.sqlite";

/// Runtime settings, read from the environment (and `.env`).
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub questions_file: PathBuf,
    pub profiles_file: PathBuf,
    /// SQLite database holding the chat dialogue states.
    pub dialogue_db: String,
    /// Replaces the built-in question templates when set.
    pub templates_file: Option<PathBuf>,
    pub narration: bool,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            questions_file: non_empty("QUESTIONS_FILE")
                .unwrap_or_else(|| DEFAULT_QUESTIONS_FILE.to_string())
                .into(),
            profiles_file: non_empty("PROFILES_FILE")
                .unwrap_or_else(|| DEFAULT_PROFILES_FILE.to_string())
                .into(),
            dialogue_db: non_empty("DIALOGUE_DB").unwrap_or_else(|| DEFAULT_DIALOGUE_DB.to_string()),
            templates_file: non_empty("TEMPLATES_FILE").map(PathBuf::from),
            narration: !matches!(
                non_empty("NARRATION").map(|v| v.to_lowercase()).as_deref(),
                Some("off" | "0" | "false")
            ),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_with(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.questions_file, PathBuf::from("bible_questions_ai.json"));
        assert_eq!(config.profiles_file, PathBuf::from("profiles.json"));
        assert_eq!(config.dialogue_db, "db.sqlite");
        assert_eq!(config.templates_file, None);
        assert!(config.narration);
    }

    #[test]
    fn test_overrides() {
        let config = config_with(&[
            ("QUESTIONS_FILE", "/data/q.json"),
            ("PROFILES_FILE", "/data/p.json"),
            ("TEMPLATES_FILE", "/data/t.json"),
            ("NARRATION", "OFF"),
        ]);
        assert_eq!(config.questions_file, PathBuf::from("/data/q.json"));
        assert_eq!(config.profiles_file, PathBuf::from("/data/p.json"));
        assert_eq!(config.templates_file, Some(PathBuf::from("/data/t.json")));
        assert!(!config.narration);
    }

    #[test]
    fn test_blank_values_use_defaults() {
        let config = config_with(&[("QUESTIONS_FILE", "  "), ("NARRATION", "")]);
        assert_eq!(config.questions_file, PathBuf::from("bible_questions_ai.json"));
        assert!(config.narration);
    }
}
