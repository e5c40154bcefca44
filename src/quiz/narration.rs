//! Fire-and-forget narration cues.
//!
//! The engine hands short texts to a [`Narrator`]; a background worker passes
//! them on to a [`NarrationSink`] (a speech backend, a log, ...). Nothing here
//! reports back to the engine: a missing worker or a failing sink only loses cues.

use log::{debug, info};
use tokio::sync::mpsc;

pub type NarrationResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

pub trait NarrationSink: Send + 'static {
    /// May block; it runs on a dedicated blocking thread.
    fn speak(&mut self, cue: &str) -> NarrationResult;
}

/// Writes cues to the log under the `narration` target.
pub struct LogSink;

impl NarrationSink for LogSink {
    fn speak(&mut self, cue: &str) -> NarrationResult {
        info!(target: "narration", "{}", cue);
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct Narrator {
    tx: Option<mpsc::UnboundedSender<String>>,
}

impl Narrator {
    /// Drops every cue.
    pub fn silent() -> Self {
        Self { tx: None }
    }

    /// Starts a worker on the current tokio runtime feeding `sink`.
    pub fn spawn(mut sink: impl NarrationSink) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        tokio::task::spawn_blocking(move || {
            while let Some(cue) = rx.blocking_recv() {
                if let Err(e) = sink.speak(&cue) {
                    debug!("Narration failed for {:?}: {}", cue, e);
                }
            }
        });
        Self { tx: Some(tx) }
    }

    pub fn say(&self, cue: impl Into<String>) {
        if let Some(tx) = &self.tx {
            // The worker may be gone; the cue is simply lost then.
            let _ = tx.send(cue.into());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    struct Recorder(Arc<Mutex<Vec<String>>>);

    impl NarrationSink for Recorder {
        fn speak(&mut self, cue: &str) -> NarrationResult {
            self.0.lock().unwrap().push(cue.to_string());
            Ok(())
        }
    }

    struct Broken(Arc<Mutex<usize>>);

    impl NarrationSink for Broken {
        fn speak(&mut self, _cue: &str) -> NarrationResult {
            *self.0.lock().unwrap() += 1;
            Err("no audio device".into())
        }
    }

    async fn wait_for(mut done: impl FnMut() -> bool) {
        for _ in 0..200 {
            if done() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    #[tokio::test]
    async fn test_cues_reach_the_sink_in_order() {
        let spoken = Arc::new(Mutex::new(Vec::new()));
        let narrator = Narrator::spawn(Recorder(spoken.clone()));

        narrator.say("Bienvenue");
        narrator.say("Question : Qui a construit l'arche ?".to_string());

        wait_for(|| spoken.lock().unwrap().len() == 2).await;
        assert_eq!(
            *spoken.lock().unwrap(),
            vec!["Bienvenue", "Question : Qui a construit l'arche ?"]
        );
    }

    #[tokio::test]
    async fn test_failing_sink_keeps_receiving() {
        let attempts = Arc::new(Mutex::new(0));
        let narrator = Narrator::spawn(Broken(attempts.clone()));

        narrator.say("un");
        narrator.say("deux");

        wait_for(|| *attempts.lock().unwrap() == 2).await;
        assert_eq!(*attempts.lock().unwrap(), 2);
    }

    #[test]
    fn test_silent_narrator_ignores_cues() {
        let narrator = Narrator::silent();
        narrator.say("personne n'écoute");
        let copy = narrator.clone();
        copy.say("toujours personne");
    }
}
