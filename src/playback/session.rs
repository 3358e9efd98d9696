//! `PlaybackSession` — what the dialogue engine actually holds.

use std::sync::Arc;

use super::{PlaybackError, Synthesizer};

/// Shared handle over the synthesizer.
///
/// Cheap to clone.  Starting a new utterance always cancels any in-flight
/// one first, so overlapping lines cannot talk over each other.
#[derive(Clone)]
pub struct PlaybackSession {
    synth: Arc<dyn Synthesizer>,
}

impl PlaybackSession {
    pub fn new(synth: Arc<dyn Synthesizer>) -> Self {
        Self { synth }
    }

    /// Speak `text` and return once playback has completed.
    pub async fn speak(&self, text: &str) -> Result<(), PlaybackError> {
        self.synth.cancel().await;
        log::debug!("playback: speaking {:?}", text);
        self.synth.speak(text).await
    }

    /// Cancel any in-flight utterance.
    pub async fn cancel(&self) {
        self.synth.cancel().await;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
