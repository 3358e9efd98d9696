//! `Synthesizer` trait and the `tts`-crate implementation.
//!
//! The `tts` crate delegates synthesis to the operating system (Speech
//! Dispatcher on Linux, SAPI on Windows, AVFoundation on macOS).  Its calls
//! are quick queue operations but take `&mut self`, so every call site
//! clones the handle (clones share the backend) and runs the call on the
//! blocking thread pool.

use async_trait::async_trait;
use tts::Tts;

use crate::config::SpeechConfig;

use super::PlaybackError;

/// Hard floor for a simulated utterance, so even one-word lines leave an
/// audible gap.
const MIN_SIMULATED_MS: u64 = 500;

/// How often to ask the backend whether it is still speaking.
const POLL_INTERVAL_MS: u64 = 100;

// ---------------------------------------------------------------------------
// Synthesizer trait
// ---------------------------------------------------------------------------

/// Object-safe, thread-safe interface for speech-synthesis backends.
///
/// `speak` resolves only when the utterance has finished — the dialogue
/// engine awaits it to sequence turns.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Speak `text`, interrupting any in-flight utterance, and return once
    /// playback has completed.
    async fn speak(&self, text: &str) -> Result<(), PlaybackError>;

    /// Stop any in-flight utterance.
    async fn cancel(&self);
}

// ---------------------------------------------------------------------------
// Voice selection
// ---------------------------------------------------------------------------

/// Pick a voice index from `(name, language)` metadata.
///
/// Preference order: first English-locale voice whose name carries a quality
/// hint, then the first English-locale voice, then none.  Deterministic for
/// a given voice list.
fn pick_voice(meta: &[(String, String)], quality_hints: &[String]) -> Option<usize> {
    let english: Vec<usize> = meta
        .iter()
        .enumerate()
        .filter(|(_, (_, lang))| lang.to_lowercase().starts_with("en"))
        .map(|(i, _)| i)
        .collect();

    english
        .iter()
        .copied()
        .find(|&i| {
            let name = meta[i].0.to_lowercase();
            quality_hints.iter().any(|h| name.contains(&h.to_lowercase()))
        })
        .or_else(|| english.first().copied())
}

// ---------------------------------------------------------------------------
// SystemSynthesizer
// ---------------------------------------------------------------------------

/// Production synthesizer over the platform backend.
///
/// When no English voice exists at all, `speak` never touches the backend:
/// completion is simulated after a duration proportional to the text length
/// so the turn sequence cannot stall on a voiceless system.
pub struct SystemSynthesizer {
    // Tts clones share one backend; the mutex only guards the handle so the
    // synthesizer stays shareable across tasks.
    tts: std::sync::Mutex<Tts>,
    has_voice: bool,
    ms_per_char: u64,
}

impl SystemSynthesizer {
    /// Initialise the platform backend and select a voice.
    ///
    /// # Errors
    ///
    /// Returns [`PlaybackError::Backend`] when the platform has no speech
    /// synthesis backend at all.
    pub fn new(config: &SpeechConfig) -> Result<Self, PlaybackError> {
        let mut tts = Tts::default().map_err(|e| PlaybackError::Backend(e.to_string()))?;

        let voices = tts.voices().unwrap_or_default();
        let meta: Vec<(String, String)> = voices
            .iter()
            .map(|v| (v.name(), v.language().to_string()))
            .collect();

        let has_voice = match pick_voice(&meta, &config.quality_hints) {
            Some(i) => {
                log::info!("playback voice: {} ({})", meta[i].0, meta[i].1);
                tts.set_voice(&voices[i])
                    .map_err(|e| PlaybackError::Backend(e.to_string()))?;
                true
            }
            None => {
                log::warn!(
                    "no English synthesis voice available — playback will be simulated"
                );
                false
            }
        };

        Ok(Self {
            tts: std::sync::Mutex::new(tts),
            has_voice,
            ms_per_char: config.ms_per_char,
        })
    }

    fn handle(&self) -> Tts {
        self.tts.lock().unwrap().clone()
    }

    fn simulated_duration(&self, text: &str) -> std::time::Duration {
        let ms = (text.chars().count() as u64 * self.ms_per_char).max(MIN_SIMULATED_MS);
        std::time::Duration::from_millis(ms)
    }
}

#[async_trait]
impl Synthesizer for SystemSynthesizer {
    async fn speak(&self, text: &str) -> Result<(), PlaybackError> {
        if !self.has_voice {
            tokio::time::sleep(self.simulated_duration(text)).await;
            return Ok(());
        }

        let mut tts = self.handle();
        let utterance = text.to_string();
        tokio::task::spawn_blocking(move || tts.speak(utterance, true))
            .await
            .map_err(|e| PlaybackError::Backend(e.to_string()))?
            .map_err(|e| PlaybackError::Backend(e.to_string()))?;

        // Poll until the backend reports silence.  The generous ceiling
        // covers backends whose is_speaking is unreliable, so a stuck
        // utterance cannot stall the turn sequence.
        let ceiling = self.simulated_duration(text) * 4;
        let started = std::time::Instant::now();
        loop {
            tokio::time::sleep(std::time::Duration::from_millis(POLL_INTERVAL_MS)).await;

            let mut tts = self.handle();
            let speaking = tokio::task::spawn_blocking(move || tts.is_speaking())
                .await
                .map_err(|e| PlaybackError::Backend(e.to_string()))?
                .unwrap_or(false);

            if !speaking {
                return Ok(());
            }
            if started.elapsed() > ceiling {
                log::warn!("utterance exceeded {}ms — treating as complete", ceiling.as_millis());
                return Ok(());
            }
        }
    }

    async fn cancel(&self) {
        if !self.has_voice {
            return;
        }
        let mut tts = self.handle();
        let result =
            tokio::task::spawn_blocking(move || tts.stop().map(|_| ()).map_err(|e| e.to_string()))
                .await;
        if let Ok(Err(e)) = result {
            log::debug!("playback cancel failed: {e}");
        }
    }
}

// ---------------------------------------------------------------------------
// InstantSynthesizer  (test-only)
// ---------------------------------------------------------------------------

/// Test double that completes immediately and records everything spoken.
#[cfg(test)]
pub struct InstantSynthesizer {
    spoken: std::sync::Mutex<Vec<String>>,
    cancelled: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl InstantSynthesizer {
    pub fn new() -> Self {
        Self {
            spoken: std::sync::Mutex::new(Vec::new()),
            cancelled: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }

    pub fn cancel_count(&self) -> usize {
        self.cancelled.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
#[async_trait]
impl Synthesizer for InstantSynthesizer {
    async fn speak(&self, text: &str) -> Result<(), PlaybackError> {
        self.spoken.lock().unwrap().push(text.to_string());
        Ok(())
    }

    async fn cancel(&self) {
        self.cancelled
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(entries: &[(&str, &str)]) -> Vec<(String, String)> {
        entries
            .iter()
            .map(|(n, l)| (n.to_string(), l.to_string()))
            .collect()
    }

    fn hints() -> Vec<String> {
        SpeechConfig::default().quality_hints
    }

    #[test]
    fn prefers_english_voice_with_quality_hint() {
        let voices = meta(&[
            ("Hortense", "fr-FR"),
            ("Basic English", "en-GB"),
            ("Google UK English Female", "en-GB"),
        ]);
        assert_eq!(pick_voice(&voices, &hints()), Some(2));
    }

    #[test]
    fn falls_back_to_any_english_voice() {
        let voices = meta(&[("Hortense", "fr-FR"), ("Daniel", "en-GB"), ("Anna", "de-DE")]);
        assert_eq!(pick_voice(&voices, &hints()), Some(1));
    }

    #[test]
    fn no_english_voice_selects_none() {
        let voices = meta(&[("Hortense", "fr-FR"), ("Anna", "de-DE")]);
        assert_eq!(pick_voice(&voices, &hints()), None);
    }

    #[test]
    fn empty_voice_list_selects_none() {
        assert_eq!(pick_voice(&[], &hints()), None);
    }

    #[test]
    fn hint_match_is_case_insensitive() {
        let voices = meta(&[("Daniel", "en-GB"), ("MS NATURAL Jenny", "en-US")]);
        assert_eq!(pick_voice(&voices, &hints()), Some(1));
    }

    #[test]
    fn locale_match_ignores_region_and_case() {
        let voices = meta(&[("Voz", "es-MX"), ("Aria", "EN-AU")]);
        assert_eq!(pick_voice(&voices, &hints()), Some(1));
    }
}
