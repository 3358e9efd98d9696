//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across threads.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;

// ---------------------------------------------------------------------------
// ServiceConfig
// ---------------------------------------------------------------------------

/// Connection settings for the language-service endpoint.
///
/// Script generation, mistake analysis and phonetic breakdown all speak the
/// OpenAI chat-completions wire format, so a single endpoint serves all
/// three.  Works with Ollama (OpenAI mode), OpenAI, Groq, LM Studio, vLLM —
/// any compatible provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Base URL of the API endpoint.
    ///
    /// - Ollama default: `http://localhost:11434`
    /// - OpenAI: `https://api.openai.com`
    pub base_url: String,
    /// API key — `None` for local providers.
    pub api_key: Option<String>,
    /// Model identifier sent to the API (e.g. `"qwen2.5:3b"`, `"gpt-4o-mini"`).
    pub model: String,
    /// Sampling temperature (0.0 – 1.0).  Lower = more deterministic.
    pub temperature: f32,
    /// Maximum seconds to wait for a response before timing out.
    pub timeout_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".into(),
            api_key: None,
            model: "qwen2.5:3b".into(),
            temperature: 0.3,
            timeout_secs: 20,
        }
    }
}

// ---------------------------------------------------------------------------
// SpeechConfig
// ---------------------------------------------------------------------------

/// Settings for the text-to-speech playback voice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechConfig {
    /// Case-insensitive substrings that mark a synthesis voice as
    /// higher-quality.  The first English voice whose name contains one of
    /// these wins; any English voice is the fallback.
    pub quality_hints: Vec<String>,
    /// Milliseconds of simulated playback per character when no synthesis
    /// voice is available at all.
    pub ms_per_char: u64,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            quality_hints: vec![
                "natural".into(),
                "neural".into(),
                "premium".into(),
                "enhanced".into(),
                "google".into(),
            ],
            ms_per_char: 60,
        }
    }
}

// ---------------------------------------------------------------------------
// TimingConfig
// ---------------------------------------------------------------------------

/// Timing knobs for the turn-taking and practice state machines.
///
/// The defaults are the production values; tests shrink them so a full
/// session runs in milliseconds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Pause between a turn becoming active and its I/O starting, to avoid
    /// the synthesis tail bleeding into the microphone.
    pub settle_ms: u64,
    /// Silence window after the last transcript update before the turn is
    /// frozen and submitted.
    pub silence_ms: u64,
    /// How long a successful practice attempt stays on screen before the
    /// next word is presented.
    pub success_display_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            settle_ms: 700,
            silence_ms: 2500,
            success_display_ms: 1500,
        }
    }
}

impl TimingConfig {
    pub fn settle(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.settle_ms)
    }

    pub fn silence(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.silence_ms)
    }

    pub fn success_display(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.success_display_ms)
    }
}

// ---------------------------------------------------------------------------
// SessionDefaults
// ---------------------------------------------------------------------------

/// Default scene/role selection used by the console binary when the user
/// does not pick interactively.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionDefaults {
    /// Scene description handed to the script generator (e.g. `"at a café"`).
    pub scene: String,
    /// Role the learner reads aloud.
    pub user_role: String,
    /// Role the synthesized voice reads.
    pub ai_role: String,
    /// Free-form difficulty descriptor forwarded to the script generator.
    pub difficulty: String,
}

impl Default for SessionDefaults {
    fn default() -> Self {
        Self {
            scene: "ordering at a café".into(),
            user_role: "Customer".into(),
            ai_role: "Barista".into(),
            difficulty: "beginner, short everyday sentences".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use dialogue_coach::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
///
/// // Modify and save
/// // config.save().unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Language-service endpoint settings.
    pub service: ServiceConfig,
    /// Playback voice settings.
    pub speech: SpeechConfig,
    /// State-machine timing settings.
    pub timing: TimingConfig,
    /// Default scene/role selection for the console binary.
    pub session: SessionDefaults,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet
    /// (first-run scenario) so callers never need to special-case a missing
    /// file.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    /// Verify that a default `AppConfig` can be serialised to TOML and
    /// deserialised back without any data loss.
    #[test]
    fn round_trip_toml() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("settings.toml");

        let original = AppConfig::default();
        original.save_to(&path).expect("save");

        let loaded = AppConfig::load_from(&path).expect("load");

        assert_eq!(original.service.base_url, loaded.service.base_url);
        assert_eq!(original.service.api_key, loaded.service.api_key);
        assert_eq!(original.service.model, loaded.service.model);
        assert_eq!(original.service.timeout_secs, loaded.service.timeout_secs);

        assert_eq!(original.speech.quality_hints, loaded.speech.quality_hints);
        assert_eq!(original.speech.ms_per_char, loaded.speech.ms_per_char);

        assert_eq!(original.timing.settle_ms, loaded.timing.settle_ms);
        assert_eq!(original.timing.silence_ms, loaded.timing.silence_ms);
        assert_eq!(
            original.timing.success_display_ms,
            loaded.timing.success_display_ms
        );

        assert_eq!(original.session.scene, loaded.session.scene);
        assert_eq!(original.session.user_role, loaded.session.user_role);
    }

    /// `load_from` on a non-existent path must return `Default` without error.
    #[test]
    fn load_missing_returns_default() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("nonexistent.toml");

        let config = AppConfig::load_from(&path).expect("should not error");
        let default = AppConfig::default();

        assert_eq!(config.service.model, default.service.model);
        assert_eq!(config.timing.settle_ms, default.timing.settle_ms);
        assert_eq!(config.session.ai_role, default.session.ai_role);
    }

    /// Verify default timing values match the design.
    #[test]
    fn default_timings() {
        let cfg = AppConfig::default();

        assert_eq!(cfg.timing.settle_ms, 700);
        assert_eq!(cfg.timing.silence_ms, 2500);
        assert_eq!(cfg.timing.success_display_ms, 1500);
        assert_eq!(cfg.timing.silence().as_millis(), 2500);
    }

    /// Verify that modified non-default values survive a round trip.
    #[test]
    fn round_trip_modified_values() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("modified.toml");

        let mut cfg = AppConfig::default();
        cfg.service.base_url = "https://api.openai.com".into();
        cfg.service.api_key = Some("sk-test".into());
        cfg.service.model = "gpt-4o-mini".into();
        cfg.timing.silence_ms = 1800;
        cfg.session.user_role = "Traveller".into();

        cfg.save_to(&path).expect("save");
        let loaded = AppConfig::load_from(&path).expect("load");

        assert_eq!(loaded.service.base_url, "https://api.openai.com");
        assert_eq!(loaded.service.api_key, Some("sk-test".into()));
        assert_eq!(loaded.service.model, "gpt-4o-mini");
        assert_eq!(loaded.timing.silence_ms, 1800);
        assert_eq!(loaded.session.user_role, "Traveller");
    }
}
