//! Remedial pronunciation practice.
//!
//! After the dialogue closes out with mistakes, the missed target words are
//! de-duplicated, broken into phonetic syllables, and drilled one at a time:
//!
//! ```text
//! Idle ──listen trigger──▶ Listening
//!                          ──matching transcript──▶ Success ──delay──▶ next word (Idle)
//!                          ──other transcript────▶ TryAgain ──listen trigger──▶ Listening
//!                          ──error / silent end──▶ Idle
//! ```
//!
//! The listen trigger is external (the excluded UI layer); the engine only
//! accepts it from `Idle` or `TryAgain`, so rapid re-triggering can never
//! start overlapping capture runs.

pub mod engine;
pub mod words;

pub use engine::{PracticeEngine, PracticeOutcome};
pub use words::{clean_word, practice_words, PracticeWord};

// ---------------------------------------------------------------------------
// PracticeStatus
// ---------------------------------------------------------------------------

/// Per-word practice state.
///
/// A separate, smaller machine than the dialogue capture status — scoped to
/// one practice word and reset when the cursor advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PracticeStatus {
    /// Waiting for the learner to trigger a listen attempt.
    #[default]
    Idle,
    /// A single-shot capture run is active.
    Listening,
    /// The word was matched; held on screen for the display delay.
    Success,
    /// The attempt did not match.  A fresh trigger is required to retry.
    TryAgain,
}

impl PracticeStatus {
    /// A short human-readable label suitable for display.
    pub fn label(&self) -> &'static str {
        match self {
            PracticeStatus::Idle => "Ready",
            PracticeStatus::Listening => "Listening",
            PracticeStatus::Success => "Correct!",
            PracticeStatus::TryAgain => "Try again",
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_status_is_idle() {
        assert_eq!(PracticeStatus::default(), PracticeStatus::Idle);
    }

    #[test]
    fn labels_are_stable() {
        assert_eq!(PracticeStatus::Idle.label(), "Ready");
        assert_eq!(PracticeStatus::Listening.label(), "Listening");
        assert_eq!(PracticeStatus::Success.label(), "Correct!");
        assert_eq!(PracticeStatus::TryAgain.label(), "Try again");
    }
}
