//! Speech-playback abstraction.
//!
//! [`Synthesizer`] is the seam over the platform text-to-speech backend;
//! [`SystemSynthesizer`] is the production implementation on the `tts`
//! crate.  [`PlaybackSession`] is what the dialogue engine holds: `speak`
//! resolves when the utterance has finished (or its simulated duration has
//! elapsed), and a new utterance always cancels an in-flight one.

pub mod session;
pub mod synth;

pub use session::PlaybackSession;
pub use synth::{Synthesizer, SystemSynthesizer};

#[cfg(test)]
pub use synth::InstantSynthesizer;

use thiserror::Error;

// ---------------------------------------------------------------------------
// PlaybackError
// ---------------------------------------------------------------------------

/// Errors raised by the playback subsystem.
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// The platform synthesis backend failed.
    #[error("speech synthesis failed: {0}")]
    Backend(String),
}
