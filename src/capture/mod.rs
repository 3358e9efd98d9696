//! Speech-capture abstraction.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │                CaptureDevice (trait)                   │
//! │                                                        │
//! │  platform speech recognizer / ScriptedCapture (tests)  │
//! │                        │                               │
//! │            CaptureEvent over one mpsc channel          │
//! │                        ▼                               │
//! │   CaptureSession ── start()/stop()/abort(), dedup of   │
//! │                     double-starts, post-stop draining  │
//! └────────────────────────────────────────────────────────┘
//! ```
//!
//! The device is subscribed exactly once, at wiring time: it receives one
//! `mpsc::Sender<CaptureEvent>` for its whole lifetime and every raw event
//! is dispatched into whichever state machine is current.  There is no
//! per-state subscribe/unsubscribe churn.

pub mod session;

pub use session::{CaptureDevice, CaptureSession};

#[cfg(test)]
pub use session::{ScriptedCapture, ScriptedStep};

use thiserror::Error;

// ---------------------------------------------------------------------------
// CaptureMode
// ---------------------------------------------------------------------------

/// How a capture run should behave.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureMode {
    /// Deliver zero or more incremental results, optionally followed by
    /// finals, until stopped.  Used for dialogue turns.
    Continuous,
    /// Deliver at most one final result, then end.  Used for practice
    /// attempts.
    SingleShot,
}

// ---------------------------------------------------------------------------
// CaptureStatus
// ---------------------------------------------------------------------------

/// Capture state as seen by the dialogue engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptureStatus {
    /// No capture running.
    #[default]
    Idle,
    /// A capture run is active and may deliver results.
    Listening,
    /// A non-benign device error blocks further automatic starts until an
    /// external action clears it.
    Error,
}

// ---------------------------------------------------------------------------
// CaptureEvent
// ---------------------------------------------------------------------------

/// Raw events delivered by a capture device run.
///
/// A run emits any number of `Result` and at most one `Error`, and always
/// terminates with exactly one `End` — including after `stop()`/`abort()`
/// and after errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureEvent {
    /// An incremental or final transcript for one result slot.
    ///
    /// Slots are keyed by `index`; a later event for the same index
    /// supersedes the earlier transcript.
    Result {
        index: usize,
        transcript: String,
        is_final: bool,
    },
    /// The device reported an error.  The run still ends with `End`.
    Error { kind: CaptureErrorKind },
    /// The run is over; no further events will arrive for it.
    End,
}

// ---------------------------------------------------------------------------
// CaptureErrorKind
// ---------------------------------------------------------------------------

/// Device error taxonomy.
///
/// `Aborted` and `NoSpeech` are benign interruptions: capture simply stopped
/// and may be restarted for the same turn.  Everything else blocks further
/// automatic starts until externally cleared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureErrorKind {
    /// The run was cancelled by the application.
    Aborted,
    /// The device heard nothing usable.
    NoSpeech,
    /// Microphone permission was denied.
    NotAllowed,
    /// No usable capture hardware.
    AudioUnavailable,
    /// The recognizer's network backend failed.
    Network,
    /// Any other device-specific kind string.
    Other(String),
}

impl CaptureErrorKind {
    /// Benign interruptions reset capture silently; everything else is a
    /// blocking error.
    pub fn is_benign(&self) -> bool {
        matches!(self, CaptureErrorKind::Aborted | CaptureErrorKind::NoSpeech)
    }

    /// Parse a device kind string (`"no-speech"`, `"not-allowed"`, …).
    pub fn from_kind_str(kind: &str) -> Self {
        match kind {
            "aborted" => CaptureErrorKind::Aborted,
            "no-speech" => CaptureErrorKind::NoSpeech,
            "not-allowed" | "service-not-allowed" => CaptureErrorKind::NotAllowed,
            "audio-capture" => CaptureErrorKind::AudioUnavailable,
            "network" => CaptureErrorKind::Network,
            other => CaptureErrorKind::Other(other.to_string()),
        }
    }
}

impl std::fmt::Display for CaptureErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptureErrorKind::Aborted => write!(f, "aborted"),
            CaptureErrorKind::NoSpeech => write!(f, "no-speech"),
            CaptureErrorKind::NotAllowed => write!(f, "not-allowed"),
            CaptureErrorKind::AudioUnavailable => write!(f, "audio-capture"),
            CaptureErrorKind::Network => write!(f, "network"),
            CaptureErrorKind::Other(kind) => write!(f, "{kind}"),
        }
    }
}

// ---------------------------------------------------------------------------
// CaptureError
// ---------------------------------------------------------------------------

/// Errors raised when a capture run cannot be started at all.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("capture device unavailable: {0}")]
    DeviceUnavailable(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
