//! Top-level session types and the shared I/O bundle.
//!
//! # Architecture
//!
//! ```text
//! CaptureEvent (mpsc, from the device)  ─┐
//! SessionCommand (mpsc, from the UI)    ─┼──▶ SessionController::run()
//! TimerEvent (mpsc, internal)           ─┘         │
//!                                                  ├─ Phase::Dialogue  → DialogueEngine
//!                                                  └─ Phase::Practice  → PracticeEngine
//!
//! SessionNotice (mpsc) ◀── controller/engines ── read by the UI layer
//! ```
//!
//! One event is processed at a time; all I/O suspends the run loop instead
//! of blocking it, so the state machines never see interleaved mutation.

pub mod controller;

pub use controller::{SessionController, SessionError};

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::analysis::{MistakeAnalyzer, PhoneticService};
use crate::capture::CaptureSession;
use crate::config::TimingConfig;
use crate::playback::PlaybackSession;
use crate::practice::{PracticeStatus, PracticeWord};

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

/// Top-level session phase, owned by the controller.
///
/// Dialogue and Practice keep their own sub-states; this enum only tracks
/// which machine (if any) owns the capture session right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// Waiting for a scene to be chosen.
    #[default]
    SceneSelect,
    /// Waiting for the learner's role to be chosen.
    CharacterSelect,
    /// Script generation is in flight.
    ScriptLoading,
    /// Turn-taking rehearsal is running.
    Dialogue,
    /// Practice words are being prepared (phonetic fetches in flight).
    PracticePrep,
    /// Word-by-word pronunciation practice is running.
    Practice,
    /// The session is over; the completion notice has been emitted.
    Complete,
}

impl Phase {
    /// A short human-readable label suitable for display.
    pub fn label(&self) -> &'static str {
        match self {
            Phase::SceneSelect => "Choose a scene",
            Phase::CharacterSelect => "Choose your character",
            Phase::ScriptLoading => "Writing the script",
            Phase::Dialogue => "Rehearsing",
            Phase::PracticePrep => "Preparing practice",
            Phase::Practice => "Practicing",
            Phase::Complete => "Done",
        }
    }
}

// ---------------------------------------------------------------------------
// SessionCommand
// ---------------------------------------------------------------------------

/// External actions fed into the run loop by the excluded UI layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    /// Start a practice listen attempt for the current word.
    Listen,
    /// Clear a blocking capture error and retry the current dialogue turn.
    ClearCaptureError,
}

// ---------------------------------------------------------------------------
// SessionNotice
// ---------------------------------------------------------------------------

/// UI-facing notifications emitted by the controller and engines.
///
/// Purely informational — nothing in the state machines depends on whether
/// anyone is listening.  `Complete` is the single outward completion signal
/// consumed by the level-progression layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionNotice {
    /// The session moved to a new phase.
    PhaseChanged(Phase),
    /// A script turn became active.
    TurnStarted {
        index: usize,
        speaker: String,
        self_spoken: bool,
    },
    /// Live word count from the latest incremental transcript.  Cosmetic
    /// only — never used for correctness decisions.
    MatchedWords { count: usize },
    /// A spoken turn was frozen and handed to the analyzer.
    TurnSubmitted { index: usize, transcript: String },
    /// The analyzer recorded mistakes for the submitted turn.
    MistakesRecorded { count: usize },
    /// A non-benign capture error blocks the microphone until cleared.
    CaptureBlocked { message: String },
    /// Script generation failed; the learner is back at character selection.
    ScriptFailed { message: String },
    /// A practice word is on display.
    PracticePrompt { index: usize, total: usize, word: PracticeWord },
    /// The per-word practice status changed.
    PracticeStatusChanged(PracticeStatus),
    /// The session reached [`Phase::Complete`].  Emitted exactly once.
    Complete,
}

// ---------------------------------------------------------------------------
// TimerEvent
// ---------------------------------------------------------------------------

/// Internal timer firings delivered through the run loop.
///
/// Each armed silence timer carries the epoch it was armed with; the
/// dialogue engine ignores any epoch other than the latest, which is all
/// the cancellation the re-arm race needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TimerEvent {
    SilenceElapsed { epoch: u64 },
}

// ---------------------------------------------------------------------------
// SessionIo
// ---------------------------------------------------------------------------

/// Everything the engines touch besides their own state: the two speech
/// sessions, the external services, the outbound notice channel, the timer
/// channel and the timing knobs.
pub(crate) struct SessionIo {
    pub capture: CaptureSession,
    pub playback: PlaybackSession,
    pub analyzer: Arc<dyn MistakeAnalyzer>,
    pub phonetics: Arc<dyn PhoneticService>,
    pub notices: mpsc::Sender<SessionNotice>,
    pub timers: mpsc::Sender<TimerEvent>,
    pub timing: TimingConfig,
}

impl SessionIo {
    /// Emit a notice, ignoring a disinterested or closed receiver.
    pub(crate) async fn notify(&self, notice: SessionNotice) {
        let _ = self.notices.send(notice).await;
    }
}

// ---------------------------------------------------------------------------
// Test kit
// ---------------------------------------------------------------------------


// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
