//! dialogue-coach — spoken-dialogue rehearsal orchestration.
//!
//! A learner reads one side of a short generated script aloud opposite a
//! synthesized voice; per-turn mistakes are detected by an external
//! analyzer, and the missed words are drilled afterwards in a focused
//! pronunciation loop.
//!
//! # Architecture
//!
//! ```text
//! script generation ──▶ DialogueScript
//!                            │
//!                            ▼
//! CaptureEvent ─┐   SessionController::run()
//! TimerEvent   ─┼──▶   ├─ DialogueEngine   (turn taking, mistake capture)
//! Command      ─┘      └─ PracticeEngine   (per-word listen/confirm/retry)
//!                            │
//!                            ▼
//!                     SessionNotice stream (UI) + one Complete signal
//! ```
//!
//! Speech capture and playback are trait seams ([`capture::CaptureDevice`],
//! [`playback::Synthesizer`]); the three language services (script
//! generation, mistake analysis, phonetic breakdown) share one
//! OpenAI-compatible endpoint via [`remote::ChatClient`].

pub mod analysis;
pub mod capture;
pub mod config;
pub mod dialogue;
pub mod playback;
pub mod practice;
pub mod remote;
pub mod script;
pub mod session;
