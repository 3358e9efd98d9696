//! Turn-taking dialogue rehearsal.
//!
//! [`DialogueEngine`] advances through the fixed script one turn at a time:
//!
//! ```text
//! other-spoken turn:  speak line ─▶ settle ─▶ advance
//! self-spoken turn:   settle ─▶ listen ─▶ …results re-arm silence timer…
//!                        ├─ silence elapses ──▶ submit ─▶ analyze ─▶ advance
//!                        ├─ run ends with a final ─▶ submit (same guard)
//!                        ├─ benign interruption ──▶ restart listening
//!                        └─ blocking error ──▶ halt until cleared
//! ```
//!
//! Submission is protected by a per-turn processed guard set before the
//! first asynchronous step and cleared only on the transition to the next
//! turn, so a racing timer and end event can never submit a turn twice.

pub mod engine;

pub use engine::{DialogueEngine, DialogueOutcome};
