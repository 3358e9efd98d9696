//! Rehearsal script types and the script-generation seam.
//!
//! A rehearsal session runs over a fixed-length [`DialogueScript`]: an
//! ordered sequence of exactly [`SCRIPT_TURNS`] lines, each attributed to
//! either the learner's role or the synthesized partner role, with the
//! partner speaking first.  Scripts are immutable once generated.
//!
//! [`ScriptGenerator`] is the trait seam for the external text-generation
//! service; [`ApiScriptGenerator`] is the production implementation over an
//! OpenAI-compatible chat endpoint.

pub mod generator;

pub use generator::{ApiScriptGenerator, ScriptGenerator, ScriptRequest};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::remote::ServiceError;

/// Number of turns every generated script must contain.
pub const SCRIPT_TURNS: usize = 8;

// ---------------------------------------------------------------------------
// ScriptLine
// ---------------------------------------------------------------------------

/// One scripted line of dialogue: who says it and what they say.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptLine {
    /// Role name the line belongs to.
    pub speaker: String,
    /// The sentence to read or synthesize.
    pub text: String,
}

// ---------------------------------------------------------------------------
// ScriptError
// ---------------------------------------------------------------------------

/// Errors raised while generating or validating a script.
///
/// Any variant is a hard failure of script generation; the session
/// controller falls back to character re-selection.
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("script must contain exactly {SCRIPT_TURNS} lines, got {0}")]
    WrongLength(usize),

    #[error("script must open with the partner role {expected:?}, got {got:?}")]
    WrongOpener { expected: String, got: String },

    #[error("generated script contains unknown speaker {0:?}")]
    UnknownSpeaker(String),

    #[error("script line {0} has no text")]
    EmptyLine(usize),

    #[error("script reply was not a JSON line array: {0}")]
    Malformed(String),

    #[error(transparent)]
    Service(#[from] ServiceError),
}

// ---------------------------------------------------------------------------
// DialogueScript
// ---------------------------------------------------------------------------

/// A validated, immutable rehearsal script.
///
/// Construction via [`DialogueScript::new`] enforces the generation
/// contract: exactly [`SCRIPT_TURNS`] lines, the partner (`ai_role`) speaks
/// line 0, every speaker is one of the two session roles, and no line is
/// blank.  Turn alternation is *not* enforced — the generator is free to
/// give one role consecutive lines.
#[derive(Debug, Clone)]
pub struct DialogueScript {
    lines: Vec<ScriptLine>,
}

impl DialogueScript {
    /// Validate `lines` against the generation contract for the given roles.
    pub fn new(
        lines: Vec<ScriptLine>,
        user_role: &str,
        ai_role: &str,
    ) -> Result<Self, ScriptError> {
        if lines.len() != SCRIPT_TURNS {
            return Err(ScriptError::WrongLength(lines.len()));
        }

        if lines[0].speaker != ai_role {
            return Err(ScriptError::WrongOpener {
                expected: ai_role.to_string(),
                got: lines[0].speaker.clone(),
            });
        }

        for (i, line) in lines.iter().enumerate() {
            if line.speaker != user_role && line.speaker != ai_role {
                return Err(ScriptError::UnknownSpeaker(line.speaker.clone()));
            }
            if line.text.trim().is_empty() {
                return Err(ScriptError::EmptyLine(i));
            }
        }

        Ok(Self { lines })
    }

    /// Number of turns in the script.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// The line at `turn`, or `None` past the end of the script.
    pub fn line(&self, turn: usize) -> Option<&ScriptLine> {
        self.lines.get(turn)
    }

    /// All lines in order.
    pub fn lines(&self) -> &[ScriptLine] {
        &self.lines
    }
}

// ---------------------------------------------------------------------------
// Test fixtures
// ---------------------------------------------------------------------------

/// Alternating eight-line café script used across the test suite.
///
/// User role is `"Customer"`, partner role is `"Barista"`.
#[cfg(test)]
pub(crate) fn sample_lines() -> Vec<ScriptLine> {
    let line = |speaker: &str, text: &str| ScriptLine {
        speaker: speaker.into(),
        text: text.into(),
    };
    vec![
        line("Barista", "Good morning, what can I get you?"),
        line("Customer", "Can I have a small coffee please"),
        line("Barista", "Anything to eat with that?"),
        line("Customer", "A croissant would be great"),
        line("Barista", "For here or to go?"),
        line("Customer", "To go please"),
        line("Barista", "That will be four fifty"),
        line("Customer", "Here you go, keep the change"),
    ]
}

/// Validated [`DialogueScript`] built from [`sample_lines`].
#[cfg(test)]
pub(crate) fn sample_script() -> DialogueScript {
    DialogueScript::new(sample_lines(), "Customer", "Barista").expect("fixture script is valid")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_script_is_accepted() {
        let script = DialogueScript::new(sample_lines(), "Customer", "Barista").unwrap();
        assert_eq!(script.len(), SCRIPT_TURNS);
        assert_eq!(script.line(0).unwrap().speaker, "Barista");
        assert!(script.line(SCRIPT_TURNS).is_none());
    }

    #[test]
    fn wrong_length_is_rejected() {
        let mut lines = sample_lines();
        lines.pop();
        let err = DialogueScript::new(lines, "Customer", "Barista").unwrap_err();
        assert!(matches!(err, ScriptError::WrongLength(7)));
    }

    #[test]
    fn user_role_opening_is_rejected() {
        let mut lines = sample_lines();
        lines.swap(0, 1);
        let err = DialogueScript::new(lines, "Customer", "Barista").unwrap_err();
        assert!(matches!(err, ScriptError::WrongOpener { .. }));
    }

    #[test]
    fn unknown_speaker_is_rejected() {
        let mut lines = sample_lines();
        lines[3].speaker = "Narrator".into();
        let err = DialogueScript::new(lines, "Customer", "Barista").unwrap_err();
        assert!(matches!(err, ScriptError::UnknownSpeaker(s) if s == "Narrator"));
    }

    #[test]
    fn blank_line_is_rejected() {
        let mut lines = sample_lines();
        lines[5].text = "   ".into();
        let err = DialogueScript::new(lines, "Customer", "Barista").unwrap_err();
        assert!(matches!(err, ScriptError::EmptyLine(5)));
    }

    #[test]
    fn consecutive_same_speaker_is_allowed() {
        // Alternation is implicit in generated content, never enforced.
        let mut lines = sample_lines();
        lines[1].speaker = "Barista".into();
        assert!(DialogueScript::new(lines, "Customer", "Barista").is_ok());
    }
}
