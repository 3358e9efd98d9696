//! Mistake detection and phonetic breakdown seams.
//!
//! Both services are external black boxes reached through the shared chat
//! endpoint:
//!
//! * [`MistakeAnalyzer`] — given a spoken transcript and the target line,
//!   returns the `{said, expected}` divergences.  An empty transcript never
//!   reaches the service; it is expanded locally into one omission per
//!   target word by [`omission_mistakes`].
//! * [`PhoneticService`] — given a single word, returns its syllable
//!   strings.  [`FallbackPhonetics`] wraps any implementation and degrades
//!   to the whole word as its own single syllable on failure, so practice
//!   preparation can never be blocked by the service.

pub mod analyzer;
pub mod phonetics;

pub use analyzer::{omission_mistakes, ApiMistakeAnalyzer, MistakeAnalyzer};
pub use phonetics::{ApiPhoneticService, FallbackPhonetics, PhoneticService};

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Mistake
// ---------------------------------------------------------------------------

/// One detected divergence between what was said and what the script
/// expected.
///
/// An empty `said` is an omitted word; an empty `expected` is an inserted
/// word; both non-empty is a substitution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mistake {
    /// What the learner actually said (possibly empty).
    #[serde(default)]
    pub said: String,
    /// What the script expected (possibly empty).
    #[serde(default)]
    pub expected: String,
}

impl Mistake {
    pub fn is_omission(&self) -> bool {
        self.said.is_empty() && !self.expected.is_empty()
    }

    pub fn is_insertion(&self) -> bool {
        self.expected.is_empty() && !self.said.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
