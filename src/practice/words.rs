//! Practice-word derivation and transcript normalization.

use std::collections::HashSet;

use crate::analysis::Mistake;

// ---------------------------------------------------------------------------
// PracticeWord
// ---------------------------------------------------------------------------

/// One word drilled in isolation after the dialogue, with its phonetic
/// syllables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PracticeWord {
    /// The cleaned target word.
    pub word: String,
    /// Ordered syllable strings from the decomposition service.
    pub phonemes: Vec<String>,
}

// ---------------------------------------------------------------------------
// clean_word
// ---------------------------------------------------------------------------

/// Normalize a word or transcript for comparison: trim, lowercase, and strip
/// the sentence punctuation `. , ? !`.
///
/// Both the practice target and the learner's transcript go through this
/// before the containment match, so carrier punctuation never causes a
/// spurious mismatch.
pub fn clean_word(text: &str) -> String {
    text.trim()
        .to_lowercase()
        .chars()
        .filter(|c| !matches!(c, '.' | ',' | '?' | '!'))
        .collect()
}

// ---------------------------------------------------------------------------
// practice_words
// ---------------------------------------------------------------------------

/// Derive the drill list from the accumulated mistakes: the distinct,
/// cleaned, non-empty `expected` words in first-occurrence order.
///
/// Insertions (empty `expected`) contribute nothing — there is no word to
/// practice for something the learner added.
pub fn practice_words(mistakes: &[Mistake]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut words = Vec::new();

    for mistake in mistakes {
        let word = clean_word(&mistake.expected);
        if word.is_empty() {
            continue;
        }
        if seen.insert(word.clone()) {
            words.push(word);
        }
    }

    words
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
