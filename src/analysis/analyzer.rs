//! `MistakeAnalyzer` trait and the chat-endpoint implementation.

use async_trait::async_trait;

use crate::analysis::Mistake;
use crate::remote::{strip_code_fence, ChatClient, ServiceError};

// ---------------------------------------------------------------------------
// MistakeAnalyzer trait
// ---------------------------------------------------------------------------

/// Async seam for the external per-utterance mistake classifier.
///
/// The analyzer owns the *policy* of what counts as a pronunciation mistake;
/// the orchestrator only records what it returns.  Implementors must be
/// `Send + Sync` so they can be shared behind an `Arc<dyn MistakeAnalyzer>`.
#[async_trait]
pub trait MistakeAnalyzer: Send + Sync {
    /// Compare `spoken` against `target` and return the divergences in
    /// target-line order.
    async fn analyze(&self, spoken: &str, target: &str) -> Result<Vec<Mistake>, ServiceError>;
}

// ---------------------------------------------------------------------------
// omission_mistakes
// ---------------------------------------------------------------------------

/// Expand an entirely missed line into one omission [`Mistake`] per target
/// word.
///
/// Used when the learner said nothing at all — the service is never called
/// for an empty transcript.
pub fn omission_mistakes(target: &str) -> Vec<Mistake> {
    target
        .split_whitespace()
        .map(|word| Mistake {
            said: String::new(),
            expected: word.to_string(),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// ApiMistakeAnalyzer
// ---------------------------------------------------------------------------

const SYSTEM_PROMPT: &str = "You grade a language learner's spoken line against \
the scripted target line. Report every omitted, substituted or inserted word. \
Reply with a JSON array only — no prose, no markdown.";

/// Production analyzer backed by the shared [`ChatClient`].
pub struct ApiMistakeAnalyzer {
    chat: ChatClient,
}

impl ApiMistakeAnalyzer {
    pub fn new(chat: ChatClient) -> Self {
        Self { chat }
    }

    fn user_prompt(spoken: &str, target: &str) -> String {
        format!(
            "Target line: {target:?}\n\
             Learner said: {spoken:?}\n\
             Reply with a JSON array of objects shaped as\n\
             {{\"said\": \"<word or empty>\", \"expected\": \"<word or empty>\"}}.\n\
             Use an empty \"said\" for an omitted word and an empty \"expected\"\n\
             for an inserted word. Reply with [] when the line was spoken correctly."
        )
    }
}

fn parse_reply(reply: &str) -> Result<Vec<Mistake>, ServiceError> {
    serde_json::from_str(strip_code_fence(reply)).map_err(|e| ServiceError::Parse(e.to_string()))
}

#[async_trait]
impl MistakeAnalyzer for ApiMistakeAnalyzer {
    async fn analyze(&self, spoken: &str, target: &str) -> Result<Vec<Mistake>, ServiceError> {
        // Nothing spoken means every target word was omitted; that verdict
        // needs no service round-trip.
        if spoken.trim().is_empty() {
            return Ok(omission_mistakes(target));
        }

        let reply = self
            .chat
            .complete(SYSTEM_PROMPT, &Self::user_prompt(spoken, target))
            .await?;

        parse_reply(&reply)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
