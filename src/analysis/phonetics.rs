//! `PhoneticService` trait, chat-endpoint implementation, and the
//! never-fails fallback wrapper.

use async_trait::async_trait;

use crate::remote::{strip_code_fence, ChatClient, ServiceError};

// ---------------------------------------------------------------------------
// PhoneticService trait
// ---------------------------------------------------------------------------

/// Async seam for the external phonetic-decomposition service.
///
/// Given a single word, returns its pronunciation syllables in order.
#[async_trait]
pub trait PhoneticService: Send + Sync {
    async fn phonemes(&self, word: &str) -> Result<Vec<String>, ServiceError>;
}

// ---------------------------------------------------------------------------
// ApiPhoneticService
// ---------------------------------------------------------------------------

const SYSTEM_PROMPT: &str = "You break a single English word into spoken \
syllables written phonetically for a learner. Reply with a JSON array of \
strings only — no prose, no markdown.";

/// Production decomposition backed by the shared [`ChatClient`].
pub struct ApiPhoneticService {
    chat: ChatClient,
}

impl ApiPhoneticService {
    pub fn new(chat: ChatClient) -> Self {
        Self { chat }
    }
}

fn parse_reply(reply: &str) -> Result<Vec<String>, ServiceError> {
    serde_json::from_str(strip_code_fence(reply)).map_err(|e| ServiceError::Parse(e.to_string()))
}

#[async_trait]
impl PhoneticService for ApiPhoneticService {
    async fn phonemes(&self, word: &str) -> Result<Vec<String>, ServiceError> {
        let user = format!(
            "Word: {word:?}\nReply with a JSON array of its syllables, e.g. [\"tu\", \"geh\", \"dhuh\"]."
        );
        let reply = self.chat.complete(SYSTEM_PROMPT, &user).await?;
        parse_reply(&reply)
    }
}

// ---------------------------------------------------------------------------
// FallbackPhonetics
// ---------------------------------------------------------------------------

/// A transparent wrapper around any [`PhoneticService`] that never returns
/// an error — on failure the word itself becomes its only syllable.
///
/// This keeps practice preparation functional even when the service is
/// unreachable.
pub struct FallbackPhonetics<S: PhoneticService> {
    inner: S,
}

impl<S: PhoneticService> FallbackPhonetics<S> {
    /// Wrap `inner` with fallback behaviour.
    pub fn new(inner: S) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<S: PhoneticService + Send + Sync> PhoneticService for FallbackPhonetics<S> {
    /// Attempt decomposition; return `[word]` if any error occurs.
    ///
    /// This implementation **never** returns `Err(_)`.
    async fn phonemes(&self, word: &str) -> Result<Vec<String>, ServiceError> {
        match self.inner.phonemes(word).await {
            Ok(syllables) => Ok(syllables),
            Err(e) => {
                log::warn!("phonetic breakdown failed for {word:?} ({e}) — using whole word");
                Ok(vec![word.to_string()])
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
