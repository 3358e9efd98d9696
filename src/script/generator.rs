//! `ScriptGenerator` trait and the chat-endpoint implementation.
//!
//! The generation service is a black box: given a scene, the two roles and a
//! difficulty descriptor it returns an ordered list of `{speaker, line}`
//! pairs.  [`ApiScriptGenerator`] asks the configured chat endpoint for a
//! JSON array and validates the reply through [`DialogueScript::new`]; any
//! non-conforming output is a hard [`ScriptError`].

use async_trait::async_trait;

use crate::remote::{strip_code_fence, ChatClient};
use crate::script::{DialogueScript, ScriptError, ScriptLine, SCRIPT_TURNS};

// ---------------------------------------------------------------------------
// ScriptRequest
// ---------------------------------------------------------------------------

/// Inputs to one script-generation call.
#[derive(Debug, Clone)]
pub struct ScriptRequest {
    /// Scene description (e.g. `"checking in at a hotel"`).
    pub scene: String,
    /// Role the learner reads.
    pub user_role: String,
    /// Role the synthesized partner reads.  Always speaks first.
    pub ai_role: String,
    /// Free-form difficulty descriptor forwarded verbatim to the service.
    pub difficulty: String,
}

// ---------------------------------------------------------------------------
// ScriptGenerator trait
// ---------------------------------------------------------------------------

/// Async seam for the external script-generation service.
///
/// Implementors must be `Send + Sync` so they can be shared behind an
/// `Arc<dyn ScriptGenerator>`.
#[async_trait]
pub trait ScriptGenerator: Send + Sync {
    async fn generate(&self, request: &ScriptRequest) -> Result<DialogueScript, ScriptError>;
}

// ---------------------------------------------------------------------------
// ApiScriptGenerator
// ---------------------------------------------------------------------------

const SYSTEM_PROMPT: &str = "You write short spoken-dialogue practice scripts \
for language learners. Reply with a JSON array only — no prose, no markdown.";

/// Production generator backed by the shared [`ChatClient`].
pub struct ApiScriptGenerator {
    chat: ChatClient,
}

impl ApiScriptGenerator {
    pub fn new(chat: ChatClient) -> Self {
        Self { chat }
    }

    fn user_prompt(request: &ScriptRequest) -> String {
        format!(
            "Write a dialogue of exactly {turns} turns set in this scene: {scene}.\n\
             The two speakers are {ai:?} and {user:?}. {ai:?} speaks first.\n\
             Difficulty: {difficulty}.\n\
             Reply with a JSON array of {turns} objects, each shaped as\n\
             {{\"speaker\": \"<role>\", \"line\": \"<sentence>\"}}.",
            turns = SCRIPT_TURNS,
            scene = request.scene,
            ai = request.ai_role,
            user = request.user_role,
            difficulty = request.difficulty,
        )
    }
}

/// Wire shape of one generated line.
#[derive(serde::Deserialize)]
struct RawLine {
    speaker: String,
    line: String,
}

/// Parse the service reply into script lines.
///
/// Split out of the trait impl so malformed-reply handling is testable
/// without a live endpoint.
fn parse_reply(reply: &str) -> Result<Vec<ScriptLine>, ScriptError> {
    let body = strip_code_fence(reply);
    let raw: Vec<RawLine> = serde_json::from_str(body)
        .map_err(|e| ScriptError::Malformed(e.to_string()))?;

    Ok(raw
        .into_iter()
        .map(|l| ScriptLine {
            speaker: l.speaker,
            text: l.line,
        })
        .collect())
}

#[async_trait]
impl ScriptGenerator for ApiScriptGenerator {
    async fn generate(&self, request: &ScriptRequest) -> Result<DialogueScript, ScriptError> {
        let reply = self
            .chat
            .complete(SYSTEM_PROMPT, &Self::user_prompt(request))
            .await?;

        let lines = parse_reply(&reply)?;
        let script = DialogueScript::new(lines, &request.user_role, &request.ai_role)?;

        log::debug!(
            "script generated: {} turns, scene {:?}",
            script.len(),
            request.scene
        );
        Ok(script)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_reply_accepts_plain_json() {
        let reply = r#"[
            {"speaker": "Barista", "line": "Hello"},
            {"speaker": "Customer", "line": "Hi"}
        ]"#;
        let lines = parse_reply(reply).unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].speaker, "Barista");
        assert_eq!(lines[1].text, "Hi");
    }

    #[test]
    fn parse_reply_accepts_fenced_json() {
        let reply = "```json\n[{\"speaker\": \"A\", \"line\": \"x\"}]\n```";
        let lines = parse_reply(reply).unwrap();
        assert_eq!(lines.len(), 1);
    }

    #[test]
    fn parse_reply_rejects_prose() {
        let err = parse_reply("Sure! Here is your dialogue:").unwrap_err();
        assert!(matches!(err, ScriptError::Malformed(_)));
    }

    #[test]
    fn parse_reply_rejects_wrong_shape() {
        let err = parse_reply(r#"{"lines": []}"#).unwrap_err();
        assert!(matches!(err, ScriptError::Malformed(_)));
    }

    #[test]
    fn user_prompt_mentions_both_roles_and_scene() {
        let request = ScriptRequest {
            scene: "at the pharmacy".into(),
            user_role: "Patient".into(),
            ai_role: "Pharmacist".into(),
            difficulty: "beginner".into(),
        };
        let prompt = ApiScriptGenerator::user_prompt(&request);
        assert!(prompt.contains("at the pharmacy"));
        assert!(prompt.contains("Patient"));
        assert!(prompt.contains("Pharmacist"));
        assert!(prompt.contains("8"));
    }
}
