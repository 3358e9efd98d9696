//! Shared client for the OpenAI-compatible language-service endpoint.
//!
//! Script generation, mistake analysis and phonetic breakdown are all
//! consumed as `/v1/chat/completions` calls against one configured provider
//! — Ollama (OpenAI mode), OpenAI, Groq, LM Studio, vLLM, etc.  All
//! connection details come from [`ServiceConfig`]; nothing is hardcoded.

use thiserror::Error;

use crate::config::ServiceConfig;

// ---------------------------------------------------------------------------
// ServiceError
// ---------------------------------------------------------------------------

/// Errors that can occur while talking to the language service.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// HTTP transport or connection error.
    #[error("HTTP request failed: {0}")]
    Request(String),

    /// The request did not complete within the configured timeout.
    #[error("service request timed out")]
    Timeout,

    /// The HTTP response could not be parsed as expected JSON.
    #[error("failed to parse service response: {0}")]
    Parse(String),

    /// The service returned a response with no usable content.
    #[error("service returned an empty response")]
    EmptyResponse,
}

impl From<reqwest::Error> for ServiceError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ServiceError::Timeout
        } else {
            ServiceError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// ChatClient
// ---------------------------------------------------------------------------

/// Thin wrapper around a `reqwest::Client` that sends one system + user
/// message pair and returns the assistant's reply text.
///
/// # No hardcoded URLs
/// All connection details (`base_url`, `api_key`, `model`) come exclusively
/// from the [`ServiceConfig`] passed to [`ChatClient::from_config`].
#[derive(Debug, Clone)]
pub struct ChatClient {
    client: reqwest::Client,
    config: ServiceConfig,
}

impl ChatClient {
    /// Build a `ChatClient` from application config.
    ///
    /// The HTTP client is pre-configured with the per-request timeout from
    /// `config.timeout_secs`.  A default (no-timeout) client is used as a
    /// last-resort fallback if the builder fails (should never happen in
    /// practice).
    pub fn from_config(config: &ServiceConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            config: config.clone(),
        }
    }

    /// Send `system` + `user` to the configured endpoint and return the
    /// assistant's reply.
    ///
    /// The `Authorization: Bearer …` header is attached **only** when
    /// `config.api_key` is `Some(key)` and `key` is non-empty — safe for
    /// Ollama and other local providers that require no authentication.
    pub async fn complete(&self, system: &str, user: &str) -> Result<String, ServiceError> {
        let url = format!("{}/v1/chat/completions", self.config.base_url);

        let body = serde_json::json!({
            "model":       self.config.model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user",   "content": user   }
            ],
            "stream":      false,
            "temperature": self.config.temperature,
            "max_tokens":  1024
        });

        let mut req = self.client.post(&url).json(&body);

        // Attach Authorization header only when api_key is a non-empty string.
        let key = self.config.api_key.as_deref().unwrap_or("");
        if !key.is_empty() {
            req = req.bearer_auth(key);
        }

        let response = req.send().await?;

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ServiceError::Parse(e.to_string()))?;

        let content = json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or(ServiceError::EmptyResponse)?
            .trim()
            .to_string();

        if content.is_empty() {
            return Err(ServiceError::EmptyResponse);
        }

        Ok(content)
    }
}

// ---------------------------------------------------------------------------
// strip_code_fence
// ---------------------------------------------------------------------------

/// Remove a surrounding Markdown code fence from a model reply, if present.
///
/// Chat models routinely wrap JSON payloads in ``` or ```json fences even
/// when told not to; the structured-output parsers all run their input
/// through this first.
pub fn strip_code_fence(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServiceConfig;

    fn make_config(api_key: Option<&str>) -> ServiceConfig {
        ServiceConfig {
            base_url: "http://localhost:11434".into(),
            api_key: api_key.map(|s| s.to_string()),
            model: "qwen2.5:3b".into(),
            temperature: 0.3,
            timeout_secs: 10,
        }
    }

    #[test]
    fn from_config_builds_without_panic() {
        let config = make_config(None);
        let _client = ChatClient::from_config(&config);
    }

    #[test]
    fn from_config_accepts_empty_api_key() {
        let config = make_config(Some(""));
        let _client = ChatClient::from_config(&config);
    }

    #[test]
    fn strip_code_fence_plain_text_unchanged() {
        assert_eq!(strip_code_fence("  [1, 2, 3]  "), "[1, 2, 3]");
    }

    #[test]
    fn strip_code_fence_bare_fence() {
        assert_eq!(strip_code_fence("```\n[1, 2]\n```"), "[1, 2]");
    }

    #[test]
    fn strip_code_fence_json_fence() {
        assert_eq!(strip_code_fence("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
    }

    #[test]
    fn strip_code_fence_unterminated_fence() {
        assert_eq!(strip_code_fence("```json\n[\"x\"]"), "[\"x\"]");
    }
}
