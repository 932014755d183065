//! HTTP backend for OpenAI-compatible chat-completions endpoints.
//!
//! Covers hosted gateways (OpenAI, Azure, SAP AI Core) as long as they accept
//! `{"model", "messages"}` and answer with `choices[0].message.content`.
//! Gateway-specific headers such as `AI-Resource-Group` come from config.
use super::{LmError, LmRequest, TextGenerator};
use crate::config::LmConfig;
use crate::util::truncate_string;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Bytes of an error response body kept in messages.
const MAX_ERROR_BODY_BYTES: usize = 200;

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

pub struct HttpGenerator {
    agent: ureq::Agent,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
    headers: Vec<(String, String)>,
}

impl HttpGenerator {
    pub fn new(config: &LmConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty());
        if api_key.is_none() {
            tracing::warn!(
                env = %config.api_key_env,
                "no API key in environment; sending requests without Authorization"
            );
        }
        let agent_config = ureq::Agent::config_builder()
            .timeout_global(Some(config.timeout()))
            .http_status_as_error(false)
            .build();
        Ok(Self {
            agent: ureq::Agent::new_with_config(agent_config),
            endpoint: config.endpoint.trim().to_string(),
            model: config.model.trim().to_string(),
            api_key,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            headers: config
                .headers
                .iter()
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect(),
        })
    }

    fn body<'a>(&'a self, request: &'a LmRequest) -> ChatRequest<'a> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &request.system {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: &request.user,
        });
        ChatRequest {
            model: &self.model,
            messages,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }
}

impl TextGenerator for HttpGenerator {
    fn generate(&self, request: &LmRequest) -> Result<String, LmError> {
        let start = Instant::now();
        let mut call = self
            .agent
            .post(&self.endpoint)
            .header("Content-Type", "application/json");
        if let Some(key) = &self.api_key {
            call = call.header("Authorization", &format!("Bearer {key}"));
        }
        for (name, value) in &self.headers {
            call = call.header(name.as_str(), value.as_str());
        }

        let mut response = call.send_json(&self.body(request)).map_err(classify_transport)?;
        let status = response.status().as_u16();
        let text = response
            .body_mut()
            .read_to_string()
            .map_err(|err| LmError::Transient(format!("read response body: {err}")))?;
        tracing::debug!(
            status,
            elapsed_ms = start.elapsed().as_millis() as u64,
            response_bytes = text.len(),
            "chat completion response"
        );
        if !(200..300).contains(&status) {
            return Err(classify_status(status, &text));
        }
        parse_completion(&text)
    }

    fn describe(&self) -> String {
        format!("http {} ({})", self.endpoint, self.model)
    }
}

fn classify_transport(err: ureq::Error) -> LmError {
    match err {
        ureq::Error::Timeout(_)
        | ureq::Error::Io(_)
        | ureq::Error::HostNotFound
        | ureq::Error::ConnectionFailed => LmError::Transient(format!("request failed: {err}")),
        other => LmError::Fatal(format!("request failed: {other}")),
    }
}

/// Map a non-success status to an error class.
///
/// Timeouts, rate limits and server errors are retried; any other status means
/// the request or credentials are wrong and retrying cannot help.
pub fn classify_status(status: u16, body: &str) -> LmError {
    let message = format!("HTTP {status}: {}", error_excerpt(body));
    match status {
        408 | 429 | 500..=599 => LmError::Transient(message),
        _ => LmError::Fatal(message),
    }
}

/// Extract the first choice's content from a chat-completions response.
pub fn parse_completion(body: &str) -> Result<String, LmError> {
    let response: ChatResponse = serde_json::from_str(body).map_err(|err| {
        LmError::Fatal(format!(
            "parse chat completion: {err}: {}",
            error_excerpt(body)
        ))
    })?;
    let content = response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .unwrap_or_default();
    let content = content.trim();
    if content.is_empty() {
        return Err(LmError::Transient("model returned an empty completion".to_string()));
    }
    Ok(content.to_string())
}

/// Shorten an error body and drop anything that looks like a credential.
fn error_excerpt(body: &str) -> String {
    const SECRET_MARKERS: [&str; 4] = ["api_key", "apikey", "bearer", "sk-"];
    let excerpt = truncate_string(body.trim(), MAX_ERROR_BODY_BYTES);
    let lower = excerpt.to_lowercase();
    if SECRET_MARKERS.iter().any(|marker| lower.contains(marker)) {
        return "(response body redacted)".to_string();
    }
    excerpt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_completion_returns_first_choice() {
        let body = r###"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"  ## Purpose\n"}}]}"###;
        assert_eq!(parse_completion(body), Ok("## Purpose".to_string()));
    }

    #[test]
    fn empty_and_malformed_completions_are_classified() {
        let err = parse_completion(r#"{"choices":[]}"#).expect_err("no choices");
        assert!(err.is_transient());
        let err = parse_completion(r#"{"choices":[{"message":{"content":null}}]}"#)
            .expect_err("null content");
        assert!(err.is_transient());
        let err = parse_completion("<html>gateway</html>").expect_err("not json");
        assert!(!err.is_transient());
    }

    #[test]
    fn status_classes() {
        for status in [408, 429, 500, 502, 503] {
            assert!(classify_status(status, "").is_transient(), "{status}");
        }
        for status in [400, 401, 403, 404] {
            assert!(!classify_status(status, "").is_transient(), "{status}");
        }
    }

    #[test]
    fn error_bodies_are_truncated_and_redacted() {
        let err = classify_status(401, r#"{"error":"invalid api_key sk-abc"}"#);
        assert_eq!(err, LmError::Fatal("HTTP 401: (response body redacted)".to_string()));
        let long = "x".repeat(1000);
        let LmError::Transient(message) = classify_status(503, &long) else {
            panic!("503 is transient");
        };
        assert_eq!(message.len(), "HTTP 503: ".len() + MAX_ERROR_BODY_BYTES);
    }

    #[test]
    fn request_body_orders_system_before_user() {
        let config = LmConfig {
            api_key_env: "SAPDOC_TEST_UNSET_KEY".to_string(),
            ..LmConfig::default()
        };
        let generator = HttpGenerator::new(&config).expect("build");
        let request = LmRequest::with_system("Be terse.", "BRD Content: {}");
        let body = serde_json::to_value(generator.body(&request)).expect("serialize");
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "BRD Content: {}");
        let object = body.as_object().expect("object body");
        assert!(!object.contains_key("max_tokens"));
        assert!(!object.contains_key("temperature"));
    }

    #[test]
    fn configured_limits_are_sent() {
        let config = LmConfig {
            api_key_env: "SAPDOC_TEST_UNSET_KEY".to_string(),
            max_tokens: Some(4000),
            temperature: Some(0.5),
            ..LmConfig::default()
        };
        let generator = HttpGenerator::new(&config).expect("build");
        let body = serde_json::to_value(generator.body(&LmRequest::user("hi"))).expect("serialize");
        assert_eq!(body["max_tokens"], 4000);
        assert_eq!(body["temperature"], 0.5);
    }
}
