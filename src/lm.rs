//! Model invocation: request shape, backends, retry, and the call log.
//!
//! Two backends implement [`TextGenerator`]:
//!
//! - `http`: an OpenAI-compatible chat-completions endpoint.
//! - `command`: any user-configured command that reads the prompt on stdin and
//!   writes the completion to stdout (`llm`, `ollama run`, wrapper scripts).
//!
//! Stages never talk to a backend directly; they go through [`LmSession`],
//! which applies the bounded retry policy and appends to the call log.
pub mod command;
pub mod http;
pub mod log;
pub mod retry;

use crate::config::{LmBackend, LmConfig};
use crate::documents::DocumentKind;
use crate::util::truncate_string;
use anyhow::Result;
use self::log::{CallKind, LmLog, LmLogBuilder};
use self::retry::{RetryFailure, RetryPolicy};
use std::time::Duration;

/// Bytes of prompt or response kept in log previews.
pub const PREVIEW_BYTES: usize = 500;

/// A single chat turn: optional system instructions plus the user message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LmRequest {
    pub system: Option<String>,
    pub user: String,
}

impl LmRequest {
    pub fn user(user: impl Into<String>) -> Self {
        Self {
            system: None,
            user: user.into(),
        }
    }

    pub fn with_system(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: Some(system.into()),
            user: user.into(),
        }
    }

    /// Render the request as one prompt for backends without message roles.
    pub fn flattened(&self) -> String {
        match &self.system {
            Some(system) => format!("{}\n\n{}", system.trim_end(), self.user),
            None => self.user.clone(),
        }
    }
}

/// Failure of a single backend call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LmError {
    /// Worth retrying: timeouts, rate limits, server errors, empty completions.
    #[error("{0}")]
    Transient(String),
    /// Retrying cannot help: bad credentials, bad request, misconfiguration.
    #[error("{0}")]
    Fatal(String),
}

impl LmError {
    pub fn is_transient(&self) -> bool {
        matches!(self, LmError::Transient(_))
    }
}

/// A text-generation backend.
pub trait TextGenerator {
    fn generate(&self, request: &LmRequest) -> Result<String, LmError>;

    /// Short human-readable label for logs.
    fn describe(&self) -> String;
}

/// Build the configured backend.
pub fn build_generator(config: &LmConfig) -> Result<Box<dyn TextGenerator>> {
    let generator: Box<dyn TextGenerator> = match config.backend {
        LmBackend::Http => Box::new(http::HttpGenerator::new(config)?),
        LmBackend::Command => Box::new(command::CommandGenerator::new(&config.command)?),
    };
    tracing::info!(backend = %generator.describe(), "model backend ready");
    Ok(generator)
}

/// A generator bound to its retry policy and call log.
pub struct LmSession<'a> {
    generator: &'a dyn TextGenerator,
    retry: RetryPolicy,
    log: LmLog,
    sleep: fn(Duration),
}

impl<'a> LmSession<'a> {
    pub fn new(generator: &'a dyn TextGenerator, retry: RetryPolicy, log: LmLog) -> Self {
        Self {
            generator,
            retry,
            log,
            sleep: std::thread::sleep,
        }
    }

    /// Replace the backoff sleeper (tests use a no-op).
    #[cfg(test)]
    pub fn with_sleep(mut self, sleep: fn(Duration)) -> Self {
        self.sleep = sleep;
        self
    }

    /// Call the model with retry, logging the outcome.
    pub fn call(
        &self,
        document: DocumentKind,
        kind: CallKind,
        request: &LmRequest,
    ) -> Result<String, RetryFailure> {
        let call = self.log.next_call();
        let prompt = request.flattened();
        let builder = LmLogBuilder::new(call, document, kind).with_prompt_preview(&prompt);

        let result = self.retry.run(
            |attempt| {
                tracing::debug!(call, %kind, attempt, prompt_bytes = prompt.len(), "model call");
                self.generator.generate(request)
            },
            self.sleep,
        );

        match result {
            Ok(done) => {
                tracing::info!(
                    call,
                    %kind,
                    attempts = done.attempts,
                    response_bytes = done.value.len(),
                    "model call complete"
                );
                tracing::debug!(
                    preview = %truncate_string(&done.value, PREVIEW_BYTES),
                    "model response"
                );
                self.log.record(&builder.success(done.attempts));
                self.log.store_content(call, kind, &prompt, &done.value);
                Ok(done.value)
            }
            Err(failure) => {
                self.log
                    .record(&builder.failed(failure.attempts, failure.last.to_string()));
                Err(failure)
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted backend for stage and session tests.
    use super::{LmError, LmRequest, TextGenerator};
    use std::cell::RefCell;
    use std::collections::VecDeque;

    #[derive(Default)]
    pub struct ScriptedGenerator {
        replies: RefCell<VecDeque<Result<String, LmError>>>,
        pub requests: RefCell<Vec<LmRequest>>,
    }

    impl ScriptedGenerator {
        pub fn new(replies: Vec<Result<String, LmError>>) -> Self {
            Self {
                replies: RefCell::new(replies.into()),
                requests: RefCell::new(Vec::new()),
            }
        }

        pub fn replying(replies: &[&str]) -> Self {
            Self::new(replies.iter().map(|reply| Ok(reply.to_string())).collect())
        }

        pub fn calls(&self) -> usize {
            self.requests.borrow().len()
        }
    }

    impl TextGenerator for ScriptedGenerator {
        fn generate(&self, request: &LmRequest) -> Result<String, LmError> {
            self.requests.borrow_mut().push(request.clone());
            self.replies
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| Err(LmError::Fatal("script exhausted".to_string())))
        }

        fn describe(&self) -> String {
            "scripted".to_string()
        }
    }
}
