//! Deterministic mock LLM provider for tests.
//!
//! Responses are scripted: the client returns them in order and repeats the
//! last one once the script is exhausted. A failure can be scripted instead
//! of a response to exercise fallback paths.

use crate::client::{LlmClient, LlmRequest, LlmResponse};
use scout_core::{AppError, AppResult};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// One scripted turn: either a canned response or a canned failure.
enum Turn {
    Reply(String),
    Fail(fn(String) -> AppError, String),
}

/// Scripted LLM client.
pub struct MockLlm {
    turns: Mutex<Vec<Turn>>,
    calls: AtomicUsize,
}

impl MockLlm {
    /// Create a mock that always returns `content`.
    pub fn replying(content: impl Into<String>) -> Self {
        Self {
            turns: Mutex::new(vec![Turn::Reply(content.into())]),
            calls: AtomicUsize::new(0),
        }
    }

    /// Create a mock that always times out.
    pub fn timing_out() -> Self {
        Self {
            turns: Mutex::new(vec![Turn::Fail(AppError::LlmTimeout, "scripted".into())]),
            calls: AtomicUsize::new(0),
        }
    }

    /// Create a mock that always fails with an invalid-response error.
    pub fn garbling() -> Self {
        Self {
            turns: Mutex::new(vec![Turn::Fail(
                AppError::LlmInvalidResponse,
                "scripted".into(),
            )]),
            calls: AtomicUsize::new(0),
        }
    }

    /// Append another scripted reply.
    pub fn then_replying(self, content: impl Into<String>) -> Self {
        self.turns
            .lock()
            .expect("mock poisoned")
            .push(Turn::Reply(content.into()));
        self
    }

    /// Number of completion calls made so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl LlmClient for MockLlm {
    fn provider_name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, _request: &LlmRequest) -> AppResult<LlmResponse> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let turns = self.turns.lock().expect("mock poisoned");
        let turn = turns
            .get(call.min(turns.len().saturating_sub(1)))
            .ok_or_else(|| AppError::LlmInvalidResponse("empty mock script".to_string()))?;

        match turn {
            Turn::Reply(content) => Ok(LlmResponse {
                content: content.clone(),
                model: "mock".to_string(),
            }),
            Turn::Fail(build, msg) => Err(build(msg.clone())),
        }
    }
}
