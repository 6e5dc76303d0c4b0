//! LLM provider implementations.

mod mock;
mod ollama;

pub use mock::MockLlm;
pub use ollama::OllamaClient;
