//! LLM integration crate for Scout.
//!
//! This crate provides a provider-agnostic abstraction for the LLM
//! collaborator of the pipeline. The pipeline only needs one-shot
//! completions: a prompt goes in, text comes out, and failures are
//! classified as timeout, quota, or invalid-response.
//!
//! # Providers
//! - **Ollama**: Local LLM runtime (default)
//! - **Mock**: Deterministic scripted client for tests
//!
//! # Example
//! ```no_run
//! use scout_llm::{LlmClient, LlmRequest, providers::OllamaClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OllamaClient::new();
//! let request = LlmRequest::new("Hello, world!", "llama3");
//! let response = client.complete(&request).await?;
//! println!("{}", response.content);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod factory;
pub mod providers;

// Re-export main types
pub use client::{LlmClient, LlmRequest, LlmResponse};
pub use factory::create_client;
pub use providers::{MockLlm, OllamaClient};
