//! Document-store collaborator for Scout.
//!
//! Two stores exist: a ticket tracker and a wiki. Both are reached through
//! the same narrow interface — a structured query string in, a list of
//! normalized [`RawDocument`] values out. Transport details (auth headers,
//! pagination, rate limits) are deliberately outside this crate's concern.
//!
//! # Implementations
//! - [`RestStoreClient`]: one search endpoint per store over HTTP
//! - [`MemoryStore`]: in-memory store for tests, with call counting

pub mod client;
pub mod memory;
pub mod rest;
pub mod types;

pub use client::StoreClient;
pub use memory::MemoryStore;
pub use rest::RestStoreClient;
pub use types::{DocumentStore, RawDocument};
