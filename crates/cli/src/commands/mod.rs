//! Command handlers for the Scout CLI.

pub mod ask;

pub use ask::AskCommand;
