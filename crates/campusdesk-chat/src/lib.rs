//! CampusDesk Chat: answer generation over retrieved chunks.
//!
//! Builds the grounded prompt, calls the language model with a quota-aware
//! retry policy, and rewrites follow-up questions into standalone queries.

pub mod answer;
pub mod config;
pub mod prompt;
pub mod providers;
pub mod retry;
pub mod types;

pub use answer::Answerer;
pub use config::GenerationConfig;
pub use prompt::{build_prompt, location_lines, rewrite_prompt};
pub use providers::{GeminiClient, LanguageModel};
pub use retry::RetryPolicy;
pub use types::*;
