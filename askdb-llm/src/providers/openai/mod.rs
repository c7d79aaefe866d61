//! OpenAI provider implementation
//!
//! Chat Completions API, also usable against OpenAI-compatible gateways
//! through a base URL override.

pub mod client;
pub mod generator;
pub mod types;

pub use client::OpenAIClient;
pub use generator::OpenAIGenerator;
