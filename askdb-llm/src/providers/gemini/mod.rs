//! Gemini provider implementation (Generative Language API).

pub mod client;
pub mod generator;
pub mod types;

pub use client::GeminiClient;
pub use generator::GeminiGenerator;
