//! askdb Context - Conversation State and Context Assembly
//!
//! Turns a bounded conversation history into the context block embedded in
//! SQL-generation prompts, including the "anchor table" hint that lets
//! follow-ups like "name them" resolve to the previously queried table.
//!
//! History is per-session mutable state. Nothing here locks: callers must
//! keep at most one pipeline run in flight per session.

pub mod builder;
pub mod history;
pub mod session;
pub mod summary;

pub use builder::{contains_pronoun_followup, ContextBuilder, ConversationContext, PRONOUN_MARKERS};
pub use history::ConversationHistory;
pub use session::{Session, SessionStatus, SessionStore};
pub use summary::summarize_rows;
