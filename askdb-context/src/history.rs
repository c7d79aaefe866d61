//! Bounded, FIFO conversation history.

use askdb_core::Turn;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

fn default_limit() -> usize {
    10
}

/// The most recent `limit` turns of one conversation, oldest first, plus the
/// SQL of the most recent successful query.
///
/// Turns are only ever appended or evicted; existing turns are never
/// handed out mutably.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationHistory {
    turns: VecDeque<Turn>,
    #[serde(default = "default_limit")]
    limit: usize,
    #[serde(default)]
    last_sql: Option<String>,
}

impl Default for ConversationHistory {
    fn default() -> Self {
        Self::new(default_limit())
    }
}

impl ConversationHistory {
    /// A zero limit is treated as 1.
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            turns: VecDeque::with_capacity(limit),
            limit,
            last_sql: None,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Append a turn, evicting the oldest ones beyond the limit.
    pub fn push(&mut self, turn: Turn) {
        self.turns.push_back(turn);
        while self.turns.len() > self.limit {
            self.turns.pop_front();
        }
    }

    /// Remember the SQL of a successful query; used for anchoring follow-ups.
    pub fn set_last_sql(&mut self, sql: impl Into<String>) {
        let sql = sql.into();
        self.last_sql = if sql.trim().is_empty() { None } else { Some(sql) };
    }

    pub fn last_sql(&self) -> Option<&str> {
        self.last_sql.as_deref()
    }

    /// Up to `k` most recent turns, oldest first.
    pub fn recent(&self, k: usize) -> impl Iterator<Item = &Turn> {
        self.turns.iter().skip(self.turns.len().saturating_sub(k))
    }

    pub fn turns(&self) -> impl Iterator<Item = &Turn> {
        self.turns.iter()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.back()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn clear(&mut self) {
        self.turns.clear();
        self.last_sql = None;
    }

    /// Serialize as JSON for hosts that persist conversations.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Restore from [`ConversationHistory::to_json`] output. The limit is
    /// re-applied in case the stored history is longer.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        let mut history: Self = serde_json::from_str(json)?;
        history.limit = history.limit.max(1);
        while history.turns.len() > history.limit {
            history.turns.pop_front();
        }
        Ok(history)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turn(n: usize) -> Turn {
        Turn::new(format!("q{}", n), format!("SELECT {};", n), "", format!("a{}", n))
    }

    #[test]
    fn test_fifo_eviction() {
        let mut history = ConversationHistory::new(3);
        for n in 0..5 {
            history.push(turn(n));
        }
        let questions: Vec<&str> = history.turns().map(|t| t.question.as_str()).collect();
        assert_eq!(questions, vec!["q2", "q3", "q4"]);
    }

    #[test]
    fn test_recent_window() {
        let mut history = ConversationHistory::new(10);
        for n in 0..6 {
            history.push(turn(n));
        }
        let recent: Vec<&str> = history.recent(4).map(|t| t.question.as_str()).collect();
        assert_eq!(recent, vec!["q2", "q3", "q4", "q5"]);
        assert_eq!(history.recent(100).count(), 6);
        assert_eq!(history.last().unwrap().question, "q5");
    }

    #[test]
    fn test_last_sql_blank_is_none() {
        let mut history = ConversationHistory::default();
        history.set_last_sql("   ");
        assert_eq!(history.last_sql(), None);
        history.set_last_sql("SELECT 1;");
        assert_eq!(history.last_sql(), Some("SELECT 1;"));
        history.clear();
        assert_eq!(history.last_sql(), None);
    }

    #[test]
    fn test_json_restore_reapplies_limit() {
        let mut history = ConversationHistory::new(5);
        for n in 0..5 {
            history.push(turn(n));
        }
        let mut value: serde_json::Value = serde_json::from_str(&history.to_json().unwrap()).unwrap();
        value["limit"] = serde_json::json!(2);

        let restored = ConversationHistory::from_json(&value.to_string()).unwrap();
        assert_eq!(restored.len(), 2);
        assert_eq!(restored.last().unwrap().question, "q4");
    }
}
