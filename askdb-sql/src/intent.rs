//! Coarse query intent, used to steer follow-up suggestions.

use crate::tables::referenced_tables;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

static WHERE_CLAUSE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bwhere\b").expect("WHERE_CLAUSE is invalid"));
static JOIN_CLAUSE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bjoin\b").expect("JOIN_CLAUSE is invalid"));
static GROUP_BY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bgroup\s+by\b").expect("GROUP_BY is invalid"));
static ORDER_BY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\border\s+by\b").expect("ORDER_BY is invalid"));
static SELECT_STAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bselect\s+\*").expect("SELECT_STAR is invalid"));

fn calls(sql: &str, function: &str) -> bool {
    sql.contains(&format!("{}(", function))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IntentKind {
    Count,
    Sum,
    Average,
    List,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryIntent {
    pub kind: IntentKind,
    pub has_filters: bool,
    pub has_aggregations: bool,
    pub has_joins: bool,
    pub has_grouping: bool,
    pub has_ordering: bool,
    /// Lower-cased tables after FROM/JOIN.
    pub tables: Vec<String>,
}

/// Classify a question and its SQL.
///
/// The first matching rule wins: count, sum, average, then list. Each rule
/// looks at the SQL function call and at a question keyword, so a question
/// mentioning "total" is a sum even when the SQL only counts.
pub fn analyze_intent(question: &str, sql: &str) -> QueryIntent {
    let q = question.to_lowercase();
    let s = sql.to_lowercase();

    let kind = if calls(&s, "count") || q.contains("how many") {
        IntentKind::Count
    } else if calls(&s, "sum") || q.contains("total") {
        IntentKind::Sum
    } else if calls(&s, "avg") || q.contains("average") {
        IntentKind::Average
    } else if SELECT_STAR.is_match(&s) || q.contains("show") || q.contains("list") {
        IntentKind::List
    } else {
        IntentKind::Unknown
    };

    QueryIntent {
        kind,
        has_filters: WHERE_CLAUSE.is_match(&s),
        has_aggregations: matches!(kind, IntentKind::Count | IntentKind::Sum | IntentKind::Average),
        has_joins: JOIN_CLAUSE.is_match(&s),
        has_grouping: GROUP_BY.is_match(&s),
        has_ordering: ORDER_BY.is_match(&s),
        tables: referenced_tables(sql),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_from_question() {
        let intent = analyze_intent("How many contacts are there?", "SELECT name FROM contacts;");
        assert_eq!(intent.kind, IntentKind::Count);
        assert!(intent.has_aggregations);
        assert_eq!(intent.tables, vec!["contacts"]);
    }

    #[test]
    fn test_count_beats_sum() {
        let intent = analyze_intent("total please", "SELECT COUNT(*) FROM orders;");
        assert_eq!(intent.kind, IntentKind::Count);
    }

    #[test]
    fn test_sum_and_average() {
        assert_eq!(
            analyze_intent("revenue", "SELECT SUM(amount) FROM orders;").kind,
            IntentKind::Sum
        );
        assert_eq!(
            analyze_intent("What is the average income?", "SELECT income FROM acs;").kind,
            IntentKind::Average
        );
    }

    #[test]
    fn test_list_has_no_aggregation() {
        let intent = analyze_intent("customers", "SELECT * FROM customers WHERE active;");
        assert_eq!(intent.kind, IntentKind::List);
        assert!(!intent.has_aggregations);
        assert!(intent.has_filters);
    }

    #[test]
    fn test_structure_flags() {
        let sql = "SELECT s.name, COUNT(*) FROM states s JOIN counties c ON c.state = s.code \
                   GROUP BY s.name ORDER BY 2 DESC;";
        let intent = analyze_intent("counties per state", sql);
        assert!(intent.has_joins);
        assert!(intent.has_grouping);
        assert!(intent.has_ordering);
        assert!(!intent.has_filters);
        assert_eq!(intent.tables, vec!["states", "counties"]);
    }

    #[test]
    fn test_unknown() {
        let intent = analyze_intent("hello", "");
        assert_eq!(intent.kind, IntentKind::Unknown);
        assert!(intent.tables.is_empty());
    }

    #[test]
    fn test_serializes_lowercase_kind() {
        let value = serde_json::to_value(analyze_intent("how many?", "")).unwrap();
        assert_eq!(value["kind"], "count");
    }
}
