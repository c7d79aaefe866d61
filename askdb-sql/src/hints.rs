//! Column hints used to resolve follow-ups like "name them".

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

static COUNT_DISTINCT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)count\s*\(\s*distinct\s+["']?(?:\w+\.)?["']?(\w+)"#)
        .expect("COUNT_DISTINCT is invalid")
});

static SELECT_DISTINCT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)select\s+distinct\s+["']?(?:\w+\.)?["']?(\w+)"#)
        .expect("SELECT_DISTINCT is invalid")
});

/// What a previous query did with a DISTINCT column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DistinctHint {
    Counting(String),
    Selecting(String),
}

impl fmt::Display for DistinctHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DistinctHint::Counting(col) => {
                write!(f, "Previous query was counting distinct values of: {}", col)
            }
            DistinctHint::Selecting(col) => {
                write!(f, "Previous query selected distinct values of: {}", col)
            }
        }
    }
}

/// `COUNT(DISTINCT col)` wins over `SELECT DISTINCT col`. Column names are lower-cased.
pub fn distinct_column_hint(sql: &str) -> Option<DistinctHint> {
    let column = |re: &Regex| {
        re.captures(sql)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_lowercase())
    };

    column(&COUNT_DISTINCT)
        .map(DistinctHint::Counting)
        .or_else(|| column(&SELECT_DISTINCT).map(DistinctHint::Selecting))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_distinct() {
        let hint = distinct_column_hint("SELECT COUNT(DISTINCT \"Geo_STATE\") FROM acs;").unwrap();
        assert_eq!(hint, DistinctHint::Counting("geo_state".to_string()));
        assert_eq!(
            hint.to_string(),
            "Previous query was counting distinct values of: geo_state"
        );
    }

    #[test]
    fn test_select_distinct_with_alias() {
        let hint = distinct_column_hint("SELECT DISTINCT s.state_name FROM states s;").unwrap();
        assert_eq!(hint, DistinctHint::Selecting("state_name".to_string()));
    }

    #[test]
    fn test_count_wins() {
        let sql = "SELECT DISTINCT region, COUNT(DISTINCT city) FROM places GROUP BY region;";
        assert_eq!(
            distinct_column_hint(sql),
            Some(DistinctHint::Counting("city".to_string()))
        );
    }

    #[test]
    fn test_no_distinct() {
        assert_eq!(distinct_column_hint("SELECT name FROM contacts;"), None);
    }
}
