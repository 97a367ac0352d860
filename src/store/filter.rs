//! Store-native boolean filter wire format
//!
//! `{"must": [{"key", "match": {"value"|"any"}} | {"key", "range": {"gte"?, "lte"?}}]}`

use serde::{Deserialize, Serialize};

/// Conjunction of field conditions. An absent filter (`None`) means an
/// unrestricted scan and is never represented by an empty `must` list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreFilter {
    pub must: Vec<Condition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Condition {
    Match {
        key: String,
        #[serde(rename = "match")]
        matcher: MatchCondition,
    },
    Range {
        key: String,
        range: RangeCondition,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MatchCondition {
    Value { value: i64 },
    Any { any: Vec<i64> },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RangeCondition {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gte: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lte: Option<f64>,
}

impl Condition {
    pub fn match_value(key: impl Into<String>, value: i64) -> Self {
        Condition::Match {
            key: key.into(),
            matcher: MatchCondition::Value { value },
        }
    }

    pub fn match_any(key: impl Into<String>, any: Vec<i64>) -> Self {
        Condition::Match {
            key: key.into(),
            matcher: MatchCondition::Any { any },
        }
    }

    pub fn range(key: impl Into<String>, gte: Option<f64>, lte: Option<f64>) -> Self {
        Condition::Range {
            key: key.into(),
            range: RangeCondition { gte, lte },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_format() {
        let filter = StoreFilter {
            must: vec![
                Condition::match_any("rating", vec![1, 2]),
                Condition::range("createTime", Some(1_700_000_000.0), None),
            ],
        };

        assert_eq!(
            serde_json::to_value(&filter).unwrap(),
            json!({
                "must": [
                    {"key": "rating", "match": {"any": [1, 2]}},
                    {"key": "createTime", "range": {"gte": 1_700_000_000.0}}
                ]
            })
        );
    }

    #[test]
    fn test_match_value_parses_back() {
        let condition: Condition =
            serde_json::from_value(json!({"key": "rating", "match": {"value": 5}})).unwrap();
        assert_eq!(condition, Condition::match_value("rating", 5));
    }
}
