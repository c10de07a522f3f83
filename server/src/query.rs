//! Query string filters.
//!
//! Every parameter becomes an equality condition on a dotted path. Paths walk through arrays, a document
//! matches when any reached value equals the parameter. Stored numbers and booleans are compared against
//! the parsed parameter.
use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;

use crate::documents::Document;

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Equals { path: String, value: String },
    SameDay { path: String, day: NaiveDate },
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Filter {
    conditions: Vec<Condition>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_params(params: BTreeMap<String, String>) -> Self {
        params
            .into_iter()
            .fold(Self::new(), |filter, (path, value)| filter.equals(path, value))
    }

    pub fn equals(mut self, path: impl Into<String>, value: impl Into<String>) -> Self {
        self.conditions.push(Condition::Equals {
            path: path.into(),
            value: value.into(),
        });
        self
    }

    pub fn same_day(mut self, path: impl Into<String>, day: NaiveDate) -> Self {
        self.conditions.push(Condition::SameDay {
            path: path.into(),
            day,
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn matches(&self, document: &Document) -> bool {
        self.conditions.iter().all(|condition| match condition {
            Condition::Equals { path, value } => {
                values_at(document, path).any(|found| scalar_matches(found, value))
            }
            Condition::SameDay { path, day } => values_at(document, path)
                .filter_map(Value::as_str)
                .filter_map(parse_day)
                .any(|found| found == *day),
        })
    }
}

/// Accepts `YYYY-MM-DD` or an RFC 3339 timestamp, normalised to the UTC calendar day.
pub fn parse_day(input: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(input, "%Y-%m-%d").ok().or_else(|| {
        DateTime::parse_from_rfc3339(input)
            .ok()
            .map(|timestamp| timestamp.with_timezone(&Utc).date_naive())
    })
}

fn values_at<'a>(document: &'a Document, path: &str) -> impl Iterator<Item = &'a Value> {
    let segments: Vec<&str> = path.split('.').collect();
    let mut found = Vec::new();

    if let Some((head, rest)) = segments.split_first() {
        if let Some(value) = document.get(*head) {
            collect(value, rest, &mut found);
        }
    }

    found.into_iter()
}

fn collect<'a>(value: &'a Value, segments: &[&str], found: &mut Vec<&'a Value>) {
    match (segments.split_first(), value) {
        (None, Value::Array(items)) => found.extend(items),
        (None, _) => found.push(value),
        (Some(_), Value::Array(items)) => {
            for item in items {
                collect(item, segments, found);
            }
        }
        (Some((head, rest)), Value::Object(map)) => {
            if let Some(next) = map.get(*head) {
                collect(next, rest, found);
            }
        }
        (Some(_), _) => {}
    }
}

fn scalar_matches(found: &Value, expected: &str) -> bool {
    match found {
        Value::String(s) => s == expected,
        Value::Number(n) => match (n.as_f64(), expected.parse::<f64>()) {
            (Some(n), Ok(expected)) => n == expected,
            _ => false,
        },
        Value::Bool(b) => expected.parse::<bool>() == Ok(*b),
        Value::Null => expected == "null",
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(document) => document,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        assert!(Filter::new().matches(&doc(json!({}))));
    }

    #[test]
    fn test_string_number_bool() {
        let sku = doc(json!({ "zone": "A", "price": 12.5, "active": true, "stock": 3 }));

        assert!(Filter::new().equals("zone", "A").matches(&sku));
        assert!(!Filter::new().equals("zone", "B").matches(&sku));
        assert!(Filter::new().equals("price", "12.5").matches(&sku));
        assert!(Filter::new().equals("stock", "3").matches(&sku));
        assert!(Filter::new().equals("active", "true").matches(&sku));
        assert!(!Filter::new().equals("missing", "x").matches(&sku));
    }

    #[test]
    fn test_all_conditions_must_hold() {
        let sku = doc(json!({ "zone": "A", "name": "bolt" }));

        let params = BTreeMap::from([
            ("zone".to_string(), "A".to_string()),
            ("name".to_string(), "nut".to_string()),
        ]);
        assert!(!Filter::from_params(params).matches(&sku));
    }

    #[test]
    fn test_paths_through_arrays() {
        let location = doc(json!({
            "code": "A-01",
            "storedItems": [
                { "sku": "s1", "quantity": 4 },
                { "sku": "s2", "quantity": 9 }
            ],
            "tags": ["cold", "high"]
        }));

        assert!(Filter::new().equals("storedItems.sku", "s2").matches(&location));
        assert!(!Filter::new().equals("storedItems.sku", "s3").matches(&location));
        assert!(Filter::new().equals("tags", "cold").matches(&location));
    }

    #[test]
    fn test_same_day() {
        let exception = doc(json!({ "createdAt": "2024-05-03T22:15:00.000Z" }));
        let day = parse_day("2024-05-03").unwrap();

        assert!(Filter::new().same_day("createdAt", day).matches(&exception));
        assert!(!Filter::new()
            .same_day("createdAt", day.succ_opt().unwrap())
            .matches(&exception));
    }

    #[test]
    fn test_parse_day() {
        assert_eq!(parse_day("2024-05-03"), NaiveDate::from_ymd_opt(2024, 5, 3));
        assert_eq!(
            parse_day("2024-05-03T23:30:00-02:00"),
            NaiveDate::from_ymd_opt(2024, 5, 4)
        );
        assert_eq!(parse_day("yesterday"), None);
    }
}
