//! Declarative filter compilation and evaluation
//!
//! A filter specification is a JSON map from field name to either a bare
//! literal (equality / sub-map containment) or an operator object
//! (`_eq`, `_gt`, `_gte`, `_lt`, `_lte`, `_is_null`, `_contains`). The
//! specification is parsed once into an AST and the compiled predicate is
//! then evaluated against any number of candidates, so heterogeneous
//! stored types share one evaluator through the [`FieldSource`] trait.
//!
//! Semantics: conjunctive across fields and across operators on the same
//! field; an absent field filter matches everything; an empty or missing
//! top-level specification matches everything. Unknown operator keys are
//! rejected at compile time, before any storage access.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;
use std::cmp::Ordering;

use crate::error::{EngineError, Result};

/// A candidate the compiled predicate can be evaluated against
pub trait FieldSource {
    /// Resolve a field name to its current value, or None when absent.
    ///
    /// Dotted names navigate nested attribute maps (`source.url`).
    fn field(&self, name: &str) -> Option<Value>;
}

/// Navigate a dotted path through nested JSON maps
pub(crate) fn lookup_path(root: &serde_json::Map<String, Value>, path: &str) -> Option<Value> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = root.get(first)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current.clone())
}

/// One comparison against a single field
#[derive(Debug, Clone, PartialEq)]
enum Condition {
    Eq(Value),
    Gt(Value),
    Gte(Value),
    Lt(Value),
    Lte(Value),
    IsNull(bool),
    Contains(Value),
    /// Bare literal: equality, or sub-map containment on map targets
    Matches(Value),
}

/// All conditions attached to one field, applied conjunctively
#[derive(Debug, Clone)]
struct FieldClause {
    field: String,
    conditions: Vec<Condition>,
}

/// A compiled, reusable predicate
#[derive(Debug, Clone, Default)]
pub struct Filter {
    clauses: Vec<FieldClause>,
}

impl Filter {
    /// A predicate that matches everything
    pub fn match_all() -> Self {
        Self::default()
    }

    /// Compile a filter specification
    ///
    /// `Null` and empty maps compile to the open predicate. Anything other
    /// than a JSON object is rejected.
    pub fn compile(spec: &Value) -> Result<Self> {
        let map = match spec {
            Value::Null => return Ok(Self::match_all()),
            Value::Object(map) => map,
            other => {
                return Err(EngineError::invalid_filter(format!(
                    "filter specification must be an object, got {other}"
                )))
            }
        };

        let mut clauses = Vec::with_capacity(map.len());
        for (field, value) in map {
            clauses.push(FieldClause {
                field: field.clone(),
                conditions: compile_field(field, value)?,
            });
        }
        Ok(Self { clauses })
    }

    /// Merge another compiled filter into this one (conjunction)
    pub fn and(mut self, other: Filter) -> Self {
        self.clauses.extend(other.clauses);
        self
    }

    /// Whether this predicate is the open match-all
    pub fn is_open(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Evaluate the predicate against a candidate
    pub fn matches(&self, source: &dyn FieldSource) -> bool {
        self.clauses.iter().all(|clause| {
            let actual = source.field(&clause.field);
            clause
                .conditions
                .iter()
                .all(|condition| eval_condition(condition, actual.as_ref()))
        })
    }
}

/// Compile one field's specification into its condition list
fn compile_field(field: &str, value: &Value) -> Result<Vec<Condition>> {
    let map = match value {
        Value::Object(map) if map.keys().any(|k| k.starts_with('_')) => map,
        other => return Ok(vec![Condition::Matches(other.clone())]),
    };
    let mut conditions = Vec::with_capacity(map.len());
    for (op, operand) in map {
        let condition = match op.as_str() {
            "_eq" => Condition::Eq(operand.clone()),
            "_gt" => Condition::Gt(operand.clone()),
            "_gte" => Condition::Gte(operand.clone()),
            "_lt" => Condition::Lt(operand.clone()),
            "_lte" => Condition::Lte(operand.clone()),
            "_contains" => Condition::Contains(operand.clone()),
            "_is_null" => match operand {
                Value::Bool(expect_null) => Condition::IsNull(*expect_null),
                other => {
                    return Err(EngineError::invalid_filter(format!(
                        "operator _is_null on '{field}' takes a boolean, got {other}"
                    )))
                }
            },
            other => {
                return Err(EngineError::invalid_filter(format!(
                    "unknown operator '{other}' on field '{field}'"
                )))
            }
        };
        conditions.push(condition);
    }
    Ok(conditions)
}

fn eval_condition(condition: &Condition, actual: Option<&Value>) -> bool {
    match condition {
        Condition::IsNull(expect_null) => {
            let is_null = matches!(actual, None | Some(Value::Null));
            is_null == *expect_null
        }
        Condition::Eq(expected) => actual.is_some_and(|a| values_equal(a, expected)),
        Condition::Gt(expected) => compare(actual, expected) == Some(Ordering::Greater),
        Condition::Gte(expected) => {
            matches!(
                compare(actual, expected),
                Some(Ordering::Greater | Ordering::Equal)
            )
        }
        Condition::Lt(expected) => compare(actual, expected) == Some(Ordering::Less),
        Condition::Lte(expected) => {
            matches!(
                compare(actual, expected),
                Some(Ordering::Less | Ordering::Equal)
            )
        }
        Condition::Contains(needle) => actual.is_some_and(|a| contains(a, needle)),
        Condition::Matches(expected) => actual.is_some_and(|a| {
            if a.is_object() && expected.is_object() {
                contains(a, expected)
            } else {
                values_equal(a, expected)
            }
        }),
    }
}

/// Equality with numeric widening so `1` and `1.0` compare equal
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

/// Ordered comparison over numbers, timestamps, then plain strings
fn compare(actual: Option<&Value>, expected: &Value) -> Option<Ordering> {
    let actual = actual?;

    if let (Some(x), Some(y)) = (actual.as_f64(), expected.as_f64()) {
        return x.partial_cmp(&y);
    }

    if let (Value::String(a), Value::String(b)) = (actual, expected) {
        if let (Some(ta), Some(tb)) = (parse_timestamp(a), parse_timestamp(b)) {
            return Some(ta.cmp(&tb));
        }
        return Some(a.cmp(b));
    }

    None
}

/// Parse timestamp operands into a single fixed time zone (UTC)
///
/// Accepts RFC3339, a bare `YYYY-MM-DDTHH:MM:SS`, and a bare date.
fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Some(naive.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(date.and_hms_opt(0, 0, 0)?.and_utc());
    }
    None
}

/// Recursive structural containment
///
/// Objects contain a needle object when every needle key is present and
/// itself contained; arrays contain a needle array when every needle
/// element is contained in some target element; an array also contains a
/// bare scalar that is contained in one of its elements; scalars contain
/// by equality. This recursion extends to arrays-of-maps at any depth.
fn contains(target: &Value, needle: &Value) -> bool {
    match (target, needle) {
        (Value::Object(target_map), Value::Object(needle_map)) => needle_map
            .iter()
            .all(|(k, v)| target_map.get(k).is_some_and(|tv| contains(tv, v))),
        (Value::Array(target_items), Value::Array(needle_items)) => needle_items
            .iter()
            .all(|n| target_items.iter().any(|t| contains(t, n))),
        (Value::Array(target_items), scalar) => {
            target_items.iter().any(|t| contains(t, scalar))
        }
        (a, b) => values_equal(a, b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Doc(serde_json::Map<String, Value>);

    impl Doc {
        fn new(value: Value) -> Self {
            match value {
                Value::Object(map) => Self(map),
                _ => panic!("doc must be an object"),
            }
        }
    }

    impl FieldSource for Doc {
        fn field(&self, name: &str) -> Option<Value> {
            lookup_path(&self.0, name)
        }
    }

    fn matches(spec: Value, doc: Value) -> bool {
        Filter::compile(&spec).unwrap().matches(&Doc::new(doc))
    }

    #[test]
    fn test_empty_filter_matches_all() {
        assert!(matches(json!({}), json!({"anything": 1})));
        assert!(Filter::compile(&Value::Null)
            .unwrap()
            .matches(&Doc::new(json!({}))));
    }

    #[test]
    fn test_gt_strict() {
        let spec = json!({"confidence": {"_gt": 0.8}});
        assert!(matches(spec.clone(), json!({"confidence": 0.9})));
        assert!(!matches(spec.clone(), json!({"confidence": 0.8})));
        assert!(!matches(spec, json!({"confidence": 0.7})));
    }

    #[test]
    fn test_gte_lte_bounds() {
        let spec = json!({"version": {"_gte": 2, "_lte": 4}});
        assert!(!matches(spec.clone(), json!({"version": 1})));
        assert!(matches(spec.clone(), json!({"version": 2})));
        assert!(matches(spec.clone(), json!({"version": 4})));
        assert!(!matches(spec, json!({"version": 5})));
    }

    #[test]
    fn test_numeric_widening() {
        assert!(matches(json!({"version": 1}), json!({"version": 1.0})));
        assert!(matches(
            json!({"version": {"_eq": 1.0}}),
            json!({"version": 1})
        ));
    }

    #[test]
    fn test_timestamp_comparison() {
        let spec = json!({"created_at": {"_gte": "2024-01-01"}});
        assert!(matches(
            spec.clone(),
            json!({"created_at": "2024-06-15T12:00:00Z"})
        ));
        assert!(!matches(
            spec,
            json!({"created_at": "2023-12-31T23:59:59Z"})
        ));
    }

    #[test]
    fn test_timestamp_offset_normalized_to_utc() {
        // 09:00+02:00 is 07:00Z, before 08:00Z
        let spec = json!({"created_at": {"_lt": "2024-01-01T08:00:00Z"}});
        assert!(matches(
            spec,
            json!({"created_at": "2024-01-01T09:00:00+02:00"})
        ));
    }

    #[test]
    fn test_is_null() {
        let spec = json!({"expires_at": {"_is_null": true}});
        assert!(matches(spec.clone(), json!({"other": 1})));
        assert!(!matches(spec, json!({"expires_at": "2024-01-01"})));

        let spec = json!({"expires_at": {"_is_null": false}});
        assert!(matches(spec.clone(), json!({"expires_at": "2024-01-01"})));
        assert!(!matches(spec, json!({"other": 1})));
    }

    #[test]
    fn test_contains_array_membership() {
        let spec = json!({"tags": {"_contains": ["important"]}});
        assert!(matches(
            spec.clone(),
            json!({"tags": ["urgent", "important", "review"]})
        ));
        assert!(!matches(spec, json!({"tags": ["urgent"]})));
    }

    #[test]
    fn test_contains_sub_document() {
        let spec = json!({"source": {"_contains": {"repo": "mnemograph"}}});
        assert!(matches(
            spec.clone(),
            json!({"source": {"repo": "mnemograph", "branch": "main"}})
        ));
        assert!(!matches(spec, json!({"source": {"repo": "other"}})));
    }

    #[test]
    fn test_contains_nested_arrays_of_maps() {
        let spec = json!({"refs": {"_contains": [{"kind": "issue"}]}});
        assert!(matches(
            spec.clone(),
            json!({"refs": [{"kind": "pr", "id": 1}, {"kind": "issue", "id": 7}]})
        ));
        assert!(!matches(spec, json!({"refs": [{"kind": "pr"}]})));
    }

    #[test]
    fn test_bare_value_equality() {
        let spec = json!({"kind": "knowledge"});
        assert!(matches(spec.clone(), json!({"kind": "knowledge"})));
        assert!(!matches(spec, json!({"kind": "activity"})));
    }

    #[test]
    fn test_bare_map_containment() {
        let spec = json!({"source": {"repo": "mnemograph"}});
        assert!(matches(
            spec,
            json!({"source": {"repo": "mnemograph", "branch": "main"}})
        ));
    }

    #[test]
    fn test_absent_field_open() {
        // No clause on "owner" at all: everything matches
        let spec = json!({"kind": "knowledge"});
        assert!(matches(spec, json!({"kind": "knowledge", "owner": "x"})));
    }

    #[test]
    fn test_missing_field_fails_closed_conditions() {
        assert!(!matches(json!({"confidence": {"_gt": 0.5}}), json!({})));
        assert!(!matches(json!({"kind": "knowledge"}), json!({})));
    }

    #[test]
    fn test_unknown_operator_rejected() {
        let err = Filter::compile(&json!({"confidence": {"_between": [0, 1]}})).unwrap_err();
        assert!(matches!(err, EngineError::InvalidFilter(_)));
    }

    #[test]
    fn test_mixed_operator_object_rejected() {
        let err = Filter::compile(&json!({"confidence": {"_gt": 0.5, "stray": 1}})).unwrap_err();
        assert!(matches!(err, EngineError::InvalidFilter(_)));
    }

    #[test]
    fn test_is_null_operand_must_be_bool() {
        let err = Filter::compile(&json!({"f": {"_is_null": "yes"}})).unwrap_err();
        assert!(matches!(err, EngineError::InvalidFilter(_)));
    }

    #[test]
    fn test_non_object_spec_rejected() {
        let err = Filter::compile(&json!([1, 2, 3])).unwrap_err();
        assert!(matches!(err, EngineError::InvalidFilter(_)));
    }

    #[test]
    fn test_dotted_path_navigation() {
        let spec = json!({"source.repo": "mnemograph"});
        assert!(matches(
            spec,
            json!({"source": {"repo": "mnemograph", "branch": "main"}})
        ));
    }

    #[test]
    fn test_conjunction_across_fields() {
        let spec = json!({
            "kind": "knowledge",
            "confidence": {"_gte": 0.5}
        });
        assert!(matches(
            spec.clone(),
            json!({"kind": "knowledge", "confidence": 0.5})
        ));
        assert!(!matches(
            spec,
            json!({"kind": "knowledge", "confidence": 0.4})
        ));
    }

    #[test]
    fn test_filter_and_merge() {
        let a = Filter::compile(&json!({"kind": "knowledge"})).unwrap();
        let b = Filter::compile(&json!({"confidence": {"_gt": 0.5}})).unwrap();
        let merged = a.and(b);
        assert!(merged.matches(&Doc::new(json!({"kind": "knowledge", "confidence": 0.9}))));
        assert!(!merged.matches(&Doc::new(json!({"kind": "knowledge", "confidence": 0.1}))));
    }

    #[test]
    fn test_compiled_filter_reusable() {
        let filter = Filter::compile(&json!({"confidence": {"_gt": 0.8}})).unwrap();
        for (value, expected) in [(0.9, true), (0.8, false), (0.81, true)] {
            assert_eq!(
                filter.matches(&Doc::new(json!({"confidence": value}))),
                expected
            );
        }
    }
}
