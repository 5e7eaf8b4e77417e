use serde_json::Value;
use std::cmp::Ordering;

use crate::model::{get_path, Document};
use crate::query::descriptor::{Filter, Literal, Predicate, SortDirection, SortKey};

/// Evaluates filters and sort keys against documents held in memory.
///
/// Semantics follow the JSONB operators used by the PostgreSQL store:
/// equality matches a scalar field or an array field containing the operand,
/// comparisons only hold between values of the same JSON type, and values
/// of different types order as null < string < number < boolean < array <
/// object.
pub struct DocumentMatcher;

impl DocumentMatcher {
    pub fn matches(document: &Document, filter: &Filter) -> bool {
        filter
            .iter()
            .all(|(field, predicate)| Self::evaluate(get_path(document, field), predicate))
    }

    pub fn evaluate(field: Option<&Value>, predicate: &Predicate) -> bool {
        match predicate {
            Predicate::Equals(literal) => Self::equals(field, literal),
            Predicate::Compare(comparison, literal) => match field {
                Some(value) => Self::compare_same_type(value, literal.value())
                    .map(|ordering| comparison.holds(ordering))
                    .unwrap_or(false),
                None => false,
            },
            Predicate::In(literals) => literals.iter().any(|literal| Self::equals(field, literal)),
        }
    }

    fn equals(field: Option<&Value>, literal: &Literal) -> bool {
        let Some(value) = field else {
            return false;
        };
        literal.candidates().iter().any(|candidate| match value {
            Value::Array(items) if !candidate.is_array() => items.contains(candidate),
            other => json_eq(other, candidate),
        })
    }

    /// Ordering between two values of the same JSON type; `None` otherwise.
    fn compare_same_type(left: &Value, right: &Value) -> Option<Ordering> {
        match (left, right) {
            (Value::Number(l), Value::Number(r)) => l.as_f64()?.partial_cmp(&r.as_f64()?),
            (Value::String(l), Value::String(r)) => Some(l.cmp(r)),
            (Value::Bool(l), Value::Bool(r)) => Some(l.cmp(r)),
            _ => None,
        }
    }

    /// Total order used for sorting. Missing fields sort last in both
    /// directions.
    pub fn compare_for_sort(left: &Document, right: &Document, keys: &[SortKey]) -> Ordering {
        for key in keys {
            let ordering = match (get_path(left, &key.field), get_path(right, &key.field)) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Greater,
                (Some(_), None) => Ordering::Less,
                (Some(l), Some(r)) => {
                    let ordering = total_cmp(l, r);
                    match key.direction {
                        SortDirection::Ascending => ordering,
                        SortDirection::Descending => ordering.reverse(),
                    }
                }
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::String(_) => 1,
        Value::Number(_) => 2,
        Value::Bool(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

fn total_cmp(left: &Value, right: &Value) -> Ordering {
    let by_rank = type_rank(left).cmp(&type_rank(right));
    if by_rank != Ordering::Equal {
        return by_rank;
    }
    match (left, right) {
        (Value::Array(l), Value::Array(r)) => l
            .iter()
            .zip(r.iter())
            .map(|(a, b)| total_cmp(a, b))
            .find(|o| *o != Ordering::Equal)
            .unwrap_or_else(|| l.len().cmp(&r.len())),
        (Value::Object(l), Value::Object(r)) => l.len().cmp(&r.len()),
        _ => DocumentMatcher::compare_same_type(left, right).unwrap_or(Ordering::Equal),
    }
}

/// Numbers compare by value so that `10` equals `10.0`.
fn json_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(l), Value::Number(r)) => l.as_f64() == r.as_f64(),
        _ => left == right,
    }
}
