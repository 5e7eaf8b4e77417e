use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::model::Collection;

pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_PAGE_SIZE: u64 = 25;
pub const DEFAULT_SORT_FIELD: &str = "createdAt";

/// Operator tokens accepted after a field name, e.g. `averageCost[lte]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Comparison {
    Gt,
    Gte,
    Lt,
    Lte,
}

impl Comparison {
    pub fn holds(&self, ordering: std::cmp::Ordering) -> bool {
        use std::cmp::Ordering::*;
        match self {
            Comparison::Gt => ordering == Greater,
            Comparison::Gte => ordering != Less,
            Comparison::Lt => ordering == Less,
            Comparison::Lte => ordering != Greater,
        }
    }

    pub fn sql_operator(&self) -> &'static str {
        match self {
            Comparison::Gt => ">",
            Comparison::Gte => ">=",
            Comparison::Lt => "<",
            Comparison::Lte => "<=",
        }
    }
}

/// A filter operand. Values from the query string keep their raw text so
/// that `02215` can still match a string zipcode after being read as a number.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Literal {
    value: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    raw: Option<String>,
}

impl Literal {
    /// Coerce query-string text: integers and decimals become numbers,
    /// `true`/`false` become booleans, anything else stays a string.
    pub fn parse(raw: &str) -> Self {
        let value = coerce(raw);
        let raw = match &value {
            Value::String(_) => None,
            _ => Some(raw.to_string()),
        };
        Self { value, raw }
    }

    /// An operand used exactly as given.
    pub fn exact(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
            raw: None,
        }
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Every form an equality match accepts.
    pub fn candidates(&self) -> Vec<Value> {
        let mut candidates = vec![self.value.clone()];
        if let Some(raw) = &self.raw {
            candidates.push(Value::String(raw.clone()));
        }
        candidates
    }
}

fn coerce(raw: &str) -> Value {
    match raw {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }
    let numeric_shape = !raw.is_empty()
        && raw
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 'e' | 'E'))
        && raw.chars().any(|c| c.is_ascii_digit());
    if numeric_shape {
        if let Ok(int) = raw.parse::<i64>() {
            return Value::from(int);
        }
        if let Some(number) = raw
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
        {
            return Value::Number(number);
        }
    }
    Value::String(raw.to_string())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Predicate {
    /// Equal to the operand, or an array field containing it.
    Equals(Literal),
    Compare(Comparison, Literal),
    /// Equal to any operand in the set.
    In(Vec<Literal>),
}

/// Conjunction of predicates, keyed by (possibly dotted) field path.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Filter {
    clauses: BTreeMap<String, Vec<Predicate>>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn and(mut self, field: impl Into<String>, predicate: Predicate) -> Self {
        self.push(field, predicate);
        self
    }

    pub fn eq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.and(field, Predicate::Equals(Literal::exact(value)))
    }

    pub fn push(&mut self, field: impl Into<String>, predicate: Predicate) {
        self.clauses.entry(field.into()).or_default().push(predicate);
    }

    /// Add every clause of `other`. Used to scope a query to a parent
    /// resource, so `other` always constrains the result further.
    pub fn merge(&mut self, other: Filter) {
        for (field, predicates) in other.clauses {
            self.clauses.entry(field).or_default().extend(predicates);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.clauses.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Predicate)> {
        self.clauses
            .iter()
            .flat_map(|(field, predicates)| predicates.iter().map(move |p| (field.as_str(), p)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SortKey {
    pub field: String,
    pub direction: SortDirection,
}

impl SortKey {
    pub fn ascending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Ascending,
        }
    }

    pub fn descending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Descending,
        }
    }
}

/// How a populated field is joined to its source collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Join {
    /// The field holds the id of one document in the source collection.
    Reference,
    /// The field is virtual: every source document whose `foreign_field`
    /// equals this document's id.
    Reverse { foreign_field: String },
}

/// Expand a referenced entity into its summary form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Populate {
    pub field: String,
    pub from: Collection,
    pub join: Join,
    pub select: Option<Vec<String>>,
}

impl Populate {
    pub fn reference(field: &str, from: Collection) -> Self {
        Self {
            field: field.to_string(),
            from,
            join: Join::Reference,
            select: None,
        }
    }

    pub fn reverse(field: &str, from: Collection, foreign_field: &str) -> Self {
        Self {
            field: field.to_string(),
            from,
            join: Join::Reverse {
                foreign_field: foreign_field.to_string(),
            },
            select: None,
        }
    }

    pub fn select(mut self, fields: &[&str]) -> Self {
        self.select = Some(fields.iter().map(|f| f.to_string()).collect());
        self
    }
}

/// Options for a single page fetch, as understood by every store.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FindOptions {
    pub filter: Filter,
    pub projection: Option<Vec<String>>,
    pub sort: Vec<SortKey>,
    pub skip: u64,
    pub limit: Option<u64>,
}

impl FindOptions {
    pub fn filtered(filter: Filter) -> Self {
        Self {
            filter,
            ..Default::default()
        }
    }

    pub fn sorted(mut self, key: SortKey) -> Self {
        self.sort.push(key);
        self
    }
}

/// The in-flight representation of one list request. Built per request and
/// discarded after the page has been assembled.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryDescriptor {
    pub filter: Filter,
    pub projection: Option<Vec<String>>,
    pub sort_keys: Vec<SortKey>,
    pub page: u64,
    pub page_size: u64,
    pub populate: Option<Populate>,
}

impl Default for QueryDescriptor {
    fn default() -> Self {
        Self {
            filter: Filter::new(),
            projection: None,
            sort_keys: vec![SortKey::descending(DEFAULT_SORT_FIELD)],
            page: DEFAULT_PAGE,
            page_size: DEFAULT_PAGE_SIZE,
            populate: None,
        }
    }
}

impl QueryDescriptor {
    pub fn with_populate(mut self, populate: Populate) -> Self {
        self.populate = Some(populate);
        self
    }

    /// Restrict the query to a parent resource (nested routes).
    pub fn scoped(mut self, scope: Filter) -> Self {
        self.filter.merge(scope);
        self
    }

    pub fn skip(&self) -> u64 {
        (self.page - 1).saturating_mul(self.page_size)
    }

    pub fn find_options(&self) -> FindOptions {
        FindOptions {
            filter: self.filter.clone(),
            projection: self.projection.clone(),
            sort: self.sort_keys.clone(),
            skip: self.skip(),
            limit: Some(self.page_size),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_literal_coercion() {
        assert_eq!(Literal::parse("10000").value(), &json!(10000));
        assert_eq!(Literal::parse("4.5").value(), &json!(4.5));
        assert_eq!(Literal::parse("true").value(), &json!(true));
        assert_eq!(Literal::parse("Boston").value(), &json!("Boston"));
        assert_eq!(Literal::parse("nan").value(), &json!("nan"));
        assert_eq!(Literal::parse("-").value(), &json!("-"));
    }

    #[test]
    fn test_literal_candidates_keep_raw_text() {
        assert_eq!(Literal::parse("02215").candidates(), vec![json!(2215), json!("02215")]);
        assert_eq!(Literal::parse("Boston").candidates(), vec![json!("Boston")]);
    }

    #[test]
    fn test_descriptor_defaults_and_skip() {
        let descriptor = QueryDescriptor::default();
        assert_eq!(descriptor.page, 1);
        assert_eq!(descriptor.page_size, 25);
        assert_eq!(descriptor.sort_keys, vec![SortKey::descending("createdAt")]);
        assert_eq!(descriptor.skip(), 0);

        let third = QueryDescriptor {
            page: 3,
            page_size: 10,
            ..Default::default()
        };
        assert_eq!(third.find_options().skip, 20);
        assert_eq!(third.find_options().limit, Some(10));
    }

    #[test]
    fn test_scope_adds_clause() {
        let descriptor = QueryDescriptor {
            filter: Filter::new().and("tuition", Predicate::Compare(Comparison::Gte, Literal::parse("5000"))),
            ..Default::default()
        }
        .scoped(Filter::new().eq("bootcamp", "b1"));

        let fields: Vec<&str> = descriptor.filter.fields().collect();
        assert_eq!(fields, vec!["bootcamp", "tuition"]);
        assert_eq!(descriptor.filter.iter().count(), 2);
    }
}
