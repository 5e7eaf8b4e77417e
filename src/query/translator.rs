//! Turns raw list-endpoint query parameters into a [`QueryDescriptor`].
//!
//! ```text
//! ?select=name,description&sort=-averageCost,name&page=2&limit=10
//!  &careers=Business&averageCost[lte]=10000&location.state=MA
//! ```
//!
//! Operators are recognised structurally: only the bracket suffix of a key,
//! or the final segment of a dotted key, is compared with the operator
//! tokens. Values and the remaining parts of a field name are never
//! rewritten.

use crate::error::ApiError;
use crate::query::descriptor::{
    Comparison, Literal, Predicate, QueryDescriptor, SortKey, DEFAULT_PAGE, DEFAULT_PAGE_SIZE,
    DEFAULT_SORT_FIELD,
};

const RESERVED_KEYS: [&str; 4] = ["select", "sort", "page", "limit"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    Compare(Comparison),
    In,
}

impl Operator {
    fn from_token(token: &str) -> Option<Self> {
        match token {
            "gt" => Some(Operator::Compare(Comparison::Gt)),
            "gte" => Some(Operator::Compare(Comparison::Gte)),
            "lt" => Some(Operator::Compare(Comparison::Lt)),
            "lte" => Some(Operator::Compare(Comparison::Lte)),
            "in" => Some(Operator::In),
            _ => None,
        }
    }
}

/// Build a descriptor from `(key, value)` pairs in request order.
///
/// Control keys take their last occurrence. Malformed filter keys are
/// rejected with `ValidationFailed`; malformed `page`/`limit` fall back to
/// the defaults.
pub fn translate<I, K, V>(params: I) -> Result<QueryDescriptor, ApiError>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut descriptor = QueryDescriptor::default();
    let mut select = None;
    let mut sort = None;
    let mut page = None;
    let mut limit = None;

    for (key, value) in params {
        let (key, value) = (key.as_ref(), value.as_ref());
        match key {
            "select" => select = Some(value.to_string()),
            "sort" => sort = Some(value.to_string()),
            "page" => page = Some(value.to_string()),
            "limit" => limit = Some(value.to_string()),
            _ => {
                let (field, predicate) = parse_filter(key, value)?;
                descriptor.filter.push(field, predicate);
            }
        }
    }

    descriptor.projection = select.as_deref().map(split_list).filter(|f| !f.is_empty());
    descriptor.sort_keys = sort
        .as_deref()
        .map(parse_sort)
        .filter(|keys| !keys.is_empty())
        .unwrap_or_else(|| vec![SortKey::descending(DEFAULT_SORT_FIELD)]);
    descriptor.page = parse_positive(page.as_deref()).unwrap_or(DEFAULT_PAGE);
    descriptor.page_size = parse_positive(limit.as_deref()).unwrap_or(DEFAULT_PAGE_SIZE);

    log::debug!(
        "Translated query: {} filter clause(s), page {} of size {}",
        descriptor.filter.iter().count(),
        descriptor.page,
        descriptor.page_size
    );
    Ok(descriptor)
}

fn parse_filter(key: &str, value: &str) -> Result<(String, Predicate), ApiError> {
    let (field, operator) = split_operator(key)?;
    if field.is_empty() || field.split('.').any(str::is_empty) {
        return Err(ApiError::invalid(format!("Invalid filter field '{}'", key)));
    }
    if RESERVED_KEYS.contains(&field) {
        return Err(ApiError::invalid(format!(
            "'{}' is a reserved parameter and takes no operator",
            field
        )));
    }

    let predicate = match operator {
        None => Predicate::Equals(Literal::parse(value)),
        Some(Operator::Compare(comparison)) => {
            if value.is_empty() {
                return Err(ApiError::invalid(format!("Filter '{}' needs a value", key)));
            }
            Predicate::Compare(comparison, Literal::parse(value))
        }
        Some(Operator::In) => {
            let items = split_list(value);
            if items.is_empty() {
                return Err(ApiError::invalid(format!("Filter '{}' needs at least one value", key)));
            }
            Predicate::In(items.iter().map(|item| Literal::parse(item)).collect())
        }
    };
    Ok((field.to_string(), predicate))
}

/// Split `field[op]` or `field.op` into its field and operator.
fn split_operator(key: &str) -> Result<(&str, Option<Operator>), ApiError> {
    if let Some(open) = key.find('[') {
        let Some(inner) = key[open + 1..].strip_suffix(']') else {
            return Err(ApiError::invalid(format!("Malformed filter '{}'", key)));
        };
        return match Operator::from_token(inner) {
            Some(operator) => Ok((&key[..open], Some(operator))),
            None => Err(ApiError::invalid(format!(
                "Unknown filter operator '{}' in '{}'",
                inner, key
            ))),
        };
    }
    if key.contains(']') {
        return Err(ApiError::invalid(format!("Malformed filter '{}'", key)));
    }
    if let Some((field, last)) = key.rsplit_once('.') {
        if let Some(operator) = Operator::from_token(last) {
            return Ok((field, Some(operator)));
        }
    }
    Ok((key, None))
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_sort(value: &str) -> Vec<SortKey> {
    split_list(value)
        .into_iter()
        .filter_map(|item| match item.strip_prefix('-') {
            Some("") => None,
            Some(field) => Some(SortKey::descending(field)),
            None => Some(SortKey::ascending(item.as_str())),
        })
        .collect()
}

fn parse_positive(value: Option<&str>) -> Option<u64> {
    value?.trim().parse::<u64>().ok().filter(|n| *n >= 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::descriptor::Filter;
    use serde_json::json;

    fn pairs(raw: &[(&str, &str)]) -> Vec<(String, String)> {
        raw.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_defaults_when_no_params() {
        let descriptor = translate(pairs(&[])).unwrap();
        assert_eq!(descriptor, QueryDescriptor::default());
    }

    #[test]
    fn test_control_keys() {
        let descriptor = translate(pairs(&[
            ("select", "name,description"),
            ("sort", "-averageCost,name"),
            ("page", "2"),
            ("limit", "10"),
        ]))
        .unwrap();

        assert_eq!(
            descriptor.projection,
            Some(vec!["name".to_string(), "description".to_string()])
        );
        assert_eq!(
            descriptor.sort_keys,
            vec![SortKey::descending("averageCost"), SortKey::ascending("name")]
        );
        assert_eq!(descriptor.page, 2);
        assert_eq!(descriptor.page_size, 10);
        assert!(descriptor.filter.is_empty());
    }

    #[test]
    fn test_invalid_paging_falls_back_to_defaults() {
        for (page, limit) in [("0", "0"), ("-1", "abc"), ("", "2.5")] {
            let descriptor = translate(pairs(&[("page", page), ("limit", limit)])).unwrap();
            assert_eq!(descriptor.page, 1);
            assert_eq!(descriptor.page_size, 25);
        }
    }

    #[test]
    fn test_bracket_and_dotted_operators() {
        let descriptor = translate(pairs(&[
            ("averageCost[lte]", "10000"),
            ("rating.gte", "8"),
            ("careers[in]", "Business,Other"),
        ]))
        .unwrap();

        let expected = Filter::new()
            .and("averageCost", Predicate::Compare(Comparison::Lte, Literal::parse("10000")))
            .and("careers", Predicate::In(vec![Literal::parse("Business"), Literal::parse("Other")]))
            .and("rating", Predicate::Compare(Comparison::Gte, Literal::parse("8")));
        assert_eq!(descriptor.filter, expected);
    }

    #[test]
    fn test_operator_tokens_inside_values_and_fields_are_untouched() {
        let descriptor = translate(pairs(&[
            ("description", "learn gt and lte in a week"),
            ("location.in.city", "Boston"),
            ("title", "in"),
        ]))
        .unwrap();

        let predicates: Vec<(&str, &Predicate)> = descriptor.filter.iter().collect();
        assert_eq!(predicates.len(), 3);
        assert_eq!(
            predicates[0],
            ("description", &Predicate::Equals(Literal::parse("learn gt and lte in a week")))
        );
        assert_eq!(predicates[1], ("location.in.city", &Predicate::Equals(Literal::parse("Boston"))));
        assert_eq!(predicates[2], ("title", &Predicate::Equals(Literal::exact(json!("in")))));
    }

    #[test]
    fn test_malformed_filters_are_rejected() {
        for key in ["averageCost[foo]", "averageCost[lte", "averageCost]", "[gt]", "location..city"] {
            let err = translate(pairs(&[(key, "1")])).unwrap_err();
            assert!(matches!(err, ApiError::ValidationFailed(_)), "{key} should be rejected");
        }
        assert!(translate(pairs(&[("careers[in]", " , ")])).is_err());
        assert!(translate(pairs(&[("tuition[gt]", "")])).is_err());
        assert!(translate(pairs(&[("page[gt]", "1")])).is_err());
    }

    #[test]
    fn test_empty_sort_uses_default() {
        let descriptor = translate(pairs(&[("sort", ",-")])).unwrap();
        assert_eq!(descriptor.sort_keys, vec![SortKey::descending("createdAt")]);
    }
}
