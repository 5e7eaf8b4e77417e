use serde::{Deserialize, Serialize};

use crate::model::Document;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRef {
    pub page: u64,
    pub limit: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<PageRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev: Option<PageRef>,
}

impl Pagination {
    /// `next` iff `page * limit < total`, `prev` iff `page > 1`.
    pub fn compute(page: u64, limit: u64, total: u64) -> Self {
        let next = (page.saturating_mul(limit) < total).then(|| PageRef {
            page: page.saturating_add(1),
            limit,
        });
        let prev = (page > 1).then(|| PageRef {
            page: page.saturating_sub(1),
            limit,
        });
        Self { next, prev }
    }
}

/// Standard wrapper for list responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaginationEnvelope {
    pub success: bool,
    pub count: usize,
    pub pagination: Pagination,
    pub data: Vec<Document>,
}

impl PaginationEnvelope {
    pub fn new(data: Vec<Document>, pagination: Pagination) -> Self {
        Self {
            success: true,
            count: data.len(),
            pagination,
            data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_links() {
        assert_eq!(Pagination::compute(1, 25, 0), Pagination::default());
        assert_eq!(Pagination::compute(1, 25, 25), Pagination::default());

        let first = Pagination::compute(1, 10, 11);
        assert_eq!(first.next, Some(PageRef { page: 2, limit: 10 }));
        assert_eq!(first.prev, None);

        let last = Pagination::compute(2, 10, 11);
        assert_eq!(last.next, None);
        assert_eq!(last.prev, Some(PageRef { page: 1, limit: 10 }));

        // Past the end still links back
        let beyond = Pagination::compute(9, 10, 11);
        assert_eq!(beyond.next, None);
        assert_eq!(beyond.prev, Some(PageRef { page: 8, limit: 10 }));
    }

    #[test]
    fn test_last_representable_page() {
        let max = Pagination::compute(u64::MAX, 1, u64::MAX);
        assert_eq!(max.next, None);
        assert_eq!(max.prev, Some(PageRef { page: u64::MAX - 1, limit: 1 }));

        // page * limit saturates below a total that can never be reached
        let huge = Pagination::compute(u64::MAX, 0, 1);
        assert_eq!(huge.next, Some(PageRef { page: u64::MAX, limit: 0 }));
    }

    #[test]
    fn test_empty_pagination_serializes_as_object() {
        let envelope = PaginationEnvelope::new(Vec::new(), Pagination::default());
        assert_eq!(
            serde_json::to_value(&envelope).unwrap(),
            serde_json::json!({ "success": true, "count": 0, "pagination": {}, "data": [] })
        );
    }
}
