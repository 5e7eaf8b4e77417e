use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ApiError;
use crate::model::validation::Violations;
use crate::model::{generate_id, now, timestamp, Collection, Document, Id, Resource};

pub const MIN_RATING: i64 = 1;
pub const MAX_RATING: i64 = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: Id,
    pub title: String,
    pub text: String,
    pub rating: i64,
    pub bootcamp: Id,
    pub user: Id,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
}

impl Resource for Review {
    const COLLECTION: Collection = Collection::Reviews;
    const LABEL: &'static str = "Review";

    fn id(&self) -> &Id {
        &self.id
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewReview {
    pub title: Option<String>,
    pub text: Option<String>,
    pub rating: Option<i64>,
}

fn check_rating(violations: &mut Violations, rating: i64) {
    violations.check(
        (MIN_RATING..=MAX_RATING).contains(&rating),
        "Please add a rating between 1 and 10",
    );
}

impl NewReview {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut violations = Violations::new();
        violations
            .require(self.title.as_deref(), "Please add a title for the review")
            .max_len(self.title.as_deref(), 100, "Title can not be more than 100 characters")
            .require(self.text.as_deref(), "Please add some text");
        match self.rating {
            Some(rating) => check_rating(&mut violations, rating),
            None => {
                violations.check(false, "Please add a rating between 1 and 10");
            }
        }
        violations.into_result()
    }

    pub fn into_review(self, bootcamp: Id, author: Id) -> Review {
        Review {
            id: generate_id(),
            title: self.title.unwrap_or_default().trim().to_string(),
            text: self.text.unwrap_or_default(),
            rating: self.rating.unwrap_or(MIN_RATING),
            bootcamp,
            user: author,
            created_at: now(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReviewUpdate {
    pub title: Option<String>,
    pub text: Option<String>,
    pub rating: Option<i64>,
}

impl ReviewUpdate {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut violations = Violations::new();
        if let Some(title) = self.title.as_deref() {
            violations
                .check(!title.trim().is_empty(), "Please add a title for the review")
                .max_len(Some(title), 100, "Title can not be more than 100 characters");
        }
        if let Some(text) = self.text.as_deref() {
            violations.check(!text.trim().is_empty(), "Please add some text");
        }
        if let Some(rating) = self.rating {
            check_rating(&mut violations, rating);
        }
        violations.into_result()
    }

    pub fn touches_rating(&self) -> bool {
        self.rating.is_some()
    }

    pub fn into_patch(self) -> Document {
        let mut patch = Document::new();
        if let Some(title) = self.title {
            patch.insert("title".into(), Value::String(title.trim().to_string()));
        }
        if let Some(text) = self.text {
            patch.insert("text".into(), Value::String(text));
        }
        if let Some(rating) = self.rating {
            patch.insert("rating".into(), Value::from(rating));
        }
        patch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rating_bounds() {
        let review = |rating| NewReview {
            title: Some("Learned a ton".to_string()),
            text: Some("Great instructors".to_string()),
            rating: Some(rating),
        };
        assert!(review(1).validate().is_ok());
        assert!(review(10).validate().is_ok());
        assert!(review(0).validate().is_err());
        assert!(review(11).validate().is_err());
    }

    #[test]
    fn test_update_patch_only_rating() {
        let update = ReviewUpdate {
            rating: Some(7),
            ..Default::default()
        };
        update.validate().unwrap();
        assert!(update.touches_rating());
        let patch = update.into_patch();
        assert_eq!(patch.len(), 1);
        assert_eq!(patch["rating"], 7);
    }
}
