use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ApiError;
use crate::model::validation::Violations;
use crate::model::{generate_id, now, timestamp, Collection, Document, Id, Resource};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Skill {
    Beginner,
    Intermediate,
    Advanced,
}

impl Skill {
    pub fn parse(value: &str) -> Option<Self> {
        serde_json::from_value(Value::String(value.to_string())).ok()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: Id,
    pub title: String,
    pub description: String,
    pub weeks: String,
    pub tuition: f64,
    pub minimum_skill: Skill,
    #[serde(default)]
    pub scholarship_available: bool,
    pub bootcamp: Id,
    pub user: Id,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
}

impl Resource for Course {
    const COLLECTION: Collection = Collection::Courses;
    const LABEL: &'static str = "Course";

    fn id(&self) -> &Id {
        &self.id
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCourse {
    pub title: Option<String>,
    pub description: Option<String>,
    pub weeks: Option<String>,
    pub tuition: Option<f64>,
    pub minimum_skill: Option<String>,
    pub scholarship_available: Option<bool>,
}

impl NewCourse {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut violations = Violations::new();
        violations
            .require(self.title.as_deref(), "Please add a course title")
            .require(self.description.as_deref(), "Please add a description")
            .require(self.weeks.as_deref(), "Please add number of weeks");
        match self.tuition {
            Some(tuition) => {
                violations.check(tuition.is_finite() && tuition >= 0.0, "Tuition must be a positive number");
            }
            None => {
                violations.check(false, "Please add a tuition cost");
            }
        }
        match self.minimum_skill.as_deref() {
            Some(skill) => {
                violations.check(
                    Skill::parse(skill).is_some(),
                    "Minimum skill must be beginner, intermediate or advanced",
                );
            }
            None => {
                violations.check(false, "Please add a minimum skill");
            }
        }
        violations.into_result()
    }

    /// Build the stored course. Call after `validate`.
    pub fn into_course(self, bootcamp: Id, owner: Id) -> Course {
        Course {
            id: generate_id(),
            title: self.title.unwrap_or_default().trim().to_string(),
            description: self.description.unwrap_or_default(),
            weeks: self.weeks.unwrap_or_default(),
            tuition: self.tuition.unwrap_or_default(),
            minimum_skill: self
                .minimum_skill
                .as_deref()
                .and_then(Skill::parse)
                .unwrap_or(Skill::Beginner),
            scholarship_available: self.scholarship_available.unwrap_or(false),
            bootcamp,
            user: owner,
            created_at: now(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub weeks: Option<String>,
    pub tuition: Option<f64>,
    pub minimum_skill: Option<String>,
    pub scholarship_available: Option<bool>,
}

impl CourseUpdate {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut violations = Violations::new();
        for (value, message) in [
            (&self.title, "Please add a course title"),
            (&self.description, "Please add a description"),
            (&self.weeks, "Please add number of weeks"),
        ] {
            if let Some(value) = value {
                violations.check(!value.trim().is_empty(), message);
            }
        }
        if let Some(tuition) = self.tuition {
            violations.check(tuition.is_finite() && tuition >= 0.0, "Tuition must be a positive number");
        }
        if let Some(skill) = self.minimum_skill.as_deref() {
            violations.check(
                Skill::parse(skill).is_some(),
                "Minimum skill must be beginner, intermediate or advanced",
            );
        }
        violations.into_result()
    }

    pub fn into_patch(self) -> Document {
        let mut patch = Document::new();
        if let Some(title) = self.title {
            patch.insert("title".into(), Value::String(title.trim().to_string()));
        }
        if let Some(description) = self.description {
            patch.insert("description".into(), Value::String(description));
        }
        if let Some(weeks) = self.weeks {
            patch.insert("weeks".into(), Value::String(weeks));
        }
        if let Some(tuition) = self.tuition {
            patch.insert("tuition".into(), serde_json::json!(tuition));
        }
        if let Some(skill) = self.minimum_skill.as_deref().and_then(Skill::parse) {
            patch.insert("minimumSkill".into(), serde_json::json!(skill));
        }
        if let Some(scholarship) = self.scholarship_available {
            patch.insert("scholarshipAvailable".into(), Value::Bool(scholarship));
        }
        patch
    }

    /// Whether the write can change the bootcamp's average cost.
    pub fn touches_tuition(&self) -> bool {
        self.tuition.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_course_missing_fields() {
        let err = NewCourse {
            title: Some("Front End Web Development".to_string()),
            ..Default::default()
        }
        .validate()
        .unwrap_err();

        assert_eq!(
            err.to_string(),
            "Please add a description, Please add number of weeks, Please add a tuition cost, Please add a minimum skill"
        );
    }

    #[test]
    fn test_new_course_rejects_unknown_skill() {
        let payload = NewCourse {
            title: Some("Data Science Program".to_string()),
            description: Some("Python and statistics".to_string()),
            weeks: Some("10".to_string()),
            tuition: Some(12000.0),
            minimum_skill: Some("expert".to_string()),
            scholarship_available: None,
        };
        let err = payload.validate().unwrap_err();
        assert_eq!(err.to_string(), "Minimum skill must be beginner, intermediate or advanced");
    }

    #[test]
    fn test_course_update_patch() {
        let update = CourseUpdate {
            tuition: Some(9000.0),
            minimum_skill: Some("advanced".to_string()),
            ..Default::default()
        };
        assert!(update.touches_tuition());
        let patch = update.into_patch();
        assert_eq!(patch["tuition"], 9000.0);
        assert_eq!(patch["minimumSkill"], "advanced");
    }
}
