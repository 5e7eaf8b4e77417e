use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ApiError;
use crate::model::validation::{is_valid_email, is_valid_url, slugify, Violations};
use crate::model::{generate_id, now, timestamp, Collection, Document, Id, Location, Resource};

pub const DEFAULT_PHOTO: &str = "no-photo.jpg";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Career {
    #[serde(rename = "Web Development")]
    WebDevelopment,
    #[serde(rename = "Mobile Development")]
    MobileDevelopment,
    #[serde(rename = "UI/UX")]
    UiUx,
    #[serde(rename = "Data Science")]
    DataScience,
    Business,
    Other,
}

impl Career {
    pub fn parse(value: &str) -> Option<Self> {
        serde_json::from_value(Value::String(value.to_string())).ok()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bootcamp {
    pub id: Id,
    pub name: String,
    pub slug: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    pub careers: Vec<Career>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_cost: Option<i64>,
    pub photo: String,
    #[serde(default)]
    pub housing: bool,
    #[serde(default)]
    pub job_assistance: bool,
    #[serde(default)]
    pub job_guarantee: bool,
    #[serde(default)]
    pub accept_gi: bool,
    pub user: Id,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
}

impl Resource for Bootcamp {
    const COLLECTION: Collection = Collection::Bootcamps;
    const LABEL: &'static str = "Bootcamp";

    fn id(&self) -> &Id {
        &self.id
    }
}

/// Creation payload. `address` is consumed by geocoding and not stored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBootcamp {
    pub name: Option<String>,
    pub description: Option<String>,
    pub website: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub careers: Option<Vec<String>>,
    pub housing: Option<bool>,
    pub job_assistance: Option<bool>,
    pub job_guarantee: Option<bool>,
    pub accept_gi: Option<bool>,
}

impl NewBootcamp {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut violations = Violations::new();
        violations
            .require(self.name.as_deref(), "Please add a name")
            .require(self.description.as_deref(), "Please add a description")
            .require(self.address.as_deref(), "Please add an address");
        check_common_fields(
            &mut violations,
            self.name.as_deref(),
            self.description.as_deref(),
            self.website.as_deref(),
            self.phone.as_deref(),
            self.email.as_deref(),
        );
        match &self.careers {
            Some(careers) if !careers.is_empty() => check_careers(&mut violations, careers),
            _ => {
                violations.check(false, "Please add at least one career");
            }
        }
        violations.into_result()
    }

    /// Build the stored bootcamp. Call after `validate`.
    pub fn into_bootcamp(self, owner: Id, location: Option<Location>) -> Bootcamp {
        let name = self.name.unwrap_or_default().trim().to_string();
        Bootcamp {
            id: generate_id(),
            slug: slugify(&name),
            name,
            description: self.description.unwrap_or_default(),
            website: self.website,
            phone: self.phone,
            email: self.email,
            location,
            careers: self
                .careers
                .unwrap_or_default()
                .iter()
                .filter_map(|c| Career::parse(c))
                .collect(),
            average_rating: None,
            average_cost: None,
            photo: DEFAULT_PHOTO.to_string(),
            housing: self.housing.unwrap_or(false),
            job_assistance: self.job_assistance.unwrap_or(false),
            job_guarantee: self.job_guarantee.unwrap_or(false),
            accept_gi: self.accept_gi.unwrap_or(false),
            user: owner,
            created_at: now(),
        }
    }
}

/// Partial update. Only present fields are written.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BootcampUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub website: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub careers: Option<Vec<String>>,
    pub housing: Option<bool>,
    pub job_assistance: Option<bool>,
    pub job_guarantee: Option<bool>,
    pub accept_gi: Option<bool>,
}

impl BootcampUpdate {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut violations = Violations::new();
        if let Some(name) = self.name.as_deref() {
            violations.check(!name.trim().is_empty(), "Please add a name");
        }
        if let Some(description) = self.description.as_deref() {
            violations.check(!description.trim().is_empty(), "Please add a description");
        }
        if let Some(address) = self.address.as_deref() {
            violations.check(!address.trim().is_empty(), "Please add an address");
        }
        check_common_fields(
            &mut violations,
            self.name.as_deref(),
            self.description.as_deref(),
            self.website.as_deref(),
            self.phone.as_deref(),
            self.email.as_deref(),
        );
        if let Some(careers) = &self.careers {
            violations.check(!careers.is_empty(), "Please add at least one career");
            check_careers(&mut violations, careers);
        }
        violations.into_result()
    }

    /// The merge patch for the store. `location` comes from geocoding
    /// `address`, when one was supplied.
    pub fn into_patch(self, location: Option<Location>) -> Document {
        let mut patch = Document::new();
        if let Some(name) = self.name {
            let name = name.trim().to_string();
            patch.insert("slug".into(), Value::String(slugify(&name)));
            patch.insert("name".into(), Value::String(name));
        }
        let strings = [
            ("description", self.description),
            ("website", self.website),
            ("phone", self.phone),
            ("email", self.email),
        ];
        for (key, value) in strings {
            if let Some(value) = value {
                patch.insert(key.into(), Value::String(value));
            }
        }
        if let Some(careers) = self.careers {
            let careers: Vec<Career> = careers.iter().filter_map(|c| Career::parse(c)).collect();
            patch.insert("careers".into(), serde_json::json!(careers));
        }
        let flags = [
            ("housing", self.housing),
            ("jobAssistance", self.job_assistance),
            ("jobGuarantee", self.job_guarantee),
            ("acceptGi", self.accept_gi),
        ];
        for (key, value) in flags {
            if let Some(value) = value {
                patch.insert(key.into(), Value::Bool(value));
            }
        }
        if let Some(location) = location {
            patch.insert("location".into(), serde_json::json!(location));
        }
        patch
    }
}

fn check_common_fields(
    violations: &mut Violations,
    name: Option<&str>,
    description: Option<&str>,
    website: Option<&str>,
    phone: Option<&str>,
    email: Option<&str>,
) {
    violations
        .max_len(name, 50, "Name can not be more than 50 characters")
        .max_len(description, 500, "Description can not be more than 500 characters")
        .max_len(phone, 20, "Phone number can not be longer than 20 characters");
    if let Some(website) = website {
        violations.check(is_valid_url(website), "Please use a valid URL with HTTP or HTTPS");
    }
    if let Some(email) = email {
        violations.check(is_valid_email(email), "Please add a valid email");
    }
}

fn check_careers(violations: &mut Violations, careers: &[String]) {
    for career in careers {
        if Career::parse(career).is_none() {
            violations.check(false, &format!("`{}` is not a valid career", career));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_payload() -> NewBootcamp {
        NewBootcamp {
            name: Some("Devworks Bootcamp".to_string()),
            description: Some("Full stack web development".to_string()),
            website: Some("https://devworks.com".to_string()),
            address: Some("233 Bay State Rd Boston MA 02215".to_string()),
            careers: Some(vec!["Web Development".to_string(), "UI/UX".to_string()]),
            housing: Some(true),
            ..Default::default()
        }
    }

    #[test]
    fn test_new_bootcamp_builds_slug_and_defaults() {
        let payload = valid_payload();
        payload.validate().unwrap();
        let bootcamp = payload.into_bootcamp("owner-1".to_string(), None);

        assert_eq!(bootcamp.slug, "devworks-bootcamp");
        assert_eq!(bootcamp.photo, DEFAULT_PHOTO);
        assert_eq!(bootcamp.careers, vec![Career::WebDevelopment, Career::UiUx]);
        assert!(bootcamp.housing);
        assert!(!bootcamp.accept_gi);
        assert_eq!(bootcamp.user, "owner-1");
    }

    #[test]
    fn test_new_bootcamp_rejects_unknown_career_and_long_name() {
        let payload = NewBootcamp {
            name: Some("x".repeat(51)),
            careers: Some(vec!["Underwater Basket Weaving".to_string()]),
            ..valid_payload()
        };
        let err = payload.validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Name can not be more than 50 characters, `Underwater Basket Weaving` is not a valid career"
        );
    }

    #[test]
    fn test_update_patch_contains_only_present_fields() {
        let update = BootcampUpdate {
            name: Some("ModernTech Bootcamp".to_string()),
            job_guarantee: Some(true),
            ..Default::default()
        };
        update.validate().unwrap();
        let patch = update.into_patch(None);

        assert_eq!(patch.len(), 3);
        assert_eq!(patch["slug"], "moderntech-bootcamp");
        assert_eq!(patch["jobGuarantee"], true);
    }

    #[test]
    fn test_career_wire_names() {
        assert_eq!(Career::parse("Data Science"), Some(Career::DataScience));
        assert_eq!(serde_json::to_value(Career::UiUx).unwrap(), "UI/UX");
    }
}
