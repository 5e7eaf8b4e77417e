use url::{Host, Url};
use validator::validate_email;

use crate::error::ApiError;

/// Collects field-level violations so that all of them are reported at once.
#[derive(Debug, Default)]
pub struct Violations {
    messages: Vec<String>,
}

impl Violations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(&mut self, ok: bool, message: &str) -> &mut Self {
        if !ok {
            self.messages.push(message.to_string());
        }
        self
    }

    pub fn require(&mut self, value: Option<&str>, message: &str) -> &mut Self {
        let present = value.map(|v| !v.trim().is_empty()).unwrap_or(false);
        self.check(present, message)
    }

    pub fn max_len(&mut self, value: Option<&str>, max: usize, message: &str) -> &mut Self {
        let ok = value.map(|v| v.chars().count() <= max).unwrap_or(true);
        self.check(ok, message)
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn into_result(self) -> Result<(), ApiError> {
        if self.messages.is_empty() {
            Ok(())
        } else {
            Err(ApiError::ValidationFailed(self.messages))
        }
    }
}

/// Dotted domain with no empty labels, so `localhost` and `a..b` fail.
fn is_qualified_domain(domain: &str) -> bool {
    domain.contains('.') && domain.split('.').all(|label| !label.is_empty())
}

pub fn is_valid_email(value: &str) -> bool {
    validate_email(value)
        && value
            .rsplit_once('@')
            .map(|(_, domain)| is_qualified_domain(domain))
            .unwrap_or(false)
}

/// Absolute `http`/`https` URL whose host is an IP address or a qualified domain.
pub fn is_valid_url(value: &str) -> bool {
    let Ok(url) = Url::parse(value) else {
        return false;
    };
    if !matches!(url.scheme(), "http" | "https") {
        return false;
    }
    match url.host() {
        Some(Host::Domain(domain)) => is_qualified_domain(domain),
        Some(Host::Ipv4(_)) | Some(Host::Ipv6(_)) => true,
        None => false,
    }
}

/// URL-friendly form of a name: lowercase alphanumerics joined by `-`.
pub fn slugify(value: &str) -> String {
    value
        .split(|c: char| !c.is_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}
