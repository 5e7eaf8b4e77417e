use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{now, timestamp, Collection, Id, Resource};

/// A signed-in session. `id` is the SHA-256 digest of the bearer token; the
/// token itself is never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: Id,
    pub user: Id,
    #[serde(with = "timestamp")]
    pub expires_at: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
}

impl Resource for Session {
    const COLLECTION: Collection = Collection::Sessions;
    const LABEL: &'static str = "Session";

    fn id(&self) -> &Id {
        &self.id
    }
}

impl Session {
    pub fn new(token_digest: String, user: Id, expires_at: DateTime<Utc>) -> Self {
        Self {
            id: token_digest,
            user,
            expires_at,
            created_at: now(),
        }
    }

    pub fn is_expired(&self, at: DateTime<Utc>) -> bool {
        self.expires_at <= at
    }
}
