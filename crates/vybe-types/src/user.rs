//! User identity types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Display name used when the provider gives us nothing better
pub const FALLBACK_DISPLAY_NAME: &str = "discord user";

/// Unique user identifier issued by the identity provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub Uuid);

impl UserId {
    /// Create a new random user ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a user ID from a string
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s.trim())?))
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for UserId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Profile metadata attached by the OAuth provider
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserMetadata {
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub preferred_username: Option<String>,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// The signed-in user as the rest of the system sees them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Provider user ID
    pub id: UserId,
    /// Name shown in the UI
    pub display_name: String,
    /// Avatar image reference
    pub avatar_url: Option<String>,
    /// Email address, if the provider shared one
    pub email: Option<String>,
}

impl Identity {
    /// Build an identity from provider data.
    ///
    /// The display name is the first non-empty of `full_name`,
    /// `preferred_username`, `user_name`, `name`, the email, and finally
    /// [`FALLBACK_DISPLAY_NAME`].
    pub fn from_provider(id: UserId, email: Option<String>, metadata: &UserMetadata) -> Self {
        let display_name = [
            metadata.full_name.as_deref(),
            metadata.preferred_username.as_deref(),
            metadata.user_name.as_deref(),
            metadata.name.as_deref(),
            email.as_deref(),
        ]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|candidate| !candidate.is_empty())
        .unwrap_or(FALLBACK_DISPLAY_NAME)
        .to_string();

        Self {
            id,
            display_name,
            avatar_url: metadata.avatar_url.clone(),
            email,
        }
    }

    /// Whether `other` refers to the same person: same ID, or failing that
    /// the same email (case-insensitive).
    pub fn same_person(&self, id: &UserId, email: Option<&str>) -> bool {
        if self.id == *id {
            return true;
        }
        match (self.email.as_deref(), email) {
            (Some(mine), Some(theirs)) => mine.trim().eq_ignore_ascii_case(theirs.trim()),
            _ => false,
        }
    }
}
