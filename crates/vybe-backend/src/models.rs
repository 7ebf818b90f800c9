//! Records exchanged with the remote services

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use vybe_types::{AssetId, Identity, Tier, UserId, UserMetadata};

/// OAuth providers the identity service can redirect to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OAuthProvider {
    Discord,
    Github,
    Google,
}

impl OAuthProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Discord => "discord",
            Self::Github => "github",
            Self::Google => "google",
        }
    }
}

impl std::fmt::Display for OAuthProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OAuthProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "discord" => Ok(Self::Discord),
            "github" => Ok(Self::Github),
            "google" => Ok(Self::Google),
            other => Err(format!("unsupported oauth provider: {other}")),
        }
    }
}

/// User object returned by the identity service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: UserId,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: UserMetadata,
}

impl AuthUser {
    pub fn to_identity(&self) -> Identity {
        Identity::from_provider(self.id, self.email.clone(), &self.user_metadata)
    }
}

/// An authenticated session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    pub user: AuthUser,
}

/// Kind of auth state change pushed by the identity service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthEventKind {
    InitialSession,
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
}

/// Auth state change notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthEvent {
    pub kind: AuthEventKind,
    pub session: Option<AuthSession>,
}

/// Entitlement row (`entitlements` table)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitlementRow {
    pub plan: String,
    pub status: String,
    #[serde(default)]
    pub current_period_end: Option<DateTime<Utc>>,
}

/// Asset listing filter; results are newest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AssetQuery {
    /// Restrict to published assets
    pub published_only: bool,
}

impl AssetQuery {
    pub fn published() -> Self {
        Self {
            published_only: true,
        }
    }

    pub fn everything() -> Self {
        Self {
            published_only: false,
        }
    }
}

/// Create asset input
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateAsset {
    pub slug: String,
    pub title: String,
    pub description: Option<String>,
    pub required_tier: Tier,
    pub tags: Vec<String>,
    pub storage_object_path: String,
    pub is_published: bool,
}

/// Download audit record (`asset_downloads` table)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CreateDownload {
    pub user_id: UserId,
    pub asset_id: AssetId,
}

/// Object upload options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UploadOptions {
    /// Replace an existing object at the same path
    pub overwrite: bool,
}
