//! Access configuration

use std::path::PathBuf;
use std::time::Duration;

use vybe_backend::OAuthProvider;
use vybe_types::UserId;

/// Host suffix every backend project URL carries
pub const BACKEND_HOST_MARKER: &str = "supabase.co";

/// Public keys at or below this length are placeholders
pub const MIN_PUBLIC_KEY_LEN: usize = 20;

/// Access layer configuration
#[derive(Clone)]
pub struct AccessConfig {
    /// Backend project URL
    pub backend_url: String,
    /// Public (anon / publishable) API key
    pub public_key: String,
    /// Identity that is always treated as admin
    pub admin_user_id: Option<UserId>,
    /// OAuth provider for sign-in
    pub oauth_provider: OAuthProvider,
    /// Budget for the session lookup
    pub session_timeout: Duration,
    /// Budget for entitlement and asset queries
    pub query_timeout: Duration,
    /// Budget for the admin membership query
    pub admin_timeout: Duration,
    /// Budget for uploads and signed link requests
    pub storage_timeout: Duration,
    /// Validity requested for signed links
    pub link_ttl: Duration,
    /// How long before literal expiry a cached link stops being reused
    pub link_safety_margin: Duration,
    /// Where the local snapshot lives; `None` keeps it in memory
    pub snapshot_path: Option<PathBuf>,
}

impl AccessConfig {
    /// Create a config with default timeouts, validating the backend settings
    pub fn new(
        backend_url: impl Into<String>,
        public_key: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let backend_url = backend_url.into().trim().to_string();
        let public_key = public_key.into().trim().to_string();

        if !backend_url.contains(BACKEND_HOST_MARKER) {
            return Err(ConfigError::Invalid("VYBE_BACKEND_URL"));
        }
        if public_key.len() <= MIN_PUBLIC_KEY_LEN {
            return Err(ConfigError::Invalid("VYBE_PUBLIC_KEY"));
        }

        Ok(Self {
            backend_url,
            public_key,
            admin_user_id: None,
            oauth_provider: OAuthProvider::Discord,
            session_timeout: Duration::from_secs(16),
            query_timeout: Duration::from_secs(12),
            admin_timeout: Duration::from_secs(12),
            storage_timeout: Duration::from_secs(60),
            link_ttl: Duration::from_secs(180),
            link_safety_margin: Duration::from_secs(10),
            snapshot_path: None,
        })
    }

    /// Load configuration from environment variables.
    ///
    /// Reads a `.env` file first if present. `VYBE_PUBLIC_KEY` falls back to
    /// `VYBE_PUBLISHABLE_KEY`.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let backend_url =
            std::env::var("VYBE_BACKEND_URL").map_err(|_| ConfigError::Missing("VYBE_BACKEND_URL"))?;
        let public_key = std::env::var("VYBE_PUBLIC_KEY")
            .or_else(|_| std::env::var("VYBE_PUBLISHABLE_KEY"))
            .map_err(|_| ConfigError::Missing("VYBE_PUBLIC_KEY"))?;

        let mut config = Self::new(backend_url, public_key)?;

        if let Some(raw) = non_empty_var("VYBE_ADMIN_USER_ID") {
            let admin = UserId::parse(&raw).map_err(|_| ConfigError::Invalid("VYBE_ADMIN_USER_ID"))?;
            config.admin_user_id = Some(admin);
        }
        if let Some(raw) = non_empty_var("VYBE_OAUTH_PROVIDER") {
            config.oauth_provider = raw
                .parse()
                .map_err(|_| ConfigError::Invalid("VYBE_OAUTH_PROVIDER"))?;
        }
        if let Some(secs) = secs_var("VYBE_SESSION_TIMEOUT_SECS")? {
            config.session_timeout = secs;
        }
        if let Some(secs) = secs_var("VYBE_QUERY_TIMEOUT_SECS")? {
            config.query_timeout = secs;
        }
        if let Some(secs) = secs_var("VYBE_ADMIN_TIMEOUT_SECS")? {
            config.admin_timeout = secs;
        }
        if let Some(secs) = secs_var("VYBE_STORAGE_TIMEOUT_SECS")? {
            config.storage_timeout = secs;
        }
        if let Some(secs) = secs_var("VYBE_LINK_TTL_SECS")? {
            config.link_ttl = secs;
        }
        if let Some(secs) = secs_var("VYBE_LINK_MARGIN_SECS")? {
            config.link_safety_margin = secs;
        }
        if let Some(path) = non_empty_var("VYBE_SNAPSHOT_PATH") {
            config.snapshot_path = Some(PathBuf::from(path));
        }

        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.link_ttl <= self.link_safety_margin {
            return Err(ConfigError::Invalid(
                "link TTL must be longer than the safety margin",
            ));
        }
        Ok(())
    }

    /// Set the privileged admin identity
    pub fn with_admin_user_id(mut self, admin: UserId) -> Self {
        self.admin_user_id = Some(admin);
        self
    }

    /// Set the OAuth provider
    pub fn with_oauth_provider(mut self, provider: OAuthProvider) -> Self {
        self.oauth_provider = provider;
        self
    }

    /// Set the session lookup budget
    pub fn with_session_timeout(mut self, timeout: Duration) -> Self {
        self.session_timeout = timeout;
        self
    }

    /// Set the entitlement and asset query budget
    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    /// Set the admin query budget
    pub fn with_admin_timeout(mut self, timeout: Duration) -> Self {
        self.admin_timeout = timeout;
        self
    }

    /// Set the upload and signed link budget
    pub fn with_storage_timeout(mut self, timeout: Duration) -> Self {
        self.storage_timeout = timeout;
        self
    }

    /// Set signed link validity and reuse margin
    pub fn with_link_ttl(mut self, ttl: Duration, safety_margin: Duration) -> Self {
        self.link_ttl = ttl;
        self.link_safety_margin = safety_margin;
        self
    }

    /// Persist the local snapshot at `path`
    pub fn with_snapshot_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot_path = Some(path.into());
        self
    }
}

impl std::fmt::Debug for AccessConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessConfig")
            .field("backend_url", &self.backend_url)
            .field("public_key", &"[REDACTED]")
            .field("admin_user_id", &self.admin_user_id)
            .field("oauth_provider", &self.oauth_provider)
            .field("session_timeout", &self.session_timeout)
            .field("query_timeout", &self.query_timeout)
            .field("admin_timeout", &self.admin_timeout)
            .field("storage_timeout", &self.storage_timeout)
            .field("link_ttl", &self.link_ttl)
            .field("link_safety_margin", &self.link_safety_margin)
            .field("snapshot_path", &self.snapshot_path)
            .finish()
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn secs_var(name: &'static str) -> Result<Option<Duration>, ConfigError> {
    non_empty_var(name)
        .map(|raw| {
            raw.parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| ConfigError::Invalid(name))
        })
        .transpose()
}

/// Configuration error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid configuration value: {0}")]
    Invalid(&'static str),
}
