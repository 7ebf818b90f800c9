//! Collaborator traits
//!
//! Async interfaces for the identity service, the record store and object
//! storage. Implementations talk to the hosted backend; tests use in-memory
//! doubles.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;
use vybe_types::{Asset, UserId};

use crate::error::BackendResult;
use crate::models::*;

/// Identity / session service
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Current session, if signed in
    async fn get_session(&self) -> BackendResult<Option<AuthSession>>;

    /// Start the OAuth redirect flow
    async fn sign_in_with_provider(
        &self,
        provider: OAuthProvider,
        redirect_url: &str,
    ) -> BackendResult<()>;

    /// End the current session
    async fn sign_out(&self) -> BackendResult<()>;

    /// Push-based auth state change notifications
    fn subscribe(&self) -> broadcast::Receiver<AuthEvent>;
}

/// Entitlement repository trait
#[async_trait]
pub trait EntitlementRepository: Send + Sync {
    /// Find the entitlement row for a user (single-row fetch)
    async fn find_by_user(&self, user_id: &UserId) -> BackendResult<Option<EntitlementRow>>;
}

/// Admin membership repository trait
#[async_trait]
pub trait AdminRepository: Send + Sync {
    /// Returns the user ID back when the user is in the admin set
    async fn find_admin(&self, user_id: &UserId) -> BackendResult<Option<UserId>>;
}

/// Asset repository trait
#[async_trait]
pub trait AssetRepository: Send + Sync {
    /// List assets, newest first
    async fn list(&self, query: AssetQuery) -> BackendResult<Vec<Asset>>;

    /// Insert asset metadata
    async fn create(&self, asset: CreateAsset) -> BackendResult<()>;
}

/// Download audit repository trait
#[async_trait]
pub trait DownloadRepository: Send + Sync {
    /// Append a download record
    async fn record(&self, download: CreateDownload) -> BackendResult<()>;
}

/// Object storage
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Store an object
    async fn upload_object(
        &self,
        path: &str,
        bytes: Vec<u8>,
        options: UploadOptions,
    ) -> BackendResult<()>;

    /// Issue a time-limited URL for an object. `download_name` forces a
    /// download with that file name instead of inline display.
    async fn create_signed_url(
        &self,
        path: &str,
        ttl: Duration,
        download_name: Option<&str>,
    ) -> BackendResult<Option<String>>;
}

/// All collaborators bundled together
#[derive(Clone)]
pub struct Backend {
    pub identity: Arc<dyn IdentityProvider>,
    pub entitlements: Arc<dyn EntitlementRepository>,
    pub admins: Arc<dyn AdminRepository>,
    pub assets: Arc<dyn AssetRepository>,
    pub downloads: Arc<dyn DownloadRepository>,
    pub storage: Arc<dyn ObjectStorage>,
}

impl Backend {
    /// Bundle a single type that implements every collaborator trait
    pub fn from_shared<T>(shared: Arc<T>) -> Self
    where
        T: IdentityProvider
            + EntitlementRepository
            + AdminRepository
            + AssetRepository
            + DownloadRepository
            + ObjectStorage
            + 'static,
    {
        Self {
            identity: shared.clone(),
            entitlements: shared.clone(),
            admins: shared.clone(),
            assets: shared.clone(),
            downloads: shared.clone(),
            storage: shared,
        }
    }
}

impl std::fmt::Debug for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backend").finish_non_exhaustive()
    }
}
