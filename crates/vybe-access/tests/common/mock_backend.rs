//! In-memory backend for testing
//!
//! One type implements every collaborator trait. Each operation can be
//! slowed down (per operation, and per user for the entitlement lookup) or
//! made to fail, and every call is counted.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::broadcast;
use vybe_backend::{
    AdminRepository, AssetQuery, AssetRepository, AuthEvent, AuthEventKind, AuthSession,
    AuthUser, Backend, BackendError, BackendResult, CreateAsset, CreateDownload,
    DownloadRepository, EntitlementRepository, EntitlementRow, IdentityProvider, OAuthProvider,
    ObjectStorage, UploadOptions,
};
use vybe_types::{Asset, AssetId, UserId};

/// Operation names used for delays, failures and call counts
#[allow(dead_code)]
pub mod op {
    pub const GET_SESSION: &str = "get_session";
    pub const SIGN_IN: &str = "sign_in";
    pub const SIGN_OUT: &str = "sign_out";
    pub const FIND_ENTITLEMENT: &str = "find_entitlement";
    pub const FIND_ADMIN: &str = "find_admin";
    pub const LIST_ASSETS: &str = "list_assets";
    pub const CREATE_ASSET: &str = "create_asset";
    pub const RECORD_DOWNLOAD: &str = "record_download";
    pub const UPLOAD_OBJECT: &str = "upload_object";
    pub const SIGN_URL: &str = "create_signed_url";
}

pub struct MockBackend {
    session: Mutex<Option<AuthSession>>,
    sign_ins: Mutex<Vec<(OAuthProvider, String)>>,
    entitlements: DashMap<UserId, EntitlementRow>,
    admins: DashMap<UserId, ()>,
    assets: Mutex<Vec<Asset>>,
    downloads: Mutex<Vec<CreateDownload>>,
    objects: DashMap<String, Vec<u8>>,
    events: broadcast::Sender<AuthEvent>,
    calls: DashMap<&'static str, usize>,
    delays: DashMap<&'static str, Duration>,
    user_delays: DashMap<UserId, Duration>,
    failures: DashMap<&'static str, BackendError>,
    withhold_urls: AtomicBool,
    issued: AtomicUsize,
}

#[allow(dead_code)]
impl MockBackend {
    pub fn new() -> Arc<Self> {
        let (events, _) = broadcast::channel(16);
        Arc::new(Self {
            session: Mutex::new(None),
            sign_ins: Mutex::new(Vec::new()),
            entitlements: DashMap::new(),
            admins: DashMap::new(),
            assets: Mutex::new(Vec::new()),
            downloads: Mutex::new(Vec::new()),
            objects: DashMap::new(),
            events,
            calls: DashMap::new(),
            delays: DashMap::new(),
            user_delays: DashMap::new(),
            failures: DashMap::new(),
            withhold_urls: AtomicBool::new(false),
            issued: AtomicUsize::new(0),
        })
    }

    /// Bundle as a [`Backend`]
    pub fn backend(self: &Arc<Self>) -> Backend {
        Backend::from_shared(Arc::clone(self))
    }

    // ------------------------------------------------------------------
    // Seeding
    // ------------------------------------------------------------------

    pub fn set_session(&self, user: Option<&AuthUser>) {
        *self.session.lock().unwrap() = user.map(|user| AuthSession { user: user.clone() });
    }

    pub fn set_entitlement(&self, user_id: UserId, row: EntitlementRow) {
        self.entitlements.insert(user_id, row);
    }

    pub fn add_admin(&self, user_id: UserId) {
        self.admins.insert(user_id, ());
    }

    pub fn add_asset(&self, asset: Asset) {
        self.assets.lock().unwrap().push(asset);
    }

    /// Push an auth state change to subscribers
    pub fn emit(&self, kind: AuthEventKind, user: Option<&AuthUser>) {
        let session = user.map(|user| AuthSession { user: user.clone() });
        let _ = self.events.send(AuthEvent { kind, session });
    }

    // ------------------------------------------------------------------
    // Fault injection
    // ------------------------------------------------------------------

    pub fn set_delay(&self, op: &'static str, delay: Duration) {
        self.delays.insert(op, delay);
    }

    /// Extra delay on the entitlement lookup for one user
    pub fn set_user_delay(&self, user_id: UserId, delay: Duration) {
        self.user_delays.insert(user_id, delay);
    }

    pub fn fail(&self, op: &'static str, error: BackendError) {
        self.failures.insert(op, error);
    }

    pub fn recover(&self, op: &'static str) {
        self.failures.remove(op);
    }

    /// Make the signer answer without a URL
    pub fn withhold_urls(&self, withhold: bool) {
        self.withhold_urls.store(withhold, Ordering::SeqCst);
    }

    // ------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------

    pub fn calls(&self, op: &'static str) -> usize {
        self.calls.get(op).map(|c| *c).unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.iter().map(|c| *c.value()).sum()
    }

    pub fn downloads(&self) -> Vec<CreateDownload> {
        self.downloads.lock().unwrap().clone()
    }

    pub fn object(&self, path: &str) -> Option<Vec<u8>> {
        self.objects.get(path).map(|o| o.value().clone())
    }

    pub fn asset_titled(&self, title: &str) -> Option<Asset> {
        self.assets
            .lock()
            .unwrap()
            .iter()
            .find(|a| a.title == title)
            .cloned()
    }

    pub fn sign_ins(&self) -> Vec<(OAuthProvider, String)> {
        self.sign_ins.lock().unwrap().clone()
    }

    async fn enter(&self, op: &'static str) -> BackendResult<()> {
        *self.calls.entry(op).or_insert(0) += 1;
        let delay = self.delays.get(op).map(|d| *d);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match self.failures.get(op) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl IdentityProvider for MockBackend {
    async fn get_session(&self) -> BackendResult<Option<AuthSession>> {
        self.enter(op::GET_SESSION).await?;
        Ok(self.session.lock().unwrap().clone())
    }

    async fn sign_in_with_provider(
        &self,
        provider: OAuthProvider,
        redirect_url: &str,
    ) -> BackendResult<()> {
        self.enter(op::SIGN_IN).await?;
        self.sign_ins
            .lock()
            .unwrap()
            .push((provider, redirect_url.to_string()));
        Ok(())
    }

    async fn sign_out(&self) -> BackendResult<()> {
        self.enter(op::SIGN_OUT).await?;
        *self.session.lock().unwrap() = None;
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}

#[async_trait]
impl EntitlementRepository for MockBackend {
    async fn find_by_user(&self, user_id: &UserId) -> BackendResult<Option<EntitlementRow>> {
        let extra = self.user_delays.get(user_id).map(|d| *d);
        if let Some(extra) = extra {
            tokio::time::sleep(extra).await;
        }
        self.enter(op::FIND_ENTITLEMENT).await?;
        Ok(self.entitlements.get(user_id).map(|r| r.value().clone()))
    }
}

#[async_trait]
impl AdminRepository for MockBackend {
    async fn find_admin(&self, user_id: &UserId) -> BackendResult<Option<UserId>> {
        self.enter(op::FIND_ADMIN).await?;
        Ok(self.admins.get(user_id).map(|r| *r.key()))
    }
}

#[async_trait]
impl AssetRepository for MockBackend {
    async fn list(&self, query: AssetQuery) -> BackendResult<Vec<Asset>> {
        self.enter(op::LIST_ASSETS).await?;
        let mut assets: Vec<Asset> = self
            .assets
            .lock()
            .unwrap()
            .iter()
            .filter(|a| !query.published_only || a.is_published)
            .cloned()
            .collect();
        assets.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(assets)
    }

    async fn create(&self, asset: CreateAsset) -> BackendResult<()> {
        self.enter(op::CREATE_ASSET).await?;
        self.add_asset(Asset {
            id: AssetId::new(),
            title: asset.title,
            description: asset.description,
            required_tier: asset.required_tier,
            tags: asset.tags,
            storage_object_path: asset.storage_object_path,
            is_published: asset.is_published,
            created_at: Utc::now(),
        });
        Ok(())
    }
}

#[async_trait]
impl DownloadRepository for MockBackend {
    async fn record(&self, download: CreateDownload) -> BackendResult<()> {
        self.enter(op::RECORD_DOWNLOAD).await?;
        self.downloads.lock().unwrap().push(download);
        Ok(())
    }
}

#[async_trait]
impl ObjectStorage for MockBackend {
    async fn upload_object(
        &self,
        path: &str,
        bytes: Vec<u8>,
        options: UploadOptions,
    ) -> BackendResult<()> {
        self.enter(op::UPLOAD_OBJECT).await?;
        if !options.overwrite && self.objects.contains_key(path) {
            return Err(BackendError::Api(format!("object already exists: {path}")));
        }
        self.objects.insert(path.to_string(), bytes);
        Ok(())
    }

    async fn create_signed_url(
        &self,
        path: &str,
        ttl: Duration,
        download_name: Option<&str>,
    ) -> BackendResult<Option<String>> {
        self.enter(op::SIGN_URL).await?;
        if self.withhold_urls.load(Ordering::SeqCst) {
            return Ok(None);
        }
        let serial = self.issued.fetch_add(1, Ordering::SeqCst);
        let mut url = format!(
            "https://storage.vybe.test/{path}?expires_in={}&sig={serial}",
            ttl.as_secs()
        );
        if let Some(name) = download_name {
            url.push_str("&download=");
            url.push_str(name);
        }
        Ok(Some(url))
    }
}
