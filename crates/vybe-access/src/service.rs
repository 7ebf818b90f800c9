//! Access controller - ties together session resolution, entitlements, the
//! asset catalog, signed links and uploads

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::instrument;
use vybe_backend::{AssetQuery, AssetRepository, AuthEvent, AuthEventKind, Backend};
use vybe_types::{Asset, AssetId, Identity, Tier};

use crate::catalog::{self, CatalogEntry, TagFilter};
use crate::clock::{Clock, SystemClock};
use crate::config::AccessConfig;
use crate::entitlement::{AdminSource, EntitlementEvaluator, Evaluation, Grant};
use crate::links::{DownloadLink, LinkCache, LinkCacheConfig, Preview};
use crate::session::{ResolvedSession, RetryOutcome, SessionResolver, SessionSource};
use crate::snapshot::{FileSnapshotStore, MemorySnapshotStore, SnapshotStore};
use crate::timeout::remote_call;
use crate::upload::{UploadForm, UploadPhase, UploadReceipt, Uploader};
use crate::{AccessError, AccessResult};

/// Everything the UI renders from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessState {
    pub identity: Option<Identity>,
    /// `None` until the first resolution
    pub session_source: Option<SessionSource>,
    pub tier: Option<Tier>,
    pub is_admin: bool,
    pub admin_source: AdminSource,
    /// Newest first
    pub assets: Vec<Asset>,
    /// Generation of the refresh that produced this state
    pub generation: u64,
}

impl Default for AccessState {
    fn default() -> Self {
        Self {
            identity: None,
            session_source: None,
            tier: None,
            is_admin: false,
            admin_source: AdminSource::Anonymous,
            assets: Vec::new(),
            generation: 0,
        }
    }
}

impl AccessState {
    pub fn grant(&self) -> Grant {
        Grant {
            user_id: self.identity.as_ref().map(|i| i.id),
            tier: self.tier,
            is_admin: self.is_admin,
        }
    }

    /// `tier: Creator+ | admin`, `tier: none`
    pub fn tier_label(&self) -> String {
        let tier = self.tier.map_or("none", |t| t.display_name());
        if self.is_admin {
            format!("tier: {tier} | admin")
        } else {
            format!("tier: {tier}")
        }
    }

    fn find_asset(&self, asset_id: AssetId) -> AccessResult<Asset> {
        self.assets
            .iter()
            .find(|a| a.id == asset_id)
            .cloned()
            .ok_or_else(|| AccessError::NotFound(asset_id.to_string()))
    }
}

/// Filtered catalog ready to render
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogView {
    pub entries: Vec<CatalogEntry>,
    /// Tag filter choices, `all` first
    pub tags: Vec<String>,
    pub status: String,
}

/// Access controller
///
/// Owns the [`AccessState`] and the only transitions that change it:
/// - refresh after a session resolution or an auth event
/// - asset reloads
///
/// Concurrent refreshes are not serialized. Each takes a generation number
/// and only the most recently started one may write its result.
pub struct AccessController {
    sessions: SessionResolver,
    evaluator: EntitlementEvaluator,
    links: LinkCache,
    uploader: Uploader,
    assets: Arc<dyn AssetRepository>,
    query_timeout: Duration,
    state: RwLock<AccessState>,
    generation: AtomicU64,
    cancel: CancellationToken,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl AccessController {
    /// Create a new access controller
    pub fn new(
        config: &AccessConfig,
        backend: Backend,
        snapshots: Arc<dyn SnapshotStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let sessions = SessionResolver::new(
            Arc::clone(&backend.identity),
            Arc::clone(&snapshots),
            Arc::clone(&clock),
        )
        .with_provider(config.oauth_provider)
        .with_timeout(config.session_timeout);

        let evaluator = EntitlementEvaluator::new(
            Arc::clone(&backend.entitlements),
            Arc::clone(&backend.admins),
            snapshots,
            Arc::clone(&clock),
        )
        .with_admin_user_id(config.admin_user_id)
        .with_timeouts(config.query_timeout, config.admin_timeout);

        let links = LinkCache::with_config(
            Arc::clone(&backend.storage),
            Arc::clone(&backend.downloads),
            Arc::clone(&clock),
            LinkCacheConfig::new()
                .with_ttl(config.link_ttl, config.link_safety_margin)
                .with_timeout(config.storage_timeout)
                .with_audit_timeout(config.query_timeout),
        );

        let uploader = Uploader::new(
            Arc::clone(&backend.assets),
            Arc::clone(&backend.storage),
            clock,
        )
        .with_timeouts(config.storage_timeout, config.query_timeout);

        Self {
            sessions,
            evaluator,
            links,
            uploader,
            assets: backend.assets,
            query_timeout: config.query_timeout,
            state: RwLock::new(AccessState::default()),
            generation: AtomicU64::new(0),
            cancel: CancellationToken::new(),
            listener: Mutex::new(None),
        }
    }

    /// Create a controller on the system clock, with a file snapshot when
    /// `snapshot_path` is set and an in-memory one otherwise
    pub fn from_config(config: &AccessConfig, backend: Backend) -> AccessResult<Self> {
        config.validate()?;
        let snapshots: Arc<dyn SnapshotStore> = match &config.snapshot_path {
            Some(path) => Arc::new(FileSnapshotStore::new(path)),
            None => Arc::new(MemorySnapshotStore::new()),
        };
        Ok(Self::new(config, backend, snapshots, Arc::new(SystemClock)))
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Show the cached identity, resolve the session, evaluate and load the
    /// catalog, then follow auth changes until [`Self::shutdown`].
    #[instrument(skip_all)]
    pub async fn start(self: &Arc<Self>) {
        // Subscribe first so no change between resolve and listen is lost
        let events = self.sessions.subscribe();

        if let Some(identity) = self.sessions.provisional() {
            let mut state = self.state.write().await;
            if state.session_source.is_none() {
                tracing::debug!(user_id = %identity.id, "showing provisional identity");
                state.identity = Some(identity);
                state.session_source = Some(SessionSource::Cache);
            }
        }

        let ResolvedSession {
            identity,
            source,
            retry,
        } = self.sessions.resolve(&self.cancel).await;
        self.refresh(identity, source).await;
        if let Some(retry) = retry {
            self.follow_retry(retry);
        }

        self.spawn_listener(events);
    }

    /// Stop the listener and abandon in-flight calls
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let listener = self
            .listener
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = listener {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "auth listener ended abnormally");
            }
        }
    }

    fn spawn_listener(self: &Arc<Self>, mut events: tokio::sync::broadcast::Receiver<AuthEvent>) {
        let mut slot = self.listener.lock().unwrap_or_else(|e| e.into_inner());
        if slot.is_some() {
            return;
        }

        let this = Arc::clone(self);
        let purge_every = this.links.config().ttl.max(Duration::from_secs(1));
        *slot = Some(tokio::spawn(async move {
            let mut purge = tokio::time::interval(purge_every);
            loop {
                tokio::select! {
                    _ = this.cancel.cancelled() => break,
                    _ = purge.tick() => this.links.purge_expired(),
                    event = events.recv() => match event {
                        Ok(event) => this.on_auth_event(event).await,
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "missed auth events, resolving again");
                            let resolved = this.sessions.resolve(&this.cancel).await;
                            this.refresh(resolved.identity, resolved.source).await;
                        }
                        Err(RecvError::Closed) => break,
                    },
                }
            }
            tracing::debug!("auth listener stopped");
        }));
    }

    fn follow_retry(self: &Arc<Self>, retry: JoinHandle<RetryOutcome>) {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            match retry.await {
                Ok(RetryOutcome::Resolved(identity)) => {
                    this.refresh(identity, SessionSource::Remote).await;
                }
                Ok(RetryOutcome::GaveUp) => {}
                Err(e) => tracing::warn!(error = %e, "session retry task failed"),
            }
        });
    }

    async fn on_auth_event(&self, event: AuthEvent) {
        tracing::debug!(kind = ?event.kind, "auth state changed");
        if event.kind == AuthEventKind::SignedOut {
            self.links.invalidate_all();
        }
        let identity = self.sessions.accept(event.session);
        self.refresh(identity, SessionSource::Remote).await;
    }

    // =========================================================================
    // State transitions
    // =========================================================================

    /// Re-evaluate `identity` and reload the catalog.
    ///
    /// Returns `false` when a later refresh started before this one finished;
    /// its result is then dropped.
    #[instrument(skip_all, fields(user_id = ?identity.as_ref().map(|i| i.id)))]
    pub async fn refresh(&self, identity: Option<Identity>, source: SessionSource) -> bool {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let evaluation = self.evaluator.evaluate(identity.as_ref(), &self.cancel).await;
        let grant = Grant {
            user_id: identity.as_ref().map(|i| i.id),
            tier: evaluation.tier,
            is_admin: evaluation.is_admin,
        };
        let assets = match self.fetch_assets(&grant).await {
            Ok(assets) => Some(assets),
            Err(e) => {
                tracing::warn!(error = %e, "asset load failed, keeping previous list");
                None
            }
        };

        let mut state = self.state.write().await;
        if self.generation.load(Ordering::SeqCst) != generation {
            tracing::debug!(generation, "discarding superseded refresh");
            return false;
        }

        let Evaluation {
            tier,
            is_admin,
            admin_source,
        } = evaluation;
        state.identity = identity;
        state.session_source = Some(source);
        state.tier = tier;
        state.is_admin = is_admin;
        state.admin_source = admin_source;
        if let Some(assets) = assets {
            state.assets = assets;
        }
        state.generation = generation;

        tracing::info!(
            generation,
            label = %state.tier_label(),
            assets = state.assets.len(),
            "access state refreshed"
        );
        true
    }

    /// Reload the catalog for the current grant
    pub async fn reload_assets(&self) -> AccessResult<usize> {
        let (grant, generation) = {
            let state = self.state.read().await;
            (state.grant(), self.generation.load(Ordering::SeqCst))
        };

        let assets = self.fetch_assets(&grant).await?;

        let mut state = self.state.write().await;
        if self.generation.load(Ordering::SeqCst) != generation {
            tracing::debug!("discarding asset reload superseded by a refresh");
            return Ok(state.assets.len());
        }
        state.assets = assets;
        Ok(state.assets.len())
    }

    async fn fetch_assets(&self, grant: &Grant) -> AccessResult<Vec<Asset>> {
        let query = if grant.is_admin {
            AssetQuery::everything()
        } else {
            AssetQuery::published()
        };

        let mut assets = remote_call("asset list", self.query_timeout, &self.cancel, async {
            self.assets.list(query).await
        })
        .await?
        .map_err(|e| AccessError::Query(e.to_string()))?;

        assets.retain(|asset| grant.can_see(asset));
        Ok(assets)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Current state
    pub async fn state(&self) -> AccessState {
        self.state.read().await.clone()
    }

    pub async fn grant(&self) -> Grant {
        self.state.read().await.grant()
    }

    pub async fn tier_label(&self) -> String {
        self.state.read().await.tier_label()
    }

    /// Filtered catalog with lock flags for the current grant
    pub async fn catalog(&self, search: &str, tag: &TagFilter) -> CatalogView {
        let state = self.state.read().await;
        let entries = catalog::catalog_entries(&state.assets, search, tag, &state.grant());
        CatalogView {
            status: catalog::status_line(entries.len()),
            tags: catalog::available_tags(&state.assets),
            entries,
        }
    }

    // =========================================================================
    // Actions
    // =========================================================================

    /// Inline preview link for a catalog asset
    pub async fn preview(&self, asset_id: AssetId) -> AccessResult<Preview> {
        let asset = self.state.read().await.find_asset(asset_id)?;
        self.links.preview(&asset, &self.cancel).await
    }

    /// Download link for a catalog asset, if the current grant covers it
    pub async fn download(&self, asset_id: AssetId) -> AccessResult<DownloadLink> {
        let (asset, grant) = {
            let state = self.state.read().await;
            (state.find_asset(asset_id)?, state.grant())
        };
        self.links.download(&asset, &grant, &self.cancel).await
    }

    /// Upload an asset (admins only), then reload the catalog
    pub async fn upload(&self, form: UploadForm) -> AccessResult<UploadReceipt> {
        let grant = self.grant().await;
        let receipt = self.uploader.submit(form, &grant, &self.cancel).await?;
        if let Err(e) = self.reload_assets().await {
            tracing::warn!(error = %e, "catalog reload after upload failed");
        }
        Ok(receipt)
    }

    pub fn upload_progress(&self) -> watch::Receiver<UploadPhase> {
        self.uploader.subscribe()
    }

    /// Start the OAuth redirect flow
    pub async fn sign_in(&self, redirect_url: &str) -> AccessResult<()> {
        self.sessions.sign_in(redirect_url, &self.cancel).await
    }

    /// Sign out, drop cached links and fall back to the anonymous view
    pub async fn sign_out(&self) -> AccessResult<()> {
        self.sessions.sign_out(&self.cancel).await?;
        self.links.invalidate_all();
        self.refresh(None, SessionSource::Remote).await;
        Ok(())
    }
}

impl std::fmt::Debug for AccessController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessController")
            .field("sessions", &self.sessions)
            .field("evaluator", &self.evaluator)
            .field("links", &self.links)
            .field("uploader", &self.uploader)
            .field("generation", &self.generation.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}
