//! Signed link caching
//!
//! Signed links are time-limited, so a cached link is reused only while it
//! is comfortably inside its validity window. Entries are keyed by object
//! path and optional download name: an inline preview link and a forced
//! download link for the same object are different links.
//!
//! # Usage
//!
//! ```ignore
//! let links = LinkCache::new(backend.storage.clone(), backend.downloads.clone(), clock);
//!
//! // First call asks the storage service
//! let url = links.get_link("packs/alpha.zip", None, &cancel).await?;
//!
//! // Subsequent calls inside the window return the same URL
//! let again = links.get_link("packs/alpha.zip", None, &cancel).await?;
//! ```

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::instrument;
use vybe_backend::{CreateDownload, DownloadRepository, ObjectStorage};
use vybe_types::{Asset, MediaType};

use crate::clock::Clock;
use crate::entitlement::Grant;
use crate::error::Requirement;
use crate::metrics;
use crate::timeout::remote_call;
use crate::{AccessError, AccessResult};

/// Configuration for the link cache.
#[derive(Debug, Clone)]
pub struct LinkCacheConfig {
    /// Validity requested for every signed link.
    /// Default: 180 seconds
    pub ttl: Duration,

    /// How long before literal expiry a link stops being reused.
    /// Default: 10 seconds
    pub safety_margin: Duration,

    /// Budget for one signing request.
    /// Default: 60 seconds
    pub timeout: Duration,

    /// Budget for the download audit insert.
    /// Default: 12 seconds
    pub audit_timeout: Duration,
}

impl Default for LinkCacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(180),
            safety_margin: Duration::from_secs(10),
            timeout: Duration::from_secs(60),
            audit_timeout: Duration::from_secs(12),
        }
    }
}

impl LinkCacheConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the link validity and reuse margin.
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration, safety_margin: Duration) -> Self {
        self.ttl = ttl;
        self.safety_margin = safety_margin;
        self
    }

    /// Set the signing request budget.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the audit insert budget.
    #[must_use]
    pub fn with_audit_timeout(mut self, timeout: Duration) -> Self {
        self.audit_timeout = timeout;
        self
    }

    /// How long a freshly issued link may be reused
    fn reuse_window(&self) -> Duration {
        self.ttl.saturating_sub(self.safety_margin)
    }
}

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
struct LinkKey {
    path: String,
    download_name: Option<String>,
}

/// A cached signed link
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedLink {
    pub url: String,
    /// Reuse deadline (issue time + validity - margin)
    pub reusable_until: DateTime<Utc>,
}

impl SignedLink {
    fn is_reusable_at(&self, now: DateTime<Utc>) -> bool {
        now < self.reusable_until
    }
}

/// An inline preview link
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preview {
    pub url: String,
    pub media_type: MediaType,
}

/// A forced-download link
///
/// `audit` is the background insert of the download record, present when the
/// grant carried an identity. The URL is usable before it completes.
#[derive(Debug)]
pub struct DownloadLink {
    pub url: String,
    pub audit: Option<JoinHandle<()>>,
}

/// Signed link cache
#[derive(Clone)]
pub struct LinkCache {
    storage: Arc<dyn ObjectStorage>,
    downloads: Arc<dyn DownloadRepository>,
    clock: Arc<dyn Clock>,
    links: Arc<DashMap<LinkKey, SignedLink>>,
    config: LinkCacheConfig,
}

impl std::fmt::Debug for LinkCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkCache")
            .field("config", &self.config)
            .field("entries", &self.links.len())
            .finish_non_exhaustive()
    }
}

impl LinkCache {
    pub fn new(
        storage: Arc<dyn ObjectStorage>,
        downloads: Arc<dyn DownloadRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self::with_config(storage, downloads, clock, LinkCacheConfig::default())
    }

    pub fn with_config(
        storage: Arc<dyn ObjectStorage>,
        downloads: Arc<dyn DownloadRepository>,
        clock: Arc<dyn Clock>,
        config: LinkCacheConfig,
    ) -> Self {
        Self {
            storage,
            downloads,
            clock,
            links: Arc::new(DashMap::new()),
            config,
        }
    }

    pub fn config(&self) -> &LinkCacheConfig {
        &self.config
    }

    /// Number of cached links, stale ones included
    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Drop every cached link. Called on sign-out.
    pub fn invalidate_all(&self) {
        self.links.clear();
    }

    /// Drop links past their reuse deadline
    pub fn purge_expired(&self) {
        let now = self.clock.now();
        self.links.retain(|_, link| link.is_reusable_at(now));
    }

    /// Signed URL for `path`, reusing a cached one while it is still safe.
    ///
    /// Failures are not retried.
    #[instrument(skip(self, cancel), level = "debug")]
    pub async fn get_link(
        &self,
        path: &str,
        download_name: Option<&str>,
        cancel: &CancellationToken,
    ) -> AccessResult<String> {
        let key = LinkKey {
            path: path.to_string(),
            download_name: download_name.map(str::to_string),
        };

        let now = self.clock.now();
        if let Some(cached) = self.links.get(&key) {
            if cached.is_reusable_at(now) {
                tracing::trace!("signed link cache hit");
                metrics::record_link_lookup(true);
                return Ok(cached.url.clone());
            }
        }

        metrics::record_link_lookup(false);

        let url = remote_call("sign link", self.config.timeout, cancel, async {
            self.storage
                .create_signed_url(path, self.config.ttl, download_name)
                .await
        })
        .await
        .map_err(|e| AccessError::LinkIssuance(e.to_string()))?
        .map_err(|e| AccessError::LinkIssuance(e.to_string()))?
        .ok_or_else(|| AccessError::LinkIssuance(format!("no signed URL returned for {path}")))?;

        // Deadline counts from the request start, not its completion
        let window = chrono::Duration::from_std(self.config.reuse_window())
            .unwrap_or(chrono::Duration::zero());
        self.links.insert(
            key,
            SignedLink {
                url: url.clone(),
                reusable_until: now + window,
            },
        );

        Ok(url)
    }

    /// Inline preview link for `asset`. Previews are not tier-gated.
    pub async fn preview(&self, asset: &Asset, cancel: &CancellationToken) -> AccessResult<Preview> {
        let url = self.get_link(&asset.storage_object_path, None, cancel).await?;
        Ok(Preview {
            url,
            media_type: asset.media_type(),
        })
    }

    /// Forced-download link for `asset`, named after the stored file.
    ///
    /// When the grant carries an identity one audit record is written in the
    /// background. A slow or failed audit write is logged and never holds up
    /// or fails the download.
    #[instrument(skip_all, fields(asset_id = %asset.id))]
    pub async fn download(
        &self,
        asset: &Asset,
        grant: &Grant,
        cancel: &CancellationToken,
    ) -> AccessResult<DownloadLink> {
        if !grant.can_access(asset) {
            return Err(AccessError::NotEntitled {
                required: Requirement::Tier(asset.required_tier),
            });
        }

        let url = self
            .get_link(
                &asset.storage_object_path,
                Some(asset.download_file_name()),
                cancel,
            )
            .await?;

        let audit = grant.user_id.map(|user_id| {
            let record = CreateDownload {
                user_id,
                asset_id: asset.id,
            };
            self.spawn_audit(record, cancel.child_token())
        });

        Ok(DownloadLink { url, audit })
    }

    fn spawn_audit(&self, record: CreateDownload, cancel: CancellationToken) -> JoinHandle<()> {
        let downloads = Arc::clone(&self.downloads);
        let budget = self.config.audit_timeout;
        let user_id = record.user_id;

        tokio::spawn(async move {
            let outcome = remote_call("download audit", budget, &cancel, async {
                downloads.record(record).await
            })
            .await;

            match outcome {
                Ok(Ok(())) => tracing::debug!(%user_id, "download recorded"),
                Ok(Err(e)) => tracing::warn!(%user_id, error = %e, "failed to record download"),
                Err(e) => tracing::warn!(%user_id, error = %e, "download audit abandoned"),
            }
        })
    }
}
