//! Asset upload
//!
//! Admin-only: validates the form locally, stores the file without
//! overwriting, then inserts the catalog row. Only one submission runs at a
//! time; progress is published on a watch channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::instrument;
use vybe_backend::{AssetRepository, CreateAsset, ObjectStorage, UploadOptions};
use vybe_types::Tier;

use crate::clock::Clock;
use crate::entitlement::Grant;
use crate::error::Requirement;
use crate::timeout::remote_call;
use crate::{AccessError, AccessResult};

/// Longest slug base taken from a title
pub const MAX_SLUG_LEN: usize = 64;

/// The selected file
#[derive(Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    /// Lowercase extension including the dot, or empty
    pub fn extension(&self) -> String {
        self.name
            .rfind('.')
            .map(|idx| self.name[idx..].to_lowercase())
            .unwrap_or_default()
    }
}

impl std::fmt::Debug for UploadFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadFile")
            .field("name", &self.name)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Upload form input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadForm {
    pub title: String,
    pub description: Option<String>,
    pub required_tier: Tier,
    /// Comma-separated tags
    pub tags: String,
    pub file: Option<UploadFile>,
}

impl Default for UploadForm {
    fn default() -> Self {
        Self {
            title: String::new(),
            description: None,
            required_tier: Tier::Creator,
            tags: String::new(),
            file: None,
        }
    }
}

impl UploadForm {
    /// Validate and derive the slug, object path and row.
    ///
    /// `now` provides the millisecond suffix that keeps slugs unique.
    pub fn prepare(self, now: DateTime<Utc>) -> AccessResult<PreparedUpload> {
        let title = self.title.trim().to_string();
        let file = match self.file {
            Some(file) if !title.is_empty() => file,
            _ => {
                return Err(AccessError::Validation(
                    "Title and file are required.".to_string(),
                ))
            }
        };

        let millis = now.timestamp_millis();
        let base = match to_slug(&title) {
            base if base.is_empty() => format!("asset-{millis}"),
            base => base,
        };
        let slug = format!("{base}-{millis}");
        let object_path = format!("{slug}{}", file.extension());

        let description = self
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());

        let record = CreateAsset {
            slug,
            title,
            description,
            required_tier: self.required_tier,
            tags: parse_tags(&self.tags),
            storage_object_path: object_path,
            is_published: true,
        };

        Ok(PreparedUpload {
            record,
            bytes: file.bytes,
        })
    }
}

/// A validated upload ready to send
#[derive(Clone, PartialEq, Eq)]
pub struct PreparedUpload {
    pub record: CreateAsset,
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for PreparedUpload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreparedUpload")
            .field("record", &self.record)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Lowercase, non-alphanumeric runs collapsed to `-`, trimmed, capped
pub fn to_slug(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_dash = false;
    for c in title.trim().to_lowercase().chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else {
            pending_dash = true;
        }
    }
    slug.truncate(MAX_SLUG_LEN);
    slug.trim_end_matches('-').to_string()
}

/// Split on commas, trim, lowercase, drop empties, dedupe in first-seen order
pub fn parse_tags(text: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for tag in text.split(',').map(|t| t.trim().to_lowercase()) {
        if !tag.is_empty() && !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    tags
}

/// Submission progress
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum UploadPhase {
    #[default]
    Idle,
    Validating,
    Uploading,
    Recording,
    Done { slug: String },
    Failed { message: String },
}

/// What a successful submission created
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    pub slug: String,
    pub storage_object_path: String,
}

struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Asset uploader
pub struct Uploader {
    assets: Arc<dyn AssetRepository>,
    storage: Arc<dyn ObjectStorage>,
    clock: Arc<dyn Clock>,
    busy: AtomicBool,
    phase: watch::Sender<UploadPhase>,
    storage_timeout: Duration,
    query_timeout: Duration,
}

impl Uploader {
    pub fn new(
        assets: Arc<dyn AssetRepository>,
        storage: Arc<dyn ObjectStorage>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (phase, _) = watch::channel(UploadPhase::Idle);
        Self {
            assets,
            storage,
            clock,
            busy: AtomicBool::new(false),
            phase,
            storage_timeout: Duration::from_secs(60),
            query_timeout: Duration::from_secs(12),
        }
    }

    pub fn with_timeouts(mut self, storage: Duration, query: Duration) -> Self {
        self.storage_timeout = storage;
        self.query_timeout = query;
        self
    }

    /// Whether a submission is running
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Progress updates
    pub fn subscribe(&self) -> watch::Receiver<UploadPhase> {
        self.phase.subscribe()
    }

    pub fn phase(&self) -> UploadPhase {
        self.phase.borrow().clone()
    }

    fn set_phase(&self, phase: UploadPhase) {
        self.phase.send_replace(phase);
    }

    /// Validate, store and record one asset
    #[instrument(skip_all, fields(title = %form.title))]
    pub async fn submit(
        &self,
        form: UploadForm,
        grant: &Grant,
        cancel: &CancellationToken,
    ) -> AccessResult<UploadReceipt> {
        let Some(_busy) = BusyGuard::acquire(&self.busy) else {
            return Err(AccessError::Busy);
        };

        let result = self.run(form, grant, cancel).await;
        match &result {
            Ok(receipt) => {
                tracing::info!(slug = %receipt.slug, "asset uploaded");
                self.set_phase(UploadPhase::Done {
                    slug: receipt.slug.clone(),
                });
            }
            Err(e) => {
                tracing::warn!(error = %e, code = e.error_code(), "upload failed");
                self.set_phase(UploadPhase::Failed {
                    message: e.to_string(),
                });
            }
        }
        result
    }

    async fn run(
        &self,
        form: UploadForm,
        grant: &Grant,
        cancel: &CancellationToken,
    ) -> AccessResult<UploadReceipt> {
        self.set_phase(UploadPhase::Validating);
        if !grant.is_admin {
            return Err(AccessError::NotEntitled {
                required: Requirement::Admin,
            });
        }
        let PreparedUpload { record, bytes } = form.prepare(self.clock.now())?;
        let path = record.storage_object_path.clone();

        self.set_phase(UploadPhase::Uploading);
        remote_call("upload object", self.storage_timeout, cancel, async {
            self.storage
                .upload_object(&path, bytes, UploadOptions { overwrite: false })
                .await
        })
        .await?
        .map_err(|e| AccessError::Storage(format!("Upload failed: {e}")))?;

        self.set_phase(UploadPhase::Recording);
        let slug = record.slug.clone();
        remote_call("create asset", self.query_timeout, cancel, async {
            self.assets.create(record).await
        })
        .await?
        .map_err(|e| AccessError::Query(format!("Saved file but failed to create asset row: {e}")))?;

        Ok(UploadReceipt {
            slug,
            storage_object_path: path,
        })
    }
}

impl std::fmt::Debug for Uploader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Uploader")
            .field("busy", &self.is_busy())
            .field("phase", &*self.phase.borrow())
            .finish_non_exhaustive()
    }
}
