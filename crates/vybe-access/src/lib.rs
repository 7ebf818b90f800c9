//! Vybe Access - Entitlement and resource access logic
//!
//! Decides who is signed in, what tier they hold and whether they are an
//! admin, and hands out signed links to the assets they may use.
//!
//! Remote calls go through the collaborator traits in `vybe-backend` and are
//! always bounded by a timeout; slow or failing lookups degrade to the local
//! snapshot instead of blocking.

pub mod catalog;
pub mod clock;
pub mod config;
pub mod entitlement;
pub mod error;
pub mod links;
pub mod metrics;
pub mod retry;
pub mod service;
pub mod session;
pub mod snapshot;
pub mod timeout;
pub mod upload;

pub use catalog::{available_tags, catalog_entries, filter_assets, status_line, CatalogEntry, TagFilter};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AccessConfig, ConfigError};
pub use entitlement::{can_access, AdminSource, EntitlementEvaluator, Evaluation, Grant};
pub use error::*;
pub use links::{DownloadLink, LinkCache, LinkCacheConfig, Preview, SignedLink};
pub use retry::{RetryConfig, RetryableError};
pub use service::{AccessController, AccessState, CatalogView};
pub use session::{ResolvedSession, RetryOutcome, SessionResolver, SessionSource};
pub use snapshot::{FileSnapshotStore, LocalSnapshot, MemorySnapshotStore, SnapshotStore};
pub use timeout::{remote_call, with_timeout, Interrupted};
pub use upload::{UploadFile, UploadForm, UploadPhase, UploadReceipt, Uploader};
