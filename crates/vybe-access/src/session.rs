//! Session resolution
//!
//! Finds out who is signed in, with a bounded wait. When the identity
//! service is slow or unreachable the last cached identity is used instead
//! and a background re-check is scheduled.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::instrument;
use vybe_backend::{AuthEvent, AuthSession, BackendError, IdentityProvider, OAuthProvider};
use vybe_types::Identity;

use crate::clock::Clock;
use crate::metrics;
use crate::retry::{with_retry, RetryConfig, RetryableError};
use crate::snapshot::{LocalSnapshot, SnapshotStore};
use crate::timeout::{remote_call, Interrupted};
use crate::{AccessError, AccessResult};

/// Where a resolved identity came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionSource {
    /// Fresh answer from the identity service
    Remote,
    /// Identity service did not answer in time; last cached identity
    Cache,
}

/// Outcome of the background re-check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryOutcome {
    /// The identity service answered
    Resolved(Option<Identity>),
    /// Every attempt failed, or the owner shut down
    GaveUp,
}

/// Result of [`SessionResolver::resolve`]
#[derive(Debug)]
pub struct ResolvedSession {
    pub identity: Option<Identity>,
    pub source: SessionSource,
    /// Background re-check, present only when `source` is `Cache`
    pub retry: Option<JoinHandle<RetryOutcome>>,
}

#[derive(Debug, Error)]
enum LookupError {
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Interrupted(#[from] Interrupted),
}

impl RetryableError for LookupError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Backend(e) => e.is_retryable(),
            Self::Interrupted(i) => i.is_retryable(),
        }
    }
}

/// Session resolver
#[derive(Clone)]
pub struct SessionResolver {
    identity: Arc<dyn IdentityProvider>,
    snapshots: Arc<dyn SnapshotStore>,
    clock: Arc<dyn Clock>,
    provider: OAuthProvider,
    timeout: Duration,
    retry: RetryConfig,
}

impl SessionResolver {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        snapshots: Arc<dyn SnapshotStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            identity,
            snapshots,
            clock,
            provider: OAuthProvider::Discord,
            timeout: Duration::from_secs(16),
            retry: RetryConfig::default(),
        }
    }

    pub fn with_provider(mut self, provider: OAuthProvider) -> Self {
        self.provider = provider;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// OAuth provider used by [`Self::sign_in`]
    pub fn provider(&self) -> OAuthProvider {
        self.provider
    }

    /// Cached identity for rendering before the backend answers
    pub fn provisional(&self) -> Option<Identity> {
        self.snapshots.load().and_then(|s| s.identity)
    }

    /// Auth state change notifications
    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.identity.subscribe()
    }

    /// Resolve the current identity.
    ///
    /// Never fails. A timeout or transport failure yields the cached
    /// identity plus a background re-check; an API error means the service
    /// answered and is treated as signed out.
    #[instrument(skip_all)]
    pub async fn resolve(&self, cancel: &CancellationToken) -> ResolvedSession {
        match lookup(self.identity.as_ref(), self.timeout, cancel).await {
            Ok(session) => {
                let identity = self.accept(session);
                ResolvedSession {
                    identity,
                    source: SessionSource::Remote,
                    retry: None,
                }
            }
            Err(LookupError::Backend(e)) if !e.is_retryable() => {
                tracing::warn!(error = %e, "session lookup rejected");
                ResolvedSession {
                    identity: None,
                    source: SessionSource::Remote,
                    retry: None,
                }
            }
            Err(e) => {
                let identity = self.provisional();
                metrics::record_fallback("session");
                tracing::info!(
                    error = %e,
                    cached = identity.is_some(),
                    "session lookup unavailable, using cached identity"
                );
                let retry = match e {
                    LookupError::Interrupted(Interrupted::Cancelled { .. }) => None,
                    _ => Some(self.spawn_retry(cancel.child_token())),
                };
                ResolvedSession {
                    identity,
                    source: SessionSource::Cache,
                    retry,
                }
            }
        }
    }

    /// Record a session pushed by the identity service and return its identity
    pub fn accept(&self, session: Option<AuthSession>) -> Option<Identity> {
        let identity = session.map(|s| s.user.to_identity());
        remember_identity(self.snapshots.as_ref(), self.clock.as_ref(), identity.as_ref());
        identity
    }

    fn spawn_retry(&self, cancel: CancellationToken) -> JoinHandle<RetryOutcome> {
        let identity = Arc::clone(&self.identity);
        let snapshots = Arc::clone(&self.snapshots);
        let clock = Arc::clone(&self.clock);
        let timeout = self.timeout;
        let retry = self.retry.clone();

        tokio::spawn(async move {
            let result = with_retry(retry, || lookup(identity.as_ref(), timeout, &cancel)).await;
            match result {
                Ok(session) => {
                    let resolved = session.map(|s| s.user.to_identity());
                    remember_identity(snapshots.as_ref(), clock.as_ref(), resolved.as_ref());
                    tracing::info!(signed_in = resolved.is_some(), "background session check succeeded");
                    RetryOutcome::Resolved(resolved)
                }
                Err(e) => {
                    tracing::warn!(error = %e, "background session check gave up");
                    RetryOutcome::GaveUp
                }
            }
        })
    }

    /// Start the OAuth redirect flow
    #[instrument(skip(self, cancel))]
    pub async fn sign_in(&self, redirect_url: &str, cancel: &CancellationToken) -> AccessResult<()> {
        remote_call("sign in", self.timeout, cancel, async {
            self.identity
                .sign_in_with_provider(self.provider, redirect_url)
                .await
        })
        .await?
        .map_err(|e| {
            tracing::error!(provider = %self.provider, error = %e, "sign in failed");
            AccessError::Auth(e.to_string())
        })
    }

    /// Sign out and forget the cached identity
    #[instrument(skip_all)]
    pub async fn sign_out(&self, cancel: &CancellationToken) -> AccessResult<()> {
        remote_call("sign out", self.timeout, cancel, self.identity.sign_out())
            .await?
            .map_err(|e| {
                tracing::error!(error = %e, "sign out failed");
                AccessError::Auth(e.to_string())
            })?;
        self.snapshots.clear();
        Ok(())
    }
}

impl std::fmt::Debug for SessionResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionResolver")
            .field("provider", &self.provider)
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

async fn lookup(
    identity: &dyn IdentityProvider,
    budget: Duration,
    cancel: &CancellationToken,
) -> Result<Option<AuthSession>, LookupError> {
    Ok(remote_call("auth session", budget, cancel, identity.get_session()).await??)
}

fn remember_identity(snapshots: &dyn SnapshotStore, clock: &dyn Clock, identity: Option<&Identity>) {
    snapshots.update(clock.now(), &|snapshot: &mut LocalSnapshot| {
        snapshot.identity = identity.cloned();
    });
}
