//! Entitlement evaluation
//!
//! Maps an identity to its tier and admin flag, and decides per asset whether
//! the current grant may download it.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::instrument;
use vybe_backend::{AdminRepository, EntitlementRepository, EntitlementRow};
use vybe_types::{Asset, Entitlement, EntitlementStatus, Identity, Tier, UserId};

use crate::clock::Clock;
use crate::metrics;
use crate::snapshot::{AdminBinding, LocalSnapshot, SnapshotStore};
use crate::timeout::remote_call;

/// Who is asking, and with what access
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Grant {
    pub user_id: Option<UserId>,
    pub tier: Option<Tier>,
    pub is_admin: bool,
}

impl Grant {
    /// Signed-out visitor
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Whether this grant may download `asset`
    pub fn can_access(&self, asset: &Asset) -> bool {
        can_access(asset.required_tier, self.tier, self.is_admin)
    }

    /// Whether `asset` shows up in the catalog at all
    pub fn can_see(&self, asset: &Asset) -> bool {
        self.is_admin || asset.is_published
    }
}

/// Admins see everything; everyone else needs a tier of at least `required`.
pub fn can_access(required: Tier, tier: Option<Tier>, is_admin: bool) -> bool {
    is_admin || tier.is_some_and(|tier| tier.covers(required))
}

/// Where the admin flag came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminSource {
    /// Nobody signed in
    Anonymous,
    /// Matched the configured privileged identity
    Configured,
    /// Fresh answer from the admin membership query
    Remote,
    /// Query failed; value taken from the snapshot for the same person
    Cached,
    /// Query failed and nothing was cached for this person
    Default,
}

/// Result of evaluating one identity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Evaluation {
    pub tier: Option<Tier>,
    pub is_admin: bool,
    pub admin_source: AdminSource,
}

impl Evaluation {
    pub fn anonymous() -> Self {
        Self {
            tier: None,
            is_admin: false,
            admin_source: AdminSource::Anonymous,
        }
    }
}

/// Entitlement evaluator
#[derive(Clone)]
pub struct EntitlementEvaluator {
    entitlements: Arc<dyn EntitlementRepository>,
    admins: Arc<dyn AdminRepository>,
    snapshots: Arc<dyn SnapshotStore>,
    clock: Arc<dyn Clock>,
    admin_user_id: Option<UserId>,
    query_timeout: Duration,
    admin_timeout: Duration,
}

impl EntitlementEvaluator {
    pub fn new(
        entitlements: Arc<dyn EntitlementRepository>,
        admins: Arc<dyn AdminRepository>,
        snapshots: Arc<dyn SnapshotStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            entitlements,
            admins,
            snapshots,
            clock,
            admin_user_id: None,
            query_timeout: Duration::from_secs(12),
            admin_timeout: Duration::from_secs(12),
        }
    }

    /// Treat `admin` as admin without asking the backend
    pub fn with_admin_user_id(mut self, admin: Option<UserId>) -> Self {
        self.admin_user_id = admin;
        self
    }

    pub fn with_timeouts(mut self, query: Duration, admin: Duration) -> Self {
        self.query_timeout = query;
        self.admin_timeout = admin;
        self
    }

    /// Tier and admin flag for `identity`. Never fails: lookups that cannot
    /// complete degrade to "no tier" and the cached admin flag.
    #[instrument(skip_all, fields(user_id = ?identity.map(|i| i.id)))]
    pub async fn evaluate(
        &self,
        identity: Option<&Identity>,
        cancel: &CancellationToken,
    ) -> Evaluation {
        let Some(identity) = identity else {
            return Evaluation::anonymous();
        };

        let (tier, (is_admin, admin_source)) = tokio::join!(
            self.tier_for(identity, cancel),
            self.admin_status(identity, cancel)
        );

        tracing::debug!(?tier, is_admin, ?admin_source, "evaluated entitlements");
        Evaluation {
            tier,
            is_admin,
            admin_source,
        }
    }

    /// Current tier, or `None` when absent, invalid, or unknown
    pub async fn tier_for(&self, identity: &Identity, cancel: &CancellationToken) -> Option<Tier> {
        let outcome = remote_call("tier query", self.query_timeout, cancel, async {
            self.entitlements.find_by_user(&identity.id).await
        })
        .await;

        match outcome {
            Ok(Ok(Some(row))) => self.effective_tier(identity.id, &row),
            Ok(Ok(None)) => None,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "tier query failed");
                None
            }
            Err(_) => None,
        }
    }

    fn effective_tier(&self, user_id: UserId, row: &EntitlementRow) -> Option<Tier> {
        let tier = match row.plan.parse::<Tier>() {
            Ok(tier) => tier,
            Err(e) => {
                tracing::warn!(plan = %row.plan, error = %e, "ignoring entitlement with unknown plan");
                return None;
            }
        };

        let entitlement = Entitlement {
            user_id,
            tier,
            status: EntitlementStatus::from_raw(&row.status),
            current_period_end: row.current_period_end,
        };
        entitlement.effective_tier(self.clock.now())
    }

    /// Admin flag with its source.
    ///
    /// A failed or timed-out query is not "not admin": it falls back to the
    /// snapshot flag for the same person, and only then to `false`.
    pub async fn admin_status(
        &self,
        identity: &Identity,
        cancel: &CancellationToken,
    ) -> (bool, AdminSource) {
        if self.admin_user_id == Some(identity.id) {
            self.remember_admin(identity, true);
            return (true, AdminSource::Configured);
        }

        let outcome = remote_call("admin check", self.admin_timeout, cancel, async {
            self.admins.find_admin(&identity.id).await
        })
        .await;

        match outcome {
            Ok(Ok(found)) => {
                let is_admin = found.is_some();
                self.remember_admin(identity, is_admin);
                (is_admin, AdminSource::Remote)
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "admin check failed");
                self.cached_admin(identity)
            }
            Err(_) => self.cached_admin(identity),
        }
    }

    fn cached_admin(&self, identity: &Identity) -> (bool, AdminSource) {
        match self.snapshots.load().and_then(|s| s.admin_for(identity)) {
            Some(is_admin) => {
                metrics::record_fallback("admin");
                tracing::info!(is_admin, "using cached admin flag");
                (is_admin, AdminSource::Cached)
            }
            None => (false, AdminSource::Default),
        }
    }

    fn remember_admin(&self, identity: &Identity, is_admin: bool) {
        let binding = AdminBinding {
            user_id: identity.id,
            email: identity.email.clone(),
            is_admin,
        };
        self.snapshots.update(self.clock.now(), &|snapshot: &mut LocalSnapshot| {
            snapshot.admin = Some(binding.clone());
        });
    }
}

impl std::fmt::Debug for EntitlementEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntitlementEvaluator")
            .field("admin_user_id", &self.admin_user_id)
            .field("query_timeout", &self.query_timeout)
            .field("admin_timeout", &self.admin_timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_can_access_by_rank() {
        assert!(can_access(Tier::Creator, Some(Tier::CreatorPlusPlus), false));
        assert!(can_access(Tier::CreatorPlus, Some(Tier::CreatorPlus), false));
        assert!(!can_access(Tier::CreatorPlusPlus, Some(Tier::CreatorPlus), false));
        assert!(!can_access(Tier::Creator, None, false));
    }

    #[test]
    fn test_admin_bypasses_tier() {
        for required in Tier::ALL {
            assert!(can_access(required, None, true));
        }
    }

    #[test]
    fn test_grant_visibility() {
        let asset = Asset {
            id: vybe_types::AssetId::new(),
            title: "Draft".to_string(),
            description: None,
            required_tier: Tier::Creator,
            tags: Vec::new(),
            storage_object_path: "draft.zip".to_string(),
            is_published: false,
            created_at: chrono::Utc::now(),
        };

        let member = Grant {
            user_id: Some(UserId::new()),
            tier: Some(Tier::CreatorPlusPlus),
            is_admin: false,
        };
        assert!(!member.can_see(&asset));
        assert!(member.can_access(&asset));

        let admin = Grant {
            is_admin: true,
            ..Grant::anonymous()
        };
        assert!(admin.can_see(&asset));
    }
}
