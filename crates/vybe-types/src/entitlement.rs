//! Entitlement types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Tier, UserId};

/// Billing status of an entitlement record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntitlementStatus {
    Active,
    Trialing,
    /// Any status that does not grant access (canceled, past_due, ...)
    #[serde(other)]
    Other,
}

impl EntitlementStatus {
    /// Parse a raw status string; unknown values map to [`Self::Other`]
    pub fn from_raw(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "active" => Self::Active,
            "trialing" => Self::Trialing,
            _ => Self::Other,
        }
    }

    /// Whether this status grants access
    pub const fn grants_access(&self) -> bool {
        matches!(self, Self::Active | Self::Trialing)
    }
}

/// A record asserting a user holds a tier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entitlement {
    pub user_id: UserId,
    pub tier: Tier,
    pub status: EntitlementStatus,
    /// End of the paid period; `None` means open-ended
    pub current_period_end: Option<DateTime<Utc>>,
}

impl Entitlement {
    /// Valid iff the status grants access and the period has not ended
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.status.grants_access() && self.current_period_end.map_or(true, |end| end > now)
    }

    /// The tier this entitlement grants at `now`, if any
    pub fn effective_tier(&self, now: DateTime<Utc>) -> Option<Tier> {
        self.is_valid_at(now).then_some(self.tier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn entitlement(status: EntitlementStatus, end: Option<DateTime<Utc>>) -> Entitlement {
        Entitlement {
            user_id: UserId::new(),
            tier: Tier::CreatorPlus,
            status,
            current_period_end: end,
        }
    }

    #[test]
    fn test_active_open_ended_is_valid() {
        let now = Utc::now();
        assert_eq!(
            entitlement(EntitlementStatus::Active, None).effective_tier(now),
            Some(Tier::CreatorPlus)
        );
    }

    #[test]
    fn test_trialing_within_period_is_valid() {
        let now = Utc::now();
        let e = entitlement(EntitlementStatus::Trialing, Some(now + Duration::days(3)));
        assert!(e.is_valid_at(now));
    }

    #[test]
    fn test_expired_period_is_invalid() {
        let now = Utc::now();
        let e = entitlement(EntitlementStatus::Active, Some(now - Duration::seconds(1)));
        assert_eq!(e.effective_tier(now), None);

        // Ending exactly now is already expired
        let e = entitlement(EntitlementStatus::Active, Some(now));
        assert!(!e.is_valid_at(now));
    }

    #[test]
    fn test_other_status_is_invalid() {
        let now = Utc::now();
        assert!(!entitlement(EntitlementStatus::Other, None).is_valid_at(now));
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!(EntitlementStatus::from_raw("ACTIVE"), EntitlementStatus::Active);
        assert_eq!(EntitlementStatus::from_raw("trialing"), EntitlementStatus::Trialing);
        assert_eq!(EntitlementStatus::from_raw("past_due"), EntitlementStatus::Other);
        let parsed: EntitlementStatus = serde_json::from_str("\"canceled\"").unwrap();
        assert_eq!(parsed, EntitlementStatus::Other);
    }
}
