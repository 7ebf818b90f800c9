//! Test data builders

#![allow(dead_code)]

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use vybe_backend::{AuthUser, EntitlementRow};
use vybe_types::{Asset, AssetId, Tier, UserId, UserMetadata};

pub fn user(name: &str, email: &str) -> AuthUser {
    AuthUser {
        id: UserId::new(),
        email: Some(email.to_string()),
        user_metadata: UserMetadata {
            full_name: Some(name.to_string()),
            ..Default::default()
        },
    }
}

pub fn entitlement(tier: Tier, status: &str, period_end: Option<DateTime<Utc>>) -> EntitlementRow {
    EntitlementRow {
        plan: tier.as_str().to_string(),
        status: status.to_string(),
        current_period_end: period_end,
    }
}

/// Active entitlement ending a month from `now`
pub fn active(tier: Tier, now: DateTime<Utc>) -> EntitlementRow {
    entitlement(tier, "active", Some(now + ChronoDuration::days(30)))
}

pub fn asset(title: &str, tier: Tier, tags: &[&str], published: bool) -> Asset {
    Asset {
        id: AssetId::new(),
        title: title.to_string(),
        description: None,
        required_tier: tier,
        tags: tags.iter().map(|t| t.to_string()).collect(),
        storage_object_path: format!("{}.zip", title.to_lowercase().replace(' ', "-")),
        is_published: published,
        created_at: Utc::now(),
    }
}

/// "Alpha Pack" [drum, loop] for Creator+, "Beta Kit" [vocal] for
/// Creator++, and an unpublished draft
pub fn sample_catalog() -> Vec<Asset> {
    vec![
        asset("Alpha Pack", Tier::CreatorPlus, &["drum", "loop"], true),
        asset("Beta Kit", Tier::CreatorPlusPlus, &["vocal"], true),
        asset("Draft Sketch", Tier::Creator, &["wip"], false),
    ]
}
