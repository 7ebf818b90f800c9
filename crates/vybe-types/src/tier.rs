//! Access tier types

use serde::{Deserialize, Serialize};

/// Purchased access tiers, lowest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Entry tier
    Creator,
    /// Mid tier
    CreatorPlus,
    /// Top tier
    CreatorPlusPlus,
}

impl Tier {
    /// All tiers in ascending rank order
    pub const ALL: [Tier; 3] = [Self::Creator, Self::CreatorPlus, Self::CreatorPlusPlus];

    /// Numeric rank used for comparisons (1-based)
    pub const fn rank(&self) -> u8 {
        match self {
            Self::Creator => 1,
            Self::CreatorPlus => 2,
            Self::CreatorPlusPlus => 3,
        }
    }

    /// Wire name as stored in entitlement and asset records
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Creator => "creator",
            Self::CreatorPlus => "creator_plus",
            Self::CreatorPlusPlus => "creator_plus_plus",
        }
    }

    /// Human-facing name
    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::Creator => "Creator",
            Self::CreatorPlus => "Creator+",
            Self::CreatorPlusPlus => "Creator++",
        }
    }

    /// Whether this tier covers everything `required` grants
    pub const fn covers(&self, required: Tier) -> bool {
        self.rank() >= required.rank()
    }
}

impl PartialOrd for Tier {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Tier {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Tier {
    type Err = TierParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "creator" => Ok(Self::Creator),
            "creator_plus" => Ok(Self::CreatorPlus),
            "creator_plus_plus" => Ok(Self::CreatorPlusPlus),
            _ => Err(TierParseError(s.to_string())),
        }
    }
}

/// Error parsing a tier string
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid tier: {0}")]
pub struct TierParseError(pub String);
