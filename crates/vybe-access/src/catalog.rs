//! Catalog filtering
//!
//! Pure functions over the loaded asset list: free-text search, tag filter,
//! the tag choices offered to the user and the result status line.

use std::collections::HashSet;

use vybe_types::Asset;

use crate::entitlement::Grant;

/// Tag filter value that matches every asset
pub const ALL_TAGS: &str = "all";

/// Active tag filter
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TagFilter {
    #[default]
    All,
    /// Exact, case-insensitive tag match
    Tag(String),
}

impl TagFilter {
    /// Parse a filter value; blank or `all` (any case) means no filter
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.is_empty() || raw.eq_ignore_ascii_case(ALL_TAGS) {
            Self::All
        } else {
            Self::Tag(raw.to_lowercase())
        }
    }

    pub fn matches(&self, asset: &Asset) -> bool {
        match self {
            Self::All => true,
            Self::Tag(tag) => asset.has_tag(tag),
        }
    }
}

impl std::fmt::Display for TagFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::All => f.write_str(ALL_TAGS),
            Self::Tag(tag) => f.write_str(tag),
        }
    }
}

/// One catalog row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub asset: Asset,
    /// The current grant does not cover this asset's tier
    pub locked: bool,
}

fn matches_search(asset: &Asset, needle: &str) -> bool {
    if needle.is_empty() {
        return true;
    }
    asset.title.to_lowercase().contains(needle)
        || asset
            .description
            .as_deref()
            .is_some_and(|d| d.to_lowercase().contains(needle))
        || asset.tags.iter().any(|t| t.to_lowercase().contains(needle))
}

/// Assets matching both the search text and the tag filter, order preserved
pub fn filter_assets<'a>(assets: &'a [Asset], search: &str, tag: &TagFilter) -> Vec<&'a Asset> {
    let needle = search.trim().to_lowercase();
    assets
        .iter()
        .filter(|asset| tag.matches(asset) && matches_search(asset, &needle))
        .collect()
}

/// Filtered assets with a per-asset lock flag for `grant`
pub fn catalog_entries(
    assets: &[Asset],
    search: &str,
    tag: &TagFilter,
    grant: &Grant,
) -> Vec<CatalogEntry> {
    filter_assets(assets, search, tag)
        .into_iter()
        .map(|asset| CatalogEntry {
            asset: asset.clone(),
            locked: !grant.can_access(asset),
        })
        .collect()
}

/// `all` followed by every distinct lowercase tag, in first-seen order
pub fn available_tags(assets: &[Asset]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut tags = vec![ALL_TAGS.to_string()];
    for tag in assets.iter().flat_map(|a| a.tags.iter()) {
        let tag = tag.trim().to_lowercase();
        if !tag.is_empty() && tag != ALL_TAGS && seen.insert(tag.clone()) {
            tags.push(tag);
        }
    }
    tags
}

/// Result count line shown above the catalog
pub fn status_line(count: usize) -> String {
    if count == 0 {
        "No assets found.".to_string()
    } else {
        format!("{count} asset(s)")
    }
}
