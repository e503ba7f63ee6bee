//! Normalized listing records and the aggregate result of one keyword search.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Marketplace a listing was acquired from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Shopee,
    Ruten,
    Yahoo,
}

impl Platform {
    /// Lowercase tag used in listing identifiers.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Shopee => "shopee",
            Self::Ruten => "ruten",
            Self::Yahoo => "yahoo",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "shopee" => Ok(Self::Shopee),
            "ruten" => Ok(Self::Ruten),
            "yahoo" => Ok(Self::Yahoo),
            other => Err(format!("unknown platform: {other}")),
        }
    }
}

/// A normalized, platform-agnostic product observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingRecord {
    // === Identity ===
    /// Platform-qualified identifier, stable across calls
    pub id: String,
    pub platform: Platform,

    // === Description ===
    /// Full, untruncated title
    pub title: String,
    pub url: String,
    /// Never empty; falls back to a marketplace placeholder
    pub thumbnail_url: String,

    // === Commercial ===
    /// Decimal amount in the listing currency, never negative
    pub price: f64,
    pub currency: String,

    // === Seller ===
    pub seller_id: String,
    pub seller_name: String,
    pub seller_url: String,

    // === Social proof ===
    pub sales_count: u64,
    /// 0–5 when the marketplace provides one
    pub rating: Option<f64>,
    pub review_count: u64,
    pub location: String,

    // === Provenance ===
    pub scraped_at: DateTime<Utc>,
    /// Marketplace-specific fields kept for downstream consumers
    pub raw_data: Map<String, Value>,
}

/// Aggregate outcome of one keyword search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquisitionResult {
    pub platform: Platform,
    pub keyword: String,
    /// Always equal to `listings.len()`
    pub total_found: usize,
    /// In acquisition order
    pub listings: Vec<ListingRecord>,
    /// Pages successfully decoded
    pub pages_scraped: u32,
    pub duration_ms: u64,
    /// Page-level failures, in the order they happened
    pub errors: Vec<String>,
    /// Item-level decode warnings
    pub warnings: Vec<String>,
    /// Stopped at a page boundary on external cancellation
    pub cancelled: bool,
    pub success: bool,
}

impl AcquisitionResult {
    /// Assemble the final result of a session.
    ///
    /// An empty result is successful only when no error was recorded: a
    /// keyword with genuinely no matches is not a failure.
    #[allow(clippy::too_many_arguments)]
    pub fn assemble(
        platform: Platform,
        keyword: impl Into<String>,
        listings: Vec<ListingRecord>,
        pages_scraped: u32,
        duration_ms: u64,
        errors: Vec<String>,
        warnings: Vec<String>,
        cancelled: bool,
    ) -> Self {
        let success = !listings.is_empty() || errors.is_empty();
        Self {
            platform,
            keyword: keyword.into(),
            total_found: listings.len(),
            listings,
            pages_scraped,
            duration_ms,
            errors,
            warnings,
            cancelled,
            success,
        }
    }
}
