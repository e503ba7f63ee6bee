//! Synthetic marketplaces for testing and demos.
//!
//! Ruten and Yahoo have no real integration. Instead of silently falling back
//! to canned data, they are an explicit variant: [`SyntheticTransport`]
//! fabricates a fixed-size deterministic catalog per keyword and serves it in
//! pages, and [`SyntheticMarketplace`] decodes it like any other source.
//! WARNING: Listings are fabricated. Do not use for real monitoring.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use sha3::{Digest, Sha3_256};

use super::{DecodedItem, Endpoint, Marketplace, PageRequest, PageResponse, PageTransport};
use crate::error::{DupewatchError, Result, TransportError};
use crate::listing::{ListingRecord, Platform};

/// Listings fabricated per keyword.
pub const DEFAULT_CATALOG_SIZE: usize = 10;

/// Field-mapping constants for one synthetic platform.
#[derive(Debug, Clone)]
struct Profile {
    title_tag: &'static str,
    search_url: &'static str,
    thumbnail_url: &'static str,
    seller_name: &'static str,
    base_price: f64,
    price_step: f64,
    sales_step: u64,
}

const RUTEN: Profile = Profile {
    title_tag: "[露天]",
    search_url: "https://www.ruten.com.tw/find/",
    thumbnail_url: "https://www.ruten.com.tw/placeholder.jpg",
    seller_name: "露天賣家",
    base_price: 80.0,
    price_step: 40.0,
    sales_step: 5,
};

const YAHOO: Profile = Profile {
    title_tag: "[Yahoo]",
    search_url: "https://tw.buy.yahoo.com/search",
    thumbnail_url: "https://tw.buy.yahoo.com/placeholder.jpg",
    seller_name: "Yahoo購物中心",
    base_price: 120.0,
    price_step: 60.0,
    sales_step: 8,
};

/// Deterministic fabricated marketplace.
#[derive(Debug, Clone)]
pub struct SyntheticMarketplace {
    platform: Platform,
    profile: Profile,
    catalog_size: usize,
    endpoint: Endpoint,
}

impl SyntheticMarketplace {
    pub fn ruten() -> Self {
        Self::with_profile(Platform::Ruten, RUTEN)
    }

    pub fn yahoo() -> Self {
        Self::with_profile(Platform::Yahoo, YAHOO)
    }

    /// Synthetic variant for a platform, or `None` for platforms with a real
    /// integration.
    pub fn for_platform(platform: Platform) -> Option<Self> {
        match platform {
            Platform::Ruten => Some(Self::ruten()),
            Platform::Yahoo => Some(Self::yahoo()),
            Platform::Shopee => None,
        }
    }

    fn with_profile(platform: Platform, profile: Profile) -> Self {
        let endpoint = Endpoint {
            search_url: profile.search_url.to_string(),
            headers: Vec::new(),
            passthrough: Vec::new(),
        };
        Self {
            platform,
            profile,
            catalog_size: DEFAULT_CATALOG_SIZE,
            endpoint,
        }
    }

    /// Override the number of listings fabricated per keyword.
    pub fn with_catalog_size(mut self, catalog_size: usize) -> Self {
        self.catalog_size = catalog_size;
        self
    }

    pub fn catalog_size(&self) -> usize {
        self.catalog_size
    }

    /// Fabricate the raw items of one page.
    pub fn fabricate_page(&self, keyword: &str, limit: usize, offset: usize) -> Vec<Value> {
        let end = offset.saturating_add(limit).min(self.catalog_size);
        (offset..end)
            .map(|index| json!({ "index": index, "keyword": keyword }))
            .collect()
    }

    /// Seller identifier derived from keyword and platform with SHA3, so the
    /// same keyword always maps to the same fabricated seller.
    fn seller_id(&self, keyword: &str) -> String {
        let mut hasher = Sha3_256::new();
        hasher.update(self.platform.as_str().as_bytes());
        hasher.update(b"dupewatch-synthetic-seller");
        hasher.update(keyword.as_bytes());
        hex::encode(&hasher.finalize()[..6])
    }
}

impl Marketplace for SyntheticMarketplace {
    fn platform(&self) -> Platform {
        self.platform
    }

    fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    fn build_request(&self, keyword: &str, limit: usize, offset: usize) -> PageRequest {
        PageRequest {
            url: self.endpoint.search_url.clone(),
            query: vec![
                ("sort".to_string(), "relevance".to_string()),
                ("q".to_string(), keyword.to_string()),
                ("limit".to_string(), limit.to_string()),
                ("offset".to_string(), offset.to_string()),
            ],
            headers: Vec::new(),
        }
    }

    fn decode_item(&self, raw: &Value, scraped_at: DateTime<Utc>) -> Result<DecodedItem> {
        let index = raw
            .get("index")
            .and_then(Value::as_u64)
            .ok_or_else(|| DupewatchError::DecodeError("synthetic item has no index".into()))?;
        let keyword = raw
            .get("keyword")
            .and_then(Value::as_str)
            .ok_or_else(|| DupewatchError::DecodeError("synthetic item has no keyword".into()))?;

        let platform = self.platform.as_str();
        let seller_id = self.seller_id(keyword);
        let url = format!(
            "{}?q={}",
            self.profile.search_url,
            urlencoding::encode(keyword)
        );

        let mut raw_data = Map::new();
        raw_data.insert("synthetic".into(), Value::Bool(true));
        raw_data.insert("index".into(), Value::from(index));

        let listing = ListingRecord {
            id: format!("{platform}_{keyword}_{index}"),
            platform: self.platform,
            title: format!("{} {} 商品 {}", self.profile.title_tag, keyword, index + 1),
            url,
            thumbnail_url: self.profile.thumbnail_url.to_string(),
            price: self.profile.base_price + index as f64 * self.profile.price_step,
            currency: "TWD".to_string(),
            seller_url: format!("{}?seller={}", self.profile.search_url, seller_id),
            seller_id,
            seller_name: self.profile.seller_name.to_string(),
            sales_count: index * self.profile.sales_step,
            rating: None,
            review_count: 0,
            location: "台灣".to_string(),
            scraped_at,
            raw_data,
        };

        Ok(DecodedItem {
            listing,
            warnings: Vec::new(),
        })
    }
}

/// Serves pages of a [`SyntheticMarketplace`] catalog without touching the
/// network.
#[derive(Debug, Clone)]
pub struct SyntheticTransport {
    marketplace: SyntheticMarketplace,
}

impl SyntheticTransport {
    pub fn new(marketplace: SyntheticMarketplace) -> Self {
        Self { marketplace }
    }
}

fn usize_param(request: &PageRequest, name: &str) -> std::result::Result<usize, TransportError> {
    request
        .param(name)
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| TransportError::Request(format!("missing or invalid `{name}` parameter")))
}

#[async_trait]
impl PageTransport for SyntheticTransport {
    async fn fetch_page(
        &self,
        request: &PageRequest,
    ) -> std::result::Result<PageResponse, TransportError> {
        let keyword = request
            .param("q")
            .ok_or_else(|| TransportError::Request("missing `q` parameter".into()))?;
        let limit = usize_param(request, "limit")?;
        let offset = usize_param(request, "offset")?;

        let items = self.marketplace.fabricate_page(keyword, limit, offset);
        Ok(PageResponse::ok(json!({ "items": items })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_platform() {
        assert!(SyntheticMarketplace::for_platform(Platform::Shopee).is_none());
        assert_eq!(
            SyntheticMarketplace::for_platform(Platform::Ruten)
                .unwrap()
                .platform(),
            Platform::Ruten
        );
    }

    #[test]
    fn test_fabricate_page_bounds() {
        let marketplace = SyntheticMarketplace::ruten();
        assert_eq!(marketplace.fabricate_page("kw", 60, 0).len(), 10);
        assert_eq!(marketplace.fabricate_page("kw", 4, 8).len(), 2);
        assert!(marketplace.fabricate_page("kw", 60, 60).is_empty());
        assert!(marketplace.fabricate_page("kw", usize::MAX, 3).len() == 7);
    }

    #[test]
    fn test_ruten_listing_values() {
        let marketplace = SyntheticMarketplace::ruten();
        let raw = &marketplace.fabricate_page("手機殼", 60, 0)[3];
        let listing = marketplace.decode_item(raw, Utc::now()).unwrap().listing;

        assert_eq!(listing.id, "ruten_手機殼_3");
        assert_eq!(listing.title, "[露天] 手機殼 商品 4");
        assert_eq!(listing.price, 200.0);
        assert_eq!(listing.sales_count, 15);
        assert_eq!(listing.seller_name, "露天賣家");
        assert_eq!(listing.raw_data["synthetic"], Value::Bool(true));
    }

    #[test]
    fn test_yahoo_listing_values() {
        let marketplace = SyntheticMarketplace::yahoo();
        let raw = &marketplace.fabricate_page("case", 60, 0)[2];
        let listing = marketplace.decode_item(raw, Utc::now()).unwrap().listing;

        assert_eq!(listing.id, "yahoo_case_2");
        assert_eq!(listing.price, 240.0);
        assert_eq!(listing.sales_count, 16);
        assert_eq!(listing.url, "https://tw.buy.yahoo.com/search?q=case");
    }

    #[test]
    fn test_seller_is_deterministic() {
        let marketplace = SyntheticMarketplace::ruten();
        assert_eq!(marketplace.seller_id("a"), marketplace.seller_id("a"));
        assert_ne!(marketplace.seller_id("a"), marketplace.seller_id("b"));
        assert_ne!(
            marketplace.seller_id("a"),
            SyntheticMarketplace::yahoo().seller_id("a")
        );
    }

    #[tokio::test]
    async fn test_transport_serves_catalog_pages() {
        let marketplace = SyntheticMarketplace::yahoo().with_catalog_size(5);
        let transport = SyntheticTransport::new(marketplace.clone());

        let request = marketplace.build_request("lamp", 3, 3);
        let response = transport.fetch_page(&request).await.unwrap();
        assert!(response.is_success());
        assert_eq!(marketplace.extract_items(&response.body).len(), 2);
    }

    #[tokio::test]
    async fn test_transport_rejects_malformed_request() {
        let transport = SyntheticTransport::new(SyntheticMarketplace::ruten());
        let request = PageRequest {
            url: "https://www.ruten.com.tw/find/".into(),
            query: vec![("q".into(), "x".into())],
            headers: vec![],
        };
        assert!(matches!(
            transport.fetch_page(&request).await,
            Err(TransportError::Request(_))
        ));
    }
}
