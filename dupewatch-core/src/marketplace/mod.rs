//! Marketplace integrations.
//!
//! A marketplace is an endpoint descriptor plus a normalization function that
//! turns one raw search item into a [`ListingRecord`]. Pages are fetched
//! through a [`PageTransport`], so the same session loop drives the real
//! network client and scripted or synthetic sources.
//!
//! - **Shopee** - real search API (`search_items` v4)
//! - **Synthetic** - deterministic fabricated listings for Ruten and Yahoo,
//!   served by [`SyntheticTransport`]

#[cfg(feature = "network")]
mod http_client;
mod shopee;
mod synthetic;

#[cfg(feature = "network")]
pub use http_client::{is_transient_status, HttpTransport, HttpTransportConfig};
pub use shopee::{ShopeeConfig, ShopeeMarketplace};
pub use synthetic::{SyntheticMarketplace, SyntheticTransport};

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::{Result, TransportError};
use crate::listing::{ListingRecord, Platform};

/// Where and how a marketplace is queried.
#[derive(Debug, Clone)]
pub struct Endpoint {
    /// Search endpoint URL (query parameters are added per request)
    pub search_url: String,
    /// Headers sent with every request
    pub headers: Vec<(String, String)>,
    /// Opaque parameters the marketplace requires on every request
    pub passthrough: Vec<(String, String)>,
}

/// One paginated search request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
}

impl PageRequest {
    /// Look up a query parameter by name.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Raw response for one page.
#[derive(Debug, Clone, PartialEq)]
pub struct PageResponse {
    pub status: u16,
    /// Parsed JSON body; `Null` when the status was not a success
    pub body: Value,
}

impl PageResponse {
    pub fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// A normalized listing with the warnings raised while decoding it.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedItem {
    pub listing: ListingRecord,
    pub warnings: Vec<String>,
}

/// A marketplace variant: endpoint shape plus field mapping.
pub trait Marketplace: Send + Sync {
    fn platform(&self) -> Platform;

    fn endpoint(&self) -> &Endpoint;

    /// Build the request for one page of a relevance-ordered keyword search.
    fn build_request(&self, keyword: &str, limit: usize, offset: usize) -> PageRequest;

    /// Raw items of a page body. Any shape other than an `items` array is
    /// treated as an empty page.
    fn extract_items<'a>(&self, body: &'a Value) -> &'a [Value] {
        body.get("items")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Normalize one raw item. Pure: the same input always yields the same
    /// record.
    fn decode_item(&self, raw: &Value, scraped_at: DateTime<Utc>) -> Result<DecodedItem>;
}

impl<M: Marketplace + ?Sized> Marketplace for Arc<M> {
    fn platform(&self) -> Platform {
        (**self).platform()
    }

    fn endpoint(&self) -> &Endpoint {
        (**self).endpoint()
    }

    fn build_request(&self, keyword: &str, limit: usize, offset: usize) -> PageRequest {
        (**self).build_request(keyword, limit, offset)
    }

    fn extract_items<'a>(&self, body: &'a Value) -> &'a [Value] {
        (**self).extract_items(body)
    }

    fn decode_item(&self, raw: &Value, scraped_at: DateTime<Utc>) -> Result<DecodedItem> {
        (**self).decode_item(raw, scraped_at)
    }
}

/// Fetches one page. Implementations must be thread-safe (`Send + Sync`).
#[async_trait]
pub trait PageTransport: Send + Sync {
    async fn fetch_page(
        &self,
        request: &PageRequest,
    ) -> std::result::Result<PageResponse, TransportError>;
}

#[async_trait]
impl<T: PageTransport + ?Sized> PageTransport for Arc<T> {
    async fn fetch_page(
        &self,
        request: &PageRequest,
    ) -> std::result::Result<PageResponse, TransportError> {
        (**self).fetch_page(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_items_from_items_array() {
        let marketplace = ShopeeMarketplace::default();
        let body = json!({ "items": [{ "a": 1 }, { "b": 2 }] });
        assert_eq!(marketplace.extract_items(&body).len(), 2);
    }

    #[test]
    fn test_extract_items_other_shapes_are_empty() {
        let marketplace = ShopeeMarketplace::default();
        assert!(marketplace.extract_items(&json!({})).is_empty());
        assert!(marketplace.extract_items(&json!({ "items": null })).is_empty());
        assert!(marketplace.extract_items(&json!({ "items": "nope" })).is_empty());
        assert!(marketplace.extract_items(&json!([1, 2, 3])).is_empty());
        assert!(marketplace.extract_items(&Value::Null).is_empty());
    }

    #[test]
    fn test_page_response_success_range() {
        assert!(PageResponse::ok(Value::Null).is_success());
        assert!(!PageResponse { status: 403, body: Value::Null }.is_success());
        assert!(!PageResponse { status: 500, body: Value::Null }.is_success());
    }

    #[test]
    fn test_page_request_param_lookup() {
        let request = ShopeeMarketplace::default().build_request("phone case", 60, 120);
        assert_eq!(request.param("keyword"), Some("phone case"));
        assert_eq!(request.param("newest"), Some("120"));
        assert_eq!(request.param("missing"), None);
    }
}
