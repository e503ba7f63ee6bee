//! Shopee search integration.
//!
//! Uses the public `search_items` v4 endpoint. Prices arrive as integers
//! pre-scaled by a fixed factor; the factor and the other field-mapping
//! constants live in [`ShopeeConfig`].

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};

use super::{DecodedItem, Endpoint, Marketplace, PageRequest};
use crate::error::{DupewatchError, Result};
use crate::listing::{ListingRecord, Platform};

/// Default Shopee search endpoint.
const DEFAULT_API_URL: &str = "https://shopee.tw/api/v4/search/search_items";

/// Raw prices are divided by this factor to get a currency amount.
pub const DEFAULT_PRICE_SCALE: i64 = 100_000;

/// Maximum number of title characters used for the URL slug.
const DEFAULT_SLUG_MAX_CHARS: usize = 50;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Configuration for the Shopee marketplace.
#[derive(Debug, Clone)]
pub struct ShopeeConfig {
    /// Storefront base URL, used for listing and seller links.
    pub base_url: String,
    /// Search API endpoint.
    pub api_url: String,
    /// Prefix for image identifiers.
    pub image_base_url: String,
    /// Divisor applied to raw integer prices.
    pub price_scale: i64,
    /// Title characters kept in the URL slug.
    pub slug_max_chars: usize,
    pub currency: String,
    /// Used when a listing carries no shop location.
    pub default_location: String,
}

impl Default for ShopeeConfig {
    fn default() -> Self {
        Self {
            base_url: "https://shopee.tw".to_string(),
            api_url: DEFAULT_API_URL.to_string(),
            image_base_url: "https://cf.shopee.tw/file".to_string(),
            price_scale: DEFAULT_PRICE_SCALE,
            slug_max_chars: DEFAULT_SLUG_MAX_CHARS,
            currency: "TWD".to_string(),
            default_location: "台灣".to_string(),
        }
    }
}

/// Raw search item wrapper.
#[derive(Debug, Deserialize)]
struct SearchItem {
    item_basic: ItemBasic,
}

/// The "basic info" object of a search item. Every field is optional; the
/// marketplace omits or nulls them freely.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ItemBasic {
    itemid: Value,
    shopid: Value,
    name: Option<String>,
    image: Option<String>,
    images: Option<Vec<String>>,
    price: Option<f64>,
    price_min: Option<f64>,
    shop_name: Option<String>,
    sold: Value,
    historical_sold: Value,
    shop_location: Option<String>,
    item_rating: Option<ItemRating>,
    cmt_count: Value,
    liked_count: Value,
    stock: Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ItemRating {
    rating_star: Option<f64>,
}

/// Shopee marketplace variant.
#[derive(Debug, Clone)]
pub struct ShopeeMarketplace {
    config: ShopeeConfig,
    endpoint: Endpoint,
}

impl Default for ShopeeMarketplace {
    fn default() -> Self {
        Self::with_config(ShopeeConfig::default())
    }
}

impl ShopeeMarketplace {
    /// Create the marketplace, rejecting a non-positive price scale.
    pub fn new(config: ShopeeConfig) -> Result<Self> {
        if config.price_scale <= 0 {
            return Err(DupewatchError::ConfigError(format!(
                "price scale must be positive, got {}",
                config.price_scale
            )));
        }
        Ok(Self::with_config(config))
    }

    fn with_config(config: ShopeeConfig) -> Self {
        let endpoint = Endpoint {
            search_url: config.api_url.clone(),
            headers: vec![
                ("User-Agent".to_string(), USER_AGENT.to_string()),
                ("Accept".to_string(), "application/json".to_string()),
                (
                    "Accept-Language".to_string(),
                    "zh-TW,zh;q=0.9,en-US;q=0.8,en;q=0.7".to_string(),
                ),
                ("Referer".to_string(), format!("{}/", config.base_url)),
                ("X-Requested-With".to_string(), "XMLHttpRequest".to_string()),
                ("X-API-SOURCE".to_string(), "pc".to_string()),
            ],
            passthrough: vec![
                ("page_type".to_string(), "search".to_string()),
                ("scenario".to_string(), "PAGE_GLOBAL_SEARCH".to_string()),
                ("version".to_string(), "2".to_string()),
            ],
        };

        Self { config, endpoint }
    }

    pub fn config(&self) -> &ShopeeConfig {
        &self.config
    }

    /// Convert a raw scaled price into a currency amount.
    ///
    /// Returns 0 for a missing or zero value. Negative values are clamped to 0
    /// and values leaving a sub-cent remainder after scaling are flagged, since
    /// both mean the response does not use the expected scale.
    fn scale_price(&self, raw: Option<f64>, field: &str, warnings: &mut Vec<String>) -> f64 {
        let Some(raw) = raw.filter(|v| *v != 0.0) else {
            return 0.0;
        };

        if !raw.is_finite() || raw < 0.0 {
            warnings.push(format!("{field} {raw} is not a valid amount; using 0"));
            return 0.0;
        }

        let scale = self.config.price_scale as f64;
        let cent_unit = scale / 100.0;
        if cent_unit >= 1.0 && raw % cent_unit != 0.0 {
            warnings.push(format!(
                "{field} {raw} is not aligned to price scale {}",
                self.config.price_scale
            ));
        }

        raw / scale
    }

    fn image_url(&self, image_id: &str) -> String {
        format!("{}/{}", self.config.image_base_url, image_id)
    }

    fn listing_url(&self, name: &str, shop_id: &str, item_id: &str) -> String {
        let slug: String = name
            .chars()
            .take(self.config.slug_max_chars)
            .collect::<String>()
            .replace([' ', '/'], "-");
        format!(
            "{}/{}-i.{}.{}",
            self.config.base_url,
            urlencoding::encode(&slug),
            shop_id,
            item_id
        )
    }
}

/// Render a numeric or string identifier. Empty strings count as missing.
fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

/// Read a count sent either as a number or as display text such as
/// `"1.2萬"`, `"3k"` or `"1,234+"`.
fn parse_count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite() && *f >= 0.0).map(|f| f as u64)),
        Value::String(text) => parse_count_text(text),
        _ => None,
    }
}

fn parse_count_text(text: &str) -> Option<u64> {
    let cleaned: String = text
        .chars()
        .filter(|c| !matches!(c, ',' | '+') && !c.is_whitespace())
        .collect::<String>()
        .to_lowercase();

    let (number, multiplier) = if let Some(n) = cleaned.strip_suffix('萬') {
        (n, 10_000.0)
    } else if let Some(n) = cleaned.strip_suffix('千') {
        (n, 1_000.0)
    } else if let Some(n) = cleaned.strip_suffix('k') {
        (n, 1_000.0)
    } else {
        (cleaned.as_str(), 1.0)
    };

    let value: f64 = number.parse().ok()?;
    (value.is_finite() && value >= 0.0).then(|| (value * multiplier).round() as u64)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

impl Marketplace for ShopeeMarketplace {
    fn platform(&self) -> Platform {
        Platform::Shopee
    }

    fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    fn build_request(&self, keyword: &str, limit: usize, offset: usize) -> PageRequest {
        let mut query = vec![
            ("by".to_string(), "relevancy".to_string()),
            ("keyword".to_string(), keyword.to_string()),
            ("limit".to_string(), limit.to_string()),
            ("newest".to_string(), offset.to_string()),
            ("order".to_string(), "desc".to_string()),
        ];
        query.extend(self.endpoint.passthrough.iter().cloned());

        PageRequest {
            url: self.endpoint.search_url.clone(),
            query,
            headers: self.endpoint.headers.clone(),
        }
    }

    fn decode_item(&self, raw: &Value, scraped_at: DateTime<Utc>) -> Result<DecodedItem> {
        let SearchItem { item_basic: item } = SearchItem::deserialize(raw)
            .map_err(|e| DupewatchError::DecodeError(format!("unexpected item shape: {e}")))?;

        let item_id = id_string(&item.itemid)
            .ok_or_else(|| DupewatchError::DecodeError("item has no itemid".into()))?;
        let shop_id = id_string(&item.shopid)
            .ok_or_else(|| DupewatchError::DecodeError("item has no shopid".into()))?;
        let id = format!("shopee_{shop_id}_{item_id}");

        let mut warnings = Vec::new();

        let title = non_empty(item.name).unwrap_or_else(|| "Unknown Product".to_string());

        let thumbnail_url = match non_empty(item.image) {
            Some(image) => self.image_url(&image),
            None => item
                .images
                .as_deref()
                .and_then(|images| images.iter().find(|i| !i.is_empty()))
                .map(|image| self.image_url(image))
                .unwrap_or_else(|| self.image_url("placeholder")),
        };

        let price = self.scale_price(item.price, "price", &mut warnings);
        let price_min = match item.price_min.filter(|v| *v != 0.0) {
            Some(raw) => self.scale_price(Some(raw), "price_min", &mut warnings),
            None => price,
        };
        let price = if price_min > 0.0 { price_min } else { price };

        let sales_count = parse_count(&item.sold)
            .filter(|sold| *sold > 0)
            .or_else(|| parse_count(&item.historical_sold))
            .unwrap_or(0);

        let rating = match item.item_rating.and_then(|r| r.rating_star) {
            Some(star) if (0.0..=5.0).contains(&star) => Some(star),
            Some(star) => {
                warnings.push(format!("rating {star} is outside 0-5; dropped"));
                None
            }
            None => None,
        };

        let seller_name =
            non_empty(item.shop_name).unwrap_or_else(|| format!("Shop_{shop_id}"));
        let location =
            non_empty(item.shop_location).unwrap_or_else(|| self.config.default_location.clone());

        let mut raw_data = Map::new();
        raw_data.insert("itemid".into(), item.itemid.clone());
        raw_data.insert("shopid".into(), item.shopid.clone());
        raw_data.insert(
            "liked_count".into(),
            Value::from(parse_count(&item.liked_count).unwrap_or(0)),
        );
        let stock = match item.stock {
            Value::Null => Value::from(0),
            other => other,
        };
        raw_data.insert("stock".into(), stock);

        let warnings = warnings
            .into_iter()
            .map(|w| format!("{id}: {w}"))
            .collect();

        let listing = ListingRecord {
            url: self.listing_url(&title, &shop_id, &item_id),
            seller_url: format!("{}/shop/{}", self.config.base_url, shop_id),
            id,
            platform: Platform::Shopee,
            title,
            thumbnail_url,
            price,
            currency: self.config.currency.clone(),
            seller_id: shop_id,
            seller_name,
            sales_count,
            rating,
            review_count: parse_count(&item.cmt_count).unwrap_or(0),
            location,
            scraped_at,
            raw_data,
        };

        Ok(DecodedItem { listing, warnings })
    }
}
