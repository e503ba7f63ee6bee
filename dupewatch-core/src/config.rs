//! Configuration module
//!
//! Loads tunables from environment variables with sensible defaults. Values
//! that are missing or fail to parse fall back to their default.

use std::str::FromStr;
use std::time::Duration;

#[cfg(feature = "network")]
use crate::marketplace::HttpTransportConfig;
use crate::marketplace::ShopeeConfig;
use crate::pacing::{DEFAULT_DELAY_MAX, DEFAULT_DELAY_MIN};
use crate::session::{SessionConfig, DEFAULT_ITEMS_PER_PAGE, DEFAULT_PAGE_TIMEOUT};
use crate::similarity::{
    EngineConfig, FingerprintConfig, HashAlgorithm, DEFAULT_HASH_SIZE, DEFAULT_THRESHOLD,
};

/// Largest page size accepted from the environment.
pub const MAX_ITEMS_PER_PAGE: usize = 1_000;

/// Runtime configuration loaded from environment variables
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Items requested per page (default: 60)
    pub items_per_page: usize,
    /// Minimum delay between pages in seconds (default: 1.0)
    pub delay_min_secs: f64,
    /// Maximum delay between pages in seconds (default: 3.0)
    pub delay_max_secs: f64,
    /// Per-page deadline enforced by the session (default: 30)
    pub page_timeout_secs: u64,
    /// HTTP request timeout in seconds (default: 30)
    pub http_timeout_secs: u64,
    /// Retries for transient HTTP statuses (default: 2)
    pub max_retries: u32,
    /// Match threshold (default: 70.0)
    pub similarity_threshold: f64,
    pub hash_algorithm: HashAlgorithm,
    /// Fingerprint grid side (default: 16)
    pub hash_size: u32,
    /// Shopee search endpoint override
    pub shopee_api_url: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            items_per_page: DEFAULT_ITEMS_PER_PAGE,
            delay_min_secs: DEFAULT_DELAY_MIN.as_secs_f64(),
            delay_max_secs: DEFAULT_DELAY_MAX.as_secs_f64(),
            page_timeout_secs: DEFAULT_PAGE_TIMEOUT.as_secs(),
            http_timeout_secs: 30,
            max_retries: 2,
            similarity_threshold: DEFAULT_THRESHOLD,
            hash_algorithm: HashAlgorithm::PHash,
            hash_size: DEFAULT_HASH_SIZE,
            shopee_api_url: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let items_per_page = parse_var(&lookup, "DUPEWATCH_ITEMS_PER_PAGE")
            .filter(|n: &usize| (1..=MAX_ITEMS_PER_PAGE).contains(n))
            .unwrap_or(defaults.items_per_page);

        let delay_min_secs = parse_var(&lookup, "DUPEWATCH_DELAY_MIN_SECS")
            .filter(|s: &f64| Duration::try_from_secs_f64(*s).is_ok())
            .unwrap_or(defaults.delay_min_secs);

        let delay_max_secs = parse_var(&lookup, "DUPEWATCH_DELAY_MAX_SECS")
            .filter(|s: &f64| Duration::try_from_secs_f64(*s).is_ok())
            .unwrap_or(defaults.delay_max_secs);

        let page_timeout_secs = parse_var(&lookup, "DUPEWATCH_PAGE_TIMEOUT_SECS")
            .filter(|s: &u64| *s > 0)
            .unwrap_or(defaults.page_timeout_secs);

        let http_timeout_secs = parse_var(&lookup, "DUPEWATCH_HTTP_TIMEOUT_SECS")
            .filter(|s: &u64| *s > 0)
            .unwrap_or(defaults.http_timeout_secs);

        let max_retries = parse_var(&lookup, "DUPEWATCH_MAX_RETRIES").unwrap_or(defaults.max_retries);

        let similarity_threshold = parse_var(&lookup, "DUPEWATCH_SIMILARITY_THRESHOLD")
            .filter(|t: &f64| (0.0..=100.0).contains(t))
            .unwrap_or(defaults.similarity_threshold);

        let hash_algorithm = parse_var(&lookup, "DUPEWATCH_HASH_ALGORITHM").unwrap_or(defaults.hash_algorithm);

        // Only keep a size the chosen algorithm can produce.
        let hash_size = parse_var(&lookup, "DUPEWATCH_HASH_SIZE")
            .filter(|size: &u32| match hash_algorithm {
                HashAlgorithm::PHash => (2..=64).contains(size),
                HashAlgorithm::Blockhash => matches!(size, 4 | 8 | 12 | 16),
            })
            .unwrap_or(defaults.hash_size);

        let shopee_api_url = lookup("SHOPEE_API_URL")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        Self {
            items_per_page,
            delay_min_secs,
            delay_max_secs,
            page_timeout_secs,
            http_timeout_secs,
            max_retries,
            similarity_threshold,
            hash_algorithm,
            hash_size,
            shopee_api_url,
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            items_per_page: self.items_per_page,
            delay_min: Duration::try_from_secs_f64(self.delay_min_secs).unwrap_or(DEFAULT_DELAY_MIN),
            delay_max: Duration::try_from_secs_f64(self.delay_max_secs).unwrap_or(DEFAULT_DELAY_MAX),
            page_timeout: Duration::from_secs(self.page_timeout_secs),
        }
    }

    #[cfg(feature = "network")]
    pub fn http_transport_config(&self) -> HttpTransportConfig {
        HttpTransportConfig {
            timeout: Duration::from_secs(self.http_timeout_secs),
            max_retries: self.max_retries,
            ..Default::default()
        }
    }

    pub fn shopee_config(&self) -> ShopeeConfig {
        let mut config = ShopeeConfig::default();
        if let Some(api_url) = &self.shopee_api_url {
            config.api_url = api_url.clone();
        }
        config
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            fingerprint: FingerprintConfig {
                algorithm: self.hash_algorithm,
                hash_size: self.hash_size,
            },
            threshold: self.similarity_threshold,
        }
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_pairs(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.items_per_page, 60);
        assert_eq!(config.delay_min_secs, 1.0);
        assert_eq!(config.delay_max_secs, 3.0);
        assert_eq!(config.similarity_threshold, 70.0);
        assert_eq!(config.hash_algorithm, HashAlgorithm::PHash);
        assert_eq!(config.hash_size, 16);
        assert!(config.shopee_api_url.is_none());
    }

    #[test]
    fn test_empty_environment_yields_defaults() {
        assert_eq!(from_pairs(&[]), Config::default());
    }

    #[test]
    fn test_values_are_read() {
        let config = from_pairs(&[
            ("DUPEWATCH_ITEMS_PER_PAGE", "30"),
            ("DUPEWATCH_DELAY_MIN_SECS", "0.5"),
            ("DUPEWATCH_DELAY_MAX_SECS", "2"),
            ("DUPEWATCH_MAX_RETRIES", "0"),
            ("DUPEWATCH_SIMILARITY_THRESHOLD", "85"),
            ("DUPEWATCH_HASH_ALGORITHM", "blockhash"),
            ("DUPEWATCH_HASH_SIZE", "8"),
            ("SHOPEE_API_URL", "https://proxy.internal/search"),
        ]);

        assert_eq!(config.items_per_page, 30);
        assert_eq!(config.delay_min_secs, 0.5);
        assert_eq!(config.max_retries, 0);
        assert_eq!(config.hash_algorithm, HashAlgorithm::Blockhash);
        assert_eq!(config.hash_size, 8);

        let session = config.session_config();
        assert_eq!(session.delay_min, Duration::from_millis(500));
        assert_eq!(session.delay_max, Duration::from_secs(2));

        assert_eq!(config.shopee_config().api_url, "https://proxy.internal/search");
        assert_eq!(config.engine_config().threshold, 85.0);
        assert_eq!(config.engine_config().fingerprint.bit_size(), 64);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = from_pairs(&[
            ("DUPEWATCH_ITEMS_PER_PAGE", "0"),
            ("DUPEWATCH_DELAY_MIN_SECS", "-1"),
            ("DUPEWATCH_PAGE_TIMEOUT_SECS", "soon"),
            ("DUPEWATCH_SIMILARITY_THRESHOLD", "150"),
            ("DUPEWATCH_HASH_ALGORITHM", "dhash"),
            ("DUPEWATCH_HASH_SIZE", "1"),
            ("SHOPEE_API_URL", "  "),
        ]);
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_out_of_range_values_fall_back() {
        let config = from_pairs(&[
            ("DUPEWATCH_ITEMS_PER_PAGE", "18446744073709551615"),
            ("DUPEWATCH_DELAY_MIN_SECS", "NaN"),
            ("DUPEWATCH_DELAY_MAX_SECS", "1e20"),
        ]);
        assert_eq!(config, Config::default());

        let session = config.session_config();
        assert_eq!(session.delay_max, DEFAULT_DELAY_MAX);
    }

    #[test]
    fn test_session_config_tolerates_unrepresentable_delays() {
        let config = Config {
            delay_min_secs: f64::INFINITY,
            delay_max_secs: 1e20,
            ..Config::default()
        };
        let session = config.session_config();
        assert_eq!(session.delay_min, DEFAULT_DELAY_MIN);
        assert_eq!(session.delay_max, DEFAULT_DELAY_MAX);
    }

    #[test]
    fn test_blockhash_size_must_be_supported() {
        let config = from_pairs(&[
            ("DUPEWATCH_HASH_ALGORITHM", "blockhash"),
            ("DUPEWATCH_HASH_SIZE", "10"),
        ]);
        assert_eq!(config.hash_size, DEFAULT_HASH_SIZE);
    }

    #[cfg(feature = "network")]
    #[test]
    fn test_http_transport_config() {
        let config = from_pairs(&[
            ("DUPEWATCH_HTTP_TIMEOUT_SECS", "5"),
            ("DUPEWATCH_MAX_RETRIES", "4"),
        ]);
        let http = config.http_transport_config();
        assert_eq!(http.timeout, Duration::from_secs(5));
        assert_eq!(http.max_retries, 4);
    }
}
