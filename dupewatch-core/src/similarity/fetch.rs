//! Loading remote listing images.

use async_trait::async_trait;

use crate::error::Result;

/// Resolves an image URL to its bytes.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

#[async_trait]
impl<F: ImageFetcher + ?Sized> ImageFetcher for std::sync::Arc<F> {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        (**self).fetch(url).await
    }
}

#[cfg(feature = "network")]
pub use http::{HttpImageFetcher, HttpImageFetcherConfig};

#[cfg(feature = "network")]
mod http {
    use std::time::Duration;

    use async_trait::async_trait;
    use reqwest::Client;
    use tracing::{debug, instrument, warn};

    use super::ImageFetcher;
    use crate::error::{DupewatchError, Result};

    /// Largest image body accepted.
    pub const DEFAULT_MAX_BYTES: usize = 10 * 1024 * 1024;

    #[derive(Debug, Clone)]
    pub struct HttpImageFetcherConfig {
        pub timeout: Duration,
        pub max_bytes: usize,
    }

    impl Default for HttpImageFetcherConfig {
        fn default() -> Self {
            Self {
                timeout: Duration::from_secs(15),
                max_bytes: DEFAULT_MAX_BYTES,
            }
        }
    }

    /// `reqwest`-backed [`ImageFetcher`].
    pub struct HttpImageFetcher {
        client: Client,
        max_bytes: usize,
    }

    impl HttpImageFetcher {
        pub fn new(config: HttpImageFetcherConfig) -> Result<Self> {
            let client = Client::builder()
                .timeout(config.timeout)
                .build()
                .map_err(|e| {
                    DupewatchError::ConfigError(format!("Failed to create HTTP client: {e}"))
                })?;

            Ok(Self {
                client,
                max_bytes: config.max_bytes,
            })
        }
    }

    #[async_trait]
    impl ImageFetcher for HttpImageFetcher {
        #[instrument(level = "debug", skip(self))]
        async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
            let response = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|e| DupewatchError::ImageFetchError(format!("{url}: {e}")))?;

            let status = response.status();
            if !status.is_success() {
                warn!(status = %status, "Image request rejected");
                return Err(DupewatchError::ImageFetchError(format!(
                    "{url}: HTTP {status}"
                )));
            }

            if let Some(length) = response.content_length() {
                if length as usize > self.max_bytes {
                    return Err(DupewatchError::ImageFetchError(format!(
                        "{url}: image of {length} bytes exceeds limit of {}",
                        self.max_bytes
                    )));
                }
            }

            let bytes = response
                .bytes()
                .await
                .map_err(|e| DupewatchError::ImageFetchError(format!("{url}: {e}")))?;
            if bytes.len() > self.max_bytes {
                return Err(DupewatchError::ImageFetchError(format!(
                    "{url}: image exceeds limit of {} bytes",
                    self.max_bytes
                )));
            }

            debug!(bytes = bytes.len(), "Image fetched");
            Ok(bytes.to_vec())
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_default_config() {
            let config = HttpImageFetcherConfig::default();
            assert_eq!(config.max_bytes, DEFAULT_MAX_BYTES);
            assert!(HttpImageFetcher::new(config).is_ok());
        }
    }
}
