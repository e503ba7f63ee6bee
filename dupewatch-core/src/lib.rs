//! Dupewatch Core - marketplace listing acquisition and near-duplicate image matching
//!
//! This crate collects product listings for a keyword from e-commerce
//! marketplaces and compares listing images by perceptual fingerprint to spot
//! copies of the same product photo.
//!
//! # Features
//!
//! - Paginated keyword search with randomized pacing, per-page timeouts and
//!   cancellation
//! - Shopee search decoding into normalized [`ListingRecord`]s
//! - Deterministic synthetic Ruten and Yahoo sources for tests and demos
//! - pHash and Blockhash fingerprints with tiered similarity scores
//!
//! # Example
//!
//! ```no_run
//! use dupewatch_core::{
//!     AcquisitionSession, HttpTransport, HttpTransportConfig, SessionConfig, ShopeeMarketplace,
//! };
//!
//! # async fn example() -> dupewatch_core::Result<()> {
//! let transport = HttpTransport::new(HttpTransportConfig::default())?;
//! let session = AcquisitionSession::new(
//!     ShopeeMarketplace::default(),
//!     transport,
//!     SessionConfig::default(),
//! );
//!
//! let result = session.search("手機殼", 3, 100).await;
//! println!("{} listings, {} errors", result.total_found, result.errors.len());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod listing;
pub mod marketplace;
pub mod pacing;
pub mod session;
pub mod similarity;

// Re-export main types for convenience
pub use config::Config;
pub use error::{DupewatchError, Result, TransportError};
pub use listing::{AcquisitionResult, ListingRecord, Platform};
pub use marketplace::{
    DecodedItem, Endpoint, Marketplace, PageRequest, PageResponse, PageTransport, ShopeeConfig,
    ShopeeMarketplace, SyntheticMarketplace, SyntheticTransport,
};
pub use pacing::{Clock, NoDelay, Pacer, RandomDelayPacer, SystemClock};
pub use session::{AcquisitionSession, SessionConfig};
pub use similarity::{
    ComparisonDetails, ComparisonResult, EngineConfig, Fingerprint, FingerprintConfig,
    FingerprintHasher, HashAlgorithm, ImageFetcher, ImageSource, SimilarityEngine,
    SimilarityLevel,
};

// Network-dependent exports
#[cfg(feature = "network")]
pub use marketplace::{HttpTransport, HttpTransportConfig};
#[cfg(feature = "network")]
pub use similarity::{HttpImageFetcher, HttpImageFetcherConfig};

#[cfg(test)]
mod tests {
    use super::*;

    /// Search a synthetic source, then rank two of its listings' images.
    #[tokio::test]
    async fn test_acquire_then_compare() {
        let marketplace = SyntheticMarketplace::yahoo();
        let session = AcquisitionSession::new(
            marketplace.clone(),
            SyntheticTransport::new(marketplace),
            SessionConfig::default(),
        )
        .with_pacer(NoDelay);

        let result = session.search("lamp", 2, 5).await;
        assert!(result.success);
        assert_eq!(result.total_found, 5);

        let engine = SimilarityEngine::new(EngineConfig::default()).unwrap();
        let image = image::RgbImage::from_fn(32, 32, |x, y| {
            image::Rgb([(x * 8) as u8, (y * 8) as u8, 128])
        });
        let mut png = Vec::new();
        image::DynamicImage::ImageRgb8(image)
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();

        let source = ImageSource::Bytes(png);
        let comparison = engine.compare(&source, &source).await;
        assert_eq!(comparison.similarity_level, SimilarityLevel::Exact);
    }
}
