//! Near-duplicate detection for listing images.
//!
//! Images are reduced to perceptual fingerprints ([`fingerprint`]) and
//! scored by normalized Hamming distance ([`engine`]).

pub mod engine;
pub mod fetch;
pub mod fingerprint;

pub use engine::{
    ComparisonDetails, ComparisonResult, EngineConfig, ImageSource, SimilarityEngine,
    SimilarityLevel, DEFAULT_MIN_SIMILARITY, DEFAULT_THRESHOLD,
};
#[cfg(feature = "network")]
pub use fetch::{HttpImageFetcher, HttpImageFetcherConfig};
pub use fetch::ImageFetcher;
pub use fingerprint::{
    hamming_distance, Fingerprint, FingerprintConfig, FingerprintHasher, HashAlgorithm,
    DEFAULT_HASH_SIZE,
};
