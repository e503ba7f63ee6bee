//! Pairwise and batch image similarity over perceptual fingerprints.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use super::fetch::ImageFetcher;
use super::fingerprint::{Fingerprint, FingerprintConfig, FingerprintHasher, HashAlgorithm};
use crate::error::{DupewatchError, Result};

/// Score at or above which a pair counts as a match.
pub const DEFAULT_THRESHOLD: f64 = 70.0;

/// Default floor for [`SimilarityEngine::batch_compare`].
pub const DEFAULT_MIN_SIMILARITY: f64 = 50.0;

/// Tier boundaries, inclusive lower bounds.
const EXACT_FLOOR: f64 = 95.0;
const HIGH_FLOOR: f64 = 80.0;
const MEDIUM_FLOOR: f64 = 60.0;

/// Coarse bucket of a similarity score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimilarityLevel {
    Exact,
    High,
    Medium,
    Low,
    /// The comparison could not be performed.
    Error,
}

impl SimilarityLevel {
    /// Tier for a score in `[0, 100]`.
    pub fn from_score(score: f64) -> Self {
        if score >= EXACT_FLOOR {
            Self::Exact
        } else if score >= HIGH_FLOOR {
            Self::High
        } else if score >= MEDIUM_FLOOR {
            Self::Medium
        } else {
            Self::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for SimilarityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a score was obtained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ComparisonDetails {
    Fingerprints {
        algorithm: HashAlgorithm,
        bit_size: u32,
        distance: u32,
        left: String,
        right: String,
    },
    Error {
        message: String,
    },
}

/// Outcome of comparing two images.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    /// Score in `[0, 100]`, two decimals.
    pub overall_similarity: f64,
    pub similarity_level: SimilarityLevel,
    pub is_match: bool,
    pub details: ComparisonDetails,
}

impl ComparisonResult {
    /// Zero-score result carrying the failure message.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            overall_similarity: 0.0,
            similarity_level: SimilarityLevel::Error,
            is_match: false,
            details: ComparisonDetails::Error {
                message: message.into(),
            },
        }
    }

    pub fn is_error(&self) -> bool {
        self.similarity_level == SimilarityLevel::Error
    }
}

/// Where an image comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    Bytes(Vec<u8>),
    Url(String),
}

impl ImageSource {
    /// Remote image; only `http` and `https` URLs are accepted.
    pub fn url(reference: &str) -> Result<Self> {
        let parsed = url::Url::parse(reference)
            .map_err(|e| DupewatchError::ImageFetchError(format!("invalid URL {reference}: {e}")))?;
        match parsed.scheme() {
            "http" | "https" => Ok(Self::Url(parsed.into())),
            scheme => Err(DupewatchError::ImageFetchError(format!(
                "unsupported URL scheme: {scheme}"
            ))),
        }
    }
}

impl From<Vec<u8>> for ImageSource {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<&[u8]> for ImageSource {
    fn from(bytes: &[u8]) -> Self {
        Self::Bytes(bytes.to_vec())
    }
}

/// Engine configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    pub fingerprint: FingerprintConfig,
    /// Match threshold in `[0, 100]`.
    pub threshold: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fingerprint: FingerprintConfig::default(),
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

/// Compares listing images by perceptual fingerprint.
///
/// The engine is stateless apart from its configuration: the same inputs
/// always give the same result. Pairwise comparison never fails; problems
/// are reported through [`SimilarityLevel::Error`].
pub struct SimilarityEngine {
    hasher: FingerprintHasher,
    threshold: f64,
    fetcher: Option<Arc<dyn ImageFetcher>>,
}

impl SimilarityEngine {
    pub fn new(config: EngineConfig) -> Result<Self> {
        if !(0.0..=100.0).contains(&config.threshold) {
            return Err(DupewatchError::ConfigError(format!(
                "threshold must be within 0..=100, got {}",
                config.threshold
            )));
        }

        Ok(Self {
            hasher: FingerprintHasher::new(config.fingerprint)?,
            threshold: config.threshold,
            fetcher: None,
        })
    }

    /// Resolve [`ImageSource::Url`] through `fetcher`.
    pub fn with_fetcher(mut self, fetcher: impl ImageFetcher + 'static) -> Self {
        self.fetcher = Some(Arc::new(fetcher));
        self
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn hasher(&self) -> &FingerprintHasher {
        &self.hasher
    }

    /// Fingerprint one image.
    pub async fn compute_fingerprint(&self, source: &ImageSource) -> Result<Fingerprint> {
        match source {
            ImageSource::Bytes(bytes) => self.hasher.hash_bytes(bytes),
            ImageSource::Url(url) => {
                let fetcher = self.fetcher.as_ref().ok_or_else(|| {
                    DupewatchError::ImageFetchError(format!("no image fetcher configured for {url}"))
                })?;
                let bytes = fetcher.fetch(url).await?;
                self.hasher.hash_bytes(&bytes)
            }
        }
    }

    /// Compare two images.
    #[instrument(level = "debug", skip_all)]
    pub async fn compare(&self, left: &ImageSource, right: &ImageSource) -> ComparisonResult {
        let outcome = async {
            let left = self.compute_fingerprint(left).await?;
            let right = self.compute_fingerprint(right).await?;
            self.score(&left, &right)
        }
        .await;

        outcome.unwrap_or_else(|err| {
            warn!(error = %err, "Image comparison failed");
            ComparisonResult::error(err.to_string())
        })
    }

    /// Compare two precomputed fingerprints.
    pub fn compare_fingerprints(&self, left: &Fingerprint, right: &Fingerprint) -> ComparisonResult {
        self.score(left, right).unwrap_or_else(|err| {
            warn!(error = %err, "Fingerprint comparison failed");
            ComparisonResult::error(err.to_string())
        })
    }

    /// Score every candidate against `source` and keep those at or above
    /// `min_similarity`, best first.
    ///
    /// Candidates that fail to load or compare are left out. Each kept entry
    /// carries the candidate's index in `candidates`; equal scores keep their
    /// input order.
    #[instrument(level = "info", skip(self, source, candidates), fields(candidates = candidates.len()))]
    pub async fn batch_compare(
        &self,
        source: &ImageSource,
        candidates: &[ImageSource],
        min_similarity: f64,
    ) -> Vec<(usize, ComparisonResult)> {
        let source_fp = match self.compute_fingerprint(source).await {
            Ok(fp) => fp,
            Err(err) => {
                warn!(error = %err, "Source image unusable, nothing to rank");
                return Vec::new();
            }
        };

        let mut ranked = Vec::new();
        for (index, candidate) in candidates.iter().enumerate() {
            let candidate_fp = match self.compute_fingerprint(candidate).await {
                Ok(fp) => fp,
                Err(err) => {
                    warn!(index, error = %err, "Skipping candidate");
                    continue;
                }
            };

            let result = self.compare_fingerprints(&source_fp, &candidate_fp);
            if result.is_error() {
                continue;
            }
            if result.overall_similarity >= min_similarity {
                debug!(index, score = result.overall_similarity, "Candidate kept");
                ranked.push((index, result));
            }
        }

        ranked.sort_by(|a, b| b.1.overall_similarity.total_cmp(&a.1.overall_similarity));
        info!(kept = ranked.len(), "Batch comparison finished");
        ranked
    }

    fn score(&self, left: &Fingerprint, right: &Fingerprint) -> Result<ComparisonResult> {
        let distance = left.hamming_distance(right)?;
        let raw = (1.0 - f64::from(distance) / f64::from(left.bit_size())) * 100.0;
        let overall_similarity = round_score(raw);

        Ok(ComparisonResult {
            overall_similarity,
            similarity_level: SimilarityLevel::from_score(overall_similarity),
            is_match: overall_similarity >= self.threshold,
            details: ComparisonDetails::Fingerprints {
                algorithm: left.algorithm(),
                bit_size: left.bit_size(),
                distance,
                left: left.to_hex(),
                right: right.to_hex(),
            },
        })
    }
}

fn round_score(score: f64) -> f64 {
    (score * 100.0).round() / 100.0
}
