//! Perceptual fingerprints for listing images.
//!
//! A fingerprint is a fixed-length bit vector that stays close for visually
//! similar images, so re-encoded, resized or re-watermarked copies of the
//! same product photo land within a small Hamming distance of each other.
//!
//! # Algorithms
//!
//! - **pHash** (default): DCT-preprocessed mean hash from `image_hasher`,
//!   `hash_size × hash_size` bits (256 bits at the default size of 16).
//! - **Blockhash**: grid-based hash from the `blockhash` crate, available in
//!   16, 64, 144 and 256 bits (`hash_size` 4, 8, 12, 16).
//!
//! # Usage
//!
//! ```no_run
//! use dupewatch_core::similarity::{FingerprintConfig, FingerprintHasher};
//!
//! let hasher = FingerprintHasher::new(FingerprintConfig::default()).unwrap();
//! let a = hasher.hash_bytes(&std::fs::read("a.jpg").unwrap()).unwrap();
//! let b = hasher.hash_bytes(&std::fs::read("b.jpg").unwrap()).unwrap();
//! let score = a.similarity(&b).unwrap(); // 0.0..=100.0
//! ```

use blockhash::{blockhash144, blockhash16, blockhash256, blockhash64};
use image::DynamicImage;
use image_hasher::{HashAlg, Hasher, HasherConfig};
use serde::{Deserialize, Serialize};

use crate::error::{DupewatchError, Result};

/// Default hash side length (16 × 16 = 256 bits).
pub const DEFAULT_HASH_SIZE: u32 = 16;

/// Fingerprint algorithm selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    /// DCT mean hash. Recommended.
    #[default]
    PHash,
    /// Grid-based Blockhash.
    Blockhash,
}

impl std::fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PHash => f.write_str("phash"),
            Self::Blockhash => f.write_str("blockhash"),
        }
    }
}

impl std::str::FromStr for HashAlgorithm {
    type Err = DupewatchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "phash" => Ok(Self::PHash),
            "blockhash" => Ok(Self::Blockhash),
            other => Err(DupewatchError::ConfigError(format!(
                "unknown hash algorithm: {other}"
            ))),
        }
    }
}

/// Computed fingerprint. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint {
    bits: Vec<u8>,
    algorithm: HashAlgorithm,
    bit_size: u32,
}

impl Fingerprint {
    /// Build a fingerprint from packed bits.
    ///
    /// `bytes` must hold exactly `ceil(bit_size / 8)` bytes.
    pub fn from_bytes(bytes: Vec<u8>, algorithm: HashAlgorithm, bit_size: u32) -> Result<Self> {
        if bit_size == 0 {
            return Err(DupewatchError::FingerprintError(
                "fingerprint must have at least one bit".into(),
            ));
        }
        let expected = bit_size.div_ceil(8) as usize;
        if bytes.len() != expected {
            return Err(DupewatchError::FingerprintError(format!(
                "{bit_size}-bit fingerprint needs {expected} bytes, got {}",
                bytes.len()
            )));
        }
        Ok(Self {
            bits: bytes,
            algorithm,
            bit_size,
        })
    }

    /// Parse a fingerprint from its hexadecimal form.
    pub fn from_hex(hex_str: &str, algorithm: HashAlgorithm, bit_size: u32) -> Result<Self> {
        let bytes = hex::decode(hex_str)
            .map_err(|e| DupewatchError::FingerprintError(format!("Invalid hex string: {e}")))?;
        Self::from_bytes(bytes, algorithm, bit_size)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bits
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    pub fn bit_size(&self) -> u32 {
        self.bit_size
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.bits)
    }

    /// Whether `other` was produced under the same configuration.
    pub fn is_comparable(&self, other: &Self) -> bool {
        self.algorithm == other.algorithm && self.bit_size == other.bit_size
    }

    /// Number of differing bits.
    ///
    /// Fails when the fingerprints come from different algorithms or lengths.
    pub fn hamming_distance(&self, other: &Self) -> Result<u32> {
        if !self.is_comparable(other) {
            return Err(DupewatchError::FingerprintMismatch {
                left_algorithm: self.algorithm.to_string(),
                left_bits: self.bit_size,
                right_algorithm: other.algorithm.to_string(),
                right_bits: other.bit_size,
            });
        }

        Ok(hamming_distance(&self.bits, &other.bits))
    }

    /// Closeness in `[0, 100]`: `(1 - distance / bits) × 100`, unrounded.
    pub fn similarity(&self, other: &Self) -> Result<f64> {
        let distance = self.hamming_distance(other)?;
        Ok((1.0 - f64::from(distance) / f64::from(self.bit_size)) * 100.0)
    }
}

/// Fingerprint configuration, fixed for the lifetime of a hasher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FingerprintConfig {
    pub algorithm: HashAlgorithm,
    /// Side length of the hash grid; the fingerprint has `hash_size²` bits.
    pub hash_size: u32,
}

impl Default for FingerprintConfig {
    fn default() -> Self {
        Self {
            algorithm: HashAlgorithm::PHash,
            hash_size: DEFAULT_HASH_SIZE,
        }
    }
}

impl FingerprintConfig {
    pub fn bit_size(&self) -> u32 {
        self.hash_size * self.hash_size
    }
}

/// Computes fingerprints under one configuration.
pub struct FingerprintHasher {
    config: FingerprintConfig,
    phash: Option<Hasher>,
}

impl std::fmt::Debug for FingerprintHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FingerprintHasher")
            .field("config", &self.config)
            .finish()
    }
}

impl FingerprintHasher {
    /// Create a hasher, rejecting sizes the algorithm cannot produce.
    pub fn new(config: FingerprintConfig) -> Result<Self> {
        let phash = match config.algorithm {
            HashAlgorithm::PHash => {
                if !(2..=64).contains(&config.hash_size) {
                    return Err(DupewatchError::ConfigError(format!(
                        "pHash size must be between 2 and 64, got {}",
                        config.hash_size
                    )));
                }
                Some(
                    HasherConfig::new()
                        .hash_size(config.hash_size, config.hash_size)
                        .hash_alg(HashAlg::Mean)
                        .preproc_dct()
                        .to_hasher(),
                )
            }
            HashAlgorithm::Blockhash => {
                if !matches!(config.hash_size, 4 | 8 | 12 | 16) {
                    return Err(DupewatchError::ConfigError(format!(
                        "Blockhash size must be 4, 8, 12 or 16, got {}",
                        config.hash_size
                    )));
                }
                None
            }
        };

        Ok(Self { config, phash })
    }

    pub fn config(&self) -> FingerprintConfig {
        self.config
    }

    /// Bits in every fingerprint this hasher produces.
    pub fn bit_size(&self) -> u32 {
        self.config.bit_size()
    }

    /// Fingerprint raw image bytes (JPEG, PNG, GIF or WebP).
    pub fn hash_bytes(&self, image_data: &[u8]) -> Result<Fingerprint> {
        let image = image::load_from_memory(image_data).map_err(|e| {
            DupewatchError::FingerprintError(format!("Failed to decode image: {e}"))
        })?;

        self.hash_image(&image)
    }

    /// Fingerprint a decoded image.
    pub fn hash_image(&self, image: &DynamicImage) -> Result<Fingerprint> {
        let bytes = match (&self.phash, self.config.hash_size) {
            (Some(hasher), _) => hasher.hash_image(image).as_bytes().to_vec(),
            (None, 4) => <[u8; 2]>::from(blockhash16(image)).to_vec(),
            (None, 8) => <[u8; 8]>::from(blockhash64(image)).to_vec(),
            (None, 12) => <[u8; 18]>::from(blockhash144(image)).to_vec(),
            (None, 16) => <[u8; 32]>::from(blockhash256(image)).to_vec(),
            (None, size) => {
                return Err(DupewatchError::FingerprintError(format!(
                    "unsupported Blockhash size {size}"
                )))
            }
        };

        Fingerprint::from_bytes(bytes, self.config.algorithm, self.bit_size())
    }

    /// Check if the provided bytes appear to be a supported image format.
    pub fn is_supported_format(data: &[u8]) -> bool {
        image::guess_format(data).is_ok()
    }
}

/// Count differing bits over two equally long byte slices.
///
/// Only the overlapping prefix is compared; callers check lengths first.
pub fn hamming_distance(left: &[u8], right: &[u8]) -> u32 {
    left.iter()
        .zip(right.iter())
        .map(|(a, b)| (a ^ b).count_ones())
        .sum()
}
