//! Common utility functions shared across CLI commands.

use std::path::Path;

use anyhow::{Context, Result};
use clap::ValueEnum;
use dupewatch_core::{
    Config, HttpImageFetcher, HttpImageFetcherConfig, ImageSource, SimilarityEngine,
};
use tracing::debug;

/// Output format shared by all commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Load an image from a local path or an `http(s)` URL.
///
/// URLs are not fetched here; the engine downloads them on demand.
pub fn load_image_source(reference: &str) -> Result<ImageSource> {
    if reference.starts_with("http://") || reference.starts_with("https://") {
        return ImageSource::url(reference)
            .with_context(|| format!("Invalid image URL: {reference}"));
    }

    let path = Path::new(reference);
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;
    debug!(path = %path.display(), bytes = bytes.len(), "Read image");

    Ok(ImageSource::Bytes(bytes))
}

/// Build a similarity engine from the loaded configuration.
pub fn build_engine(config: &Config, threshold: Option<f64>) -> Result<SimilarityEngine> {
    let mut engine_config = config.engine_config();
    if let Some(threshold) = threshold {
        engine_config.threshold = threshold;
    }

    let fetcher = HttpImageFetcher::new(HttpImageFetcherConfig::default())
        .context("Failed to create image fetcher")?;
    let engine = SimilarityEngine::new(engine_config).context("Invalid similarity settings")?;

    Ok(engine.with_fetcher(fetcher))
}

/// Shorten `text` to at most `max_chars` characters, marking the cut.
pub fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let kept: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    format!("{kept}…")
}

/// Render a JSON value for stdout.
pub fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).context("Failed to serialize output")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_image_source_url() {
        let source = load_image_source("https://cf.shopee.tw/file/abc").unwrap();
        assert_eq!(
            source,
            ImageSource::Url("https://cf.shopee.tw/file/abc".to_string())
        );
    }

    #[test]
    fn test_load_image_source_missing_file() {
        let err = load_image_source("no_such_image.png").unwrap_err();
        assert!(format!("{err:#}").contains("Failed to read file"));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("手機殼保護套透明", 4), "手機殼…");
        assert_eq!(truncate("abcdef", 6), "abcdef");
    }

    #[test]
    fn test_build_engine_threshold_override() {
        let engine = build_engine(&Config::default(), Some(90.0)).unwrap();
        assert_eq!(engine.threshold(), 90.0);
        assert!(build_engine(&Config::default(), Some(150.0)).is_err());
    }
}
