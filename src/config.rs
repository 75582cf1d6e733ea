
use serde::Deserialize;

use crate::error::Result;

// These defaults came out of the field, not first principles; they affect
// how fast estimates converge, not whether the streams are correct.
/// Results per page fetch; one page is one network round-trip.
pub const PAGE_SIZE: usize = 100;
/// Confidence constant for the stability margin, roughly a one-sided 95%
/// Gaussian tolerance.
pub const CONFIDENCE: f64 = 0.98;
/// Resolved results required before the stability test can pass.
pub const MIN_STABILITY_SAMPLE: usize = 4;

/// Tuning knobs shared by every stream of one query execution.
#[derive(Clone, Copy, Debug)]
pub struct StreamConfig {
    pub page_size: usize,
    pub confidence: f64,
    pub min_stability_sample: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            page_size: PAGE_SIZE,
            confidence: CONFIDENCE,
            min_stability_sample: MIN_STABILITY_SAMPLE,
        }
    }
}

impl StreamConfig {
    pub(crate) fn page(&self) -> f64 {
        self.page_size as f64
    }
}

/// Settings read from an optional `fragstream.toml` next to the binary,
/// overridable through `FRAGSTREAM_*` environment variables.
#[derive(Debug, Deserialize)]
pub struct Settings {
    pub page_size: Option<usize>,
    pub confidence: Option<f64>,
    pub min_stability_sample: Option<usize>,
}

impl Settings {
    pub fn load() -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name("fragstream").required(false))
            .add_source(config::Environment::with_prefix("FRAGSTREAM").try_parsing(true))
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    pub fn stream_config(&self) -> StreamConfig {
        let defaults = StreamConfig::default();
        StreamConfig {
            page_size: self.page_size.unwrap_or(defaults.page_size),
            confidence: self.confidence.unwrap_or(defaults.confidence),
            min_stability_sample: self
                .min_stability_sample
                .unwrap_or(defaults.min_stability_sample),
        }
    }
}
