//! Pipeline configuration.
//!
//! All knobs the pipeline reads live here: model names, temperatures,
//! segmentation policy, report word band, and the fallback-comment
//! threshold. Values are read once at startup and never mutated, so the
//! config can be shared freely across requests.

/// Application-level constants
pub const APP_NAME: &str = "voxreport";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default tracing filter when RUST_LOG is not set.
pub fn default_log_filter() -> &'static str {
    "voxreport=info"
}

/// Configuration for the report pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Chat-completion model used for both extraction and composition.
    pub model: String,
    /// Speech-to-text model.
    pub transcription_model: String,
    /// Language hint passed to transcription.
    pub language: String,
    /// Temperature for structured extraction. Kept at 0 so extraction is
    /// as reproducible as the underlying model allows.
    pub extract_temperature: f32,
    /// Temperature for narrative composition. Variation in prose is expected.
    pub compose_temperature: f32,
    /// Spoken phrase that separates one pupil's segment from the next.
    pub delimiter: String,
    /// Segments at or below this length are discarded as noise. 0 keeps
    /// everything non-empty.
    pub min_segment_len: usize,
    /// Preserve the transcript's original casing in segment text. When
    /// false the whole transcript is lower-cased before splitting, which
    /// reproduces the legacy behavior (and degrades names).
    pub preserve_case: bool,
    /// Narrative word band, inclusive.
    pub report_words_min: u32,
    pub report_words_max: u32,
    /// Synthesize a stock comment for scored subjects with no comment
    /// before rendering. Off by default: an empty comment is meaningful.
    pub synthesize_missing_comments: bool,
    /// Score at or above which the fallback comment is positive.
    pub fallback_comment_threshold: u8,
    /// Per-request timeout for capability HTTP calls, in seconds.
    pub request_timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            transcription_model: "whisper-1".to_string(),
            language: "en".to_string(),
            extract_temperature: 0.0,
            compose_temperature: 0.6,
            delimiter: "next student".to_string(),
            min_segment_len: 0,
            preserve_case: true,
            report_words_min: 80,
            report_words_max: 100,
            synthesize_missing_comments: false,
            fallback_comment_threshold: 7,
            request_timeout_secs: 120,
        }
    }
}

impl PipelineConfig {
    /// Build a config from environment variables, falling back to defaults.
    ///
    /// Recognized: `VOXREPORT_MODEL`, `VOXREPORT_TRANSCRIPTION_MODEL`,
    /// `VOXREPORT_LANGUAGE`, `VOXREPORT_DELIMITER`,
    /// `VOXREPORT_PRESERVE_CASE`, `VOXREPORT_TIMEOUT_SECS`.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(model) = std::env::var("VOXREPORT_MODEL") {
            if !model.is_empty() {
                config.model = model;
            }
        }
        if let Ok(model) = std::env::var("VOXREPORT_TRANSCRIPTION_MODEL") {
            if !model.is_empty() {
                config.transcription_model = model;
            }
        }
        if let Ok(lang) = std::env::var("VOXREPORT_LANGUAGE") {
            if !lang.is_empty() {
                config.language = lang;
            }
        }
        if let Ok(delim) = std::env::var("VOXREPORT_DELIMITER") {
            if !delim.trim().is_empty() {
                config.delimiter = delim;
            }
        }
        if let Ok(v) = std::env::var("VOXREPORT_PRESERVE_CASE") {
            config.preserve_case = v != "0" && !v.eq_ignore_ascii_case("false");
        }
        if let Ok(secs) = std::env::var("VOXREPORT_TIMEOUT_SECS") {
            if let Ok(parsed) = secs.parse::<u64>() {
                config.request_timeout_secs = parsed;
            }
        }

        config
    }
}
