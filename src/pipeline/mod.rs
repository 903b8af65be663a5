//! Voice-note → per-pupil report pipeline.
//!
//! One submission flows through five stages:
//! transcribe → segment → extract → compose → render/deliver.
//! Transcription failure is fatal for the submission; everything after
//! segmentation fails per pupil and never aborts the batch.

pub mod compose;
pub mod extract;
pub mod normalize;
pub mod record;
pub mod runner;
pub mod segment;

pub use compose::{
    build_report_prompt, compose_report, fill_missing_comments, FallbackCommentPolicy,
};
pub use extract::{build_extraction_prompt, extract_json_payload, extract_record, ExtractError};
pub use normalize::{normalize_comment_text, normalize_subject_name};
pub use record::{
    BatchOutcome, NarrativeReport, ProgressEvent, RenderRequest, SegmentOutcome, StudentRecord,
    Submission,
};
pub use runner::{document_filename, ReportPipeline};
pub use segment::SegmentPolicy;

use thiserror::Error;

use crate::capabilities::TranscriptionError;

/// Errors that are fatal for a whole submission.
///
/// Per-segment failures (extraction, composition, rendering, delivery) are
/// not here — the runner catches those at the segment boundary and records
/// them as [`SegmentOutcome::Skipped`].
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("transcription failed: {0}")]
    Transcription(#[from] TranscriptionError),
}
