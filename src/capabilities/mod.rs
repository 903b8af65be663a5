//! External capability contracts.
//!
//! The pipeline depends on four collaborators it does not own: speech-to-text,
//! chat completion, document rendering, and outbound delivery. Each is a
//! trait so the pipeline receives them as explicit dependencies at
//! construction time and tests can substitute doubles.

pub mod openai;

use thiserror::Error;

pub use openai::{MockCompletion, MockTranscriber, OpenAiClient, ScriptedCompletion};

#[derive(Error, Debug)]
pub enum TranscriptionError {
    #[error("transcription service unreachable at {0}")]
    Connection(String),

    #[error("transcription service returned error (status {status}): {body}")]
    Service { status: u16, body: String },

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("response parsing error: {0}")]
    ResponseParsing(String),
}

#[derive(Error, Debug)]
pub enum CompletionError {
    #[error("completion service unreachable at {0}")]
    Connection(String),

    #[error("completion service returned error (status {status}): {body}")]
    Service { status: u16, body: String },

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("response parsing error: {0}")]
    ResponseParsing(String),
}

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("render failed: {0}")]
    Failed(String),
}

#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("delivery failed: {0}")]
    Failed(String),
}

/// Speech-to-text over a complete audio payload.
///
/// The returned text may be empty; callers must treat that as a valid
/// transcript with no speech, not an error.
pub trait Transcriber: Send + Sync {
    fn transcribe(&self, audio: &[u8], language: &str) -> Result<String, TranscriptionError>;
}

/// Single-turn chat completion.
///
/// The returned text may be empty or may not be valid JSON even when JSON
/// was requested — callers must not assume well-formedness.
pub trait CompletionModel: Send + Sync {
    fn complete(&self, prompt: &str, temperature: f32) -> Result<String, CompletionError>;
}

/// Renders a validated record plus narrative into an opaque document.
pub trait DocumentRenderer: Send + Sync {
    fn render(&self, request: &crate::pipeline::RenderRequest) -> Result<Vec<u8>, RenderError>;
}

/// Outbound transport back to the submitter.
///
/// Fire-and-forget from the pipeline's perspective: failures are reported
/// per segment, never retried here.
pub trait DeliverySink: Send + Sync {
    fn deliver(
        &self,
        document: &[u8],
        destination: &str,
        filename: &str,
    ) -> Result<(), DeliveryError>;

    fn notify(&self, destination: &str, text: &str) -> Result<(), DeliveryError>;
}
