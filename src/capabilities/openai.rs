//! OpenAI-backed capability clients (Whisper transcription + chat completion),
//! plus the mock implementations used across the test suite.

use std::collections::VecDeque;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use super::{CompletionError, CompletionModel, Transcriber, TranscriptionError};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// HTTP client for the OpenAI transcription and chat-completion endpoints.
pub struct OpenAiClient {
    base_url: String,
    api_key: String,
    model: String,
    transcription_model: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl OpenAiClient {
    pub fn new(
        base_url: &str,
        api_key: String,
        model: String,
        transcription_model: String,
        timeout_secs: u64,
    ) -> Result<Self, CompletionError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| CompletionError::HttpClient(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
            transcription_model,
            client,
            timeout_secs,
        })
    }

    /// Client against api.openai.com, configured from a `PipelineConfig`.
    /// The API key comes from `OPENAI_API_KEY`.
    pub fn from_env(config: &crate::config::PipelineConfig) -> Result<Self, CompletionError> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| CompletionError::HttpClient("OPENAI_API_KEY is not set".to_string()))?;
        Self::new(
            DEFAULT_BASE_URL,
            api_key,
            config.model.clone(),
            config.transcription_model.clone(),
            config.request_timeout_secs,
        )
    }

    fn map_send_error(&self, e: reqwest::Error) -> CompletionError {
        if e.is_connect() {
            CompletionError::Connection(self.base_url.clone())
        } else if e.is_timeout() {
            CompletionError::HttpClient(format!(
                "request timed out after {}s",
                self.timeout_secs
            ))
        } else {
            CompletionError::HttpClient(e.to_string())
        }
    }
}

/// Request body for /chat/completions
#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

/// Response body from /chat/completions
#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// Response body from /audio/transcriptions
#[derive(Deserialize)]
struct TranscriptionResponse {
    text: String,
}

impl CompletionModel for OpenAiClient {
    fn complete(&self, prompt: &str, temperature: f32) -> Result<String, CompletionError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = ChatRequest {
            model: &self.model,
            temperature,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(CompletionError::Service {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response
            .json()
            .map_err(|e| CompletionError::ResponseParsing(e.to_string()))?;

        Ok(parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default())
    }
}

impl Transcriber for OpenAiClient {
    fn transcribe(&self, audio: &[u8], language: &str) -> Result<String, TranscriptionError> {
        let url = format!("{}/audio/transcriptions", self.base_url);

        let part = reqwest::blocking::multipart::Part::bytes(audio.to_vec())
            .file_name("voice.ogg")
            .mime_str("audio/ogg")
            .map_err(|e| TranscriptionError::HttpClient(e.to_string()))?;

        let form = reqwest::blocking::multipart::Form::new()
            .part("file", part)
            .text("model", self.transcription_model.clone())
            .text("language", language.to_string());

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .map_err(|e| {
                if e.is_connect() {
                    TranscriptionError::Connection(self.base_url.clone())
                } else if e.is_timeout() {
                    TranscriptionError::HttpClient(format!(
                        "request timed out after {}s",
                        self.timeout_secs
                    ))
                } else {
                    TranscriptionError::HttpClient(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(TranscriptionError::Service {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: TranscriptionResponse = response
            .json()
            .map_err(|e| TranscriptionError::ResponseParsing(e.to_string()))?;

        Ok(parsed.text)
    }
}

/// Mock completion model — returns one configurable response for every call.
pub struct MockCompletion {
    response: String,
}

impl MockCompletion {
    pub fn new(response: &str) -> Self {
        Self {
            response: response.to_string(),
        }
    }
}

impl CompletionModel for MockCompletion {
    fn complete(&self, _prompt: &str, _temperature: f32) -> Result<String, CompletionError> {
        Ok(self.response.clone())
    }
}

/// Mock completion model that plays back a queue of per-call outcomes.
///
/// Lets a test make the first extraction call fail and the second succeed,
/// which is how the partial-failure semantics are exercised.
pub struct ScriptedCompletion {
    script: Mutex<VecDeque<Result<String, String>>>,
}

impl ScriptedCompletion {
    pub fn new(script: Vec<Result<String, String>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
        }
    }
}

impl CompletionModel for ScriptedCompletion {
    fn complete(&self, _prompt: &str, _temperature: f32) -> Result<String, CompletionError> {
        let next = self
            .script
            .lock()
            .map_err(|_| CompletionError::HttpClient("script lock poisoned".to_string()))?
            .pop_front();

        match next {
            Some(Ok(text)) => Ok(text),
            Some(Err(body)) => Err(CompletionError::Service { status: 500, body }),
            None => Err(CompletionError::HttpClient("script exhausted".to_string())),
        }
    }
}

/// Mock transcriber — returns a fixed transcript, or a service error.
pub struct MockTranscriber {
    transcript: Result<String, String>,
}

impl MockTranscriber {
    pub fn new(transcript: &str) -> Self {
        Self {
            transcript: Ok(transcript.to_string()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            transcript: Err(message.to_string()),
        }
    }
}

impl Transcriber for MockTranscriber {
    fn transcribe(&self, _audio: &[u8], _language: &str) -> Result<String, TranscriptionError> {
        match &self.transcript {
            Ok(text) => Ok(text.clone()),
            Err(body) => Err(TranscriptionError::Service {
                status: 500,
                body: body.clone(),
            }),
        }
    }
}
