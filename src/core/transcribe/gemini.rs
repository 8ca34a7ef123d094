//! Transcription through the Gemini `generateContent` REST API.
//!
//! The PCM chunk is framed as WAV, base64-encoded and sent as `inline_data`
//! next to a fixed instruction prompt. The answer text is the concatenation
//! of the first candidate's text parts.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info};

use super::wav::pcm_to_wav;
use super::{TranscribeError, TranscribeResult, Transcriber};

pub const DEFAULT_TRANSCRIPTION_MODEL: &str = "gemini-1.5-flash-8b";
pub const DEFAULT_GEMINI_API_BASE_URL: &str = "https://generativelanguage.googleapis.com";

pub const TRANSCRIPTION_PROMPT: &str = "Please transcribe the spoken language in this audio accurately. Ignore any background noise or non-speech sounds.";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// =============================================================================
// Wire Types
// =============================================================================

#[derive(Debug, Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum RequestPart<'a> {
    Text { text: &'a str },
    InlineData { inline_data: InlineData },
}

#[derive(Debug, Serialize)]
struct InlineData {
    mime_type: &'static str,
    data: String,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleErrorResponse {
    error: GoogleErrorBody,
}

#[derive(Debug, Deserialize)]
struct GoogleErrorBody {
    message: String,
    #[serde(default)]
    status: Option<String>,
}

// =============================================================================
// Client
// =============================================================================

#[derive(Debug, Clone)]
pub struct GeminiTranscriber {
    http: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl GeminiTranscriber {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> TranscribeResult<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(TranscribeError::InvalidConfiguration(
                "Gemini API key is required".to_string(),
            ));
        }
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| {
                TranscribeError::InvalidConfiguration(format!("Failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            http,
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        let model = self.model.trim_start_matches("models/");
        format!("{}/v1beta/models/{}:generateContent", self.base_url, model)
    }

    fn extract_text(body: &str) -> TranscribeResult<String> {
        let response: GenerateContentResponse = serde_json::from_str(body)
            .map_err(|e| TranscribeError::InvalidResponse(e.to_string()))?;

        let candidate = response
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| TranscribeError::InvalidResponse("no candidates".to_string()))?;

        Ok(candidate
            .content
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect::<String>()
            })
            .unwrap_or_default())
    }
}

#[async_trait]
impl Transcriber for GeminiTranscriber {
    async fn transcribe(&self, pcm_base64: &str) -> TranscribeResult<String> {
        let pcm = BASE64
            .decode(pcm_base64.trim())
            .map_err(|e| TranscribeError::InvalidAudio(e.to_string()))?;
        let wav = pcm_to_wav(&pcm);
        let started = Instant::now();

        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![
                    RequestPart::Text {
                        text: TRANSCRIPTION_PROMPT,
                    },
                    RequestPart::InlineData {
                        inline_data: InlineData {
                            mime_type: "audio/wav",
                            data: BASE64.encode(&wav),
                        },
                    },
                ],
            }],
        };

        debug!(model = %self.model, bytes = wav.len(), "Sending transcription request");
        let response = self
            .http
            .post(self.endpoint())
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await
            .map_err(|e| TranscribeError::RequestFailed(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| TranscribeError::RequestFailed(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            let message = match serde_json::from_str::<GoogleErrorResponse>(&body) {
                Ok(err) => match err.error.status {
                    Some(code) => format!("{} ({code})", err.error.message),
                    None => err.error.message,
                },
                Err(_) => body,
            };
            return Err(TranscribeError::ServiceError {
                status: status.as_u16(),
                message,
            });
        }

        let text = Self::extract_text(&body)?;
        info!(
            model = %self.model,
            chars = text.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Transcription complete"
        );
        Ok(text)
    }

    fn provider_name(&self) -> &'static str {
        "gemini"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn transcriber(base_url: &str) -> GeminiTranscriber {
        GeminiTranscriber::new("test-key", base_url, DEFAULT_TRANSCRIPTION_MODEL).unwrap()
    }

    #[test]
    fn test_requires_api_key() {
        let result = GeminiTranscriber::new("", DEFAULT_GEMINI_API_BASE_URL, "m");
        assert!(matches!(result, Err(TranscribeError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_endpoint() {
        let t = GeminiTranscriber::new("k", "https://example.com/", "models/gemini-x").unwrap();
        assert_eq!(
            t.endpoint(),
            "https://example.com/v1beta/models/gemini-x:generateContent"
        );
    }

    #[test]
    fn test_extract_text_joins_parts() {
        let body = json!({
            "candidates": [{"content": {"parts": [{"text": "hello "}, {"text": "world"}]}}]
        })
        .to_string();
        assert_eq!(GeminiTranscriber::extract_text(&body).unwrap(), "hello world");

        let empty = json!({"candidates": []}).to_string();
        assert!(GeminiTranscriber::extract_text(&empty).is_err());
    }

    #[tokio::test]
    async fn test_transcribe_round_trip() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!(
                "/v1beta/models/{DEFAULT_TRANSCRIPTION_MODEL}:generateContent"
            )))
            .and(query_param("key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"content": {"parts": [{"text": "good morning"}]}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let pcm = BASE64.encode([0u8, 0, 1, 0]);
        let text = transcriber(&server.uri()).transcribe(&pcm).await.unwrap();
        assert_eq!(text, "good morning");

        let requests = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        let parts = &body["contents"][0]["parts"];
        assert_eq!(parts[0]["text"], json!(TRANSCRIPTION_PROMPT));
        assert_eq!(parts[1]["inline_data"]["mime_type"], json!("audio/wav"));
        let wav = BASE64
            .decode(parts[1]["inline_data"]["data"].as_str().unwrap())
            .unwrap();
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(wav.len(), 48);
    }

    #[tokio::test]
    async fn test_service_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "error": {"code": 403, "message": "API key invalid", "status": "PERMISSION_DENIED"}
            })))
            .mount(&server)
            .await;

        let pcm = BASE64.encode([0u8, 0]);
        let err = transcriber(&server.uri()).transcribe(&pcm).await.unwrap_err();
        match err {
            TranscribeError::ServiceError { status, message } => {
                assert_eq!(status, 403);
                assert!(message.contains("API key invalid"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_invalid_base64() {
        let err = transcriber("http://127.0.0.1:1")
            .transcribe("***not base64***")
            .await
            .unwrap_err();
        assert!(matches!(err, TranscribeError::InvalidAudio(_)));
    }
}
