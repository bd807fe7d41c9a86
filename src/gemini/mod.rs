//! Gemini v1beta REST client: content generation and the File API.

pub mod error_class;
pub mod types;
pub mod upload;

use crate::config::get_gemini_http_timeout_secs;
use reqwest::Client as HttpClient;
use serde_json::{json, Value};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use types::{GenerateContentResponse, GenerationConfig, Part, UploadResponse, UploadedFile};

const API_BASE: &str = "https://generativelanguage.googleapis.com";

/// Errors from the Gemini API or the plumbing around it
#[derive(Debug, Error)]
pub enum GeminiError {
    /// Non-success response from the API
    #[error("API error: {0}")]
    Api(String),
    /// Network-level failure
    #[error("Network error: {0}")]
    Network(String),
    /// Malformed response payload
    #[error("JSON error: {0}")]
    Json(String),
    /// Local file read failure
    #[error("IO error: {0}")]
    Io(String),
    /// Server-side processing of an uploaded file ended in FAILED
    #[error("{category} failed to process")]
    FileProcessing {
        /// Display name of the media category, e.g. "Video"
        category: String,
    },
    /// The upload never left PROCESSING within the poll bound
    #[error("{category} processing timed out")]
    PollTimeout {
        /// Display name of the media category
        category: String,
    },
}

/// The remote generation surface the pipeline talks to.
///
/// One real implementation ([`GeminiClient`]); mocked in tests so retry and
/// dispatch behavior is verifiable without a network.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait InferenceBackend: Send + Sync {
    /// Run one `generateContent` call over the given parts
    async fn generate(
        &self,
        parts: &[Part],
        cook_mode: bool,
    ) -> Result<GenerateContentResponse, GeminiError>;

    /// Register a local file with the File API
    async fn upload_file(
        &self,
        path: &Path,
        mime_type: &str,
    ) -> Result<UploadedFile, GeminiError>;

    /// Fetch the current state of a registered file
    async fn get_file(&self, name: &str) -> Result<UploadedFile, GeminiError>;
}

/// HTTP client for the Gemini v1beta endpoint
pub struct GeminiClient {
    http: HttpClient,
    api_key: String,
    model: String,
}

impl GeminiClient {
    /// Create a client for the given key and model identifier
    #[must_use]
    pub fn new(api_key: String, model: String) -> Self {
        let timeout = Duration::from_secs(get_gemini_http_timeout_secs());
        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| HttpClient::new());
        Self {
            http,
            api_key,
            model,
        }
    }
}

#[async_trait::async_trait]
impl InferenceBackend for GeminiClient {
    async fn generate(
        &self,
        parts: &[Part],
        cook_mode: bool,
    ) -> Result<GenerateContentResponse, GeminiError> {
        let url = format!(
            "{API_BASE}/v1beta/models/{}:generateContent?key={}",
            self.model, self.api_key
        );

        let mut body = json!({
            "contents": [{"parts": parts}],
        });
        if cook_mode {
            body["generationConfig"] = serde_json::to_value(GenerationConfig::cook())
                .map_err(|e| GeminiError::Json(e.to_string()))?;
        }

        debug!(model = %self.model, cook_mode, parts = parts.len(), "Sending generateContent request");
        let res = send_json_request(&self.http, &url, &body).await?;
        serde_json::from_value(res).map_err(|e| GeminiError::Json(e.to_string()))
    }

    async fn upload_file(
        &self,
        path: &Path,
        mime_type: &str,
    ) -> Result<UploadedFile, GeminiError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| GeminiError::Io(e.to_string()))?;
        let url = format!("{API_BASE}/upload/v1beta/files?key={}", self.api_key);

        debug!(mime_type, size = bytes.len(), "Uploading file to Gemini");
        let response = self
            .http
            .post(&url)
            .header("X-Goog-Upload-Protocol", "raw")
            .header(reqwest::header::CONTENT_TYPE, mime_type)
            .body(bytes)
            .send()
            .await
            .map_err(|e| GeminiError::Network(e.to_string()))?;

        let value = check_response(response).await?;
        let upload: UploadResponse =
            serde_json::from_value(value).map_err(|e| GeminiError::Json(e.to_string()))?;
        Ok(upload.file)
    }

    async fn get_file(&self, name: &str) -> Result<UploadedFile, GeminiError> {
        let url = format!("{API_BASE}/v1beta/{name}?key={}", self.api_key);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| GeminiError::Network(e.to_string()))?;

        let value = check_response(response).await?;
        serde_json::from_value(value).map_err(|e| GeminiError::Json(e.to_string()))
    }
}

/// POST a JSON body and return the parsed JSON response.
async fn send_json_request(
    client: &HttpClient,
    url: &str,
    body: &Value,
) -> Result<Value, GeminiError> {
    let response = client
        .post(url)
        .json(body)
        .send()
        .await
        .map_err(|e| GeminiError::Network(e.to_string()))?;
    check_response(response).await
}

/// Map a non-success status to `GeminiError::Api`, otherwise parse the body.
async fn check_response(response: reqwest::Response) -> Result<Value, GeminiError> {
    if !response.status().is_success() {
        let status = response.status();
        let error_text = response.text().await.unwrap_or_default();

        // Proxies occasionally answer with HTML error pages
        let is_html = error_text.trim_start().starts_with("<!DOCTYPE")
            || error_text.trim_start().starts_with("<html")
            || error_text.trim_start().starts_with("<HTML");

        let message = if is_html {
            format!("{status} (server returned HTML error page)")
        } else {
            let truncated = crate::utils::truncate_str(&error_text, 500);
            format!("{status} - {truncated}")
        };
        return Err(GeminiError::Api(message));
    }

    response
        .json()
        .await
        .map_err(|e| GeminiError::Json(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_processing_error_message() {
        let err = GeminiError::FileProcessing {
            category: "Video".to_string(),
        };
        assert_eq!(err.to_string(), "Video failed to process");
    }

    #[test]
    fn test_poll_timeout_error_message() {
        let err = GeminiError::PollTimeout {
            category: "Audio".to_string(),
        };
        assert_eq!(err.to_string(), "Audio processing timed out");
    }
}
