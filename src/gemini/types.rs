//! Request and response payload types for the Gemini v1beta REST API.

use serde::{Deserialize, Serialize};

/// One ordered part of a `generateContent` request.
///
/// Serialized untagged so each variant becomes the exact JSON object the API
/// expects: `{"text": ...}`, `{"inline_data": ...}` or `{"file_data": ...}`.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Part {
    /// Plain text segment
    Text {
        /// Prompt text
        text: String,
    },
    /// Base64-encoded media embedded in the request
    Inline {
        /// Inline payload
        inline_data: InlineData,
    },
    /// Reference to a file previously registered with the File API
    File {
        /// Uploaded file reference
        file_data: FileData,
    },
}

impl Part {
    /// Text part from anything string-like
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Inline media part from already-encoded base64 data
    pub fn inline(mime_type: impl Into<String>, data: String) -> Self {
        Self::Inline {
            inline_data: InlineData {
                mime_type: mime_type.into(),
                data,
            },
        }
    }

    /// File reference part pointing at an uploaded file
    #[must_use]
    pub fn file(file: &UploadedFile) -> Self {
        Self::File {
            file_data: FileData {
                mime_type: file.mime_type.clone(),
                file_uri: file.uri.clone(),
            },
        }
    }
}

/// Inline base64 media payload
#[derive(Debug, Clone, Serialize)]
pub struct InlineData {
    /// MIME type of the payload
    pub mime_type: String,
    /// Base64-encoded bytes
    pub data: String,
}

/// Reference to an uploaded file
#[derive(Debug, Clone, Serialize)]
pub struct FileData {
    /// MIME type recorded at upload time
    pub mime_type: Option<String>,
    /// `files/...` URI returned by the upload call
    pub file_uri: String,
}

/// Sampling configuration for a `generateContent` call
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    /// Sampling temperature
    pub temperature: f32,
    /// Nucleus sampling bound
    pub top_p: f32,
    /// Top-k sampling bound
    pub top_k: i32,
    /// Output token ceiling
    pub max_output_tokens: u32,
}

impl GenerationConfig {
    /// The constrained configuration used by the recipe command
    #[must_use]
    pub fn cook() -> Self {
        use crate::config::{COOK_MAX_OUTPUT_TOKENS, COOK_TEMPERATURE, COOK_TOP_K, COOK_TOP_P};
        Self {
            temperature: COOK_TEMPERATURE,
            top_p: COOK_TOP_P,
            top_k: COOK_TOP_K,
            max_output_tokens: COOK_MAX_OUTPUT_TOKENS,
        }
    }
}

/// Processing state of a file registered with the File API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileState {
    /// Still being processed server-side
    Processing,
    /// Ready for use in a `generateContent` call
    Active,
    /// Server-side processing failed
    Failed,
    /// Any state this client does not know about
    #[serde(other)]
    Unspecified,
}

/// File registered with the File API, polled until it leaves `Processing`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    /// Resource name, `files/...`
    pub name: String,
    /// Download/reference URI used in `file_data` parts
    pub uri: String,
    /// MIME type recorded by the service
    #[serde(default)]
    pub mime_type: Option<String>,
    /// Current processing state
    pub state: FileState,
}

/// Wrapper object returned by the upload endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct UploadResponse {
    /// The registered file
    pub file: UploadedFile,
}

/// Response of a `generateContent` call
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerateContentResponse {
    /// Generated candidates; empty when the model produced nothing
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

impl GenerateContentResponse {
    /// True when the call succeeded but produced no candidates
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Concatenated text of the first candidate, if any
    #[must_use]
    pub fn text(&self) -> Option<String> {
        let parts = self
            .candidates
            .first()?
            .content
            .as_ref()?
            .parts
            .as_ref()?;
        let text: String = parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect::<Vec<_>>()
            .join("");
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

/// One generated candidate
#[derive(Debug, Clone, Deserialize)]
pub struct Candidate {
    /// Candidate content; absent when generation was blocked
    pub content: Option<CandidateContent>,
}

/// Content of a candidate
#[derive(Debug, Clone, Deserialize)]
pub struct CandidateContent {
    /// Ordered response parts
    pub parts: Option<Vec<CandidatePart>>,
}

/// One part of a candidate's content
#[derive(Debug, Clone, Deserialize)]
pub struct CandidatePart {
    /// Text of this part, if it is a text part
    pub text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_part_serialization_shapes() {
        let text = serde_json::to_value(Part::text("hello")).expect("serialize");
        assert_eq!(text, json!({"text": "hello"}));

        let inline = serde_json::to_value(Part::inline("image/jpeg", "QUJD".to_string()))
            .expect("serialize");
        assert_eq!(
            inline,
            json!({"inline_data": {"mime_type": "image/jpeg", "data": "QUJD"}})
        );

        let file = UploadedFile {
            name: "files/abc".to_string(),
            uri: "https://example.com/files/abc".to_string(),
            mime_type: Some("video/mp4".to_string()),
            state: FileState::Active,
        };
        let part = serde_json::to_value(Part::file(&file)).expect("serialize");
        assert_eq!(
            part,
            json!({"file_data": {"mime_type": "video/mp4", "file_uri": "https://example.com/files/abc"}})
        );
    }

    #[test]
    fn test_generation_config_camel_case() {
        let value = serde_json::to_value(GenerationConfig::cook()).expect("serialize");
        assert_eq!(value["topP"], json!(0.95));
        assert_eq!(value["topK"], json!(40));
        assert_eq!(value["maxOutputTokens"], json!(1024));
    }

    #[test]
    fn test_file_state_deserialization() {
        let file: UploadedFile = serde_json::from_value(json!({
            "name": "files/xyz",
            "uri": "https://example.com/files/xyz",
            "mimeType": "audio/ogg",
            "state": "PROCESSING"
        }))
        .expect("deserialize");
        assert_eq!(file.state, FileState::Processing);

        let failed: FileState = serde_json::from_value(json!("FAILED")).expect("deserialize");
        assert_eq!(failed, FileState::Failed);

        let unknown: FileState =
            serde_json::from_value(json!("SOMETHING_NEW")).expect("deserialize");
        assert_eq!(unknown, FileState::Unspecified);
    }

    #[test]
    fn test_response_text_extraction() {
        let response: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": {"parts": [{"text": "Hello "}, {"text": "world"}]}
            }]
        }))
        .expect("deserialize");
        assert!(!response.is_empty());
        assert_eq!(response.text().as_deref(), Some("Hello world"));
    }

    #[test]
    fn test_response_empty_candidates() {
        let response: GenerateContentResponse =
            serde_json::from_value(json!({})).expect("deserialize");
        assert!(response.is_empty());
        assert_eq!(response.text(), None);
    }
}
