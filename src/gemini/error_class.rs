//! Classification of Gemini error messages.
//!
//! The v1beta API reports failures as free-form strings, so retry and
//! unsupported-media decisions come down to substring matching. That fragile
//! contract is confined to this module: if the service ever grows structured
//! error codes, only the classifier implementation changes.

use crate::gemini::GeminiError;

/// What the invoker should do with a failed `generateContent` attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The service rejected the media MIME type
    UnsupportedMime,
    /// Quota/permission/rate-limit signature, worth retrying after a pause
    Transient,
    /// Anything else, propagated immediately
    Fatal,
}

/// Maps a provider error to an [`ErrorClass`]
pub trait ErrorClassifier: Send + Sync {
    /// Classify one error
    fn classify(&self, error: &GeminiError) -> ErrorClass;
}

/// Substring rules observed on the v1beta endpoint
#[derive(Debug, Clone, Copy, Default)]
pub struct GeminiV1BetaClassifier;

const TRANSIENT_MARKERS: &[&str] = &["403", "429", "permission", "quota"];

impl ErrorClassifier for GeminiV1BetaClassifier {
    fn classify(&self, error: &GeminiError) -> ErrorClass {
        let msg = error.to_string().to_lowercase();
        if msg.contains("mimetype parameter") && msg.contains("not supported") {
            return ErrorClass::UnsupportedMime;
        }
        if TRANSIENT_MARKERS.iter().any(|m| msg.contains(m)) {
            return ErrorClass::Transient;
        }
        ErrorClass::Fatal
    }
}
