//! Upload-and-poll protocol for media the service processes out-of-band.
//!
//! Audio, video, PDFs and generic documents are registered with the File API
//! and polled on a fixed interval until they leave the PROCESSING state.

use crate::config::{UPLOAD_POLL_INTERVAL_SECS, UPLOAD_POLL_MAX_ATTEMPTS};
use crate::gemini::types::{FileState, UploadedFile};
use crate::gemini::{GeminiError, InferenceBackend};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

/// Register `path` with the File API and wait until it is ready.
///
/// Polls every [`UPLOAD_POLL_INTERVAL_SECS`] seconds while the file is
/// processing, up to [`UPLOAD_POLL_MAX_ATTEMPTS`] polls. `category` names the
/// media kind in user-facing failure messages ("video", "audio", ...).
pub async fn upload_and_poll(
    backend: &dyn InferenceBackend,
    path: &Path,
    mime_type: &str,
    category: &str,
) -> Result<UploadedFile, GeminiError> {
    let mut file = backend.upload_file(path, mime_type).await?;
    let mut polls = 0usize;

    while file.state == FileState::Processing {
        if polls >= UPLOAD_POLL_MAX_ATTEMPTS {
            warn!(name = %file.name, category, "Gave up waiting for file processing");
            return Err(GeminiError::PollTimeout {
                category: capitalize(category),
            });
        }
        polls += 1;
        tokio::time::sleep(Duration::from_secs(UPLOAD_POLL_INTERVAL_SECS)).await;
        file = backend.get_file(&file.name).await?;
    }

    if file.state == FileState::Failed {
        return Err(GeminiError::FileProcessing {
            category: capitalize(category),
        });
    }

    debug!(name = %file.name, polls, "File ready");
    Ok(file)
}

/// First character uppercased, the rest lowercased
fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}
