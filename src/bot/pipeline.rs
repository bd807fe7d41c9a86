//! The shared media pipeline behind every command.
//!
//! One pass per command: classify the replied-to attachment, download it into
//! an owned temp file, materialize the Gemini request parts (inline image or
//! upload-and-poll file handle), invoke the model with bounded retry, and
//! deliver the answer back into the chat. The temp file is removed on every
//! exit path by the [`TempFile`] guard.

use crate::bot::attachment::{Attachment, AttachmentKind, ExpectedMedia};
use crate::bot::resilient::{
    delete_message_resilient, edit_message_resilient, edit_message_safe,
    send_message_resilient,
};
use crate::config::{GENERATE_MAX_ATTEMPTS, TELEGRAM_MESSAGE_LIMIT, TRANSIENT_RETRY_DELAY_SECS};
use crate::gemini::error_class::{ErrorClass, ErrorClassifier, GeminiV1BetaClassifier};
use crate::gemini::types::{GenerateContentResponse, Part};
use crate::gemini::upload::upload_and_poll;
use crate::gemini::{GeminiError, InferenceBackend};
use crate::utils::{format_text, split_long_message, TempFile};
use anyhow::Result;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use std::path::Path;
use std::time::Duration;
use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::{ChatId, MessageId, ParseMode};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

/// Per-command configuration bound onto the shared pipeline
#[derive(Debug, Clone)]
pub struct PipelineRequest {
    /// Command name for usage strings
    pub command: &'static str,
    /// Prompt text, defaulted per command
    pub prompt: String,
    /// Echo the prompt into the reply (only when the user supplied one)
    pub show_prompt: bool,
    /// Use the constrained recipe generation config
    pub cook_mode: bool,
    /// Media category constraint, if the command has one
    pub expected: Option<ExpectedMedia>,
    /// Status placeholder shown while processing
    pub status: &'static str,
}

/// Failures of one pipeline pass. `Display` is the exact user-visible text.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// No materialization rule matched the attachment kind
    #[error("Unsupported file type")]
    UnsupportedKind,
    /// The downloaded image failed to decode
    #[error("Invalid or corrupted image file.")]
    CorruptImage,
    /// The service rejected the media MIME type and no category was expected
    #[error("Invalid file type. Please try again.")]
    UnsupportedMedia,
    /// Upload processing failed or timed out, reported verbatim
    #[error("{0}")]
    Upload(GeminiError),
    /// Any other service failure, shown formatted
    #[error("Error: {0}")]
    Service(GeminiError),
}

impl PipelineError {
    fn from_gemini(e: GeminiError) -> Self {
        match e {
            GeminiError::FileProcessing { .. } | GeminiError::PollTimeout { .. } => {
                Self::Upload(e)
            }
            other => Self::Service(other),
        }
    }
}

/// Handle one command end to end. Every outcome, success or failure, leaves
/// the chat with a final edited or replied message.
pub async fn run(
    bot: &Bot,
    msg: &Message,
    backend: &dyn InferenceBackend,
    req: &PipelineRequest,
) -> Result<()> {
    let chat_id = msg.chat.id;

    let Some(reply) = msg.reply_to_message() else {
        send_message_resilient(bot, chat_id, usage_text(req), None, Some(msg.id)).await?;
        return Ok(());
    };

    let attachment = match Attachment::from_message(reply) {
        Some(att) if att.matches(req.expected) => att,
        _ => {
            let text = invalid_file_text(req.expected);
            send_message_resilient(bot, chat_id, text, None, Some(msg.id)).await?;
            return Ok(());
        }
    };

    let placeholder = send_message_resilient(bot, chat_id, req.status, None, Some(msg.id)).await?;

    let temp = TempFile::with_extension(&attachment.extension());
    if let Err(e) = download_to(bot, &attachment, temp.path()).await {
        warn!(error = %e, "Attachment download failed");
        edit_message_safe(bot, chat_id, placeholder.id, "Failed to process the file. Try again.")
            .await;
        return Ok(());
    }

    match process(backend, &attachment, temp.path(), req).await {
        Ok(Some(text)) => deliver(bot, chat_id, msg.id, placeholder.id, &text).await?,
        Ok(None) => {
            edit_message_safe(bot, chat_id, placeholder.id, "Could not generate response.").await;
        }
        Err(e) => {
            edit_message_safe(bot, chat_id, placeholder.id, &e.to_string()).await;
        }
    }

    Ok(())
}

/// Materialize and invoke; `Ok(None)` means the model produced no candidates.
async fn process(
    backend: &dyn InferenceBackend,
    attachment: &Attachment,
    path: &Path,
    req: &PipelineRequest,
) -> Result<Option<String>, PipelineError> {
    let parts = materialize(backend, attachment, path, &req.prompt).await?;
    let classifier = GeminiV1BetaClassifier;
    let response = invoke(backend, &classifier, &parts, req.cook_mode, req.expected).await?;

    if response.is_empty() {
        info!(command = req.command, "Model returned no candidates");
        return Ok(None);
    }
    Ok(Some(compose_result(req, &response)))
}

/// Download the attachment into the temp file, retrying transient failures.
async fn download_to(bot: &Bot, attachment: &Attachment, path: &Path) -> Result<()> {
    crate::utils::retry_telegram_operation(|| async {
        let file = bot
            .get_file(attachment.file_id.clone())
            .await
            .map_err(|e| anyhow::anyhow!("Telegram get_file error: {e}"))?;
        let mut dst = tokio::fs::File::create(path).await?;
        bot.download_file(&file.path, &mut dst)
            .await
            .map_err(|e| anyhow::anyhow!("Telegram download error: {e}"))?;
        dst.flush().await?;
        Ok(())
    })
    .await?;

    if !path.exists() {
        anyhow::bail!("downloaded file missing at {}", path.display());
    }
    Ok(())
}

/// Build the ordered request parts for the attachment, first match wins.
///
/// Images are decoded locally as an integrity check and embedded inline;
/// everything else goes through upload-and-poll. Audio-like media and generic
/// documents put the file handle before the prompt, the observed calling
/// convention of the service.
pub async fn materialize(
    backend: &dyn InferenceBackend,
    attachment: &Attachment,
    path: &Path,
    prompt: &str,
) -> Result<Vec<Part>, PipelineError> {
    let upload = |category: &'static str| async move {
        upload_and_poll(backend, path, &attachment.upload_mime(), category)
            .await
            .map_err(PipelineError::from_gemini)
    };

    match attachment.kind {
        AttachmentKind::Photo => {
            let bytes = tokio::fs::read(path)
                .await
                .map_err(|e| PipelineError::Service(GeminiError::Io(e.to_string())))?;
            image::load_from_memory(&bytes).map_err(|_| PipelineError::CorruptImage)?;
            Ok(vec![
                Part::text(prompt),
                Part::inline("image/jpeg", BASE64.encode(&bytes)),
            ])
        }
        AttachmentKind::Video | AttachmentKind::VideoNote => {
            let file = upload("video").await?;
            Ok(vec![Part::text(prompt), Part::file(&file)])
        }
        AttachmentKind::Audio | AttachmentKind::Voice => {
            let file = upload("audio").await?;
            Ok(vec![Part::file(&file), Part::text(prompt)])
        }
        AttachmentKind::Document if path.to_string_lossy().ends_with(".pdf") => {
            let file = upload("PDF").await?;
            Ok(vec![Part::text(prompt), Part::file(&file)])
        }
        AttachmentKind::Document => {
            let file = upload("document").await?;
            Ok(vec![Part::file(&file), Part::text(prompt)])
        }
    }
}

/// Invoke the model with up to [`GENERATE_MAX_ATTEMPTS`] attempts.
///
/// Transient errors pause [`TRANSIENT_RETRY_DELAY_SECS`] seconds between
/// attempts; an unsupported-MIME rejection short-circuits (friendly message
/// when no category was expected, propagated otherwise); anything else
/// propagates immediately.
pub async fn invoke(
    backend: &dyn InferenceBackend,
    classifier: &dyn ErrorClassifier,
    parts: &[Part],
    cook_mode: bool,
    expected: Option<ExpectedMedia>,
) -> Result<GenerateContentResponse, PipelineError> {
    let mut last_transient = None;

    for attempt in 1..=GENERATE_MAX_ATTEMPTS {
        match backend.generate(parts, cook_mode).await {
            Ok(response) => return Ok(response),
            Err(e) => match classifier.classify(&e) {
                ErrorClass::UnsupportedMime => {
                    return Err(if expected.is_none() {
                        PipelineError::UnsupportedMedia
                    } else {
                        PipelineError::Service(e)
                    });
                }
                ErrorClass::Transient => {
                    warn!(attempt, error = %e, "Transient inference error, will retry");
                    last_transient = Some(e);
                    if attempt < GENERATE_MAX_ATTEMPTS {
                        tokio::time::sleep(Duration::from_secs(TRANSIENT_RETRY_DELAY_SECS)).await;
                    }
                }
                ErrorClass::Fatal => return Err(PipelineError::Service(e)),
            },
        }
    }

    Err(PipelineError::Service(last_transient.unwrap_or_else(|| {
        GeminiError::Api("retry attempts exhausted".to_string())
    })))
}

/// Final reply text: echoed prompt (when the command supplied one) plus the
/// answer, with a stand-in when the candidate had no text.
#[must_use]
pub fn compose_result(req: &PipelineRequest, response: &GenerateContentResponse) -> String {
    let answer = response
        .text()
        .unwrap_or_else(|| "No content generated.".to_string());
    let mut out = String::new();
    if req.show_prompt {
        out.push_str(&format!("Prompt: {}\n", req.prompt));
    }
    out.push_str("Answer: ");
    out.push_str(&answer);
    out
}

/// Rejection text for a missing or wrong-category attachment
#[must_use]
pub fn invalid_file_text(expected: Option<ExpectedMedia>) -> String {
    let label = expected.map_or("supported", ExpectedMedia::label);
    format!("Invalid {label} file. Please try again.")
}

/// Usage string shown when the command was not a reply to a file
#[must_use]
pub fn usage_text(req: &PipelineRequest) -> String {
    match req.expected {
        Some(kind) => format!(
            "Usage: /{} [custom prompt] [Reply to a {}]",
            req.command,
            kind.label()
        ),
        None => format!("Usage: /{} [prompt] [Reply to a file]", req.command),
    }
}

/// Send the final text: short answers edit the placeholder in place, long
/// ones go out as consecutive chunks before the placeholder is deleted.
async fn deliver(
    bot: &Bot,
    chat_id: ChatId,
    origin: MessageId,
    placeholder: MessageId,
    text: &str,
) -> Result<()> {
    if text.len() > TELEGRAM_MESSAGE_LIMIT {
        for part in split_long_message(text, TELEGRAM_MESSAGE_LIMIT) {
            send_message_resilient(
                bot,
                chat_id,
                format_text(&part),
                Some(ParseMode::Html),
                Some(origin),
            )
            .await?;
        }
        delete_message_resilient(bot, chat_id, placeholder).await;
    } else {
        let formatted = format_text(text);
        let edited =
            edit_message_resilient(bot, chat_id, placeholder, formatted, Some(ParseMode::Html))
                .await;
        if edited.is_err() {
            // Markup rejection must not leave the placeholder stuck
            edit_message_safe(bot, chat_id, placeholder, text).await;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gemini::types::{Candidate, CandidateContent, CandidatePart};
    use crate::gemini::MockInferenceBackend;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use teloxide::types::FileId;

    fn response_with_text(text: &str) -> GenerateContentResponse {
        GenerateContentResponse {
            candidates: vec![Candidate {
                content: Some(CandidateContent {
                    parts: Some(vec![CandidatePart {
                        text: Some(text.to_string()),
                    }]),
                }),
            }],
        }
    }

    fn request(expected: Option<ExpectedMedia>) -> PipelineRequest {
        PipelineRequest {
            command: "process",
            prompt: "Summarize it.".to_string(),
            show_prompt: false,
            cook_mode: false,
            expected,
            status: "Processing...",
        }
    }

    fn photo_attachment() -> Attachment {
        let file_id: FileId =
            serde_json::from_value(serde_json::json!("ph1")).expect("file id from json");
        Attachment {
            kind: AttachmentKind::Photo,
            file_id,
            file_name: None,
            mime_type: Some("image/jpeg".to_string()),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_invoke_retries_transient_then_succeeds() {
        let mut backend = MockInferenceBackend::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        backend.expect_generate().times(3).returning(move |_, _| {
            if seen.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(GeminiError::Api("429 quota exceeded".to_string()))
            } else {
                Ok(response_with_text("done"))
            }
        });

        let start = tokio::time::Instant::now();
        let classifier = GeminiV1BetaClassifier;
        let result = invoke(&backend, &classifier, &[Part::text("p")], false, None)
            .await
            .expect("third attempt succeeds");
        assert_eq!(result.text().as_deref(), Some("done"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 2s pauses between attempts 1->2 and 2->3
        assert_eq!(start.elapsed(), Duration::from_secs(2 * TRANSIENT_RETRY_DELAY_SECS));
    }

    #[tokio::test(start_paused = true)]
    async fn test_invoke_gives_up_after_three_transient_errors() {
        let mut backend = MockInferenceBackend::new();
        backend
            .expect_generate()
            .times(3)
            .returning(|_, _| Err(GeminiError::Api("quota exhausted".to_string())));

        let classifier = GeminiV1BetaClassifier;
        let err = invoke(&backend, &classifier, &[Part::text("p")], false, None)
            .await
            .expect_err("exhausted retries must propagate");
        assert!(matches!(err, PipelineError::Service(_)));
        assert!(err.to_string().contains("quota exhausted"));
    }

    #[tokio::test]
    async fn test_invoke_unsupported_mime_without_constraint() {
        let mut backend = MockInferenceBackend::new();
        backend.expect_generate().times(1).returning(|_, _| {
            Err(GeminiError::Api(
                "request has a mimeType parameter which is not supported".to_string(),
            ))
        });

        let classifier = GeminiV1BetaClassifier;
        let err = invoke(&backend, &classifier, &[Part::text("p")], false, None)
            .await
            .expect_err("unsupported mime must short-circuit");
        assert_eq!(err.to_string(), "Invalid file type. Please try again.");
    }

    #[tokio::test]
    async fn test_invoke_unsupported_mime_with_constraint_propagates() {
        let mut backend = MockInferenceBackend::new();
        backend.expect_generate().times(1).returning(|_, _| {
            Err(GeminiError::Api(
                "request has a mimeType parameter which is not supported".to_string(),
            ))
        });

        let classifier = GeminiV1BetaClassifier;
        let err = invoke(
            &backend,
            &classifier,
            &[Part::text("p")],
            false,
            Some(ExpectedMedia::Audio),
        )
        .await
        .expect_err("constraint makes the rejection unrecoverable");
        assert!(matches!(err, PipelineError::Service(_)));
        assert!(err.to_string().starts_with("Error: "));
    }

    #[tokio::test]
    async fn test_invoke_fatal_error_is_not_retried() {
        let mut backend = MockInferenceBackend::new();
        backend
            .expect_generate()
            .times(1)
            .returning(|_, _| Err(GeminiError::Api("500 Internal Server Error".to_string())));

        let classifier = GeminiV1BetaClassifier;
        let err = invoke(&backend, &classifier, &[Part::text("p")], false, None)
            .await
            .expect_err("fatal errors propagate at once");
        assert!(matches!(err, PipelineError::Service(_)));
    }

    #[tokio::test]
    async fn test_materialize_rejects_corrupt_image_before_any_backend_call() {
        // No expectations: any backend call would panic the mock
        let backend = MockInferenceBackend::new();
        let temp = TempFile::with_extension("jpg");
        tokio::fs::write(temp.path(), b"definitely not a jpeg")
            .await
            .expect("write temp file");

        let err = materialize(&backend, &photo_attachment(), temp.path(), "prompt")
            .await
            .expect_err("corrupt image must fail before inference");
        assert!(matches!(err, PipelineError::CorruptImage));
        assert_eq!(err.to_string(), "Invalid or corrupted image file.");
    }

    #[test]
    fn test_compose_result_echoes_prompt_only_when_supplied() {
        let mut req = request(None);
        let response = response_with_text("the answer");
        assert_eq!(compose_result(&req, &response), "Answer: the answer");

        req.show_prompt = true;
        assert_eq!(
            compose_result(&req, &response),
            "Prompt: Summarize it.\nAnswer: the answer"
        );
    }

    #[test]
    fn test_compose_result_without_text_candidate() {
        let req = request(None);
        let response = GenerateContentResponse {
            candidates: vec![Candidate { content: None }],
        };
        assert_eq!(compose_result(&req, &response), "Answer: No content generated.");
    }

    #[test]
    fn test_usage_text_variants() {
        assert_eq!(
            usage_text(&request(None)),
            "Usage: /process [prompt] [Reply to a file]"
        );
        assert_eq!(
            usage_text(&request(Some(ExpectedMedia::Image))),
            "Usage: /process [custom prompt] [Reply to a image]"
        );
    }

    #[test]
    fn test_invalid_file_text_names_expected_category() {
        assert_eq!(
            invalid_file_text(Some(ExpectedMedia::Image)),
            "Invalid image file. Please try again."
        );
        assert_eq!(
            invalid_file_text(None),
            "Invalid supported file. Please try again."
        );
    }

    fn valid_jpeg() -> Vec<u8> {
        let img = image::DynamicImage::new_rgb8(2, 2);
        let mut bytes = Vec::new();
        img.write_to(
            &mut std::io::Cursor::new(&mut bytes),
            image::ImageFormat::Jpeg,
        )
        .expect("encode jpeg");
        bytes
    }

    #[tokio::test]
    async fn test_process_reports_empty_candidates_as_no_result() {
        let mut backend = MockInferenceBackend::new();
        backend
            .expect_generate()
            .times(1)
            .returning(|_, _| Ok(GenerateContentResponse::default()));

        let temp = TempFile::with_extension("jpg");
        tokio::fs::write(temp.path(), valid_jpeg())
            .await
            .expect("write temp image");

        let outcome = process(&backend, &photo_attachment(), temp.path(), &request(None))
            .await
            .expect("empty candidates are not an error");
        assert_eq!(outcome, None);
    }

    #[tokio::test]
    async fn test_process_composes_answer_on_success() {
        let mut backend = MockInferenceBackend::new();
        backend
            .expect_generate()
            .times(1)
            .returning(|_, _| Ok(response_with_text("a cat on a mat")));

        let temp = TempFile::with_extension("jpg");
        tokio::fs::write(temp.path(), valid_jpeg())
            .await
            .expect("write temp image");

        let outcome = process(&backend, &photo_attachment(), temp.path(), &request(None))
            .await
            .expect("success path");
        assert_eq!(outcome.as_deref(), Some("Answer: a cat on a mat"));
    }
}
