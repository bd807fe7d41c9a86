//! Attachment extraction and classification for replied-to messages.

use teloxide::types::{FileId, Message};

/// Media category a command may require
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectedMedia {
    /// A photo
    Image,
    /// Audio-like media (audio, voice, video, video note)
    Audio,
    /// Video-like media (same broad set as `Audio`)
    Video,
}

impl ExpectedMedia {
    /// Label used in usage and invalid-file messages
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Audio => "audio",
            Self::Video => "video",
        }
    }
}

/// The kind of file a message carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentKind {
    /// Compressed photo
    Photo,
    /// Audio track
    Audio,
    /// Voice note
    Voice,
    /// Video file
    Video,
    /// Round video note
    VideoNote,
    /// Generic document
    Document,
}

/// File payload of a replied-to message, one kind per message
#[derive(Debug, Clone)]
pub struct Attachment {
    /// What the message carries
    pub kind: AttachmentKind,
    /// Telegram file identifier for download
    pub file_id: FileId,
    /// Original file name, when Telegram provides one
    pub file_name: Option<String>,
    /// MIME type, when Telegram provides one
    pub mime_type: Option<String>,
}

impl Attachment {
    /// Extract the supported attachment from a message, if any.
    ///
    /// Photos use the largest available size. Returns `None` for messages
    /// without a supported file payload (stickers, plain text, ...).
    #[must_use]
    pub fn from_message(msg: &Message) -> Option<Self> {
        if let Some(photo) = msg.photo().and_then(|sizes| sizes.last()) {
            return Some(Self {
                kind: AttachmentKind::Photo,
                file_id: photo.file.id.clone(),
                file_name: None,
                mime_type: Some("image/jpeg".to_string()),
            });
        }
        if let Some(audio) = msg.audio() {
            return Some(Self {
                kind: AttachmentKind::Audio,
                file_id: audio.file.id.clone(),
                file_name: audio.file_name.clone(),
                mime_type: audio.mime_type.as_ref().map(ToString::to_string),
            });
        }
        if let Some(voice) = msg.voice() {
            return Some(Self {
                kind: AttachmentKind::Voice,
                file_id: voice.file.id.clone(),
                file_name: None,
                mime_type: voice.mime_type.as_ref().map(ToString::to_string),
            });
        }
        if let Some(video) = msg.video() {
            return Some(Self {
                kind: AttachmentKind::Video,
                file_id: video.file.id.clone(),
                file_name: video.file_name.clone(),
                mime_type: video.mime_type.as_ref().map(ToString::to_string),
            });
        }
        if let Some(note) = msg.video_note() {
            return Some(Self {
                kind: AttachmentKind::VideoNote,
                file_id: note.file.id.clone(),
                file_name: None,
                mime_type: None,
            });
        }
        if let Some(doc) = msg.document() {
            return Some(Self {
                kind: AttachmentKind::Document,
                file_id: doc.file.id.clone(),
                file_name: doc.file_name.clone(),
                mime_type: doc.mime_type.as_ref().map(ToString::to_string),
            });
        }
        None
    }

    /// Whether this attachment satisfies the command's media constraint.
    ///
    /// `Audio` and `Video` are both satisfied by any of audio, voice, video
    /// or video note — an intentionally broad check, not a strict filter.
    #[must_use]
    pub fn matches(&self, expected: Option<ExpectedMedia>) -> bool {
        match expected {
            Some(ExpectedMedia::Image) => self.kind == AttachmentKind::Photo,
            Some(ExpectedMedia::Audio | ExpectedMedia::Video) => matches!(
                self.kind,
                AttachmentKind::Audio
                    | AttachmentKind::Voice
                    | AttachmentKind::Video
                    | AttachmentKind::VideoNote
            ),
            None => true,
        }
    }

    /// Extension for the local temp file, preserving the original name's
    /// suffix when Telegram provides one.
    #[must_use]
    pub fn extension(&self) -> String {
        if let Some(ext) = self
            .file_name
            .as_deref()
            .and_then(|n| n.rsplit_once('.'))
            .map(|(_, ext)| ext)
            .filter(|ext| !ext.is_empty())
        {
            return ext.to_string();
        }
        match self.kind {
            AttachmentKind::Photo => "jpg",
            AttachmentKind::Audio => "mp3",
            AttachmentKind::Voice => "ogg",
            AttachmentKind::Video | AttachmentKind::VideoNote => "mp4",
            AttachmentKind::Document => "bin",
        }
        .to_string()
    }

    /// MIME type submitted to the upload API
    #[must_use]
    pub fn upload_mime(&self) -> String {
        if let Some(mime) = &self.mime_type {
            return mime.clone();
        }
        match self.kind {
            AttachmentKind::Photo => "image/jpeg",
            AttachmentKind::Audio => "audio/mpeg",
            AttachmentKind::Voice => "audio/ogg",
            AttachmentKind::Video | AttachmentKind::VideoNote => "video/mp4",
            AttachmentKind::Document => "application/octet-stream",
        }
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn message_with(media: Value) -> Message {
        let mut base = json!({
            "message_id": 100,
            "date": 1700000000,
            "chat": {"id": 1, "type": "private", "first_name": "Test"},
            "from": {"id": 1, "is_bot": false, "first_name": "Test"}
        });
        if let (Some(base_map), Some(media_map)) = (base.as_object_mut(), media.as_object()) {
            for (k, v) in media_map {
                base_map.insert(k.clone(), v.clone());
            }
        }
        serde_json::from_value(base).expect("valid message fixture")
    }

    fn photo_message() -> Message {
        message_with(json!({"photo": [
            {"file_id": "ph_s", "file_unique_id": "us", "width": 90, "height": 90},
            {"file_id": "ph_l", "file_unique_id": "ul", "width": 800, "height": 800}
        ]}))
    }

    #[test]
    fn test_photo_extraction_uses_largest_size() {
        let att = Attachment::from_message(&photo_message()).expect("photo attachment");
        assert_eq!(att.kind, AttachmentKind::Photo);
        assert_eq!(
            serde_json::to_value(&att.file_id).expect("serialize file id"),
            json!("ph_l")
        );
        assert!(att.matches(Some(ExpectedMedia::Image)));
    }

    #[test]
    fn test_text_message_has_no_attachment() {
        let msg = message_with(json!({"text": "just words"}));
        assert!(Attachment::from_message(&msg).is_none());
    }

    #[test]
    fn test_image_constraint_rejects_non_photo() {
        let msg = message_with(json!({"voice": {
            "file_id": "vo1", "file_unique_id": "uv", "duration": 3, "mime_type": "audio/ogg"
        }}));
        let att = Attachment::from_message(&msg).expect("voice attachment");
        assert!(!att.matches(Some(ExpectedMedia::Image)));
        assert!(att.matches(Some(ExpectedMedia::Audio)));
        assert!(att.matches(None));
    }

    #[test]
    fn test_audio_constraint_is_broad() {
        let note = message_with(json!({"video_note": {
            "file_id": "vn1", "file_unique_id": "un", "length": 240, "duration": 5
        }}));
        let att = Attachment::from_message(&note).expect("video note attachment");
        assert_eq!(att.kind, AttachmentKind::VideoNote);
        assert!(att.matches(Some(ExpectedMedia::Audio)));
        assert!(att.matches(Some(ExpectedMedia::Video)));
        assert!(att.matches(None));
    }

    #[test]
    fn test_document_keeps_name_and_mime() {
        let msg = message_with(json!({"document": {
            "file_id": "doc1", "file_unique_id": "ud",
            "file_name": "report.pdf", "mime_type": "application/pdf"
        }}));
        let att = Attachment::from_message(&msg).expect("document attachment");
        assert_eq!(att.kind, AttachmentKind::Document);
        assert_eq!(att.extension(), "pdf");
        assert_eq!(att.upload_mime(), "application/pdf");
        assert!(!att.matches(Some(ExpectedMedia::Audio)));
    }

    #[test]
    fn test_extension_fallbacks() {
        let msg = message_with(json!({"voice": {
            "file_id": "vo1", "file_unique_id": "uv", "duration": 3
        }}));
        let att = Attachment::from_message(&msg).expect("voice attachment");
        assert_eq!(att.extension(), "ogg");
        assert_eq!(att.upload_mime(), "audio/ogg");
    }
}
