//! Telegram bot that relays media from chat messages to the Gemini API.
//!
//! Commands reply to a message carrying a file; the bot downloads the file,
//! materializes it into a Gemini request (inline for images, upload-and-poll
//! for audio/video/documents), runs one inference call with bounded retry,
//! and answers in the chat.

/// Telegram-facing command handlers and the media pipeline
pub mod bot;
/// Settings and model constants
pub mod config;
/// Gemini REST client and File API plumbing
pub mod gemini;
/// Text formatting, splitting, temp files, retry helpers
pub mod utils;
