/// Attachment extraction and classification
pub mod attachment;
/// Command definitions and pipeline bindings
pub mod commands;
/// The shared classify/materialize/invoke pipeline
pub mod pipeline;
/// Telegram operations with automatic retry
pub mod resilient;
