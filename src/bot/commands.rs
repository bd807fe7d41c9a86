//! Command definitions and their bindings onto the shared pipeline.
//!
//! Each command is pure configuration: a default prompt, a status
//! placeholder, and an optional media constraint. No command carries logic of
//! its own.

use crate::bot::attachment::ExpectedMedia;
use crate::bot::pipeline::{self, PipelineRequest};
use crate::bot::resilient::send_message_resilient;
use crate::gemini::GeminiClient;
use anyhow::Result;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::utils::command::{BotCommands, ParseError};

const IMAGE_PROMPT: &str = "Get details of the image. Be accurate and write a short response.";
const COOK_PROMPT: &str = "Identify the baked good in the image and provide an accurate recipe.";
const TRANSCRIBE_PROMPT: &str = "Transcribe it. Write only the transcription text.";
const PROCESS_PROMPT: &str = "Shortly summarize the content and details of the file.";

const AISELLER_USAGE: &str = "Usage: /aiseller [target audience] [Reply to an image]";

/// Keep everything after the command as one argument
#[allow(clippy::unnecessary_wraps)]
fn rest(input: String) -> Result<(String,), ParseError> {
    Ok((input,))
}

/// Supported commands
#[derive(BotCommands, Clone, Debug)]
#[command(rename_rule = "lowercase", description = "Supported commands:")]
pub enum Command {
    /// Analyze an image
    #[command(description = "Analyze an image using AI.", parse_with = rest)]
    GetAi(String),
    /// Identify food and produce a recipe
    #[command(description = "Identify food and generate cooking instructions.", parse_with = rest)]
    AiCook(String),
    /// Marketing copy for a product photo
    #[command(description = "Generate marketing text for products.", parse_with = rest)]
    AiSeller(String),
    /// Transcribe audio or video
    #[command(
        description = "Transcribe or summarize audio/video.",
        alias = "ts",
        parse_with = rest
    )]
    Transcribe(String),
    /// Process any supported file
    #[command(
        description = "Process any file (image/audio/video/PDF/etc).",
        alias = "pr",
        parse_with = rest
    )]
    Process(String),
    /// List commands
    #[command(description = "Show this help.")]
    Help,
}

/// What a received command resolves to
enum Binding {
    /// Run the pipeline with this configuration
    Run(PipelineRequest),
    /// Reply with a usage string, nothing else
    Usage(&'static str),
    /// Reply with the command list
    Help,
}

fn bind(cmd: Command) -> Binding {
    match cmd {
        Command::GetAi(arg) => Binding::Run(prompted_request(
            "getai",
            arg,
            IMAGE_PROMPT,
            Some(ExpectedMedia::Image),
            "Scanning...",
        )),
        Command::AiCook(_) => Binding::Run(PipelineRequest {
            command: "aicook",
            prompt: COOK_PROMPT.to_string(),
            show_prompt: false,
            cook_mode: true,
            expected: Some(ExpectedMedia::Image),
            status: "Cooking...",
        }),
        Command::AiSeller(arg) => {
            let target = arg.trim();
            if target.is_empty() {
                return Binding::Usage(AISELLER_USAGE);
            }
            Binding::Run(PipelineRequest {
                command: "aiseller",
                prompt: format!(
                    "Generate a marketing description for the product.\nTarget Audience: {target}"
                ),
                show_prompt: false,
                cook_mode: false,
                expected: Some(ExpectedMedia::Image),
                status: "Generating description...",
            })
        }
        Command::Transcribe(arg) => Binding::Run(prompted_request(
            "transcribe",
            arg,
            TRANSCRIBE_PROMPT,
            Some(ExpectedMedia::Audio),
            "Transcribing...",
        )),
        Command::Process(arg) => Binding::Run(prompted_request(
            "process",
            arg,
            PROCESS_PROMPT,
            None,
            "Processing...",
        )),
        Command::Help => Binding::Help,
    }
}

/// Request whose prompt defaults when the user supplied none; a supplied
/// prompt is echoed into the reply.
fn prompted_request(
    command: &'static str,
    arg: String,
    default_prompt: &str,
    expected: Option<ExpectedMedia>,
    status: &'static str,
) -> PipelineRequest {
    let arg = arg.trim().to_string();
    let supplied = !arg.is_empty();
    PipelineRequest {
        command,
        prompt: if supplied {
            arg
        } else {
            default_prompt.to_string()
        },
        show_prompt: supplied,
        cook_mode: false,
        expected,
        status,
    }
}

/// Entry point for every accepted command
pub async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    gemini: Arc<GeminiClient>,
) -> Result<()> {
    match bind(cmd) {
        Binding::Run(req) => pipeline::run(&bot, &msg, gemini.as_ref(), &req).await,
        Binding::Usage(usage) => {
            send_message_resilient(&bot, msg.chat.id, usage, None, Some(msg.id)).await?;
            Ok(())
        }
        Binding::Help => {
            send_message_resilient(
                &bot,
                msg.chat.id,
                Command::descriptions().to_string(),
                None,
                Some(msg.id),
            )
            .await?;
            Ok(())
        }
    }
}
