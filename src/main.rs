use dotenvy::dotenv;
use gemini_media_bot::bot::commands::{handle_command, Command};
use gemini_media_bot::config::{Settings, MODEL_NAME};
use gemini_media_bot::gemini::GeminiClient;
use regex::Regex;
use std::io::{self, Write};
use std::sync::Arc;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use tracing::{debug, error, info};
use tracing_subscriber::{prelude::*, EnvFilter};

/// Regex patterns for redacting credentials from log output
struct RedactionPatterns {
    bot_url: Regex,
    bot_token: Regex,
    api_key: Regex,
}

impl RedactionPatterns {
    /// Initialize all regex patterns
    ///
    /// # Errors
    ///
    /// Returns an error if any regex pattern is invalid
    fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            bot_url: Regex::new(r"(https?://[^/]+/bot)([0-9]+:[A-Za-z0-9_-]+)(/['\s]*)")?,
            bot_token: Regex::new(r"([0-9]{8,10}:[A-Za-z0-9_-]{35})")?,
            // The Gemini key travels as a query parameter and shows up in
            // reqwest error messages that include the URL
            api_key: Regex::new(r"key=[A-Za-z0-9_-]{20,}")?,
        })
    }

    fn redact(&self, input: &str) -> String {
        let mut output = input.to_string();
        output = self
            .bot_url
            .replace_all(&output, "$1[TELEGRAM_TOKEN]$3")
            .to_string();
        output = self
            .bot_token
            .replace_all(&output, "[TELEGRAM_TOKEN]")
            .to_string();
        output = self
            .api_key
            .replace_all(&output, "key=[GEMINI_API_KEY]")
            .to_string();
        output
    }
}

struct RedactingWriter<W: Write> {
    inner: W,
    patterns: Arc<RedactionPatterns>,
}

impl<W: Write> Write for RedactingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let s = String::from_utf8_lossy(buf);
        let redacted = self.patterns.redact(&s);
        self.inner.write_all(redacted.as_bytes())?;
        // Report the original length to satisfy the Write contract even when
        // the redacted string differs in size
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

struct RedactingMakeWriter<F> {
    make_inner: F,
    patterns: Arc<RedactionPatterns>,
}

impl<'a, F, W> tracing_subscriber::fmt::MakeWriter<'a> for RedactingMakeWriter<F>
where
    F: Fn() -> W + 'static,
    W: Write,
{
    type Writer = RedactingWriter<W>;

    fn make_writer(&'a self) -> Self::Writer {
        RedactingWriter {
            inner: (self.make_inner)(),
            patterns: self.patterns.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    let patterns = Arc::new(RedactionPatterns::new().map_err(|e| {
        eprintln!("Failed to compile redaction patterns: {e}");
        e
    })?);
    init_logging(patterns);

    info!("Starting Gemini media bot...");

    let settings = init_settings();
    if settings.owner_id().is_none() {
        error!("OWNER_ID is missing or not a valid Telegram user id.");
        std::process::exit(1);
    }

    let gemini = Arc::new(GeminiClient::new(
        settings.gemini_api_key.clone(),
        MODEL_NAME.to_string(),
    ));
    info!(model = MODEL_NAME, "Gemini client initialized.");

    let bot = Bot::new(settings.telegram_token.clone());

    info!("Bot is running...");

    Dispatcher::builder(bot, setup_handler())
        .dependencies(dptree::deps![settings, gemini])
        .default_handler(|upd| async move {
            debug!("Ignoring update {}", upd.id.0);
        })
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}

fn init_logging(patterns: Arc<RedactionPatterns>) {
    let make_writer = RedactingMakeWriter {
        make_inner: io::stderr,
        patterns,
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(make_writer))
        .init();
}

fn init_settings() -> Arc<Settings> {
    match Settings::new() {
        Ok(s) => {
            info!("Configuration loaded successfully.");
            Arc::new(s)
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    }
}

/// Commands are accepted from the configured owner only; everything else is
/// dropped without a reply.
fn is_owner(msg: &Message, settings: &Settings) -> bool {
    settings.owner_id().is_some_and(|owner| {
        msg.from
            .as_ref()
            .is_some_and(|user| user.id.0.cast_signed() == owner)
    })
}

fn setup_handler() -> UpdateHandler<teloxide::RequestError> {
    Update::filter_message().branch(
        dptree::filter(|msg: Message, settings: Arc<Settings>| is_owner(&msg, &settings))
            .filter_command::<Command>()
            .endpoint(dispatch_command),
    )
}

async fn dispatch_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    gemini: Arc<GeminiClient>,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) = handle_command(bot, msg, cmd, gemini).await {
        error!("Command handler error: {e:#}");
    }
    respond(())
}
