use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use inference_clients::{
    ChatMessage, EndpointConfig, ExecutorError, HfClientBuilder, MysterClientBuilder, RawResponse,
};
use tracing::warn;
use tracing_subscriber::EnvFilter;

/// inference-clients - send one sample request to an inference endpoint
#[derive(Parser)]
#[command(name = "inference-clients")]
#[command(about = "Smoke-test client for the model inference and chat/generate endpoints")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand)]
enum Commands {
    /// Post text to the model inference endpoint (HF_API_BASE, HF_TOKEN)
    Hf(HfCommand),
    /// Post a chat or text request to the chat/generate endpoint (MYSTER_API_BASE_URL, MYSTER_API_KEY)
    Myster(MysterCommand),
}

#[derive(Parser)]
struct HfCommand {
    /// Text sent as `inputs`
    #[arg(value_name = "TEXT", default_value = "hello")]
    text: String,
}

#[derive(Parser)]
struct MysterCommand {
    /// Conversation entry as ROLE:CONTENT; repeat for several messages
    #[arg(short, long = "message", value_name = "ROLE:CONTENT", value_parser = parse_message)]
    messages: Vec<ChatMessage>,

    /// Plain text input, used when no messages are given
    #[arg(short, long, value_name = "TEXT")]
    input: Option<String>,
}

fn main() {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match &cli.command {
        Commands::Hf(cmd) => handle_hf(cmd),
        Commands::Myster(cmd) => handle_myster(cmd),
    };

    match result {
        Ok(response) => {
            if !response.is_success() {
                warn!(status = response.status, "endpoint returned a non-success status");
            }
            println!("{response}");
        }
        Err(e) => {
            let exit_code = if is_config_error(&e) { 1 } else { 2 };
            eprintln!("Error: {e:#}");
            std::process::exit(exit_code);
        }
    }
}

/// Configuration problems exit with 1, connection failures with 2.
fn is_config_error(error: &anyhow::Error) -> bool {
    matches!(
        error.downcast_ref::<ExecutorError>(),
        Some(ExecutorError::InvalidUrl(_) | ExecutorError::InvalidToken)
    )
}

fn handle_hf(cmd: &HfCommand) -> Result<RawResponse> {
    let client = HfClientBuilder::new()
        .config(EndpointConfig::hf_from_env())
        .build()?;

    client
        .post(&cmd.text)
        .with_context(|| format!("Request to {} failed", client.config().base_url))
}

fn handle_myster(cmd: &MysterCommand) -> Result<RawResponse> {
    let client = MysterClientBuilder::new()
        .config(EndpointConfig::myster_from_env())
        .build()?;

    let input = match (&cmd.input, cmd.messages.is_empty()) {
        (Some(input), _) => Some(input.as_str()),
        (None, true) => Some("hello"),
        (None, false) => None,
    };

    client
        .post(Some(cmd.messages.as_slice()), input)
        .with_context(|| format!("Request to {} failed", client.config().base_url))
}

/// Parses `ROLE:CONTENT` into a chat message.
///
/// Splits on the first colon, so content may itself contain colons.
fn parse_message(input: &str) -> Result<ChatMessage, String> {
    let (role, content) = input
        .split_once(':')
        .ok_or_else(|| format!("expected ROLE:CONTENT, got '{input}'"))?;

    let role = role.trim();
    if role.is_empty() {
        return Err("message role cannot be empty".to_string());
    }

    Ok(ChatMessage::new(role, content))
}
