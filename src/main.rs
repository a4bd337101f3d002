use clap::{Arg, ArgAction, Command};
use std::process;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod mcp;
mod session;
mod tools;
mod utils;

use mcp::server::{McpServer, ServiceConfig};
use mcp::transport::StdioTransport;
use utils::elevenlabs::{DEFAULT_ELEVENLABS_BASE_URL, DEFAULT_VOICE_ID};
use utils::gemini::{DEFAULT_GEMINI_BASE_URL, DEFAULT_GEMINI_MODEL};

/// Prints a formatted box with the given lines
/// Empty strings create empty lines, other strings are centered within the box
fn print_box(lines: &[&str]) {
    const BOX_WIDTH: usize = 60;
    const CONTENT_WIDTH: usize = BOX_WIDTH - 4;

    eprintln!("\n\x1b[36m╔{}╗", "═".repeat(BOX_WIDTH - 2));

    for line in lines {
        if line.is_empty() {
            eprintln!("║{}║", " ".repeat(BOX_WIDTH - 2));
        } else {
            let visible_len = strip_ansi_codes(line).chars().count();

            if visible_len < CONTENT_WIDTH {
                let total_padding = CONTENT_WIDTH - visible_len;
                let left_padding = total_padding / 2;
                let right_padding = total_padding - left_padding;

                eprintln!(
                    "║  {}{}{}\x1b[36m║",
                    " ".repeat(left_padding),
                    line,
                    " ".repeat(right_padding)
                );
            } else {
                eprintln!("║  {}\x1b[36m  ║", line);
            }
        }
    }

    eprintln!("╚{}╝\x1b[0m\n", "═".repeat(BOX_WIDTH - 2));
}

/// Strips ANSI escape codes to calculate visible text length
fn strip_ansi_codes(text: &str) -> String {
    let mut result = String::new();
    let mut chars = text.chars();

    while let Some(ch) = chars.next() {
        if ch == '\x1b' {
            if chars.next() == Some('[') {
                for c in chars.by_ref() {
                    if c.is_ascii_alphabetic() {
                        break;
                    }
                }
            }
        } else {
            result.push(ch);
        }
    }

    result
}

fn cli() -> Command {
    Command::new("mcp-pdfcast")
        .version(env!("CARGO_PKG_VERSION"))
        .about("A Model Context Protocol server that turns a PDF into a spoken summary")
        .long_about(
            "This MCP server provides the following tools:\n\
            - set-credentials: Enter the Gemini and ElevenLabs API keys for the session\n\
            - load-document: Upload a PDF, extract its text and summarize it\n\
            - summarize: Summarize the loaded PDF again\n\
            - ask-question: Ask a question about the loaded PDF\n\
            - generate-audio: Read the summary aloud as audio/mpeg\n\
            - session-status: Show what the session currently holds\n\n\
            API keys are never read from flags or the environment; they are entered\n\
            per session through set-credentials.",
        )
        .arg(
            Arg::new("gemini-model")
                .long("gemini-model")
                .value_name("MODEL")
                .env("GEMINI_MODEL")
                .default_value(DEFAULT_GEMINI_MODEL)
                .help("Gemini model used for summaries and answers")
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("gemini-base-url")
                .long("gemini-base-url")
                .value_name("URL")
                .default_value(DEFAULT_GEMINI_BASE_URL)
                .help("Base URL of the Gemini models endpoint")
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("voice-id")
                .long("voice-id")
                .value_name("ID")
                .env("ELEVENLABS_VOICE_ID")
                .default_value(DEFAULT_VOICE_ID)
                .help("ElevenLabs voice used for audio")
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("elevenlabs-base-url")
                .long("elevenlabs-base-url")
                .value_name("URL")
                .default_value(DEFAULT_ELEVENLABS_BASE_URL)
                .help("Base URL of the ElevenLabs text-to-speech endpoint")
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("timeout-secs")
                .long("timeout-secs")
                .value_name("SECONDS")
                .default_value("120")
                .value_parser(clap::value_parser!(u64).range(1..))
                .help("HTTP timeout for a single API call")
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("quiet")
                .long("quiet")
                .short('q')
                .help("Suppress the banner and log only errors (for MCP clients)")
                .action(ArgAction::SetTrue),
        )
}

fn config_from_matches(matches: &clap::ArgMatches) -> Result<ServiceConfig, String> {
    let string_arg = |name: &str| -> String {
        matches
            .get_one::<String>(name)
            .cloned()
            .unwrap_or_default()
    };

    let config = ServiceConfig {
        gemini_base_url: string_arg("gemini-base-url"),
        gemini_model: string_arg("gemini-model"),
        elevenlabs_base_url: string_arg("elevenlabs-base-url"),
        voice_id: string_arg("voice-id"),
        timeout: Duration::from_secs(matches.get_one::<u64>("timeout-secs").copied().unwrap_or(120)),
    };

    for (flag, value) in [
        ("--gemini-base-url", &config.gemini_base_url),
        ("--elevenlabs-base-url", &config.elevenlabs_base_url),
    ] {
        url::Url::parse(value).map_err(|e| format!("Invalid {} '{}': {}", flag, value, e))?;
    }
    if config.gemini_model.trim().is_empty() || config.voice_id.trim().is_empty() {
        return Err("--gemini-model and --voice-id must not be empty".to_string());
    }

    Ok(config)
}

#[tokio::main]
async fn main() {
    let matches = cli().get_matches();
    let quiet = matches.get_flag("quiet");

    // Logs go to stderr only; stdout is reserved for JSON-RPC.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if quiet { "error" } else { "info" }));
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();

    let config = match config_from_matches(&matches) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            process::exit(2);
        }
    };

    info!(
        "Using Gemini model {} and ElevenLabs voice {}",
        config.gemini_model, config.voice_id
    );

    if !quiet {
        print_box(&[
            "",
            "\x1b[1m\x1b[31m MCP-PDFCast: PDF to Podcast \x1b[0m",
            "",
            "\x1b[0m Summarize, question and listen to your PDFs \x1b[0m",
            "",
        ]);
    }

    let session = match config.build_session() {
        Ok(session) => session,
        Err(e) => {
            error!("Failed to create HTTP client: {}", e);
            process::exit(1);
        }
    };

    info!("Starting MCP server...");

    let mut server = McpServer::new(StdioTransport::stdio(), session);
    if let Err(e) = server.start().await {
        error!("Server stopped with error: {}", e);
        process::exit(1);
    }
}
