//! completion-stream - stream a text completion to stdout
//!
//! Usage: `completion-stream <prompt...>` with `OPENAI_API_KEY` set.

use std::io;
use std::process::ExitCode;

use async_trait::async_trait;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use completion_stream::config::settings::load_settings;
use completion_stream::config::{api_key_from_env, API_KEY_ENV};
use completion_stream::{CompletionClient, CompletionRequest, TextHandler, Throttled};

/// Writes only what was appended since the last update.
///
/// The first write error is kept and later updates are skipped.
struct DeltaPrinter<W> {
    out: W,
    printed: usize,
    error: Option<io::Error>,
}

impl<W> DeltaPrinter<W> {
    fn new(out: W) -> Self {
        Self {
            out,
            printed: 0,
            error: None,
        }
    }
}

async fn write_delta<W: AsyncWrite + Unpin>(out: &mut W, text: &str) -> io::Result<()> {
    out.write_all(text.as_bytes()).await?;
    out.flush().await
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> TextHandler for DeltaPrinter<W> {
    async fn on_text(&mut self, text: &str) {
        if self.error.is_some() {
            return;
        }

        let fresh = text.get(self.printed..).unwrap_or_default();
        self.printed = text.len();
        if let Err(e) = write_delta(&mut self.out, fresh).await {
            error!("Failed to write completion to stdout: {}", e);
            self.error = Some(e);
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Logs go to stderr so stdout carries only the completion
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive("completion_stream=info".parse().unwrap()))
        .init();

    let prompt = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    if prompt.trim().is_empty() {
        eprintln!("usage: completion-stream <prompt...>");
        return ExitCode::from(2);
    }

    let Some(api_key) = api_key_from_env() else {
        error!("{} is not set", API_KEY_ENV);
        return ExitCode::FAILURE;
    };

    let client = match CompletionClient::new(load_settings()) {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to build HTTP client: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let request = CompletionRequest::from_settings(client.settings(), prompt);

    info!(
        "Streaming completion from {} with model {}",
        client.settings().endpoint,
        client.settings().model
    );

    let mut handler = Throttled::from_millis(
        client.settings().throttle_ms.unwrap_or(0),
        DeltaPrinter::new(tokio::io::stdout()),
    );
    let result = client.stream(&api_key, request, &mut handler).await;
    let printer = handler.into_inner();
    println!();

    match (result, printer.error) {
        (Ok(text), None) => {
            info!("Completion finished ({} bytes)", text.len());
            ExitCode::SUCCESS
        }
        (Ok(text), Some(_)) => {
            error!("Completion finished ({} bytes) but stdout was not fully written", text.len());
            ExitCode::FAILURE
        }
        (Err(e), _) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
