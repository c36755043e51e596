//! BookFusion Uploader
//!
//! Uploads one book to BookFusion the way the Calibre plugin does:
//! /uploads/init -> storage POST -> /uploads/finalize.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bookfusion_uploader::digest::digest_file;
use bookfusion_uploader::{ReqwestTransport, UploadError, UploadReceipt, UploadSession};

mod cli;

use cli::Args;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Initialize tracing
    let default_filter = if args.verbose {
        "bookfusion_uploader=debug,bookfusion_upload=debug"
    } else {
        "bookfusion_uploader=warn,bookfusion_upload=warn"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    dotenvy::dotenv().ok();

    match upload(&args).await {
        Ok(receipt) => {
            let output = serde_json::json!({
                "ok": true,
                "bookfusion_id": receipt.id,
                "key": receipt.key,
            });
            match serde_json::to_string_pretty(&output) {
                Ok(text) => println!("{text}"),
                Err(_) => println!("{output}"),
            }
            ExitCode::SUCCESS
        }
        Err(err) => report(&err),
    }
}

async fn upload(args: &Args) -> anyhow::Result<UploadReceipt> {
    let path = args.file();
    if !path.is_file() {
        anyhow::bail!("File not found: {}", path.display());
    }

    let config = args.client_config()?;
    let (record, cover) = args.metadata()?;

    let file_digest = digest_file(path)?;
    tracing::info!(
        file = %path.display(),
        size = path.metadata().map(|m| m.len()).unwrap_or_default(),
        sha256 = %file_digest,
        "Uploading book"
    );

    let transport = ReqwestTransport::new(&config).context("Failed to build HTTP client")?;
    let mut session = UploadSession::new(Arc::new(transport), config, path, file_digest)?;

    Ok(session.run(&record, cover.as_deref()).await?)
}

fn report(err: &anyhow::Error) -> ExitCode {
    match err.downcast_ref::<UploadError>() {
        Some(UploadError::Configuration(message)) => {
            eprintln!("{message}");
            ExitCode::from(2)
        }
        Some(UploadError::Protocol { phase, status, body, .. }) => {
            eprintln!("Upload failed.");
            eprintln!("{phase}: HTTP {status}");
            match serde_json::from_str::<serde_json::Value>(body) {
                Ok(json) => eprintln!("{json:#}"),
                Err(_) => eprintln!("{body}"),
            }
            ExitCode::FAILURE
        }
        _ => {
            eprintln!("Upload failed.");
            eprintln!("{err:#}");
            ExitCode::FAILURE
        }
    }
}
