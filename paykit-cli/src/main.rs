//! `paykit` command-line client.
//!
//! # Usage
//!
//! ```bash
//! # What does this resource want?
//! paykit probe https://api.example.com/weather
//!
//! # Pay for it
//! PAYKIT_PRIVATE_KEY=0x... paykit pay https://api.example.com/weather
//!
//! # Sign in to it
//! PAYKIT_PRIVATE_KEY=0x... paykit auth https://api.example.com/profile
//! ```
//!
//! Results are printed to stdout as JSON; logs go to stderr. The exit code is
//! 0 when the call succeeded and 1 otherwise.

mod config;

use std::io::Write;
use std::process::ExitCode;
use std::time::Duration;

use alloy_signer_local::PrivateKeySigner;
use clap::Parser;
use paykit_http::{FullClient, read_only_client};
use reqwest_middleware::ClientBuilder;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use crate::config::{Command, Config};

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run().await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!("paykit failed: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<bool, Box<dyn std::error::Error>> {
    let config = Config::parse();

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;
    let request = config.command.request().build(&http)?;
    let http = ClientBuilder::new(http).build();

    tracing::info!(method = %request.method(), url = %request.url(), "Sending request");

    match &config.command {
        Command::Probe(_) => {
            let result = read_only_client().probe(&http, request).await;
            print_json(&result)?;
            Ok(result.success)
        }
        Command::Pay(_) => {
            let client = full_client(&config, http)?;
            let result = client.negotiate(request).await;
            print_json(&result)?;
            Ok(result.success)
        }
        Command::Auth(_) => {
            let client = full_client(&config, http)?;
            let result = client.authenticate(request).await;
            if result.wants_payment() {
                tracing::warn!("Resource asks for payment; try `paykit pay`");
            }
            print_json(&result)?;
            Ok(result.success)
        }
    }
}

fn full_client(
    config: &Config,
    http: reqwest_middleware::ClientWithMiddleware,
) -> Result<FullClient<PrivateKeySigner>, Box<dyn std::error::Error>> {
    let key = config
        .private_key
        .as_deref()
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .ok_or("PAYKIT_PRIVATE_KEY (or --private-key) is required")?;
    let signer: PrivateKeySigner = key
        .parse()
        .map_err(|e| format!("invalid private key: {e}"))?;
    tracing::info!(address = %signer.address(), "Loaded signer");

    let mut builder = FullClient::builder(signer).http_client(http);
    if let Some(network) = &config.preferred_network {
        builder = builder.preferred_network(network.clone());
    }
    Ok(builder.build())
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value)?;
    writeln!(stdout)?;
    Ok(())
}
