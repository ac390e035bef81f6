//! Command-line configuration.
//!
//! Flags fall back to environment variables, which `main` first loads from an
//! optional `.env` file.
//!
//! # Environment Variables
//!
//! - `PAYKIT_PRIVATE_KEY` - Hex private key used by `pay` and `auth`
//! - `PAYKIT_PREFERRED_NETWORK` - Network preferred when several are payable
//! - `PAYKIT_TIMEOUT_SECS` - Transport timeout in seconds (default: `30`)
//! - `RUST_LOG` - Log filter (default: `info`)

use clap::{Args, Parser, Subcommand};
use reqwest::Method;
use url::Url;

/// Pay for and sign in to x402 resources.
#[derive(Parser, Debug)]
#[command(name = "paykit", version, about)]
pub struct Config {
    /// Hex private key of the paying / signing account.
    #[arg(long, env = "PAYKIT_PRIVATE_KEY", hide_env_values = true, global = true)]
    pub private_key: Option<String>,

    /// Preferred network, as a name (`base-sepolia`) or CAIP-2 id (`eip155:84532`).
    #[arg(long, env = "PAYKIT_PREFERRED_NETWORK", global = true)]
    pub preferred_network: Option<String>,

    /// Transport timeout in seconds.
    #[arg(long, env = "PAYKIT_TIMEOUT_SECS", default_value_t = 30, global = true)]
    pub timeout_secs: u64,

    #[command(subcommand)]
    pub command: Command,
}

/// What to do with the request.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show what a resource asks for, without paying.
    Probe(RequestArgs),
    /// Request a resource, paying if required.
    Pay(RequestArgs),
    /// Request a resource, answering a sign-in-with-x challenge.
    Auth(RequestArgs),
}

impl Command {
    /// The request arguments of any subcommand.
    pub const fn request(&self) -> &RequestArgs {
        match self {
            Self::Probe(args) | Self::Pay(args) | Self::Auth(args) => args,
        }
    }
}

/// The HTTP request to send.
#[derive(Args, Debug)]
pub struct RequestArgs {
    /// Resource URL.
    pub url: Url,

    /// HTTP method.
    #[arg(long, short = 'X', default_value = "GET", value_parser = parse_method)]
    pub method: Method,

    /// Extra header as `Name: value`; repeatable.
    #[arg(long = "header", short = 'H', value_parser = parse_header)]
    pub headers: Vec<(String, String)>,

    /// Request body.
    #[arg(long, short = 'd')]
    pub data: Option<String>,
}

impl RequestArgs {
    /// Builds the request with `http`.
    ///
    /// # Errors
    ///
    /// Returns [`reqwest::Error`] if a header is not legal.
    pub fn build(&self, http: &reqwest::Client) -> Result<reqwest::Request, reqwest::Error> {
        let mut builder = http.request(self.method.clone(), self.url.clone());
        for (name, value) in &self.headers {
            builder = builder.header(name, value);
        }
        if let Some(data) = &self.data {
            builder = builder.body(data.clone());
        }
        builder.build()
    }
}

fn parse_method(value: &str) -> Result<Method, String> {
    Method::from_bytes(value.to_ascii_uppercase().as_bytes()).map_err(|e| e.to_string())
}

fn parse_header(value: &str) -> Result<(String, String), String> {
    let (name, value) = value
        .split_once(':')
        .ok_or_else(|| format!("`{value}` is not `Name: value`"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err("header name is empty".to_owned());
    }
    Ok((name.to_owned(), value.trim().to_owned()))
}
