// Library root
// -----------
// The binary (`main.rs`) only calls `run`. The modules split the work:
// - `token`, `auth`, `client`: cached credentials and the interactive
//   authorization that replaces them when missing.
// - `api`: the remote video service and its HTTP implementation.
// - `catalog`: local snapshot of recent uploads used to prefill metadata.
// - `upload`: the two-step video + thumbnail upload.
// - `ui`, `args`, `defaults`: the interactive terminal surface.
pub mod api;
pub mod args;
pub mod auth;
pub mod catalog;
pub mod category;
pub mod client;
pub mod config;
pub mod defaults;
pub mod error;
pub mod store;
pub mod token;
pub mod ui;
pub mod upload;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use crate::{args::Cli, config::AppConfig, token::TokenStore};

pub fn run() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Cli::parse();
    let config = AppConfig::from_env()?;

    if args.clear_token {
        TokenStore::new(config.token_path()).clear()?;
        return Ok(());
    }

    ui::upload_session(&config, &args)
}
