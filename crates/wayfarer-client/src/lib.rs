//! # wayfarer-client
//!
//! Client core for the Wayfarer travel community app: session handling,
//! messaging with derived unread counts, communities and their membership,
//! feeds, and the local-first persistence policy that keeps all of it usable
//! without the remote backend.

pub mod client;
pub mod commands;
pub mod config;
pub mod error;
pub mod events;
pub mod reconcile;
pub mod remote;
pub mod repository;
pub mod state;

use tracing_subscriber::{fmt, EnvFilter};

pub use client::Client;
pub use config::ClientConfig;
pub use error::{ClientError, Result};
pub use events::ClientEvent;
pub use state::{AppState, Session};

/// Install the global tracing subscriber (respects `RUST_LOG`).
///
/// Safe to call more than once; later calls are ignored.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("wayfarer_client=debug,wayfarer_store=info,warn"));

    let installed = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init();

    if installed.is_ok() {
        tracing::info!("Starting {} client", wayfarer_shared::constants::APP_NAME);
    }
}
