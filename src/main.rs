//! `fetch-scheduler` service: REST API over the fetch scheduler.

use std::sync::Arc;

use fetch_scheduler::config::ServiceConfig;
use fetch_scheduler::core::{AppResult, Scheduler};
use fetch_scheduler::infra::{InMemoryRegistry, ReqwestClient};
use fetch_scheduler::runtime::serve;
use fetch_scheduler::util::init_tracing;
use tracing::{info, warn};

fn main() -> AppResult<()> {
    // Loaded before the subscriber so RUST_LOG may come from .env.
    let dotenv = dotenvy::dotenv();
    init_tracing();
    if let Err(e) = dotenv {
        if !e.not_found() {
            warn!(error = %e, "Could not load .env file");
        }
    }
    let config = ServiceConfig::from_env()?;

    let scheduler = Arc::new(Scheduler::with_config(
        &config.scheduler,
        Arc::new(InMemoryRegistry::new()),
        Arc::new(ReqwestClient::new()),
    )?);

    actix_web::rt::System::new().block_on(serve(&config.server_address, Arc::clone(&scheduler)))?;

    info!("Server stopped, draining scheduler");
    scheduler.close();
    Ok(())
}
