//! AAE coordinator daemon entry point.
//!
//! Loads configuration, installs the tracing subscriber, wires the default
//! `reqwest`-backed HTTP client surface and an in-memory replication queue,
//! starts the coordinator actor, and idles on a shutdown signal. Grounded
//! on `knhk-sidecar/src/main.rs`'s shape (install subscriber, load config,
//! build server config, start, log and exit on error).

use std::sync::Arc;

use tracing::{error, info};

use aae_coordinator::config::{AaeConfig, CLIENT_TIMEOUT};
use aae_coordinator::coordinator::{spawn, CoordinatorInit};
use aae_coordinator::membership::StaticMembershipOracle;
use aae_coordinator::replication_queue::InMemoryReplicationQueue;
use aae_coordinator::time::{Clock, SystemClock};

/// Placeholder engine: this crate only defines the exchange-engine seam
/// (spec.md §1 treats the tree-comparison engine as an external
/// collaborator supplied by the surrounding cluster runtime). A real
/// deployment wires in that implementation here instead.
struct UnimplementedExchangeEngine;

#[async_trait::async_trait]
impl aae_coordinator::exchange::ExchangeEngine for UnimplementedExchangeEngine {
    async fn start_exchange(
        &self,
        _params: aae_coordinator::exchange::ExchangeParams,
        _callbacks: Box<dyn aae_coordinator::exchange::ExchangeCallbacks>,
    ) -> Result<aae_coordinator::exchange::ExchangeHandle, aae_coordinator::error::ExchangeError> {
        Err(aae_coordinator::error::ExchangeError::Rejected(
            "no exchange engine wired into this deployment".to_string(),
        ))
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config_path = std::env::var("AAE_CONFIG_FILE").ok();
    let raw = match AaeConfig::load(config_path.as_deref()) {
        Ok(raw) => raw,
        Err(error) => {
            error!(%error, "failed to load configuration");
            std::process::exit(1);
        }
    };

    let state = match raw.into_state() {
        Ok(state) => state,
        Err(error) => {
            error!(%error, "invalid configuration");
            std::process::exit(1);
        }
    };

    let self_id = std::env::var("AAE_NODE_ID").unwrap_or_else(|_| "node-0".to_string());
    let membership = Arc::new(StaticMembershipOracle::new(self_id.clone(), vec![self_id]));

    info!(queue_name = %state.queue_name, "starting aae coordinator");

    let init = CoordinatorInit {
        scope: state.scope,
        schedule_wants: state.schedule_wants,
        schedule_start: SystemClock.now_secs(),
        local_endpoint: state.local_endpoint,
        remote_endpoint: state.remote_endpoint,
        queue_name: state.queue_name,
        membership,
        engine: Arc::new(UnimplementedExchangeEngine),
        queue: Arc::new(InMemoryReplicationQueue::default()),
        clock: Arc::new(SystemClock),
        client_timeout: CLIENT_TIMEOUT,
        mailbox_capacity: 64,
    };

    let (_handle, join) = spawn(init);

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
        }
        _ = join => {
            error!("coordinator actor exited unexpectedly");
        }
    }
}
