//! Exchange driver
//!
//! For one dispatched work-item, given an already-derived [`ExchangePlan`]:
//! opens fresh HTTP clients to both cluster sides and pings them, builds the
//! callback bundle the (externally supplied) exchange engine calls back
//! into, and starts one exchange. The plan itself — and the bucket-list
//! rotation that goes with it — is derived and applied by the coordinator
//! *before* calling this driver, since rotation happens synchronously with
//! the dispatch decision regardless of whether the exchange ever reaches the
//! network (spec.md §5's "Shared resources" note). Grounded on
//! `gossip/protocol.rs`'s `GossipProtocol` methods (owned config/state,
//! async methods returning a `Result`-wrapped outcome enum, `tracing::warn!`
//! on unreachable peers rather than aborting the round).

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tracing::warn;

use crate::error::{ExchangeError, HttpClientError};
use crate::http_client::{AaeHttpClient, HashMethod, KeyRange, Protocol, ReqwestAaeHttpClient, SegmentFilter};
use crate::repair::{self, RepairStats};
use crate::replication_queue::ReplicationQueue;

use super::engine::{
    Divergence, ExchangeCallbacks, ExchangeEngine, ExchangeHandle, ExchangeId, ExchangeParams, SendRequest,
    SendResponse,
};
use super::filter::{ExchangePlan, NValSource};

/// Endpoint this driver opens an [`AaeHttpClient`] against.
#[derive(Clone, Debug)]
pub struct EndpointConfig {
    /// Scheme to address the endpoint with.
    pub protocol: Protocol,
    /// Host or IP address.
    pub ip: String,
    /// Port.
    pub port: u16,
}

/// Notification posted back into the coordinator's mailbox once the engine
/// calls the driver's `reply_complete` callback. Carries the epoch the
/// exchange was armed under so the coordinator can ignore late replies from
/// a superseded exchange (see DESIGN.md's third Open Question decision).
#[derive(Debug, Clone, Copy)]
pub struct ReplyComplete {
    /// The exchange this reply concerns.
    pub exchange_id: ExchangeId,
    /// The `exchange_epoch` the coordinator armed this exchange under.
    pub exchange_epoch: u64,
}

/// Outcome of one call to [`ExchangeDriver::run`].
#[derive(Debug)]
pub enum DriverOutcome {
    /// The remote side did not respond to `ping`.
    RemoteUnreachable,
    /// The local side did not respond to `ping`.
    LocalUnreachable,
    /// The exchange was started; the caller should arm the crash-timeout.
    Started(ExchangeHandle),
}

/// Stateless driver: one [`run`](Self::run) call pings both sides and, if
/// reachable, starts one exchange for an already-derived plan.
pub struct ExchangeDriver {
    client_timeout: Duration,
}

impl ExchangeDriver {
    /// Build a driver whose opened HTTP clients use `client_timeout` as
    /// their request timeout.
    pub fn new(client_timeout: Duration) -> Self {
        Self { client_timeout }
    }

    /// Run the driver sequence for `plan`, using `requester` to receive the
    /// final repair stats if this exchange was manually triggered, and
    /// `reply_tx` to notify the coordinator when the engine reports
    /// completion.
    #[allow(clippy::too_many_arguments)]
    pub async fn run(
        &self,
        plan: ExchangePlan,
        local_endpoint: &EndpointConfig,
        remote_endpoint: &EndpointConfig,
        engine: &dyn ExchangeEngine,
        queue: Arc<dyn ReplicationQueue>,
        queue_name: String,
        exchange_epoch: u64,
        reply_tx: mpsc::Sender<ReplyComplete>,
        requester: Option<oneshot::Sender<RepairStats>>,
    ) -> Result<DriverOutcome, ExchangeError> {
        let remote_client = ReqwestAaeHttpClient::new(
            remote_endpoint.protocol,
            &remote_endpoint.ip,
            remote_endpoint.port,
            self.client_timeout,
        );
        if remote_client.ping().await.is_err() {
            warn!(ip = %remote_endpoint.ip, "remote cluster unreachable, skipping exchange");
            return Ok(DriverOutcome::RemoteUnreachable);
        }

        let local_client = ReqwestAaeHttpClient::new(
            local_endpoint.protocol,
            &local_endpoint.ip,
            local_endpoint.port,
            self.client_timeout,
        );
        if local_client.ping().await.is_err() {
            warn!(ip = %local_endpoint.ip, "local cluster unreachable, skipping exchange");
            return Ok(DriverOutcome::LocalUnreachable);
        }

        let callbacks = DriverCallbacks {
            local: Arc::new(local_client),
            remote: Arc::new(remote_client),
            local_nval: resolve_nval(plan.local_nval),
            remote_nval: resolve_nval(plan.remote_nval),
            queue,
            queue_name,
            exchange_epoch,
            reply_tx,
            requester: Mutex::new(requester),
        };

        let handle = engine
            .start_exchange(ExchangeParams { plan }, Box::new(callbacks))
            .await?;

        Ok(DriverOutcome::Started(handle))
    }
}

fn resolve_nval(source: NValSource) -> Option<u32> {
    match source {
        NValSource::Configured(n) => Some(n),
        NValSource::Range => None,
    }
}

/// The callback bundle passed to the exchange engine for one exchange.
/// Captures only immutable per-exchange context, per spec.md §9's design
/// note on callback-heavy engine integration.
struct DriverCallbacks {
    local: Arc<dyn AaeHttpClient>,
    remote: Arc<dyn AaeHttpClient>,
    local_nval: Option<u32>,
    remote_nval: Option<u32>,
    queue: Arc<dyn ReplicationQueue>,
    queue_name: String,
    exchange_epoch: u64,
    reply_tx: mpsc::Sender<ReplyComplete>,
    requester: Mutex<Option<oneshot::Sender<RepairStats>>>,
}

impl DriverCallbacks {
    async fn send(client: &dyn AaeHttpClient, nval: Option<u32>, request: SendRequest) -> Result<SendResponse, HttpClientError> {
        match request {
            SendRequest::FetchRoot => {
                let nval = nval.ok_or_else(|| {
                    HttpClientError::Protocol("FetchRoot requires a configured nval".to_string())
                })?;
                client.merge_root(nval).await.map(SendResponse)
            }
            SendRequest::FetchBranches(branch_ids) => {
                let nval = nval.ok_or_else(|| {
                    HttpClientError::Protocol("FetchBranches requires a configured nval".to_string())
                })?;
                let branches = client.merge_branches(nval, branch_ids).await?;
                Ok(SendResponse(
                    bincode::serialize(&branches).expect("branch list serialization is infallible"),
                ))
            }
            SendRequest::FetchClocks(segment_ids) => {
                let nval = nval.ok_or_else(|| {
                    HttpClientError::Protocol("FetchClocks requires a configured nval".to_string())
                })?;
                let clocks = client.fetch_clocks(nval, segment_ids).await?;
                Ok(SendResponse(
                    bincode::serialize(&clocks).expect("clock list serialization is infallible"),
                ))
            }
            SendRequest::MergeTreeRange { bucket, tree_size } => {
                let tree = client
                    .range_tree(
                        bucket,
                        KeyRange::All,
                        tree_size,
                        SegmentFilter::All,
                        None,
                        HashMethod::PreHash,
                    )
                    .await?;
                Ok(SendResponse(tree))
            }
            SendRequest::FetchClocksRange { bucket, mod_range } => {
                let clocks = client
                    .range_clocks(bucket, KeyRange::All, SegmentFilter::All, mod_range)
                    .await?;
                Ok(SendResponse(
                    bincode::serialize(&clocks).expect("clock list serialization is infallible"),
                ))
            }
        }
    }
}

#[async_trait::async_trait]
impl ExchangeCallbacks for DriverCallbacks {
    async fn send_local(&self, request: SendRequest) -> Result<SendResponse, HttpClientError> {
        Self::send(self.local.as_ref(), self.local_nval, request).await
    }

    async fn send_remote(&self, request: SendRequest) -> Result<SendResponse, HttpClientError> {
        Self::send(self.remote.as_ref(), self.remote_nval, request).await
    }

    async fn repair(&self, divergences: Vec<Divergence>) {
        match repair::decide(divergences, self.queue.as_ref(), &self.queue_name).await {
            Ok(stats) => {
                if let Some(tx) = self.requester.lock().take() {
                    let _ = tx.send(stats);
                }
            }
            Err(error) => warn!(%error, "repair decider failed to enqueue"),
        }
    }

    async fn reply_complete(&self, exchange_id: ExchangeId) {
        let _ = self
            .reply_tx
            .send(ReplyComplete {
                exchange_id,
                exchange_epoch: self.exchange_epoch,
            })
            .await;
    }
}
