//! Coordinator state machine
//!
//! Single-threaded actor owning every mutable piece of coordinator state:
//! scope, schedule-wants (and the paused backup), the slice dispatcher,
//! both endpoints, the queue name, and the in-flight exchange marker. One
//! `tokio::sync::mpsc` mailbox serializes every control op and scheduled
//! tick; a resettable `tokio::time::Sleep` drives the three named timeouts.
//! Grounded on `gossip/protocol.rs`'s `GossipProtocol` for the shape of an
//! owned-state struct with async methods mutating it, and on
//! `mofa-foundation/src/scheduler/mod.rs`'s `CronScheduler` for the
//! `tokio::select!` mailbox-plus-deadline loop and the `Handle` split
//! between a cheap `Clone`-able sender and the task that owns the state
//! (enrichment).

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant, Sleep};
use tracing::{debug, info, warn};

use crate::domain::{BucketId, Scope, ScheduleWants, WorkItemKind};
use crate::error::{ControlError, CoordinatorError};
use crate::exchange::driver::{DriverOutcome, EndpointConfig, ReplyComplete};
use crate::exchange::filter::{self, BucketListUpdate};
use crate::exchange::{ExchangeDriver, ExchangeEngine};
use crate::membership::{self, MembershipOracle};
use crate::repair::RepairStats;
use crate::replication_queue::ReplicationQueue;
use crate::schedule::dispatcher::SliceDispatcher;
use crate::time::{Clock, EpochSecs};

/// Post-config/reconfigure idle before the first dispatch.
pub const INITIAL_TIMEOUT: Duration = Duration::from_secs(60);
/// Minimum idle between completing one action and arming the next.
pub const LOOP_TIMEOUT: Duration = Duration::from_secs(15);
/// Upper bound on how long an in-flight exchange is awaited before the
/// coordinator gives up on it and proceeds to the next slice.
pub const CRASH_TIMEOUT: Duration = Duration::from_secs(3600);
/// Sentinel re-arm used whenever the next wake is driven by something other
/// than `self.deadline` (a scheduled self-send, a driver result, a reply).
/// `tokio::time::Sleep` returns `Ready` on every poll once elapsed, so the
/// deadline branch must always be re-armed before `on_timeout` returns, even
/// when there is nothing meaningful to time out against.
const NO_DEADLINE: Duration = Duration::from_secs(365 * 24 * 3600);

/// Where an in-flight exchange currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExchangeState {
    /// No exchange running; the next timeout drives the dispatcher.
    Idle,
    /// The driver has been spawned (pinging both sides); its outcome
    /// hasn't reached the mailbox yet.
    Dispatching,
    /// The engine accepted the exchange and is walking trees; awaiting
    /// `reply_complete`.
    Running,
}

/// Everything needed to construct a [`CoordinatorActor`].
pub struct CoordinatorInit {
    /// Initial comparison scope.
    pub scope: Scope,
    /// Initial per-kind slice quotas.
    pub schedule_wants: ScheduleWants,
    /// Day-start timestamp the first day's plan is anchored to.
    pub schedule_start: EpochSecs,
    /// Local cluster endpoint.
    pub local_endpoint: EndpointConfig,
    /// Remote cluster endpoint.
    pub remote_endpoint: EndpointConfig,
    /// Name the replication queue enqueues repairs under.
    pub queue_name: String,
    /// Source of cluster membership / this node's position within it.
    pub membership: Arc<dyn MembershipOracle>,
    /// The (externally supplied) tree-comparison engine.
    pub engine: Arc<dyn ExchangeEngine>,
    /// Replication-queue sink for repair items.
    pub queue: Arc<dyn ReplicationQueue>,
    /// Time source; `SystemClock` in production, `FixedClock` in tests.
    pub clock: Arc<dyn Clock>,
    /// Timeout applied to the HTTP clients the driver opens per exchange.
    pub client_timeout: Duration,
    /// Mailbox channel capacity.
    pub mailbox_capacity: usize,
}

/// One message the coordinator's single mailbox accepts. Control ops carry
/// their own `oneshot` reply channel, giving the synchronous-looking RPC
/// surface spec.md §6 describes while keeping all state mutation on the
/// actor task.
enum Message {
    /// A scheduled self-send: the slot the dispatcher picked has fired.
    WorkItem {
        kind: WorkItemKind,
    },
    /// A directly-triggered work item (the Control API's `process_workitem`).
    ProcessWorkItem {
        kind: WorkItemKind,
        now: EpochSecs,
        requester: Option<oneshot::Sender<Result<RepairStats, CoordinatorError>>>,
    },
    /// The driver's own `run` call returned (ping outcome, or the engine
    /// accepted/rejected the exchange). Not the exchange's completion.
    DriverFinished {
        outcome: Result<DriverOutcome, crate::error::ExchangeError>,
        epoch: u64,
    },
    Pause(oneshot::Sender<Result<(), ControlError>>),
    Resume(oneshot::Sender<Result<(), ControlError>>),
    SetSink {
        endpoint: EndpointConfig,
        reply: oneshot::Sender<()>,
    },
    SetSource {
        endpoint: EndpointConfig,
        reply: oneshot::Sender<()>,
    },
    SetAllSync {
        local_nval: u32,
        remote_nval: u32,
        reply: oneshot::Sender<()>,
    },
    SetBucketSync {
        buckets: Vec<BucketId>,
        reply: oneshot::Sender<()>,
    },
}

/// Cheap, `Clone`-able handle to a running coordinator. Holds only the
/// mailbox sender; all state lives on the actor task.
#[derive(Clone)]
pub struct CoordinatorHandle {
    tx: mpsc::Sender<Message>,
}

impl CoordinatorHandle {
    async fn call<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> Message) -> Result<T, CoordinatorError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(build(reply_tx))
            .await
            .map_err(|_| CoordinatorError::Stopped)?;
        reply_rx.await.map_err(|_| CoordinatorError::Stopped)
    }

    /// `pause()`. Replaces the effective schedule with all-`NoSync` slices
    /// until `resume` is called; does not cancel an in-flight exchange.
    pub async fn pause(&self) -> Result<Result<(), ControlError>, CoordinatorError> {
        self.call(Message::Pause).await
    }

    /// `resume()`. Restores the pre-pause quotas; drains the current
    /// pending list rather than re-planning mid-day.
    pub async fn resume(&self) -> Result<Result<(), ControlError>, CoordinatorError> {
        self.call(Message::Resume).await
    }

    /// `set_sink(protocol, ip, port)`. Overwrites the remote endpoint.
    pub async fn set_sink(&self, endpoint: EndpointConfig) -> Result<(), CoordinatorError> {
        self.call(|reply| Message::SetSink { endpoint, reply }).await
    }

    /// `set_source(protocol, ip, port)`. Overwrites the local endpoint.
    pub async fn set_source(&self, endpoint: EndpointConfig) -> Result<(), CoordinatorError> {
        self.call(|reply| Message::SetSource { endpoint, reply }).await
    }

    /// `set_allsync(localNVal, remoteNVal)`. Switches scope to `All`.
    pub async fn set_allsync(&self, local_nval: u32, remote_nval: u32) -> Result<(), CoordinatorError> {
        self.call(|reply| Message::SetAllSync {
            local_nval,
            remote_nval,
            reply,
        })
        .await
    }

    /// `set_bucketsync(bucketList)`. Switches scope to `Bucket`.
    pub async fn set_bucketsync(&self, buckets: Vec<BucketId>) -> Result<(), CoordinatorError> {
        self.call(|reply| Message::SetBucketSync { buckets, reply }).await
    }

    /// `process_workitem(kind, reqId, now)`. Awaits the exchange's repair
    /// stats. Rejected with [`CoordinatorError::ExchangeInProgress`] if
    /// another exchange is already running.
    pub async fn process_workitem(&self, kind: WorkItemKind, now: EpochSecs) -> Result<RepairStats, CoordinatorError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Message::ProcessWorkItem {
                kind,
                now,
                requester: Some(reply_tx),
            })
            .await
            .map_err(|_| CoordinatorError::Stopped)?;
        reply_rx.await.map_err(|_| CoordinatorError::Stopped)?
    }

    /// `process_workitem(kind, no_reply, now)`. Fire-and-forget.
    pub async fn process_workitem_no_reply(&self, kind: WorkItemKind, now: EpochSecs) -> Result<(), CoordinatorError> {
        self.tx
            .send(Message::ProcessWorkItem {
                kind,
                now,
                requester: None,
            })
            .await
            .map_err(|_| CoordinatorError::Stopped)
    }
}

/// Owns all coordinator state and runs the mailbox loop.
struct CoordinatorActor {
    scope: Scope,
    schedule_wants: ScheduleWants,
    paused_backup: Option<ScheduleWants>,
    dispatcher: SliceDispatcher,
    local_endpoint: EndpointConfig,
    remote_endpoint: EndpointConfig,
    queue_name: String,
    membership: Arc<dyn MembershipOracle>,
    driver: Arc<ExchangeDriver>,
    engine: Arc<dyn ExchangeEngine>,
    queue: Arc<dyn ReplicationQueue>,
    clock: Arc<dyn Clock>,
    exchange_epoch: u64,
    exchange_state: ExchangeState,
    mailbox_tx: mpsc::Sender<Message>,
    mailbox_rx: mpsc::Receiver<Message>,
    reply_tx: mpsc::Sender<ReplyComplete>,
    reply_rx: mpsc::Receiver<ReplyComplete>,
    deadline: Pin<Box<Sleep>>,
}

/// Start a coordinator actor task and return a handle to it plus its
/// `JoinHandle` (for tests that want to await shutdown; production callers
/// may drop it — the task runs until every handle is dropped).
pub fn spawn(init: CoordinatorInit) -> (CoordinatorHandle, JoinHandle<()>) {
    let (mailbox_tx, mailbox_rx) = mpsc::channel(init.mailbox_capacity);
    let (reply_tx, reply_rx) = mpsc::channel(init.mailbox_capacity);

    let dispatcher = SliceDispatcher::plan_from(init.schedule_wants, init.schedule_start);

    let actor = CoordinatorActor {
        scope: init.scope,
        schedule_wants: init.schedule_wants,
        paused_backup: None,
        dispatcher,
        local_endpoint: init.local_endpoint,
        remote_endpoint: init.remote_endpoint,
        queue_name: init.queue_name,
        membership: init.membership,
        driver: Arc::new(ExchangeDriver::new(init.client_timeout)),
        engine: init.engine,
        queue: init.queue,
        clock: init.clock,
        exchange_epoch: 0,
        exchange_state: ExchangeState::Idle,
        mailbox_tx: mailbox_tx.clone(),
        mailbox_rx,
        reply_tx,
        reply_rx,
        deadline: Box::pin(sleep(INITIAL_TIMEOUT)),
    };

    let join = tokio::spawn(actor.run());
    (CoordinatorHandle { tx: mailbox_tx }, join)
}

impl CoordinatorActor {
    fn arm(&mut self, wait: Duration) {
        self.deadline.as_mut().reset(Instant::now() + wait);
    }

    async fn run(mut self) {
        loop {
            tokio::select! {
                _ = self.deadline.as_mut() => {
                    self.on_timeout().await;
                }
                Some(rc) = self.reply_rx.recv() => {
                    self.on_reply_complete(rc);
                }
                msg = self.mailbox_rx.recv() => {
                    match msg {
                        Some(msg) => self.handle_message(msg).await,
                        None => {
                            debug!("all coordinator handles dropped, shutting down");
                            return;
                        }
                    }
                }
            }
        }
    }

    async fn on_timeout(&mut self) {
        let Some(node) = membership::node_info(self.membership.as_ref()).await else {
            warn!("self node not among up nodes, re-arming initial timeout");
            self.arm(INITIAL_TIMEOUT);
            return;
        };
        let now = self.clock.now_secs();
        let outcome = self.dispatcher.next(self.schedule_wants, node, now);

        let kind = outcome.kind;
        let tx = self.mailbox_tx.clone();
        tokio::spawn(async move {
            sleep(Duration::from_secs(outcome.wait_seconds)).await;
            let _ = tx.send(Message::WorkItem { kind }).await;
        });

        // The scheduled self-send drives the next tick, per spec.md §4.5's
        // "no explicit" note; still re-arm the deadline itself, or the next
        // `select!` iteration re-polls an already-elapsed `Sleep` and spins.
        self.arm(NO_DEADLINE);
    }

    fn on_reply_complete(&mut self, rc: ReplyComplete) {
        if rc.exchange_epoch != self.exchange_epoch {
            debug!(epoch = rc.exchange_epoch, current = self.exchange_epoch, "ignoring late reply_complete");
            return;
        }
        self.exchange_state = ExchangeState::Idle;
        self.arm(LOOP_TIMEOUT);
    }

    async fn handle_message(&mut self, msg: Message) {
        match msg {
            Message::WorkItem { kind } => {
                let now = self.clock.now_secs();
                self.process_workitem(kind, now, None).await;
            }
            Message::ProcessWorkItem { kind, now, requester } => {
                self.process_workitem(kind, now, requester).await;
            }
            Message::DriverFinished { outcome, epoch } => self.on_driver_finished(outcome, epoch),
            Message::Pause(reply) => {
                let result = if self.paused_backup.is_some() {
                    Err(ControlError::AlreadyPaused)
                } else {
                    self.paused_backup = Some(self.schedule_wants);
                    self.schedule_wants = ScheduleWants::all_no_sync(self.schedule_wants.slice_count());
                    Ok(())
                };
                info!(?result, "pause");
                let _ = reply.send(result);
                // "none armed".
            }
            Message::Resume(reply) => {
                let result = match self.paused_backup.take() {
                    Some(backup) => {
                        self.schedule_wants = backup;
                        Ok(())
                    }
                    None => Err(ControlError::NotPaused),
                };
                info!(?result, "resume");
                if result.is_ok() {
                    self.arm(INITIAL_TIMEOUT);
                }
                let _ = reply.send(result);
            }
            Message::SetSink { endpoint, reply } => {
                self.remote_endpoint = endpoint;
                self.arm(INITIAL_TIMEOUT);
                let _ = reply.send(());
            }
            Message::SetSource { endpoint, reply } => {
                self.local_endpoint = endpoint;
                self.arm(INITIAL_TIMEOUT);
                let _ = reply.send(());
            }
            Message::SetAllSync {
                local_nval,
                remote_nval,
                reply,
            } => {
                self.scope = Scope::All { local_nval, remote_nval };
                let _ = reply.send(());
                // "none armed".
            }
            Message::SetBucketSync { buckets, reply } => {
                self.scope = Scope::Bucket { buckets };
                let _ = reply.send(());
                // "none armed".
            }
        }
    }

    async fn process_workitem(
        &mut self,
        kind: WorkItemKind,
        now: EpochSecs,
        requester: Option<oneshot::Sender<Result<RepairStats, CoordinatorError>>>,
    ) {
        if kind == WorkItemKind::NoSync {
            debug!("no_sync slice fired, nothing to dispatch");
            if let Some(tx) = requester {
                let _ = tx.send(Ok(RepairStats::default()));
            }
            self.arm(LOOP_TIMEOUT);
            return;
        }

        if self.exchange_state != ExchangeState::Idle {
            warn!(?kind, "exchange already in flight, dropping request");
            if let Some(tx) = requester {
                let _ = tx.send(Err(CoordinatorError::ExchangeInProgress));
            }
            return;
        }

        let plan = match filter::derive(&self.scope, kind, now) {
            Ok(plan) => plan,
            Err(rejected) => {
                warn!(reason = %rejected.0, ?kind, "exchange rejected for current scope, skipping");
                if let Some(tx) = requester {
                    let _ = tx.send(Ok(RepairStats::default()));
                }
                self.arm(INITIAL_TIMEOUT);
                return;
            }
        };

        self.apply_bucket_list_update(&plan.bucket_list_update);

        self.exchange_epoch += 1;
        let epoch = self.exchange_epoch;
        self.exchange_state = ExchangeState::Dispatching;

        let (stats_tx, stats_rx) = oneshot::channel::<RepairStats>();
        if let Some(public_tx) = requester {
            tokio::spawn(async move {
                let result = stats_rx
                    .await
                    .map_err(|_| CoordinatorError::ExchangeProtocol(crate::error::ExchangeError::SendFailed(
                        "exchange ended before reporting repair stats".to_string(),
                    )));
                let _ = public_tx.send(result);
            });
        }

        let driver = Arc::clone(&self.driver);
        let engine = Arc::clone(&self.engine);
        let queue = Arc::clone(&self.queue);
        let queue_name = self.queue_name.clone();
        let reply_tx = self.reply_tx.clone();
        let local = self.local_endpoint.clone();
        let remote = self.remote_endpoint.clone();
        let mailbox_tx = self.mailbox_tx.clone();

        tokio::spawn(async move {
            let outcome = driver
                .run(
                    plan,
                    &local,
                    &remote,
                    engine.as_ref(),
                    queue,
                    queue_name,
                    epoch,
                    reply_tx,
                    Some(stats_tx),
                )
                .await;
            let _ = mailbox_tx.send(Message::DriverFinished { outcome, epoch }).await;
        });
    }

    fn on_driver_finished(&mut self, outcome: Result<DriverOutcome, crate::error::ExchangeError>, epoch: u64) {
        if epoch != self.exchange_epoch {
            debug!(epoch, current = self.exchange_epoch, "ignoring stale driver result");
            return;
        }
        match outcome {
            Ok(DriverOutcome::Started(_handle)) => {
                self.exchange_state = ExchangeState::Running;
                self.arm(CRASH_TIMEOUT);
            }
            Ok(DriverOutcome::RemoteUnreachable) | Ok(DriverOutcome::LocalUnreachable) => {
                self.exchange_state = ExchangeState::Idle;
                self.arm(LOOP_TIMEOUT);
            }
            Err(error) => {
                warn!(%error, "exchange engine rejected the exchange");
                self.exchange_state = ExchangeState::Idle;
                self.arm(LOOP_TIMEOUT);
            }
        }
    }

    fn apply_bucket_list_update(&mut self, update: &BucketListUpdate) {
        if let BucketListUpdate::Rotate { compared } = update {
            if let Scope::Bucket { buckets } = &mut self.scope {
                if let Some(pos) = buckets.iter().position(|b| b == compared) {
                    let head = buckets.remove(pos);
                    buckets.push(head);
                }
            }
        }
    }
}
