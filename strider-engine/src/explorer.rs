use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{ExploreError, Result};
use crate::extract::{Extractor, Node};
use crate::frontier::Frontier;
use crate::outcome::{ExploreOutcome, ExploreStats};

/// Called with `(worker_id, node)` when a worker begins an expansion.
pub type ProgressCallback = Arc<dyn Fn(usize, String) + Send + Sync>;

const DEFAULT_WORKERS: usize = 10;

/// Events converging on the coordinator from the worker pool.
///
/// All three variants travel on one fan-in channel. Per-sender FIFO
/// ordering means a `BatchPending` is observed before its `Batch`, and
/// both before the `ItemDone` of the work item that produced them. That
/// ordering is what keeps the pending-obligation counter from touching
/// zero while a batch is still in flight.
enum Event {
    /// A result batch is about to follow on this channel (+1 obligation).
    BatchPending,
    /// Candidate child nodes produced by one expansion.
    Batch(Vec<Node>),
    /// A work item has been fully processed (-1 obligation).
    ItemDone { failed: bool },
}

/// Coordinator lifecycle. Running and Draining bracket the event loop;
/// Terminated is reached once every worker has unwound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Running,
    Draining,
    Terminated,
}

/// Concurrent link-graph explorer.
///
/// Discovers every node reachable from the seeds exactly once using a
/// bounded pool of workers, and detects global quiescence without
/// knowing the total in advance: every outstanding obligation (a queued
/// node, an expansion in progress, a batch in flight) is tracked by a
/// counter that only the coordinator mutates, fed by messages from the
/// workers. When the counter returns to zero the run is over.
pub struct Explorer {
    extractor: Arc<dyn Extractor>,
    workers: usize,
    progress_callback: Option<ProgressCallback>,
    cancel: CancellationToken,
}

impl Explorer {
    pub fn new(extractor: Arc<dyn Extractor>) -> Self {
        Self {
            extractor,
            workers: DEFAULT_WORKERS,
            progress_callback: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Sets the worker pool size. Validated when the run starts; zero is
    /// rejected.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Token that forces the run to drain and terminate early, returning
    /// the partial discovered set. Hand a clone to a signal handler or a
    /// supervising task.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Explores the link graph reachable from `seeds` until quiescent
    /// (or until cancelled).
    pub async fn run(&self, seeds: Vec<Node>) -> Result<ExploreOutcome> {
        if self.workers == 0 {
            return Err(ExploreError::InvalidWorkerCount(0));
        }
        info!(
            "starting exploration: {} seed(s), {} workers",
            seeds.len(),
            self.workers
        );

        // Fan-in channel: workers -> coordinator. Bounded, so slow
        // ingestion back-pressures extraction.
        let (event_tx, mut event_rx) = mpsc::channel::<Event>(self.workers * 2);
        // Work queue: coordinator -> workers. Unbounded, so dispatching
        // newly admitted nodes can never block the coordinator against
        // its own event loop.
        let (work_tx, work_rx) = mpsc::unbounded_channel::<Node>();
        let work_rx = Arc::new(Mutex::new(work_rx));

        let mut handles: Vec<JoinHandle<Result<()>>> = Vec::with_capacity(self.workers);
        for worker_id in 0..self.workers {
            handles.push(tokio::spawn(worker_loop(
                worker_id,
                self.extractor.clone(),
                work_rx.clone(),
                event_tx.clone(),
                self.cancel.clone(),
                self.progress_callback.clone(),
            )));
        }
        // The workers now hold the only senders; the fan-in channel
        // closes if they all unwind.
        drop(event_tx);

        let mut frontier = Frontier::new();
        let mut stats = ExploreStats::default();
        let mut phase = Phase::Running;
        debug!("{:?}: worker pool spawned, entering event loop", phase);

        let result = self
            .event_loop(&mut event_rx, &work_tx, &mut frontier, &mut stats, seeds)
            .await;

        // Draining: close the fan-in channel and the work queue. Every
        // worker loop treats the closed queue (or the cancellation
        // token) as its exit signal.
        phase = Phase::Draining;
        debug!("{:?}: closing fan-in channel and work queue", phase);
        event_rx.close();
        drop(work_tx);

        let cancelled = match result {
            Ok(cancelled) => cancelled,
            Err(e) => {
                // Broken termination invariant: cancel the pool and wait
                // for every worker to unwind before failing, so no task
                // outlives the run.
                self.cancel.cancel();
                for handle in handles {
                    match handle.await {
                        Ok(Ok(())) => {}
                        Ok(Err(worker_err)) => {
                            warn!("worker failed during forced shutdown: {}", worker_err);
                        }
                        Err(join_err) => {
                            warn!("worker did not shut down cleanly: {}", join_err);
                        }
                    }
                }
                return Err(e);
            }
        };

        for handle in handles {
            handle.await??;
        }

        phase = Phase::Terminated;
        info!(
            "{:?}: {} node(s) discovered, {} expansion(s) ok, {} failed, {} duplicate(s) rejected{}",
            phase,
            frontier.len(),
            stats.expansions_ok,
            stats.expansions_failed,
            stats.duplicates_rejected,
            if cancelled { " (cancelled)" } else { "" },
        );

        Ok(ExploreOutcome {
            discovered: frontier.into_nodes(),
            stats,
            cancelled,
        })
    }

    /// The single serialization point of the run. Returns `Ok(true)` if
    /// the loop was cut short by cancellation, `Ok(false)` on natural
    /// quiescence.
    async fn event_loop(
        &self,
        event_rx: &mut mpsc::Receiver<Event>,
        work_tx: &mpsc::UnboundedSender<Node>,
        frontier: &mut Frontier,
        stats: &mut ExploreStats,
        seeds: Vec<Node>,
    ) -> Result<bool> {
        // The seed batch is the first obligation: the counter starts at
        // one and the seeds take the same ingestion path as any worker
        // batch, so the counter cannot reach zero before they are
        // scheduled.
        let mut pending: i64 = 1;
        ingest_batch(seeds, frontier, &mut pending, stats, work_tx)?;
        debug!("seed batch ingested, {} pending obligation(s)", pending);

        while pending > 0 {
            let event = tokio::select! {
                _ = self.cancel.cancelled() => {
                    warn!(
                        "cancellation requested with {} pending obligation(s), forcing shutdown",
                        pending
                    );
                    return Ok(true);
                }
                event = event_rx.recv() => event,
            };

            let Some(event) = event else {
                // All workers gone while obligations remain: nothing is
                // left that could ever retire them.
                return Err(ExploreError::ProtocolViolation(format!(
                    "fan-in channel closed with {} pending obligation(s)",
                    pending
                )));
            };

            match event {
                Event::BatchPending => pending += 1,
                Event::Batch(batch) => {
                    ingest_batch(batch, frontier, &mut pending, stats, work_tx)?;
                }
                Event::ItemDone { failed } => {
                    pending -= 1;
                    if failed {
                        stats.expansions_failed += 1;
                    } else {
                        stats.expansions_ok += 1;
                    }
                }
            }

            if pending < 0 {
                return Err(ExploreError::ProtocolViolation(
                    "pending obligation count went negative".to_string(),
                ));
            }
        }

        debug!("pending obligations reached zero, run is quiescent");
        Ok(false)
    }
}

/// Applies one result batch to the frontier: admits unseen nodes onto
/// the work queue (+1 obligation each), then retires the batch's own
/// obligation (-1). The increments must land before the decrement so the
/// counter cannot dip to zero while admitted work is still queued.
fn ingest_batch(
    batch: Vec<Node>,
    frontier: &mut Frontier,
    pending: &mut i64,
    stats: &mut ExploreStats,
    work_tx: &mpsc::UnboundedSender<Node>,
) -> Result<()> {
    for node in batch {
        if frontier.admit(&node) {
            debug!("discovered {}", node);
            *pending += 1;
            work_tx.send(node).map_err(|_| {
                ExploreError::ProtocolViolation(
                    "work queue closed while the coordinator was still running".to_string(),
                )
            })?;
        } else {
            stats.duplicates_rejected += 1;
        }
    }
    *pending -= 1;
    Ok(())
}

async fn worker_loop(
    worker_id: usize,
    extractor: Arc<dyn Extractor>,
    work_rx: Arc<Mutex<mpsc::UnboundedReceiver<Node>>>,
    event_tx: mpsc::Sender<Event>,
    cancel: CancellationToken,
    progress: Option<ProgressCallback>,
) -> Result<()> {
    debug!("worker {} started", worker_id);
    loop {
        // Hold the receiver lock only while waiting for the next node.
        let node = {
            let mut rx = work_rx.lock().await;
            tokio::select! {
                _ = cancel.cancelled() => None,
                node = rx.recv() => node,
            }
        };
        let Some(node) = node else {
            break;
        };

        if let Some(callback) = &progress {
            callback(worker_id, node.clone());
        }

        let batch = match extractor.expand(&node).await {
            Ok(batch) => batch,
            Err(e) => {
                warn!("worker {}: extraction failed for {}: {}", worker_id, node, e);
                if !publish(&event_tx, Event::ItemDone { failed: true }, &cancel).await? {
                    break;
                }
                continue;
            }
        };

        if !batch.is_empty() {
            // The +1 for the outgoing batch must be published before the
            // -1 for the finished item; the reverse order lets the
            // counter touch zero while the batch is still in flight.
            if !publish(&event_tx, Event::BatchPending, &cancel).await? {
                break;
            }
            if !publish(&event_tx, Event::Batch(batch), &cancel).await? {
                break;
            }
        }
        if !publish(&event_tx, Event::ItemDone { failed: false }, &cancel).await? {
            break;
        }
    }
    debug!("worker {} finished", worker_id);
    Ok(())
}

/// Sends one event to the coordinator. Returns `Ok(false)` when the
/// fan-in channel was closed by a forced shutdown (the event is moot); a
/// closed channel outside cancellation is a protocol violation.
async fn publish(
    event_tx: &mpsc::Sender<Event>,
    event: Event,
    cancel: &CancellationToken,
) -> Result<bool> {
    if event_tx.send(event).await.is_ok() {
        return Ok(true);
    }
    if cancel.is_cancelled() {
        return Ok(false);
    }
    Err(ExploreError::ProtocolViolation(
        "send on closed fan-in channel before quiescence".to_string(),
    ))
}
