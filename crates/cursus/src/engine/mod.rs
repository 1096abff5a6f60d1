/*
 *  Copyright 2025-2026 Colliery Software
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! Sync Engine Module
//!
//! The engine owns the flush loop for the offline command queue. It is
//! responsible for:
//! - Tracking which workspaces to flush on a recurring interval
//! - Serializing flushers per workspace via the sync lock (cross-process)
//!   and an in-process guard (same engine instance)
//! - Running each pending command through the delivery state machine
//! - Rescheduling transient failures with capped exponential backoff
//! - Recovering commands orphaned in-flight by a crashed flusher
//! - Emitting status events for observers (e.g. a pending-commands screen)
//!
//! The engine is explicitly constructed from its collaborators and cheap
//! to clone; the host wires one instance through its composition root and
//! calls [`SyncEngine::start`]/[`SyncEngine::shutdown`] around its own
//! lifecycle. Scheduler-level failures are logged and never kill the loop;
//! only the explicit [`SyncEngine::flush`] call surfaces cycle errors to
//! its caller.
//!
//! Within one workspace commands are delivered strictly one at a time in
//! `created_at` order: a command's outcome is durably recorded before the
//! next command is handed to the transport. There is no ordering guarantee
//! across workspaces.

mod config;

pub use config::{SyncEngineConfig, SyncEngineConfigBuilder};

use chrono::Duration as ChronoDuration;
use std::collections::{BTreeSet, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::error::FlushError;
use crate::lock::SyncLock;
use crate::models::command::{CommandFailure, CommandStatus, OutboxCommand};
use crate::models::event::SyncEvent;
use crate::network::{NetworkMonitor, NetworkStatus};
use crate::retry::compute_backoff_delay;
use crate::store::OutboxStore;
use crate::transport::{CommandOutcome, SyncTransport};

/// Counters describing what one completed flush cycle did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FlushStats {
    /// Commands pulled from the queue and handed to the transport
    pub processed: usize,
    /// Commands accepted by the remote system
    pub succeeded: usize,
    /// Commands rescheduled with backoff after a transient failure
    pub rescheduled: usize,
    /// Commands that failed permanently
    pub failed: usize,
    /// Commands parked for manual conflict resolution
    pub conflicted: usize,
    /// Stale in-flight commands swept back to pending before the batch
    pub recovered: u64,
}

impl FlushStats {
    fn has_changes(&self) -> bool {
        self.processed > 0 || self.recovered > 0
    }
}

/// Result of one explicit flush call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// A cycle ran; see the stats for what it did.
    Completed(FlushStats),
    /// The network monitor reported offline; nothing was read or sent.
    SkippedOffline,
    /// Another flusher is active for this workspace (in this process or,
    /// via the sync lock, in another one); nothing was mutated.
    SkippedLocked,
}

struct EngineInner {
    store: Arc<dyn OutboxStore>,
    lock: Arc<dyn SyncLock>,
    transport: Arc<dyn SyncTransport>,
    network: Arc<dyn NetworkMonitor>,
    clock: Arc<dyn Clock>,
    config: SyncEngineConfig,
    /// Workspaces flushed by the background loop
    workspaces: parking_lot::RwLock<BTreeSet<String>>,
    /// Per-workspace in-process guard, in addition to the cross-process lock
    flushing: parking_lot::Mutex<HashSet<String>>,
    events: broadcast::Sender<SyncEvent>,
    wake: Notify,
    stop: Notify,
    stopping: AtomicBool,
    loop_handle: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

/// Removes the workspace from the in-process flushing set when the flush
/// future completes or is dropped.
struct InProcessGuard<'a> {
    inner: &'a EngineInner,
    workspace_id: &'a str,
}

impl Drop for InProcessGuard<'_> {
    fn drop(&mut self) {
        self.inner.flushing.lock().remove(self.workspace_id);
    }
}

/// Orchestrator for replaying queued commands against the remote system.
///
/// Cheap to clone; all clones share the same state.
#[derive(Clone)]
pub struct SyncEngine {
    inner: Arc<EngineInner>,
}

impl SyncEngine {
    /// Creates an engine from its collaborators.
    pub fn new(
        store: Arc<dyn OutboxStore>,
        lock: Arc<dyn SyncLock>,
        transport: Arc<dyn SyncTransport>,
        network: Arc<dyn NetworkMonitor>,
        clock: Arc<dyn Clock>,
        config: SyncEngineConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity().max(1));
        Self {
            inner: Arc::new(EngineInner {
                store,
                lock,
                transport,
                network,
                clock,
                config,
                workspaces: parking_lot::RwLock::new(BTreeSet::new()),
                flushing: parking_lot::Mutex::new(HashSet::new()),
                events,
                wake: Notify::new(),
                stop: Notify::new(),
                stopping: AtomicBool::new(false),
                loop_handle: parking_lot::Mutex::new(None),
            }),
        }
    }

    /// The outbox store this engine reads from and writes to.
    ///
    /// UI code reads queue state (counts, per-command errors) straight
    /// from the store; events only signal *when* to re-read.
    pub fn store(&self) -> Arc<dyn OutboxStore> {
        self.inner.store.clone()
    }

    /// Adds a workspace to the background flush set. Idempotent.
    ///
    /// Tracking is in-memory only and must be re-established by the host
    /// after a restart.
    pub fn track_workspace(&self, workspace_id: impl Into<String>) {
        let workspace_id = workspace_id.into();
        let mut workspaces = self.inner.workspaces.write();
        if workspaces.insert(workspace_id.clone()) {
            debug!(workspace_id = %workspace_id, "Tracking workspace");
        }
    }

    /// Removes a workspace from the background flush set.
    pub fn untrack_workspace(&self, workspace_id: &str) {
        if self.inner.workspaces.write().remove(workspace_id) {
            debug!(workspace_id = %workspace_id, "Untracked workspace");
        }
    }

    /// Workspaces currently flushed by the background loop.
    pub fn tracked_workspaces(&self) -> Vec<String> {
        self.inner.workspaces.read().iter().cloned().collect()
    }

    /// Subscribes to status events. Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.inner.events.subscribe()
    }

    /// Asks the background loop to run a flush pass now instead of waiting
    /// for the next interval tick.
    pub fn request_flush(&self) {
        self.inner.wake.notify_one();
    }

    /// Starts the background flush loop.
    ///
    /// The loop flushes every tracked workspace on each interval tick, on
    /// [`request_flush`](Self::request_flush), and when connectivity comes
    /// back. Calling `start` on a running engine is a no-op.
    pub fn start(&self) {
        let mut handle = self.inner.loop_handle.lock();
        if handle.is_some() {
            warn!("Sync engine scheduler already running");
            return;
        }
        self.inner.stopping.store(false, Ordering::SeqCst);
        let engine = self.clone();
        *handle = Some(tokio::spawn(async move { engine.run_loop().await }));
    }

    /// Stops the background loop and waits for it to finish its current
    /// pass.
    pub async fn shutdown(&self) {
        self.inner.stopping.store(true, Ordering::SeqCst);
        self.inner.stop.notify_one();

        let handle = self.inner.loop_handle.lock().take();
        if let Some(handle) = handle {
            if handle.await.is_err() {
                warn!("Sync engine scheduler terminated abnormally");
            }
        }
    }

    /// Runs one flush cycle for the workspace and resolves when it
    /// completes.
    ///
    /// This is the "sync now" entry point; it is also how a single-command
    /// retry finishes (`reset_to_pending` on the store, then `flush`).
    /// Unlike the background loop, errors here propagate to the caller.
    pub async fn flush(&self, workspace_id: &str) -> Result<FlushOutcome, FlushError> {
        if self.inner.network.current() == NetworkStatus::Offline {
            debug!(workspace_id = %workspace_id, "Skipping flush: offline");
            return Ok(FlushOutcome::SkippedOffline);
        }

        {
            let mut flushing = self.inner.flushing.lock();
            if !flushing.insert(workspace_id.to_string()) {
                debug!(workspace_id = %workspace_id, "Skipping flush: cycle already running in this process");
                return Ok(FlushOutcome::SkippedLocked);
            }
        }
        let _guard = InProcessGuard {
            inner: self.inner.as_ref(),
            workspace_id,
        };

        if !self.inner.lock.acquire(workspace_id).await? {
            debug!(workspace_id = %workspace_id, "Skipping flush: another flusher holds the workspace lease");
            return Ok(FlushOutcome::SkippedLocked);
        }

        let cycle = self.run_cycle(workspace_id).await;

        // Best-effort: an unreleased lease expires on its own TTL.
        if let Err(e) = self.inner.lock.release(workspace_id).await {
            warn!(workspace_id = %workspace_id, error = %e, "Failed to release workspace lease");
        }

        let stats = cycle?;
        if stats.has_changes() {
            self.emit(SyncEvent::StatusChanged {
                workspace_id: workspace_id.to_string(),
            });
        }
        Ok(FlushOutcome::Completed(stats))
    }

    /// One locked flush cycle: sweep orphans, pull a batch, deliver it in
    /// order.
    async fn run_cycle(&self, workspace_id: &str) -> Result<FlushStats, FlushError> {
        let inner = &self.inner;
        let mut stats = FlushStats::default();

        if let Some(threshold) = inner.config.stale_in_flight_after() {
            let cutoff = inner.clock.now() - to_chrono(threshold);
            stats.recovered = inner
                .store
                .sweep_stale_in_flight(workspace_id, cutoff)
                .await?;
            if stats.recovered > 0 {
                info!(
                    workspace_id = %workspace_id,
                    recovered = stats.recovered,
                    "Recovered commands stuck in-flight by a crashed flusher"
                );
            }
        }

        let batch = inner
            .store
            .list_pending(workspace_id, inner.config.batch_size())
            .await?;
        if batch.is_empty() {
            return Ok(stats);
        }
        debug!(workspace_id = %workspace_id, batch = batch.len(), "Delivering pending commands");

        for command in batch {
            inner.store.mark_in_flight(command.id).await?;

            let outcome = match inner.transport.execute(&command).await {
                Ok(outcome) => outcome,
                // The transport blew up without producing a structured
                // outcome; never drop the attempt, reschedule it.
                Err(e) => {
                    warn!(command_id = %command.id, error = %e, "Transport call failed; treating as transient");
                    CommandOutcome::Retryable(CommandFailure::retryable(e.to_string()))
                }
            };

            self.apply_outcome(workspace_id, &command, outcome, &mut stats)
                .await?;
            stats.processed += 1;
        }

        Ok(stats)
    }

    /// Applies one transport outcome to the store and reports the
    /// transition.
    async fn apply_outcome(
        &self,
        workspace_id: &str,
        command: &OutboxCommand,
        outcome: CommandOutcome,
        stats: &mut FlushStats,
    ) -> Result<(), FlushError> {
        let inner = &self.inner;
        let status = match outcome {
            CommandOutcome::Applied { meta } => {
                inner.store.mark_succeeded(command.id, meta).await?;
                stats.succeeded += 1;
                info!(
                    command_id = %command.id,
                    command_type = %command.command_type,
                    "Command applied remotely"
                );
                CommandStatus::Succeeded
            }
            CommandOutcome::Retryable(error) => {
                let attempt = command.attempts + 1;
                let exhausted = inner
                    .config
                    .backoff()
                    .max_attempts
                    .map_or(false, |max| attempt >= max);

                if exhausted {
                    warn!(
                        command_id = %command.id,
                        attempts = attempt,
                        "Retry limit reached; failing command"
                    );
                    inner.store.mark_failed(command.id, error).await?;
                    stats.failed += 1;
                    CommandStatus::Failed
                } else {
                    let delay = compute_backoff_delay(attempt, inner.config.backoff());
                    let next_attempt_at = inner.clock.now() + to_chrono(delay);
                    debug!(
                        command_id = %command.id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Rescheduling command after transient failure"
                    );
                    inner
                        .store
                        .increment_attempt(command.id, next_attempt_at, error)
                        .await?;
                    stats.rescheduled += 1;
                    CommandStatus::Pending
                }
            }
            CommandOutcome::Fatal(error) => {
                error!(
                    command_id = %command.id,
                    command_type = %command.command_type,
                    message = %error.message,
                    "Command permanently rejected by the remote system"
                );
                inner.store.mark_failed(command.id, error).await?;
                stats.failed += 1;
                CommandStatus::Failed
            }
            CommandOutcome::Conflict { info } => {
                warn!(
                    command_id = %command.id,
                    command_type = %command.command_type,
                    "Command conflicted; awaiting manual resolution"
                );
                inner.store.mark_conflict(command.id, Some(info)).await?;
                stats.conflicted += 1;
                CommandStatus::Conflict
            }
        };

        self.emit(SyncEvent::CommandUpdated {
            workspace_id: workspace_id.to_string(),
            command_id: command.id,
            status,
        });
        Ok(())
    }

    /// Background scheduler: flush all tracked workspaces on every wake
    /// signal. Cycle failures are logged; the loop never dies.
    async fn run_loop(self) {
        let mut interval = tokio::time::interval(self.inner.config.flush_interval());
        // Dropped if the monitor ever closes its channel; the interval
        // then remains the only wake source.
        let mut network_rx = Some(self.inner.network.watch());

        info!("Sync engine scheduler started");
        loop {
            if self.inner.stopping.load(Ordering::SeqCst) {
                break;
            }

            let mut flush_pass = false;
            let mut drop_network_watch = false;
            {
                let network_changed = async {
                    match network_rx.as_mut() {
                        Some(rx) => rx.changed().await.is_ok(),
                        None => std::future::pending().await,
                    }
                };

                tokio::select! {
                    _ = interval.tick() => {
                        flush_pass = true;
                    }
                    _ = self.inner.wake.notified() => {
                        flush_pass = true;
                    }
                    ok = network_changed => {
                        if !ok {
                            drop_network_watch = true;
                        } else if self.inner.network.current() == NetworkStatus::Online {
                            debug!("Connectivity restored; flushing immediately");
                            flush_pass = true;
                        }
                    }
                    _ = self.inner.stop.notified() => {
                        break;
                    }
                }
            }

            if drop_network_watch {
                warn!("Network monitor closed its change feed; falling back to interval polling");
                network_rx = None;
            }
            if flush_pass {
                self.flush_tracked().await;
            }
        }
        info!("Sync engine scheduler stopped");
    }

    /// One pass over the tracked workspaces, sequentially.
    async fn flush_tracked(&self) {
        let workspaces = self.tracked_workspaces();
        for workspace_id in workspaces {
            if self.inner.network.current() == NetworkStatus::Offline {
                debug!("Offline; ending flush pass");
                break;
            }
            if let Err(e) = self.flush(&workspace_id).await {
                error!(
                    workspace_id = %workspace_id,
                    error = %e,
                    "Flush cycle failed; retrying on the next interval"
                );
            }
        }
    }

    fn emit(&self, event: SyncEvent) {
        // No receivers is fine; events are advisory.
        let _ = self.inner.events.send(event);
    }
}

fn to_chrono(duration: Duration) -> ChronoDuration {
    ChronoDuration::milliseconds(duration.as_millis() as i64)
}
