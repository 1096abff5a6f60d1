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

//! Mutual-exclusion tests: two flushers racing for one workspace, and
//! lease takeover after a holder dies.

use chrono::Duration as ChronoDuration;
use chrono::Utc;
use std::sync::Arc;

use cursus::{
    CommandStatus, FlushOutcome, ManualClock, ManualNetworkMonitor, MemoryOutboxStore,
    MemorySyncLock, NetworkStatus, SyncEngine, SyncEngineConfig, SyncLock,
};

use crate::fixtures::{deterministic_backoff, enqueue, get, harness, BlockingTransport, ScriptedTransport};

fn engine_with_transport(
    clock: Arc<ManualClock>,
    store: Arc<MemoryOutboxStore>,
    lock: Arc<MemorySyncLock>,
    transport: Arc<dyn cursus::SyncTransport>,
) -> SyncEngine {
    SyncEngine::new(
        store,
        lock,
        transport,
        Arc::new(ManualNetworkMonitor::new(NetworkStatus::Online)),
        clock,
        SyncEngineConfig::builder()
            .backoff(deterministic_backoff())
            .build(),
    )
}

#[tokio::test]
async fn concurrent_flushers_have_a_single_winner() {
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let store = Arc::new(MemoryOutboxStore::new(clock.clone()));
    let lock = Arc::new(MemorySyncLock::new(clock.clone()));

    let blocking = Arc::new(BlockingTransport::new());
    let scripted = Arc::new(ScriptedTransport::new());

    // Two engines sharing store and lock, as two tabs/processes would.
    let winner = engine_with_transport(clock.clone(), store.clone(), lock.clone(), blocking.clone());
    let loser = engine_with_transport(clock.clone(), store.clone(), lock.clone(), scripted.clone());

    let command = enqueue(&store, &clock, "ws", "k1").await;

    let winner_flush = {
        let winner = winner.clone();
        tokio::spawn(async move { winner.flush("ws").await.unwrap() })
    };
    blocking.wait_until_entered().await;

    // The loser observes the held lease and mutates nothing this cycle.
    let outcome = loser.flush("ws").await.unwrap();
    assert_eq!(outcome, FlushOutcome::SkippedLocked);
    assert_eq!(scripted.call_count(), 0);
    assert_eq!(get(&store, command.id).await.status, CommandStatus::InFlight);

    blocking.release();
    match winner_flush.await.unwrap() {
        FlushOutcome::Completed(stats) => assert_eq!(stats.succeeded, 1),
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(get(&store, command.id).await.status, CommandStatus::Succeeded);
}

#[tokio::test]
async fn same_engine_does_not_run_overlapping_cycles() {
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let store = Arc::new(MemoryOutboxStore::new(clock.clone()));
    let lock = Arc::new(MemorySyncLock::new(clock.clone()));
    let blocking = Arc::new(BlockingTransport::new());
    let engine = engine_with_transport(clock.clone(), store.clone(), lock, blocking.clone());

    enqueue(&store, &clock, "ws", "k1").await;

    let first = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.flush("ws").await.unwrap() })
    };
    blocking.wait_until_entered().await;

    assert_eq!(
        engine.flush("ws").await.unwrap(),
        FlushOutcome::SkippedLocked
    );

    blocking.release();
    assert!(matches!(
        first.await.unwrap(),
        FlushOutcome::Completed(_)
    ));
}

#[tokio::test]
async fn expired_lease_is_taken_over() {
    let h = harness();
    let command = enqueue(&h.store, &h.clock, "ws", "k1").await;

    // A flusher elsewhere took the lease and died without releasing.
    assert!(h.lock.acquire("ws").await.unwrap());

    assert_eq!(
        h.engine.flush("ws").await.unwrap(),
        FlushOutcome::SkippedLocked
    );
    assert_eq!(h.transport.call_count(), 0);

    // Default lease is 15s; once it lapses the engine proceeds.
    h.clock.advance(ChronoDuration::seconds(16));
    match h.engine.flush("ws").await.unwrap() {
        FlushOutcome::Completed(stats) => assert_eq!(stats.succeeded, 1),
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(get(&h.store, command.id).await.status, CommandStatus::Succeeded);
}

#[tokio::test]
async fn different_workspaces_do_not_contend() {
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let store = Arc::new(MemoryOutboxStore::new(clock.clone()));
    let lock = Arc::new(MemorySyncLock::new(clock.clone()));
    let blocking = Arc::new(BlockingTransport::new());
    let scripted = Arc::new(ScriptedTransport::new());

    let engine_a = engine_with_transport(clock.clone(), store.clone(), lock.clone(), blocking.clone());
    let engine_b = engine_with_transport(clock.clone(), store.clone(), lock, scripted.clone());

    enqueue(&store, &clock, "ws-a", "k1").await;
    let b_command = enqueue(&store, &clock, "ws-b", "k1").await;

    let a_flush = {
        let engine_a = engine_a.clone();
        tokio::spawn(async move { engine_a.flush("ws-a").await.unwrap() })
    };
    blocking.wait_until_entered().await;

    // Workspace B flushes while A's cycle is still in progress.
    assert!(matches!(
        engine_b.flush("ws-b").await.unwrap(),
        FlushOutcome::Completed(_)
    ));
    assert_eq!(get(&store, b_command.id).await.status, CommandStatus::Succeeded);

    blocking.release();
    a_flush.await.unwrap();
}
