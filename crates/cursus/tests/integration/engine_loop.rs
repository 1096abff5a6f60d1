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

//! Background scheduler tests. These run against real tokio time with a
//! short interval and generous timeouts.

use std::time::Duration;
use tracing_test::traced_test;

use cursus::{CommandStatus, NetworkStatus, SyncEngineConfig};

use crate::fixtures::{deterministic_backoff, enqueue, get, harness_with, wait_for_status};

fn loop_config(interval: Duration) -> SyncEngineConfig {
    SyncEngineConfig::builder()
        .flush_interval(interval)
        .backoff(deterministic_backoff())
        .build()
}

#[tokio::test]
#[traced_test]
async fn scheduler_flushes_tracked_workspaces() {
    let h = harness_with(loop_config(Duration::from_millis(20)));
    let command = enqueue(&h.store, &h.clock, "ws", "k1").await;

    h.engine.track_workspace("ws");
    h.engine.start();

    assert!(
        wait_for_status(
            &h.store,
            command.id,
            CommandStatus::Succeeded,
            Duration::from_secs(2)
        )
        .await
    );

    h.engine.shutdown().await;
    assert!(logs_contain("Sync engine scheduler started"));
    assert!(logs_contain("Sync engine scheduler stopped"));
}

#[tokio::test]
async fn untracked_workspaces_are_ignored() {
    let h = harness_with(loop_config(Duration::from_millis(20)));
    let command = enqueue(&h.store, &h.clock, "ws", "k1").await;

    // Never tracked: the scheduler has nothing to do with it.
    h.engine.start();
    tokio::time::sleep(Duration::from_millis(200)).await;
    h.engine.shutdown().await;

    assert_eq!(get(&h.store, command.id).await.status, CommandStatus::Pending);
    assert_eq!(h.transport.call_count(), 0);
}

#[tokio::test]
async fn request_flush_wakes_the_scheduler_early() {
    // Interval far beyond the test horizon: only the explicit trigger can
    // deliver the command.
    let h = harness_with(loop_config(Duration::from_secs(3600)));
    h.engine.track_workspace("ws");
    h.engine.start();

    // Let the startup pass (empty queue) go by, then enqueue and trigger.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let command = enqueue(&h.store, &h.clock, "ws", "k1").await;
    h.engine.request_flush();

    assert!(
        wait_for_status(
            &h.store,
            command.id,
            CommandStatus::Succeeded,
            Duration::from_secs(2)
        )
        .await
    );

    h.engine.shutdown().await;
}

#[tokio::test]
async fn connectivity_restoration_triggers_a_flush() {
    let h = harness_with(loop_config(Duration::from_secs(3600)));
    let command = enqueue(&h.store, &h.clock, "ws", "k1").await;

    h.network.set(NetworkStatus::Offline);
    h.engine.track_workspace("ws");
    h.engine.start();

    // Offline: nothing moves.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(get(&h.store, command.id).await.status, CommandStatus::Pending);
    assert_eq!(h.transport.call_count(), 0);

    // Back online: the scheduler reacts without waiting for the interval.
    h.network.set(NetworkStatus::Online);
    assert!(
        wait_for_status(
            &h.store,
            command.id,
            CommandStatus::Succeeded,
            Duration::from_secs(2)
        )
        .await
    );

    h.engine.shutdown().await;
}

#[tokio::test]
async fn shutdown_stops_the_scheduler() {
    let h = harness_with(loop_config(Duration::from_millis(20)));
    h.engine.track_workspace("ws");
    h.engine.start();
    h.engine.shutdown().await;

    let command = enqueue(&h.store, &h.clock, "ws", "k1").await;
    h.engine.request_flush();
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(get(&h.store, command.id).await.status, CommandStatus::Pending);
    assert_eq!(h.transport.call_count(), 0);
}
