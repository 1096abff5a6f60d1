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

//! Crash-recovery tests: commands orphaned in-flight by a dead flusher
//! are swept back to pending once they exceed the staleness threshold.

use chrono::Duration as ChronoDuration;
use std::time::Duration;

use cursus::{CommandStatus, FlushOutcome, OutboxStore, SyncEngineConfig};

use crate::fixtures::{deterministic_backoff, enqueue, get, harness, harness_with};

#[tokio::test]
async fn stale_in_flight_command_is_recovered_and_delivered() {
    let h = harness();
    let command = enqueue(&h.store, &h.clock, "ws", "k1").await;

    // Simulate a flusher that claimed the command and then died.
    h.store.mark_in_flight(command.id).await.unwrap();
    h.clock.advance(ChronoDuration::minutes(10));

    let outcome = h.engine.flush("ws").await.unwrap();
    match outcome {
        FlushOutcome::Completed(stats) => {
            assert_eq!(stats.recovered, 1);
            assert_eq!(stats.succeeded, 1);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }

    let stored = get(&h.store, command.id).await;
    assert_eq!(stored.status, CommandStatus::Succeeded);
    assert_eq!(h.transport.call_count(), 1);
}

#[tokio::test]
async fn recent_in_flight_command_is_left_alone() {
    let h = harness();
    let command = enqueue(&h.store, &h.clock, "ws", "k1").await;

    h.store.mark_in_flight(command.id).await.unwrap();
    h.clock.advance(ChronoDuration::minutes(1));

    let outcome = h.engine.flush("ws").await.unwrap();
    match outcome {
        FlushOutcome::Completed(stats) => {
            assert_eq!(stats.recovered, 0);
            assert_eq!(stats.processed, 0);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }

    assert_eq!(get(&h.store, command.id).await.status, CommandStatus::InFlight);
    assert_eq!(h.transport.call_count(), 0);
}

#[tokio::test]
async fn sweep_can_be_disabled() {
    let config = SyncEngineConfig::builder()
        .backoff(deterministic_backoff())
        .stale_in_flight_after(None)
        .build();
    let h = harness_with(config);
    let command = enqueue(&h.store, &h.clock, "ws", "k1").await;

    h.store.mark_in_flight(command.id).await.unwrap();
    h.clock.advance(ChronoDuration::days(1));

    h.engine.flush("ws").await.unwrap();
    assert_eq!(get(&h.store, command.id).await.status, CommandStatus::InFlight);
    assert_eq!(h.transport.call_count(), 0);
}

#[tokio::test]
async fn recovered_command_keeps_its_attempt_count() {
    let config = SyncEngineConfig::builder()
        .backoff(deterministic_backoff())
        .stale_in_flight_after(Some(Duration::from_secs(60)))
        .build();
    let h = harness_with(config);
    let command = enqueue(&h.store, &h.clock, "ws", "k1").await;

    // One real transient failure first, then an orphaned claim.
    h.transport.push(cursus::CommandOutcome::Retryable(
        cursus::CommandFailure::retryable("5xx"),
    ));
    h.engine.flush("ws").await.unwrap();
    assert_eq!(get(&h.store, command.id).await.attempts, 1);

    h.clock.advance(ChronoDuration::seconds(2));
    h.store.mark_in_flight(command.id).await.unwrap();
    h.clock.advance(ChronoDuration::minutes(5));

    h.engine.flush("ws").await.unwrap();
    let stored = get(&h.store, command.id).await;
    assert_eq!(stored.status, CommandStatus::Succeeded);
    assert_eq!(stored.attempts, 1);
}
