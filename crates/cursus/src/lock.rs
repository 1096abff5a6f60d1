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

//! Workspace sync lock.
//!
//! Only one flusher may process a workspace's queue at a time, across
//! every tab/process/device sharing the same storage. The lock is a
//! TTL-bounded lease: a crashed holder's lease expires and the next
//! flusher takes over, so a stall never starves the queue permanently.
//!
//! Any shared-state primitive with expiring exclusive acquire works as a
//! backend. [`MemorySyncLock`] covers single-process hosts and tests.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::clock::Clock;
use crate::error::LockError;

/// Default lease length: long enough for one flush cycle, short enough
/// that a crashed holder is displaced quickly.
pub const DEFAULT_LEASE_TTL: Duration = Duration::from_secs(15);

/// Mutual exclusion for workspace flushing.
#[async_trait]
pub trait SyncLock: Send + Sync {
    /// Attempts to take the exclusive lease for the workspace.
    ///
    /// Returns `false` if another holder's lease has not yet expired.
    /// Must be race-safe under concurrent callers: at most one of them
    /// sees `true` per lease window.
    async fn acquire(&self, workspace_id: &str) -> Result<bool, LockError>;

    /// Releases the lease early. Idempotent: releasing a lease you do not
    /// hold is a no-op.
    async fn release(&self, workspace_id: &str) -> Result<(), LockError>;
}

/// [`SyncLock`] backed by a process-local map of lease expiries.
pub struct MemorySyncLock {
    leases: Mutex<HashMap<String, DateTime<Utc>>>,
    lease_ttl: ChronoDuration,
    clock: Arc<dyn Clock>,
}

impl MemorySyncLock {
    /// Creates a lock with [`DEFAULT_LEASE_TTL`].
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_ttl(clock, DEFAULT_LEASE_TTL)
    }

    /// Creates a lock with a custom lease TTL.
    pub fn with_ttl(clock: Arc<dyn Clock>, lease_ttl: Duration) -> Self {
        Self {
            leases: Mutex::new(HashMap::new()),
            lease_ttl: ChronoDuration::milliseconds(lease_ttl.as_millis() as i64),
            clock,
        }
    }
}

#[async_trait]
impl SyncLock for MemorySyncLock {
    async fn acquire(&self, workspace_id: &str) -> Result<bool, LockError> {
        let now = self.clock.now();
        let mut leases = self.leases.lock();

        if let Some(expires_at) = leases.get(workspace_id) {
            if *expires_at > now {
                return Ok(false);
            }
        }

        leases.insert(workspace_id.to_string(), now + self.lease_ttl);
        Ok(true)
    }

    async fn release(&self, workspace_id: &str) -> Result<(), LockError> {
        self.leases.lock().remove(workspace_id);
        Ok(())
    }
}
