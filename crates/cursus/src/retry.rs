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

//! Retry backoff calculation.
//!
//! The delay curve lives in a pure function so its growth and cap can be
//! tested independently of the engine wiring. The engine only ever calls
//! [`compute_backoff_delay`] with the attempt number a command is about to
//! reach.

use rand::Rng;
use std::time::Duration;

/// Policy controlling how retryable failures are rescheduled.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    /// Delay after the first failed attempt
    pub initial_delay: Duration,
    /// Multiplier applied per additional attempt
    pub multiplier: f64,
    /// Upper bound on the computed delay
    pub max_delay: Duration,
    /// Proportional jitter in `[0.0, 1.0)`; `0.0` disables jitter and makes
    /// the curve deterministic
    pub jitter: f64,
    /// Optional ceiling on total delivery attempts. `None` retries forever;
    /// with `Some(n)`, the engine fails a command instead of rescheduling
    /// it once its attempt count reaches `n`.
    pub max_attempts: Option<u32>,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            multiplier: 2.0,
            max_delay: Duration::from_secs(300),
            jitter: 0.1,
            max_attempts: None,
        }
    }
}

/// Computes the retry delay before the given attempt.
///
/// `attempt` is 1-based: pass the attempt count a command is about to
/// reach. The delay grows exponentially from `initial_delay` and is capped
/// at `max_delay`; jitter (if enabled) spreads retries around the computed
/// value without exceeding the cap.
pub fn compute_backoff_delay(attempt: u32, policy: &BackoffPolicy) -> Duration {
    let attempt = attempt.max(1);
    let exponent = (attempt - 1).min(i32::MAX as u32) as i32;

    let base_ms = policy.initial_delay.as_millis() as f64;
    let max_ms = policy.max_delay.as_millis() as f64;
    let raw_ms = base_ms * policy.multiplier.powi(exponent);
    let capped_ms = raw_ms.min(max_ms);

    let final_ms = if policy.jitter > 0.0 {
        let spread = rand::thread_rng().gen_range(-policy.jitter..policy.jitter);
        (capped_ms * (1.0 + spread)).min(max_ms)
    } else {
        capped_ms
    };

    Duration::from_millis(final_ms.max(0.0) as u64)
}
