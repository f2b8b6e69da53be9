// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Periodic backlog check that scales sender concurrency out.
//!
//! The buffer is considered overloaded once it holds more than 1.3 times the
//! size threshold. Workers are only ever added; the cap is enforced by the
//! [`WorkerScaler`].

use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::buffer::TransactionBuffer;
use crate::config::{AgentConfig, OverloadTrigger};

/// Receiver of scale-out requests.
pub trait WorkerScaler: Send + Sync {
    /// Starts one more worker unless the cap is reached. Returns whether a
    /// worker was added.
    fn request_worker(&self) -> bool;

    fn worker_count(&self) -> usize;
}

/// `size > 1.3 * threshold`, in integer arithmetic.
pub fn exceeds_limit(size: usize, threshold: usize) -> bool {
    size.saturating_mul(10) > threshold.saturating_mul(13)
}

pub struct OverloadMonitor {
    buffer: Arc<TransactionBuffer>,
    scaler: Arc<dyn WorkerScaler>,
    size_threshold: usize,
    trigger: OverloadTrigger,
    check_interval: Duration,
    // last observation, used by the edge trigger
    over_limit: bool,
}

impl OverloadMonitor {
    pub fn new(
        config: &AgentConfig,
        buffer: Arc<TransactionBuffer>,
        scaler: Arc<dyn WorkerScaler>,
    ) -> Self {
        Self {
            buffer,
            scaler,
            size_threshold: config.size_threshold,
            trigger: config.overload.trigger,
            check_interval: config.overload.check_interval,
            over_limit: false,
        }
    }

    /// Inspects the buffer once. Returns whether a worker was requested.
    pub fn check(&mut self) -> bool {
        let size = self.buffer.len();
        if size == 0 {
            self.over_limit = false;
            return false;
        }

        let overloaded = exceeds_limit(size, self.size_threshold);
        let was_over_limit = std::mem::replace(&mut self.over_limit, overloaded);
        if !overloaded || (self.trigger == OverloadTrigger::Edge && was_over_limit) {
            return false;
        }

        if self.scaler.request_worker() {
            info!(
                "OVERLOAD | {size} transactions buffered (threshold {}), now running {} sender workers",
                self.size_threshold,
                self.scaler.worker_count()
            );
        } else {
            debug!(
                "OVERLOAD | {size} transactions buffered but the worker cap of {} is reached",
                self.scaler.worker_count()
            );
        }
        true
    }

    pub async fn run(mut self, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.check_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // the first tick completes immediately
        interval.tick().await;

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = interval.tick() => {
                    self.check();
                }
            }
        }
        debug!("OVERLOAD | Monitor stopped");
    }
}
