// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Background delivery worker.
//!
//! Each iteration picks one action: re-send the outstanding payload, drain and
//! send a new batch, or idle until the send interval elapses or the buffer
//! reports a size at or above the threshold. A cancelled worker keeps going
//! until its retries are settled and the buffer is empty.

use std::sync::Arc;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::buffer::{ObserverId, TransactionBuffer};
use crate::config::AgentConfig;
use crate::send_status::SendStatus;
use crate::transport::{Payload, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Retry,
    Send,
    None,
}

pub struct Sender {
    id: usize,
    config: Arc<AgentConfig>,
    buffer: Arc<TransactionBuffer>,
    transport: Arc<dyn Transport>,
    cancel: CancellationToken,
    wake: Arc<Notify>,
    observer: ObserverId,
    status: SendStatus,
    pending: Option<Payload>,
}

impl Sender {
    /// Creates a worker and subscribes it to the buffer's size notifications.
    ///
    /// The subscription lasts until the worker is dropped, which `run` does on
    /// exit.
    pub fn new(
        id: usize,
        config: Arc<AgentConfig>,
        buffer: Arc<TransactionBuffer>,
        transport: Arc<dyn Transport>,
        cancel: CancellationToken,
    ) -> Self {
        let wake = Arc::new(Notify::new());
        let threshold = config.size_threshold;
        let notify = Arc::clone(&wake);
        let observer = buffer.add_size_observer(move |size| {
            if size >= threshold {
                notify.notify_one();
            }
        });

        Self {
            id,
            config,
            buffer,
            transport,
            cancel,
            wake,
            observer,
            status: SendStatus::new(),
            pending: None,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn status(&self) -> &SendStatus {
        &self.status
    }

    pub fn next_action(&self) -> Action {
        if self.status.should_retry() && self.pending.is_some() {
            Action::Retry
        } else if !self.buffer.is_empty() {
            Action::Send
        } else {
            Action::None
        }
    }

    /// Performs one control-loop action and returns which one it was.
    pub async fn step(&mut self) -> Action {
        let action = self.next_action();
        match action {
            Action::Retry => {
                debug!(
                    "SENDER | Worker {} retrying last batch, attempt {}",
                    self.id,
                    self.status.retry_count() + 1
                );
                self.deliver().await;
            }
            Action::Send => self.send_next_batch().await,
            Action::None => {}
        }
        action
    }

    pub async fn run(mut self) {
        debug!("SENDER | Worker {} started", self.id);
        loop {
            match self.step().await {
                Action::None => {
                    if self.cancel.is_cancelled() {
                        break;
                    }
                    self.idle().await;
                }
                _ if self.status.should_retry() => self.backoff().await,
                _ => {}
            }
        }
        debug!("SENDER | Worker {} stopped", self.id);
    }

    async fn send_next_batch(&mut self) {
        let batch = self.buffer.drain(self.config.max_batch());
        if batch.is_empty() {
            // another worker got there first
            return;
        }
        match Payload::encode(&batch, self.config.gzip_enabled) {
            Ok(payload) => {
                self.pending = Some(payload);
                self.deliver().await;
            }
            Err(e) => {
                error!(
                    "SENDER | Unable to encode {} transactions, dropping them: {e}",
                    batch.len()
                );
            }
        }
    }

    async fn deliver(&mut self) {
        let Some(payload) = self.pending.as_ref() else {
            return;
        };
        let outcome = match self.transport.send(payload).await {
            Ok(response) => self.status.record_response(response.status, response.body),
            Err(e) => self.status.record_error(&e),
        };
        if !outcome.keeps_batch() {
            self.pending = None;
        }
    }

    async fn idle(&self) {
        tokio::select! {
            () = self.cancel.cancelled() => {}
            () = self.wake.notified() => {}
            () = tokio::time::sleep(self.config.send_interval) => {}
        }
    }

    async fn backoff(&self) {
        tokio::select! {
            () = self.cancel.cancelled() => {}
            () = tokio::time::sleep(self.config.send_interval) => {}
        }
    }
}

impl Drop for Sender {
    fn drop(&mut self) {
        self.buffer.remove_size_observer(self.observer);
    }
}
