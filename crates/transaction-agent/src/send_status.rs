// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use tracing::{debug, error, warn};

use crate::error::ShippingError;

/// Re-sends allowed for one outstanding batch after its first attempt.
pub const MAX_RETRIES: u32 = 4;

/// What a sender must do with its outstanding batch after an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// 2xx; the batch is done.
    Delivered,
    /// 4xx; repeating the request cannot help, the batch is discarded.
    Rejected,
    /// Transient failure; the same payload is sent again next iteration.
    Retry,
    /// Transient failure with no retries left; the batch is discarded.
    Exhausted,
}

impl Outcome {
    pub fn keeps_batch(self) -> bool {
        matches!(self, Outcome::Retry)
    }
}

/// Per-worker delivery bookkeeping. Never shared between senders.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SendStatus {
    last_send_successful: bool,
    last_response_status: Option<u16>,
    last_response: Option<String>,
    retry_count: u32,
    retry_last_send: bool,
}

impl SendStatus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classifies an HTTP response and updates the retry state.
    pub fn record_response(&mut self, status: u16, body: String) -> Outcome {
        self.last_response_status = Some(status);
        self.last_send_successful = (200..300).contains(&status);

        let outcome = if self.last_send_successful {
            debug!("SENDER | Transactions sent, status: {status}");
            self.reset_retries();
            Outcome::Delivered
        } else if (400..500).contains(&status) {
            error!("SENDER | Transactions rejected, status: {status}, response: {body}. Discarding the entries.");
            self.reset_retries();
            Outcome::Rejected
        } else {
            warn!("SENDER | Failed to send transactions, status: {status}, response: {body}");
            self.transient_failure()
        };
        self.last_response = Some(body);
        outcome
    }

    /// Records a failure that produced no HTTP status.
    pub fn record_error(&mut self, err: &ShippingError) -> Outcome {
        self.last_send_successful = false;
        self.last_response_status = None;
        self.last_response = Some(err.to_string());
        match err {
            ShippingError::Timeout(_) => warn!("SENDER | Connection timed out: {err}"),
            _ => warn!("SENDER | Failed to send transactions: {err}"),
        }
        self.transient_failure()
    }

    fn transient_failure(&mut self) -> Outcome {
        self.retry_count += 1;
        if self.retry_count > MAX_RETRIES {
            error!(
                "SENDER | Failed to send transactions after {} tries. Discarding the entries.",
                self.retry_count
            );
            self.reset_retries();
            Outcome::Exhausted
        } else {
            self.retry_last_send = true;
            Outcome::Retry
        }
    }

    fn reset_retries(&mut self) {
        self.retry_count = 0;
        self.retry_last_send = false;
    }

    pub fn should_retry(&self) -> bool {
        self.retry_last_send
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn last_send_successful(&self) -> bool {
        self.last_send_successful
    }

    pub fn last_response_status(&self) -> Option<u16> {
        self.last_response_status
    }

    pub fn last_response(&self) -> Option<&str> {
        self.last_response.as_deref()
    }
}
