// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Mock transport for driving the agent without a network

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use transaction_agent::{
    error::ShippingError,
    transport::{Payload, Transport, TransportResponse},
};

/// Replies with a scripted sequence of statuses and records every payload.
///
/// Once the script is exhausted every request gets `fallback`.
pub struct ScriptedTransport {
    statuses: Mutex<VecDeque<u16>>,
    fallback: u16,
    delay: Duration,
    sent: Mutex<Vec<Payload>>,
}

#[allow(dead_code)]
impl ScriptedTransport {
    pub fn always(status: u16) -> Self {
        Self::scripted(&[], status)
    }

    pub fn scripted(statuses: &[u16], fallback: u16) -> Self {
        Self {
            statuses: Mutex::new(statuses.iter().copied().collect()),
            fallback,
            delay: Duration::ZERO,
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Makes every send take `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn sent(&self) -> Vec<Payload> {
        self.sent.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, payload: &Payload) -> Result<TransportResponse, ShippingError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.sent.lock().unwrap().push(payload.clone());
        let status = self
            .statuses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(self.fallback);
        Ok(TransportResponse {
            status,
            body: format!("status {status}"),
        })
    }
}

/// Fails every request as if the endpoint timed out.
pub struct TimeoutTransport {
    pub attempts: Mutex<usize>,
}

#[async_trait::async_trait]
impl Transport for TimeoutTransport {
    async fn send(&self, _payload: &Payload) -> Result<TransportResponse, ShippingError> {
        *self.attempts.lock().unwrap() += 1;
        Err(ShippingError::Timeout("operation timed out".to_string()))
    }
}
