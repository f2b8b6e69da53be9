// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Helper functions for integration tests

use serde_json::Value;
use std::time::Duration;
use transaction_agent::{
    config::{AgentConfig, AgentConfigBuilder},
    transaction::Transaction,
    transport::Payload,
};

/// Config with a registered pair of applications, an operation and an id type.
pub fn config_builder(endpoint: &str) -> AgentConfigBuilder {
    AgentConfig::builder()
        .endpoint(endpoint)
        .api_key("test-api-key")
        .send_interval(Duration::from_millis(20))
        .application("app01", "ESB")
        .application("app02", "CRM")
        .operation("update", "Update")
        .id_type("dataType01", "Order Id")
        .payload_type("subInterface01", "Interface 1")
}

pub fn valid_transaction(message: &str) -> Transaction {
    Transaction::new()
        .with_from_key("app01")
        .with_to_key("app02")
        .with_operation_key("update")
        .with_status("success")
        .with_message(message)
        .with_ids("dataType01", ["42"])
}

/// Messages of every record carried by the given payloads, in send order.
#[allow(dead_code)]
pub fn sent_messages(payloads: &[Payload]) -> Vec<String> {
    payloads
        .iter()
        .flat_map(|payload| {
            let body: Value = serde_json::from_slice(&payload.body).expect("payload is not json");
            body["transactions"]
                .as_array()
                .expect("missing transactions array")
                .iter()
                .map(|tx| tx["message"].as_str().unwrap_or_default().to_string())
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Polls `condition` until it holds or `timeout` elapses.
#[allow(dead_code)]
pub async fn wait_until<F: Fn() -> bool>(condition: F, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}
