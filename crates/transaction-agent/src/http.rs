// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! reqwest client construction.

use std::time::Duration;
use tracing::{debug, error};

use crate::config::AgentConfig;

/// Builds the HTTP client used for delivery.
///
/// An unusable proxy setting does not stop the agent: the error is logged and
/// a direct client is returned instead.
#[must_use]
pub fn get_client(config: &AgentConfig) -> reqwest::Client {
    match build_client(config) {
        Ok(client) => client,
        Err(e) => {
            error!("HTTP | Unable to parse proxy configuration: {e}, falling back to direct connection");
            match client_builder(config).build() {
                Ok(client) => client,
                Err(inner) => {
                    error!("HTTP | Failed to build HTTP client without proxy: {inner}, using reqwest defaults");
                    reqwest::Client::new()
                }
            }
        }
    }
}

fn build_client(config: &AgentConfig) -> Result<reqwest::Client, reqwest::Error> {
    let mut builder = client_builder(config);
    if let Some(proxy) = &config.proxy {
        let url = proxy.url();
        debug!("HTTP | Sending through proxy {url}");
        builder = builder.proxy(reqwest::Proxy::all(url)?);
    }
    builder.build()
}

fn client_builder(config: &AgentConfig) -> reqwest::ClientBuilder {
    reqwest::Client::builder()
        .timeout(config.request_timeout)
        .pool_idle_timeout(Duration::from_secs(270))
        .tcp_keepalive(Duration::from_secs(120))
}
