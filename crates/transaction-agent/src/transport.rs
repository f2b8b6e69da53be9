// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Delivery of encoded batches to the ingestion endpoint.
//!
//! Senders only see the [`Transport`] trait. [`HttpTransport`] is the reqwest
//! implementation used by default; tests and embedders can supply their own.

use async_trait::async_trait;
use reqwest::header::{
    HeaderMap, HeaderValue, ACCEPT, ACCEPT_ENCODING, AUTHORIZATION, CONTENT_ENCODING, CONTENT_TYPE,
};
use tracing::debug;

use crate::config::AgentConfig;
use crate::error::{ConfigError, ShippingError};
use crate::http::get_client;
use crate::wire::{gzip, serialize_batch, WireRecord};

/// An encoded request body for one batch.
///
/// Built once per drained batch and re-sent unchanged on retries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    pub body: Vec<u8>,
    pub gzipped: bool,
    pub records: usize,
}

impl Payload {
    pub fn encode(records: &[WireRecord], gzip_enabled: bool) -> Result<Self, ShippingError> {
        let json = serialize_batch(records).map_err(|e| ShippingError::Payload(e.to_string()))?;
        let body = if gzip_enabled {
            gzip(&json).map_err(|e| ShippingError::Payload(e.to_string()))?
        } else {
            json
        };
        Ok(Self {
            body,
            gzipped: gzip_enabled,
            records: records.len(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends one payload. `Err` means no HTTP status was obtained.
    async fn send(&self, payload: &Payload) -> Result<TransportResponse, ShippingError>;
}

#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
    headers: HeaderMap,
}

impl HttpTransport {
    pub fn new(config: &AgentConfig) -> Result<Self, ConfigError> {
        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("apikey {}", config.api_key))
            .map_err(|_| ConfigError::Invalid("API key is not a valid header value".to_string()))?;
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("text/plain"));

        Ok(Self {
            client: get_client(config),
            endpoint: config.endpoint.clone(),
            headers,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, payload: &Payload) -> Result<TransportResponse, ShippingError> {
        let mut request = self
            .client
            .post(&self.endpoint)
            .headers(self.headers.clone())
            .body(payload.body.clone());
        if payload.gzipped {
            request = request
                .header(CONTENT_ENCODING, "gzip")
                .header(ACCEPT_ENCODING, "gzip");
        }

        debug!(
            "SENDER | Posting {} transactions ({} bytes) to {}",
            payload.records,
            payload.body.len(),
            self.endpoint
        );
        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Ok(TransportResponse { status, body })
    }
}
