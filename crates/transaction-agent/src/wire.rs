// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Serialization-ready projection of transactions and the request body format.
//!
//! A request body is a JSON object with a single `transactions` array:
//!
//! ```json
//! {"transactions":[{"to":"CRM","from":"ESB","operation":"Update","message":"",
//!   "status":"success","timestamp":1700000000000,"payloadType":"","flowId":"",
//!   "ids":[{"idType":"Order Id","values":["1","2"]}],
//!   "metadata":[{"name":"region","value":"eu"}]}]}
//! ```
//!
//! Fields a transaction leaves unset are sent as empty strings.

use flate2::write::GzEncoder;
use flate2::Compression;
use serde::Serialize;
use std::io::Write;
use tracing::debug;

use crate::config::AgentConfig;
use crate::error::ValidationError;
use crate::transaction::{NameValuePair, Transaction};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WireIdList {
    pub id_type: String,
    pub values: Vec<String>,
}

/// Immutable, name-resolved form of a [`Transaction`].
///
/// Once built it is owned by the buffer until a sender drains it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WireRecord {
    to: String,
    from: String,
    operation: String,
    message: String,
    status: String,
    timestamp: i64,
    payload_type: String,
    flow_id: String,
    ids: Vec<WireIdList>,
    metadata: Vec<NameValuePair>,
    #[serde(skip)]
    size: usize,
}

impl WireRecord {
    /// Resolves every key of `tx` to its configured name.
    ///
    /// Applications, operations and id types must resolve; the validator chain
    /// normally rejects such transactions first. An unknown payload type is
    /// sent as an empty name.
    pub fn from_transaction(tx: &Transaction, config: &AgentConfig) -> Result<Self, ValidationError> {
        let from_key = tx.from_key().ok_or(ValidationError::MissingFrom)?;
        let to_key = tx.to_key().ok_or(ValidationError::MissingTo)?;

        let from = config
            .applications
            .get(from_key)
            .ok_or_else(|| ValidationError::UnknownFromApplication(from_key.to_string()))?;
        let to = config
            .applications
            .get(to_key)
            .ok_or_else(|| ValidationError::UnknownToApplication(to_key.to_string()))?;

        let operation = match tx.operation_key() {
            Some(key) => config
                .operations
                .get(key)
                .ok_or_else(|| ValidationError::UnknownOperation(key.to_string()))?,
            None => "",
        };

        let payload_type = match tx.payload_type_key() {
            Some(key) => config.payload_types.get(key).unwrap_or_else(|| {
                debug!("Payload type {key} is not configured, sending it without a name");
                ""
            }),
            None => "",
        };

        let ids = tx
            .ids()
            .iter()
            .map(|entry| {
                config
                    .id_types
                    .get(&entry.type_key)
                    .map(|name| WireIdList {
                        id_type: name.to_string(),
                        values: entry.values.clone(),
                    })
                    .ok_or_else(|| ValidationError::UnknownIdType(entry.type_key.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut record = WireRecord {
            to: to.to_string(),
            from: from.to_string(),
            operation: operation.to_string(),
            message: tx.message().unwrap_or_default().to_string(),
            status: tx.status().unwrap_or_default().to_string(),
            timestamp: tx.timestamp(),
            payload_type: payload_type.to_string(),
            flow_id: tx.flow_id().unwrap_or_default().to_string(),
            ids,
            metadata: tx.metadata().to_vec(),
            size: 0,
        };
        record.size = record.estimate_size();
        Ok(record)
    }

    pub fn to(&self) -> &str {
        &self.to
    }

    pub fn from(&self) -> &str {
        &self.from
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn payload_type(&self) -> &str {
        &self.payload_type
    }

    pub fn flow_id(&self) -> &str {
        &self.flow_id
    }

    pub fn ids(&self) -> &[WireIdList] {
        &self.ids
    }

    pub fn metadata(&self) -> &[NameValuePair] {
        &self.metadata
    }

    /// Approximate number of payload bytes this record contributes.
    pub fn size(&self) -> usize {
        self.size
    }

    fn estimate_size(&self) -> usize {
        let strings = self.to.len()
            + self.from.len()
            + self.operation.len()
            + self.message.len()
            + self.status.len()
            + self.payload_type.len()
            + self.flow_id.len();
        let ids: usize = self
            .ids
            .iter()
            .map(|l| l.id_type.len() + l.values.iter().map(String::len).sum::<usize>())
            .sum();
        let metadata: usize = self
            .metadata
            .iter()
            .map(|m| m.name.len() + m.value.len())
            .sum();
        strings + ids + metadata
    }
}

#[derive(Serialize)]
struct Envelope<'a> {
    transactions: &'a [WireRecord],
}

/// Serializes a batch into the JSON request body.
pub fn serialize_batch(records: &[WireRecord]) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(&Envelope {
        transactions: records,
    })
}

/// Gzip-compresses a request body.
pub fn gzip(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}
