// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Caller-facing transaction records.
//!
//! A [`Transaction`] describes one business event between two applications.
//! It is filled in by the caller and handed to
//! [`Agent::add_transaction`](crate::agent::Agent::add_transaction), which
//! validates it and converts it into an immutable
//! [`WireRecord`](crate::wire::WireRecord).

use serde::Serialize;
use std::time::{SystemTime, UNIX_EPOCH};

pub const STATUS_SUCCESS: &str = "success";
pub const STATUS_FAILURE: &str = "failure";
pub const STATUS_UNKNOWN: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NameValuePair {
    pub name: String,
    pub value: String,
}

impl NameValuePair {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Identifier values for one id-type key, in insertion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdEntry {
    pub type_key: String,
    pub values: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    from_key: Option<String>,
    to_key: Option<String>,
    operation_key: Option<String>,
    payload_type_key: Option<String>,
    message: Option<String>,
    status: Option<String>,
    flow_id: Option<String>,
    timestamp: i64,
    ids: Vec<IdEntry>,
    metadata: Vec<NameValuePair>,
}

impl Default for Transaction {
    fn default() -> Self {
        Self::new()
    }
}

impl Transaction {
    /// Creates an empty transaction stamped with the current time.
    pub fn new() -> Self {
        Self {
            from_key: None,
            to_key: None,
            operation_key: None,
            payload_type_key: None,
            message: None,
            status: None,
            flow_id: None,
            timestamp: now_millis(),
            ids: Vec::new(),
            metadata: Vec::with_capacity(2),
        }
    }

    pub fn from_key(&self) -> Option<&str> {
        self.from_key.as_deref()
    }

    pub fn to_key(&self) -> Option<&str> {
        self.to_key.as_deref()
    }

    pub fn operation_key(&self) -> Option<&str> {
        self.operation_key.as_deref()
    }

    pub fn payload_type_key(&self) -> Option<&str> {
        self.payload_type_key.as_deref()
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Conventionally one of [`STATUS_SUCCESS`], [`STATUS_FAILURE`] or
    /// [`STATUS_UNKNOWN`].
    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    /// Correlation id shared by every transaction of one flow.
    pub fn flow_id(&self) -> Option<&str> {
        self.flow_id.as_deref()
    }

    /// Creation time in epoch milliseconds.
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn ids(&self) -> &[IdEntry] {
        &self.ids
    }

    pub fn metadata(&self) -> &[NameValuePair] {
        &self.metadata
    }

    pub fn set_from_key(&mut self, key: impl Into<String>) {
        self.from_key = Some(key.into());
    }

    pub fn set_to_key(&mut self, key: impl Into<String>) {
        self.to_key = Some(key.into());
    }

    pub fn set_operation_key(&mut self, key: impl Into<String>) {
        self.operation_key = Some(key.into());
    }

    pub fn set_payload_type_key(&mut self, key: impl Into<String>) {
        self.payload_type_key = Some(key.into());
    }

    pub fn set_message(&mut self, message: impl Into<String>) {
        self.message = Some(message.into());
    }

    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = Some(status.into());
    }

    pub fn set_flow_id(&mut self, flow_id: impl Into<String>) {
        self.flow_id = Some(flow_id.into());
    }

    #[must_use]
    pub fn with_from_key(mut self, key: impl Into<String>) -> Self {
        self.set_from_key(key);
        self
    }

    #[must_use]
    pub fn with_to_key(mut self, key: impl Into<String>) -> Self {
        self.set_to_key(key);
        self
    }

    #[must_use]
    pub fn with_operation_key(mut self, key: impl Into<String>) -> Self {
        self.set_operation_key(key);
        self
    }

    #[must_use]
    pub fn with_payload_type_key(mut self, key: impl Into<String>) -> Self {
        self.set_payload_type_key(key);
        self
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.set_message(message);
        self
    }

    #[must_use]
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.set_status(status);
        self
    }

    #[must_use]
    pub fn with_flow_id(mut self, flow_id: impl Into<String>) -> Self {
        self.set_flow_id(flow_id);
        self
    }

    #[must_use]
    pub fn with_ids<I, S>(mut self, type_key: &str, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.add_ids_by_type_key(type_key, ids);
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.add_metadata(name, value);
        self
    }

    pub fn ids_by_type(&self, type_key: &str) -> Option<&[String]> {
        self.ids
            .iter()
            .find(|entry| entry.type_key == type_key)
            .map(|entry| entry.values.as_slice())
    }

    /// Starts an empty id list for `type_key`, replacing any existing one.
    pub fn add_id_type_key(&mut self, type_key: impl Into<String>) -> &mut Vec<String> {
        let type_key = type_key.into();
        let index = match self.ids.iter().position(|e| e.type_key == type_key) {
            Some(index) => {
                self.ids[index].values.clear();
                index
            }
            None => {
                self.ids.push(IdEntry {
                    type_key,
                    values: Vec::new(),
                });
                self.ids.len() - 1
            }
        };
        &mut self.ids[index].values
    }

    /// Appends `ids` to the list for `type_key`, creating the list if needed.
    ///
    /// Duplicate values are kept.
    pub fn add_ids_by_type_key<I, S>(&mut self, type_key: &str, ids: I) -> &[String]
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let index = match self.ids.iter().position(|e| e.type_key == type_key) {
            Some(index) => index,
            None => {
                self.ids.push(IdEntry {
                    type_key: type_key.to_string(),
                    values: Vec::new(),
                });
                self.ids.len() - 1
            }
        };
        let values = &mut self.ids[index].values;
        values.extend(ids.into_iter().map(Into::into));
        values
    }

    /// Adds a metadata entry. An entry with the same name is replaced, so
    /// names stay unique.
    pub fn add_metadata(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.metadata.retain(|nvp| nvp.name != name);
        self.metadata.push(NameValuePair::new(name, value));
    }
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or_default()
}
