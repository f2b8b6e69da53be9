// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Error types for the transaction agent.
//!
//! Configuration and validation errors are returned synchronously to whoever
//! builds the agent or submits a transaction. Shipping errors never leave the
//! sender workers; they only drive the retry state machine and the logs.

use crate::config::registry::RegistryKind;

/// Errors raised while building an [`AgentConfig`](crate::config::AgentConfig).
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Missing required configuration value: {0}")]
    Missing(&'static str),

    #[error("Duplicate key: {key} for type: {kind}")]
    DuplicateKey { key: String, kind: RegistryKind },

    #[error("Unable to parse {name}: {value:?}")]
    Unparsable { name: &'static str, value: String },
}

/// A transaction failed one of the admission checks.
///
/// The first failing check aborts admission; no partial report is produced.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("from does not exist!")]
    MissingFrom,

    #[error("to does not exist!")]
    MissingTo,

    #[error("from application does not exist: {0}")]
    UnknownFromApplication(String),

    #[error("to application does not exist: {0}")]
    UnknownToApplication(String),

    #[error("Operation does not exist: {0}")]
    UnknownOperation(String),

    #[error("IdType not found: {0}")]
    UnknownIdType(String),
}

/// Delivery failed before an HTTP status could be observed.
///
/// Every variant is treated as transient by the sender.
#[derive(Debug, thiserror::Error)]
pub enum ShippingError {
    #[error("Connection timed out: {0}")]
    Timeout(String),

    #[error("Failed to reach endpoint: {0}")]
    Destination(String),

    #[error("Failed to prepare payload: {0}")]
    Payload(String),
}

impl From<reqwest::Error> for ShippingError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ShippingError::Timeout(err.to_string())
        } else if err.is_builder() {
            ShippingError::Payload(err.to_string())
        } else {
            ShippingError::Destination(err.to_string())
        }
    }
}

/// Errors surfaced by the [`Agent`](crate::agent::Agent) facade.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Agent already started")]
    AlreadyStarted,

    #[error("Agent must be started from within a tokio runtime")]
    NoRuntime,
}
