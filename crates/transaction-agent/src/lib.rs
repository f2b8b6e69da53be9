// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! # Transaction Agent
//!
//! In-process agent that records business transactions between applications
//! and ships them to an HTTP ingestion endpoint.
//!
//! Callers build a [`Transaction`](transaction::Transaction) and hand it to
//! [`Agent::add_transaction`](agent::Agent::add_transaction). Admitted
//! transactions are resolved against the configured key tables, buffered in
//! memory and sent in batches by background sender workers. Failed sends are
//! retried a bounded number of times; a backlog makes the agent add workers up
//! to a configured maximum.
//!
//! ```rust,ignore
//! use transaction_agent::{agent::Agent, config::AgentConfig};
//!
//! let config = AgentConfig::builder()
//!     .endpoint("https://logs.example.com/rest/v2.0/transaction")
//!     .api_key(api_key)
//!     .application("esb", "ESB")
//!     .application("crm", "CRM")
//!     .build()?;
//! let agent = Agent::new(config)?;
//! agent.start()?;
//!
//! let tx = agent
//!     .new_transaction()
//!     .with_from_key("esb")
//!     .with_to_key("crm")
//!     .with_status("success");
//! agent.add_transaction(tx)?;
//!
//! agent.stop().await;
//! ```
//!
//! Delivery is best-effort and at-most-once. Nothing is persisted.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod agent;
pub mod buffer;
pub mod config;
pub mod error;
pub mod http;
pub mod logger;
pub mod overload;
pub mod send_status;
pub mod sender;
pub mod transaction;
pub mod transport;
pub mod validators;
pub mod wire;
