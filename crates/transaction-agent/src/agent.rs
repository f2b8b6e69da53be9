// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Public entry point: admission of transactions and worker lifecycle.

use std::sync::{Arc, Mutex, PoisonError};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::buffer::TransactionBuffer;
use crate::config::AgentConfig;
use crate::error::AgentError;
use crate::overload::{OverloadMonitor, WorkerScaler};
use crate::sender::Sender;
use crate::transaction::Transaction;
use crate::transport::{HttpTransport, Transport};
use crate::validators::ValidatorChain;
use crate::wire::WireRecord;

/// Sender workers of one started agent.
struct WorkerPool {
    config: Arc<AgentConfig>,
    buffer: Arc<TransactionBuffer>,
    transport: Arc<dyn Transport>,
    cancel: CancellationToken,
    runtime: Handle,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    fn spawn_worker(&self, workers: &mut Vec<JoinHandle<()>>) {
        let sender = Sender::new(
            workers.len(),
            Arc::clone(&self.config),
            Arc::clone(&self.buffer),
            Arc::clone(&self.transport),
            self.cancel.clone(),
        );
        workers.push(self.runtime.spawn(sender.run()));
    }

    fn take_workers(&self) -> Vec<JoinHandle<()>> {
        std::mem::take(&mut *self.workers.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl WorkerScaler for WorkerPool {
    fn request_worker(&self) -> bool {
        // checked under the lock so `stop` joins every worker it lets through
        let mut workers = self.workers.lock().unwrap_or_else(PoisonError::into_inner);
        if self.cancel.is_cancelled() || workers.len() >= self.config.overload.max_workers {
            return false;
        }
        self.spawn_worker(&mut workers);
        true
    }

    fn worker_count(&self) -> usize {
        self.workers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

struct Running {
    pool: Arc<WorkerPool>,
    cancel: CancellationToken,
    monitor: JoinHandle<()>,
}

/// In-process transaction logging agent.
///
/// A disabled agent accepts every call and does nothing.
pub struct Agent {
    config: Arc<AgentConfig>,
    buffer: Arc<TransactionBuffer>,
    validators: ValidatorChain,
    transport: Arc<dyn Transport>,
    running: Mutex<Option<Running>>,
}

impl Agent {
    /// Creates an agent delivering over HTTP.
    pub fn new(config: AgentConfig) -> Result<Self, AgentError> {
        let transport = HttpTransport::new(&config)?;
        Self::with_transport(config, Arc::new(transport))
    }

    pub fn with_transport(
        config: AgentConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, AgentError> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            buffer: Arc::new(TransactionBuffer::new()),
            validators: ValidatorChain::new(),
            transport,
            running: Mutex::new(None),
        })
    }

    /// Launches the first sender worker and the overload monitor.
    ///
    /// Must be called from within a tokio runtime. Does nothing when the agent
    /// is disabled.
    pub fn start(&self) -> Result<(), AgentError> {
        if !self.config.enabled {
            debug!("AGENT | Disabled, not starting");
            return Ok(());
        }

        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        if running.is_some() {
            return Err(AgentError::AlreadyStarted);
        }
        let runtime = Handle::try_current().map_err(|_| AgentError::NoRuntime)?;

        let cancel = CancellationToken::new();
        let pool = Arc::new(WorkerPool {
            config: Arc::clone(&self.config),
            buffer: Arc::clone(&self.buffer),
            transport: Arc::clone(&self.transport),
            cancel: cancel.clone(),
            runtime: runtime.clone(),
            workers: Mutex::new(Vec::new()),
        });
        pool.request_worker();

        let monitor = OverloadMonitor::new(
            &self.config,
            Arc::clone(&self.buffer),
            Arc::clone(&pool) as Arc<dyn WorkerScaler>,
        );
        let monitor = runtime.spawn(monitor.run(cancel.clone()));

        info!("AGENT | Started, sending to {}", self.config.endpoint);
        *running = Some(Running {
            pool,
            cancel,
            monitor,
        });
        Ok(())
    }

    /// Stops the monitor and every worker, waiting until the buffer has been
    /// flushed.
    pub async fn stop(&self) {
        let running = self
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(running) = running else {
            return;
        };

        running.cancel.cancel();
        if let Err(e) = running.monitor.await {
            error!("AGENT | Overload monitor failed: {e}");
        }

        let workers = running.pool.take_workers();
        let count = workers.len();
        for worker in workers {
            if let Err(e) = worker.await {
                error!("AGENT | Sender worker failed: {e}");
            }
        }
        info!("AGENT | Stopped {count} sender workers");
    }

    pub fn new_transaction(&self) -> Transaction {
        Transaction::new()
    }

    /// Validates `tx` and queues it for delivery.
    ///
    /// Validation failures are returned and leave the buffer untouched.
    pub fn add_transaction(&self, tx: Transaction) -> Result<(), AgentError> {
        if !self.config.enabled {
            return Ok(());
        }
        self.validators.validate(&tx, &self.config)?;
        let record = WireRecord::from_transaction(&tx, &self.config)?;
        self.buffer.push(record);
        Ok(())
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn application_exists(&self, key: &str) -> bool {
        self.config.applications.contains_key(key)
    }

    pub fn operation_exists(&self, key: &str) -> bool {
        self.config.operations.contains_key(key)
    }

    pub fn payload_type_exists(&self, key: &str) -> bool {
        self.config.payload_types.contains_key(key)
    }

    pub fn id_type_exists(&self, key: &str) -> bool {
        self.config.id_types.contains_key(key)
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn worker_count(&self) -> usize {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map_or(0, |running| running.pool.worker_count())
    }

    /// Number of transactions waiting to be sent.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Adds one sender worker, up to the configured maximum.
    pub fn increase_workers(&self) -> bool {
        let pool = self
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|running| Arc::clone(&running.pool));
        pool.is_some_and(|pool| pool.request_worker())
    }
}

impl Drop for Agent {
    fn drop(&mut self) {
        // workers still flush the buffer on their own once cancelled
        if let Some(running) = self
            .running
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            running.cancel.cancel();
        }
    }
}
