// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Unbounded, insertion-ordered queue of admitted records shared by the
//! producers and every sender worker.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError, TryLockError};
use tracing::trace;

use crate::wire::WireRecord;

/// Callback invoked with the buffer size after a push.
pub type SizeObserver = Box<dyn Fn(usize) + Send + Sync>;

/// Handle returned by [`TransactionBuffer::add_size_observer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

pub struct TransactionBuffer {
    records: Mutex<VecDeque<WireRecord>>,
    observers: Mutex<Vec<(ObserverId, SizeObserver)>>,
    next_observer: AtomicU64,
}

impl Default for TransactionBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionBuffer {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(VecDeque::new()),
            observers: Mutex::new(Vec::new()),
            next_observer: AtomicU64::new(0),
        }
    }

    /// Appends a record and, if no other push is notifying, reports the new
    /// size to every observer.
    ///
    /// Notification is best-effort. A push that finds the notification lock
    /// held skips it; the in-flight notification already carries a size at
    /// least as large and senders poll on their own interval anyway.
    pub fn push(&self, record: WireRecord) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(record);

        let observers = match self.observers.try_lock() {
            Ok(observers) => observers,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => {
                trace!("BUFFER | Size notification already in flight, skipping");
                return;
            }
        };
        if observers.is_empty() {
            return;
        }
        let size = self.len();
        for (_, observer) in observers.iter() {
            observer(size);
        }
    }

    /// Removes and returns up to `max` of the oldest records, or every record
    /// when `max` is `None`.
    pub fn drain(&self, max: Option<usize>) -> Vec<WireRecord> {
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        let count = max.map_or(records.len(), |max| max.min(records.len()));
        records.drain(..count).collect()
    }

    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }

    /// Registers a size observer.
    ///
    /// Observers run on the pushing thread while the notification lock is held,
    /// so they must be cheap and must not register or remove observers.
    pub fn add_size_observer<F>(&self, observer: F) -> ObserverId
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        let id = ObserverId(self.next_observer.fetch_add(1, Ordering::Relaxed));
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Box::new(observer)));
        id
    }

    /// Unregisters an observer. Returns whether it was registered.
    pub fn remove_size_observer(&self, id: ObserverId) -> bool {
        let mut observers = self.observers.lock().unwrap_or_else(PoisonError::into_inner);
        let before = observers.len();
        observers.retain(|(observer_id, _)| *observer_id != id);
        observers.len() != before
    }

    pub fn observer_count(&self) -> usize {
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AgentConfig;
    use crate::transaction::Transaction;
    use proptest::prelude::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;
    use std::thread;

    fn config(size_threshold: usize) -> AgentConfig {
        AgentConfig::builder()
            .endpoint("http://localhost")
            .api_key("key")
            .size_threshold(size_threshold)
            .application("app01", "ESB")
            .application("app02", "CRM")
            .build()
            .expect("valid config")
    }

    fn record(config: &AgentConfig, message: &str) -> WireRecord {
        let tx = Transaction::new()
            .with_from_key("app01")
            .with_to_key("app02")
            .with_message(message);
        WireRecord::from_transaction(&tx, config).expect("conversion failed")
    }

    #[test]
    fn test_drain_is_fifo() {
        let config = config(0);
        let buffer = TransactionBuffer::new();
        for i in 0..3 {
            buffer.push(record(&config, &i.to_string()));
        }
        assert_eq!(buffer.len(), 3);

        let first = buffer.drain(Some(1));
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].message(), "0");

        let rest = buffer.drain(None);
        let messages: Vec<&str> = rest.iter().map(WireRecord::message).collect();
        assert_eq!(messages, vec!["1", "2"]);
        assert!(buffer.is_empty());
        assert!(buffer.drain(None).is_empty());
    }

    #[test]
    fn test_observers_receive_size() {
        let config = config(0);
        let buffer = TransactionBuffer::new();
        let last_seen = Arc::new(AtomicUsize::new(0));
        let calls = Arc::new(AtomicUsize::new(0));

        let seen = Arc::clone(&last_seen);
        let counted = Arc::clone(&calls);
        buffer.add_size_observer(move |size| {
            seen.store(size, Ordering::SeqCst);
            counted.fetch_add(1, Ordering::SeqCst);
        });

        buffer.push(record(&config, "a"));
        buffer.push(record(&config, "b"));

        assert_eq!(last_seen.load(Ordering::SeqCst), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_removed_observer_is_not_called() {
        let config = config(0);
        let buffer = TransactionBuffer::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let counted = Arc::clone(&calls);
        let first = buffer.add_size_observer(move |_| {
            counted.fetch_add(1, Ordering::SeqCst);
        });
        let second = buffer.add_size_observer(|_| {});
        assert_ne!(first, second);
        assert_eq!(buffer.observer_count(), 2);

        buffer.push(record(&config, "a"));
        assert!(buffer.remove_size_observer(first));
        assert!(!buffer.remove_size_observer(first));
        buffer.push(record(&config, "b"));

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(buffer.observer_count(), 1);
    }

    #[test]
    fn test_concurrent_push_and_drain_loses_nothing() {
        let config = Arc::new(config(0));
        let buffer = Arc::new(TransactionBuffer::new());
        buffer.add_size_observer(|_| thread::yield_now());

        let producers: Vec<_> = (0..4)
            .map(|p| {
                let buffer = Arc::clone(&buffer);
                let config = Arc::clone(&config);
                thread::spawn(move || {
                    for i in 0..250 {
                        buffer.push(record(&config, &format!("{p}-{i}")));
                    }
                })
            })
            .collect();

        let consumer = {
            let buffer = Arc::clone(&buffer);
            thread::spawn(move || {
                let mut drained = Vec::new();
                for _ in 0..200 {
                    drained.extend(buffer.drain(Some(3)));
                    thread::yield_now();
                }
                drained
            })
        };

        for producer in producers {
            producer.join().expect("producer panicked");
        }
        let mut drained = consumer.join().expect("consumer panicked");
        drained.extend(buffer.drain(None));

        let mut messages: Vec<String> = drained.iter().map(|r| r.message().to_string()).collect();
        assert_eq!(messages.len(), 1000);
        messages.sort();
        messages.dedup();
        assert_eq!(messages.len(), 1000);
    }

    proptest! {
        #[test]
        fn drain_size_follows_threshold(threshold in 0usize..5, pushed in 0usize..20) {
            let config = config(threshold);
            let buffer = TransactionBuffer::new();
            for i in 0..pushed {
                buffer.push(record(&config, &i.to_string()));
            }

            let drained = buffer.drain(config.max_batch());
            if threshold <= 1 {
                prop_assert_eq!(drained.len(), pushed.min(1));
            } else {
                prop_assert_eq!(drained.len(), pushed);
                prop_assert!(buffer.is_empty());
            }
        }
    }
}
