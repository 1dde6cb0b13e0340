//! In-memory queue broker for tests and single-process runs.
//!
//! Same list semantics as the Redis broker: FIFO ready lists plus one
//! unacked list per (queue, consumer). Can be switched offline to simulate
//! broker outages.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::ports::{QueueBroker, QueueError};

#[derive(Debug, Default)]
struct Lists {
    ready: HashMap<String, VecDeque<String>>,
    unacked: HashMap<(String, String), Vec<String>>,
}

/// Queue broker held entirely in process memory.
#[derive(Debug, Default)]
pub struct InMemoryBroker {
    lists: Mutex<Lists>,
    offline: AtomicBool,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every operation fail with a broker error until set back.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Snapshot of the ready list of `queue`, oldest first.
    pub fn ready_items(&self, queue: &str) -> Vec<String> {
        self.lock()
            .ready
            .get(queue)
            .map(|items| items.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Lists> {
        self.lists
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_online(&self) -> Result<(), QueueError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(QueueError::Broker("broker offline".to_string()));
        }
        Ok(())
    }
}

fn remove_one(list: &mut Vec<String>, payload: &str) -> bool {
    match list.iter().position(|item| item == payload) {
        Some(index) => {
            list.remove(index);
            true
        }
        None => false,
    }
}

#[async_trait]
impl QueueBroker for InMemoryBroker {
    async fn publish(&self, queue: &str, payload: &str) -> Result<(), QueueError> {
        self.check_online()?;
        self.lock()
            .ready
            .entry(queue.to_string())
            .or_default()
            .push_back(payload.to_string());
        Ok(())
    }

    async fn fetch(
        &self,
        queue: &str,
        consumer: &str,
        limit: usize,
    ) -> Result<Vec<String>, QueueError> {
        self.check_online()?;
        let mut lists = self.lock();
        let Lists { ready, unacked } = &mut *lists;

        let held = unacked
            .entry((queue.to_string(), consumer.to_string()))
            .or_default();
        let wanted = limit.saturating_sub(held.len());

        let mut fetched = Vec::new();
        if let Some(ready) = ready.get_mut(queue) {
            while fetched.len() < wanted {
                let Some(payload) = ready.pop_front() else { break };
                held.push(payload.clone());
                fetched.push(payload);
            }
        }
        Ok(fetched)
    }

    async fn ack(&self, queue: &str, consumer: &str, payload: &str) -> Result<(), QueueError> {
        self.check_online()?;
        if let Some(held) = self
            .lock()
            .unacked
            .get_mut(&(queue.to_string(), consumer.to_string()))
        {
            remove_one(held, payload);
        }
        Ok(())
    }

    async fn move_unacked(
        &self,
        queue: &str,
        consumer: &str,
        payload: &str,
        target: &str,
    ) -> Result<(), QueueError> {
        self.check_online()?;
        let mut lists = self.lock();
        let removed = lists
            .unacked
            .get_mut(&(queue.to_string(), consumer.to_string()))
            .map(|held| remove_one(held, payload))
            .unwrap_or(false);
        if removed {
            lists
                .ready
                .entry(target.to_string())
                .or_default()
                .push_back(payload.to_string());
        }
        Ok(())
    }

    async fn return_unacked(&self, queue: &str, consumer: &str) -> Result<usize, QueueError> {
        self.check_online()?;
        let mut lists = self.lock();
        let held = lists
            .unacked
            .remove(&(queue.to_string(), consumer.to_string()))
            .unwrap_or_default();
        let count = held.len();
        lists
            .ready
            .entry(queue.to_string())
            .or_default()
            .extend(held);
        Ok(count)
    }

    async fn ready_count(&self, queue: &str) -> Result<usize, QueueError> {
        self.check_online()?;
        Ok(self.lock().ready.get(queue).map_or(0, VecDeque::len))
    }

    async fn unacked_count(&self, queue: &str, consumer: &str) -> Result<usize, QueueError> {
        self.check_online()?;
        Ok(self
            .lock()
            .unacked
            .get(&(queue.to_string(), consumer.to_string()))
            .map_or(0, Vec::len))
    }
}
