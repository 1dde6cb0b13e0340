//! Redis-backed queue broker for production deployments.
//!
//! Each queue is a pair of Redis lists:
//!
//! ```text
//! {namespace}::queue::[{name}]::ready                 LPUSH in, RPOPLPUSH out
//! {namespace}::queue::[{name}]::unacked::{consumer}   LREM on ack
//! ```
//!
//! RPOPLPUSH moves an item into the unacked list in one step, so a crash
//! never loses an item between fetch and acknowledgement.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;

use crate::ports::{QueueBroker, QueueError};

/// Push onto the target only if the item was still held.
const MOVE_UNACKED: &str = r#"
local removed = redis.call('LREM', KEYS[1], 1, ARGV[1])
if removed > 0 then
    redis.call('LPUSH', KEYS[2], ARGV[1])
end
return removed
"#;

/// Redis-backed queue broker.
#[derive(Clone)]
pub struct RedisBroker {
    conn: MultiplexedConnection,
    namespace: String,
}

impl RedisBroker {
    pub fn new(conn: MultiplexedConnection, namespace: impl Into<String>) -> Self {
        Self {
            conn,
            namespace: namespace.into(),
        }
    }

    /// Open a multiplexed connection to `url`.
    pub async fn connect(url: &str, namespace: impl Into<String>) -> Result<Self, QueueError> {
        let client = redis::Client::open(url).map_err(broker_error)?;
        let conn = client
            .get_multiplexed_tokio_connection()
            .await
            .map_err(broker_error)?;
        Ok(Self::new(conn, namespace))
    }

    fn ready_key(&self, queue: &str) -> String {
        ready_key(&self.namespace, queue)
    }

    fn unacked_key(&self, queue: &str, consumer: &str) -> String {
        unacked_key(&self.namespace, queue, consumer)
    }
}

fn ready_key(namespace: &str, queue: &str) -> String {
    format!("{}::queue::[{}]::ready", namespace, queue)
}

fn unacked_key(namespace: &str, queue: &str, consumer: &str) -> String {
    format!("{}::queue::[{}]::unacked::{}", namespace, queue, consumer)
}

fn broker_error(e: redis::RedisError) -> QueueError {
    QueueError::Broker(e.to_string())
}

#[async_trait]
impl QueueBroker for RedisBroker {
    async fn publish(&self, queue: &str, payload: &str) -> Result<(), QueueError> {
        let mut conn = self.conn.clone();
        conn.lpush::<_, _, ()>(self.ready_key(queue), payload)
            .await
            .map_err(broker_error)
    }

    async fn fetch(
        &self,
        queue: &str,
        consumer: &str,
        limit: usize,
    ) -> Result<Vec<String>, QueueError> {
        let ready = self.ready_key(queue);
        let unacked = self.unacked_key(queue, consumer);
        let mut conn = self.conn.clone();

        let held: usize = conn.llen(&unacked).await.map_err(broker_error)?;
        let wanted = limit.saturating_sub(held);

        let mut fetched = Vec::with_capacity(wanted);
        while fetched.len() < wanted {
            let payload: Option<String> = conn
                .rpoplpush(&ready, &unacked)
                .await
                .map_err(broker_error)?;
            match payload {
                Some(payload) => fetched.push(payload),
                None => break,
            }
        }
        Ok(fetched)
    }

    async fn ack(&self, queue: &str, consumer: &str, payload: &str) -> Result<(), QueueError> {
        let mut conn = self.conn.clone();
        conn.lrem::<_, _, ()>(self.unacked_key(queue, consumer), 1, payload)
            .await
            .map_err(broker_error)
    }

    async fn move_unacked(
        &self,
        queue: &str,
        consumer: &str,
        payload: &str,
        target: &str,
    ) -> Result<(), QueueError> {
        let mut conn = self.conn.clone();
        let moved: i64 = redis::Script::new(MOVE_UNACKED)
            .key(self.unacked_key(queue, consumer))
            .key(self.ready_key(target))
            .arg(payload)
            .invoke_async(&mut conn)
            .await
            .map_err(broker_error)?;
        if moved == 0 {
            tracing::debug!(queue, consumer, target, "Item no longer held, nothing moved");
        }
        Ok(())
    }

    async fn return_unacked(&self, queue: &str, consumer: &str) -> Result<usize, QueueError> {
        let ready = self.ready_key(queue);
        let unacked = self.unacked_key(queue, consumer);
        let mut conn = self.conn.clone();

        let mut returned = 0;
        loop {
            let payload: Option<String> = conn
                .rpoplpush(&unacked, &ready)
                .await
                .map_err(broker_error)?;
            if payload.is_none() {
                break;
            }
            returned += 1;
        }
        Ok(returned)
    }

    async fn ready_count(&self, queue: &str) -> Result<usize, QueueError> {
        let mut conn = self.conn.clone();
        conn.llen(self.ready_key(queue)).await.map_err(broker_error)
    }

    async fn unacked_count(&self, queue: &str, consumer: &str) -> Result<usize, QueueError> {
        let mut conn = self.conn.clone();
        conn.llen(self.unacked_key(queue, consumer))
            .await
            .map_err(broker_error)
    }
}

impl std::fmt::Debug for RedisBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisBroker")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}
