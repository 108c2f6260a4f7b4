//! Redis-backed broker.
//!
//! Layout per queue name `q`:
//! - `q:pending` — list of job envelopes awaiting delivery
//! - `q:inflight` — sorted set of delivery tokens scored by visibility deadline
//! - `q:jobs` — hash of delivery token to envelope JSON
//! - `q:delayed` — sorted set of envelope JSON scored by due time
//! - `q:dead` — list of envelopes that exhausted their attempts
//!
//! Every dequeue first promotes due delayed jobs and reclaims expired
//! in-flight jobs (attempt + 1, or dead-letter past `max_attempts`), then
//! blocks briefly on the pending list. `ZREM` is the claim arbiter during
//! reclaim: of several workers sweeping the same token, only the one that
//! removes it requeues the job.

use crate::{Broker, BrokerResult, Delivery, JobHandle};
use async_trait::async_trait;
use deadpool_redis::{Config, Pool, Runtime};
use fabula_core::JobEnvelope;
use fabula_error::{BrokerError, BrokerErrorKind};
use redis::AsyncCommands;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, instrument, warn};

/// How long a dequeue blocks on an empty queue, in seconds.
const POLL_INTERVAL_SECS: f64 = 1.0;

/// Redis-backed broker client.
pub struct RedisBroker {
    pool: Pool,
    queue: String,
    max_attempts: u32,
}

impl RedisBroker {
    /// Connect to Redis and bind to the given queue name.
    pub fn new(redis_url: &str, queue: impl Into<String>, max_attempts: u32) -> BrokerResult<Self> {
        let cfg = Config::from_url(redis_url);
        let pool = cfg
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| BrokerError::new(BrokerErrorKind::Connection(e.to_string())))?;
        Ok(Self {
            pool,
            queue: queue.into(),
            max_attempts,
        })
    }

    fn key(&self, suffix: &str) -> String {
        format!("{}:{}", self.queue, suffix)
    }

    fn epoch_secs() -> f64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0)
    }

    async fn connection(&self) -> BrokerResult<deadpool_redis::Connection> {
        self.pool
            .get()
            .await
            .map_err(|e| BrokerError::new(BrokerErrorKind::Connection(e.to_string())))
    }

    fn decode(payload: &str) -> BrokerResult<JobEnvelope> {
        serde_json::from_str(payload)
            .map_err(|e| BrokerError::new(BrokerErrorKind::Serialization(e.to_string())))
    }

    fn encode(envelope: &JobEnvelope) -> BrokerResult<String> {
        serde_json::to_string(envelope)
            .map_err(|e| BrokerError::new(BrokerErrorKind::Serialization(e.to_string())))
    }

    /// Requeue an envelope with its attempt advanced, or dead-letter it.
    async fn requeue(
        &self,
        conn: &mut deadpool_redis::Connection,
        envelope: JobEnvelope,
    ) -> BrokerResult<()> {
        let envelope = envelope.next_attempt();
        let payload = Self::encode(&envelope)?;
        if envelope.attempt > self.max_attempts {
            warn!(story_id = %envelope.story_id, attempt = envelope.attempt, "dead-lettering job");
            conn.lpush::<_, _, ()>(self.key("dead"), payload)
                .await
                .map_err(|e| BrokerError::new(BrokerErrorKind::Ack(e.to_string())))?;
        } else {
            debug!(story_id = %envelope.story_id, attempt = envelope.attempt, "requeueing job");
            conn.lpush::<_, _, ()>(self.key("pending"), payload)
                .await
                .map_err(|e| BrokerError::new(BrokerErrorKind::Ack(e.to_string())))?;
        }
        Ok(())
    }

    /// Promote due delayed jobs and reclaim expired in-flight jobs.
    async fn sweep(&self, conn: &mut deadpool_redis::Connection) -> BrokerResult<()> {
        let now = Self::epoch_secs();

        let due: Vec<String> = conn
            .zrangebyscore(self.key("delayed"), "-inf", now)
            .await
            .map_err(|e| BrokerError::new(BrokerErrorKind::Dequeue(e.to_string())))?;
        for payload in due {
            let removed: i64 = conn
                .zrem(self.key("delayed"), &payload)
                .await
                .map_err(|e| BrokerError::new(BrokerErrorKind::Dequeue(e.to_string())))?;
            if removed == 1 {
                conn.lpush::<_, _, ()>(self.key("pending"), payload)
                    .await
                    .map_err(|e| BrokerError::new(BrokerErrorKind::Dequeue(e.to_string())))?;
            }
        }

        let expired: Vec<String> = conn
            .zrangebyscore(self.key("inflight"), "-inf", now)
            .await
            .map_err(|e| BrokerError::new(BrokerErrorKind::Dequeue(e.to_string())))?;
        for token in expired {
            let removed: i64 = conn
                .zrem(self.key("inflight"), &token)
                .await
                .map_err(|e| BrokerError::new(BrokerErrorKind::Dequeue(e.to_string())))?;
            if removed != 1 {
                continue;
            }
            let payload: Option<String> = conn
                .hget(self.key("jobs"), &token)
                .await
                .map_err(|e| BrokerError::new(BrokerErrorKind::Dequeue(e.to_string())))?;
            conn.hdel::<_, _, ()>(self.key("jobs"), &token)
                .await
                .map_err(|e| BrokerError::new(BrokerErrorKind::Dequeue(e.to_string())))?;
            if let Some(payload) = payload {
                let envelope = Self::decode(&payload)?;
                self.requeue(conn, envelope).await?;
            }
        }

        Ok(())
    }
}

#[async_trait]
impl Broker for RedisBroker {
    #[instrument(skip(self, envelope), fields(queue = %self.queue, story_id = %envelope.story_id))]
    async fn enqueue(&self, envelope: &JobEnvelope) -> BrokerResult<()> {
        let payload = Self::encode(envelope)?;
        let mut conn = self.connection().await?;
        conn.lpush::<_, _, ()>(self.key("pending"), payload)
            .await
            .map_err(|e| BrokerError::new(BrokerErrorKind::Enqueue(e.to_string())))?;
        debug!("enqueued job");
        Ok(())
    }

    #[instrument(skip(self), fields(queue = %self.queue))]
    async fn dequeue(&self, visibility: Duration) -> BrokerResult<Option<Delivery>> {
        let mut conn = self.connection().await?;
        self.sweep(&mut conn).await?;

        let popped: Option<(String, String)> = conn
            .brpop(self.key("pending"), POLL_INTERVAL_SECS)
            .await
            .map_err(|e| BrokerError::new(BrokerErrorKind::Dequeue(e.to_string())))?;

        let Some((_, payload)) = popped else {
            return Ok(None);
        };

        let envelope = Self::decode(&payload)?;
        let handle = JobHandle::generate();
        let deadline = Self::epoch_secs() + visibility.as_secs_f64();

        conn.hset::<_, _, _, ()>(self.key("jobs"), handle.token(), &payload)
            .await
            .map_err(|e| BrokerError::new(BrokerErrorKind::Dequeue(e.to_string())))?;
        conn.zadd::<_, _, _, ()>(self.key("inflight"), handle.token(), deadline)
            .await
            .map_err(|e| BrokerError::new(BrokerErrorKind::Dequeue(e.to_string())))?;

        debug!(story_id = %envelope.story_id, attempt = envelope.attempt, "delivered job");
        Ok(Some(Delivery { handle, envelope }))
    }

    async fn ack(&self, handle: &JobHandle) -> BrokerResult<()> {
        let mut conn = self.connection().await?;
        conn.zrem::<_, _, ()>(self.key("inflight"), handle.token())
            .await
            .map_err(|e| BrokerError::new(BrokerErrorKind::Ack(e.to_string())))?;
        conn.hdel::<_, _, ()>(self.key("jobs"), handle.token())
            .await
            .map_err(|e| BrokerError::new(BrokerErrorKind::Ack(e.to_string())))?;
        Ok(())
    }

    async fn nack(&self, handle: &JobHandle, delay: Option<Duration>) -> BrokerResult<()> {
        let mut conn = self.connection().await?;
        let removed: i64 = conn
            .zrem(self.key("inflight"), handle.token())
            .await
            .map_err(|e| BrokerError::new(BrokerErrorKind::Ack(e.to_string())))?;
        if removed != 1 {
            // Visibility already expired; the sweep owns the job now.
            return Ok(());
        }

        let payload: Option<String> = conn
            .hget(self.key("jobs"), handle.token())
            .await
            .map_err(|e| BrokerError::new(BrokerErrorKind::Ack(e.to_string())))?;
        conn.hdel::<_, _, ()>(self.key("jobs"), handle.token())
            .await
            .map_err(|e| BrokerError::new(BrokerErrorKind::Ack(e.to_string())))?;

        let Some(payload) = payload else {
            return Ok(());
        };
        let envelope = Self::decode(&payload)?;

        match delay {
            Some(delay) => {
                let envelope = envelope.next_attempt();
                if envelope.attempt > self.max_attempts {
                    conn.lpush::<_, _, ()>(self.key("dead"), Self::encode(&envelope)?)
                        .await
                        .map_err(|e| BrokerError::new(BrokerErrorKind::Ack(e.to_string())))?;
                } else {
                    let due = Self::epoch_secs() + delay.as_secs_f64();
                    conn.zadd::<_, _, _, ()>(self.key("delayed"), Self::encode(&envelope)?, due)
                        .await
                        .map_err(|e| BrokerError::new(BrokerErrorKind::Ack(e.to_string())))?;
                }
            }
            None => self.requeue(&mut conn, envelope).await?,
        }
        Ok(())
    }

    async fn extend(&self, handle: &JobHandle, visibility: Duration) -> BrokerResult<()> {
        let mut conn = self.connection().await?;
        let deadline = Self::epoch_secs() + visibility.as_secs_f64();
        // XX: only rescore while the token is still in flight
        redis::cmd("ZADD")
            .arg(self.key("inflight"))
            .arg("XX")
            .arg(deadline)
            .arg(handle.token())
            .query_async::<()>(&mut *conn)
            .await
            .map_err(|e| BrokerError::new(BrokerErrorKind::Ack(e.to_string())))?;
        Ok(())
    }
}
