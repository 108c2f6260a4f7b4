//! In-memory broker with the same delivery semantics as the Redis client.
//!
//! Used by tests and local experiments. Visibility expiry, attempt counting,
//! delayed requeue, and dead-lettering all behave as in production, just
//! over process-local state.

use crate::{Broker, BrokerResult, Delivery, JobHandle};
use async_trait::async_trait;
use fabula_core::JobEnvelope;
use fabula_error::{BrokerError, BrokerErrorKind};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

struct InFlight {
    deadline: Instant,
    envelope: JobEnvelope,
}

#[derive(Default)]
struct MemoryState {
    pending: VecDeque<JobEnvelope>,
    delayed: Vec<(Instant, JobEnvelope)>,
    inflight: HashMap<String, InFlight>,
    dead: Vec<JobEnvelope>,
    fail_enqueue: bool,
}

/// Process-local broker.
#[derive(Clone)]
pub struct MemoryBroker {
    state: Arc<Mutex<MemoryState>>,
    max_attempts: u32,
}

impl MemoryBroker {
    /// Create an empty broker that dead-letters after `max_attempts`.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState::default())),
            max_attempts,
        }
    }

    /// Make every subsequent enqueue fail, for failure-path tests.
    pub fn set_fail_enqueue(&self, fail: bool) {
        if let Ok(mut state) = self.state.lock() {
            state.fail_enqueue = fail;
        }
    }

    /// Number of dead-lettered jobs.
    pub fn dead_letter_count(&self) -> usize {
        self.state.lock().map(|s| s.dead.len()).unwrap_or(0)
    }

    fn lock(&self) -> BrokerResult<MutexGuard<'_, MemoryState>> {
        self.state.lock().map_err(|_| {
            BrokerError::new(BrokerErrorKind::Connection(
                "broker mutex poisoned".to_string(),
            ))
        })
    }

    /// Promote due delayed jobs and reclaim expired in-flight jobs.
    fn sweep(state: &mut MemoryState, max_attempts: u32, now: Instant) {
        let mut due = Vec::new();
        state.delayed.retain(|(when, envelope)| {
            if *when <= now {
                due.push(envelope.clone());
                false
            } else {
                true
            }
        });
        state.pending.extend(due);

        let expired: Vec<String> = state
            .inflight
            .iter()
            .filter(|(_, entry)| entry.deadline <= now)
            .map(|(token, _)| token.clone())
            .collect();
        for token in expired {
            if let Some(entry) = state.inflight.remove(&token) {
                let envelope = entry.envelope.next_attempt();
                if envelope.attempt > max_attempts {
                    tracing::warn!(story_id = %envelope.story_id, attempt = envelope.attempt, "dead-lettering expired job");
                    state.dead.push(envelope);
                } else {
                    tracing::debug!(story_id = %envelope.story_id, attempt = envelope.attempt, "redelivering expired job");
                    state.pending.push_back(envelope);
                }
            }
        }
    }
}

#[async_trait]
impl Broker for MemoryBroker {
    async fn enqueue(&self, envelope: &JobEnvelope) -> BrokerResult<()> {
        let mut state = self.lock()?;
        if state.fail_enqueue {
            return Err(BrokerError::new(BrokerErrorKind::Enqueue(
                "enqueue rejected".to_string(),
            )));
        }
        state.pending.push_back(envelope.clone());
        Ok(())
    }

    async fn dequeue(&self, visibility: Duration) -> BrokerResult<Option<Delivery>> {
        let mut state = self.lock()?;
        let now = Instant::now();
        Self::sweep(&mut state, self.max_attempts, now);

        let Some(envelope) = state.pending.pop_front() else {
            return Ok(None);
        };

        let handle = JobHandle::generate();
        state.inflight.insert(
            handle.token().to_string(),
            InFlight {
                deadline: now + visibility,
                envelope: envelope.clone(),
            },
        );
        Ok(Some(Delivery { handle, envelope }))
    }

    async fn ack(&self, handle: &JobHandle) -> BrokerResult<()> {
        let mut state = self.lock()?;
        state.inflight.remove(handle.token());
        Ok(())
    }

    async fn nack(&self, handle: &JobHandle, delay: Option<Duration>) -> BrokerResult<()> {
        let mut state = self.lock()?;
        let Some(entry) = state.inflight.remove(handle.token()) else {
            // Visibility already expired and the sweep reclaimed the job.
            return Ok(());
        };

        let envelope = entry.envelope.next_attempt();
        if envelope.attempt > self.max_attempts {
            state.dead.push(envelope);
        } else if let Some(delay) = delay {
            state.delayed.push((Instant::now() + delay, envelope));
        } else {
            state.pending.push_back(envelope);
        }
        Ok(())
    }

    async fn extend(&self, handle: &JobHandle, visibility: Duration) -> BrokerResult<()> {
        let mut state = self.lock()?;
        if let Some(entry) = state.inflight.get_mut(handle.token()) {
            entry.deadline = Instant::now() + visibility;
        }
        Ok(())
    }
}
