//! Backend connection limiting.
//!
//! # Responsibilities
//! - Bound concurrent backend exchanges to `max_connections`
//! - Wait for a free slot at most `connection_request_timeout`
//! - Release the slot when the exchange's response body is done
//!
//! # Design Decisions
//! - A semaphore permit is the slot; it travels with the response body
//! - Waiting requests queue on the semaphore; there is no other queue

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::{ProxyError, Result};

/// Limits concurrent backend connections.
#[derive(Debug, Clone)]
pub struct ConnectionLimiter {
    /// Semaphore holding one permit per allowed connection.
    slots: Arc<Semaphore>,
    /// Configured maximum connections.
    max_connections: usize,
    /// How long to wait for a slot.
    acquire_timeout: Option<Duration>,
}

impl ConnectionLimiter {
    /// Create a limiter. `max_connections` must be non-zero.
    pub fn new(max_connections: usize, acquire_timeout: Option<Duration>) -> Self {
        Self {
            slots: Arc::new(Semaphore::new(max_connections)),
            max_connections,
            acquire_timeout,
        }
    }

    /// Wait for a free connection slot.
    ///
    /// Fails with [`ProxyError::PoolTimeout`] once the acquire timeout elapses.
    pub async fn acquire(&self) -> Result<ConnectionLease> {
        let started = Instant::now();
        let acquire = self.slots.clone().acquire_owned();

        let permit = match self.acquire_timeout {
            Some(timeout) => tokio::time::timeout(timeout, acquire).await.map_err(|_| {
                ProxyError::PoolTimeout {
                    waited_ms: started.elapsed().as_millis() as u64,
                }
            })?,
            None => acquire.await,
        }
        .map_err(|_| ProxyError::Backend("connection limiter closed".to_string()))?;

        tracing::trace!(
            available = self.slots.available_permits(),
            max_connections = self.max_connections,
            "Backend connection slot acquired"
        );

        Ok(ConnectionLease { _permit: permit })
    }

    /// Get current available connection slots.
    pub fn available_permits(&self) -> usize {
        self.slots.available_permits()
    }
}

/// A held backend connection slot.
///
/// When dropped, the slot is released back to the limiter.
#[derive(Debug)]
pub struct ConnectionLease {
    _permit: OwnedSemaphorePermit,
}
