// src/core/pool/mod.rs

//! The warm browser-context pool.
//!
//! A semaphore caps the number of contexts checked out at once (the hard
//! ceiling); a free list holds pre-created contexts so session creation does
//! not pay browser launch latency. Contexts are health-checked on release,
//! discarded past their maximum age, and only reused when the driver backend
//! can guarantee a pristine state.

use crate::core::errors::GatewayError;
use crate::core::metrics;
use crate::driver::{BrowserDriver, BrowserProfile, ContextHandle};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, warn};

struct IdleContext {
    handle: Box<dyn ContextHandle>,
    created_at: Instant,
}

/// A context checked out of the pool. Holds a ceiling permit until it is
/// released or dropped.
pub struct PooledContext {
    handle: Option<Box<dyn ContextHandle>>,
    created_at: Instant,
    _permit: OwnedSemaphorePermit,
}

impl std::fmt::Debug for PooledContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledContext")
            .field("created_at", &self.created_at)
            .finish()
    }
}

impl PooledContext {
    pub fn handle(&self) -> &dyn ContextHandle {
        // The Option is only vacated by `ContextPool::release`, which
        // consumes self.
        self.handle
            .as_deref()
            .expect("pooled context accessed after release")
    }
}

pub struct ContextPool {
    driver: Arc<dyn BrowserDriver>,
    profile: BrowserProfile,
    free: Mutex<VecDeque<IdleContext>>,
    permits: Arc<Semaphore>,
    warm_target: usize,
    hard_ceiling: usize,
    acquire_timeout: Duration,
    max_age: Duration,
}

impl ContextPool {
    pub fn new(
        driver: Arc<dyn BrowserDriver>,
        profile: BrowserProfile,
        warm_target: usize,
        hard_ceiling: usize,
        acquire_timeout: Duration,
        max_age: Duration,
    ) -> Self {
        Self {
            driver,
            profile,
            free: Mutex::new(VecDeque::new()),
            permits: Arc::new(Semaphore::new(hard_ceiling.max(1))),
            warm_target,
            hard_ceiling: hard_ceiling.max(1),
            acquire_timeout,
            max_age,
        }
    }

    /// Checks a context out of the pool, creating one if no warm context is
    /// available. At the hard ceiling the call waits up to the acquire
    /// timeout and then fails fast with resource exhaustion.
    pub async fn acquire(&self) -> Result<PooledContext, GatewayError> {
        let permit = match tokio::time::timeout(
            self.acquire_timeout,
            self.permits.clone().acquire_owned(),
        )
        .await
        {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => return Err(GatewayError::ShuttingDown),
            Err(_) => return Err(GatewayError::ResourceExhausted),
        };

        // Prefer a warm context, skipping any that died or aged out while
        // idle. The free-list lock is never held across an await.
        loop {
            let idle = self.free.lock().pop_front();
            let Some(idle) = idle else { break };
            metrics::POOL_IDLE_CONTEXTS.dec();
            if idle.created_at.elapsed() <= self.max_age && idle.handle.is_healthy().await {
                return Ok(PooledContext {
                    handle: Some(idle.handle),
                    created_at: idle.created_at,
                    _permit: permit,
                });
            }
            self.discard(idle.handle).await;
        }

        let handle = self
            .driver
            .new_context(&self.profile)
            .await
            .map_err(|e| GatewayError::Internal(format!("context launch failed: {e}")))?;
        Ok(PooledContext {
            handle: Some(handle),
            created_at: Instant::now(),
            _permit: permit,
        })
    }

    /// Returns a context after a session is done with it. Unhealthy,
    /// over-age, or non-recyclable contexts are discarded; the maintainer
    /// replaces them on its next pass.
    pub async fn release(&self, mut context: PooledContext) {
        let Some(handle) = context.handle.take() else {
            return;
        };
        if context.created_at.elapsed() > self.max_age {
            debug!("discarding context past max age");
            self.discard(handle).await;
            return;
        }
        if !handle.is_healthy().await {
            debug!("discarding unhealthy context on release");
            self.discard(handle).await;
            return;
        }
        match handle.recycle().await {
            Ok(true) => {
                self.free.lock().push_back(IdleContext {
                    handle,
                    created_at: context.created_at,
                });
                metrics::POOL_IDLE_CONTEXTS.inc();
            }
            Ok(false) => self.discard(handle).await,
            Err(e) => {
                warn!(error = %e, "context recycle failed; discarding");
                self.discard(handle).await;
            }
        }
    }

    /// Tops the free list back up to the warm target. Run by the pool
    /// maintainer task and once at startup.
    pub async fn maintain(&self) {
        while self.idle_len() < self.warm_target {
            match self.driver.new_context(&self.profile).await {
                Ok(handle) => {
                    self.free.lock().push_back(IdleContext {
                        handle,
                        created_at: Instant::now(),
                    });
                    metrics::POOL_IDLE_CONTEXTS.inc();
                }
                Err(e) => {
                    warn!(error = %e, "failed to replenish warm context");
                    break;
                }
            }
        }
    }

    /// Closes every idle context; used during shutdown.
    pub async fn drain(&self) {
        loop {
            let idle = self.free.lock().pop_front();
            match idle {
                Some(idle) => {
                    metrics::POOL_IDLE_CONTEXTS.dec();
                    idle.handle.close().await;
                }
                None => break,
            }
        }
    }

    pub fn idle_len(&self) -> usize {
        self.free.lock().len()
    }

    pub fn hard_ceiling(&self) -> usize {
        self.hard_ceiling
    }

    /// Contexts currently checked out by sessions.
    pub fn in_use(&self) -> usize {
        self.hard_ceiling - self.permits.available_permits()
    }

    async fn discard(&self, handle: Box<dyn ContextHandle>) {
        metrics::CONTEXTS_DISCARDED_TOTAL.inc();
        handle.close().await;
    }
}
