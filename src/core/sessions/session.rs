// src/core/sessions/session.rs

//! The session record: one isolated browser context plus its active page,
//! bound to one owning client.

use crate::driver::PageHandle;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

use super::worker::SessionJob;

pub struct Session {
    pub id: String,
    pub client_id: String,
    pub created_at: Instant,
    /// Updated at command entry, not completion, so a long-running command
    /// cannot race the idle reaper.
    last_activity: Mutex<Instant>,
    commands_executed: AtomicU64,
    /// Set when a deadline expired mid-primitive; the next command resets
    /// the page before running.
    pub(crate) needs_reset: AtomicBool,
    pub(crate) page: Arc<dyn PageHandle>,
    pub(crate) jobs: mpsc::Sender<SessionJob>,
}

impl Session {
    pub(crate) fn new(
        id: String,
        client_id: String,
        page: Arc<dyn PageHandle>,
        jobs: mpsc::Sender<SessionJob>,
    ) -> Self {
        let now = Instant::now();
        Self {
            id,
            client_id,
            created_at: now,
            last_activity: Mutex::new(now),
            commands_executed: AtomicU64::new(0),
            needs_reset: AtomicBool::new(false),
            page,
            jobs,
        }
    }

    pub fn touch(&self) {
        *self.last_activity.lock() = Instant::now();
    }

    pub fn idle_for(&self) -> Duration {
        self.last_activity.lock().elapsed()
    }

    pub fn commands_executed(&self) -> u64 {
        self.commands_executed.load(Ordering::Relaxed)
    }

    pub(crate) fn record_command(&self) {
        self.touch();
        self.commands_executed.fetch_add(1, Ordering::Relaxed);
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("client_id", &self.client_id)
            .field("commands_executed", &self.commands_executed())
            .finish()
    }
}
