// src/core/sessions/worker.rs

//! The per-session single-worker command loop.
//!
//! Each session owns a dedicated queue; commands execute strictly in arrival
//! order on that queue, which is what serializes page mutation without any
//! server-wide lock. Distinct sessions run their workers in parallel.

use crate::core::cache::{Fingerprint, ResultCache};
use crate::core::commands::command_trait::ExecutionContext;
use crate::core::commands::{Command, CommandFlags, ResultPayload, SessionCloseResult};
use crate::core::errors::GatewayError;
use crate::core::metrics;
use crate::core::pool::{ContextPool, PooledContext};
use crate::core::sessions::session::Session;
use crate::core::state_diff::StateDiff;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use tracing::{Instrument, debug, info_span, warn};

/// What a completed command hands back to the dispatch side.
#[derive(Debug)]
pub struct ExecutedCommand {
    pub outcome: Result<ExecutionOutcome, GatewayError>,
    pub execution_ms: u64,
}

#[derive(Debug)]
pub struct ExecutionOutcome {
    pub payload: ResultPayload,
    pub diff: Option<StateDiff>,
}

pub(crate) enum SessionJob {
    Execute {
        command: Command,
        timeout: Duration,
        reply: oneshot::Sender<ExecutedCommand>,
    },
    Close {
        reply: Option<oneshot::Sender<ExecutedCommand>>,
    },
}

pub(crate) struct WorkerContext {
    pub table: Arc<DashMap<String, Arc<Session>>>,
    pub pool: Arc<ContextPool>,
    pub cache: Arc<ResultCache>,
}

/// Runs one session's job loop until the session closes.
pub(crate) async fn run(
    session: Arc<Session>,
    context: PooledContext,
    mut jobs: mpsc::Receiver<SessionJob>,
    ctx: WorkerContext,
) {
    let mut context = Some(context);

    while let Some(job) = jobs.recv().await {
        match job {
            SessionJob::Execute {
                command,
                timeout,
                reply,
            } => {
                let started = Instant::now();
                session.record_command();
                metrics::COMMANDS_PROCESSED_TOTAL.inc();

                let span = info_span!(
                    "command",
                    name = %command.name(),
                    session = %session.id,
                    client = %session.client_id,
                );
                let outcome = execute(&session, &command, timeout, &ctx.cache)
                    .instrument(span)
                    .await;

                let latency = started.elapsed();
                metrics::COMMAND_LATENCY_SECONDS.observe(latency.as_secs_f64());
                if outcome.is_err() {
                    metrics::COMMANDS_FAILED_TOTAL.inc();
                }
                let _ = reply.send(ExecutedCommand {
                    outcome,
                    execution_ms: latency.as_millis() as u64,
                });
            }
            SessionJob::Close { reply } => {
                let started = Instant::now();
                close_session(&session, &ctx, &mut context).await;
                if let Some(reply) = reply {
                    let _ = reply.send(ExecutedCommand {
                        outcome: Ok(ExecutionOutcome {
                            payload: ResultPayload::SessionClose(SessionCloseResult {
                                closed: true,
                            }),
                            diff: None,
                        }),
                        execution_ms: started.elapsed().as_millis() as u64,
                    });
                }
                break;
            }
        }
    }

    // The queue can also close without an explicit Close job (manager drop
    // during shutdown); the context still has to go back.
    if context.is_some() {
        close_session(&session, &ctx, &mut context).await;
    }
}

async fn close_session(
    session: &Arc<Session>,
    ctx: &WorkerContext,
    context: &mut Option<PooledContext>,
) {
    debug!(session = %session.id, "closing session");
    ctx.cache.invalidate_session(&session.id);
    if ctx.table.remove(&session.id).is_some() {
        metrics::ACTIVE_SESSIONS.dec();
    }
    if let Some(pooled) = context.take() {
        ctx.pool.release(pooled).await;
    }
}

async fn execute(
    session: &Arc<Session>,
    command: &Command,
    timeout: Duration,
    cache: &Arc<ResultCache>,
) -> Result<ExecutionOutcome, GatewayError> {
    if session.needs_reset.swap(false, std::sync::atomic::Ordering::SeqCst) {
        debug!(session = %session.id, "resetting page after cancelled command");
        if let Err(e) = session.page.reset().await {
            warn!(session = %session.id, error = %e, "page reset failed");
        }
    }

    let exec_ctx = ExecutionContext {
        page: session.page.clone(),
        deadline: timeout,
    };
    let flags = command.flags();

    if let Command::Extract(extract) = command {
        let fingerprint = Fingerprint::for_extract(&session.id, extract);
        if let Some(hit) = cache.lookup(&fingerprint) {
            return Ok(ExecutionOutcome {
                payload: ResultPayload::Extract(hit),
                diff: None,
            });
        }
        // Singleflight: one compute per fingerprint; later arrivals re-check
        // the cache once the first flight lands.
        let _flight = cache.lock_fingerprint(&fingerprint).await;
        if let Some(hit) = cache.lookup(&fingerprint) {
            return Ok(ExecutionOutcome {
                payload: ResultPayload::Extract(hit),
                diff: None,
            });
        }
        let payload = run_with_deadline(session, command, &exec_ctx, timeout).await?;
        if let ResultPayload::Extract(result) = &payload {
            cache.insert(fingerprint, &session.id, result.clone());
        }
        return Ok(ExecutionOutcome {
            payload,
            diff: None,
        });
    }

    if flags.contains(CommandFlags::MUTATING) {
        let before = session.page.dom_signature().await.ok();
        let result = run_with_deadline(session, command, &exec_ctx, timeout).await;
        // Whatever happened, the page may have changed under the command;
        // cached reads for this session are no longer trustworthy.
        cache.invalidate_session(&session.id);
        let payload = result?;
        let after = session.page.dom_signature().await.ok();
        let diff = match (before, after) {
            (Some(before), Some(after)) => Some(StateDiff::between(&before, &after)),
            _ => None,
        };
        return Ok(ExecutionOutcome { payload, diff });
    }

    let payload = run_with_deadline(session, command, &exec_ctx, timeout).await?;
    Ok(ExecutionOutcome {
        payload,
        diff: None,
    })
}

/// Enforces the per-command hard deadline. Expiry abandons the in-flight
/// primitive and flags the session for a page reset on next use.
async fn run_with_deadline(
    session: &Arc<Session>,
    command: &Command,
    ctx: &ExecutionContext,
    timeout: Duration,
) -> Result<ResultPayload, GatewayError> {
    match tokio::time::timeout(timeout, command.execute(ctx)).await {
        Ok(result) => result,
        Err(_) => {
            session
                .needs_reset
                .store(true, std::sync::atomic::Ordering::SeqCst);
            Err(GatewayError::Timeout(timeout.as_millis() as u64))
        }
    }
}
