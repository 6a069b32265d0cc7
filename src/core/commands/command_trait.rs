// src/core/commands/command_trait.rs

//! Defines the core traits shared by all executable commands.

use crate::core::errors::GatewayError;
use crate::driver::PageHandle;
use async_trait::async_trait;
use bitflags::bitflags;
use std::sync::Arc;
use std::time::Duration;

bitflags! {
    /// Flags that describe the properties and behavior of a command.
    /// The router and the session worker use these to decide cache probing,
    /// state-diff capture and invalidation.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct CommandFlags: u32 {
        /// The command can observably change page state.
        const MUTATING    = 1 << 0;
        /// The command only reads page state.
        const READ_ONLY   = 1 << 1;
        /// The command's result may be served from the result cache.
        const CACHEABLE   = 1 << 2;
        /// The command does not resolve an existing session.
        const SESSIONLESS = 1 << 3;
        /// Session lifecycle / liveness, handled by the router itself.
        const CONTROL     = 1 << 4;
    }
}

/// Everything an executor needs to run against one session's page.
#[derive(Clone)]
pub struct ExecutionContext {
    pub page: Arc<dyn PageHandle>,
    /// The effective hard deadline for this command. The worker enforces it
    /// from outside; executors with their own polling loops (wait) budget
    /// slightly under it so they can report an unmet condition instead of
    /// being cancelled.
    pub deadline: Duration,
}

/// The execution logic of one command kind, run on the session's worker.
#[async_trait]
pub trait ExecutableCommand {
    async fn execute(&self, ctx: &ExecutionContext)
    -> Result<super::ResultPayload, GatewayError>;
}

/// Parses a command's method-specific fields out of a request frame.
pub trait ParseCommand: Sized {
    fn parse(params: &serde_json::Map<String, serde_json::Value>) -> Result<Self, GatewayError>;
}
