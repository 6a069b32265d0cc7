// src/core/commands/mod.rs

//! The typed command schema and result contracts.
//!
//! Requests arrive as free-form JSON; each method maps to a distinct command
//! variant with exhaustive field validation at parse time, so executors only
//! ever see well-formed input. Unknown methods fail fast.

use crate::core::errors::GatewayError;
use serde::Serialize;
use serde_json::{Map, Value};

pub mod click;
pub mod command_trait;
pub mod config_ctl;
pub mod extract;
pub mod fill;
pub mod helpers;
pub mod navigate;
pub mod session_ctl;
pub mod wait;

pub use click::{Click, ClickResult};
pub use command_trait::{CommandFlags, ExecutableCommand, ExecutionContext, ParseCommand};
pub use config_ctl::{ConfigSet, ConfigSetResult};
pub use extract::{Extract, ExtractKind, ExtractResult, MatchedElement};
pub use fill::{Fill, FillResult};
pub use navigate::{Navigate, NavigateResult};
pub use session_ctl::{
    Ping, PongResult, SessionClose, SessionCloseResult, SessionCreate, SessionCreateResult,
};
pub use wait::{Wait, WaitCondition, WaitResult};

/// A fully parsed and validated command.
#[derive(Debug, Clone)]
pub enum Command {
    Navigate(Navigate),
    Click(Click),
    Fill(Fill),
    Extract(Extract),
    Wait(Wait),
    SessionCreate(SessionCreate),
    SessionClose(SessionClose),
    ConfigSet(ConfigSet),
    Ping(Ping),
}

impl Command {
    /// Maps a wire method plus its JSON fields to a typed command.
    pub fn parse(method: &str, params: &Map<String, Value>) -> Result<Self, GatewayError> {
        match method {
            "navigate" => Ok(Command::Navigate(Navigate::parse(params)?)),
            "click" => Ok(Command::Click(Click::parse(params)?)),
            "fill" => Ok(Command::Fill(Fill::parse(params)?)),
            "extract" => Ok(Command::Extract(Extract::parse(params)?)),
            "wait" => Ok(Command::Wait(Wait::parse(params)?)),
            "session.create" => Ok(Command::SessionCreate(SessionCreate::parse(params)?)),
            "session.close" => Ok(Command::SessionClose(SessionClose::parse(params)?)),
            "config.set" => Ok(Command::ConfigSet(ConfigSet::parse(params)?)),
            "ping" => Ok(Command::Ping(Ping::parse(params)?)),
            other => Err(GatewayError::UnknownMethod(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::Navigate(_) => "navigate",
            Command::Click(_) => "click",
            Command::Fill(_) => "fill",
            Command::Extract(_) => "extract",
            Command::Wait(_) => "wait",
            Command::SessionCreate(_) => "session.create",
            Command::SessionClose(_) => "session.close",
            Command::ConfigSet(_) => "config.set",
            Command::Ping(_) => "ping",
        }
    }

    pub fn flags(&self) -> CommandFlags {
        match self {
            Command::Navigate(_) | Command::Click(_) | Command::Fill(_) => CommandFlags::MUTATING,
            Command::Extract(_) => CommandFlags::READ_ONLY | CommandFlags::CACHEABLE,
            Command::Wait(_) => CommandFlags::READ_ONLY,
            Command::SessionCreate(_) => CommandFlags::CONTROL | CommandFlags::SESSIONLESS,
            Command::SessionClose(_) => CommandFlags::CONTROL,
            Command::ConfigSet(_) => CommandFlags::CONTROL | CommandFlags::SESSIONLESS,
            Command::Ping(_) => CommandFlags::CONTROL | CommandFlags::SESSIONLESS,
        }
    }

    /// Runs the command's executor. Only valid for page commands; control
    /// commands are intercepted by the router before this point.
    pub async fn execute(&self, ctx: &ExecutionContext) -> Result<ResultPayload, GatewayError> {
        match self {
            Command::Navigate(cmd) => cmd.execute(ctx).await,
            Command::Click(cmd) => cmd.execute(ctx).await,
            Command::Fill(cmd) => cmd.execute(ctx).await,
            Command::Extract(cmd) => cmd.execute(ctx).await,
            Command::Wait(cmd) => cmd.execute(ctx).await,
            Command::SessionCreate(cmd) => cmd.execute(ctx).await,
            Command::SessionClose(cmd) => cmd.execute(ctx).await,
            Command::ConfigSet(cmd) => cmd.execute(ctx).await,
            Command::Ping(cmd) => cmd.execute(ctx).await,
        }
    }
}

/// The method-specific success payload of a reply frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResultPayload {
    Navigate(NavigateResult),
    Click(ClickResult),
    Fill(FillResult),
    Extract(ExtractResult),
    Wait(WaitResult),
    SessionCreate(SessionCreateResult),
    SessionClose(SessionCloseResult),
    ConfigSet(ConfigSetResult),
    Pong(PongResult),
}
