// src/core/handler/mod.rs

//! Frame routing: the pipeline checks and the command router.

pub mod command_router;
pub mod pipeline;

pub use command_router::{RouteOutcome, Router};
