// src/core/tasks/mod.rs

//! Long-running background tasks: idle-session reaping and pool upkeep.

pub mod pool_maintainer;
pub mod reaper;
