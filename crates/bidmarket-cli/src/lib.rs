//! Bidmarket CLI: command orchestration over the settlement engine.

pub mod commands;
pub mod context;

pub use context::AppContext;
