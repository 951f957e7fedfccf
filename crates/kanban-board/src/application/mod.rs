//! Application layer for the board engine.

pub mod command_handlers;
pub mod query_handlers;
