//! Kanban Core — shared domain abstractions.
//!
//! This crate defines the traits and types every other crate in the
//! workspace depends on: the error taxonomy, the clock seam, and the
//! aggregate/event/command vocabulary. It contains no infrastructure code.

pub mod aggregate;
pub mod clock;
pub mod command;
pub mod error;
pub mod event;
