//! Domain layer for the board engine.

pub mod aggregates;
pub mod commands;
pub mod events;
pub mod model;
pub mod position;
pub mod repository;
pub mod wip;
