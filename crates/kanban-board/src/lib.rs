//! Kanban Board — the board state engine.
//!
//! Owns the column/card data model, the position allocator, the WIP guard,
//! and the `BoardMutator` through which every structural change to a board
//! passes.

pub mod application;
pub mod domain;
