//! WIP guard.
//!
//! Only consulted when a card enters a column: creation, or a move from a
//! different column. Reordering inside a column never changes its occupancy
//! and never reaches this module.

use kanban_core::error::DomainError;

use super::model::Column;

/// Whether a column with `wip_limit` holding `current` cards admits one more.
///
/// A limit of `0` means unlimited.
#[must_use]
pub fn admits(wip_limit: u32, current: usize) -> bool {
    wip_limit == 0 || current < wip_limit as usize
}

/// Checks that `column` can accept one more card given its `current` occupancy.
///
/// # Errors
///
/// Returns `DomainError::CapacityExceeded` carrying the limit and count.
pub fn ensure_capacity(column: &Column, current: usize) -> Result<(), DomainError> {
    if admits(column.wip_limit, current) {
        return Ok(());
    }
    Err(DomainError::CapacityExceeded {
        column_id: column.id,
        limit: column.wip_limit,
        current,
    })
}
