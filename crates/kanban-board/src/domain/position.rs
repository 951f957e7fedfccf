//! Position allocator: sparse ordering keys with rare compaction.
//!
//! A new key is placed strictly between its intended neighbours, so a single
//! insertion never rewrites a sibling. Inserting repeatedly at the same
//! boundary halves the gap each time; once the gap can no longer be split
//! the allocator compacts the whole column to evenly spaced keys as part of
//! the same insertion.

/// Distance between neighbouring keys after compaction, and the step used
/// past either end of a column.
pub const POSITION_STEP: f64 = 1024.0;

/// Gaps at or below this size are treated as exhausted.
const MIN_GAP: f64 = 1e-9;

/// Outcome of allocating a key.
#[derive(Debug, Clone, PartialEq)]
pub enum Allocation {
    /// The key fits between its neighbours; no sibling changes.
    Slot(f64),
    /// The gap was exhausted and every sibling was renumbered.
    Compacted {
        /// Key for the inserted item.
        position: f64,
        /// New keys for the existing siblings, in their original order.
        siblings: Vec<f64>,
    },
}

impl Allocation {
    /// The key assigned to the inserted item.
    #[must_use]
    pub fn position(&self) -> f64 {
        match self {
            Self::Slot(position) | Self::Compacted { position, .. } => *position,
        }
    }
}

/// Allocates a key for an item inserted at `index` among `siblings`.
///
/// `siblings` must be the current keys in read order; `index` is clamped to
/// `[0, siblings.len()]`.
#[must_use]
pub fn allocate(siblings: &[f64], index: usize) -> Allocation {
    let index = index.min(siblings.len());
    let previous = index.checked_sub(1).map(|i| siblings[i]);
    let next = siblings.get(index).copied();

    let candidate = match (previous, next) {
        (None, None) => Some(POSITION_STEP),
        (None, Some(next)) => Some(next - POSITION_STEP).filter(|p| *p < next),
        (Some(previous), None) => Some(previous + POSITION_STEP).filter(|p| *p > previous),
        (Some(previous), Some(next)) => midpoint(previous, next),
    };

    match candidate {
        Some(position) if position.is_finite() => Allocation::Slot(position),
        _ => compact(siblings.len(), index),
    }
}

/// Evenly spaced keys for `count` items: `STEP, 2*STEP, ...`.
#[allow(clippy::cast_precision_loss)]
pub fn spaced(count: usize) -> impl Iterator<Item = f64> {
    (1..=count).map(|rank| rank as f64 * POSITION_STEP)
}

fn midpoint(previous: f64, next: f64) -> Option<f64> {
    if next - previous <= MIN_GAP {
        return None;
    }
    let mid = previous + (next - previous) / 2.0;
    (previous < mid && mid < next).then_some(mid)
}

fn compact(len: usize, index: usize) -> Allocation {
    let mut keys: Vec<f64> = spaced(len + 1).collect();
    let position = keys.remove(index);
    Allocation::Compacted {
        position,
        siblings: keys,
    }
}
