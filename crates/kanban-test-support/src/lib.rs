//! Shared test doubles for the kanban board engine.

mod channels;
mod clock;
mod store;

pub use channels::{FailingMembershipResolver, RecordingChannels};
pub use clock::FixedClock;
pub use store::{ConflictingBoardStore, FailingBoardStore, LockstepBoardStore, StalledBoardStore};
