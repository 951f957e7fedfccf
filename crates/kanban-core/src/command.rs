//! Command abstractions.

use uuid::Uuid;

/// Implemented by every board mutation request.
pub trait Command: Send + Sync + std::fmt::Debug {
    /// The type name for this command (for logging).
    fn command_type(&self) -> &'static str;

    /// Correlation ID to trace this command through commit and fanout.
    fn correlation_id(&self) -> Uuid;

    /// The already-authenticated user issuing the command.
    fn actor_id(&self) -> Uuid;
}
