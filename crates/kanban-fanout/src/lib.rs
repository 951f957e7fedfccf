//! Kanban Fanout — turns committed board changes into per-subscriber
//! notifications.
//!
//! Board changes go to the private channel of every current project member,
//! exactly once each. Join-request events are the one deliberate exception
//! and go to every connected user.

pub mod dispatcher;
pub mod hub;
pub mod membership;
pub mod notification;
