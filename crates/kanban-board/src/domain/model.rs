//! Entities of a board: columns and cards.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use kanban_core::error::DomainError;
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// WIP limit given to a column created without one.
pub const DEFAULT_WIP_LIMIT: u32 = 5;

/// Card priority.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Low priority.
    Low,
    /// Medium priority.
    #[default]
    Medium,
    /// High priority.
    High,
    /// Urgent priority.
    Urgent,
}

/// A column on a board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// Column identifier.
    pub id: Uuid,
    /// The board owning this column.
    pub board_id: Uuid,
    /// Display title.
    pub title: String,
    /// Maximum resident cards; `0` means unlimited.
    pub wip_limit: u32,
    /// Ordering key among sibling columns.
    pub position: f64,
    /// Creation timestamp, the secondary ordering key.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
}

/// A card resident in exactly one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    /// Card identifier.
    pub id: Uuid,
    /// The column currently holding the card.
    pub column_id: Uuid,
    /// Title.
    pub title: String,
    /// Free-form description.
    pub description: String,
    /// Assigned users.
    pub assignee_ids: Vec<Uuid>,
    /// Attached labels.
    pub label_ids: Vec<Uuid>,
    /// Milestone the card contributes to.
    pub milestone_id: Option<Uuid>,
    /// Priority.
    pub priority: Priority,
    /// Optional due date.
    pub due_date: Option<DateTime<Utc>>,
    /// Ordering key within the current column.
    pub position: f64,
    /// Creation timestamp, the secondary ordering key.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Read-order of two columns: position, then creation time, then id.
#[must_use]
pub fn column_order(a: &Column, b: &Column) -> Ordering {
    a.position
        .total_cmp(&b.position)
        .then_with(|| a.created_at.cmp(&b.created_at))
        .then_with(|| a.id.cmp(&b.id))
}

/// Read-order of two cards within a column: position, then creation time, then id.
#[must_use]
pub fn card_order(a: &Card, b: &Card) -> Ordering {
    a.position
        .total_cmp(&b.position)
        .then_with(|| a.created_at.cmp(&b.created_at))
        .then_with(|| a.id.cmp(&b.id))
}

/// Attributes supplied when a card is created.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CardAttributes {
    /// Title (required, non-blank).
    pub title: String,
    /// Description.
    #[serde(default)]
    pub description: String,
    /// Assigned users.
    #[serde(default)]
    pub assignee_ids: Vec<Uuid>,
    /// Attached labels.
    #[serde(default)]
    pub label_ids: Vec<Uuid>,
    /// Milestone reference.
    #[serde(default)]
    pub milestone_id: Option<Uuid>,
    /// Priority, `medium` when omitted.
    #[serde(default)]
    pub priority: Priority,
    /// Due date.
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
}

impl CardAttributes {
    /// Attributes for a card with only a title.
    #[must_use]
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}

/// Partial update of a column. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ColumnPatch {
    /// New title.
    pub title: Option<String>,
    /// New WIP limit. Lowering it below the current occupancy is allowed.
    pub wip_limit: Option<u32>,
}

/// Partial update of a card's descriptive fields.
///
/// For the nullable fields, `Some(None)` clears the value and `None` leaves
/// it unchanged. Column and position are never part of a patch.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CardPatch {
    /// New title.
    pub title: Option<String>,
    /// New description.
    pub description: Option<String>,
    /// Replacement assignee list.
    pub assignee_ids: Option<Vec<Uuid>>,
    /// Replacement label list.
    pub label_ids: Option<Vec<Uuid>>,
    /// New milestone, or `null` to clear it.
    #[serde(default, deserialize_with = "present")]
    pub milestone_id: Option<Option<Uuid>>,
    /// New priority.
    pub priority: Option<Priority>,
    /// New due date, or `null` to clear it.
    #[serde(default, deserialize_with = "present")]
    pub due_date: Option<Option<DateTime<Utc>>>,
}

/// Distinguishes an explicit `null` from an absent field.
fn present<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// Trims a title and rejects blank ones.
///
/// # Errors
///
/// Returns `DomainError::InvalidInput` if the title is empty after trimming.
pub fn normalize_title(title: &str) -> Result<String, DomainError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(DomainError::InvalidInput("title must not be blank".into()));
    }
    Ok(trimmed.to_owned())
}
