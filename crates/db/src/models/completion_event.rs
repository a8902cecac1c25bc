use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Type;
use strum_macros::{Display, EnumIter, EnumString};
use ts_rs::TS;
use uuid::Uuid;

/// What kind of item was completed
#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, Hash, TS, EnumString, Display, EnumIter,
)]
#[sqlx(type_name = "event_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EventKind {
    /// Light work: quick admin or shallow tasks
    LightTask,
    /// Deep work: focused, cognitively demanding tasks
    DeepTask,
    Subtask,
    Habit,
    FocusSession,
    MorningRoutine,
}

impl EventKind {
    /// Kinds whose award depends on `focus_intensity`
    pub fn uses_focus_intensity(self) -> bool {
        matches!(self, EventKind::DeepTask | EventKind::FocusSession)
    }
}

/// Priority of the completed item, highest first
#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, Hash, TS, EnumString, Display, EnumIter,
)]
#[sqlx(type_name = "priority", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
    Backlog,
}

/// A validated completion event, as produced by the task/habit layer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, TS)]
pub struct CompletionEvent {
    /// Idempotency key, unique per user
    pub event_id: String,
    pub user_id: Uuid,
    pub kind: EventKind,
    pub priority: Option<Priority>,
    pub time_estimate_minutes: Option<i32>,
    pub focus_intensity: Option<i32>,
    pub occurred_at: DateTime<Utc>,
}

/// Completion event with free-form enum fields, as received over the wire.
/// Parsed into a `CompletionEvent` by the rule engine.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct RawCompletionEvent {
    pub event_id: String,
    pub user_id: Uuid,
    pub kind: String,
    pub priority: Option<String>,
    pub time_estimate_minutes: Option<i32>,
    pub focus_intensity: Option<i32>,
    pub occurred_at: DateTime<Utc>,
}

impl CompletionEvent {
    pub fn new(
        event_id: impl Into<String>,
        user_id: Uuid,
        kind: EventKind,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            event_id: event_id.into(),
            user_id,
            kind,
            priority: None,
            time_estimate_minutes: None,
            focus_intensity: None,
            occurred_at,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_time_estimate(mut self, minutes: i32) -> Self {
        self.time_estimate_minutes = Some(minutes);
        self
    }

    pub fn with_focus_intensity(mut self, intensity: i32) -> Self {
        self.focus_intensity = Some(intensity);
        self
    }
}
