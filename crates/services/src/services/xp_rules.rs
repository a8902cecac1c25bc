//! Pure XP rule engine: turns one completion event into one award.
//!
//! The engine holds only an immutable policy. It performs no I/O and never reads
//! the clock; the same event always yields the same award.

use std::{str::FromStr, sync::Arc};

use db::models::{
    completion_event::{CompletionEvent, EventKind, Priority, RawCompletionEvent},
    xp_ledger::XpCategory,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{
    xp_calendar::ReferenceCalendar,
    xp_policy::{PolicyError, XpPolicy},
};

/// Malformed input. Callers must fix the input rather than retry.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("unknown event kind: {0}")]
    UnknownKind(String),
    #[error("unknown priority: {0}")]
    UnknownPriority(String),
    #[error("event id must not be empty")]
    EmptyEventId,
    #[error("{kind} requires a focus intensity")]
    MissingFocusIntensity { kind: EventKind },
    #[error("focus intensity {value} for {kind} is outside 1..=4")]
    FocusIntensityOutOfRange { kind: EventKind, value: i32 },
    #[error("time estimate must be non-negative, got {0}")]
    NegativeTimeEstimate(i32),
    #[error("trend window must be between 1 and 3660 days, got {0}")]
    InvalidTrendWindow(i64),
    #[error("award {event_id} total does not match its components")]
    InconsistentAward { event_id: String },
}

/// Deterministic result of scoring one event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct XpAward {
    pub event_id: String,
    pub kind: EventKind,
    pub base_xp: u32,
    pub priority_bonus: u32,
    pub time_bonus: u32,
    pub intensity_bonus: u32,
    pub total_xp: u32,
    pub category: XpCategory,
    pub occurred_at: chrono::DateTime<chrono::Utc>,
}

impl XpAward {
    /// Whether `total_xp` is exactly the sum of the four components
    pub fn is_consistent(&self) -> bool {
        let sum = u64::from(self.base_xp)
            + u64::from(self.priority_bonus)
            + u64::from(self.time_bonus)
            + u64::from(self.intensity_bonus);
        sum == u64::from(self.total_xp)
    }
}

#[derive(Debug, Clone)]
pub struct XpRuleEngine {
    policy: Arc<XpPolicy>,
    calendar: ReferenceCalendar,
}

impl XpRuleEngine {
    pub fn new(policy: XpPolicy) -> Result<Self, PolicyError> {
        policy.validate()?;
        let calendar = ReferenceCalendar::from_policy(&policy.calendar)?;
        Ok(Self {
            policy: Arc::new(policy),
            calendar,
        })
    }

    pub fn policy(&self) -> &XpPolicy {
        &self.policy
    }

    pub fn calendar(&self) -> ReferenceCalendar {
        self.calendar
    }

    pub fn compute(&self, event: &CompletionEvent) -> Result<XpAward, ValidationError> {
        if event.event_id.trim().is_empty() {
            return Err(ValidationError::EmptyEventId);
        }

        let minutes = match event.time_estimate_minutes {
            Some(m) if m < 0 => return Err(ValidationError::NegativeTimeEstimate(m)),
            Some(m) => m.unsigned_abs(),
            None => 0,
        };

        let intensity_bonus = if event.kind.uses_focus_intensity() {
            let intensity = validate_intensity(event.kind, event.focus_intensity)?;
            self.policy.intensity_bonus.for_intensity(intensity)
        } else {
            0
        };

        let base_xp = self.policy.base_xp.for_kind(event.kind);
        let priority_bonus = self.policy.priority_bonus.for_priority(event.priority);
        let time_bonus = self.policy.time_bonus.for_minutes(minutes);
        let total_xp = base_xp
            .saturating_add(priority_bonus)
            .saturating_add(time_bonus)
            .saturating_add(intensity_bonus);

        Ok(XpAward {
            event_id: event.event_id.clone(),
            kind: event.kind,
            base_xp,
            priority_bonus,
            time_bonus,
            intensity_bonus,
            total_xp,
            category: self.policy.categories.for_kind(event.kind),
            occurred_at: event.occurred_at,
        })
    }
}

fn validate_intensity(kind: EventKind, value: Option<i32>) -> Result<u8, ValidationError> {
    let value = value.ok_or(ValidationError::MissingFocusIntensity { kind })?;
    match u8::try_from(value) {
        Ok(v @ 1..=4) => Ok(v),
        _ => Err(ValidationError::FocusIntensityOutOfRange { kind, value }),
    }
}

/// Parse an event whose enum fields arrived as strings
pub fn parse_completion_event(raw: RawCompletionEvent) -> Result<CompletionEvent, ValidationError> {
    let kind = EventKind::from_str(raw.kind.trim())
        .map_err(|_| ValidationError::UnknownKind(raw.kind.clone()))?;

    let priority = match raw.priority.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(p) => Some(
            Priority::from_str(&p.to_lowercase())
                .map_err(|_| ValidationError::UnknownPriority(p.to_string()))?,
        ),
    };

    Ok(CompletionEvent {
        event_id: raw.event_id,
        user_id: raw.user_id,
        kind,
        priority,
        time_estimate_minutes: raw.time_estimate_minutes,
        focus_intensity: raw.focus_intensity,
        occurred_at: raw.occurred_at,
    })
}
