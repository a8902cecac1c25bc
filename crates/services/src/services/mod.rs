pub mod progress_ledger;
pub mod xp_analytics;
pub mod xp_calendar;
pub mod xp_core;
pub mod xp_policy;
pub mod xp_rules;
