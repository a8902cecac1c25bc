pub mod completion_event;
pub mod user_progress;
pub mod xp_ledger;
pub mod xp_summary;
