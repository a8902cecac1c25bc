//! XP policy: every tunable constant used by the rule engine, the level curve and
//! the reference calendar. Loaded from TOML; missing sections fall back to defaults.

use std::path::{Path, PathBuf};

use db::models::{
    completion_event::{EventKind, Priority},
    xp_ledger::XpCategory,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

/// Environment variable pointing at an explicit policy file
pub const POLICY_PATH_ENV: &str = "SISO_XP_POLICY";

const MAX_UTC_OFFSET_MINUTES: i32 = 18 * 60;

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("failed to read policy file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse policy: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("non-monotonic {0}")]
    NonMonotonic(String),
    #[error("invalid policy: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct XpPolicy {
    pub base_xp: BaseXp,
    pub priority_bonus: PriorityBonus,
    pub time_bonus: TimeBonus,
    pub intensity_bonus: IntensityBonus,
    pub levels: LevelCurve,
    pub calendar: CalendarPolicy,
    pub categories: CategoryMap,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaseXp {
    pub light_task: u32,
    pub deep_task: u32,
    pub subtask: u32,
    pub habit: u32,
    pub morning_routine: u32,
    pub focus_session: u32,
}

impl Default for BaseXp {
    fn default() -> Self {
        Self {
            light_task: 15,
            deep_task: 25,
            subtask: 5,
            habit: 10,
            morning_routine: 10,
            focus_session: 20,
        }
    }
}

impl BaseXp {
    pub fn for_kind(&self, kind: EventKind) -> u32 {
        match kind {
            EventKind::LightTask => self.light_task,
            EventKind::DeepTask => self.deep_task,
            EventKind::Subtask => self.subtask,
            EventKind::Habit => self.habit,
            EventKind::MorningRoutine => self.morning_routine,
            EventKind::FocusSession => self.focus_session,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriorityBonus {
    pub critical: u32,
    pub high: u32,
    pub medium: u32,
    pub low: u32,
    pub backlog: u32,
}

impl Default for PriorityBonus {
    fn default() -> Self {
        Self {
            critical: 20,
            high: 10,
            medium: 5,
            low: 2,
            backlog: 0,
        }
    }
}

impl PriorityBonus {
    /// A missing priority earns nothing
    pub fn for_priority(&self, priority: Option<Priority>) -> u32 {
        match priority {
            Some(Priority::Critical) => self.critical,
            Some(Priority::High) => self.high,
            Some(Priority::Medium) => self.medium,
            Some(Priority::Low) => self.low,
            Some(Priority::Backlog) => self.backlog,
            None => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeBonus {
    pub step_minutes: u32,
    pub xp_per_step: u32,
    pub cap: u32,
}

impl Default for TimeBonus {
    fn default() -> Self {
        Self {
            step_minutes: 15,
            xp_per_step: 2,
            cap: 20,
        }
    }
}

impl TimeBonus {
    /// `min(floor(minutes / step_minutes) * xp_per_step, cap)`
    pub fn for_minutes(&self, minutes: u32) -> u32 {
        let steps = minutes / self.step_minutes.max(1);
        steps.saturating_mul(self.xp_per_step).min(self.cap)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntensityBonus {
    /// Bonus for focus intensity 1, 2, 3 and 4
    pub levels: [u32; 4],
}

impl Default for IntensityBonus {
    fn default() -> Self {
        Self {
            levels: [5, 10, 15, 20],
        }
    }
}

impl IntensityBonus {
    /// `intensity` must already be validated to 1..=4
    pub fn for_intensity(&self, intensity: u8) -> u32 {
        let index = usize::from(intensity.clamp(1, 4)) - 1;
        self.levels[index]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelCurve {
    /// Level `L` is reached at `base_xp * (L - 1) * L / 2` lifetime XP
    pub base_xp: u32,
}

impl Default for LevelCurve {
    fn default() -> Self {
        Self { base_xp: 100 }
    }
}

impl LevelCurve {
    /// Lifetime XP at which `level` starts. Level 1 starts at zero.
    pub fn threshold(&self, level: i64) -> i64 {
        let level = level.max(1);
        i64::from(self.base_xp).saturating_mul((level - 1).saturating_mul(level) / 2)
    }

    pub fn level_for(&self, total_xp: i64) -> i64 {
        let mut level = 1;
        while self.threshold(level + 1) <= total_xp && self.threshold(level + 1) > self.threshold(level)
        {
            level += 1;
        }
        level
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalendarPolicy {
    /// Fixed offset of the reference timezone used for day boundaries
    pub utc_offset_minutes: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryMap {
    pub light_task: XpCategory,
    pub deep_task: XpCategory,
    pub subtask: XpCategory,
    pub habit: XpCategory,
    pub morning_routine: XpCategory,
    pub focus_session: XpCategory,
}

impl Default for CategoryMap {
    fn default() -> Self {
        Self {
            light_task: XpCategory::Task,
            deep_task: XpCategory::Focus,
            subtask: XpCategory::Task,
            habit: XpCategory::Habit,
            morning_routine: XpCategory::Routine,
            focus_session: XpCategory::Focus,
        }
    }
}

impl CategoryMap {
    pub fn for_kind(&self, kind: EventKind) -> XpCategory {
        match kind {
            EventKind::LightTask => self.light_task,
            EventKind::DeepTask => self.deep_task,
            EventKind::Subtask => self.subtask,
            EventKind::Habit => self.habit,
            EventKind::MorningRoutine => self.morning_routine,
            EventKind::FocusSession => self.focus_session,
        }
    }
}

impl XpPolicy {
    pub fn from_toml_str(contents: &str) -> Result<Self, PolicyError> {
        let policy: XpPolicy = toml::from_str(contents)?;
        policy.validate()?;
        Ok(policy)
    }

    pub fn load(path: &Path) -> Result<Self, PolicyError> {
        let contents = std::fs::read_to_string(path).map_err(|source| PolicyError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let policy = Self::from_toml_str(&contents)?;
        info!(path = %path.display(), "Loaded XP policy");
        Ok(policy)
    }

    /// Load from `$SISO_XP_POLICY`, else from the user config dir, else defaults.
    /// An explicitly configured path must exist.
    pub fn load_or_default() -> Result<Self, PolicyError> {
        if let Ok(path) = std::env::var(POLICY_PATH_ENV) {
            return Self::load(Path::new(&path));
        }

        match utils::assets::xp_policy_path() {
            Some(path) if path.exists() => Self::load(&path),
            Some(path) => {
                warn!(path = %path.display(), "No XP policy file found, using defaults");
                Ok(Self::default())
            }
            None => {
                warn!("No config directory available, using default XP policy");
                Ok(Self::default())
            }
        }
    }

    pub fn validate(&self) -> Result<(), PolicyError> {
        let p = &self.priority_bonus;
        if !(p.critical >= p.high && p.high >= p.medium && p.medium >= p.low && p.low >= p.backlog) {
            return Err(PolicyError::NonMonotonic(format!(
                "priority bonus: critical={} high={} medium={} low={} backlog={}",
                p.critical, p.high, p.medium, p.low, p.backlog
            )));
        }

        if self.intensity_bonus.levels.windows(2).any(|w| w[0] > w[1]) {
            return Err(PolicyError::NonMonotonic(format!(
                "intensity bonus: {:?}",
                self.intensity_bonus.levels
            )));
        }

        if self.time_bonus.step_minutes == 0 {
            return Err(PolicyError::Invalid(
                "time_bonus.step_minutes must be positive".to_string(),
            ));
        }

        if self.levels.base_xp == 0 {
            return Err(PolicyError::Invalid(
                "levels.base_xp must be positive".to_string(),
            ));
        }

        if self.calendar.utc_offset_minutes.abs() > MAX_UTC_OFFSET_MINUTES {
            return Err(PolicyError::Invalid(format!(
                "calendar.utc_offset_minutes {} is outside +/-{}",
                self.calendar.utc_offset_minutes, MAX_UTC_OFFSET_MINUTES
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_default_policy_is_valid() {
        XpPolicy::default().validate().unwrap();
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let policy = XpPolicy::from_toml_str(
            r#"
[base_xp]
deep_task = 40

[calendar]
utc_offset_minutes = 120
"#,
        )
        .unwrap();

        assert_eq!(policy.base_xp.deep_task, 40);
        assert_eq!(policy.base_xp.light_task, 15);
        assert_eq!(policy.calendar.utc_offset_minutes, 120);
        assert_eq!(policy.priority_bonus, PriorityBonus::default());
    }

    #[test]
    fn test_category_override_from_toml() {
        let policy = XpPolicy::from_toml_str(
            r#"
[categories]
habit = "health"
"#,
        )
        .unwrap();

        assert_eq!(policy.categories.for_kind(EventKind::Habit), XpCategory::Health);
        assert_eq!(policy.categories.for_kind(EventKind::LightTask), XpCategory::Task);
    }

    #[test]
    fn test_rejects_non_monotonic_priority_bonus() {
        let err = XpPolicy::from_toml_str(
            r#"
[priority_bonus]
high = 30
"#,
        )
        .unwrap_err();
        assert!(matches!(err, PolicyError::NonMonotonic(_)));
    }

    #[test]
    fn test_rejects_decreasing_intensity_levels() {
        let err = XpPolicy::from_toml_str(
            r#"
[intensity_bonus]
levels = [5, 20, 10, 25]
"#,
        )
        .unwrap_err();
        assert!(matches!(err, PolicyError::NonMonotonic(_)));
    }

    #[test]
    fn test_rejects_zero_step_and_bad_offset() {
        assert!(matches!(
            XpPolicy::from_toml_str("[time_bonus]\nstep_minutes = 0\n").unwrap_err(),
            PolicyError::Invalid(_)
        ));
        assert!(matches!(
            XpPolicy::from_toml_str("[calendar]\nutc_offset_minutes = 1200\n").unwrap_err(),
            PolicyError::Invalid(_)
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[time_bonus]\ncap = 8").unwrap();

        let policy = XpPolicy::load(file.path()).unwrap();
        assert_eq!(policy.time_bonus.cap, 8);
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let err = XpPolicy::load(Path::new("/definitely/not/here/xp_policy.toml")).unwrap_err();
        assert!(matches!(err, PolicyError::Io { .. }));
    }

    #[test]
    fn test_time_bonus_saturates() {
        let bonus = TimeBonus::default();
        assert_eq!(bonus.for_minutes(0), 0);
        assert_eq!(bonus.for_minutes(14), 0);
        assert_eq!(bonus.for_minutes(15), 2);
        assert_eq!(bonus.for_minutes(90), 12);
        assert_eq!(bonus.for_minutes(150), 20);
        assert_eq!(bonus.for_minutes(u32::MAX), 20);
    }

    #[test]
    fn test_level_curve_thresholds() {
        let curve = LevelCurve::default();
        assert_eq!(curve.threshold(1), 0);
        assert_eq!(curve.threshold(2), 100);
        assert_eq!(curve.threshold(3), 300);
        assert_eq!(curve.threshold(4), 600);

        assert_eq!(curve.level_for(0), 1);
        assert_eq!(curve.level_for(99), 1);
        assert_eq!(curve.level_for(100), 2);
        assert_eq!(curve.level_for(299), 2);
        assert_eq!(curve.level_for(300), 3);
        assert_eq!(curve.level_for(1_000), 5);
    }

    #[test]
    fn test_level_never_decreases_as_xp_grows() {
        let curve = LevelCurve { base_xp: 37 };
        let mut previous = 1;
        for total in 0..20_000 {
            let level = curve.level_for(total);
            assert!(level >= previous);
            previous = level;
        }
    }
}
