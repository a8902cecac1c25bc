use std::path::PathBuf;

use directories::ProjectDirs;

/// Per-user configuration directory, e.g. `~/.config/siso` on Linux
pub fn config_dir() -> Option<PathBuf> {
    ProjectDirs::from("app", "siso", "siso").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Default location of the XP policy file
pub fn xp_policy_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("xp_policy.toml"))
}
