//! Default paths for drill components
//!
//! Paths are user-writable by default:
//! - Config: `$XDG_CONFIG_HOME/drill/config.toml` or `~/.config/drill/config.toml`
//! - Data: `$DRILL_DATA_DIR`, `$XDG_DATA_HOME/drill` or `~/.local/share/drill`

use std::path::{Path, PathBuf};

/// Environment variable for overriding the data directory
pub const DRILL_DATA_DIR_ENV: &str = "DRILL_DATA_DIR";

/// Application subdirectory name
const APP_DIR: &str = "drill";

/// Config filename within the config directory
const CONFIG_FILENAME: &str = "config.toml";

/// Session scripts subdirectory of the data directory
const SESSIONS_DIRNAME: &str = "sessions";

/// Get the default data directory.
///
/// Order of precedence:
/// 1. `$DRILL_DATA_DIR` environment variable (if set)
/// 2. `$XDG_DATA_HOME/drill` (if XDG_DATA_HOME is set)
/// 3. `~/.local/share/drill` (fallback)
pub fn default_data_dir() -> PathBuf {
    if let Ok(path) = std::env::var(DRILL_DATA_DIR_ENV) {
        return PathBuf::from(path);
    }

    data_dir_without_env()
}

/// Data directory from the XDG variables alone
fn data_dir_without_env() -> PathBuf {
    if let Ok(data_home) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(data_home).join(APP_DIR);
    }

    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home)
            .join(".local")
            .join("share")
            .join(APP_DIR);
    }

    // Last resort
    PathBuf::from("/tmp").join(APP_DIR).join("data")
}

/// Get the default config file path.
///
/// Order of precedence:
/// 1. `$XDG_CONFIG_HOME/drill/config.toml` (if XDG_CONFIG_HOME is set)
/// 2. `~/.config/drill/config.toml` (fallback)
pub fn default_config_path() -> PathBuf {
    if let Ok(config_home) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(config_home).join(APP_DIR).join(CONFIG_FILENAME);
    }

    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home)
            .join(".config")
            .join(APP_DIR)
            .join(CONFIG_FILENAME);
    }

    PathBuf::from("/etc").join(APP_DIR).join(CONFIG_FILENAME)
}

/// Directory scanned for dated session scripts (`--today`)
pub fn sessions_dir_in(data_dir: &Path) -> PathBuf {
    data_dir.join(SESSIONS_DIRNAME)
}
