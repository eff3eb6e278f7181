//! Standard locations for configuration files

use std::path::PathBuf;

/// Directory name under the platform config directory
const APP_DIR: &str = "twindeck";

/// Config file name
const CONFIG_FILE: &str = "config.yaml";

/// Get the application's configuration directory
///
/// Returns `<platform config dir>/twindeck` (e.g. `~/.config/twindeck` on
/// Linux), or `./twindeck` if the platform has no config directory.
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

/// Get the default config file path: `<config dir>/twindeck/config.yaml`
pub fn default_config_path() -> PathBuf {
    config_dir().join(CONFIG_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_dir_ends_with_app_name() {
        assert!(config_dir().ends_with("twindeck"));
    }

    #[test]
    fn test_config_path_layout() {
        let path = default_config_path();
        assert!(path.ends_with("twindeck/config.yaml"));
    }
}
