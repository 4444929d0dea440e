use directories::ProjectDirs;
use std::path::PathBuf;

/// Centralized application directory resolution
pub struct AppDirs;

impl AppDirs {
    pub fn config_path() -> PathBuf {
        ProjectDirs::from("", "", "valence")
            .map(|pd| pd.config_dir().join("config.json"))
            .unwrap_or_else(|| PathBuf::from("valence_config.json"))
    }

    /// `$HOME/.local/state/valence`, falling back to the platform data dir.
    pub fn state_dir() -> PathBuf {
        if let Ok(home) = std::env::var("HOME") {
            PathBuf::from(home)
                .join(".local")
                .join("state")
                .join("valence")
        } else {
            ProjectDirs::from("", "", "valence")
                .map(|pd| pd.data_local_dir().to_path_buf())
                .unwrap_or_else(|| PathBuf::from("valence_state"))
        }
    }

    pub fn log_path() -> PathBuf {
        Self::state_dir().join("valence.log")
    }

    pub fn backup_dir() -> PathBuf {
        Self::state_dir().join("backups")
    }
}
