use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::error::ConfigError;
use crate::core::layout::LauncherDataLayout;

pub(crate) const DEFAULT_SESSION_GRACE_SECS: u64 = 10;
/// Upper bound for `sessionGraceSecs`; larger values are treated as one day.
pub(crate) const MAX_SESSION_GRACE_SECS: u64 = 24 * 60 * 60;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct PreflightConfig {
    #[serde(alias = "base_dir")]
    pub launcher_root: Option<String>,
    pub session_grace_secs: u64,
    pub autosave_quiet_period_ms: u64,
    pub java_path: Option<String>,
    pub java_mode: Option<String>,
    pub verify_asset_hashes: bool,
}

impl Default for PreflightConfig {
    fn default() -> Self {
        Self {
            launcher_root: None,
            session_grace_secs: DEFAULT_SESSION_GRACE_SECS,
            autosave_quiet_period_ms: 1000,
            java_path: None,
            java_mode: None,
            verify_asset_hashes: false,
        }
    }
}

impl PreflightConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(raw).map_err(|error| ConfigError::Parse(error.to_string()))
    }

    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|error| ConfigError::Io {
                path: path.display().to_string(),
                reason: error.to_string(),
            })?;
        Self::from_json_str(&raw)
    }

    pub fn session_grace(&self) -> chrono::Duration {
        let secs = self.session_grace_secs.min(MAX_SESSION_GRACE_SECS);
        chrono::Duration::seconds(i64::try_from(secs).unwrap_or(0))
    }

    pub fn autosave_quiet_period(&self) -> Duration {
        Duration::from_millis(self.autosave_quiet_period_ms)
    }

    pub fn launcher_root(&self) -> Option<PathBuf> {
        self.launcher_root
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(PathBuf::from)
    }

    /// Launcher directory layout under `launcherRoot`.
    pub fn layout(&self) -> Result<LauncherDataLayout, ConfigError> {
        self.launcher_root()
            .map(|root| LauncherDataLayout::from_root(&root))
            .ok_or(ConfigError::MissingLauncherRoot)
    }

    /// Global Java override, ignored when the mode asks for automatic selection.
    pub fn java_override(&self) -> Option<&str> {
        if self
            .java_mode
            .as_deref()
            .is_some_and(|mode| mode.trim().eq_ignore_ascii_case("auto"))
        {
            return None;
        }
        self.java_path
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }
}
