use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::core::error::LaunchError;
use crate::core::launcher::LaunchOptions;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessHandle {
    pub pid: u32,
    pub instance_id: String,
    pub launched_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameExit {
    pub instance_id: String,
    pub pid: u32,
    pub exit_code: Option<i32>,
    pub signal: Option<i32>,
    pub crash_report_path: Option<String>,
    pub crash_log: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExitKind {
    Clean,
    Killed,
    Crashed,
}

impl GameExit {
    pub fn classify(&self) -> ExitKind {
        if self.signal.is_some() {
            return ExitKind::Killed;
        }
        let crash_evidence = self.crash_report_path.is_some()
            || self
                .crash_log
                .as_deref()
                .is_some_and(|log| !log.trim().is_empty());
        if crash_evidence || self.exit_code.is_some_and(|code| code != 0) {
            ExitKind::Crashed
        } else {
            ExitKind::Clean
        }
    }
}

/// Starts and stops game processes. The game itself is opaque beyond its exit status.
#[async_trait]
pub trait ProcessLauncher: Send + Sync {
    async fn launch(&self, options: &LaunchOptions) -> Result<ProcessHandle, LaunchError>;

    async fn kill(&self, handle: &ProcessHandle) -> Result<(), LaunchError>;

    fn exits(&self) -> broadcast::Receiver<GameExit>;
}
