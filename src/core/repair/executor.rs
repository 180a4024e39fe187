use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use futures::future::join_all;
use serde::Serialize;

use super::planner::{RepairOperation, RepairPlan};
use crate::core::diagnose::DiagnosisFinding;
use crate::core::error::InstallError;
use crate::core::install::InstallService;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepairFailure {
    pub operation: String,
    pub error: InstallError,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepairReport {
    pub instance_id: String,
    pub applied: Vec<String>,
    pub failures: Vec<RepairFailure>,
    pub unresolved: Vec<DiagnosisFinding>,
}

impl RepairReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && self.unresolved.is_empty()
    }

    pub fn user_message(&self) -> String {
        if self.applied.is_empty() && self.failures.is_empty() && self.unresolved.is_empty() {
            return "Nothing needed repairing.".to_string();
        }
        let mut lines = vec![format!("Repair finished: {} step(s) applied", self.applied.len())];
        for failure in &self.failures {
            lines.push(format!("✘ {}: {}", failure.operation, failure.error));
        }
        for finding in &self.unresolved {
            lines.push(format!("✘ {}", finding.describe()));
        }
        lines.join("\n")
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase", tag = "status", content = "report")]
pub enum RepairRun {
    /// A repair for the same instance was already running; nothing was started.
    Skipped,
    Completed(RepairReport),
}

/// Runs repair plans against the installer, at most one per instance at a time.
pub struct RepairExecutor {
    installer: Arc<dyn InstallService>,
    in_flight: Mutex<HashSet<String>>,
}

struct InFlight<'a> {
    set: &'a Mutex<HashSet<String>>,
    instance_id: String,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.set
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(&self.instance_id);
    }
}

impl RepairExecutor {
    pub fn new(installer: Arc<dyn InstallService>) -> Self {
        Self {
            installer,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub fn is_repairing(&self, instance_id: &str) -> bool {
        self.in_flight_set().contains(instance_id)
    }

    fn in_flight_set(&self) -> MutexGuard<'_, HashSet<String>> {
        self.in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn enter(&self, instance_id: &str) -> Option<InFlight<'_>> {
        let mut set = self.in_flight_set();
        if !set.insert(instance_id.to_string()) {
            return None;
        }
        Some(InFlight {
            set: &self.in_flight,
            instance_id: instance_id.to_string(),
        })
    }

    /// Every operation is attempted; one failing does not cancel the others.
    pub async fn execute(&self, plan: &RepairPlan) -> RepairRun {
        let Some(_guard) = self.enter(&plan.instance_id) else {
            tracing::debug!(instance_id = %plan.instance_id, "repair already in progress");
            return RepairRun::Skipped;
        };

        tracing::info!(
            instance_id = %plan.instance_id,
            operations = plan.operations.len(),
            unresolved = plan.unresolved.len(),
            "starting repair"
        );

        let results = join_all(
            plan.operations
                .iter()
                .map(|operation| async move { (operation.label(), self.apply(operation).await) }),
        )
        .await;

        let mut report = RepairReport {
            instance_id: plan.instance_id.clone(),
            unresolved: plan.unresolved.clone(),
            ..RepairReport::default()
        };
        for (label, result) in results {
            match result {
                Ok(()) => report.applied.push(label),
                Err(error) => {
                    tracing::warn!(
                        instance_id = %plan.instance_id,
                        operation = %label,
                        %error,
                        "repair operation failed"
                    );
                    report.failures.push(RepairFailure {
                        operation: label,
                        error,
                    });
                }
            }
        }

        tracing::info!(
            instance_id = %plan.instance_id,
            applied = report.applied.len(),
            failed = report.failures.len(),
            "repair finished"
        );
        RepairRun::Completed(report)
    }

    async fn apply(&self, operation: &RepairOperation) -> Result<(), InstallError> {
        match operation {
            RepairOperation::InstallVersion { request } => {
                self.installer.install_version(request).await
            }
            RepairOperation::FetchJar { version, side } => {
                self.installer.install_jar(version, *side).await
            }
            RepairOperation::FetchLibraries {
                libraries,
                minecraft_version,
            } => {
                self.installer
                    .install_libraries(libraries, minecraft_version)
                    .await
            }
            RepairOperation::FetchAssetsByIndex { version } => {
                self.installer.install_assets_by_index(version).await
            }
            RepairOperation::FetchAssets {
                assets,
                minecraft_version,
            } => self.installer.install_assets(assets, minecraft_version).await,
            RepairOperation::InstallProfile { request } => {
                self.installer.install_by_profile(request).await
            }
        }
    }
}
