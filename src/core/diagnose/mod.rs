mod findings;

pub use findings::{
    AssetIndexIssue, AssetIssue, AssetRef, AssetsDiagnosis, DiagnosisFinding, FindingCategory,
    InstallProfile, IssueKind, JarIssue, LibraryIssue, ProfileIssue, RepairInstruction, Side,
};

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::core::error::DiagnoseError;
use crate::core::instance::{InstanceRecord, RuntimeRequirement};
use crate::core::version_resolver::{VersionDescriptor, VersionStore};

#[async_trait]
pub trait DiagnoseService: Send + Sync {
    async fn diagnose_jar(
        &self,
        version: &VersionDescriptor,
        side: Side,
    ) -> Result<Option<JarIssue>, DiagnoseError>;

    async fn diagnose_libraries(
        &self,
        version: &VersionDescriptor,
    ) -> Result<Vec<LibraryIssue>, DiagnoseError>;

    async fn diagnose_assets(
        &self,
        version: &VersionDescriptor,
    ) -> Result<AssetsDiagnosis, DiagnoseError>;

    async fn diagnose_profile(
        &self,
        version_id: &str,
        side: Side,
        instance_id: &str,
    ) -> Result<Option<ProfileIssue>, DiagnoseError>;
}

pub struct Diagnostician {
    versions: Arc<dyn VersionStore>,
    service: Arc<dyn DiagnoseService>,
    side: Side,
}

impl Diagnostician {
    pub fn new(versions: Arc<dyn VersionStore>, service: Arc<dyn DiagnoseService>) -> Self {
        Self {
            versions,
            service,
            side: Side::Client,
        }
    }

    pub async fn diagnose(&self, instance: &InstanceRecord) -> RepairInstruction {
        let requirement = instance.runtime_requirement();
        let declared_version = requirement.version_id();

        let Some(version) = self.versions.resolve_local_version(&declared_version).await else {
            tracing::debug!(
                instance_id = %instance.id,
                version = %declared_version,
                "declared version is not installed"
            );
            return RepairInstruction {
                instance_id: instance.id.clone(),
                runtime_requirement: requirement,
                declared_version,
                resolved_version: None,
                findings: Vec::new(),
            };
        };

        let profile_check = async {
            if requirement.mod_loader.is_none() {
                return Ok(None);
            }
            self.service
                .diagnose_profile(&version.id, self.side, &instance.id)
                .await
        };

        let (jar, libraries, assets, profile) = futures::join!(
            self.service.diagnose_jar(&version, self.side),
            self.service.diagnose_libraries(&version),
            self.service.diagnose_assets(&version),
            profile_check,
        );

        let mut findings = Vec::new();

        match jar {
            Ok(Some(issue)) => findings.push(DiagnosisFinding::CorruptedOrMissingJar { issue }),
            Ok(None) => {}
            Err(error) => {
                warn_check_failed(&instance.id, "jar", &error);
                findings.push(DiagnosisFinding::CorruptedOrMissingJar {
                    issue: JarIssue {
                        version_id: version.jar.clone(),
                        kind: IssueKind::Corrupted,
                    },
                });
            }
        }

        match libraries {
            Ok(issues) if issues.is_empty() => {}
            Ok(issues) => findings.push(DiagnosisFinding::CorruptedOrMissingLibraries { issues }),
            Err(error) => {
                warn_check_failed(&instance.id, "libraries", &error);
                let issues: Vec<_> = version
                    .libraries
                    .iter()
                    .cloned()
                    .map(|library| LibraryIssue {
                        library,
                        kind: IssueKind::Corrupted,
                    })
                    .collect();
                if !issues.is_empty() {
                    findings.push(DiagnosisFinding::CorruptedOrMissingLibraries { issues });
                }
            }
        }

        match assets {
            Ok(AssetsDiagnosis {
                asset_index,
                assets,
            }) => {
                if let Some(issue) = asset_index {
                    findings.push(DiagnosisFinding::CorruptedOrMissingAssetIndex { issue });
                }
                if !assets.is_empty() {
                    findings.push(DiagnosisFinding::CorruptedOrMissingAssets { issues: assets });
                }
            }
            Err(error) => {
                warn_check_failed(&instance.id, "assets", &error);
                let index_id = version
                    .asset_index
                    .as_ref()
                    .map(|index| index.id.clone())
                    .unwrap_or_else(|| version.minecraft_version.clone());
                findings.push(DiagnosisFinding::CorruptedOrMissingAssetIndex {
                    issue: AssetIndexIssue {
                        index_id,
                        kind: IssueKind::Corrupted,
                    },
                });
            }
        }

        match profile {
            Ok(Some(ProfileIssue::BadInstallProfile { profile })) => {
                findings.push(DiagnosisFinding::BadInstallProfile { profile })
            }
            Ok(Some(ProfileIssue::BadModLoaderInstall { version_id, reason })) => {
                findings.push(DiagnosisFinding::BadModLoaderInstall { version_id, reason })
            }
            Ok(None) => {}
            Err(error) => {
                warn_check_failed(&instance.id, "profile", &error);
                findings.push(DiagnosisFinding::BadModLoaderInstall {
                    version_id: version.id.clone(),
                    reason: error.to_string(),
                });
            }
        }

        tracing::debug!(
            instance_id = %instance.id,
            version = %version.id,
            findings = findings.len(),
            "diagnosis finished"
        );

        RepairInstruction {
            instance_id: instance.id.clone(),
            runtime_requirement: requirement,
            declared_version,
            resolved_version: Some(version),
            findings,
        }
    }
}

fn warn_check_failed(instance_id: &str, check: &str, error: &DiagnoseError) {
    tracing::warn!(
        instance_id,
        check,
        %error,
        "diagnosis check failed, assuming the component is broken"
    );
}

/// Identity of a diagnosis: which instance, needing which components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosisTarget {
    pub instance_id: String,
    pub requirement: RuntimeRequirement,
}

impl DiagnosisTarget {
    pub fn of(instance: &InstanceRecord) -> Self {
        Self {
            instance_id: instance.id.clone(),
            requirement: instance.runtime_requirement(),
        }
    }

    fn matches(&self, instruction: &RepairInstruction) -> bool {
        self.instance_id == instruction.instance_id
            && self.requirement == instruction.runtime_requirement
    }
}

#[derive(Default)]
struct TrackerState {
    selected: Option<DiagnosisTarget>,
    latest: Option<RepairInstruction>,
}

/// Keeps the diagnosis of the selected instance and drops results that
/// finish after the selection moved elsewhere.
#[derive(Default)]
pub struct DiagnosisTracker {
    state: Mutex<TrackerState>,
}

impl DiagnosisTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` when the selection identity changed and a new diagnosis is due.
    pub fn select(&self, instance: &InstanceRecord) -> bool {
        let target = DiagnosisTarget::of(instance);
        let mut state = self.lock();
        if state.selected.as_ref() == Some(&target) {
            return false;
        }
        state.selected = Some(target);
        state.latest = None;
        true
    }

    pub fn clear(&self) {
        let mut state = self.lock();
        state.selected = None;
        state.latest = None;
    }

    /// Stores `instruction` only if it belongs to the current selection.
    pub fn accept(&self, instruction: RepairInstruction) -> bool {
        let mut state = self.lock();
        let current = state
            .selected
            .as_ref()
            .is_some_and(|target| target.matches(&instruction));
        if !current {
            tracing::debug!(
                instance_id = %instruction.instance_id,
                "discarding stale diagnosis"
            );
            return false;
        }
        state.latest = Some(instruction);
        true
    }

    pub fn latest(&self) -> Option<RepairInstruction> {
        self.lock().latest.clone()
    }

    /// Runs a diagnosis for `instance` and keeps it unless superseded meanwhile.
    pub async fn refresh(
        &self,
        diagnostician: &Diagnostician,
        instance: &InstanceRecord,
    ) -> Option<RepairInstruction> {
        let instruction = diagnostician.diagnose(instance).await;
        if self.accept(instruction.clone()) {
            Some(instruction)
        } else {
            None
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TrackerState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
