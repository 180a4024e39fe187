use serde::Serialize;

use crate::core::diagnose::{AssetRef, DiagnosisFinding, RepairInstruction, Side};
use crate::core::install::{ProfileInstallRequest, VersionInstallRequest};
use crate::core::java::JavaRuntimeRecord;
use crate::core::java_resolver::{required_java_major, select_auto_java};
use crate::core::version_resolver::{LibraryRef, VersionDescriptor};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase", tag = "type")]
pub enum RepairOperation {
    InstallVersion {
        request: VersionInstallRequest,
    },
    FetchJar {
        version: VersionDescriptor,
        side: Side,
    },
    FetchLibraries {
        libraries: Vec<LibraryRef>,
        minecraft_version: String,
    },
    FetchAssetsByIndex {
        version: VersionDescriptor,
    },
    FetchAssets {
        assets: Vec<AssetRef>,
        minecraft_version: String,
    },
    InstallProfile {
        request: ProfileInstallRequest,
    },
}

impl RepairOperation {
    pub fn label(&self) -> String {
        match self {
            RepairOperation::InstallVersion { request } => {
                format!("install version {}", request.version_id)
            }
            RepairOperation::FetchJar { version, .. } => format!("fetch jar {}", version.jar),
            RepairOperation::FetchLibraries { libraries, .. } => {
                format!("fetch {} libraries", libraries.len())
            }
            RepairOperation::FetchAssetsByIndex { version } => format!(
                "fetch assets of index {}",
                version
                    .asset_index
                    .as_ref()
                    .map(|index| index.id.as_str())
                    .unwrap_or(version.minecraft_version.as_str())
            ),
            RepairOperation::FetchAssets { assets, .. } => format!("fetch {} assets", assets.len()),
            RepairOperation::InstallProfile { request } => {
                format!("run install profile {}", request.profile.version_id)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepairPlan {
    pub instance_id: String,
    pub operations: Vec<RepairOperation>,
    /// Findings no operation can fix yet, such as a profile that needs Java.
    pub unresolved: Vec<DiagnosisFinding>,
}

impl RepairPlan {
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

pub fn plan(instruction: &RepairInstruction, runtimes: &[JavaRuntimeRecord]) -> RepairPlan {
    let full_install = RepairOperation::InstallVersion {
        request: VersionInstallRequest {
            version_id: instruction.declared_version.clone(),
            requirement: instruction.runtime_requirement.clone(),
        },
    };

    let Some(version) = &instruction.resolved_version else {
        return RepairPlan {
            instance_id: instruction.instance_id.clone(),
            operations: vec![full_install],
            unresolved: Vec::new(),
        };
    };

    let index_driven = instruction
        .findings
        .iter()
        .any(|finding| matches!(finding, DiagnosisFinding::CorruptedOrMissingAssetIndex { .. }));

    let mut operations = Vec::new();
    let mut unresolved = Vec::new();

    for finding in &instruction.findings {
        match finding {
            DiagnosisFinding::MissingVersion { .. }
            | DiagnosisFinding::BadModLoaderInstall { .. } => {
                if !operations.contains(&full_install) {
                    operations.push(full_install.clone());
                }
            }
            DiagnosisFinding::MissingJava { .. } => unresolved.push(finding.clone()),
            DiagnosisFinding::CorruptedOrMissingJar { .. } => {
                operations.push(RepairOperation::FetchJar {
                    version: version.clone(),
                    side: Side::Client,
                })
            }
            DiagnosisFinding::CorruptedOrMissingLibraries { issues } => {
                if !issues.is_empty() {
                    operations.push(RepairOperation::FetchLibraries {
                        libraries: issues.iter().map(|issue| issue.library.clone()).collect(),
                        minecraft_version: version.minecraft_version.clone(),
                    });
                }
            }
            DiagnosisFinding::CorruptedOrMissingAssetIndex { .. } => {
                operations.push(RepairOperation::FetchAssetsByIndex {
                    version: version.clone(),
                })
            }
            DiagnosisFinding::CorruptedOrMissingAssets { issues } => {
                if !index_driven && !issues.is_empty() {
                    operations.push(RepairOperation::FetchAssets {
                        assets: issues.iter().map(|issue| issue.asset.clone()).collect(),
                        minecraft_version: version.minecraft_version.clone(),
                    });
                }
            }
            DiagnosisFinding::BadInstallProfile { profile } => {
                let required_major = required_java_major(
                    &profile.minecraft_version,
                    version.java_major,
                    profile.java_major,
                );
                match select_auto_java(runtimes, required_major) {
                    Some(java) => operations.push(RepairOperation::InstallProfile {
                        request: ProfileInstallRequest {
                            profile: profile.clone(),
                            side: Side::Client,
                            java,
                        },
                    }),
                    None => {
                        tracing::warn!(
                            instance_id = %instruction.instance_id,
                            profile = %profile.version_id,
                            required_major,
                            "install profile needs a java runtime that is not available"
                        );
                        unresolved.push(DiagnosisFinding::MissingJava { required_major });
                    }
                }
            }
        }
    }

    RepairPlan {
        instance_id: instruction.instance_id.clone(),
        operations,
        unresolved,
    }
}
