use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::instance::RuntimeRequirement;
use crate::core::loaders::ModLoaderKind;
use crate::core::version_resolver::{LibraryRef, VersionDescriptor};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Side {
    Client,
    Server,
}

/// Both kinds are re-fetched; the distinction only changes what the user is told.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IssueKind {
    Missing,
    Corrupted,
}

impl Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IssueKind::Missing => write!(f, "missing"),
            IssueKind::Corrupted => write!(f, "corrupted"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JarIssue {
    pub version_id: String,
    pub kind: IssueKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryIssue {
    pub library: LibraryRef,
    pub kind: IssueKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetRef {
    pub name: String,
    pub hash: String,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetIssue {
    pub asset: AssetRef,
    pub kind: IssueKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetIndexIssue {
    pub index_id: String,
    pub kind: IssueKind,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetsDiagnosis {
    pub asset_index: Option<AssetIndexIssue>,
    pub assets: Vec<AssetIssue>,
}

/// A mod-loader install profile whose processors have to be (re)run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallProfile {
    pub version_id: String,
    pub minecraft_version: String,
    pub loader: Option<ModLoaderKind>,
    pub java_major: Option<u32>,
    pub data: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase", tag = "kind")]
pub enum ProfileIssue {
    BadInstallProfile { profile: InstallProfile },
    BadModLoaderInstall { version_id: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase", tag = "type")]
pub enum DiagnosisFinding {
    MissingVersion { version_id: String },
    MissingJava { required_major: u32 },
    BadInstallProfile { profile: InstallProfile },
    CorruptedOrMissingJar { issue: JarIssue },
    CorruptedOrMissingLibraries { issues: Vec<LibraryIssue> },
    CorruptedOrMissingAssets { issues: Vec<AssetIssue> },
    CorruptedOrMissingAssetIndex { issue: AssetIndexIssue },
    BadModLoaderInstall { version_id: String, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FindingCategory {
    Version,
    Java,
    InstallProfile,
    Jar,
    Libraries,
    Assets,
    AssetIndex,
    ModLoader,
}

impl DiagnosisFinding {
    pub fn category(&self) -> FindingCategory {
        match self {
            DiagnosisFinding::MissingVersion { .. } => FindingCategory::Version,
            DiagnosisFinding::MissingJava { .. } => FindingCategory::Java,
            DiagnosisFinding::BadInstallProfile { .. } => FindingCategory::InstallProfile,
            DiagnosisFinding::CorruptedOrMissingJar { .. } => FindingCategory::Jar,
            DiagnosisFinding::CorruptedOrMissingLibraries { .. } => FindingCategory::Libraries,
            DiagnosisFinding::CorruptedOrMissingAssets { .. } => FindingCategory::Assets,
            DiagnosisFinding::CorruptedOrMissingAssetIndex { .. } => FindingCategory::AssetIndex,
            DiagnosisFinding::BadModLoaderInstall { .. } => FindingCategory::ModLoader,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            DiagnosisFinding::MissingVersion { version_id } => {
                format!("Version {version_id} is not installed")
            }
            DiagnosisFinding::MissingJava { required_major } => {
                format!("Java {required_major} is required but no compatible runtime was found")
            }
            DiagnosisFinding::BadInstallProfile { profile } => format!(
                "The install profile of {} has not finished processing",
                profile.version_id
            ),
            DiagnosisFinding::CorruptedOrMissingJar { issue } => {
                format!("The game jar of {} is {}", issue.version_id, issue.kind)
            }
            DiagnosisFinding::CorruptedOrMissingLibraries { issues } => {
                let (missing, corrupted) = count_kinds(issues.iter().map(|i| i.kind));
                format!("{missing} libraries missing, {corrupted} corrupted")
            }
            DiagnosisFinding::CorruptedOrMissingAssets { issues } => {
                let (missing, corrupted) = count_kinds(issues.iter().map(|i| i.kind));
                format!("{missing} assets missing, {corrupted} corrupted")
            }
            DiagnosisFinding::CorruptedOrMissingAssetIndex { issue } => {
                format!("Asset index {} is {}", issue.index_id, issue.kind)
            }
            DiagnosisFinding::BadModLoaderInstall { version_id, reason } => {
                format!("Mod loader install {version_id} is broken: {reason}")
            }
        }
    }
}

fn count_kinds(kinds: impl Iterator<Item = IssueKind>) -> (usize, usize) {
    kinds.fold((0, 0), |(missing, corrupted), kind| match kind {
        IssueKind::Missing => (missing + 1, corrupted),
        IssueKind::Corrupted => (missing, corrupted + 1),
    })
}

/// Aggregated findings of one diagnosis pass for one instance.
///
/// `resolved_version` absent means the declared version was never installed,
/// which is repaired by a full install rather than targeted fetches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepairInstruction {
    pub instance_id: String,
    pub runtime_requirement: RuntimeRequirement,
    pub declared_version: String,
    pub resolved_version: Option<VersionDescriptor>,
    pub findings: Vec<DiagnosisFinding>,
}

impl RepairInstruction {
    pub fn resolved_version_id(&self) -> Option<&str> {
        self.resolved_version.as_ref().map(|v| v.id.as_str())
    }

    pub fn is_ready(&self) -> bool {
        self.resolved_version.is_some() && self.findings.is_empty()
    }

    /// Findings as shown to the user, including the implicit missing version.
    pub fn user_findings(&self) -> Vec<DiagnosisFinding> {
        if self.resolved_version.is_none() {
            return vec![DiagnosisFinding::MissingVersion {
                version_id: self.declared_version.clone(),
            }];
        }
        self.findings.clone()
    }

    pub fn categories(&self) -> Vec<FindingCategory> {
        let mut categories: Vec<_> = self.findings.iter().map(|f| f.category()).collect();
        categories.sort();
        categories.dedup();
        categories
    }
}
