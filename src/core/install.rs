use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::diagnose::{AssetRef, InstallProfile, Side};
use crate::core::error::InstallError;
use crate::core::instance::RuntimeRequirement;
use crate::core::java::JavaRuntimeRecord;
use crate::core::version_resolver::{LibraryRef, VersionDescriptor};

/// Full install of a version that is not present locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionInstallRequest {
    pub version_id: String,
    pub requirement: RuntimeRequirement,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileInstallRequest {
    pub profile: InstallProfile,
    pub side: Side,
    pub java: JavaRuntimeRecord,
}

/// The external installer. Implementations own downloading and verification.
#[async_trait]
pub trait InstallService: Send + Sync {
    async fn install_version(&self, request: &VersionInstallRequest) -> Result<(), InstallError>;

    async fn install_jar(&self, version: &VersionDescriptor, side: Side)
        -> Result<(), InstallError>;

    async fn install_libraries(
        &self,
        libraries: &[LibraryRef],
        minecraft_version: &str,
    ) -> Result<(), InstallError>;

    async fn install_assets_by_index(&self, version: &VersionDescriptor)
        -> Result<(), InstallError>;

    async fn install_assets(
        &self,
        assets: &[AssetRef],
        minecraft_version: &str,
    ) -> Result<(), InstallError>;

    async fn install_by_profile(&self, request: &ProfileInstallRequest)
        -> Result<(), InstallError>;
}
