use serde::{Deserialize, Serialize};

use crate::core::auth::{Account, LaunchAuth};
use crate::core::error::InvariantViolation;
use crate::core::instance::InstanceRecord;
use crate::core::java::ResolvedJava;
use crate::core::version_resolver::VersionDescriptor;

/// Everything the process launcher needs to start one game process.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LaunchOptions {
    pub instance_id: String,
    pub version_id: String,
    pub main_class: Option<String>,
    pub java_path: String,
    #[serde(default)]
    pub required_java_major: u32,
    #[serde(default)]
    pub resolved_java_major: u32,
    pub game_dir: Option<String>,
    pub min_memory_mb: Option<u32>,
    pub max_memory_mb: Option<u32>,
    pub jvm_args: Vec<String>,
    pub loader: Option<String>,
    pub auth: LaunchAuth,
}

impl LaunchOptions {
    /// Assembles options from the outcome of every earlier check.
    ///
    /// Each input is guaranteed by a previous stage, so a missing one is an
    /// invariant violation rather than a user error.
    pub fn assemble(
        instance: Option<&InstanceRecord>,
        account: Option<&Account>,
        java: Option<&ResolvedJava>,
        version: Option<&VersionDescriptor>,
    ) -> Result<Self, InvariantViolation> {
        let instance = instance.ok_or(InvariantViolation::NoInstance)?;
        let account = account.ok_or(InvariantViolation::NoAccount)?;
        let java = java.ok_or(InvariantViolation::NoJavaPath)?;
        let java_path = java.launch_path().ok_or(InvariantViolation::NoJavaPath)?;

        let requirement = instance.runtime_requirement();
        Ok(Self {
            instance_id: instance.id.clone(),
            version_id: version
                .map(|v| v.id.clone())
                .unwrap_or_else(|| requirement.version_id()),
            main_class: version.and_then(|v| v.main_class.clone()),
            java_path: java_path.to_string(),
            required_java_major: java.required_major,
            resolved_java_major: java
                .resolved
                .as_ref()
                .map(|runtime| runtime.major_version)
                .unwrap_or_default(),
            game_dir: instance.game_dir.clone(),
            min_memory_mb: instance.min_memory_mb,
            max_memory_mb: instance.max_memory_mb,
            jvm_args: instance.jvm_args.clone(),
            loader: requirement
                .mod_loader
                .as_ref()
                .map(|loader| loader.kind.to_string()),
            auth: account.launch_auth(),
        })
    }

    /// Heap flags first, then the instance's own arguments.
    pub fn java_args(&self) -> Vec<String> {
        let mut args = Vec::with_capacity(self.jvm_args.len() + 2);
        if let Some(min) = self.min_memory_mb {
            args.push(format!("-Xms{min}M"));
        }
        if let Some(max) = self.max_memory_mb {
            args.push(format!("-Xmx{max}M"));
        }
        args.extend(self.jvm_args.iter().cloned());
        args
    }
}
