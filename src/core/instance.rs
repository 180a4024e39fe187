use serde::{Deserialize, Serialize};

use crate::core::loaders::{profile_id_for_loader, ModLoaderKind};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InstanceRecord {
    pub id: String,
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub loader_name: Option<String>,
    #[serde(default)]
    pub loader_version: Option<String>,
    #[serde(default)]
    pub java_mode: Option<String>,
    #[serde(default)]
    pub java_path: Option<String>,
    #[serde(default)]
    pub game_dir: Option<String>,
    #[serde(default)]
    pub min_memory_mb: Option<u32>,
    #[serde(default)]
    pub max_memory_mb: Option<u32>,
    #[serde(default)]
    pub jvm_args: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "component")]
pub enum RuntimeComponent {
    Minecraft { id: String },
    ModLoader { kind: ModLoaderKind, id: String },
}

/// The components an instance needs installed; fixed once read from the record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeRequirement {
    pub minecraft: String,
    pub mod_loader: Option<ModLoaderRequirement>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModLoaderRequirement {
    pub kind: ModLoaderKind,
    pub version: String,
}

impl RuntimeRequirement {
    pub fn components(&self) -> Vec<RuntimeComponent> {
        let mut components = vec![RuntimeComponent::Minecraft {
            id: self.minecraft.clone(),
        }];
        if let Some(loader) = &self.mod_loader {
            components.push(RuntimeComponent::ModLoader {
                kind: loader.kind,
                id: loader.version.clone(),
            });
        }
        components
    }

    /// Version id the launcher stores for this combination.
    pub fn version_id(&self) -> String {
        match &self.mod_loader {
            Some(loader) => profile_id_for_loader(loader.kind, &self.minecraft, &loader.version),
            None => self.minecraft.clone(),
        }
    }
}

impl InstanceRecord {
    pub fn runtime_requirement(&self) -> RuntimeRequirement {
        let loader = self
            .loader_name
            .as_deref()
            .and_then(|name| match ModLoaderKind::parse_optional(name) {
                Ok(kind) => kind,
                Err(error) => {
                    tracing::warn!(instance_id = %self.id, %error, "ignoring unknown mod loader");
                    None
                }
            });

        let mod_loader = loader.and_then(|kind| {
            self.loader_version
                .as_deref()
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(|version| ModLoaderRequirement {
                    kind,
                    version: version.to_string(),
                })
        });

        RuntimeRequirement {
            minecraft: self.version.trim().to_string(),
            mod_loader,
        }
    }

    pub fn declared_version_id(&self) -> String {
        self.runtime_requirement().version_id()
    }

    /// Per-instance Java override; `javaMode: "auto"` disables it.
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

#[cfg(test)]
pub(crate) fn sample_instance(id: &str, version: &str) -> InstanceRecord {
    InstanceRecord {
        id: id.to_string(),
        name: format!("Instance {id}"),
        version: version.to_string(),
        loader_name: None,
        loader_version: None,
        java_mode: None,
        java_path: None,
        game_dir: None,
        min_memory_mb: None,
        max_memory_mb: None,
        jvm_args: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vanilla_instance_requires_only_minecraft() {
        let instance = sample_instance("a", "1.20.1");
        let requirement = instance.runtime_requirement();
        assert_eq!(requirement.mod_loader, None);
        assert_eq!(requirement.version_id(), "1.20.1");
        assert_eq!(requirement.components().len(), 1);
    }

    #[test]
    fn loader_instance_declares_profile_version() {
        let mut instance = sample_instance("a", "1.20.1");
        instance.loader_name = Some("Forge".into());
        instance.loader_version = Some("47.2.0".into());
        let requirement = instance.runtime_requirement();
        assert_eq!(
            requirement.mod_loader,
            Some(ModLoaderRequirement {
                kind: ModLoaderKind::Forge,
                version: "47.2.0".into()
            })
        );
        assert_eq!(instance.declared_version_id(), "1.20.1-forge-47.2.0");
    }

    #[test]
    fn unknown_loader_degrades_to_vanilla() {
        let mut instance = sample_instance("a", "1.20.1");
        instance.loader_name = Some("rift".into());
        instance.loader_version = Some("1.0".into());
        assert_eq!(instance.declared_version_id(), "1.20.1");
    }

    #[test]
    fn java_override_respects_auto_mode() {
        let mut instance = sample_instance("a", "1.20.1");
        instance.java_path = Some(" /usr/lib/jvm/17/bin/java ".into());
        assert_eq!(instance.java_override(), Some("/usr/lib/jvm/17/bin/java"));
        instance.java_mode = Some("auto".into());
        assert_eq!(instance.java_override(), None);
    }

    #[test]
    fn deserializes_minimal_camel_case_record() {
        let record: InstanceRecord = serde_json::from_str(
            r#"{"id":"x","name":"X","version":"1.16.5","loaderName":"fabric","loaderVersion":"0.14.0"}"#,
        )
        .expect("record parses");
        assert_eq!(record.declared_version_id(), "fabric-loader-0.14.0-1.16.5");
        assert!(record.jvm_args.is_empty());
    }
}
