use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One runtime discovered on the host. Read-only snapshot from the scanner.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JavaRuntimeRecord {
    pub path: String,
    pub major_version: u32,
    pub version: String,
    pub valid: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CompatibilityVerdict {
    Matched,
    Recommended,
    Incompatible,
    Missing,
}

impl CompatibilityVerdict {
    pub fn is_launch_eligible(&self) -> bool {
        matches!(
            self,
            CompatibilityVerdict::Matched | CompatibilityVerdict::Recommended
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedJava {
    pub instance_id: String,
    pub required_major: u32,
    pub requested_path: Option<String>,
    pub resolved: Option<JavaRuntimeRecord>,
    pub verdict: CompatibilityVerdict,
    pub auto_pick: Option<JavaRuntimeRecord>,
    pub final_path: Option<String>,
}

impl ResolvedJava {
    /// The path a launch may use; `None` whenever the verdict blocks launch.
    pub fn launch_path(&self) -> Option<&str> {
        if self.verdict.is_launch_eligible() {
            self.final_path.as_deref()
        } else {
            None
        }
    }
}

#[async_trait]
pub trait JavaScanner: Send + Sync {
    async fn all_runtimes(&self) -> Vec<JavaRuntimeRecord>;

    async fn validate_path(&self, path: &str) -> Option<JavaRuntimeRecord>;
}

#[cfg(test)]
pub(crate) fn runtime(path: &str, major: u32, version: &str) -> JavaRuntimeRecord {
    JavaRuntimeRecord {
        path: path.to_string(),
        major_version: major,
        version: version.to_string(),
        valid: true,
    }
}
