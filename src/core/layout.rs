use std::fs;
use std::path::{Path, PathBuf};

pub(crate) const CANONICAL_LAUNCHER_DIRS: [&str; 7] = [
    "runtime",
    "versions",
    "libraries",
    "assets",
    "assets/indexes",
    "assets/objects",
    "instances",
];

/// A name taken from a manifest or record, accepted only if it stays inside its directory.
fn segment(raw: &str) -> Option<&str> {
    let plain = !raw.is_empty()
        && raw != "."
        && raw != ".."
        && !raw.contains(['/', '\\', ':', '\0']);
    plain.then_some(raw)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LauncherDataLayout {
    pub root: PathBuf,
    pub runtime: PathBuf,
    pub versions: PathBuf,
    pub libraries: PathBuf,
    pub assets: PathBuf,
    pub instances: PathBuf,
}

impl LauncherDataLayout {
    pub fn from_root(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            runtime: root.join("runtime"),
            versions: root.join("versions"),
            libraries: root.join("libraries"),
            assets: root.join("assets"),
            instances: root.join("instances"),
        }
    }

    pub fn ensure(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.root)?;
        for dir in CANONICAL_LAUNCHER_DIRS {
            fs::create_dir_all(self.root.join(dir))?;
        }
        Ok(())
    }

    /// `None` when `version_id` is not a single plain path segment.
    pub fn version_dir(&self, version_id: &str) -> Option<PathBuf> {
        Some(self.versions.join(segment(version_id)?))
    }

    pub fn version_json(&self, version_id: &str) -> Option<PathBuf> {
        Some(self.version_dir(version_id)?.join(format!("{version_id}.json")))
    }

    pub fn version_jar(&self, version_id: &str) -> Option<PathBuf> {
        Some(self.version_dir(version_id)?.join(format!("{version_id}.jar")))
    }

    pub fn install_profile(&self, version_id: &str) -> Option<PathBuf> {
        Some(self.version_dir(version_id)?.join("install_profile.json"))
    }

    /// `relative` uses forward slashes, as written in version manifests.
    /// Absolute paths and `..` are rejected.
    pub fn library(&self, relative: &str) -> Option<PathBuf> {
        relative
            .split('/')
            .try_fold(self.libraries.clone(), |path, part| Some(path.join(segment(part)?)))
    }

    pub fn asset_index(&self, index_id: &str) -> Option<PathBuf> {
        Some(self.assets.join("indexes").join(format!("{}.json", segment(index_id)?)))
    }

    pub fn asset_object(&self, hash: &str) -> Option<PathBuf> {
        let hash = segment(hash)?;
        let prefix = hash.get(..2).unwrap_or(hash);
        Some(self.assets.join("objects").join(prefix).join(hash))
    }

    pub fn instance_dir(&self, instance_id: &str) -> Option<PathBuf> {
        Some(self.instances.join(segment(instance_id)?))
    }

    pub fn instance_json(&self, instance_id: &str) -> Option<PathBuf> {
        Some(self.instance_dir(instance_id)?.join("instance.json"))
    }

    pub fn embedded_java(&self, folder: &str, bin_name: &str) -> PathBuf {
        self.runtime.join(folder).join("bin").join(bin_name)
    }
}
