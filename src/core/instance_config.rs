use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;

use crate::core::error::StoreError;
use crate::core::instance::InstanceRecord;
use crate::core::layout::LauncherDataLayout;

#[async_trait]
pub trait InstanceStore: Send + Sync {
    async fn load(&self, instance_id: &str) -> Result<InstanceRecord, StoreError>;

    async fn save(&self, record: &InstanceRecord) -> Result<(), StoreError>;

    async fn list(&self) -> Result<Vec<InstanceRecord>, StoreError>;
}

/// Stores each instance as `instances/<id>/instance.json`.
#[derive(Debug, Clone)]
pub struct FsInstanceStore {
    layout: LauncherDataLayout,
}

impl FsInstanceStore {
    pub fn new(layout: LauncherDataLayout) -> Self {
        Self { layout }
    }

    fn paths(&self, instance_id: &str) -> Result<(PathBuf, PathBuf), StoreError> {
        self.layout
            .instance_dir(instance_id)
            .zip(self.layout.instance_json(instance_id))
            .ok_or_else(|| StoreError::Invalid {
                path: instance_id.to_string(),
                reason: "instance id is not a plain directory name".to_string(),
            })
    }
}

pub(crate) fn instance_game_dir(instance_root: &Path) -> PathBuf {
    let canonical = instance_root.join("minecraft");
    if canonical.exists() {
        return canonical;
    }

    let legacy = instance_root.join(".minecraft");
    if legacy.exists() {
        return legacy;
    }

    canonical
}

fn text(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Older records used snake_case keys and a nested `java` object.
fn normalize_legacy_keys(raw: &mut Value, instance_id: &str) {
    let legacy = raw.clone();
    let Some(object) = raw.as_object_mut() else {
        return;
    };

    let mut fill = |key: &str, value: Option<String>| {
        let present = object
            .get(key)
            .is_some_and(|current| !current.is_null());
        if let (false, Some(value)) = (present, value) {
            object.insert(key.to_string(), Value::String(value));
        }
    };

    fill("id", Some(instance_id.to_string()));
    fill("name", Some(instance_id.to_string()));
    fill("version", text(&legacy, "minecraft_version"));
    fill(
        "loaderName",
        text(&legacy, "modloader").or_else(|| text(&legacy, "loader")),
    );
    fill(
        "loaderVersion",
        text(&legacy, "modloader_version").or_else(|| text(&legacy, "loader_version")),
    );
    fill("gameDir", text(&legacy, "game_dir"));
    if let Some(java) = legacy.get("java") {
        fill("javaMode", text(java, "mode"));
        fill("javaPath", text(java, "path"));
    }
}

fn io_error(path: &Path, error: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.display().to_string(),
        reason: error.to_string(),
    }
}

#[async_trait]
impl InstanceStore for FsInstanceStore {
    async fn load(&self, instance_id: &str) -> Result<InstanceRecord, StoreError> {
        let (dir, path) = self.paths(instance_id)?;
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(error) if error.kind() == ErrorKind::NotFound => {
                return Err(StoreError::NotFound(instance_id.to_string()))
            }
            Err(error) => return Err(io_error(&path, error)),
        };

        let invalid = |reason: String| StoreError::Invalid {
            path: path.display().to_string(),
            reason,
        };
        let mut value: Value =
            serde_json::from_str(&raw).map_err(|error| invalid(error.to_string()))?;
        normalize_legacy_keys(&mut value, instance_id);
        let mut record: InstanceRecord =
            serde_json::from_value(value).map_err(|error| invalid(error.to_string()))?;

        if record.game_dir.is_none() {
            let game_dir = instance_game_dir(&dir);
            record.game_dir = Some(game_dir.display().to_string());
        }
        Ok(record)
    }

    async fn save(&self, record: &InstanceRecord) -> Result<(), StoreError> {
        let (dir, path) = self.paths(&record.id)?;
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|error| io_error(&dir, error))?;

        let serialized = serde_json::to_vec_pretty(record).map_err(|error| StoreError::Invalid {
            path: path.display().to_string(),
            reason: error.to_string(),
        })?;

        // Write-then-rename so a crash never leaves a truncated record.
        let staging = path.with_extension("json.tmp");
        tokio::fs::write(&staging, serialized)
            .await
            .map_err(|error| io_error(&staging, error))?;
        tokio::fs::rename(&staging, &path)
            .await
            .map_err(|error| io_error(&path, error))?;
        tracing::debug!(instance_id = %record.id, "instance saved");
        Ok(())
    }

    async fn list(&self) -> Result<Vec<InstanceRecord>, StoreError> {
        let root = &self.layout.instances;
        let mut entries = match tokio::fs::read_dir(root).await {
            Ok(entries) => entries,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(error) => return Err(io_error(root, error)),
        };

        let mut records = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|error| io_error(root, error))?
        {
            let Some(id) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            match self.load(&id).await {
                Ok(record) => records.push(record),
                Err(StoreError::NotFound(_)) => {}
                Err(error) => tracing::warn!(instance_id = %id, %error, "skipping unreadable instance"),
            }
        }
        records.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::instance::sample_instance;
    use pretty_assertions::assert_eq;

    fn store() -> (tempfile::TempDir, FsInstanceStore) {
        let dir = tempfile::tempdir().expect("tempdir");
        let layout = LauncherDataLayout::from_root(dir.path());
        layout.ensure().expect("layout");
        (dir, FsInstanceStore::new(layout))
    }

    #[tokio::test]
    async fn save_then_load_fills_game_dir() {
        let (_dir, store) = store();
        let mut record = sample_instance("alpha", "1.20.1");
        record.jvm_args = vec!["-XX:+UseG1GC".into()];
        store.save(&record).await.expect("save");

        let loaded = store.load("alpha").await.expect("load");
        assert_eq!(loaded.jvm_args, record.jvm_args);
        let game_dir = loaded.game_dir.expect("game dir");
        assert!(game_dir.ends_with("minecraft"));
    }

    #[tokio::test]
    async fn missing_instance_is_not_found() {
        let (_dir, store) = store();
        assert_eq!(
            store.load("nope").await,
            Err(StoreError::NotFound("nope".into()))
        );
    }

    #[tokio::test]
    async fn ids_with_separators_are_rejected() {
        let (dir, store) = store();
        let record = sample_instance("../escaped", "1.20.1");
        assert!(matches!(
            store.save(&record).await,
            Err(StoreError::Invalid { .. })
        ));
        assert!(!dir.path().join("escaped").exists());
        assert!(matches!(
            store.load("../../etc").await,
            Err(StoreError::Invalid { .. })
        ));
    }

    #[tokio::test]
    async fn reads_legacy_snake_case_record() {
        let (_dir, store) = store();
        let path = store.layout.instance_json("old").expect("path");
        std::fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        std::fs::write(
            &path,
            r#"{"minecraft_version":"1.19.2","modloader":"fabric","modloader_version":"0.14.21","java":{"mode":"manual","path":"/jdk17/bin/java"}}"#,
        )
        .expect("write");

        let record = store.load("old").await.expect("load");
        assert_eq!(record.id, "old");
        assert_eq!(record.version, "1.19.2");
        assert_eq!(record.loader_name.as_deref(), Some("fabric"));
        assert_eq!(record.java_override(), Some("/jdk17/bin/java"));
    }

    #[tokio::test]
    async fn list_skips_broken_records() {
        let (_dir, store) = store();
        store.save(&sample_instance("b", "1.20.1")).await.expect("save");
        store.save(&sample_instance("a", "1.16.5")).await.expect("save");
        let broken = store.layout.instance_json("c").expect("path");
        std::fs::create_dir_all(broken.parent().expect("parent")).expect("mkdir");
        std::fs::write(&broken, "{ not json").expect("write");

        let ids: Vec<_> = store
            .list()
            .await
            .expect("list")
            .into_iter()
            .map(|record| record.id)
            .collect();
        assert_eq!(ids, vec!["a".to_string(), "b".to_string()]);
    }
}
