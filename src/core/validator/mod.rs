mod profile;

use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use sha1::{Digest, Sha1};
use zip::ZipArchive;

use crate::core::diagnose::{
    AssetIndexIssue, AssetIssue, AssetRef, AssetsDiagnosis, DiagnoseService, IssueKind, JarIssue,
    LibraryIssue, ProfileIssue, Side,
};
use crate::core::error::DiagnoseError;
use crate::core::layout::LauncherDataLayout;
use crate::core::version_resolver::{LibraryRef, VersionDescriptor};

/// Diagnose service backed by the files under the launcher root.
#[derive(Debug, Clone)]
pub struct LocalDiagnoseService {
    layout: LauncherDataLayout,
    verify_asset_hashes: bool,
}

impl LocalDiagnoseService {
    pub fn new(layout: LauncherDataLayout, verify_asset_hashes: bool) -> Self {
        Self {
            layout,
            verify_asset_hashes,
        }
    }

    fn jar_path(&self, version: &VersionDescriptor, side: Side) -> Option<PathBuf> {
        match side {
            Side::Client => self.layout.version_jar(&version.jar),
            Side::Server => Some(
                self.layout
                    .version_dir(&version.jar)?
                    .join(format!("{}-server.jar", version.jar)),
            ),
        }
    }
}

#[async_trait]
impl DiagnoseService for LocalDiagnoseService {
    async fn diagnose_jar(
        &self,
        version: &VersionDescriptor,
        side: Side,
    ) -> Result<Option<JarIssue>, DiagnoseError> {
        let Some(path) = self.jar_path(version, side) else {
            tracing::warn!(jar = %version.jar, "version jar name is not a plain file name");
            return Ok(Some(JarIssue {
                version_id: version.jar.clone(),
                kind: IssueKind::Corrupted,
            }));
        };
        let expected = match side {
            Side::Client => version.client_sha1.clone(),
            Side::Server => None,
        };
        let kind = blocking(move || inspect_jar(&path, expected.as_deref())).await?;
        Ok(kind.map(|kind| JarIssue {
            version_id: version.jar.clone(),
            kind,
        }))
    }

    async fn diagnose_libraries(
        &self,
        version: &VersionDescriptor,
    ) -> Result<Vec<LibraryIssue>, DiagnoseError> {
        let layout = self.layout.clone();
        let libraries = version.libraries.clone();
        blocking(move || inspect_libraries(&layout, libraries)).await
    }

    async fn diagnose_assets(
        &self,
        version: &VersionDescriptor,
    ) -> Result<AssetsDiagnosis, DiagnoseError> {
        let Some(index) = version.asset_index.clone() else {
            return Ok(AssetsDiagnosis::default());
        };
        let layout = self.layout.clone();
        let verify_hashes = self.verify_asset_hashes;
        blocking(move || {
            let issue = |kind| AssetsDiagnosis {
                asset_index: Some(AssetIndexIssue {
                    index_id: index.id.clone(),
                    kind,
                }),
                assets: Vec::new(),
            };
            let Some(index_path) = layout.asset_index(&index.id) else {
                return Ok(issue(IssueKind::Corrupted));
            };

            let raw = match fs::read(&index_path) {
                Ok(raw) => raw,
                Err(error) if error.kind() == ErrorKind::NotFound => {
                    return Ok(issue(IssueKind::Missing))
                }
                Err(error) => return Err(io_error(&index_path, error)),
            };
            if let Some(expected) = index.sha1.as_deref() {
                if !sha1_hex(&raw).eq_ignore_ascii_case(expected) {
                    return Ok(issue(IssueKind::Corrupted));
                }
            }
            let Ok(json) = serde_json::from_slice::<Value>(&raw) else {
                return Ok(issue(IssueKind::Corrupted));
            };

            let mut assets = Vec::new();
            for asset in index_objects(&json) {
                if let Some(kind) = inspect_asset(&layout, &asset, verify_hashes)? {
                    assets.push(AssetIssue { asset, kind });
                }
            }
            Ok(AssetsDiagnosis {
                asset_index: None,
                assets,
            })
        })
        .await
    }

    async fn diagnose_profile(
        &self,
        version_id: &str,
        side: Side,
        instance_id: &str,
    ) -> Result<Option<ProfileIssue>, DiagnoseError> {
        let layout = self.layout.clone();
        let version_id = version_id.to_string();
        let result = blocking(move || profile::inspect(&layout, &version_id, side)).await;
        if let Ok(Some(issue)) = &result {
            tracing::debug!(instance_id, ?issue, "install profile is incomplete");
        }
        result
    }
}

async fn blocking<T, F>(job: F) -> Result<T, DiagnoseError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, DiagnoseError> + Send + 'static,
{
    tokio::task::spawn_blocking(job)
        .await
        .map_err(|error| DiagnoseError::Io {
            path: "<blocking pool>".to_string(),
            reason: error.to_string(),
        })?
}

pub(crate) fn io_error(path: &Path, error: io::Error) -> DiagnoseError {
    DiagnoseError::Io {
        path: path.display().to_string(),
        reason: error.to_string(),
    }
}

pub(crate) fn sha1_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha1::digest(bytes))
}

/// SHA-1 of a file, `None` when it does not exist.
pub(crate) fn file_sha1(path: &Path) -> Result<Option<String>, DiagnoseError> {
    let mut file = match fs::File::open(path) {
        Ok(file) => file,
        Err(error) if error.kind() == ErrorKind::NotFound => return Ok(None),
        Err(error) => return Err(io_error(path, error)),
    };
    let mut hasher = Sha1::new();
    io::copy(&mut file, &mut hasher).map_err(|error| io_error(path, error))?;
    Ok(Some(format!("{:x}", hasher.finalize())))
}

fn inspect_jar(path: &Path, expected_sha1: Option<&str>) -> Result<Option<IssueKind>, DiagnoseError> {
    let file = match fs::File::open(path) {
        Ok(file) => file,
        Err(error) if error.kind() == ErrorKind::NotFound => return Ok(Some(IssueKind::Missing)),
        Err(error) => return Err(io_error(path, error)),
    };
    let len = file
        .metadata()
        .map_err(|error| io_error(path, error))?
        .len();
    if len == 0 || ZipArchive::new(file).is_err() {
        return Ok(Some(IssueKind::Corrupted));
    }

    if let Some(expected) = expected_sha1 {
        match file_sha1(path)? {
            Some(actual) if actual.eq_ignore_ascii_case(expected) => {}
            Some(_) => return Ok(Some(IssueKind::Corrupted)),
            None => return Ok(Some(IssueKind::Missing)),
        }
    }
    Ok(None)
}

fn inspect_libraries(
    layout: &LauncherDataLayout,
    libraries: Vec<LibraryRef>,
) -> Result<Vec<LibraryIssue>, DiagnoseError> {
    let mut issues = Vec::new();
    for library in libraries {
        let Some(path) = layout.library(&library.path) else {
            tracing::warn!(path = %library.path, "library path leaves the libraries directory");
            issues.push(LibraryIssue {
                library,
                kind: IssueKind::Corrupted,
            });
            continue;
        };
        let kind = match &library.sha1 {
            Some(expected) => match file_sha1(&path)? {
                None => Some(IssueKind::Missing),
                Some(actual) if !actual.eq_ignore_ascii_case(expected) => {
                    Some(IssueKind::Corrupted)
                }
                Some(_) => None,
            },
            None if !path.is_file() => Some(IssueKind::Missing),
            None => None,
        };
        if let Some(kind) = kind {
            issues.push(LibraryIssue { library, kind });
        }
    }
    Ok(issues)
}

fn index_objects(index: &Value) -> Vec<AssetRef> {
    let Some(objects) = index.get("objects").and_then(Value::as_object) else {
        return Vec::new();
    };
    objects
        .iter()
        .filter_map(|(name, object)| {
            Some(AssetRef {
                name: name.clone(),
                hash: object.get("hash").and_then(Value::as_str)?.to_string(),
                size: object.get("size").and_then(Value::as_u64).unwrap_or_default(),
            })
        })
        .collect()
}

fn inspect_asset(
    layout: &LauncherDataLayout,
    asset: &AssetRef,
    verify_hash: bool,
) -> Result<Option<IssueKind>, DiagnoseError> {
    let Some(path) = layout.asset_object(&asset.hash) else {
        return Ok(Some(IssueKind::Corrupted));
    };
    let metadata = match fs::metadata(&path) {
        Ok(metadata) => metadata,
        Err(error) if error.kind() == ErrorKind::NotFound => return Ok(Some(IssueKind::Missing)),
        Err(error) => return Err(io_error(&path, error)),
    };
    if metadata.len() != asset.size {
        return Ok(Some(IssueKind::Corrupted));
    }
    if verify_hash {
        match file_sha1(&path)? {
            Some(actual) if actual.eq_ignore_ascii_case(&asset.hash) => {}
            Some(_) => return Ok(Some(IssueKind::Corrupted)),
            None => return Ok(Some(IssueKind::Missing)),
        }
    }
    Ok(None)
}
