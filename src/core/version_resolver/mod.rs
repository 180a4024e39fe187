use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::java_resolver::extract_java_major;
use crate::core::layout::LauncherDataLayout;

const MAX_INHERITANCE_DEPTH: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryRef {
    pub name: String,
    pub path: String,
    pub sha1: Option<String>,
    pub url: Option<String>,
    pub size: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetIndexRef {
    pub id: String,
    pub sha1: Option<String>,
    pub url: Option<String>,
}

/// A locally installed version, with its inheritance chain already merged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionDescriptor {
    pub id: String,
    pub minecraft_version: String,
    pub inherits_from: Option<String>,
    pub jar: String,
    pub main_class: Option<String>,
    pub client_sha1: Option<String>,
    pub java_major: Option<u32>,
    pub asset_index: Option<AssetIndexRef>,
    pub libraries: Vec<LibraryRef>,
}

#[async_trait]
pub trait VersionStore: Send + Sync {
    async fn resolve_local_version(&self, version_id: &str) -> Option<VersionDescriptor>;
}

pub struct FsVersionStore {
    layout: LauncherDataLayout,
}

impl FsVersionStore {
    pub fn new(layout: LauncherDataLayout) -> Self {
        Self { layout }
    }

    async fn read_version_json(&self, version_id: &str) -> Option<Value> {
        let Some(path) = self.layout.version_json(version_id) else {
            tracing::warn!(version_id, "version id is not a plain directory name");
            return None;
        };
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return None,
            Err(error) => {
                tracing::warn!(path = %path.display(), %error, "could not read version json");
                return None;
            }
        };
        match serde_json::from_str::<Value>(&raw) {
            Ok(value) if value.is_object() => Some(value),
            Ok(_) => {
                tracing::warn!(path = %path.display(), "version json is not an object");
                None
            }
            Err(error) => {
                tracing::warn!(path = %path.display(), %error, "unparsable version json");
                None
            }
        }
    }
}

#[async_trait]
impl VersionStore for FsVersionStore {
    async fn resolve_local_version(&self, version_id: &str) -> Option<VersionDescriptor> {
        let mut chain = Vec::new();
        let mut next = Some(version_id.to_string());

        while let Some(id) = next.take() {
            if chain.len() >= MAX_INHERITANCE_DEPTH {
                tracing::warn!(version_id, "inheritance chain too deep");
                return None;
            }
            let json = self.read_version_json(&id).await?;
            next = json
                .get("inheritsFrom")
                .and_then(Value::as_str)
                .map(str::to_string);
            chain.push((id, json));
        }

        Some(merge_chain(&chain))
    }
}

/// `chain[0]` is the requested version, the last entry its root ancestor.
fn merge_chain(chain: &[(String, Value)]) -> VersionDescriptor {
    let (id, head) = &chain[0];
    let (root_id, _) = &chain[chain.len() - 1];

    let main_class = first_in_chain(chain, |v| {
        v.get("mainClass").and_then(Value::as_str).map(str::to_string)
    });
    let java_major = first_in_chain(chain, extract_java_major);
    let jar = head
        .get("jar")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| root_id.clone());
    let client_sha1 = first_in_chain(chain, |v| {
        v.get("downloads")
            .and_then(|d| d.get("client"))
            .and_then(|c| c.get("sha1"))
            .and_then(Value::as_str)
            .map(str::to_string)
    });
    let asset_index = first_in_chain(chain, |v| v.get("assetIndex").cloned()).and_then(|index| {
        let id = index.get("id").and_then(Value::as_str)?.to_string();
        Some(AssetIndexRef {
            id,
            sha1: index.get("sha1").and_then(Value::as_str).map(str::to_string),
            url: index.get("url").and_then(Value::as_str).map(str::to_string),
        })
    });

    let mut libraries: Vec<LibraryRef> = Vec::new();
    for (_, json) in chain {
        for library in json
            .get("libraries")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(parse_library)
        {
            if !libraries.iter().any(|known| known.path == library.path) {
                libraries.push(library);
            }
        }
    }

    VersionDescriptor {
        id: id.clone(),
        minecraft_version: root_id.clone(),
        inherits_from: head
            .get("inheritsFrom")
            .and_then(Value::as_str)
            .map(str::to_string),
        jar,
        main_class,
        client_sha1,
        java_major,
        asset_index,
        libraries,
    }
}

fn first_in_chain<T>(
    chain: &[(String, Value)],
    pick: impl Fn(&Value) -> Option<T>,
) -> Option<T> {
    chain.iter().find_map(|(_, json)| pick(json))
}

fn parse_library(value: &Value) -> Option<LibraryRef> {
    let name = value.get("name").and_then(Value::as_str)?.to_string();
    let artifact = value.get("downloads").and_then(|d| d.get("artifact"));
    let path = artifact
        .and_then(|a| a.get("path"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| maven_path(&name))?;

    Some(LibraryRef {
        name,
        path,
        sha1: artifact
            .and_then(|a| a.get("sha1"))
            .and_then(Value::as_str)
            .map(str::to_string),
        url: artifact
            .and_then(|a| a.get("url"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| value.get("url").and_then(Value::as_str).map(str::to_string)),
        size: artifact.and_then(|a| a.get("size")).and_then(Value::as_u64),
    })
}

/// `group:artifact:version[:classifier]` to its repository-relative jar path.
pub(crate) fn maven_path(coordinate: &str) -> Option<String> {
    let mut parts = coordinate.split(':');
    let group = parts.next()?.trim();
    let artifact = parts.next()?.trim();
    let version = parts.next()?.trim();
    let classifier = parts.next().map(str::trim).filter(|c| !c.is_empty());
    if parts.next().is_some() || group.is_empty() || artifact.is_empty() || version.is_empty() {
        return None;
    }

    let file = match classifier {
        Some(classifier) => format!("{artifact}-{version}-{classifier}.jar"),
        None => format!("{artifact}-{version}.jar"),
    };
    Some(format!(
        "{}/{artifact}/{version}/{file}",
        group.replace('.', "/")
    ))
}
