use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use serde_json::Value;

use super::{file_sha1, io_error};
use crate::core::diagnose::{InstallProfile, ProfileIssue, Side};
use crate::core::error::DiagnoseError;
use crate::core::java_resolver::extract_java_major;
use crate::core::layout::LauncherDataLayout;
use crate::core::loaders::ModLoaderKind;
use crate::core::version_resolver::maven_path;

pub(super) fn inspect(
    layout: &LauncherDataLayout,
    version_id: &str,
    side: Side,
) -> Result<Option<ProfileIssue>, DiagnoseError> {
    let (Some(version_path), Some(profile_path)) =
        (layout.version_json(version_id), layout.install_profile(version_id))
    else {
        return Ok(Some(ProfileIssue::BadModLoaderInstall {
            version_id: version_id.to_string(),
            reason: "version id is not a plain directory name".to_string(),
        }));
    };
    let version = match read_json(&version_path)? {
        Some(Ok(json)) => json,
        Some(Err(reason)) => {
            return Ok(Some(ProfileIssue::BadModLoaderInstall {
                version_id: version_id.to_string(),
                reason,
            }))
        }
        None => {
            return Ok(Some(ProfileIssue::BadModLoaderInstall {
                version_id: version_id.to_string(),
                reason: "version manifest is missing".to_string(),
            }))
        }
    };

    let has_main_class = version
        .get("mainClass")
        .and_then(Value::as_str)
        .is_some_and(|main| !main.trim().is_empty());
    if !has_main_class {
        return Ok(Some(ProfileIssue::BadModLoaderInstall {
            version_id: version_id.to_string(),
            reason: "version manifest has no main class".to_string(),
        }));
    }

    // Loaders without an install profile (fabric, quilt) are complete at this point.
    let profile = match read_json(&profile_path)? {
        None => return Ok(None),
        Some(Err(reason)) => {
            return Ok(Some(ProfileIssue::BadModLoaderInstall {
                version_id: version_id.to_string(),
                reason,
            }))
        }
        Some(Ok(profile)) => profile,
    };

    let data = profile.get("data").cloned().unwrap_or(Value::Null);
    for processor in processors_for(&profile, side) {
        let Some(outputs) = processor.get("outputs").and_then(Value::as_object) else {
            continue;
        };
        for (target, expected) in outputs {
            let (Some(path), Some(expected)) = (
                resolve_token(layout, target, &data, side),
                expected
                    .as_str()
                    .and_then(|token| resolve_literal(token, &data, side)),
            ) else {
                continue;
            };
            let intact = matches!(
                file_sha1(Path::new(&path))?,
                Some(actual) if actual.eq_ignore_ascii_case(&expected)
            );
            if !intact {
                return Ok(Some(ProfileIssue::BadInstallProfile {
                    profile: install_profile(version_id, &version, profile.clone()),
                }));
            }
        }
    }
    Ok(None)
}

fn read_json(path: &Path) -> Result<Option<Result<Value, String>>, DiagnoseError> {
    match fs::read(path) {
        Ok(raw) => Ok(Some(
            serde_json::from_slice(&raw)
                .map_err(|error| format!("{} is unreadable: {error}", path.display())),
        )),
        Err(error) if error.kind() == ErrorKind::NotFound => Ok(None),
        Err(error) => Err(io_error(path, error)),
    }
}

fn processors_for<'a>(profile: &'a Value, side: Side) -> impl Iterator<Item = &'a Value> {
    let side_name = side_name(side);
    profile
        .get("processors")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter(move |processor| match processor.get("sides").and_then(Value::as_array) {
            Some(sides) => sides.iter().any(|s| s.as_str() == Some(side_name)),
            None => true,
        })
}

fn side_name(side: Side) -> &'static str {
    match side {
        Side::Client => "client",
        Side::Server => "server",
    }
}

/// `{KEY}` tokens point into the profile `data` map, keyed by side.
fn data_entry<'a>(token: &str, data: &'a Value, side: Side) -> Option<&'a str> {
    let key = token.strip_prefix('{')?.strip_suffix('}')?;
    data.get(key)?.get(side_name(side))?.as_str()
}

fn resolve_literal(token: &str, data: &Value, side: Side) -> Option<String> {
    let token = data_entry(token, data, side).unwrap_or(token);
    Some(
        token
            .strip_prefix('\'')
            .and_then(|t| t.strip_suffix('\''))
            .unwrap_or(token)
            .to_string(),
    )
}

/// Resolves an output target to a file path; `[group:artifact:version]` is a library.
fn resolve_token(
    layout: &LauncherDataLayout,
    token: &str,
    data: &Value,
    side: Side,
) -> Option<String> {
    let token = data_entry(token, data, side).unwrap_or(token);
    let coordinate = token.strip_prefix('[')?.strip_suffix(']')?;
    let coordinate = coordinate.replace('@', ":");
    let path = maven_path(coordinate.trim_end_matches(":jar"))?;
    Some(layout.library(&path)?.display().to_string())
}

fn install_profile(version_id: &str, version: &Value, profile: Value) -> InstallProfile {
    let minecraft_version = profile
        .get("minecraft")
        .and_then(Value::as_str)
        .or_else(|| version.get("inheritsFrom").and_then(Value::as_str))
        .unwrap_or(version_id)
        .to_string();
    let loader = profile
        .get("profile")
        .and_then(Value::as_str)
        .and_then(|name| ModLoaderKind::parse_optional(name).ok().flatten());

    InstallProfile {
        version_id: version_id.to_string(),
        minecraft_version,
        loader,
        java_major: extract_java_major(version),
        data: profile,
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::core::validator::sha1_hex;
    use pretty_assertions::assert_eq;

    const FORGE: &str = "1.20.1-forge-47.2.0";

    fn layout() -> (tempfile::TempDir, LauncherDataLayout) {
        let dir = tempfile::tempdir().expect("tempdir");
        let layout = LauncherDataLayout::from_root(dir.path());
        layout.ensure().expect("layout");
        (dir, layout)
    }

    fn write(path: &Path, bytes: &[u8]) {
        fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        fs::write(path, bytes).expect("write");
    }

    fn write_version(layout: &LauncherDataLayout, main_class: Option<&str>) {
        let mut json = serde_json::json!({
            "id": FORGE,
            "inheritsFrom": "1.20.1",
            "javaVersion": { "majorVersion": 17 },
        });
        if let Some(main_class) = main_class {
            json["mainClass"] = main_class.into();
        }
        write(
            &layout.version_json(FORGE).expect("path"),
            json.to_string().as_bytes(),
        );
    }

    fn write_profile(layout: &LauncherDataLayout) {
        let patched_sha = format!("'{}'", sha1_hex(b"patched"));
        let profile = serde_json::json!({
            "profile": "forge",
            "minecraft": "1.20.1",
            "data": {
                "PATCHED": {
                    "client": "[net.minecraftforge:forge:1.20.1-47.2.0:client]",
                    "server": "[net.minecraftforge:forge:1.20.1-47.2.0:server]"
                },
                "PATCHED_SHA": { "client": patched_sha, "server": "'x'" }
            },
            "processors": [
                { "sides": ["server"], "outputs": { "{PATCHED}": "{PATCHED_SHA}" } },
                { "outputs": { "{PATCHED}": "{PATCHED_SHA}" } }
            ]
        });
        write(
            &layout.install_profile(FORGE).expect("path"),
            profile.to_string().as_bytes(),
        );
    }

    fn patched_path(layout: &LauncherDataLayout) -> std::path::PathBuf {
        layout
            .library("net/minecraftforge/forge/1.20.1-47.2.0/forge-1.20.1-47.2.0-client.jar")
            .expect("path")
    }

    #[test]
    fn missing_main_class_is_a_broken_loader() {
        let (_dir, layout) = layout();
        write_version(&layout, None);
        let issue = inspect(&layout, FORGE, Side::Client).expect("inspect");
        assert!(matches!(
            issue,
            Some(ProfileIssue::BadModLoaderInstall { ref reason, .. }) if reason.contains("main class")
        ));
    }

    #[test]
    fn version_id_with_separators_is_a_broken_loader() {
        let (_dir, layout) = layout();
        let issue = inspect(&layout, "../../forge", Side::Client).expect("inspect");
        assert!(matches!(
            issue,
            Some(ProfileIssue::BadModLoaderInstall { ref reason, .. }) if reason.contains("plain directory")
        ));
    }

    #[test]
    fn loader_without_profile_is_clean() {
        let (_dir, layout) = layout();
        write_version(&layout, Some("net.fabricmc.loader.impl.launch.knot.KnotClient"));
        assert_eq!(inspect(&layout, FORGE, Side::Client).expect("inspect"), None);
    }

    #[test]
    fn missing_processor_output_needs_profile_install() {
        let (_dir, layout) = layout();
        write_version(&layout, Some("cpw.mods.bootstraplauncher.BootstrapLauncher"));
        write_profile(&layout);

        match inspect(&layout, FORGE, Side::Client).expect("inspect") {
            Some(ProfileIssue::BadInstallProfile { profile }) => {
                assert_eq!(profile.version_id, FORGE);
                assert_eq!(profile.minecraft_version, "1.20.1");
                assert_eq!(profile.loader, Some(ModLoaderKind::Forge));
                assert_eq!(profile.java_major, Some(17));
            }
            other => panic!("unexpected result {other:?}"),
        }

        write(&patched_path(&layout), b"patched");
        assert_eq!(inspect(&layout, FORGE, Side::Client).expect("inspect"), None);
    }
}
