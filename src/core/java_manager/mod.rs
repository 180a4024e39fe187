use std::collections::HashSet;
use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures::future::join_all;
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::process::Command;

use crate::core::java::{JavaRuntimeRecord, JavaScanner};
use crate::core::layout::LauncherDataLayout;

static VERSION_BANNER: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r#"(?m)^\S+ version "(?P<version>[^"]+)""#).ok());

/// Majors the launcher ships embedded runtimes for.
const EMBEDDED_MAJORS: [u32; 3] = [8, 17, 21];

pub(crate) fn runtime_folder_name(java_major: u32) -> &'static str {
    match java_major {
        8 => "java8",
        17 => "java17",
        _ => "java21",
    }
}

pub(crate) fn java_bin_name() -> &'static str {
    if cfg!(windows) {
        "java.exe"
    } else {
        "java"
    }
}

/// Extracts `(major, version)` from the banner `java -version` prints.
pub fn parse_java_version_output(output: &str) -> Option<(u32, String)> {
    let version = VERSION_BANNER.as_ref()?.captures(output)?.name("version")?.as_str();
    let mut parts = version.split(|c: char| !c.is_ascii_digit());
    let first = parts.next()?.parse::<u32>().ok()?;
    let major = if first == 1 {
        parts.next()?.parse::<u32>().ok()?
    } else {
        first
    };
    Some((major, version.to_string()))
}

/// Finds runtimes by asking candidate binaries for their version.
#[derive(Debug, Clone)]
pub struct CommandJavaScanner {
    layout: LauncherDataLayout,
    java_home: Option<PathBuf>,
    search_path: Option<OsString>,
}

impl CommandJavaScanner {
    pub fn new(layout: LauncherDataLayout) -> Self {
        Self {
            layout,
            java_home: env::var_os("JAVA_HOME").map(PathBuf::from),
            search_path: env::var_os("PATH"),
        }
    }

    pub fn with_environment(
        layout: LauncherDataLayout,
        java_home: Option<PathBuf>,
        search_path: Option<OsString>,
    ) -> Self {
        Self {
            layout,
            java_home,
            search_path,
        }
    }

    fn candidates(&self) -> Vec<PathBuf> {
        let mut candidates: Vec<PathBuf> = EMBEDDED_MAJORS
            .iter()
            .map(|major| {
                self.layout
                    .embedded_java(runtime_folder_name(*major), java_bin_name())
            })
            .collect();
        if let Some(home) = &self.java_home {
            candidates.push(home.join("bin").join(java_bin_name()));
        }
        if let Some(search_path) = &self.search_path {
            candidates.extend(env::split_paths(search_path).map(|dir| dir.join(java_bin_name())));
        }

        let mut seen = HashSet::new();
        candidates
            .into_iter()
            .filter(|path| path.is_file())
            .filter(|path| seen.insert(path.canonicalize().unwrap_or_else(|_| path.clone())))
            .collect()
    }
}

async fn inspect_runtime(path: &Path) -> Option<JavaRuntimeRecord> {
    if !path.is_file() {
        return None;
    }
    let output = match Command::new(path).arg("-version").output().await {
        Ok(output) => output,
        Err(error) => {
            tracing::debug!(path = %path.display(), %error, "java candidate did not start");
            return None;
        }
    };
    if !output.status.success() {
        tracing::debug!(path = %path.display(), status = %output.status, "java candidate failed");
        return None;
    }

    // Most JVMs print the banner on stderr.
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    let (major_version, version) =
        parse_java_version_output(&stderr).or_else(|| parse_java_version_output(&stdout))?;

    Some(JavaRuntimeRecord {
        path: path.display().to_string(),
        major_version,
        version,
        valid: true,
    })
}

#[async_trait]
impl JavaScanner for CommandJavaScanner {
    async fn all_runtimes(&self) -> Vec<JavaRuntimeRecord> {
        let candidates = self.candidates();
        let runtimes: Vec<_> = join_all(candidates.iter().map(|path| inspect_runtime(path)))
            .await
            .into_iter()
            .flatten()
            .collect();
        tracing::debug!(
            candidates = candidates.len(),
            runtimes = runtimes.len(),
            "java scan finished"
        );
        runtimes
    }

    async fn validate_path(&self, path: &str) -> Option<JavaRuntimeRecord> {
        let trimmed = path.trim();
        if trimmed.is_empty() {
            return None;
        }
        inspect_runtime(Path::new(trimmed)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_legacy_and_modern_banners() {
        let legacy = "java version \"1.8.0_392\"\nJava(TM) SE Runtime Environment (build 1.8.0_392-b08)";
        assert_eq!(
            parse_java_version_output(legacy),
            Some((8, "1.8.0_392".to_string()))
        );

        let modern = "openjdk version \"17.0.9\" 2023-10-17\nOpenJDK Runtime Environment Temurin-17.0.9+9";
        assert_eq!(
            parse_java_version_output(modern),
            Some((17, "17.0.9".to_string()))
        );

        let bare = "openjdk version \"21\" 2023-09-19";
        assert_eq!(parse_java_version_output(bare), Some((21, "21".to_string())));
    }

    #[test]
    fn rejects_output_without_banner() {
        assert_eq!(parse_java_version_output("Error: could not find libjvm"), None);
    }

    #[test]
    fn embedded_folders_follow_majors() {
        assert_eq!(runtime_folder_name(8), "java8");
        assert_eq!(runtime_folder_name(17), "java17");
        assert_eq!(runtime_folder_name(21), "java21");
    }

    #[tokio::test]
    async fn missing_binaries_are_not_runtimes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let layout = LauncherDataLayout::from_root(dir.path());
        let scanner = CommandJavaScanner::with_environment(
            layout,
            Some(dir.path().join("jdk")),
            Some(dir.path().join("bin").into_os_string()),
        );

        assert!(scanner.all_runtimes().await.is_empty());
        assert_eq!(scanner.validate_path("").await, None);
        let absent = dir.path().join("nope").join("java");
        assert_eq!(
            scanner.validate_path(&absent.display().to_string()).await,
            None
        );
    }
}
