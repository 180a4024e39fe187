use std::cmp::Ordering;
use std::future::Future;

use serde_json::Value;

use crate::core::java::{CompatibilityVerdict, JavaRuntimeRecord, ResolvedJava};

pub(crate) fn required_java_major_for_version(minecraft_version: &str) -> u32 {
    let clean = minecraft_version.trim().trim_start_matches('v');
    let mut parts = clean.split('.');

    let major = parts
        .next()
        .and_then(|p| p.parse::<u32>().ok())
        .unwrap_or_default();
    let minor = parts
        .next()
        .and_then(|p| p.parse::<u32>().ok())
        .unwrap_or_default();
    let patch = parts
        .next()
        .and_then(|p| p.parse::<u32>().ok())
        .unwrap_or_default();

    if major == 1 && (minor > 20 || (minor == 20 && patch >= 5)) {
        21
    } else if major == 1 && minor <= 16 {
        8
    } else if major == 1 && minor >= 17 {
        17
    } else if major > 1 {
        if major > 20 || (major == 20 && minor >= 5) {
            21
        } else if major >= 17 {
            17
        } else {
            8
        }
    } else {
        17
    }
}

/// Loader metadata wins over the base version, which wins over the built-in table.
pub fn required_java_major(
    minecraft_version: &str,
    version_major: Option<u32>,
    loader_major: Option<u32>,
) -> u32 {
    loader_major
        .or(version_major)
        .unwrap_or_else(|| required_java_major_for_version(minecraft_version))
}

pub(crate) fn extract_java_major(version_json: &Value) -> Option<u32> {
    version_json
        .get("javaVersion")
        .and_then(|v| v.get("majorVersion"))
        .and_then(|v| v.as_u64())
        .map(|v| v as u32)
}

fn version_components(version: &str) -> Vec<u64> {
    version
        .split(|c: char| !c.is_ascii_digit())
        .filter(|part| !part.is_empty())
        .filter_map(|part| part.parse::<u64>().ok())
        .collect()
}

fn compare_quality(a: &JavaRuntimeRecord, b: &JavaRuntimeRecord) -> Ordering {
    version_components(&a.version)
        .cmp(&version_components(&b.version))
        // Lower path wins ties so the pick is stable across scans.
        .then_with(|| b.path.cmp(&a.path))
}

/// Best valid runtime of exactly `required_major`; never substitutes another major.
pub fn select_auto_java(
    runtimes: &[JavaRuntimeRecord],
    required_major: u32,
) -> Option<JavaRuntimeRecord> {
    runtimes
        .iter()
        .filter(|runtime| runtime.valid && runtime.major_version == required_major)
        .max_by(|a, b| compare_quality(a, b))
        .cloned()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled {
    pub resolved: Option<JavaRuntimeRecord>,
    pub verdict: CompatibilityVerdict,
}

/// Decides between the automatic pick and a user override.
///
/// The only effect is `validate`, called once with the requested path. An
/// invalid override keeps the auto pick for display but still reports
/// `Missing`; a valid override of the wrong major is reported as
/// `Incompatible` with the user's runtime as `resolved`.
pub async fn reconcile<F, Fut>(
    auto_pick: Option<&JavaRuntimeRecord>,
    requested_path: Option<&str>,
    required_major: u32,
    validate: F,
) -> Reconciled
where
    F: FnOnce(String) -> Fut,
    Fut: Future<Output = Option<JavaRuntimeRecord>>,
{
    let Some(requested) = requested_path.map(str::trim).filter(|p| !p.is_empty()) else {
        return Reconciled {
            resolved: auto_pick.cloned(),
            verdict: if auto_pick.is_some() {
                CompatibilityVerdict::Recommended
            } else {
                CompatibilityVerdict::Missing
            },
        };
    };

    match validate(requested.to_string()).await {
        Some(runtime) if runtime.valid => {
            let verdict = if runtime.major_version == required_major {
                CompatibilityVerdict::Matched
            } else {
                CompatibilityVerdict::Incompatible
            };
            Reconciled {
                resolved: Some(runtime),
                verdict,
            }
        }
        _ => Reconciled {
            resolved: auto_pick.cloned(),
            verdict: CompatibilityVerdict::Missing,
        },
    }
}

pub async fn resolve_java<F, Fut>(
    instance_id: &str,
    required_major: u32,
    requested_path: Option<&str>,
    runtimes: &[JavaRuntimeRecord],
    validate: F,
) -> ResolvedJava
where
    F: FnOnce(String) -> Fut,
    Fut: Future<Output = Option<JavaRuntimeRecord>>,
{
    let auto_pick = select_auto_java(runtimes, required_major);
    let Reconciled { resolved, verdict } =
        reconcile(auto_pick.as_ref(), requested_path, required_major, validate).await;
    let final_path = resolved.as_ref().map(|runtime| runtime.path.clone());

    tracing::debug!(
        instance_id,
        required_major,
        ?verdict,
        final_path = final_path.as_deref().unwrap_or("-"),
        "resolved java runtime"
    );

    ResolvedJava {
        instance_id: instance_id.to_string(),
        required_major,
        requested_path: requested_path.map(str::to_string),
        resolved,
        verdict,
        auto_pick,
        final_path,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::java::runtime;
    use futures::future::ready;

    #[test]
    fn maps_minecraft_ranges_to_expected_java() {
        assert_eq!(required_java_major_for_version("1.16.5"), 8);
        assert_eq!(required_java_major_for_version("1.17.1"), 17);
        assert_eq!(required_java_major_for_version("1.20.4"), 17);
        assert_eq!(required_java_major_for_version("1.20.5"), 21);
    }

    #[test]
    fn prefers_java_version_from_profile_metadata() {
        assert_eq!(required_java_major("1.20.1", Some(17), Some(21)), 21);
        assert_eq!(required_java_major("1.20.1", Some(17), None), 17);
        assert_eq!(required_java_major("1.12.2", None, None), 8);
    }

    #[test]
    fn extracts_major_from_version_json() {
        let base = serde_json::json!({"javaVersion": {"majorVersion": 17}});
        assert_eq!(extract_java_major(&base), Some(17));
        assert_eq!(extract_java_major(&serde_json::json!({})), None);
    }

    #[test]
    fn auto_selection_only_returns_valid_exact_matches() {
        let mut broken = runtime("/jdk17-broken/bin/java", 17, "17.0.99");
        broken.valid = false;
        let runtimes = vec![
            runtime("/jdk8/bin/java", 8, "1.8.0_392"),
            broken,
            runtime("/jdk17a/bin/java", 17, "17.0.2"),
            runtime("/jdk17b/bin/java", 17, "17.0.9"),
            runtime("/jdk21/bin/java", 21, "21.0.1"),
        ];

        let picked = select_auto_java(&runtimes, 17).expect("a java 17 runtime");
        assert_eq!(picked.path, "/jdk17b/bin/java");
        assert!(picked.valid);
        assert_eq!(select_auto_java(&runtimes, 11), None);
        assert_eq!(select_auto_java(&[], 17), None);
    }

    #[test]
    fn equal_quality_ties_break_on_path() {
        let runtimes = vec![
            runtime("/b/bin/java", 17, "17.0.9"),
            runtime("/a/bin/java", 17, "17.0.9"),
        ];
        assert_eq!(
            select_auto_java(&runtimes, 17).map(|r| r.path),
            Some("/a/bin/java".to_string())
        );
    }

    #[tokio::test]
    async fn no_override_uses_auto_pick() {
        let auto = runtime("/jdk17/bin/java", 17, "17.0.9");
        let result = reconcile(Some(&auto), None, 17, |_| ready(None)).await;
        assert_eq!(result.verdict, CompatibilityVerdict::Recommended);
        assert_eq!(result.resolved, Some(auto));

        let result = reconcile(None, None, 17, |_| ready(None)).await;
        assert_eq!(result.verdict, CompatibilityVerdict::Missing);
        assert_eq!(result.resolved, None);
    }

    #[tokio::test]
    async fn invalid_override_blocks_but_shows_fallback() {
        let auto = runtime("/jdk17/bin/java", 17, "17.0.9");
        let result = reconcile(Some(&auto), Some("/nope/java"), 17, |_| ready(None)).await;
        assert_eq!(result.verdict, CompatibilityVerdict::Missing);
        assert_eq!(result.resolved, Some(auto.clone()));

        let mut invalid = runtime("/nope/java", 17, "17.0.1");
        invalid.valid = false;
        let result =
            reconcile(Some(&auto), Some("/nope/java"), 17, |_| ready(Some(invalid))).await;
        assert_eq!(result.verdict, CompatibilityVerdict::Missing);
    }

    #[tokio::test]
    async fn override_of_wrong_major_is_incompatible() {
        let auto = runtime("/jdk17/bin/java", 17, "17.0.9");
        let java8 = runtime("/jdk8/bin/java", 8, "1.8.0_392");
        let result = reconcile(Some(&auto), Some("/jdk8/bin/java"), 17, |path| {
            assert_eq!(path, "/jdk8/bin/java");
            ready(Some(java8.clone()))
        })
        .await;
        assert_eq!(result.verdict, CompatibilityVerdict::Incompatible);
        assert_eq!(result.resolved, Some(java8));
    }

    #[tokio::test]
    async fn override_of_right_major_is_matched() {
        let custom = runtime("/custom/bin/java", 17, "17.0.4");
        let result = reconcile(None, Some("/custom/bin/java"), 17, |_| {
            ready(Some(custom.clone()))
        })
        .await;
        assert_eq!(result.verdict, CompatibilityVerdict::Matched);
        assert_eq!(result.resolved, Some(custom));
    }

    #[tokio::test]
    async fn reconcile_is_deterministic() {
        let auto = runtime("/jdk17/bin/java", 17, "17.0.9");
        let java8 = runtime("/jdk8/bin/java", 8, "1.8.0_392");
        let first = reconcile(Some(&auto), Some("/jdk8"), 17, |_| ready(Some(java8.clone()))).await;
        let second = reconcile(Some(&auto), Some("/jdk8"), 17, |_| ready(Some(java8.clone()))).await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn incompatible_resolution_has_no_launch_path() {
        let runtimes = vec![runtime("/jdk17/bin/java", 17, "17.0.9")];
        let java8 = runtime("/jdk8/bin/java", 8, "1.8.0_392");
        let resolved = resolve_java("inst", 17, Some("/jdk8/bin/java"), &runtimes, |_| {
            ready(Some(java8))
        })
        .await;
        assert_eq!(resolved.verdict, CompatibilityVerdict::Incompatible);
        assert_eq!(resolved.final_path.as_deref(), Some("/jdk8/bin/java"));
        assert_eq!(resolved.launch_path(), None);
        assert_eq!(
            resolved.auto_pick.map(|r| r.path),
            Some("/jdk17/bin/java".to_string())
        );
    }

    #[tokio::test]
    async fn recommended_resolution_launches_with_auto_pick() {
        let runtimes = vec![runtime("/jdk21/bin/java", 21, "21.0.3")];
        let resolved = resolve_java("inst", 21, None, &runtimes, |_| ready(None)).await;
        assert_eq!(resolved.verdict, CompatibilityVerdict::Recommended);
        assert_eq!(resolved.launch_path(), Some("/jdk21/bin/java"));
    }
}
