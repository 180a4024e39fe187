use std::fmt::{self, Display};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModLoaderKind {
    Fabric,
    Quilt,
    Forge,
    NeoForge,
}

impl ModLoaderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModLoaderKind::Fabric => "fabric",
            ModLoaderKind::Quilt => "quilt",
            ModLoaderKind::Forge => "forge",
            ModLoaderKind::NeoForge => "neoforge",
        }
    }

    /// Forge-style loaders ship an install profile whose processors must run.
    pub fn uses_install_profile(&self) -> bool {
        matches!(self, ModLoaderKind::Forge | ModLoaderKind::NeoForge)
    }

    /// Parses a loader name, mapping `vanilla` and blanks to `None`.
    pub fn parse_optional(raw: &str) -> Result<Option<Self>, String> {
        let clean = raw.trim();
        if clean.is_empty() || clean.eq_ignore_ascii_case("vanilla") {
            return Ok(None);
        }
        clean.parse().map(Some)
    }
}

impl Display for ModLoaderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ModLoaderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fabric" => Ok(ModLoaderKind::Fabric),
            "quilt" => Ok(ModLoaderKind::Quilt),
            "forge" => Ok(ModLoaderKind::Forge),
            "neoforge" | "neo-forge" => Ok(ModLoaderKind::NeoForge),
            other => Err(format!("Unknown mod loader '{other}'")),
        }
    }
}

pub(crate) fn profile_id_for_loader(
    loader: ModLoaderKind,
    minecraft_version: &str,
    loader_version: &str,
) -> String {
    match loader {
        ModLoaderKind::Fabric => format!("fabric-loader-{loader_version}-{minecraft_version}"),
        ModLoaderKind::Quilt => format!("quilt-loader-{loader_version}-{minecraft_version}"),
        ModLoaderKind::Forge => format!("{minecraft_version}-forge-{loader_version}"),
        ModLoaderKind::NeoForge => format!("neoforge-{loader_version}"),
    }
}
