use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::util;

/// Declarative stand-in for the original system's dynamically-loaded hooks
/// module (§6, §9): this crate has no code-loading mechanism, so a hooks
/// file instead names additional filter/differ *configurations* rather than
/// arbitrary subclasses. The permission/ownership check the original
/// enforces before `exec`-ing a hooks module is enforced here identically,
/// since it is the part of the contract that matters for safety.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct HooksManifest {
    #[serde(default)]
    pub filters: Vec<HookFilter>,
    #[serde(default)]
    pub differs: Vec<HookDiffer>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HookFilter {
    pub name: String,
    pub base: String,
    #[serde(default)]
    pub args: serde_yaml::Mapping,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HookDiffer {
    pub name: String,
    pub base: String,
    #[serde(default)]
    pub args: serde_yaml::Mapping,
}

impl HooksManifest {
    /// Load a hooks file, rejecting it outright if it is world-writable or
    /// not owned by the current user (§6).
    pub fn load(path: &Path) -> Result<Self> {
        util::fs::check_owned_and_private(path)?;
        let text = std::fs::read_to_string(path)?;
        let manifest: HooksManifest = serde_yaml::from_str(&text)?;
        Ok(manifest)
    }
}
