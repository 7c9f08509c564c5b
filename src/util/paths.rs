use std::path::{Path, PathBuf};

/// Get the webchanges config directory.
/// Priority: WEBCHANGES_CONFIG_DIR env var > platform config dir / webchanges-rs
pub fn config_dir() -> anyhow::Result<PathBuf> {
    if let Ok(dir) = std::env::var("WEBCHANGES_CONFIG_DIR") {
        return Ok(PathBuf::from(dir));
    }

    let base = dirs::config_dir()
        .ok_or_else(|| anyhow::anyhow!("could not determine config directory"))?;
    Ok(base.join("webchanges-rs"))
}

/// Expand `~` to the user's home directory.
/// Only handles `~/path` — not `~user/path`.
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    if path == "~"
        && let Some(home) = dirs::home_dir()
    {
        return home;
    }
    PathBuf::from(path)
}

/// Contract an absolute path to use `~` for the home directory.
pub fn contract_tilde(path: &Path) -> String {
    if let Some(home) = dirs::home_dir()
        && let Ok(suffix) = path.strip_prefix(&home)
    {
        return format!("~/{}", suffix.display());
    }
    path.display().to_string()
}
