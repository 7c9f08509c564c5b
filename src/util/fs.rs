use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use anyhow::Context;

/// Write content to a file atomically (write to .tmp then rename).
/// Sets file permissions to 0600 (owner-only read/write).
pub fn atomic_write(path: &Path, content: &str) -> anyhow::Result<()> {
    let tmp_path = path.with_extension("tmp");

    {
        let mut file = std::fs::File::create(&tmp_path)
            .with_context(|| format!("failed to create {}", tmp_path.display()))?;
        file.write_all(content.as_bytes())?;
        file.sync_all()?;
        file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    }

    std::fs::rename(&tmp_path, path).with_context(|| {
        format!(
            "failed to rename {} to {}",
            tmp_path.display(),
            path.display()
        )
    })?;

    Ok(())
}

/// Reject a file that is world-writable or not owned by the current user (§6 hooks contract).
pub fn check_owned_and_private(path: &Path) -> anyhow::Result<()> {
    let meta = std::fs::metadata(path)
        .with_context(|| format!("failed to stat {}", path.display()))?;

    let mode = meta.permissions().mode();
    if mode & 0o002 != 0 {
        anyhow::bail!("{} is world-writable, refusing to load", path.display());
    }

    // SAFETY: getuid() has no preconditions and cannot fail.
    let uid = unsafe { libc_getuid() };
    if meta.uid() != uid {
        anyhow::bail!(
            "{} is not owned by the current user, refusing to load",
            path.display()
        );
    }

    Ok(())
}

use std::os::unix::fs::MetadataExt;

// Avoid a dependency on the `libc` crate for a single syscall the standard
// library does not expose; this mirrors what `nix`/`libc` would provide.
unsafe fn libc_getuid() -> u32 {
    unsafe extern "C" {
        fn getuid() -> u32;
    }
    unsafe { getuid() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_atomic_write() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("test.yaml");

        atomic_write(&path, "hello: world").unwrap();

        assert!(path.exists());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello: world");

        let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600, "file should have 0600 permissions");
    }

    #[test]
    fn test_atomic_write_overwrites() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("test.yaml");

        atomic_write(&path, "first").unwrap();
        atomic_write(&path, "second").unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "second");
    }

    #[test]
    fn test_check_owned_and_private_rejects_world_writable() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("hooks.yaml");
        std::fs::write(&path, "").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o666)).unwrap();

        let result = check_owned_and_private(&path);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("world-writable"));
    }

    #[test]
    fn test_check_owned_and_private_accepts_private_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("hooks.yaml");
        std::fs::write(&path, "").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600)).unwrap();

        assert!(check_owned_and_private(&path).is_ok());
    }
}
