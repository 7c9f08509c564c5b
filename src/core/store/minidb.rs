use std::path::Path;

use anyhow::{Context, Result};
use base64::Engine;

use super::{Snapshot, SnapshotStore};

/// One-shot reader for the legacy `minidb` format (§4.3, §6, §9). The
/// original format is a language-specific key-value dump; this crate defines
/// a line-oriented stand-in (`guid\tbase64(data)\ttimestamp\ttries\tetag\tmime`,
/// one snapshot per line) so the migration contract — "read-only except for
/// migration, rewritten into the modern format" — is exercisable without a
/// dependency on that language's serialization. See DESIGN.md.
pub fn read_legacy(path: &Path) -> Result<Vec<(String, Snapshot)>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read legacy minidb file {}", path.display()))?;

    let mut out = Vec::new();
    for (lineno, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() != 6 {
            anyhow::bail!(
                "{}: line {} has {} fields, expected 6",
                path.display(),
                lineno + 1,
                fields.len()
            );
        }
        let guid = fields[0].to_string();
        let data = base64::engine::general_purpose::STANDARD
            .decode(fields[1])
            .with_context(|| format!("{}: line {}: invalid base64 data", path.display(), lineno + 1))?;
        let timestamp: i64 = fields[2]
            .parse()
            .with_context(|| format!("{}: line {}: invalid timestamp", path.display(), lineno + 1))?;
        let tries: u32 = fields[3]
            .parse()
            .with_context(|| format!("{}: line {}: invalid tries", path.display(), lineno + 1))?;
        let etag = fields[4].to_string();
        let mime = fields[5].to_string();

        out.push((
            guid,
            Snapshot {
                data,
                timestamp,
                tries,
                etag,
                mime,
            },
        ));
    }
    Ok(out)
}

/// Migrate a legacy minidb file into `target`, leaving the legacy file
/// untouched (§6: "leave the legacy file alone"). Returns the number of
/// snapshots migrated.
pub fn migrate(path: &Path, target: &dyn SnapshotStore) -> Result<usize> {
    let entries = read_legacy(path)?;
    let count = entries.len();
    for (guid, snapshot) in entries {
        target.save(&guid, snapshot)?;
    }
    target.copy_temp_to_permanent(true)?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::sqlite::SqliteSnapshotStore;
    use base64::Engine;
    use tempfile::TempDir;

    fn write_legacy(path: &std::path::Path, guid: &str, data: &str, ts: i64, tries: u32) {
        let encoded = base64::engine::general_purpose::STANDARD.encode(data.as_bytes());
        let line = format!("{guid}\t{encoded}\t{ts}\t{tries}\t\ttext/plain\n");
        std::fs::write(path, line).unwrap();
    }

    #[test]
    fn test_read_legacy_roundtrips_data() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("legacy.minidb");
        write_legacy(&path, "g1", "hello", 100, 0);

        let entries = read_legacy(&path).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].0, "g1");
        assert_eq!(entries[0].1.data, b"hello");
    }

    #[test]
    fn test_migrate_leaves_legacy_file_untouched() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("legacy.minidb");
        write_legacy(&path, "g1", "hello", 100, 0);
        let original = std::fs::read_to_string(&path).unwrap();

        let store = SqliteSnapshotStore::open_in_memory().unwrap();
        let migrated = migrate(&path, &store).unwrap();
        assert_eq!(migrated, 1);
        assert_eq!(store.load("g1").unwrap().unwrap().data, b"hello");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), original);
    }
}
