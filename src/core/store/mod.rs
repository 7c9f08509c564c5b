pub mod minidb;
pub mod sqlite;
pub mod textfile;

use std::collections::HashSet;

use anyhow::Result;

/// A persisted snapshot tuple (§3): the canonical artifact plus retrieval
/// bookkeeping. `tries == 0` marks a successful retrieval; `tries > 0` marks
/// an error retry that reused the previous successful data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub data: Vec<u8>,
    pub timestamp: i64,
    pub tries: u32,
    pub etag: String,
    pub mime: String,
}

/// Append-oriented per-fingerprint history store (§4.3). Implementations must
/// satisfy the invariants in §4.3/§8: strict descending-timestamp ordering in
/// `get_history_data`, `restore(backup(x)) == x`, and `clean(guid, N)` leaving
/// exactly `min(N, existing_count)` of the newest entries.
pub trait SnapshotStore: Send + Sync {
    /// Most recent snapshot with `tries == 0`, else most recent overall,
    /// else `None`.
    fn load(&self, guid: &str) -> Result<Option<Snapshot>>;

    /// Append-only write. May be buffered in a staging area until
    /// `copy_temp_to_permanent` is called (§4.3, §9).
    fn save(&self, guid: &str, snapshot: Snapshot) -> Result<()>;

    /// Most-recent-first, deduplicated by data. `count = None` means
    /// unbounded.
    fn get_history_data(&self, guid: &str, count: Option<usize>) -> Result<Vec<(Vec<u8>, i64)>>;

    /// Most-recent-first, NOT deduplicated.
    fn get_history_snapshots(&self, guid: &str, count: Option<usize>) -> Result<Vec<Snapshot>>;

    fn delete(&self, guid: &str) -> Result<()>;

    /// Drop the newest `n` snapshots for `guid`. Returns the number deleted.
    fn delete_latest(&self, guid: &str, n: usize) -> Result<usize>;

    /// Keep the newest `retain` snapshots for `guid`. Returns the number deleted.
    fn clean(&self, guid: &str, retain: usize) -> Result<usize>;

    fn clean_cache(&self, guids: &[String], retain: usize) -> Result<usize> {
        let mut total = 0;
        for guid in guids {
            total += self.clean(guid, retain)?;
        }
        Ok(total)
    }

    fn clean_all(&self, retain: usize) -> Result<usize> {
        let mut total = 0;
        for guid in self.get_guids()? {
            total += self.clean(&guid, retain)?;
        }
        Ok(total)
    }

    /// Drop every fingerprint not in `known_guids`, then `clean(_, retain)`
    /// the survivors. Returns the dropped fingerprints.
    fn gc(&self, known_guids: &HashSet<String>, retain: usize) -> Result<Vec<String>>;

    /// Drop every snapshot (of any fingerprint) newer than `ts`. Returns the
    /// number deleted.
    fn rollback(&self, ts: i64) -> Result<usize>;

    /// Relocate all history from `old_guid` to `new_guid`, preserving the
    /// total snapshot count (§3, §8).
    fn move_guid(&self, old_guid: &str, new_guid: &str) -> Result<usize>;

    /// A full bit-exact dump, `(guid, snapshot)` pairs.
    fn backup(&self) -> Result<Vec<(String, Snapshot)>>;

    /// Replace the store's contents with `entries`. `restore(backup(x)) == x`.
    fn restore(&self, entries: Vec<(String, Snapshot)>) -> Result<()>;

    fn get_guids(&self) -> Result<HashSet<String>>;

    fn flushdb(&self) -> Result<()>;

    /// Promote staged writes to the permanent backing (§4.3, §9). Backings
    /// with no staging area (e.g. the textfile backing) implement this as a
    /// no-op.
    fn copy_temp_to_permanent(&self, delete: bool) -> Result<()>;
}
