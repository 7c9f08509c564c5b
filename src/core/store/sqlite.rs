use std::collections::HashSet;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use rusqlite::{params, Connection};

use super::{Snapshot, SnapshotStore};

/// The default backing (§4.3, §9, §10.3): a single SQLite file, WAL mode,
/// 0600 permissions. Writes from `save` accumulate in an in-memory staging
/// buffer and are promoted to the `snapshots` table in one transaction by
/// `copy_temp_to_permanent`, matching the two-phase contract in §4.3 — `load`
/// and the other readers only ever see promoted rows.
pub struct SqliteSnapshotStore {
    conn: Mutex<Connection>,
    staging: Mutex<Vec<(String, Snapshot)>>,
}

impl SqliteSnapshotStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open snapshot database at {}", path.display()))?;

        if path.exists() {
            let _ = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600));
        }

        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS snapshots (
                guid      TEXT NOT NULL,
                data      BLOB NOT NULL,
                timestamp INTEGER NOT NULL,
                tries     INTEGER NOT NULL,
                etag      TEXT NOT NULL,
                mime      TEXT NOT NULL,
                seq       INTEGER PRIMARY KEY AUTOINCREMENT,
                UNIQUE(guid, timestamp)
            );
            CREATE INDEX IF NOT EXISTS idx_snapshots_guid ON snapshots(guid);",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
            staging: Mutex::new(Vec::new()),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(
            "CREATE TABLE snapshots (
                guid      TEXT NOT NULL,
                data      BLOB NOT NULL,
                timestamp INTEGER NOT NULL,
                tries     INTEGER NOT NULL,
                etag      TEXT NOT NULL,
                mime      TEXT NOT NULL,
                seq       INTEGER PRIMARY KEY AUTOINCREMENT,
                UNIQUE(guid, timestamp)
            );
            CREATE INDEX idx_snapshots_guid ON snapshots(guid);",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
            staging: Mutex::new(Vec::new()),
        })
    }

    fn row_to_snapshot(row: &rusqlite::Row) -> rusqlite::Result<Snapshot> {
        Ok(Snapshot {
            data: row.get(0)?,
            timestamp: row.get(1)?,
            tries: row.get::<_, i64>(2)? as u32,
            etag: row.get(3)?,
            mime: row.get(4)?,
        })
    }
}

impl SnapshotStore for SqliteSnapshotStore {
    fn load(&self, guid: &str) -> Result<Option<Snapshot>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT data, timestamp, tries, etag, mime FROM snapshots
             WHERE guid = ?1 AND tries = 0 ORDER BY timestamp DESC, seq DESC LIMIT 1",
        )?;
        if let Some(row) = stmt.query_map(params![guid], Self::row_to_snapshot)?.next() {
            return Ok(Some(row?));
        }

        let mut stmt = conn.prepare(
            "SELECT data, timestamp, tries, etag, mime FROM snapshots
             WHERE guid = ?1 ORDER BY timestamp DESC, seq DESC LIMIT 1",
        )?;
        match stmt.query_map(params![guid], Self::row_to_snapshot)?.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    fn save(&self, guid: &str, snapshot: Snapshot) -> Result<()> {
        self.staging
            .lock()
            .unwrap()
            .push((guid.to_string(), snapshot));
        Ok(())
    }

    fn get_history_data(&self, guid: &str, count: Option<usize>) -> Result<Vec<(Vec<u8>, i64)>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT data, timestamp FROM snapshots
             WHERE guid = ?1 ORDER BY timestamp DESC, seq DESC",
        )?;
        let rows = stmt.query_map(params![guid], |row| {
            Ok((row.get::<_, Vec<u8>>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for row in rows {
            let (data, ts) = row?;
            if seen.insert(data.clone()) {
                out.push((data, ts));
                if count.is_some_and(|n| out.len() >= n) {
                    break;
                }
            }
        }
        Ok(out)
    }

    fn get_history_snapshots(&self, guid: &str, count: Option<usize>) -> Result<Vec<Snapshot>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT data, timestamp, tries, etag, mime FROM snapshots
             WHERE guid = ?1 ORDER BY timestamp DESC, seq DESC",
        )?;
        let rows = stmt.query_map(params![guid], Self::row_to_snapshot)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
            if count.is_some_and(|n| out.len() >= n) {
                break;
            }
        }
        Ok(out)
    }

    fn delete(&self, guid: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM snapshots WHERE guid = ?1", params![guid])?;
        Ok(())
    }

    fn delete_latest(&self, guid: &str, n: usize) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let seqs: Vec<i64> = {
            let mut stmt = conn.prepare(
                "SELECT seq FROM snapshots WHERE guid = ?1 ORDER BY timestamp DESC, seq DESC LIMIT ?2",
            )?;
            let rows = stmt.query_map(params![guid, n as i64], |row| row.get::<_, i64>(0))?;
            rows.collect::<rusqlite::Result<_>>()?
        };
        for seq in &seqs {
            conn.execute("DELETE FROM snapshots WHERE seq = ?1", params![seq])?;
        }
        Ok(seqs.len())
    }

    fn clean(&self, guid: &str, retain: usize) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let keep_seqs: Vec<i64> = {
            let mut stmt = conn.prepare(
                "SELECT seq FROM snapshots WHERE guid = ?1 ORDER BY timestamp DESC, seq DESC LIMIT ?2",
            )?;
            let rows = stmt.query_map(params![guid, retain as i64], |row| row.get::<_, i64>(0))?;
            rows.collect::<rusqlite::Result<_>>()?
        };

        let placeholders = if keep_seqs.is_empty() {
            "(-1)".to_string()
        } else {
            format!(
                "({})",
                keep_seqs
                    .iter()
                    .map(|s| s.to_string())
                    .collect::<Vec<_>>()
                    .join(",")
            )
        };

        let deleted = conn.execute(
            &format!("DELETE FROM snapshots WHERE guid = ?1 AND seq NOT IN {placeholders}"),
            params![guid],
        )?;
        Ok(deleted)
    }

    fn gc(&self, known_guids: &HashSet<String>, retain: usize) -> Result<Vec<String>> {
        let all = self.get_guids()?;
        let mut dropped = Vec::new();
        for guid in all {
            if !known_guids.contains(&guid) {
                self.delete(&guid)?;
                dropped.push(guid);
            }
        }
        for guid in known_guids {
            self.clean(guid, retain)?;
        }
        Ok(dropped)
    }

    fn rollback(&self, ts: i64) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let deleted = conn.execute("DELETE FROM snapshots WHERE timestamp > ?1", params![ts])?;
        Ok(deleted)
    }

    fn move_guid(&self, old_guid: &str, new_guid: &str) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let moved = conn.execute(
            "UPDATE snapshots SET guid = ?2 WHERE guid = ?1",
            params![old_guid, new_guid],
        )?;
        Ok(moved)
    }

    fn backup(&self) -> Result<Vec<(String, Snapshot)>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT guid, data, timestamp, tries, etag, mime FROM snapshots ORDER BY seq",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                Snapshot {
                    data: row.get(1)?,
                    timestamp: row.get(2)?,
                    tries: row.get::<_, i64>(3)? as u32,
                    etag: row.get(4)?,
                    mime: row.get(5)?,
                },
            ))
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn restore(&self, entries: Vec<(String, Snapshot)>) -> Result<()> {
        self.flushdb()?;
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        for (guid, snap) in entries {
            tx.execute(
                "INSERT INTO snapshots (guid, data, timestamp, tries, etag, mime) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![guid, snap.data, snap.timestamp, snap.tries, snap.etag, snap.mime],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn get_guids(&self) -> Result<HashSet<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT DISTINCT guid FROM snapshots")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

    fn flushdb(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM snapshots", [])?;
        self.staging.lock().unwrap().clear();
        Ok(())
    }

    fn copy_temp_to_permanent(&self, delete: bool) -> Result<()> {
        let mut staging = self.staging.lock().unwrap();
        if staging.is_empty() {
            return Ok(());
        }

        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        for (guid, snap) in staging.iter() {
            tx.execute(
                "INSERT OR REPLACE INTO snapshots (guid, data, timestamp, tries, etag, mime)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![guid, snap.data, snap.timestamp, snap.tries, snap.etag, snap.mime],
            )?;
        }
        tx.commit()?;

        if delete {
            staging.clear();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(data: &str, ts: i64, tries: u32) -> Snapshot {
        Snapshot {
            data: data.as_bytes().to_vec(),
            timestamp: ts,
            tries,
            etag: String::new(),
            mime: "text/plain".to_string(),
        }
    }

    #[test]
    fn test_save_then_promote_then_load() {
        let store = SqliteSnapshotStore::open_in_memory().unwrap();
        store.save("g1", snap("hello", 100, 0)).unwrap();
        assert!(store.load("g1").unwrap().is_none());
        store.copy_temp_to_permanent(true).unwrap();
        let loaded = store.load("g1").unwrap().unwrap();
        assert_eq!(loaded.data, b"hello");
    }

    #[test]
    fn test_load_prefers_tries_zero() {
        let store = SqliteSnapshotStore::open_in_memory().unwrap();
        store.save("g1", snap("good", 100, 0)).unwrap();
        store.save("g1", snap("good", 200, 1)).unwrap();
        store.copy_temp_to_permanent(true).unwrap();
        let loaded = store.load("g1").unwrap().unwrap();
        assert_eq!(loaded.data, b"good");
        assert_eq!(loaded.tries, 0);
    }

    #[test]
    fn test_history_data_dedup_and_ordering() {
        let store = SqliteSnapshotStore::open_in_memory().unwrap();
        store.save("g1", snap("a", 100, 0)).unwrap();
        store.save("g1", snap("b", 200, 0)).unwrap();
        store.save("g1", snap("a", 300, 0)).unwrap();
        store.copy_temp_to_permanent(true).unwrap();

        let history = store.get_history_data("g1", None).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].0, b"a");
        assert_eq!(history[1].0, b"b");
    }

    #[test]
    fn test_clean_retains_newest_n() {
        let store = SqliteSnapshotStore::open_in_memory().unwrap();
        for i in 0..5 {
            store
                .save("g1", snap(&format!("v{i}"), 100 + i, 0))
                .unwrap();
        }
        store.copy_temp_to_permanent(true).unwrap();

        let deleted = store.clean("g1", 2).unwrap();
        assert_eq!(deleted, 3);
        let remaining = store.get_history_snapshots("g1", None).unwrap();
        assert_eq!(remaining.len(), 2);
        assert_eq!(remaining[0].data, b"v4");
        assert_eq!(remaining[1].data, b"v3");
    }

    #[test]
    fn test_rollback_drops_newer_snapshots() {
        let store = SqliteSnapshotStore::open_in_memory().unwrap();
        store.save("g1", snap("old", 100, 0)).unwrap();
        store.save("g1", snap("new", 200, 0)).unwrap();
        store.copy_temp_to_permanent(true).unwrap();

        let deleted = store.rollback(100).unwrap();
        assert_eq!(deleted, 1);
        let loaded = store.load("g1").unwrap().unwrap();
        assert_eq!(loaded.data, b"old");
    }

    #[test]
    fn test_move_preserves_count_and_merges_history() {
        let store = SqliteSnapshotStore::open_in_memory().unwrap();
        store.save("old", snap("a", 100, 0)).unwrap();
        store.save("old", snap("b", 200, 0)).unwrap();
        store.copy_temp_to_permanent(true).unwrap();

        let moved = store.move_guid("old", "new").unwrap();
        assert_eq!(moved, 2);
        assert!(store.get_history_data("old", None).unwrap().is_empty());
        assert_eq!(store.get_history_data("new", None).unwrap().len(), 2);
    }

    #[test]
    fn test_gc_drops_unknown_fingerprints() {
        let store = SqliteSnapshotStore::open_in_memory().unwrap();
        store.save("a", snap("1", 100, 0)).unwrap();
        store.save("b", snap("1", 100, 0)).unwrap();
        store.save("c", snap("1", 100, 0)).unwrap();
        store.copy_temp_to_permanent(true).unwrap();

        let known: HashSet<String> = ["a".to_string(), "b".to_string()].into_iter().collect();
        let dropped = store.gc(&known, 1).unwrap();
        assert_eq!(dropped, vec!["c".to_string()]);
        assert_eq!(store.get_guids().unwrap(), known);
    }

    #[test]
    fn test_backup_restore_roundtrip() {
        let store = SqliteSnapshotStore::open_in_memory().unwrap();
        store.save("a", snap("1", 100, 0)).unwrap();
        store.save("b", snap("2", 200, 0)).unwrap();
        store.copy_temp_to_permanent(true).unwrap();

        let dump = store.backup().unwrap();

        let restored = SqliteSnapshotStore::open_in_memory().unwrap();
        restored.restore(dump.clone()).unwrap();
        let redump = restored.backup().unwrap();
        assert_eq!(dump, redump);
    }

    #[test]
    fn test_delete_latest() {
        let store = SqliteSnapshotStore::open_in_memory().unwrap();
        store.save("a", snap("1", 100, 0)).unwrap();
        store.save("a", snap("2", 200, 0)).unwrap();
        store.copy_temp_to_permanent(true).unwrap();

        let deleted = store.delete_latest("a", 1).unwrap();
        assert_eq!(deleted, 1);
        let loaded = store.load("a").unwrap().unwrap();
        assert_eq!(loaded.data, b"1");
    }
}
