use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};

use super::{Snapshot, SnapshotStore};

/// A directory-per-guid backing (§4.3, §10.3): cheap to inspect or export
/// with ordinary file tools, but holds only the single most recent snapshot
/// per fingerprint — there is no history beyond "current". `save` overwrites
/// the guid's file directly (no staging area; `copy_temp_to_permanent` is a
/// no-op, matching the "interchangeable backings" note in §4.3).
pub struct TextfileSnapshotStore {
    dir: PathBuf,
    lock: Mutex<()>,
}

#[derive(serde::Serialize, serde::Deserialize)]
struct TextfileRecord {
    data: Vec<u8>,
    timestamp: i64,
    tries: u32,
    etag: String,
    mime: String,
}

impl TextfileSnapshotStore {
    pub fn open(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create snapshot directory {}", dir.display()))?;
        Ok(Self {
            dir: dir.to_path_buf(),
            lock: Mutex::new(()),
        })
    }

    fn path_for(&self, guid: &str) -> PathBuf {
        self.dir.join(format!("{guid}.json"))
    }

    fn read(&self, guid: &str) -> Result<Option<Snapshot>> {
        let path = self.path_for(guid);
        if !path.exists() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let record: TextfileRecord = serde_json::from_str(&text)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(Some(Snapshot {
            data: record.data,
            timestamp: record.timestamp,
            tries: record.tries,
            etag: record.etag,
            mime: record.mime,
        }))
    }
}

impl SnapshotStore for TextfileSnapshotStore {
    fn load(&self, guid: &str) -> Result<Option<Snapshot>> {
        self.read(guid)
    }

    fn save(&self, guid: &str, snapshot: Snapshot) -> Result<()> {
        let _lock = self.lock.lock().unwrap();
        let record = TextfileRecord {
            data: snapshot.data,
            timestamp: snapshot.timestamp,
            tries: snapshot.tries,
            etag: snapshot.etag,
            mime: snapshot.mime,
        };
        let text = serde_json::to_string(&record)?;
        crate::util::fs::atomic_write(&self.path_for(guid), &text)
    }

    fn get_history_data(&self, guid: &str, count: Option<usize>) -> Result<Vec<(Vec<u8>, i64)>> {
        match (self.read(guid)?, count) {
            (Some(s), Some(0)) => {
                let _ = s;
                Ok(Vec::new())
            }
            (Some(s), _) => Ok(vec![(s.data, s.timestamp)]),
            (None, _) => Ok(Vec::new()),
        }
    }

    fn get_history_snapshots(&self, guid: &str, count: Option<usize>) -> Result<Vec<Snapshot>> {
        match (self.read(guid)?, count) {
            (Some(_), Some(0)) => Ok(Vec::new()),
            (Some(s), _) => Ok(vec![s]),
            (None, _) => Ok(Vec::new()),
        }
    }

    fn delete(&self, guid: &str) -> Result<()> {
        let path = self.path_for(guid);
        if path.exists() {
            std::fs::remove_file(&path)
                .with_context(|| format!("failed to remove {}", path.display()))?;
        }
        Ok(())
    }

    fn delete_latest(&self, guid: &str, n: usize) -> Result<usize> {
        if n == 0 {
            return Ok(0);
        }
        let had = self.read(guid)?.is_some();
        if had {
            self.delete(guid)?;
        }
        Ok(usize::from(had))
    }

    fn clean(&self, guid: &str, retain: usize) -> Result<usize> {
        if retain >= 1 {
            return Ok(0);
        }
        let had = self.read(guid)?.is_some();
        if had {
            self.delete(guid)?;
        }
        Ok(usize::from(had))
    }

    fn gc(&self, known_guids: &HashSet<String>, retain: usize) -> Result<Vec<String>> {
        let mut dropped = Vec::new();
        for guid in self.get_guids()? {
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
        let mut deleted = 0;
        for guid in self.get_guids()? {
            if let Some(s) = self.read(&guid)?
                && s.timestamp > ts
            {
                self.delete(&guid)?;
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    fn move_guid(&self, old_guid: &str, new_guid: &str) -> Result<usize> {
        match self.read(old_guid)? {
            Some(s) => {
                self.save(new_guid, s)?;
                self.delete(old_guid)?;
                Ok(1)
            }
            None => Ok(0),
        }
    }

    fn backup(&self) -> Result<Vec<(String, Snapshot)>> {
        let mut out = Vec::new();
        for guid in self.get_guids()? {
            if let Some(s) = self.read(&guid)? {
                out.push((guid, s));
            }
        }
        out.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(out)
    }

    fn restore(&self, entries: Vec<(String, Snapshot)>) -> Result<()> {
        self.flushdb()?;
        for (guid, snap) in entries {
            self.save(&guid, snap)?;
        }
        Ok(())
    }

    fn get_guids(&self) -> Result<HashSet<String>> {
        let mut out = HashSet::new();
        if !self.dir.exists() {
            return Ok(out);
        }
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            if let Some(name) = entry.path().file_stem().and_then(|s| s.to_str()) {
                out.insert(name.to_string());
            }
        }
        Ok(out)
    }

    fn flushdb(&self) -> Result<()> {
        for guid in self.get_guids()? {
            self.delete(&guid)?;
        }
        Ok(())
    }

    fn copy_temp_to_permanent(&self, _delete: bool) -> Result<()> {
        Ok(())
    }
}
