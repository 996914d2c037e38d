use fs2::FileExt;
use serde_json::{Map, Value};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

use super::{dedup_key, DeduplicationStore, DEDUP_NAMESPACE};
use crate::errors::{AppError, AppResult};
use crate::notification::Notification;

/// Durable store backed by a JSON lines file
///
/// Every record is one line, `{"trumpet:<id>": {...}}`, appended under an
/// exclusive lock. Readers take a shared lock and parse only the bytes
/// added since their last look, so several handles on one path see each
/// other's records. A store created or cleared by this type starts with a
/// generation line; when another handle clears the file the first line
/// changes and the cached records are dropped.
///
/// The file and its directory are created on the first record. If an
/// existing file cannot be read or parsed, the store is unavailable: `has`
/// answers false, `mark_seen` does nothing and the file is left untouched.
pub struct FileStore {
    path: PathBuf,
    snapshot: Mutex<Snapshot>,
    available: bool,
}

/// Records read so far and where reading stopped
#[derive(Debug, Default)]
struct Snapshot {
    records: Map<String, Value>,
    first_line: Option<String>,
    offset: u64,
    missing_newline: bool,
}

fn generation_line() -> String {
    format!("{{\"generation\":\"{:016x}\"}}\n", rand::random::<u64>())
}

fn is_record_key(key: &str) -> bool {
    key.strip_prefix(DEDUP_NAMESPACE)
        .is_some_and(|rest| rest.starts_with(':'))
}

impl Snapshot {
    /// Catch up with the file at `path`, under a shared lock
    fn refresh(&mut self, path: &Path) -> AppResult<()> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                *self = Self::default();
                return Ok(());
            }
            Err(e) => return Err(AppError::storage_with_source(path, "open store", e)),
        };

        FileExt::lock_shared(&file)
            .map_err(|e| AppError::storage_with_source(path, "lock store", e))?;
        let result = self.sync(&file, path);
        let _ = FileExt::unlock(&file);
        result
    }

    /// Read what was appended since the last sync; the caller holds a lock
    fn sync(&mut self, file: &File, path: &Path) -> AppResult<()> {
        let read_err = |e: std::io::Error| AppError::storage_with_source(path, "read store", e);

        let len = file.metadata().map_err(read_err)?.len();
        let mut reader = BufReader::new(file);
        reader.seek(SeekFrom::Start(0)).map_err(read_err)?;
        let mut first_line = String::new();
        reader.read_line(&mut first_line).map_err(read_err)?;
        let first_line = (!first_line.is_empty()).then_some(first_line);

        if len < self.offset || first_line != self.first_line {
            *self = Self {
                first_line,
                ..Self::default()
            };
        }
        if len == self.offset {
            return Ok(());
        }

        reader.seek(SeekFrom::Start(self.offset)).map_err(read_err)?;
        let mut line = String::new();
        loop {
            line.clear();
            let read = reader.read_line(&mut line).map_err(read_err)?;
            if read == 0 {
                break;
            }
            self.offset += read as u64;
            self.missing_newline = !line.ends_with('\n');

            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let entry: Map<String, Value> = serde_json::from_str(line)
                .map_err(|e| AppError::storage_with_source(path, "parse store", e))?;
            self.records
                .extend(entry.into_iter().filter(|(key, _)| is_record_key(key)));
        }
        Ok(())
    }

    /// Append `entry` unless its key is already recorded; the caller holds
    /// an exclusive lock on `file`, opened for append
    fn append(&mut self, file: &File, path: &Path, entry: Map<String, Value>) -> AppResult<()> {
        self.sync(file, path)?;
        if entry.keys().all(|key| self.records.contains_key(key)) {
            return Ok(());
        }

        let mut out = String::new();
        if self.offset == 0 {
            out.push_str(&generation_line());
        } else if self.missing_newline {
            out.push('\n');
        }
        out.push_str(&serde_json::to_string(&entry)?);
        out.push('\n');

        let mut writer = file;
        writer
            .write_all(out.as_bytes())
            .map_err(|e| AppError::storage_with_source(path, "append to store", e))?;

        if self.offset == 0 {
            self.first_line = out.lines().next().map(|line| format!("{line}\n"));
        }
        self.offset += out.len() as u64;
        self.missing_newline = false;
        self.records.extend(entry);
        Ok(())
    }
}

impl FileStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut snapshot = Snapshot::default();
        match snapshot.refresh(&path) {
            Ok(()) => {
                debug!(
                    "Opened dedup store {} with {} records",
                    path.display(),
                    snapshot.records.len()
                );
                Self {
                    path,
                    snapshot: Mutex::new(snapshot),
                    available: true,
                }
            }
            Err(e) => {
                warn!("Dedup store unavailable, every notification will be shown: {}", e);
                Self {
                    path,
                    snapshot: Mutex::new(Snapshot::default()),
                    available: false,
                }
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_available(&self) -> bool {
        self.available
    }

    /// Run `f` on an up to date view of the file
    fn with_records<T: Default>(&self, f: impl FnOnce(&Map<String, Value>) -> T) -> T {
        if !self.available {
            return T::default();
        }
        let Ok(mut snapshot) = self.snapshot.lock() else {
            return T::default();
        };
        if let Err(e) = snapshot.refresh(&self.path) {
            warn!("Failed to refresh dedup store: {}", e);
        }
        f(&snapshot.records)
    }

    pub fn len(&self) -> usize {
        self.with_records(Map::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stored keys, `trumpet:<id>`, in the order they were recorded
    pub fn keys(&self) -> Vec<String> {
        self.with_records(|records| records.keys().cloned().collect())
    }

    fn record(&self, id: &str, record: &Notification) -> AppResult<()> {
        let mut entry = Map::new();
        entry.insert(dedup_key(id), serde_json::to_value(record)?);

        let mut snapshot = self
            .snapshot
            .lock()
            .map_err(|_| AppError::internal("dedup store lock poisoned"))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| AppError::storage_with_source(parent, "create store directory", e))?;
        }
        let file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&self.path)
            .map_err(|e| AppError::storage_with_source(&self.path, "open store", e))?;

        FileExt::lock_exclusive(&file)
            .map_err(|e| AppError::storage_with_source(&self.path, "lock store", e))?;
        let result = snapshot.append(&file, &self.path, entry);
        let _ = FileExt::unlock(&file);
        result
    }

    /// Forget every record, including those written by other handles
    pub fn clear(&self) -> AppResult<usize> {
        if !self.available {
            return Err(AppError::Storage {
                path: self.path.clone(),
                operation: "clear unavailable store".to_string(),
                source: None,
            });
        }

        let mut snapshot = self
            .snapshot
            .lock()
            .map_err(|_| AppError::internal("dedup store lock poisoned"))?;

        let file = match OpenOptions::new().read(true).write(true).open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                *snapshot = Snapshot::default();
                return Ok(0);
            }
            Err(e) => return Err(AppError::storage_with_source(&self.path, "open store", e)),
        };

        FileExt::lock_exclusive(&file)
            .map_err(|e| AppError::storage_with_source(&self.path, "lock store", e))?;
        let result = Self::truncate(&file, &self.path, &mut snapshot);
        let _ = FileExt::unlock(&file);
        result
    }

    /// Replace the file content with a fresh generation line
    fn truncate(file: &File, path: &Path, snapshot: &mut Snapshot) -> AppResult<usize> {
        snapshot.sync(file, path)?;
        let removed = snapshot.records.len();

        let write_err = |e: std::io::Error| AppError::storage_with_source(path, "clear store", e);
        let generation = generation_line();
        let mut writer = file;
        writer.set_len(0).map_err(write_err)?;
        writer.seek(SeekFrom::Start(0)).map_err(write_err)?;
        writer.write_all(generation.as_bytes()).map_err(write_err)?;

        *snapshot = Snapshot {
            offset: generation.len() as u64,
            first_line: Some(generation),
            ..Snapshot::default()
        };
        Ok(removed)
    }
}

impl DeduplicationStore for FileStore {
    fn has(&self, id: &str) -> bool {
        let key = dedup_key(id);
        self.with_records(|records| records.contains_key(&key))
    }

    fn mark_seen(&self, id: &str, record: &Notification) {
        if !self.available {
            return;
        }
        if let Err(e) = self.record(id, record) {
            warn!("Failed to record {} as seen: {}", id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::Timestamp;
    use tempfile::TempDir;

    fn notification(id: &str) -> Notification {
        Notification {
            id: id.to_string(),
            title: "hello".to_string(),
            message: "hello".to_string(),
            kind: "info".to_string(),
            timestamp: Timestamp::Number(100.into()),
        }
    }

    fn lines(path: &Path) -> Vec<Value> {
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn test_records_survive_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("seen.jsonl");

        let store = FileStore::open(&path);
        assert!(store.is_available());
        store.mark_seen("n1", &notification("n1"));
        store.mark_seen("n2", &notification("n2"));

        let reopened = FileStore::open(&path);
        assert!(reopened.has("n1"));
        assert!(reopened.has("n2"));
        assert!(!reopened.has("n3"));
        assert_eq!(reopened.keys(), vec!["trumpet:n1", "trumpet:n2"]);

        let on_disk = lines(&path);
        assert!(on_disk[0]["generation"].is_string());
        assert_eq!(on_disk[1]["trumpet:n1"]["message"], "hello");
    }

    #[test]
    fn test_each_mark_appends_one_line() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("seen.jsonl");

        let store = FileStore::open(&path);
        for id in ["n1", "n2", "n3"] {
            store.mark_seen(id, &notification(id));
        }
        store.mark_seen("n1", &notification("n1"));

        let on_disk = lines(&path);
        assert_eq!(on_disk.len(), 4);
        assert_eq!(on_disk[3]["trumpet:n3"]["id"], "n3");
    }

    #[test]
    fn test_two_handles_keep_each_others_records() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("seen.jsonl");

        let first = FileStore::open(&path);
        let second = FileStore::open(&path);
        first.mark_seen("n1", &notification("n1"));
        second.mark_seen("n2", &notification("n2"));

        assert!(first.has("n2"));
        assert!(second.has("n1"));
        assert_eq!(FileStore::open(&path).keys(), vec!["trumpet:n1", "trumpet:n2"]);

        // Already recorded through the other handle, so nothing is appended
        first.mark_seen("n2", &notification("n2"));
        assert_eq!(lines(&path).len(), 3);
    }

    #[test]
    fn test_clear_from_another_handle_sticks() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("seen.jsonl");

        let running = FileStore::open(&path);
        running.mark_seen("old", &notification("old"));

        assert_eq!(FileStore::open(&path).clear().unwrap(), 1);
        running.mark_seen("new", &notification("new"));

        assert!(!running.has("old"));
        assert_eq!(FileStore::open(&path).keys(), vec!["trumpet:new"]);
    }

    #[test]
    fn test_clear_empties_the_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("seen.jsonl");

        let store = FileStore::open(&path);
        store.mark_seen("n1", &notification("n1"));
        assert_eq!(store.clear().unwrap(), 1);
        assert!(!store.has("n1"));
        assert!(FileStore::open(&path).is_empty());
    }

    #[test]
    fn test_reading_creates_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("state");
        let path = dir.join("seen.jsonl");

        let store = FileStore::open(&path);
        assert!(store.is_available());
        assert!(store.keys().is_empty());
        assert!(!store.has("n1"));
        assert_eq!(store.clear().unwrap(), 0);
        assert!(!dir.exists());

        store.mark_seen("n1", &notification("n1"));
        assert!(path.exists());
    }

    #[test]
    fn test_hand_written_record_without_newline_is_extended() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("seen.jsonl");
        fs::write(&path, r#"{"trumpet:n1": {"id": "n1"}}"#).unwrap();

        let store = FileStore::open(&path);
        assert!(store.has("n1"));
        store.mark_seen("n2", &notification("n2"));

        assert_eq!(FileStore::open(&path).keys(), vec!["trumpet:n1", "trumpet:n2"]);
    }

    #[test]
    fn test_corrupt_file_degrades_to_unavailable() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("seen.jsonl");
        fs::write(&path, "not json").unwrap();

        let store = FileStore::open(&path);
        assert!(!store.is_available());
        store.mark_seen("n1", &notification("n1"));
        assert!(!store.has("n1"));
        assert_eq!(fs::read_to_string(&path).unwrap(), "not json");
        assert!(store.clear().is_err());
    }
}
