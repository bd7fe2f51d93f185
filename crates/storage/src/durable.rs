//! Durable engine backed by an append-only operation log.
//!
//! Record format: `op:u8, key_len:u32, key, (value_len:u32, value if op=PUT)`.
//! Every mutation appends and flushes; opening replays the log into an
//! ordered in-memory map, so the latest value per key wins and deletions drop
//! the entry.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::debug;

use crate::api::{StoreEngine, WriteBatch};
use crate::error::StoreError;

const OP_PUT: u8 = 1;
const OP_DELETE: u8 = 2;

struct Inner {
    map: BTreeMap<Vec<u8>, Vec<u8>>,
    log: BufWriter<File>,
}

/// Append-only-log store. All state fits in memory; the log is the source of
/// truth across restarts.
pub struct LogStore {
    path: PathBuf,
    inner: Mutex<Inner>,
}

impl LogStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let map = match File::open(&path) {
            Ok(file) => replay(BufReader::new(file))?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => return Err(err.into()),
        };
        debug!(path = %path.display(), entries = map.len(), "replayed durable log");

        let log = BufWriter::new(OpenOptions::new().create(true).append(true).open(&path)?);
        Ok(Self {
            path,
            inner: Mutex::new(Inner { map, log }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner>, StoreError> {
        self.inner
            .lock()
            .map_err(|err| StoreError::LockPoisoned(err.to_string()))
    }
}

fn replay(mut reader: impl Read) -> Result<BTreeMap<Vec<u8>, Vec<u8>>, StoreError> {
    let mut map = BTreeMap::new();
    loop {
        let mut op = [0u8; 1];
        match reader.read_exact(&mut op) {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(err) => return Err(err.into()),
        }

        let key = read_len_prefixed(&mut reader)?;
        match op[0] {
            OP_PUT => {
                let value = read_len_prefixed(&mut reader)?;
                map.insert(key, value);
            }
            OP_DELETE => {
                map.remove(&key);
            }
            other => {
                return Err(StoreError::CorruptLog(format!("unknown op byte {other}")));
            }
        }
    }
    Ok(map)
}

fn read_len_prefixed(reader: &mut impl Read) -> Result<Vec<u8>, StoreError> {
    let mut len = [0u8; 4];
    reader.read_exact(&mut len)?;
    let len = u32::from_be_bytes(len) as usize;
    let mut data = vec![0u8; len];
    reader.read_exact(&mut data)?;
    Ok(data)
}

fn append_record(
    log: &mut BufWriter<File>,
    op: u8,
    key: &[u8],
    value: Option<&[u8]>,
) -> Result<(), StoreError> {
    log.write_all(&[op])?;
    log.write_all(&(key.len() as u32).to_be_bytes())?;
    log.write_all(key)?;
    if let Some(value) = value {
        log.write_all(&(value.len() as u32).to_be_bytes())?;
        log.write_all(value)?;
    }
    Ok(())
}

impl StoreEngine for LogStore {
    fn put(&self, key: Vec<u8>, value: Vec<u8>) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        append_record(&mut inner.log, OP_PUT, &key, Some(&value))?;
        inner.log.flush()?;
        inner.map.insert(key, value);
        Ok(())
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.lock()?.map.get(key).cloned())
    }

    fn delete(&self, key: &[u8]) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        if inner.map.remove(key).is_some() {
            append_record(&mut inner.log, OP_DELETE, key, None)?;
            inner.log.flush()?;
        }
        Ok(())
    }

    fn exists(&self, key: &[u8]) -> Result<bool, StoreError> {
        Ok(self.lock()?.map.contains_key(key))
    }

    fn write_batch(&self, batch: WriteBatch) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        for (key, value) in batch.puts {
            append_record(&mut inner.log, OP_PUT, &key, Some(&value))?;
            inner.map.insert(key, value);
        }
        for key in batch.deletes {
            if inner.map.remove(&key).is_some() {
                append_record(&mut inner.log, OP_DELETE, &key, None)?;
            }
        }
        inner.log.flush()?;
        Ok(())
    }

    fn iter_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .map
            .range(prefix.to_vec()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect())
    }
}
