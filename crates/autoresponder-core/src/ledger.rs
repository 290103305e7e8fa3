// Durable record of reviews that already received a reply.
//
// The on-disk format is one review key per line, append-only, with line
// breaks and backslashes inside a key escaped. The whole file is read once at
// startup; afterwards the in-memory set is authoritative and every new mark
// appends a single record.

use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use tracing::{debug, error, info};

use crate::review::ReviewKey;

struct LedgerState {
    keys: HashSet<String>,
    /// Lazily opened append handle. Reset to `None` after a write error so
    /// the next mark reopens the file.
    writer: Option<File>,
}

/// Set of processed review keys backed by an append-only file.
///
/// A single mutex guards both the set and the file handle, so lookups, marks
/// and appends from concurrent account tasks never interleave.
pub struct Ledger {
    path: Option<PathBuf>,
    state: Mutex<LedgerState>,
}

impl Ledger {
    /// Load the ledger stored at `path`.
    ///
    /// A missing file is a fresh start. Any other read failure is logged and
    /// the ledger starts empty: replies may be duplicated until the file is
    /// readable again, but processing is never blocked.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let keys = match read_keys(&path) {
            Ok(keys) => {
                info!("Loaded {} processed review(s) from {}", keys.len(), path.display());
                keys
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!("No ledger at {}, starting empty", path.display());
                HashSet::new()
            }
            Err(e) => {
                error!(
                    "Failed to read ledger {}: {}; continuing with an empty ledger",
                    path.display(),
                    e
                );
                HashSet::new()
            }
        };

        Self {
            path: Some(path),
            state: Mutex::new(LedgerState { keys, writer: None }),
        }
    }

    /// A ledger without durable storage.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            state: Mutex::new(LedgerState {
                keys: HashSet::new(),
                writer: None,
            }),
        }
    }

    /// Acquire the ledger state.
    ///
    /// Panics if the mutex is poisoned (another thread panicked while
    /// holding the lock). This should never happen in normal operation.
    fn state(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().expect("ledger mutex poisoned")
    }

    pub fn contains(&self, key: &ReviewKey) -> bool {
        self.state().keys.contains(key.as_str())
    }

    /// Record `key` as processed. Returns `true` if it was not present yet.
    ///
    /// The in-memory mark is kept even if the append fails; the failure is
    /// only logged.
    pub fn mark_processed(&self, key: &ReviewKey) -> bool {
        let mut state = self.state();
        if !state.keys.insert(key.as_str().to_string()) {
            debug!(key = %key, "already in ledger");
            return false;
        }

        if let Some(path) = &self.path {
            if let Err(e) = append_record(&mut state, path, key) {
                state.writer = None;
                error!(
                    key = %key,
                    "Failed to persist ledger record to {}: {}",
                    path.display(),
                    e
                );
            }
        }
        true
    }

    pub fn len(&self) -> usize {
        self.state().keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state().keys.is_empty()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

fn read_keys(path: &Path) -> io::Result<HashSet<String>> {
    let file = File::open(path)?;
    let mut keys = HashSet::new();
    for line in BufReader::new(file).lines() {
        let line = line?;
        // Keys always carry a `marketplace:account:` prefix, so a blank
        // line is never a record. Other whitespace is part of the key.
        if line.trim().is_empty() {
            continue;
        }
        keys.insert(decode_record(&line));
    }
    Ok(keys)
}

/// Escape `\\`, `\n` and `\r` so every key occupies exactly one line.
fn encode_record(key: &str) -> String {
    let mut record = String::with_capacity(key.len());
    for c in key.chars() {
        match c {
            '\\' => record.push_str("\\\\"),
            '\n' => record.push_str("\\n"),
            '\r' => record.push_str("\\r"),
            c => record.push(c),
        }
    }
    record
}

fn decode_record(record: &str) -> String {
    let mut key = String::with_capacity(record.len());
    let mut chars = record.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            key.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => key.push('\n'),
            Some('r') => key.push('\r'),
            Some(other) => key.push(other),
            None => key.push('\\'),
        }
    }
    key
}

fn append_record(state: &mut LedgerState, path: &Path, key: &ReviewKey) -> io::Result<()> {
    if state.writer.is_none() {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        state.writer = Some(file);
    }

    if let Some(writer) = state.writer.as_mut() {
        writeln!(writer, "{}", encode_record(key.as_str()))?;
        writer.flush()?;
    }
    Ok(())
}
