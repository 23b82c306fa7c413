// crates/trustplane-core/src/runtime/store.rs
// ============================================================================
// Module: Trustplane EPACK Sinks
// Description: In-memory and append-only JSONL EPACK persistence.
// Purpose: Provide the default EpackSink implementations.
// Dependencies: crate::{core, interfaces}, serde_json
// ============================================================================

//! ## Overview
//! The JSONL sink writes one canonical-JSON record per line in sequence
//! order, so a reader can verify any prefix independently. Lines are matched
//! back to a session via the payload's `session_id`, which redaction keeps
//! resolvable by comparing against the requested id's hash.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::BufRead;
use std::io::BufReader;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Mutex;

use serde_json::Value;

use crate::core::epack::EpackRecord;
use crate::core::hashing::DEFAULT_HASH_ALGORITHM;
use crate::core::hashing::canonical_json_bytes;
use crate::core::hashing::hash_text;
use crate::interfaces::EpackSink;
use crate::interfaces::SinkError;

// ============================================================================
// SECTION: In-Memory Sink
// ============================================================================

/// Concurrent-safe in-memory EPACK sink.
#[derive(Debug, Default)]
pub struct MemoryEpackSink {
    /// Records per session, in append order.
    records: Mutex<BTreeMap<String, Vec<EpackRecord>>>,
}

impl MemoryEpackSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl EpackSink for MemoryEpackSink {
    fn append(&self, session_id: &str, record: &EpackRecord) -> Result<(), SinkError> {
        let mut records =
            self.records.lock().map_err(|_| SinkError::Io("sink lock poisoned".into()))?;
        records.entry(session_id.to_string()).or_default().push(record.clone());
        Ok(())
    }

    fn records(&self, session_id: &str) -> Result<Vec<EpackRecord>, SinkError> {
        let records =
            self.records.lock().map_err(|_| SinkError::Io("sink lock poisoned".into()))?;
        Ok(records.get(session_id).cloned().unwrap_or_default())
    }

    fn last_seq(&self, session_id: &str) -> Result<u64, SinkError> {
        Ok(self.records(session_id)?.last().map_or(0, |record| record.seq))
    }
}

// ============================================================================
// SECTION: JSONL Sink
// ============================================================================

/// Append-only newline-delimited JSON EPACK sink.
#[derive(Debug)]
pub struct JsonlEpackSink {
    /// Ledger file path.
    path: PathBuf,
    /// Serializes appends so each record lands atomically.
    write_lock: Mutex<()>,
}

impl JsonlEpackSink {
    /// Creates a sink appending to the given ledger path.
    #[must_use]
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    /// Ledger file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a persisted record belongs to the session.
    ///
    /// Matches the payload's `session_id` either as plaintext or as its
    /// redaction marker (`{"_redacted": true, "sha256": hash(session_id)}`).
    fn matches_session(record: &EpackRecord, session_id: &str) -> bool {
        match record.payload.get("session_id") {
            Some(Value::String(stored)) => stored == session_id,
            Some(Value::Object(marker)) => marker
                .get("sha256")
                .and_then(Value::as_str)
                .is_some_and(|stored| stored == hash_text(DEFAULT_HASH_ALGORITHM, session_id)),
            _ => false,
        }
    }

    /// Reads every persisted record, skipping unparsable lines.
    fn read_all(&self) -> Result<Vec<EpackRecord>, SinkError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let file = std::fs::File::open(&self.path).map_err(|err| SinkError::Io(err.to_string()))?;
        let mut records = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line.map_err(|err| SinkError::Io(err.to_string()))?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            if let Ok(record) = serde_json::from_str::<EpackRecord>(trimmed) {
                records.push(record);
            }
        }
        Ok(records)
    }
}

impl EpackSink for JsonlEpackSink {
    fn append(&self, _session_id: &str, record: &EpackRecord) -> Result<(), SinkError> {
        let bytes =
            canonical_json_bytes(record).map_err(|err| SinkError::Io(err.to_string()))?;
        let _guard =
            self.write_lock.lock().map_err(|_| SinkError::Io("sink lock poisoned".into()))?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|err| SinkError::Io(err.to_string()))?;
            }
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|err| SinkError::Io(err.to_string()))?;
        file.write_all(&bytes).map_err(|err| SinkError::Io(err.to_string()))?;
        file.write_all(b"\n").map_err(|err| SinkError::Io(err.to_string()))?;
        Ok(())
    }

    fn records(&self, session_id: &str) -> Result<Vec<EpackRecord>, SinkError> {
        Ok(self
            .read_all()?
            .into_iter()
            .filter(|record| Self::matches_session(record, session_id))
            .collect())
    }

    fn last_seq(&self, session_id: &str) -> Result<u64, SinkError> {
        Ok(self.records(session_id)?.last().map_or(0, |record| record.seq))
    }
}
