// Copyright (c) 2018-2025 The Botho Foundation

//! Crash-recoverable write-ahead log (spec.md §4.4, §6 `WAL`) and the bounded
//! in-memory [`history::HistoryRing`].
//!
//! `FileWal` is an append-only, length-prefixed `bincode` record stream,
//! grounded on `botho::commands::send::load_pending_txs`'s use of
//! `bincode::serialize`/`deserialize` for `pending_txs.bin`. spec.md
//! explicitly places "the WAL byte format" out of scope; this flat-file
//! encoding exists to give the crate a buildable default, not to prescribe
//! one.

pub mod error;
pub mod history;

use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{info, instrument};

pub use error::{WalError, WalResult};
pub use history::HistoryRing;
use sp_types::ports::Wal;
use sp_types::wal::WalEntry;

/// Append-only, length-prefixed `bincode` record file.
///
/// Each record is `[8-byte BE length][bincode(WalEntry)]`. Readers iterate
/// records in file order, which is write order, which is `sequence` order.
pub struct FileWal {
    path: PathBuf,
    file: Mutex<std::fs::File>,
    next_sequence: AtomicU64,
}

impl FileWal {
    /// Open (creating if necessary) the WAL file at `path`, scanning it once
    /// to determine the next sequence number.
    pub fn open(path: impl AsRef<Path>) -> WalResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = std::fs::OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)?;

        let existing = Self::scan(&path)?;
        let next_sequence = existing.last().map(|e| e.sequence + 1).unwrap_or(0);

        Ok(Self {
            path,
            file: Mutex::new(file),
            next_sequence: AtomicU64::new(next_sequence),
        })
    }

    fn scan(path: &Path) -> WalResult<Vec<WalEntry>> {
        let mut file = match std::fs::File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut entries = Vec::new();
        let mut offset = 0u64;
        loop {
            let mut len_buf = [0u8; 8];
            match file.read_exact(&mut len_buf) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e.into()),
            }
            let len = u64::from_be_bytes(len_buf);
            let mut payload = vec![0u8; len as usize];
            file.read_exact(&mut payload)
                .map_err(|e| WalError::Corrupt(offset, e.to_string()))?;
            let entry: WalEntry = bincode::deserialize(&payload)?;
            offset += 8 + len;
            entries.push(entry);
        }
        Ok(entries)
    }

    fn append_sync(file: &mut std::fs::File, entry: &WalEntry) -> WalResult<()> {
        let payload = bincode::serialize(entry)?;
        file.write_all(&(payload.len() as u64).to_be_bytes())?;
        file.write_all(&payload)?;
        file.flush()?;
        Ok(())
    }

    /// Next sequence number this WAL will assign.
    pub fn next_sequence(&self) -> u64 {
        self.next_sequence.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Wal for FileWal {
    #[instrument(skip(self, entry))]
    async fn write_entry(&self, mut entry: WalEntry) -> anyhow::Result<()> {
        entry.sequence = self.next_sequence.fetch_add(1, Ordering::SeqCst);
        let mut file = self.file.lock();
        Self::append_sync(&mut file, &entry).map_err(Into::into)
    }

    #[instrument(skip(self))]
    async fn read_entries(&self, from: u64) -> anyhow::Result<Vec<WalEntry>> {
        let entries = Self::scan(&self.path)?;
        Ok(entries.into_iter().filter(|e| e.sequence >= from).collect())
    }

    async fn close(&self) -> anyhow::Result<()> {
        info!(path = %self.path.display(), "closing WAL");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sp_types::wal::WalEntryKind;

    fn entry(slot: u64, kind: WalEntryKind) -> WalEntry {
        WalEntry {
            sequence: 0,
            slot,
            kind,
            data: vec![1, 2, 3],
            timestamp_ms: 0,
        }
    }

    #[tokio::test]
    async fn sequence_numbers_are_assigned_and_monotonic() {
        let dir = tempfile::tempdir().unwrap();
        let wal = FileWal::open(dir.path().join("wal.log")).unwrap();

        wal.write_entry(entry(1, WalEntryKind::SlotSnapshot))
            .await
            .unwrap();
        wal.write_entry(entry(2, WalEntryKind::SlotSnapshot))
            .await
            .unwrap();

        let entries = wal.read_entries(0).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].sequence, 0);
        assert_eq!(entries[1].sequence, 1);
    }

    #[tokio::test]
    async fn recovery_rescans_existing_file_and_continues_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wal.log");

        {
            let wal = FileWal::open(&path).unwrap();
            wal.write_entry(entry(1, WalEntryKind::SlotSnapshot))
                .await
                .unwrap();
        }

        let wal = FileWal::open(&path).unwrap();
        assert_eq!(wal.next_sequence(), 1);
        wal.write_entry(entry(2, WalEntryKind::Rollback))
            .await
            .unwrap();
        let entries = wal.read_entries(0).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].sequence, 1);
        assert_eq!(entries[1].kind, WalEntryKind::Rollback);
    }

    #[tokio::test]
    async fn read_entries_filters_by_from() {
        let dir = tempfile::tempdir().unwrap();
        let wal = FileWal::open(dir.path().join("wal.log")).unwrap();
        for slot in 1..=5 {
            wal.write_entry(entry(slot, WalEntryKind::SlotSnapshot))
                .await
                .unwrap();
        }
        let entries = wal.read_entries(3).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].sequence, 3);
    }
}
