use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::storage::{SlotGeometry, SlotId, SlotStorage, StorageError, check_bounds};
use crate::{ERASED_BYTE, SCAN_BLOCK_SIZE};

/// A storage slot persisted in a host file of exactly `capacity` bytes.
///
/// Writes overwrite in place; unlike [`MemorySlot`](crate::MemorySlot) no
/// flash bit semantics are modeled.
pub struct FileSlot {
    id: SlotId,
    path: PathBuf,
    file: File,
    capacity: usize,
}

impl FileSlot {
    /// Opens or creates the slot file at `path`.
    ///
    /// A missing file is created erased. A shorter file is padded with the
    /// erased value, a longer one is truncated.
    pub fn open(path: &Path, id: SlotId, capacity: usize) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let len = file.metadata()?.len() as usize;
        if len < capacity {
            file.seek(SeekFrom::Start(len as u64))?;
            fill_erased(&mut file, capacity - len)?;
            tracing::debug!(path = %path.display(), padded = capacity - len, "slot file padded");
        } else if len > capacity {
            tracing::warn!(
                path = %path.display(),
                len,
                capacity,
                "slot file larger than slot, truncating"
            );
            file.set_len(capacity as u64)?;
        }

        Ok(Self {
            id,
            path: path.to_path_buf(),
            file,
            capacity,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn check_slot(&self, slot: SlotId) -> Result<(), StorageError> {
        if slot == self.id {
            Ok(())
        } else {
            Err(StorageError::UnknownSlot(slot))
        }
    }
}

fn fill_erased(file: &mut File, mut len: usize) -> std::io::Result<()> {
    let block = [ERASED_BYTE; SCAN_BLOCK_SIZE];
    while len > 0 {
        let n = len.min(block.len());
        file.write_all(&block[..n])?;
        len -= n;
    }
    file.flush()
}

impl SlotStorage for FileSlot {
    fn geometry(&self, slot: SlotId) -> Result<SlotGeometry, StorageError> {
        self.check_slot(slot)?;
        Ok(SlotGeometry {
            base_address: 0,
            capacity: self.capacity,
        })
    }

    fn read(&mut self, slot: SlotId, offset: usize, buf: &mut [u8]) -> Result<(), StorageError> {
        self.check_slot(slot)?;
        check_bounds(offset, buf.len(), self.capacity)?;
        self.file.seek(SeekFrom::Start(offset as u64))?;
        self.file.read_exact(buf)?;
        Ok(())
    }

    fn write(&mut self, slot: SlotId, offset: usize, data: &[u8]) -> Result<(), StorageError> {
        self.check_slot(slot)?;
        check_bounds(offset, data.len(), self.capacity)?;
        self.file.seek(SeekFrom::Start(offset as u64))?;
        self.file.write_all(data)?;
        self.file.flush()?;
        Ok(())
    }

    fn erase(&mut self, slot: SlotId) -> Result<(), StorageError> {
        self.check_slot(slot)?;
        self.file.seek(SeekFrom::Start(0))?;
        fill_erased(&mut self.file, self.capacity)?;
        Ok(())
    }
}
