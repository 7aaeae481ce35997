//! File-backed page storage.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use parking_lot::Mutex;

use super::{PAGE_SIZE, PageId, Storage, StorageError};

/// Page storage backed by a single file.
///
/// Page `n` lives at byte offset `n * PAGE_SIZE`. The file handle sits
/// behind a mutex; seeks and transfers happen under the lock so that a
/// read never observes another call's seek position.
pub struct FileStorage {
    file: Mutex<File>,
    page_count: Mutex<u64>,
}

impl FileStorage {
    /// Opens (or creates) a storage file.
    ///
    /// An existing file must contain a whole number of pages.
    pub fn open(path: impl AsRef<Path>) -> Result<FileStorage, StorageError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        let len = file.metadata()?.len();
        if len % PAGE_SIZE as u64 != 0 {
            return Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("file length {} is not a multiple of the page size", len),
            )));
        }
        Ok(FileStorage {
            file: Mutex::new(file),
            page_count: Mutex::new(len / PAGE_SIZE as u64),
        })
    }

    fn check_page(&self, page_id: PageId) -> Result<(), StorageError> {
        if u64::from(page_id.page_num()) >= *self.page_count.lock() {
            return Err(StorageError::PageNotFound(page_id));
        }
        Ok(())
    }
}

impl Storage for FileStorage {
    fn read_page(&self, page_id: PageId, buf: &mut [u8]) -> Result<(), StorageError> {
        if buf.len() != PAGE_SIZE {
            return Err(StorageError::InvalidBufferSize {
                expected: PAGE_SIZE,
                actual: buf.len(),
            });
        }
        self.check_page(page_id)?;
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(
            u64::from(page_id.page_num()) * PAGE_SIZE as u64,
        ))?;
        file.read_exact(buf)?;
        Ok(())
    }

    fn write_page(&self, page_id: PageId, buf: &[u8]) -> Result<(), StorageError> {
        if buf.len() != PAGE_SIZE {
            return Err(StorageError::InvalidBufferSize {
                expected: PAGE_SIZE,
                actual: buf.len(),
            });
        }
        self.check_page(page_id)?;
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(
            u64::from(page_id.page_num()) * PAGE_SIZE as u64,
        ))?;
        file.write_all(buf)?;
        Ok(())
    }

    fn allocate_page(&self) -> Result<PageId, StorageError> {
        let mut count = self.page_count.lock();
        let page_id = PageId::new(*count as u32);
        let zeros = [0u8; PAGE_SIZE];
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(*count * PAGE_SIZE as u64))?;
        file.write_all(&zeros)?;
        *count += 1;
        Ok(page_id)
    }

    fn page_count(&self) -> u64 {
        *self.page_count.lock()
    }

    fn sync_all(&self) -> Result<(), StorageError> {
        self.file.lock().sync_all()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::tests::exercise_backend;

    #[test]
    fn test_file_backend() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::open(dir.path().join("pages.db")).unwrap();
        exercise_backend(&storage);
    }

    #[test]
    fn test_reopen_preserves_pages() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pages.db");

        let p0;
        {
            let storage = FileStorage::open(&path).unwrap();
            p0 = storage.allocate_page().unwrap();
            let mut buf = [0u8; PAGE_SIZE];
            buf[7] = 0x42;
            storage.write_page(p0, &buf).unwrap();
            storage.sync_all().unwrap();
        }

        let storage = FileStorage::open(&path).unwrap();
        assert_eq!(storage.page_count(), 1);
        let mut out = [0u8; PAGE_SIZE];
        storage.read_page(p0, &mut out).unwrap();
        assert_eq!(out[7], 0x42);
    }
}
