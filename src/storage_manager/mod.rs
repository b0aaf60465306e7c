//! The Storage Manager: a fixed-size page abstraction over a single on-disk
//! file (spec §6.1). This layer knows nothing about pinning or caching; it
//! is a thin, synchronous wrapper around a `std::fs::File`.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Page numbers are plain signed integers so the `NO_PAGE` sentinel fits in
/// the same type as a real page address, matching the source encoding.
pub type PageNumber = i64;

/// Sentinel meaning "no page" / "empty frame".
pub const NO_PAGE: PageNumber = -1;

/// Size in bytes of a single page.
pub const PAGE_SIZE: usize = 4096;

/// Handle over an open page file: `(file_name, total_pages, current_position)`
/// per spec §6.1.
pub struct StorageManager {
    file_name: PathBuf,
    file: File,
    current_position: u64,
}

impl StorageManager {
    /// Creates a new, empty page file containing a single zero-filled page
    /// (`original_source/storage_manager/storage_mgr.c`'s `createPageFile`).
    /// Out of scope for `init`/`open` per spec §4.5; callers invoke this
    /// explicitly before opening a pool against a fresh file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file already exists or cannot be
    /// written.
    pub fn create(file_name: impl AsRef<Path>) -> Result<()> {
        let file_name = file_name.as_ref();
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(file_name)?;
        file.write_all(&[0u8; PAGE_SIZE])?;
        file.sync_all()?;
        Ok(())
    }

    /// Removes a page file from disk (`destroyPageFile`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file does not exist or cannot be
    /// removed.
    pub fn destroy(file_name: impl AsRef<Path>) -> Result<()> {
        std::fs::remove_file(file_name).map_err(Error::Io)
    }

    /// Opens an existing page file. Unlike the teacher's `DiskManager::new`,
    /// this does *not* create the file: spec §4.5 requires `init` to fail
    /// with `FileNotFound` if the file is missing, so the existence check
    /// happens here rather than falling through to `OpenOptions::create`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FileNotFound`] if `file_name` does not exist, or
    /// [`Error::Io`] if it exists but cannot be opened.
    pub fn open(file_name: impl AsRef<Path>) -> Result<Self> {
        let file_name = file_name.as_ref();
        if !file_name.exists() {
            return Err(Error::FileNotFound(file_name.display().to_string()));
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(file_name)?;
        Ok(Self {
            file_name: file_name.to_path_buf(),
            file,
            current_position: 0,
        })
    }

    /// Closes the handle. Nothing further may be done with `self` once this
    /// returns; dropping without calling `close` flushes on `Drop` as a
    /// safety net but does not report errors.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the final sync fails.
    pub fn close(mut self) -> Result<()> {
        self.file.sync_all().map_err(Error::Io)
    }

    /// Path to the backing file.
    #[must_use]
    pub fn file_name(&self) -> &Path {
        &self.file_name
    }

    /// Total number of pages currently in the file, derived from file size.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file's metadata cannot be read.
    pub fn total_pages(&self) -> Result<PageNumber> {
        let len = self.file.metadata()?.len();
        Ok((len / PAGE_SIZE as u64) as PageNumber)
    }

    /// Byte offset last sought to, tracked purely for introspection; not
    /// relied on by the buffer manager.
    #[must_use]
    pub fn current_position(&self) -> u64 {
        self.current_position
    }

    /// Reads page `page_num` into `buf`, which must be exactly
    /// [`PAGE_SIZE`] bytes. Fails with [`Error::ReadNonExistingPage`] if the
    /// page is beyond the file's current extent; callers that want a
    /// growing read should call [`Self::ensure_capacity`] first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ReadNonExistingPage`] or [`Error::Io`].
    pub fn read_block(&mut self, page_num: PageNumber, buf: &mut [u8; PAGE_SIZE]) -> Result<()> {
        let offset = page_num as u64 * PAGE_SIZE as u64;
        self.current_position = offset;
        self.file.seek(SeekFrom::Start(offset))?;
        match self.file.read_exact(buf) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                Err(Error::ReadNonExistingPage(page_num))
            }
            Err(e) => Err(Error::Io(e)),
        }
    }

    /// Writes `buf` to page `page_num`, growing the file if necessary.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WriteFailed`] if the write does not complete.
    pub fn write_block(&mut self, page_num: PageNumber, buf: &[u8; PAGE_SIZE]) -> Result<()> {
        let offset = page_num as u64 * PAGE_SIZE as u64;
        self.current_position = offset;
        self.file
            .seek(SeekFrom::Start(offset))
            .map_err(|e| Error::WriteFailed(e.to_string()))?;
        self.file
            .write_all(buf)
            .map_err(|e| Error::WriteFailed(e.to_string()))?;
        Ok(())
    }

    /// Appends a single zero-filled page to the end of the file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be extended.
    pub fn append_block(&mut self) -> Result<PageNumber> {
        let total = self.total_pages()?;
        let new_len = (total as u64 + 1) * PAGE_SIZE as u64;
        self.file.set_len(new_len)?;
        Ok(total)
    }

    /// Ensures the file holds at least `num_pages` pages, growing it with
    /// zero-filled pages as needed. Used by [`Self::read_block`]'s caller
    /// (the buffer manager's `Load`) to satisfy spec §4.2's "ensure
    /// capacity ≥ page_num + 1, grow with zero-filled pages if short".
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be extended.
    pub fn ensure_capacity(&mut self, num_pages: PageNumber) -> Result<()> {
        let current = self.total_pages()?;
        if current >= num_pages {
            return Ok(());
        }
        let new_len = num_pages as u64 * PAGE_SIZE as u64;
        self.file.set_len(new_len)?;
        Ok(())
    }
}

impl Drop for StorageManager {
    fn drop(&mut self) {
        let _ = self.file.sync_all();
    }
}
