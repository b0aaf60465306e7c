//! Buffer pool management for page caching (spec §2–§5).
//!
//! This module implements the pinning buffer pool that sits on top of the
//! [`crate::storage_manager`]: frame table, page directory (realised as a
//! linear scan, per the redesign note on small `N`), a pluggable
//! replacement policy, and the flush/shutdown/introspection surface.
//!
//! # Architecture
//!
//! The pool is single-threaded and synchronous: every public method runs to
//! completion before another begins, and no internal locking is used. A
//! caller that needs concurrent access wraps the whole `BufferPoolManager`
//! in a mutex of its own choosing.

mod frame;
mod policy;

pub use frame::PageFrame;
pub use policy::ReplacementStrategy;

use std::path::{Path, PathBuf};

use policy::Policy;

use crate::error::{Error, Result};
use crate::storage_manager::{PageNumber, StorageManager, PAGE_SIZE};

/// Configuration for [`BufferPoolManager::with_config`], mirroring the
/// `init` parameters of spec §4.5.
#[derive(Debug, Clone)]
pub struct BufferPoolConfig {
    /// Path to the backing page file. Must already exist; see
    /// [`StorageManager::create`].
    pub file_name: PathBuf,
    /// Number of frames in the pool (`N`), fixed for the pool's lifetime.
    pub num_frames: usize,
    /// Replacement strategy used for eviction.
    pub strategy: ReplacementStrategy,
}

impl Default for BufferPoolConfig {
    fn default() -> Self {
        Self {
            file_name: PathBuf::from("pages.db"),
            num_frames: 16,
            strategy: ReplacementStrategy::Lru,
        }
    }
}

/// A non-owning reference to a resident, pinned page returned by
/// [`BufferPoolManager::pin`]. Bound in validity to the interval between
/// the `pin` that produced it and the matching `unpin` (spec §5); using it
/// afterwards is rejected defensively with [`Error::PageNotResident`]
/// rather than left undefined, since this is a `Copy` value with no borrow
/// the type system could expire for us.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageHandle {
    page_number: PageNumber,
    frame_index: usize,
}

impl PageHandle {
    /// The page number this handle was issued for.
    #[must_use]
    pub fn page_number(&self) -> PageNumber {
        self.page_number
    }
}

/// Per-pool state, torn down entirely by `shutdown` (spec invariant I7).
struct Inner {
    storage: StorageManager,
    frames: Vec<PageFrame>,
    policy: Policy,
    num_reads: u64,
    num_writes: u64,
}

/// The buffer pool itself: frame table, directory, replacement policy and
/// I/O counters (spec §3's "Buffer Pool" aggregate).
pub struct BufferPoolManager {
    inner: Option<Inner>,
    num_frames: usize,
    strategy: ReplacementStrategy,
}

impl BufferPoolManager {
    /// Initialises a pool of `num_frames` empty frames over an existing
    /// page file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`] if `num_frames` is zero, or
    /// [`Error::FileNotFound`] if `file_name` does not exist — this does
    /// *not* create the file; use [`StorageManager::create`] first.
    pub fn init(
        file_name: impl AsRef<Path>,
        num_frames: usize,
        strategy: ReplacementStrategy,
    ) -> Result<Self> {
        if num_frames == 0 {
            return Err(Error::InvalidRequest(
                "num_frames must be greater than 0".into(),
            ));
        }
        let storage = StorageManager::open(file_name)?;
        let frames = (0..num_frames).map(PageFrame::new).collect();
        log::debug!("buffer pool initialised with {num_frames} frames, strategy {strategy:?}");
        Ok(Self {
            inner: Some(Inner {
                storage,
                frames,
                policy: Policy::new(strategy),
                num_reads: 0,
                num_writes: 0,
            }),
            num_frames,
            strategy,
        })
    }

    /// Convenience constructor from a [`BufferPoolConfig`].
    ///
    /// # Errors
    ///
    /// See [`Self::init`].
    pub fn with_config(config: &BufferPoolConfig) -> Result<Self> {
        Self::init(&config.file_name, config.num_frames, config.strategy)
    }

    /// Number of frames the pool was initialised with.
    #[must_use]
    pub fn num_frames(&self) -> usize {
        self.num_frames
    }

    /// Replacement strategy the pool was initialised with.
    #[must_use]
    pub fn strategy(&self) -> ReplacementStrategy {
        self.strategy
    }

    fn inner(&self) -> Result<&Inner> {
        self.inner.as_ref().ok_or(Error::PoolNotInitialised)
    }

    fn inner_mut(&mut self) -> Result<&mut Inner> {
        self.inner.as_mut().ok_or(Error::PoolNotInitialised)
    }

    /// Resolves `page_num` into a pinned frame, loading it from disk on a
    /// miss and evicting a victim if the pool is full (spec §4.1).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`] for a negative page number,
    /// [`Error::PoolFull`] if every frame is pinned, or an I/O error
    /// propagated from the storage manager.
    pub fn pin(&mut self, page_num: PageNumber) -> Result<PageHandle> {
        if page_num < 0 {
            return Err(Error::InvalidRequest(format!(
                "page number must be non-negative, got {page_num}"
            )));
        }
        let inner = self.inner_mut()?;

        if let Some(idx) = inner
            .frames
            .iter()
            .position(|f| f.page_number == page_num)
        {
            inner.frames[idx].fix_count += 1;
            inner.policy.on_hit(&mut inner.frames, idx);
            log::trace!("pin hit: page {page_num} -> frame {idx}");
            return Ok(PageHandle {
                page_number: page_num,
                frame_index: idx,
            });
        }

        log::trace!("pin miss: page {page_num}");
        let frame_idx = match inner.frames.iter().position(PageFrame::is_empty) {
            Some(idx) => idx,
            None => {
                let victim = inner
                    .policy
                    .select_victim(&mut inner.frames)
                    .ok_or(Error::PoolFull)?;
                if inner.frames[victim].dirty {
                    let evicted_page = inner.frames[victim].page_number;
                    let bytes = *inner.frames[victim].data;
                    inner
                        .storage
                        .write_block(evicted_page, &bytes)
                        .map_err(|e| {
                            log::warn!("write-back of page {evicted_page} failed: {e}");
                            e
                        })?;
                }
                log::debug!(
                    "evicting frame {victim} (page {}) for page {page_num}",
                    inner.frames[victim].page_number
                );
                inner.policy.forget(victim);
                inner.frames[victim].clear();
                victim
            }
        };

        inner.storage.ensure_capacity(page_num + 1)?;
        let mut buf = [0u8; PAGE_SIZE];
        inner.storage.read_block(page_num, &mut buf)?;
        inner.frames[frame_idx].load(page_num, buf);
        inner.num_reads += 1;
        inner.policy.on_load(&mut inner.frames, frame_idx);

        Ok(PageHandle {
            page_number: page_num,
            frame_index: frame_idx,
        })
    }

    fn resident_frame(&self, handle: PageHandle) -> Result<&PageFrame> {
        let inner = self.inner()?;
        inner
            .frames
            .get(handle.frame_index)
            .filter(|f| f.page_number == handle.page_number)
            .ok_or(Error::PageNotResident(handle.page_number))
    }

    /// A read-only view of the pinned page's bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PageNotResident`] if the handle no longer refers to
    /// a resident page.
    pub fn read(&self, handle: PageHandle) -> Result<&[u8; PAGE_SIZE]> {
        Ok(&self.resident_frame(handle)?.data)
    }

    /// A mutable view of the pinned page's bytes. Does not mark the page
    /// dirty on its own; call [`Self::mark_dirty`] once the mutation is
    /// complete, matching spec §4.1's "mutations are not visible to disk
    /// until `markDirty` then `forcePage`".
    ///
    /// # Errors
    ///
    /// Returns [`Error::PageNotResident`] if the handle no longer refers to
    /// a resident page.
    pub fn read_mut(&mut self, handle: PageHandle) -> Result<&mut [u8; PAGE_SIZE]> {
        let inner = self.inner_mut()?;
        let frame = inner
            .frames
            .get_mut(handle.frame_index)
            .filter(|f| f.page_number == handle.page_number)
            .ok_or(Error::PageNotResident(handle.page_number))?;
        Ok(&mut frame.data)
    }

    /// Decrements the fix count for a pinned page.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PageNotResident`] if the handle doesn't refer to a
    /// resident page, or [`Error::PageNotPinned`] if its fix count is
    /// already zero.
    pub fn unpin(&mut self, handle: PageHandle) -> Result<()> {
        let inner = self.inner_mut()?;
        let frame = inner
            .frames
            .get_mut(handle.frame_index)
            .filter(|f| f.page_number == handle.page_number)
            .ok_or(Error::PageNotResident(handle.page_number))?;
        if frame.fix_count == 0 {
            return Err(Error::PageNotPinned(handle.page_number));
        }
        frame.fix_count -= 1;
        Ok(())
    }

    /// Marks the pinned page dirty.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PageNotResident`] if the handle doesn't refer to a
    /// resident page.
    pub fn mark_dirty(&mut self, handle: PageHandle) -> Result<()> {
        let inner = self.inner_mut()?;
        let frame = inner
            .frames
            .get_mut(handle.frame_index)
            .filter(|f| f.page_number == handle.page_number)
            .ok_or(Error::PageNotResident(handle.page_number))?;
        frame.dirty = true;
        inner.num_writes += 1;
        Ok(())
    }

    /// Writes a dirty, resident page back to disk immediately.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PageNotDirty`] if the page is clean or the handle
    /// no longer refers to a resident page.
    pub fn force_page(&mut self, handle: PageHandle) -> Result<()> {
        let inner = self.inner_mut()?;
        let is_dirty_resident = inner
            .frames
            .get(handle.frame_index)
            .is_some_and(|f| f.page_number == handle.page_number && f.dirty);
        if !is_dirty_resident {
            return Err(Error::PageNotDirty(handle.page_number));
        }
        let bytes = *inner.frames[handle.frame_index].data;
        inner.storage.write_block(handle.page_number, &bytes)?;
        inner.frames[handle.frame_index].dirty = false;
        Ok(())
    }

    /// Writes back every dirty, unpinned frame, preserving residency.
    /// Pinned dirty frames are skipped without error. Aborts on the first
    /// I/O failure (the remaining dirty frames stay dirty).
    ///
    /// # Errors
    ///
    /// Propagates the first I/O failure encountered.
    pub fn force_flush_pool(&mut self) -> Result<()> {
        let inner = self.inner_mut()?;
        let flushable: Vec<usize> = inner
            .frames
            .iter()
            .enumerate()
            .filter(|(_, f)| f.dirty && f.fix_count == 0)
            .map(|(i, _)| i)
            .collect();
        for idx in flushable {
            let page_number = inner.frames[idx].page_number;
            let bytes = *inner.frames[idx].data;
            inner.storage.write_block(page_number, &bytes)?;
            inner.frames[idx].dirty = false;
        }
        Ok(())
    }

    /// Flushes every dirty frame regardless of pin state and releases the
    /// pool. Further operations fail with [`Error::PoolNotInitialised`].
    ///
    /// Uses the strict variant of spec §7's shutdown contract: every dirty
    /// frame is attempted, and the first write failure (if any) is
    /// returned only after the full traversal completes — a partially shut
    /// down pool would otherwise leave later pages unflushed for no gain.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PoolNotInitialised`] if already shut down, or the
    /// first I/O error encountered while flushing.
    pub fn shutdown(&mut self) -> Result<()> {
        let inner = self.inner_mut()?;
        let dirty: Vec<usize> = inner
            .frames
            .iter()
            .enumerate()
            .filter(|(_, f)| f.dirty)
            .map(|(i, _)| i)
            .collect();

        let mut first_err = None;
        for idx in dirty {
            let page_number = inner.frames[idx].page_number;
            let bytes = *inner.frames[idx].data;
            match inner.storage.write_block(page_number, &bytes) {
                Ok(()) => {
                    inner.frames[idx].dirty = false;
                }
                Err(e) => {
                    log::warn!("shutdown: failed to flush page {page_number}: {e}");
                    first_err.get_or_insert(e);
                }
            }
        }

        self.inner = None;
        log::debug!("buffer pool shut down");
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// `frames[i].page_number`, or [`crate::storage_manager::NO_PAGE`] for
    /// empty frames.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PoolNotInitialised`] if the pool has been shut
    /// down.
    pub fn frame_contents(&self) -> Result<Vec<PageNumber>> {
        Ok(self.inner()?.frames.iter().map(|f| f.page_number).collect())
    }

    /// `frames[i].dirty` for every frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PoolNotInitialised`] if the pool has been shut
    /// down.
    pub fn dirty_flags(&self) -> Result<Vec<bool>> {
        Ok(self.inner()?.frames.iter().map(|f| f.dirty).collect())
    }

    /// `frames[i].fix_count` for every frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PoolNotInitialised`] if the pool has been shut
    /// down.
    pub fn fix_counts(&self) -> Result<Vec<u32>> {
        Ok(self.inner()?.frames.iter().map(|f| f.fix_count).collect())
    }

    /// Number of page loads since `init`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PoolNotInitialised`] if the pool has been shut
    /// down.
    pub fn num_read_io(&self) -> Result<u64> {
        Ok(self.inner()?.num_reads)
    }

    /// Number of `mark_dirty` calls since `init` (spec §4.1); physical
    /// write-backs issued by `force_page`/`force_flush_pool`/`shutdown`
    /// don't touch this counter.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PoolNotInitialised`] if the pool has been shut
    /// down.
    pub fn num_write_io(&self) -> Result<u64> {
        Ok(self.inner()?.num_writes)
    }
}
