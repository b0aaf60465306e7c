//! pagepool — a page-oriented storage subsystem.
//!
//! Two cooperating layers form the lower levels of a database kernel:
//!
//! - [`storage_manager`]: a fixed-size page abstraction over a single
//!   on-disk file (create/open/close, block read/write, capacity growth).
//! - [`buffer_manager`]: a bounded in-memory cache of pages on top of the
//!   storage manager, with pinning semantics and a configurable
//!   replacement policy (FIFO, LRU, CLOCK).
//!
//! This crate has no binary target; it is a library consumed by a
//! higher-level record/access-method layer that is out of scope here.

pub mod buffer_manager;
pub mod error;
pub mod storage_manager;

pub use buffer_manager::{
    BufferPoolConfig, BufferPoolManager, PageFrame, PageHandle, ReplacementStrategy,
};
pub use error::{Error, Result};
pub use storage_manager::{StorageManager, NO_PAGE, PAGE_SIZE};
