//! Strata - a disk-oriented page storage engine in Rust
//!
//! This crate provides the storage core of a relational database: fixed-size pages
//! on disk, a bounded in-memory buffer pool that caches them, and a slotted record
//! format laid over each page's bytes.
//!
//! # Architecture
//!
//! - **Storage Layer** (`storage`): disk I/O and page layout
//!   - `DiskManager`: reads and writes 4 KB pages and an append-only log file
//!   - `DiskScheduler`: single background worker that serializes disk requests
//!   - `SlottedPage`: header + slot directory + tuples packed from the page end
//!
//! - **Buffer Pool** (`buffer`): memory management for database pages
//!   - `BufferPoolManager`: page table, free list, pin/unpin and flush
//!   - `LruKReplacer`: LRU-K eviction policy
//!   - `FrameHeader`: per-frame metadata and latched page bytes
//!   - `ReadPageGuard`/`WritePageGuard`: RAII pins for thread-safe page access
//!
//! - **Tuples** (`tuple`): typed values, schemas and the tuple byte format
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use strata::buffer::BufferPoolManager;
//! use strata::storage::disk::DiskManager;
//! use strata::storage::page::SlottedPage;
//! use strata::tuple::{Tuple, Value};
//!
//! let disk_manager = Arc::new(DiskManager::new("demo.db")?);
//! let bpm = BufferPoolManager::new(16, 2, disk_manager)?;
//!
//! let mut guard = bpm.new_page_write()?.expect("pool exhausted");
//! let page_id = guard.page_id();
//! let mut page = SlottedPage::new(guard.data_mut());
//! page.init();
//! page.append_tuple(&Tuple::new(vec![Value::Int32(7), Value::from("seven")]))?;
//! drop(guard);
//!
//! bpm.flush_page(page_id)?;
//! # Ok::<(), strata::StrataError>(())
//! ```

pub mod buffer;
pub mod common;
pub mod storage;
pub mod tuple;

// Re-export commonly used types at the crate root
pub use common::{FrameId, PageId, RecordId, Result, SlotId, StorageConfig, StrataError};
