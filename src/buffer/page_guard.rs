use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use parking_lot::lock_api::{ArcRwLockReadGuard, ArcRwLockWriteGuard};
use parking_lot::RawRwLock;

use crate::common::{PageData, PageId, PAGE_SIZE};

use super::{BufferPoolManager, FrameHeader};

/// Releases the pin of a guarded page when dropped.
///
/// Guards declare this field after their data latch, so the latch is released
/// before the pool latch is taken to unpin.
struct PinRelease<'a> {
    bpm: &'a BufferPoolManager,
    page_id: PageId,
    is_dirty: bool,
}

impl Drop for PinRelease<'_> {
    fn drop(&mut self) {
        self.bpm.unpin_page(self.page_id, self.is_dirty);
    }
}

/// RAII guard for read-only access to a page.
/// Holds one pin and the frame's read latch; both are released on drop.
pub struct ReadPageGuard<'a> {
    data: ArcRwLockReadGuard<RawRwLock, PageData>,
    release: PinRelease<'a>,
}

impl<'a> ReadPageGuard<'a> {
    /// Latches an already pinned frame. The guard takes over that pin.
    pub(crate) fn new(bpm: &'a BufferPoolManager, page_id: PageId, frame: &Arc<FrameHeader>) -> Self {
        Self {
            data: frame.read_data_arc(),
            release: PinRelease {
                bpm,
                page_id,
                is_dirty: false,
            },
        }
    }

    /// Returns the page ID.
    pub fn page_id(&self) -> PageId {
        self.release.page_id
    }

    /// Returns a reference to the page data.
    pub fn data(&self) -> &[u8; PAGE_SIZE] {
        &self.data
    }
}

impl Deref for ReadPageGuard<'_> {
    type Target = [u8; PAGE_SIZE];

    fn deref(&self) -> &Self::Target {
        self.data()
    }
}

/// RAII guard for read-write access to a page.
/// Holds one pin and the frame's write latch. The page is reported dirty on
/// drop if it was ever borrowed mutably.
pub struct WritePageGuard<'a> {
    data: ArcRwLockWriteGuard<RawRwLock, PageData>,
    release: PinRelease<'a>,
}

impl<'a> WritePageGuard<'a> {
    /// Latches an already pinned frame. The guard takes over that pin.
    pub(crate) fn new(bpm: &'a BufferPoolManager, page_id: PageId, frame: &Arc<FrameHeader>) -> Self {
        Self {
            data: frame.write_data_arc(),
            release: PinRelease {
                bpm,
                page_id,
                is_dirty: false,
            },
        }
    }

    /// Returns the page ID.
    pub fn page_id(&self) -> PageId {
        self.release.page_id
    }

    /// Returns a reference to the page data.
    pub fn data(&self) -> &[u8; PAGE_SIZE] {
        &self.data
    }

    /// Returns a mutable reference to the page data and marks the page dirty.
    pub fn data_mut(&mut self) -> &mut [u8; PAGE_SIZE] {
        self.release.is_dirty = true;
        &mut self.data
    }
}

impl Deref for WritePageGuard<'_> {
    type Target = [u8; PAGE_SIZE];

    fn deref(&self) -> &Self::Target {
        self.data()
    }
}

impl DerefMut for WritePageGuard<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.data_mut()
    }
}
