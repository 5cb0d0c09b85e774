use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use parking_lot::lock_api::{ArcRwLockReadGuard, ArcRwLockWriteGuard};
use parking_lot::{RawRwLock, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::common::{new_shared_page_data, FrameId, PageData, PageId, SharedPageData, INVALID_PAGE_ID};

/// FrameHeader manages a single buffer frame in the buffer pool.
/// It stores metadata about the frame and the latched page bytes.
///
/// Frames are created once for the whole pool and reused; the page they hold
/// changes only under the pool latch.
pub struct FrameHeader {
    /// The frame ID (index in the buffer pool)
    frame_id: FrameId,
    /// The page ID stored in this frame (INVALID_PAGE_ID if empty)
    page_id: RwLock<PageId>,
    /// Pin count - number of holders currently using this frame
    pin_count: AtomicU32,
    /// Whether the page has been modified since it was last written to disk
    is_dirty: AtomicBool,
    /// The page bytes, shared with the disk scheduler for I/O
    data: SharedPageData,
}

impl FrameHeader {
    /// Creates a new FrameHeader for the given frame ID.
    pub fn new(frame_id: FrameId) -> Self {
        Self {
            frame_id,
            page_id: RwLock::new(INVALID_PAGE_ID),
            pin_count: AtomicU32::new(0),
            is_dirty: AtomicBool::new(false),
            data: new_shared_page_data(),
        }
    }

    /// Returns the frame ID.
    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }

    /// Returns the page ID stored in this frame.
    pub fn page_id(&self) -> PageId {
        *self.page_id.read()
    }

    pub(crate) fn set_page_id(&self, page_id: PageId) {
        *self.page_id.write() = page_id;
    }

    /// Returns the current pin count.
    pub fn pin_count(&self) -> u32 {
        self.pin_count.load(Ordering::Acquire)
    }

    /// Increments the pin count and returns the new value.
    pub(crate) fn pin(&self) -> u32 {
        self.pin_count.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Decrements the pin count and returns the new value.
    /// Returns None if the pin count was already 0.
    pub(crate) fn unpin(&self) -> Option<u32> {
        self.pin_count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| current.checked_sub(1))
            .ok()
            .map(|previous| previous - 1)
    }

    /// Returns whether the page is dirty.
    pub fn is_dirty(&self) -> bool {
        self.is_dirty.load(Ordering::Acquire)
    }

    pub(crate) fn set_dirty(&self, dirty: bool) {
        self.is_dirty.store(dirty, Ordering::Release);
    }

    /// Returns a read latch on the page bytes.
    pub fn read_data(&self) -> RwLockReadGuard<'_, PageData> {
        self.data.read()
    }

    /// Returns a write latch on the page bytes.
    /// Callers that modify the bytes must report it when unpinning.
    pub fn write_data(&self) -> RwLockWriteGuard<'_, PageData> {
        self.data.write()
    }

    pub(crate) fn read_data_arc(&self) -> ArcRwLockReadGuard<RawRwLock, PageData> {
        self.data.read_arc()
    }

    pub(crate) fn write_data_arc(&self) -> ArcRwLockWriteGuard<RawRwLock, PageData> {
        self.data.write_arc()
    }

    /// The shared buffer handed to the disk scheduler.
    pub(crate) fn shared_data(&self) -> &SharedPageData {
        &self.data
    }

    /// Returns the frame to its empty state with zeroed bytes.
    pub(crate) fn reset(&self) {
        *self.page_id.write() = INVALID_PAGE_ID;
        self.pin_count.store(0, Ordering::Release);
        self.is_dirty.store(false, Ordering::Release);
        self.data.write().fill(0);
    }

    /// Attaches the frame to `page_id` with a single pin.
    pub(crate) fn assign(&self, page_id: PageId, dirty: bool) {
        *self.page_id.write() = page_id;
        self.pin_count.store(1, Ordering::Release);
        self.is_dirty.store(dirty, Ordering::Release);
    }
}

impl std::fmt::Debug for FrameHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameHeader")
            .field("frame_id", &self.frame_id)
            .field("page_id", &self.page_id())
            .field("pin_count", &self.pin_count())
            .field("is_dirty", &self.is_dirty())
            .finish()
    }
}
