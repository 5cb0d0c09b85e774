use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use super::config::{INVALID_FRAME_ID, INVALID_PAGE_ID, PAGE_SIZE};

/// Page identifier type - uniquely identifies a page on disk.
/// Page `n` lives at byte offset `n * PAGE_SIZE` of the database file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId(pub u32);

impl PageId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }

    pub fn is_valid(&self) -> bool {
        *self != INVALID_PAGE_ID
    }

    /// Byte offset of this page inside the database file.
    pub fn file_offset(&self) -> u64 {
        self.0 as u64 * PAGE_SIZE as u64
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PageId({})", self.0)
    }
}

/// Frame identifier type - index of a buffer frame in the buffer pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameId(pub u32);

impl FrameId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn as_usize(&self) -> usize {
        self.0 as usize
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }

    pub fn is_valid(&self) -> bool {
        *self != INVALID_FRAME_ID
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FrameId({})", self.0)
    }
}

/// Slot number within a slotted page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(pub u16);

impl SlotId {
    pub fn new(id: u16) -> Self {
        Self(id)
    }

    pub fn as_u16(&self) -> u16 {
        self.0
    }

    pub fn as_usize(&self) -> usize {
        self.0 as usize
    }
}

/// Record identifier - combination of page ID and slot ID.
///
/// Only meaningful for tuples that live in a page; standalone tuples carry
/// [`RecordId::invalid`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordId {
    pub page_id: PageId,
    pub slot_id: SlotId,
}

impl RecordId {
    pub fn new(page_id: PageId, slot_id: SlotId) -> Self {
        Self { page_id, slot_id }
    }

    pub fn invalid() -> Self {
        Self {
            page_id: INVALID_PAGE_ID,
            slot_id: SlotId::new(0),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.page_id.is_valid()
    }

    /// Packs the record id as `page_id << 32 | slot`.
    pub fn to_u64(&self) -> u64 {
        ((self.page_id.as_u32() as u64) << 32) | self.slot_id.as_u16() as u64
    }

    pub fn from_u64(packed: u64) -> Self {
        Self {
            page_id: PageId::new((packed >> 32) as u32),
            slot_id: SlotId::new(packed as u16),
        }
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::invalid()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, slot {})", self.page_id, self.slot_id.0)
    }
}

/// Timestamp type for LRU-K tracking (nanoseconds on the replacer's clock)
pub type Timestamp = u64;

/// The bytes of one page.
pub type PageData = Box<[u8; PAGE_SIZE]>;

/// Page bytes shared between a buffer frame and the disk worker.
pub type SharedPageData = Arc<RwLock<PageData>>;

/// Allocates a zeroed, shareable page buffer.
pub fn new_shared_page_data() -> SharedPageData {
    Arc::new(RwLock::new(Box::new([0u8; PAGE_SIZE])))
}
