use bytes::{Buf, BufMut};

use crate::common::{Result, SlotId, StrataError, PAGE_SIZE};
use crate::tuple::{Schema, Tuple};

/// Slotted page layout:
///
/// +------------------+
/// | Page Header      |  (SLOTTED_PAGE_HEADER_SIZE bytes)
/// +------------------+
/// | Slot Array       |  (grows toward the page end)
/// | [slot 0]         |
/// | [slot 1]         |
/// | ...              |
/// +------------------+
/// | Free Space       |
/// +------------------+  <- LastUsedOffset
/// | Tuple Data       |  (grows toward the header)
/// | [tuple n]        |
/// | ...              |
/// | [tuple 0]        |
/// +------------------+
///
/// Header fields, all u16 little-endian:
///   - NumTuples at byte 0 (live tuples)
///   - NumDeleted at byte 2 (tombstoned slots)
///   - FreeSpace at byte 4
///   - LastUsedOffset at byte 6
///
/// Each slot entry is an offset u16 and a length u16. Offsets are relative to
/// the end of the header, and a length of 0 marks a deleted slot. Deleted
/// slots keep their entry and their bytes, so slot numbers never change and
/// deletion reclaims no space.
pub const SLOTTED_PAGE_HEADER_SIZE: usize = 8;

/// Size of each slot entry in bytes
pub const SLOT_SIZE: usize = 4;

/// Bytes after the header, shared by the slot array and tuple data
const DATA_REGION_SIZE: u16 = (PAGE_SIZE - SLOTTED_PAGE_HEADER_SIZE) as u16;

const NUM_TUPLES_OFFSET: usize = 0;
const NUM_DELETED_OFFSET: usize = 2;
const FREE_SPACE_OFFSET: usize = 4;
const LAST_USED_OFFSET_OFFSET: usize = 6;

/// Decoded page header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlottedPageHeader {
    pub num_tuples: u16,
    pub num_deleted: u16,
    pub free_space: u16,
    pub last_used_offset: u16,
}

/// Represents a slot entry in the slot array
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotEntry {
    /// Offset of the tuple from the end of the header
    pub offset: u16,
    /// Length of the tuple (0 = deleted)
    pub length: u16,
}

impl SlotEntry {
    pub fn is_deleted(&self) -> bool {
        self.length == 0
    }
}

fn read_u16(data: &[u8; PAGE_SIZE], at: usize) -> u16 {
    (&data[at..at + 2]).get_u16_le()
}

fn write_u16(data: &mut [u8; PAGE_SIZE], at: usize, value: u16) {
    (&mut data[at..at + 2]).put_u16_le(value);
}

fn slot_position(slot_id: SlotId) -> usize {
    SLOTTED_PAGE_HEADER_SIZE + slot_id.as_usize() * SLOT_SIZE
}

/// Read-only view of a page's bytes as a slotted page.
#[derive(Clone, Copy)]
pub struct SlottedPageRef<'a> {
    data: &'a [u8; PAGE_SIZE],
}

impl<'a> SlottedPageRef<'a> {
    pub fn new(data: &'a [u8; PAGE_SIZE]) -> Self {
        Self { data }
    }

    pub fn header(&self) -> SlottedPageHeader {
        SlottedPageHeader {
            num_tuples: self.num_tuples(),
            num_deleted: self.num_deleted(),
            free_space: self.free_space(),
            last_used_offset: self.last_used_offset(),
        }
    }

    /// Number of live tuples.
    pub fn num_tuples(&self) -> u16 {
        read_u16(self.data, NUM_TUPLES_OFFSET)
    }

    /// Number of deleted slots.
    pub fn num_deleted(&self) -> u16 {
        read_u16(self.data, NUM_DELETED_OFFSET)
    }

    pub fn free_space(&self) -> u16 {
        read_u16(self.data, FREE_SPACE_OFFSET)
    }

    /// Offset of the lowest tuple, or the data region size on an empty page.
    pub fn last_used_offset(&self) -> u16 {
        read_u16(self.data, LAST_USED_OFFSET_OFFSET)
    }

    /// Number of slot entries, deleted ones included.
    pub fn num_slots(&self) -> u16 {
        self.num_tuples().saturating_add(self.num_deleted())
    }

    /// Returns whether a tuple of `size` bytes plus its slot entry fits.
    pub fn has_space_for(&self, size: usize) -> bool {
        self.free_space() as usize >= size + SLOT_SIZE
    }

    /// Gets a slot entry by slot ID.
    pub fn slot(&self, slot_id: SlotId) -> Option<SlotEntry> {
        if slot_id.as_u16() >= self.num_slots() {
            return None;
        }
        // a corrupt header can claim more slots than the page holds
        let at = slot_position(slot_id);
        let mut entry = self.data.get(at..at + SLOT_SIZE)?;
        Some(SlotEntry {
            offset: entry.get_u16_le(),
            length: entry.get_u16_le(),
        })
    }

    /// Returns the stored bytes of a live slot.
    pub fn read_raw(&self, slot_id: SlotId) -> Option<&'a [u8]> {
        let entry = self.slot(slot_id).filter(|e| !e.is_deleted())?;
        let start = SLOTTED_PAGE_HEADER_SIZE + entry.offset as usize;
        self.data.get(start..start + entry.length as usize)
    }

    /// Decodes the tuple of a live slot with `schema`.
    pub fn read_tuple(&self, schema: &Schema, slot_id: SlotId) -> Result<Option<Tuple>> {
        self.read_raw(slot_id)
            .map(|raw| Tuple::from_bytes(schema, raw))
            .transpose()
    }

    /// Iterates over the live slots in slot order.
    pub fn live_slots(&self) -> impl Iterator<Item = SlotId> + 'a {
        let page = *self;
        (0..page.num_slots())
            .map(SlotId::new)
            .filter(move |&slot_id| page.slot(slot_id).is_some_and(|e| !e.is_deleted()))
    }
}

/// SlottedPage provides methods to interpret and manipulate a page's bytes
/// as a slotted page. Every mutation keeps the header and slot array in sync.
pub struct SlottedPage<'a> {
    data: &'a mut [u8; PAGE_SIZE],
}

impl<'a> SlottedPage<'a> {
    /// Creates a new SlottedPage view over the given page bytes.
    /// A page that never went through [`SlottedPage::init`] has no free space.
    pub fn new(data: &'a mut [u8; PAGE_SIZE]) -> Self {
        Self { data }
    }

    /// Formats the page as an empty slotted page.
    pub fn init(&mut self) {
        self.data.fill(0);
        self.set_header(SlottedPageHeader {
            num_tuples: 0,
            num_deleted: 0,
            free_space: DATA_REGION_SIZE,
            last_used_offset: DATA_REGION_SIZE,
        });
    }

    /// Borrows the page read-only.
    pub fn view(&self) -> SlottedPageRef<'_> {
        SlottedPageRef::new(&*self.data)
    }

    pub fn header(&self) -> SlottedPageHeader {
        self.view().header()
    }

    pub fn num_tuples(&self) -> u16 {
        self.view().num_tuples()
    }

    pub fn num_deleted(&self) -> u16 {
        self.view().num_deleted()
    }

    pub fn free_space(&self) -> u16 {
        self.view().free_space()
    }

    pub fn last_used_offset(&self) -> u16 {
        self.view().last_used_offset()
    }

    pub fn num_slots(&self) -> u16 {
        self.view().num_slots()
    }

    pub fn has_space_for(&self, size: usize) -> bool {
        self.view().has_space_for(size)
    }

    pub fn slot(&self, slot_id: SlotId) -> Option<SlotEntry> {
        self.view().slot(slot_id)
    }

    pub fn read_raw(&self, slot_id: SlotId) -> Option<&[u8]> {
        self.view().read_raw(slot_id)
    }

    pub fn read_tuple(&self, schema: &Schema, slot_id: SlotId) -> Result<Option<Tuple>> {
        self.view().read_tuple(schema, slot_id)
    }

    pub fn live_slots(&self) -> impl Iterator<Item = SlotId> + '_ {
        self.view().live_slots()
    }

    /// Stores `tuple` below the lowest existing tuple and returns its slot.
    pub fn append_tuple(&mut self, tuple: &Tuple) -> Result<SlotId> {
        let bytes = tuple.to_bytes()?;
        self.append_raw(&bytes)
    }

    /// Stores `bytes` below the lowest existing tuple and appends a slot
    /// entry for it.
    ///
    /// Fails with [`StrataError::NoSpaceLeft`] unless the free space covers
    /// the bytes and the new slot entry.
    pub fn append_raw(&mut self, bytes: &[u8]) -> Result<SlotId> {
        if bytes.is_empty() {
            return Err(StrataError::EmptyTuple);
        }

        let header = self.header();
        let no_space = StrataError::NoSpaceLeft {
            free_space: header.free_space,
            tuple_size: bytes.len(),
        };
        if !self.has_space_for(bytes.len()) {
            return Err(no_space);
        }

        let size = bytes.len() as u16;
        let Some(offset) = header.last_used_offset.checked_sub(size) else {
            return Err(no_space);
        };
        let slot_id = SlotId::new(self.num_slots());

        // the new slot entry must end at or below the tuple, inside the page
        let start = SLOTTED_PAGE_HEADER_SIZE + offset as usize;
        let end = start + bytes.len();
        if end > PAGE_SIZE || slot_position(slot_id) + SLOT_SIZE > start {
            return Err(no_space);
        }
        self.data[start..end].copy_from_slice(bytes);
        self.set_slot(
            slot_id,
            SlotEntry {
                offset,
                length: size,
            },
        );
        self.set_header(SlottedPageHeader {
            num_tuples: header.num_tuples + 1,
            free_space: header.free_space - size - SLOT_SIZE as u16,
            last_used_offset: offset,
            ..header
        });

        Ok(slot_id)
    }

    /// Tombstones a slot. Returns false if the slot does not exist or is
    /// already deleted, in which case nothing changes.
    pub fn delete_tuple(&mut self, slot_id: SlotId) -> bool {
        let Some(entry) = self.slot(slot_id).filter(|e| !e.is_deleted()) else {
            return false;
        };

        self.set_slot(slot_id, SlotEntry { length: 0, ..entry });
        let header = self.header();
        self.set_header(SlottedPageHeader {
            num_tuples: header.num_tuples.saturating_sub(1),
            num_deleted: header.num_deleted.saturating_add(1),
            ..header
        });
        true
    }

    fn set_slot(&mut self, slot_id: SlotId, entry: SlotEntry) {
        let at = slot_position(slot_id);
        write_u16(self.data, at, entry.offset);
        write_u16(self.data, at + 2, entry.length);
    }

    fn set_header(&mut self, header: SlottedPageHeader) {
        write_u16(self.data, NUM_TUPLES_OFFSET, header.num_tuples);
        write_u16(self.data, NUM_DELETED_OFFSET, header.num_deleted);
        write_u16(self.data, FREE_SPACE_OFFSET, header.free_space);
        write_u16(self.data, LAST_USED_OFFSET_OFFSET, header.last_used_offset);
    }
}
