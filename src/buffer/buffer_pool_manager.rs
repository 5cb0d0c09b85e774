use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use log::debug;
use parking_lot::Mutex;

use crate::common::{new_shared_page_data, FrameId, PageId, Result, StorageConfig, StrataError};
use crate::storage::disk::{DiskManager, DiskScheduler};

use super::{FrameHeader, LruKReplacer, ReadPageGuard, WritePageGuard};

/// Page table and free list, mutated only under the pool latch
struct PoolState {
    /// Page table: maps resident page IDs to frame IDs
    page_table: HashMap<PageId, FrameId>,
    /// Frames that hold no page
    free_list: VecDeque<FrameId>,
}

/// BufferPoolManager is responsible for fetching database pages from disk
/// and storing them in memory. It manages a fixed number of frames and uses
/// the LRU-K replacement policy to decide which pages to evict.
///
/// Every page-table change and every frame (re)assignment happens under one
/// pool-wide latch, so two threads missing on the same page never read it
/// into two frames. Page bytes are latched per frame; a caller touches them
/// only while holding a pin, and releases each pin exactly once with
/// [`BufferPoolManager::unpin_page`] or by dropping a page guard.
pub struct BufferPoolManager {
    /// Number of frames in the buffer pool
    pool_size: usize,
    /// The buffer pool frames, indexed by frame ID
    frames: Vec<Arc<FrameHeader>>,
    /// Pool-wide latch
    latch: Mutex<PoolState>,
    /// LRU-K replacer for eviction decisions
    replacer: LruKReplacer,
    /// Disk scheduler for all page I/O
    disk_scheduler: DiskScheduler,
    /// Next page ID to hand out
    next_page_id: AtomicU32,
}

impl BufferPoolManager {
    /// Creates a new BufferPoolManager with the given pool size, k value for LRU-K,
    /// and disk manager. Page allocation continues after the pages already on disk.
    pub fn new(pool_size: usize, k: usize, disk_manager: Arc<DiskManager>) -> Result<Self> {
        let mut frames = Vec::with_capacity(pool_size);
        let mut free_list = VecDeque::with_capacity(pool_size);

        for i in 0..pool_size {
            let frame_id = FrameId::new(i as u32);
            frames.push(Arc::new(FrameHeader::new(frame_id)));
            free_list.push_back(frame_id);
        }

        let next_page_id = AtomicU32::new(disk_manager.get_num_pages());

        Ok(Self {
            pool_size,
            frames,
            latch: Mutex::new(PoolState {
                page_table: HashMap::with_capacity(pool_size),
                free_list,
            }),
            replacer: LruKReplacer::new(k, pool_size),
            disk_scheduler: DiskScheduler::new(disk_manager)?,
            next_page_id,
        })
    }

    /// Creates a BufferPoolManager sized by `config`.
    pub fn from_config(config: &StorageConfig, disk_manager: Arc<DiskManager>) -> Result<Self> {
        Self::new(config.pool_size, config.replacer_k, disk_manager)
    }

    /// Allocates a fresh page and returns its frame, zeroed and pinned once.
    ///
    /// Returns `Ok(None)` when every frame is pinned. The new page starts
    /// dirty, so it reaches disk even if it is evicted before any flush.
    pub fn new_page(&self) -> Result<Option<Arc<FrameHeader>>> {
        let mut state = self.latch.lock();

        let Some(frame_id) = self.acquire_frame(&mut state)? else {
            debug!("new page: no evictable frame");
            return Ok(None);
        };

        let page_id = PageId::new(self.next_page_id.fetch_add(1, Ordering::SeqCst));
        let frame = &self.frames[frame_id.as_usize()];
        frame.assign(page_id, true);
        state.page_table.insert(page_id, frame_id);

        self.replacer.record_access(frame_id);
        self.replacer.set_evictable(frame_id, false);

        debug!("new page {} in {}", page_id, frame_id);
        Ok(Some(Arc::clone(frame)))
    }

    /// Returns the frame holding `page_id`, pinned once more, reading the page
    /// from disk on a miss.
    ///
    /// Returns `Ok(None)` when the page is not resident and every frame is
    /// pinned. A failed disk read is returned as an error.
    pub fn fetch_page(&self, page_id: PageId) -> Result<Option<Arc<FrameHeader>>> {
        if !page_id.is_valid() {
            return Err(StrataError::InvalidPageId(page_id));
        }

        let mut state = self.latch.lock();

        if let Some(&frame_id) = state.page_table.get(&page_id) {
            let frame = &self.frames[frame_id.as_usize()];
            frame.pin();
            self.replacer.record_access(frame_id);
            self.replacer.set_evictable(frame_id, false);
            return Ok(Some(Arc::clone(frame)));
        }

        let Some(frame_id) = self.acquire_frame(&mut state)? else {
            debug!("fetch {}: no evictable frame", page_id);
            return Ok(None);
        };
        let frame = &self.frames[frame_id.as_usize()];

        if let Err(e) = self
            .disk_scheduler
            .schedule_read_sync(page_id, frame.shared_data())
        {
            frame.reset();
            state.free_list.push_back(frame_id);
            return Err(e);
        }

        frame.assign(page_id, false);
        state.page_table.insert(page_id, frame_id);
        self.replacer.record_access(frame_id);
        self.replacer.set_evictable(frame_id, false);

        debug!("fetch {}: read into {}", page_id, frame_id);
        Ok(Some(Arc::clone(frame)))
    }

    /// Releases one pin on `page_id`, marking it dirty if `is_dirty`.
    ///
    /// Returns false if the page is not resident or not pinned. The page
    /// becomes evictable once its last pin is released.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> bool {
        let state = self.latch.lock();

        let Some(&frame_id) = state.page_table.get(&page_id) else {
            return false;
        };
        let frame = &self.frames[frame_id.as_usize()];

        match frame.unpin() {
            None => false,
            Some(remaining) => {
                if is_dirty {
                    frame.set_dirty(true);
                }
                if remaining == 0 {
                    self.replacer.set_evictable(frame_id, true);
                }
                true
            }
        }
    }

    /// Writes a resident page to disk regardless of its dirty flag.
    /// Returns false if the page is not resident.
    ///
    /// The caller must not hold a write guard on the same page.
    pub fn flush_page(&self, page_id: PageId) -> Result<bool> {
        if !page_id.is_valid() {
            return Err(StrataError::InvalidPageId(page_id));
        }

        // Pin so the page stays put while the latch is released for the write.
        let frame = {
            let state = self.latch.lock();
            let Some(&frame_id) = state.page_table.get(&page_id) else {
                return Ok(false);
            };
            let frame = Arc::clone(&self.frames[frame_id.as_usize()]);
            frame.pin();
            self.replacer.set_evictable(frame_id, false);
            frame
        };

        // Copied and cleared under the frame latch so a later modification
        // re-marks the page. A writer holding a guard stalls only this thread.
        let snapshot = new_shared_page_data();
        let was_dirty = {
            let data = frame.read_data();
            snapshot.write().copy_from_slice(&data[..]);
            let was_dirty = frame.is_dirty();
            frame.set_dirty(false);
            was_dirty
        };
        let result = self.disk_scheduler.schedule_write_sync(page_id, &snapshot);
        if result.is_err() && was_dirty {
            frame.set_dirty(true);
        }

        self.unpin_page(page_id, false);
        result.map(|()| true)
    }

    /// Writes every resident page to disk, in page ID order.
    pub fn flush_entire_pool(&self) -> Result<()> {
        let mut page_ids: Vec<PageId> = self.latch.lock().page_table.keys().copied().collect();
        page_ids.sort_unstable();

        for page_id in page_ids {
            // pages evicted in the meantime were written back already
            self.flush_page(page_id)?;
        }
        Ok(())
    }

    /// Drops `page_id` from the pool, writing it back first if dirty.
    ///
    /// Returns true if the page is gone (or was never resident) and false if
    /// it is still pinned.
    pub fn delete_page(&self, page_id: PageId) -> Result<bool> {
        let mut state = self.latch.lock();

        let Some(&frame_id) = state.page_table.get(&page_id) else {
            return Ok(true);
        };
        let frame = &self.frames[frame_id.as_usize()];

        if frame.pin_count() > 0 {
            return Ok(false);
        }

        if frame.is_dirty() {
            self.write_back(page_id, frame)?;
        }

        state.page_table.remove(&page_id);
        self.replacer.remove(frame_id);
        frame.reset();
        state.free_list.push_back(frame_id);

        debug!("deleted {} from {}", page_id, frame_id);
        Ok(true)
    }

    /// Fetches a page and latches it for reading.
    pub fn fetch_page_read(&self, page_id: PageId) -> Result<Option<ReadPageGuard<'_>>> {
        Ok(self
            .fetch_page(page_id)?
            .map(|frame| ReadPageGuard::new(self, page_id, &frame)))
    }

    /// Fetches a page and latches it for writing.
    pub fn fetch_page_write(&self, page_id: PageId) -> Result<Option<WritePageGuard<'_>>> {
        Ok(self
            .fetch_page(page_id)?
            .map(|frame| WritePageGuard::new(self, page_id, &frame)))
    }

    /// Allocates a new page and latches it for writing.
    pub fn new_page_write(&self) -> Result<Option<WritePageGuard<'_>>> {
        Ok(self
            .new_page()?
            .map(|frame| WritePageGuard::new(self, frame.page_id(), &frame)))
    }

    /// Returns the pin count for a resident page.
    pub fn get_pin_count(&self, page_id: PageId) -> Option<u32> {
        let state = self.latch.lock();
        state
            .page_table
            .get(&page_id)
            .map(|&frame_id| self.frames[frame_id.as_usize()].pin_count())
    }

    /// Returns the dirty flag of a resident page.
    pub fn is_dirty(&self, page_id: PageId) -> Option<bool> {
        let state = self.latch.lock();
        state
            .page_table
            .get(&page_id)
            .map(|&frame_id| self.frames[frame_id.as_usize()].is_dirty())
    }

    /// Returns the pool size.
    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Returns the number of free frames.
    pub fn free_frame_count(&self) -> usize {
        self.latch.lock().free_list.len()
    }

    /// Returns the underlying DiskManager.
    pub fn disk_manager(&self) -> &Arc<DiskManager> {
        self.disk_scheduler.disk_manager()
    }

    /// Writes an unpinned frame's bytes to disk from a private copy, so the
    /// disk worker never waits on a frame latch.
    fn write_back(&self, page_id: PageId, frame: &FrameHeader) -> Result<()> {
        let snapshot = new_shared_page_data();
        snapshot.write().copy_from_slice(&frame.read_data()[..]);
        self.disk_scheduler.schedule_write_sync(page_id, &snapshot)
    }

    /// Takes a frame from the free list, or evicts one, writing it back if dirty.
    /// The returned frame is reset and unmapped.
    ///
    /// The victim leaves the replacer only once its write-back succeeded; on
    /// failure it stays resident with its access history intact.
    fn acquire_frame(&self, state: &mut PoolState) -> Result<Option<FrameId>> {
        if let Some(frame_id) = state.free_list.pop_front() {
            return Ok(Some(frame_id));
        }

        let Some(frame_id) = self.replacer.victim() else {
            return Ok(None);
        };
        let frame = &self.frames[frame_id.as_usize()];
        let old_page_id = frame.page_id();

        if frame.is_dirty() {
            self.write_back(old_page_id, frame)?;
        }

        self.replacer.remove(frame_id);
        state.page_table.remove(&old_page_id);
        frame.reset();

        debug!("evicted {} from {}", old_page_id, frame_id);
        Ok(Some(frame_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_bpm(pool_size: usize) -> (BufferPoolManager, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let dm = Arc::new(DiskManager::new(dir.path().join("test.db")).unwrap());
        let bpm = BufferPoolManager::new(pool_size, 2, dm).unwrap();
        (bpm, dir)
    }

    #[test]
    fn test_buffer_pool_manager_new() {
        let (bpm, _dir) = create_bpm(10);
        assert_eq!(bpm.pool_size(), 10);
        assert_eq!(bpm.free_frame_count(), 10);
    }

    #[test]
    fn test_new_page_is_pinned_and_dirty() {
        let (bpm, _dir) = create_bpm(10);

        let frame = bpm.new_page().unwrap().unwrap();
        let page_id = frame.page_id();
        assert_eq!(page_id, PageId::new(0));
        assert_eq!(bpm.get_pin_count(page_id), Some(1));
        assert_eq!(bpm.is_dirty(page_id), Some(true));
        assert_eq!(bpm.free_frame_count(), 9);

        assert!(bpm.unpin_page(page_id, false));
        assert!(!bpm.unpin_page(page_id, false));
        assert_eq!(bpm.get_pin_count(page_id), Some(0));
    }

    #[test]
    fn test_unpin_unknown_page() {
        let (bpm, _dir) = create_bpm(2);
        assert!(!bpm.unpin_page(PageId::new(7), true));
    }

    #[test]
    fn test_fetch_hit_pins_again() {
        let (bpm, _dir) = create_bpm(2);
        let page_id = bpm.new_page().unwrap().unwrap().page_id();

        let frame = bpm.fetch_page(page_id).unwrap().unwrap();
        assert_eq!(frame.page_id(), page_id);
        assert_eq!(bpm.get_pin_count(page_id), Some(2));
    }

    #[test]
    fn test_flush_clears_dirty() {
        let (bpm, _dir) = create_bpm(2);
        let page_id = bpm.new_page().unwrap().unwrap().page_id();

        assert!(bpm.flush_page(page_id).unwrap());
        assert_eq!(bpm.is_dirty(page_id), Some(false));
        assert_eq!(bpm.get_pin_count(page_id), Some(1));
        assert!(!bpm.flush_page(PageId::new(42)).unwrap());
        assert!(matches!(
            bpm.flush_page(crate::common::INVALID_PAGE_ID),
            Err(StrataError::InvalidPageId(_))
        ));
    }

    #[test]
    fn test_evicted_page_written_back() {
        let (bpm, _dir) = create_bpm(1);

        let frame = bpm.new_page().unwrap().unwrap();
        let page_id = frame.page_id();
        frame.write_data()[0] = 42;
        drop(frame);
        bpm.unpin_page(page_id, true);

        // the only frame is reused, forcing a write-back of page 0
        let other = bpm.new_page().unwrap().unwrap();
        assert_eq!(other.page_id(), PageId::new(1));
        assert_eq!(other.read_data()[0], 0);
        assert_eq!(bpm.get_pin_count(page_id), None);
        bpm.unpin_page(other.page_id(), false);

        let frame = bpm.fetch_page(page_id).unwrap().unwrap();
        assert_eq!(frame.read_data()[0], 42);
    }

    #[test]
    fn test_failed_read_returns_frame() {
        let (bpm, _dir) = create_bpm(2);
        assert!(matches!(
            bpm.fetch_page(PageId::new(5)),
            Err(StrataError::Io(_))
        ));
        assert_eq!(bpm.free_frame_count(), 2);
        assert_eq!(bpm.get_pin_count(PageId::new(5)), None);
    }

    #[test]
    fn test_delete_page() {
        let (bpm, _dir) = create_bpm(10);
        let page_id = bpm.new_page().unwrap().unwrap().page_id();

        // cannot delete while pinned
        assert!(!bpm.delete_page(page_id).unwrap());

        bpm.unpin_page(page_id, true);
        assert!(bpm.delete_page(page_id).unwrap());
        assert_eq!(bpm.get_pin_count(page_id), None);
        assert_eq!(bpm.free_frame_count(), 10);

        // the dirty page was written back before the frame was freed
        assert_eq!(bpm.disk_manager().get_num_pages(), 1);
        assert!(bpm.delete_page(PageId::new(99)).unwrap());
    }

    #[test]
    fn test_reopen_continues_page_ids() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");
        {
            let dm = Arc::new(DiskManager::new(&path).unwrap());
            let bpm = BufferPoolManager::new(4, 2, dm).unwrap();
            for _ in 0..3 {
                let page_id = bpm.new_page().unwrap().unwrap().page_id();
                bpm.unpin_page(page_id, false);
            }
            bpm.flush_entire_pool().unwrap();
        }

        let dm = Arc::new(DiskManager::new(&path).unwrap());
        let bpm = BufferPoolManager::new(4, 2, dm).unwrap();
        assert_eq!(bpm.new_page().unwrap().unwrap().page_id(), PageId::new(3));
    }

    #[test]
    fn test_failed_write_back_keeps_victim() {
        let (bpm, _dir) = create_bpm(2);
        for _ in 0..2 {
            let page_id = bpm.new_page().unwrap().unwrap().page_id();
            bpm.unpin_page(page_id, true);
        }
        assert_eq!(bpm.replacer.size(), 2);
        let victim = bpm.replacer.victim();

        bpm.disk_manager().shutdown().unwrap();
        assert!(matches!(
            bpm.new_page(),
            Err(StrataError::DiskManagerShutdown)
        ));

        // nothing moved: both pages resident, dirty and still evictable
        assert_eq!(bpm.replacer.size(), 2);
        assert_eq!(bpm.replacer.victim(), victim);
        for i in 0..2 {
            assert_eq!(bpm.get_pin_count(PageId::new(i)), Some(0));
            assert_eq!(bpm.is_dirty(PageId::new(i)), Some(true));
        }
    }
}
