//! Integration tests for the buffer pool manager

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use rand::Rng;
use strata::buffer::BufferPoolManager;
use strata::common::PAGE_SIZE;
use strata::storage::disk::DiskManager;
use strata::PageId;
use tempfile::{tempdir, TempDir};

fn create_bpm(pool_size: usize, k: usize) -> (TempDir, BufferPoolManager) {
    let dir = tempdir().unwrap();
    let dm = Arc::new(DiskManager::new(dir.path().join("test.db")).unwrap());
    let bpm = BufferPoolManager::new(pool_size, k, dm).unwrap();
    (dir, bpm)
}

#[test]
fn test_binary_data_survives_eviction() {
    let pool_size = 10;
    let (_dir, bpm) = create_bpm(pool_size, 5);

    let page0 = bpm.new_page().unwrap().unwrap();
    assert_eq!(page0.page_id(), PageId::new(0));

    let mut random_data = [0u8; PAGE_SIZE];
    rand::thread_rng().fill(&mut random_data[..]);
    // zero bytes in the middle and at the end must survive too
    random_data[PAGE_SIZE / 2] = 0;
    random_data[PAGE_SIZE - 1] = 0;
    page0.write_data().copy_from_slice(&random_data);
    assert_eq!(page0.read_data().as_slice(), &random_data[..]);

    for _ in 1..pool_size {
        assert!(bpm.new_page().unwrap().is_some());
    }

    // every frame is pinned
    for _ in pool_size..pool_size * 2 {
        assert!(bpm.new_page().unwrap().is_none());
    }

    for i in 0..5 {
        assert!(bpm.unpin_page(PageId::new(i), true));
        assert!(bpm.flush_page(PageId::new(i)).unwrap());
    }
    for _ in 0..5 {
        let frame = bpm.new_page().unwrap().unwrap();
        assert!(bpm.unpin_page(frame.page_id(), false));
    }

    let page0 = bpm.fetch_page(PageId::new(0)).unwrap().unwrap();
    assert_eq!(page0.read_data().as_slice(), &random_data[..]);
    assert!(bpm.unpin_page(PageId::new(0), true));
}

#[test]
fn test_sample_scenario() {
    let pool_size = 10;
    let (_dir, bpm) = create_bpm(pool_size, 5);

    let page0 = bpm.new_page().unwrap().unwrap();
    assert_eq!(page0.page_id(), PageId::new(0));
    page0.write_data()[..5].copy_from_slice(b"Hello");

    for i in 1..pool_size as u32 {
        let frame = bpm.new_page().unwrap().unwrap();
        assert_eq!(frame.page_id(), PageId::new(i));
    }
    for _ in pool_size..pool_size * 2 {
        assert!(bpm.new_page().unwrap().is_none());
    }

    // after unpinning 0..5 and creating four pages, one frame is left
    // to read page 0 back into
    for i in 0..5 {
        assert!(bpm.unpin_page(PageId::new(i), true));
    }
    for _ in 0..4 {
        assert!(bpm.new_page().unwrap().is_some());
    }

    let page0 = bpm.fetch_page(PageId::new(0)).unwrap().unwrap();
    assert_eq!(&page0.read_data()[..5], b"Hello");

    // once page 0 is unpinned its frame is the only candidate, so the new
    // page takes it and page 0 cannot come back
    assert!(bpm.unpin_page(PageId::new(0), true));
    assert!(bpm.new_page().unwrap().is_some());
    assert!(bpm.fetch_page(PageId::new(0)).unwrap().is_none());
}

#[test]
fn test_exactly_pool_size_pages_fit() {
    for pool_size in [1, 3, 7, 16] {
        let (_dir, bpm) = create_bpm(pool_size, 2);

        let pinned: Vec<_> = (0..pool_size)
            .map(|_| bpm.new_page().unwrap())
            .collect();
        assert!(pinned.iter().all(Option::is_some));
        assert_eq!(bpm.free_frame_count(), 0);
        assert!(bpm.new_page().unwrap().is_none());

        // releasing one pin frees exactly one slot
        assert!(bpm.unpin_page(PageId::new(0), false));
        assert!(bpm.new_page().unwrap().is_some());
        assert!(bpm.new_page().unwrap().is_none());
    }
}

#[test]
fn test_guards_persist_across_reopen() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("test.db");

    {
        let dm = Arc::new(DiskManager::new(&db_path).unwrap());
        let bpm = BufferPoolManager::new(4, 2, dm).unwrap();

        for i in 0..8u8 {
            let mut guard = bpm.new_page_write().unwrap().unwrap();
            guard.data_mut()[0] = i;
            guard.data_mut()[PAGE_SIZE - 1] = i.wrapping_mul(3);
        }
        bpm.flush_entire_pool().unwrap();
    }

    let dm = Arc::new(DiskManager::new(&db_path).unwrap());
    assert_eq!(dm.get_num_pages(), 8);
    let bpm = BufferPoolManager::new(4, 2, dm).unwrap();

    for i in 0..8u8 {
        let guard = bpm.fetch_page_read(PageId::new(i as u32)).unwrap().unwrap();
        assert_eq!(guard[0], i);
        assert_eq!(guard[PAGE_SIZE - 1], i.wrapping_mul(3));
    }

    // allocation continues after the existing pages
    let frame = bpm.new_page().unwrap().unwrap();
    assert_eq!(frame.page_id(), PageId::new(8));
}

#[test]
fn test_delete_page() {
    let (_dir, bpm) = create_bpm(2, 2);

    let frame = bpm.new_page().unwrap().unwrap();
    let page_id = frame.page_id();
    frame.write_data()[0] = 0x5A;

    // pinned pages stay
    assert!(!bpm.delete_page(page_id).unwrap());

    assert!(bpm.unpin_page(page_id, true));
    assert!(bpm.delete_page(page_id).unwrap());
    assert_eq!(bpm.get_pin_count(page_id), None);
    assert_eq!(bpm.free_frame_count(), 2);

    // non-resident pages count as deleted
    assert!(bpm.delete_page(PageId::new(42)).unwrap());

    // the dirty bytes were written back before the frame was released
    let guard = bpm.fetch_page_read(page_id).unwrap().unwrap();
    assert_eq!(guard[0], 0x5A);
}

#[test]
fn test_concurrent_fetch_same_page() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("test.db");

    {
        let dm = Arc::new(DiskManager::new(&db_path).unwrap());
        let bpm = BufferPoolManager::new(2, 2, dm).unwrap();
        let mut guard = bpm.new_page_write().unwrap().unwrap();
        guard.data_mut()[..4].copy_from_slice(b"spam");
        drop(guard);
        bpm.flush_page(PageId::new(0)).unwrap();
    }

    let dm = Arc::new(DiskManager::new(&db_path).unwrap());
    let bpm = BufferPoolManager::new(2, 2, dm).unwrap();
    let num_threads: u32 = 8;

    let frame_ids: Vec<_> = thread::scope(|s| {
        let handles: Vec<_> = (0..num_threads)
            .map(|_| {
                s.spawn(|| {
                    let frame = bpm.fetch_page(PageId::new(0)).unwrap().unwrap();
                    assert_eq!(&frame.read_data()[..4], b"spam");
                    frame.frame_id()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    // one read, one frame, every pin accounted for
    assert!(frame_ids.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(bpm.get_pin_count(PageId::new(0)), Some(num_threads));
    assert_eq!(bpm.free_frame_count(), 1);

    for _ in 0..num_threads {
        assert!(bpm.unpin_page(PageId::new(0), false));
    }
    assert!(!bpm.unpin_page(PageId::new(0), false));
}

#[test]
fn test_concurrent_writers_with_eviction() {
    let (_dir, bpm) = create_bpm(4, 2);
    let num_threads = 8;
    let pages_per_thread = 16;

    thread::scope(|s| {
        for t in 0..num_threads {
            let bpm = &bpm;
            s.spawn(move || {
                let mut mine = Vec::with_capacity(pages_per_thread);
                for n in 0..pages_per_thread {
                    let mut guard = loop {
                        if let Some(guard) = bpm.new_page_write().unwrap() {
                            break guard;
                        }
                        thread::yield_now();
                    };
                    guard.data_mut()[0] = t as u8;
                    guard.data_mut()[1] = n as u8;
                    mine.push(guard.page_id());
                }

                for (n, page_id) in mine.into_iter().enumerate() {
                    let guard = loop {
                        if let Some(guard) = bpm.fetch_page_read(page_id).unwrap() {
                            break guard;
                        }
                        thread::yield_now();
                    };
                    assert_eq!(guard[0], t as u8);
                    assert_eq!(guard[1], n as u8);
                }
            });
        }
    });

    // whatever was not written back on eviction reaches disk here
    bpm.flush_entire_pool().unwrap();
    assert_eq!(
        bpm.disk_manager().get_num_pages() as usize,
        num_threads * pages_per_thread
    );
}

#[test]
fn test_flush_waits_for_writer_without_stalling_pool() {
    let (_dir, bpm) = create_bpm(3, 2);

    for i in 0..2u8 {
        let mut guard = bpm.new_page_write().unwrap().unwrap();
        guard.data_mut()[0] = i;
    }
    bpm.flush_entire_pool().unwrap();
    // page 1 is on disk but not resident, so fetching it is a miss
    assert!(bpm.delete_page(PageId::new(1)).unwrap());

    let mut writer = bpm.fetch_page_write(PageId::new(0)).unwrap().unwrap();
    writer.data_mut()[0] = 0xEE;

    thread::scope(|s| {
        let (flushed_tx, flushed_rx) = crossbeam_channel::bounded(1);
        let (fetched_tx, fetched_rx) = crossbeam_channel::bounded(1);

        let bpm = &bpm;
        s.spawn(move || {
            let flushed = bpm.flush_page(PageId::new(0)).unwrap();
            flushed_tx.send(flushed).unwrap();
        });
        s.spawn(move || {
            let guard = bpm.fetch_page_read(PageId::new(1)).unwrap().unwrap();
            let byte = guard[0];
            drop(guard);
            fetched_tx.send(byte).unwrap();
        });

        // the miss and the pool latch are not held up by the pending flush
        assert_eq!(fetched_rx.recv_timeout(Duration::from_secs(5)), Ok(1));
        assert_eq!(bpm.get_pin_count(PageId::new(1)), Some(0));
        assert!(flushed_rx.try_recv().is_err());

        drop(writer);
        assert_eq!(flushed_rx.recv_timeout(Duration::from_secs(5)), Ok(true));
    });

    assert_eq!(bpm.is_dirty(PageId::new(0)), Some(false));
    let mut buf = [0u8; PAGE_SIZE];
    bpm.disk_manager().read_page(PageId::new(0), &mut buf).unwrap();
    assert_eq!(buf[0], 0xEE);
}
