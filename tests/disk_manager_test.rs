//! Integration tests for the disk manager

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use strata::common::PAGE_SIZE;
use strata::storage::disk::DiskManager;
use strata::{PageId, StrataError};
use tempfile::tempdir;

fn page_filled_with(byte: u8) -> [u8; PAGE_SIZE] {
    [byte; PAGE_SIZE]
}

#[test]
fn test_pages_persist_across_reopen() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("test.db");

    {
        let dm = DiskManager::new(&db_path).unwrap();
        for i in 0..4u32 {
            dm.write_page(PageId::new(i), &page_filled_with(i as u8 + 1))
                .unwrap();
        }
        assert_eq!(dm.get_num_pages(), 4);
        assert_eq!(dm.get_num_writes(), 4);
        dm.shutdown().unwrap();
    }

    let dm = DiskManager::new(&db_path).unwrap();
    assert_eq!(dm.get_num_pages(), 4);
    assert_eq!(dm.get_num_writes(), 0);

    let mut buf = [0u8; PAGE_SIZE];
    for i in (0..4u32).rev() {
        dm.read_page(PageId::new(i), &mut buf).unwrap();
        assert_eq!(buf, page_filled_with(i as u8 + 1));
    }
    assert_eq!(dm.get_num_reads(), 4);
}

#[test]
fn test_overwrite_page() {
    let dir = tempdir().unwrap();
    let dm = DiskManager::new(dir.path().join("test.db")).unwrap();

    dm.write_page(PageId::new(0), &page_filled_with(0xAA)).unwrap();
    dm.write_page(PageId::new(0), &page_filled_with(0x55)).unwrap();
    assert_eq!(dm.get_num_pages(), 1);

    let mut buf = [0u8; PAGE_SIZE];
    dm.read_page(PageId::new(0), &mut buf).unwrap();
    assert_eq!(buf, page_filled_with(0x55));
}

#[test]
fn test_read_beyond_end_fails() {
    let dir = tempdir().unwrap();
    let dm = DiskManager::new(dir.path().join("test.db")).unwrap();
    dm.write_page(PageId::new(0), &page_filled_with(1)).unwrap();

    let mut buf = [0u8; PAGE_SIZE];
    let err = dm.read_page(PageId::new(1), &mut buf).unwrap_err();
    assert!(matches!(err, StrataError::Io(_)));
}

#[test]
fn test_log_file_sits_next_to_database() {
    let dir = tempdir().unwrap();
    let dm = DiskManager::new(dir.path().join("test.db")).unwrap();

    assert_eq!(dm.get_db_path(), dir.path().join("test.db"));
    assert_eq!(dm.get_log_path(), dir.path().join("test.log"));
    assert!(dm.get_log_path().exists());
}

#[test]
fn test_log_append_and_read() {
    let dir = tempdir().unwrap();
    let dm = DiskManager::with_flush_interval(dir.path().join("test.db"), Duration::ZERO).unwrap();

    dm.write_log(b"first;").unwrap();
    dm.write_log(b"second;").unwrap();
    dm.flush_log().unwrap();
    assert_eq!(dm.get_num_log_flushes(), 1);

    let mut buf = [0u8; 13];
    assert!(dm.read_log(&mut buf, 0).unwrap());
    assert_eq!(&buf, b"first;second;");

    // a read past the tail is zero padded
    let mut buf = [0xFFu8; 10];
    assert!(dm.read_log(&mut buf, 6).unwrap());
    assert_eq!(&buf[..7], b"second;");
    assert_eq!(&buf[7..], &[0, 0, 0]);

    let mut buf = [0u8; 4];
    assert!(!dm.read_log(&mut buf, 13).unwrap());
}

#[test]
fn test_background_log_flush() {
    let dir = tempdir().unwrap();
    let dm = DiskManager::with_flush_interval(
        dir.path().join("test.db"),
        Duration::from_millis(10),
    )
    .unwrap();

    dm.write_log(b"tick").unwrap();
    thread::sleep(Duration::from_millis(200));
    assert!(dm.get_num_log_flushes() >= 1);

    dm.shutdown().unwrap();
    let after_shutdown = dm.get_num_log_flushes();
    thread::sleep(Duration::from_millis(50));
    assert_eq!(dm.get_num_log_flushes(), after_shutdown);
}

#[test]
fn test_concurrent_page_io() {
    let dir = tempdir().unwrap();
    let dm = Arc::new(DiskManager::new(dir.path().join("test.db")).unwrap());

    let handles: Vec<_> = (0..8u32)
        .map(|t| {
            let dm = Arc::clone(&dm);
            thread::spawn(move || {
                for n in 0..8u32 {
                    let page_id = PageId::new(t * 8 + n);
                    let byte = (t * 8 + n) as u8;
                    dm.write_page(page_id, &page_filled_with(byte)).unwrap();

                    let mut buf = [0u8; PAGE_SIZE];
                    dm.read_page(page_id, &mut buf).unwrap();
                    assert_eq!(buf, page_filled_with(byte));
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(dm.get_num_pages(), 64);
    assert_eq!(dm.get_num_writes(), 64);
    assert_eq!(dm.get_num_reads(), 64);
}

#[test]
fn test_shutdown_is_idempotent() {
    let dir = tempdir().unwrap();
    let dm = DiskManager::new(dir.path().join("test.db")).unwrap();
    dm.write_page(PageId::new(0), &page_filled_with(9)).unwrap();

    dm.shutdown().unwrap();
    dm.shutdown().unwrap();
    assert!(dm.is_shutdown());

    let mut buf = [0u8; PAGE_SIZE];
    assert!(matches!(
        dm.read_page(PageId::new(0), &mut buf),
        Err(StrataError::DiskManagerShutdown)
    ));
    assert!(matches!(
        dm.write_log(b"late"),
        Err(StrataError::DiskManagerShutdown)
    ));
}
