use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{select, tick, Sender};
use log::{info, warn};
use parking_lot::{Mutex, RwLock};

use crate::common::{PageId, Result, StrataError, DEFAULT_LOG_FLUSH_INTERVAL, PAGE_SIZE};

/// The append-only log file, shared with the background flusher.
struct LogFile {
    file: RwLock<Option<File>>,
    num_flushes: AtomicU32,
}

impl LogFile {
    fn flush(&self) -> Result<()> {
        let guard = self.file.read();
        let file = guard.as_ref().ok_or(StrataError::DiskManagerShutdown)?;
        file.sync_data()?;
        self.num_flushes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

/// DiskManager is responsible for reading and writing pages to/from disk.
///
/// It manages one database file of concatenated pages, page `n` at byte offset
/// `n * PAGE_SIZE`, and a sibling `<name>.log` file for append-only log
/// records. Each file sits behind its own read/write lock, so page reads run
/// concurrently with each other but never with a page write.
///
/// The log file is fsynced on a fixed interval by a background thread,
/// independent of page writes and explicit [`DiskManager::flush_log`] calls.
pub struct DiskManager {
    /// The database file, `None` once shut down
    db_file: RwLock<Option<File>>,
    /// Path to the database file
    db_path: PathBuf,
    /// Path to the log file
    log_path: PathBuf,
    log: Arc<LogFile>,
    /// Number of pages present in the database file
    num_pages: AtomicU32,
    /// Pages below this id were in the file when it was opened
    pages_on_open: u32,
    /// Pages at or above `pages_on_open` written since then
    written_pages: RwLock<HashSet<PageId>>,
    /// Number of page reads performed
    num_reads: AtomicU32,
    /// Number of page writes performed
    num_writes: AtomicU32,
    /// Stops the log flusher
    flusher_stop: Mutex<Option<Sender<()>>>,
    flusher_handle: Mutex<Option<JoinHandle<()>>>,
}

impl DiskManager {
    /// Opens (or creates) the database file at `db_path` and its log file,
    /// syncing the log every [`DEFAULT_LOG_FLUSH_INTERVAL`].
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        Self::with_flush_interval(db_path, DEFAULT_LOG_FLUSH_INTERVAL)
    }

    /// Opens (or creates) the database file at `db_path` and its log file,
    /// syncing the log every `flush_interval`. A zero interval disables the
    /// background flusher.
    pub fn with_flush_interval<P: AsRef<Path>>(db_path: P, flush_interval: Duration) -> Result<Self> {
        let db_path = db_path.as_ref().to_path_buf();
        let log_path = db_path.with_extension("log");

        let db_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&db_path)?;
        let log_file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&log_path)?;

        let num_pages = (db_file.metadata()?.len() / PAGE_SIZE as u64) as u32;

        let log = Arc::new(LogFile {
            file: RwLock::new(Some(log_file)),
            num_flushes: AtomicU32::new(0),
        });

        let (flusher_stop, flusher_handle) = if flush_interval.is_zero() {
            (None, None)
        } else {
            let (stop_tx, handle) = Self::start_log_flusher(Arc::clone(&log), flush_interval)?;
            (Some(stop_tx), Some(handle))
        };

        info!(
            "opened database {} ({} pages), log {}",
            db_path.display(),
            num_pages,
            log_path.display()
        );

        Ok(Self {
            db_file: RwLock::new(Some(db_file)),
            db_path,
            log_path,
            log,
            num_pages: AtomicU32::new(num_pages),
            pages_on_open: num_pages,
            written_pages: RwLock::new(HashSet::new()),
            num_reads: AtomicU32::new(0),
            num_writes: AtomicU32::new(0),
            flusher_stop: Mutex::new(flusher_stop),
            flusher_handle: Mutex::new(flusher_handle),
        })
    }

    fn start_log_flusher(
        log: Arc<LogFile>,
        interval: Duration,
    ) -> Result<(Sender<()>, JoinHandle<()>)> {
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);
        let handle = thread::Builder::new()
            .name("strata-log-flusher".to_string())
            .spawn(move || {
                let ticker = tick(interval);
                loop {
                    select! {
                        recv(ticker) -> _ => {
                            match log.flush() {
                                Ok(()) => {}
                                Err(StrataError::DiskManagerShutdown) => break,
                                Err(e) => warn!("background log sync failed: {}", e),
                            }
                        }
                        recv(stop_rx) -> _ => break,
                    }
                }
            })?;
        Ok((stop_tx, handle))
    }

    fn check_page_id(page_id: PageId) -> Result<()> {
        if !page_id.is_valid() {
            return Err(StrataError::InvalidPageId(page_id));
        }
        Ok(())
    }

    /// Reads a page from disk into the provided buffer.
    ///
    /// Fails with an I/O error if the page was never written, including
    /// pages in a hole left by a write further out.
    pub fn read_page(&self, page_id: PageId, data: &mut [u8; PAGE_SIZE]) -> Result<()> {
        Self::check_page_id(page_id)?;

        let guard = self.db_file.read();
        let file = guard.as_ref().ok_or(StrataError::DiskManagerShutdown)?;
        if page_id.as_u32() >= self.pages_on_open && !self.written_pages.read().contains(&page_id) {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("{} was never written", page_id),
            )
            .into());
        }
        file.read_exact_at(data, page_id.file_offset())?;

        self.num_reads.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Writes a page to disk from the provided buffer.
    pub fn write_page(&self, page_id: PageId, data: &[u8; PAGE_SIZE]) -> Result<()> {
        Self::check_page_id(page_id)?;

        let guard = self.db_file.write();
        let file = guard.as_ref().ok_or(StrataError::DiskManagerShutdown)?;
        file.write_all_at(data, page_id.file_offset())?;

        if page_id.as_u32() >= self.pages_on_open {
            self.written_pages.write().insert(page_id);
        }
        self.num_pages.fetch_max(page_id.as_u32() + 1, Ordering::AcqRel);
        self.num_writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Appends a record to the log file. Durability follows the next
    /// background sync or an explicit [`DiskManager::flush_log`].
    pub fn write_log(&self, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        let mut guard = self.log.file.write();
        let file = guard.as_mut().ok_or(StrataError::DiskManagerShutdown)?;
        file.write_all(data)?;
        Ok(())
    }

    /// Reads `data.len()` bytes of the log starting at `offset`.
    ///
    /// Returns `false` when `offset` is at or past the end of the log. A read
    /// that runs off the end zero-fills the rest of `data`.
    pub fn read_log(&self, data: &mut [u8], offset: u64) -> Result<bool> {
        let guard = self.log.file.read();
        let file = guard.as_ref().ok_or(StrataError::DiskManagerShutdown)?;

        if offset >= file.metadata()?.len() {
            return Ok(false);
        }

        let mut filled = 0;
        while filled < data.len() {
            let n = file.read_at(&mut data[filled..], offset + filled as u64)?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        data[filled..].fill(0);
        Ok(true)
    }

    /// Forces buffered log records to stable storage.
    pub fn flush_log(&self) -> Result<()> {
        self.log.flush()
    }

    /// Flushes the database file to stable storage.
    pub fn sync(&self) -> Result<()> {
        let guard = self.db_file.read();
        let file = guard.as_ref().ok_or(StrataError::DiskManagerShutdown)?;
        file.sync_all()?;
        Ok(())
    }

    /// Stops the log flusher, syncs both files and closes them.
    /// Every later operation fails with [`StrataError::DiskManagerShutdown`].
    pub fn shutdown(&self) -> Result<()> {
        if let Some(stop) = self.flusher_stop.lock().take() {
            let _ = stop.send(());
        }
        if let Some(handle) = self.flusher_handle.lock().take() {
            let _ = handle.join();
        }

        let db_file = self.db_file.write().take();
        let log_file = self.log.file.write().take();
        if db_file.is_none() && log_file.is_none() {
            return Ok(());
        }
        if let Some(file) = db_file {
            file.sync_all()?;
        }
        if let Some(file) = log_file {
            file.sync_all()?;
        }

        info!("closed database {}", self.db_path.display());
        Ok(())
    }

    /// Returns true once [`DiskManager::shutdown`] has run.
    pub fn is_shutdown(&self) -> bool {
        self.db_file.read().is_none()
    }

    /// Returns the number of pages present in the database file.
    pub fn get_num_pages(&self) -> u32 {
        self.num_pages.load(Ordering::Acquire)
    }

    /// Returns the number of disk reads performed.
    pub fn get_num_reads(&self) -> u32 {
        self.num_reads.load(Ordering::Relaxed)
    }

    /// Returns the number of disk writes performed.
    pub fn get_num_writes(&self) -> u32 {
        self.num_writes.load(Ordering::Relaxed)
    }

    /// Returns the number of log syncs performed, background ones included.
    pub fn get_num_log_flushes(&self) -> u32 {
        self.log.num_flushes.load(Ordering::Relaxed)
    }

    /// Returns the path to the database file.
    pub fn get_db_path(&self) -> &Path {
        &self.db_path
    }

    /// Returns the path to the log file.
    pub fn get_log_path(&self) -> &Path {
        &self.log_path
    }
}

impl Drop for DiskManager {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            warn!("disk manager shutdown failed: {}", e);
        }
    }
}
