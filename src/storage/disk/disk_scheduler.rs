use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{info, warn};
use parking_lot::{Mutex, RwLock};

use crate::common::{PageId, Result, SharedPageData, StrataError};

use super::DiskManager;

/// Represents a disk I/O request
pub struct DiskRequest {
    /// Whether this is a write (true) or read (false) request
    pub is_write: bool,
    /// The page to read/write
    pub page_id: PageId,
    /// For reads: the page is read into this buffer.
    /// For writes: the page is written from this buffer.
    pub data: SharedPageData,
    /// Signalled exactly once with the outcome of the request
    pub callback: Sender<Result<()>>,
}

impl DiskRequest {
    /// Creates a read request and the handle that waits for it.
    pub fn read(page_id: PageId, data: SharedPageData) -> (Self, DiskCompletion) {
        Self::build(false, page_id, data)
    }

    /// Creates a write request and the handle that waits for it.
    pub fn write(page_id: PageId, data: SharedPageData) -> (Self, DiskCompletion) {
        Self::build(true, page_id, data)
    }

    fn build(is_write: bool, page_id: PageId, data: SharedPageData) -> (Self, DiskCompletion) {
        let (callback, receiver) = crossbeam_channel::bounded(1);
        let request = Self {
            is_write,
            page_id,
            data,
            callback,
        };
        (request, DiskCompletion { receiver })
    }
}

/// One-shot completion signal of a scheduled [`DiskRequest`].
pub struct DiskCompletion {
    receiver: Receiver<Result<()>>,
}

impl DiskCompletion {
    /// Blocks until the worker has processed the request and returns its outcome.
    pub fn wait(self) -> Result<()> {
        self.receiver
            .recv()
            .map_err(|e| StrataError::Channel(format!("Failed to receive completion: {}", e)))?
    }
}

enum Message {
    Request(DiskRequest),
    Shutdown,
}

/// DiskScheduler manages a background worker thread that processes disk I/O requests.
///
/// Requests are executed one at a time, strictly in the order they were
/// scheduled, from any number of producer threads.
pub struct DiskScheduler {
    /// The disk manager for actual I/O operations
    disk_manager: Arc<DiskManager>,
    /// Request queue, `None` once shut down
    request_sender: RwLock<Option<Sender<Message>>>,
    /// Handle to the background worker thread
    worker_handle: Mutex<Option<JoinHandle<()>>>,
}

impl DiskScheduler {
    /// Creates a new DiskScheduler with the given DiskManager.
    /// Spawns a background worker thread to process requests.
    pub fn new(disk_manager: Arc<DiskManager>) -> Result<Self> {
        let (sender, receiver) = unbounded::<Message>();

        let dm = Arc::clone(&disk_manager);
        let worker_handle = thread::Builder::new()
            .name("strata-disk-scheduler".to_string())
            .spawn(move || Self::run_worker(dm, receiver))?;

        info!("disk scheduler started for {}", disk_manager.get_db_path().display());

        Ok(Self {
            disk_manager,
            request_sender: RwLock::new(Some(sender)),
            worker_handle: Mutex::new(Some(worker_handle)),
        })
    }

    /// Schedules a disk request for processing by the background worker.
    /// Returns immediately; the outcome arrives on the request's callback.
    pub fn schedule(&self, request: DiskRequest) -> Result<()> {
        let guard = self.request_sender.read();
        let sender = guard.as_ref().ok_or(StrataError::SchedulerShutdown)?;
        sender
            .send(Message::Request(request))
            .map_err(|e| StrataError::Channel(format!("Failed to schedule request: {}", e)))
    }

    /// Schedules a read of `page_id` into `data` and waits for completion.
    pub fn schedule_read_sync(&self, page_id: PageId, data: &SharedPageData) -> Result<()> {
        let (request, completion) = DiskRequest::read(page_id, Arc::clone(data));
        self.schedule(request)?;
        completion.wait()
    }

    /// Schedules a write of `data` to `page_id` and waits for completion.
    pub fn schedule_write_sync(&self, page_id: PageId, data: &SharedPageData) -> Result<()> {
        let (request, completion) = DiskRequest::write(page_id, Arc::clone(data));
        self.schedule(request)?;
        completion.wait()
    }

    /// Stops accepting requests, lets the worker finish everything already
    /// queued and joins it. Safe to call more than once.
    pub fn shutdown(&self) {
        let sender = self.request_sender.write().take();
        if let Some(sender) = sender {
            let _ = sender.send(Message::Shutdown);
        }
        if let Some(handle) = self.worker_handle.lock().take() {
            if handle.join().is_err() {
                warn!("disk scheduler worker panicked");
            }
            info!("disk scheduler stopped");
        }
    }

    /// Returns true once [`DiskScheduler::shutdown`] has run.
    pub fn is_shutdown(&self) -> bool {
        self.request_sender.read().is_none()
    }

    /// The background worker. Runs until the shutdown message, which is
    /// always the last message queued.
    fn run_worker(disk_manager: Arc<DiskManager>, receiver: Receiver<Message>) {
        for message in receiver.iter() {
            match message {
                Message::Request(request) => Self::process_request(&disk_manager, request),
                Message::Shutdown => break,
            }
        }
    }

    /// Processes a single disk request and signals its completion.
    fn process_request(disk_manager: &DiskManager, request: DiskRequest) {
        let result = if request.is_write {
            let data = request.data.read();
            disk_manager.write_page(request.page_id, &data)
        } else {
            let mut data = request.data.write();
            disk_manager.read_page(request.page_id, &mut data)
        };

        if let Err(e) = &result {
            warn!(
                "disk {} of {} failed: {}",
                if request.is_write { "write" } else { "read" },
                request.page_id,
                e
            );
        }

        // the issuer may have stopped waiting
        let _ = request.callback.send(result);
    }

    /// Returns a reference to the underlying DiskManager.
    pub fn disk_manager(&self) -> &Arc<DiskManager> {
        &self.disk_manager
    }
}

impl Drop for DiskScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}
