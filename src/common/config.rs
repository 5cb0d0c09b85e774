use std::time::Duration;

use serde::Deserialize;

use super::error::Result;
use super::types::{FrameId, PageId};

/// Size of a page in bytes (4 KB)
pub const PAGE_SIZE: usize = 4096;

/// Invalid page ID constant
pub const INVALID_PAGE_ID: PageId = PageId(u32::MAX);

/// Invalid frame ID constant
pub const INVALID_FRAME_ID: FrameId = FrameId(u32::MAX);

/// Default K value for LRU-K replacement policy
pub const DEFAULT_LRUK_K: usize = 2;

/// Default buffer pool size (number of frames)
pub const DEFAULT_BUFFER_POOL_SIZE: usize = 10;

/// Default interval between background fsyncs of the log file
pub const DEFAULT_LOG_FLUSH_INTERVAL: Duration = Duration::from_millis(1000);

/// Runtime configuration of a storage engine instance.
///
/// Passed explicitly to the constructors that need it; nothing reads it from
/// global state.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StorageConfig {
    /// Number of frames in the buffer pool
    pub pool_size: usize,
    /// K of the LRU-K replacer
    pub replacer_k: usize,
    /// Milliseconds between background fsyncs of the log file
    pub log_flush_interval_ms: u64,
    /// Log level used by the demo binary (`error`, `warn`, `info`, `debug`, `trace`)
    pub log_level: String,
}

impl StorageConfig {
    /// Loads the configuration from defaults, an optional file and `STRATA_*`
    /// environment variables, in increasing order of precedence. An empty
    /// `file` skips the file source.
    pub fn load(file: &str) -> Result<StorageConfig> {
        let mut cfg = config::Config::builder()
            .set_default("pool_size", DEFAULT_BUFFER_POOL_SIZE as i64)?
            .set_default("replacer_k", DEFAULT_LRUK_K as i64)?
            .set_default(
                "log_flush_interval_ms",
                DEFAULT_LOG_FLUSH_INTERVAL.as_millis() as i64,
            )?
            .set_default("log_level", "info")?;
        if !file.is_empty() {
            cfg = cfg.add_source(config::File::with_name(file));
        }
        cfg = cfg.add_source(config::Environment::with_prefix("STRATA"));
        Ok(cfg.build()?.try_deserialize()?)
    }

    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    pub fn with_replacer_k(mut self, k: usize) -> Self {
        self.replacer_k = k;
        self
    }

    pub fn with_log_flush_interval(mut self, interval: Duration) -> Self {
        self.log_flush_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn log_flush_interval(&self) -> Duration {
        Duration::from_millis(self.log_flush_interval_ms)
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            pool_size: DEFAULT_BUFFER_POOL_SIZE,
            replacer_k: DEFAULT_LRUK_K,
            log_flush_interval_ms: DEFAULT_LOG_FLUSH_INTERVAL.as_millis() as u64,
            log_level: "info".to_string(),
        }
    }
}
