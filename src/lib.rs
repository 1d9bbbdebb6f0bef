//! # lazylog
//! Lazy disk-backed append logger with cross-process advisory file locking.
//!
//! Producers call [`LazyLogger::log`] and return immediately; a dedicated
//! background thread drains the queue and appends each record to the
//! target file as one newline-terminated line. Every write happens under
//! an exclusive advisory lock on the file, so cooperating processes
//! appending to the same path never interleave lines. The lock and the
//! file handle are reacquired per record and never held between writes.
//!
//! ## Usage
//! ```rust
//! use lazylog::LazyLogger;
//!
//! let path = std::env::temp_dir().join("lazylog-doc.log");
//! std::fs::remove_file(&path).ok();
//!
//! let logger = LazyLogger::builder(&path).spawn().unwrap();
//! logger.log("A");
//! logger.log("B");
//! logger.shutdown(); // drains everything queued so far
//! assert_eq!(std::fs::read_to_string(&path).unwrap(), "A\nB\n");
//! ```
//!
//! ## Delivery semantics
//! Delivery is best-effort: `log` never surfaces an error, and a write
//! cycle that fails (missing directory, unusable handle, lock budget
//! exhausted) is reported through the `log` facade at warn level and
//! the record abandoned. The writer thread survives arbitrary per-cycle
//! I/O failures and keeps serving subsequent records until shutdown.
//!
//! The target path is fixed at construction. There is no runtime
//! reconfiguration; build a new logger instead.
//!
//! ## Tuning
//! Lock-retry backoff defaults come from the environment
//! (`LAZYLOG_LOCK_RETRY_BASE_MS`, `LAZYLOG_LOCK_RETRY_MAX_MS`,
//! `LAZYLOG_LOCK_MAX_RETRIES`) and can be overridden per logger:
//! ```rust
//! use std::time::Duration;
//! use lazylog::{LazyLogger, RetryPolicy};
//!
//! let path = std::env::temp_dir().join("lazylog-doc-tuned.log");
//! let logger = LazyLogger::builder(&path)
//!     .retry_policy(RetryPolicy {
//!         base_delay: Duration::from_millis(5),
//!         max_delay: Duration::from_millis(200),
//!         max_attempts: 20,
//!     })
//!     .queue_capacity(10_000)
//!     .spawn()
//!     .unwrap();
//! logger.log("tuned");
//! ```

mod config;
mod lock;
mod queue;
mod worker;

pub use config::{LAZYLOG_CONFIG, LazylogConfig};
pub use lock::RetryPolicy;

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use queue::RecordQueue;

/// An explicitly owned append logger. One writer thread per instance; no
/// process-wide singleton. Wrap it in an `Arc` to share across threads.
///
/// Dropping the logger performs a graceful [`shutdown`](Self::shutdown).
pub struct LazyLogger {
    queue: RecordQueue,
    cancel: Arc<AtomicBool>,
    handle: Mutex<Option<JoinHandle<bool>>>,
}

impl LazyLogger {
    /// Starts configuring a logger for the given target file.
    pub fn builder<P: AsRef<Path>>(path: P) -> LazyLoggerBuilder {
        LazyLoggerBuilder {
            path: path.as_ref().to_path_buf(),
            queue_capacity: None,
            retry: RetryPolicy::default(),
        }
    }

    /// Submits a record for appending. Fire-and-forget: returns in
    /// bounded time regardless of the writer's state and never surfaces
    /// an error. Failures are only observable through the `log` facade.
    pub fn log<S: Into<String>>(&self, record: S) {
        self.queue.submit(record.into());
    }

    /// Stops the writer after it has drained every record queued so far,
    /// then joins it. Idempotent; also runs on drop.
    pub fn shutdown(&self) {
        self.join_worker();
    }

    /// Stops the writer quickly: queued records still go through the
    /// loop, but their lock acquisitions are cancelled and each abandoned
    /// record is reported. Use when draining would take too long.
    pub fn abort(&self) {
        self.cancel.store(true, Ordering::Relaxed);
        self.join_worker();
    }

    fn join_worker(&self) {
        let mut guard = self.handle.lock().unwrap();
        if let Some(handle) = guard.take() {
            self.queue.close();
            if !handle.join().expect("unable to join writer thread") {
                panic!("writer thread shutdown failed");
            }
        }
    }
}

impl Drop for LazyLogger {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Builder for a [`LazyLogger`].
pub struct LazyLoggerBuilder {
    path: PathBuf,
    queue_capacity: Option<usize>,
    retry: RetryPolicy,
}

impl LazyLoggerBuilder {
    /// Bounds the record queue. The default queue is unbounded; with a
    /// bound, submissions to a full queue are dropped (and reported)
    /// rather than blocking the producer.
    pub fn queue_capacity(self, capacity: usize) -> Self {
        Self {
            queue_capacity: Some(capacity),
            ..self
        }
    }

    /// Overrides the environment-derived lock retry tuning.
    pub fn retry_policy(self, retry: RetryPolicy) -> Self {
        Self { retry, ..self }
    }

    /// Spawns the writer thread and returns the logger. The target path
    /// is not validated here: a missing directory or unwritable file
    /// shows up as a reported error per write cycle, and the writer keeps
    /// accepting records.
    pub fn spawn(self) -> io::Result<LazyLogger> {
        let (queue, drain) = queue::record_queue(self.queue_capacity);
        let cancel = Arc::new(AtomicBool::new(false));
        let handle = worker::spawn(self.path, drain, self.retry, Arc::clone(&cancel))?;
        Ok(LazyLogger {
            queue,
            cancel,
            handle: Mutex::new(Some(handle)),
        })
    }
}
