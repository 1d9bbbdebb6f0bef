use std::fs::File;
use std::io::{self, ErrorKind, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use fs2::FileExt;

use crate::config::LAZYLOG_CONFIG;

/// Outcome of a single advisory-lock attempt on an open handle.
///
/// `Busy` covers both "held elsewhere" and transient locking errors: the
/// caller should retry. `Unavailable` means the handle itself is unusable
/// (e.g. closed underneath us) and retrying can never succeed.
pub(crate) enum LockAttempt {
    Acquired,
    Busy,
    Unavailable(io::Error),
}

fn classify(err: io::Error) -> LockAttempt {
    match err.kind() {
        ErrorKind::WouldBlock | ErrorKind::Interrupted => LockAttempt::Busy,
        _ => LockAttempt::Unavailable(err),
    }
}

fn try_lock(file: &File) -> LockAttempt {
    match file.try_lock_exclusive() {
        Ok(()) => LockAttempt::Acquired,
        Err(err) => classify(err),
    }
}

/// Tuning for the lock-acquisition retry loop. Defaults come from the
/// `LAZYLOG_*` environment.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(LAZYLOG_CONFIG.LOCK_RETRY_BASE_MS),
            max_delay: Duration::from_millis(LAZYLOG_CONFIG.LOCK_RETRY_MAX_MS),
            max_attempts: LAZYLOG_CONFIG.LOCK_MAX_RETRIES,
        }
    }
}

impl RetryPolicy {
    fn delay(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(self.max_delay)
    }
}

/// Acquires an exclusive advisory lock on `file`, retrying while the lock
/// is busy with exponential backoff up to the policy's attempt budget.
///
/// Returns an error without retrying when the handle is unusable, when
/// the budget is exhausted (`TimedOut`), or when `cancel` is raised
/// (`Interrupted`). The cancellation flag is checked once per attempt.
pub(crate) fn acquire(
    file: File,
    policy: &RetryPolicy,
    cancel: &AtomicBool,
) -> io::Result<LockedFile> {
    let mut attempt = 0u32;
    loop {
        if cancel.load(Ordering::Relaxed) {
            return Err(io::Error::new(
                ErrorKind::Interrupted,
                "logger is shutting down",
            ));
        }
        match try_lock(&file) {
            LockAttempt::Acquired => {
                return Ok(LockedFile {
                    file,
                    released: false,
                });
            }
            LockAttempt::Unavailable(err) => return Err(err),
            LockAttempt::Busy => {
                if attempt >= policy.max_attempts {
                    return Err(io::Error::new(
                        ErrorKind::TimedOut,
                        format!("lock still busy after {} attempts", attempt + 1),
                    ));
                }
                std::thread::sleep(policy.delay(attempt));
                attempt += 1;
            }
        }
    }
}

/// A file handle with a held exclusive lock. Valid for one write cycle:
/// release it (or drop it) and both the lock and the handle are gone.
#[derive(Debug)]
pub(crate) struct LockedFile {
    file: File,
    released: bool,
}

impl LockedFile {
    /// Appends the record plus a newline in a single write. The handle is
    /// opened in append mode, so the write lands at the current
    /// end-of-file rather than a cached offset.
    pub(crate) fn append_line(&mut self, record: &str) -> io::Result<()> {
        let mut line = String::with_capacity(record.len() + 1);
        line.push_str(record);
        line.push('\n');
        self.file.write_all(line.as_bytes())
    }

    /// Releases the lock and closes the handle. A failed unlock is
    /// reported, never silently swallowed.
    pub(crate) fn release(mut self) {
        self.released = true;
        if let Err(err) = FileExt::unlock(&self.file) {
            log::warn!("failed to release file lock: {err}");
        }
    }
}

impl Drop for LockedFile {
    fn drop(&mut self) {
        if !self.released {
            let _ = FileExt::unlock(&self.file);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::OpenOptions;
    use std::sync::atomic::AtomicBool;
    use tempfile::TempDir;

    fn open_rw(path: &std::path::Path) -> File {
        OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)
            .unwrap()
    }

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            max_attempts,
        }
    }

    #[test]
    fn classifies_would_block_as_busy() {
        assert!(matches!(
            classify(io::Error::from(ErrorKind::WouldBlock)),
            LockAttempt::Busy
        ));
    }

    #[test]
    fn classifies_transient_interrupt_as_busy() {
        assert!(matches!(
            classify(io::Error::from(ErrorKind::Interrupted)),
            LockAttempt::Busy
        ));
    }

    #[cfg(unix)]
    #[test]
    fn classifies_dead_handle_as_unavailable() {
        let attempt = classify(io::Error::from_raw_os_error(libc::EBADF));
        assert!(matches!(attempt, LockAttempt::Unavailable(_)));
    }

    #[test]
    fn contended_lock_reads_as_busy() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("contended.log");
        let holder = open_rw(&path);
        holder.try_lock_exclusive().unwrap();
        assert!(matches!(try_lock(&open_rw(&path)), LockAttempt::Busy));
    }

    #[test]
    fn acquire_times_out_when_lock_stays_busy() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("busy.log");
        let holder = open_rw(&path);
        holder.try_lock_exclusive().unwrap();

        let cancel = AtomicBool::new(false);
        let err = acquire(open_rw(&path), &fast_policy(3), &cancel).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TimedOut);
    }

    #[test]
    fn acquire_succeeds_once_holder_releases() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("handover.log");
        let holder = open_rw(&path);
        holder.try_lock_exclusive().unwrap();

        let blocker = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(30));
            drop(holder); // closing the handle releases the lock
        });

        let cancel = AtomicBool::new(false);
        let locked = acquire(open_rw(&path), &fast_policy(200), &cancel).unwrap();
        locked.release();
        blocker.join().unwrap();
    }

    #[test]
    fn acquire_observes_cancellation_before_attempting() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cancelled.log");
        let cancel = AtomicBool::new(true);
        let err = acquire(open_rw(&path), &fast_policy(200), &cancel).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Interrupted);
    }

    #[test]
    fn backoff_delay_doubles_and_is_capped() {
        let policy = RetryPolicy {
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(50),
            max_attempts: 10,
        };
        assert_eq!(policy.delay(0), Duration::from_millis(10));
        assert_eq!(policy.delay(1), Duration::from_millis(20));
        assert_eq!(policy.delay(2), Duration::from_millis(40));
        assert_eq!(policy.delay(3), Duration::from_millis(50));
        assert_eq!(policy.delay(30), Duration::from_millis(50));
    }

    #[test]
    fn append_line_writes_one_terminated_line() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("append.log");
        let cancel = AtomicBool::new(false);

        let mut locked = acquire(open_rw(&path), &fast_policy(3), &cancel).unwrap();
        locked.append_line("hello").unwrap();
        locked.release();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello\n");

        // Lock and handle are gone: a fresh exclusive lock must succeed.
        let probe = open_rw(&path);
        probe.try_lock_exclusive().unwrap();
    }
}
