use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::thread::JoinHandle;

use crate::lock::{self, RetryPolicy};
use crate::queue::RecordDrain;

/// Spawns the writer thread for a logger instance. The thread drains the
/// queue one record at a time until it sees the shutdown message, then
/// returns `true`.
///
/// A failed write cycle never stops the loop: the error is reported and
/// the record abandoned.
pub(crate) fn spawn(
    path: PathBuf,
    drain: RecordDrain,
    policy: RetryPolicy,
    cancel: Arc<AtomicBool>,
) -> io::Result<JoinHandle<bool>> {
    std::thread::Builder::new()
        .name("lazylog-writer".into())
        .spawn(move || {
            lower_priority();
            while let Some(record) = drain.take() {
                if let Err(err) = write_cycle(&path, &record, &policy, &cancel) {
                    log::warn!("failed to append record to {}: {err}", path.display());
                }
            }
            true
        })
}

/// One full write cycle: open-or-create the file, acquire the advisory
/// lock, append the record as a single line, release the lock, close the
/// handle. Neither the handle nor the lock outlives the cycle, on any
/// exit path.
fn write_cycle(
    path: &Path,
    record: &str,
    policy: &RetryPolicy,
    cancel: &AtomicBool,
) -> io::Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .append(true)
        .open(path)?;
    let mut locked = lock::acquire(file, policy, cancel)?;
    let written = locked.append_line(record);
    locked.release();
    written
}

/// Log delivery is best-effort and must not compete with application
/// threads for CPU.
#[cfg(unix)]
fn lower_priority() {
    let _ = unsafe { libc::nice(10) };
}

#[cfg(not(unix))]
fn lower_priority() {}
