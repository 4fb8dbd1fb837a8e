//! Tunnel process tracking and termination
//!
//! Every monitor registers its child here so `stop` can tear all of them
//! down at once. Once `stop` has drained the table it stays closed until
//! the hub resets, and late registrations are handed back to the caller.

use std::io;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::process::Child;

/// A tunnel process owned by the table
pub struct TrackedProcess {
    /// Tunnel name
    pub name: String,
    /// Process handle
    pub child: Child,
}

impl TrackedProcess {
    /// OS process id, if the process has not been reaped yet
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }
}

#[derive(Default)]
struct Table {
    processes: Vec<TrackedProcess>,
    closed: bool,
}

/// Processes of the current run
#[derive(Default)]
pub struct ProcessTable {
    inner: Mutex<Table>,
}

impl ProcessTable {
    /// Create an empty, open table
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Table> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Track a process. Returns the child back if the table is closed.
    pub fn register(&self, name: &str, child: Child) -> Result<(), Child> {
        let mut table = self.lock();
        if table.closed {
            return Err(child);
        }
        table.processes.push(TrackedProcess {
            name: name.to_string(),
            child,
        });
        Ok(())
    }

    /// Close the table and take every tracked process
    pub fn close_and_drain(&self) -> Vec<TrackedProcess> {
        let mut table = self.lock();
        table.closed = true;
        std::mem::take(&mut table.processes)
    }

    /// Accept registrations again
    pub fn reopen(&self) {
        let mut table = self.lock();
        table.processes.clear();
        table.closed = false;
    }

    /// Process ids of tracked processes
    pub fn pids(&self) -> Vec<u32> {
        self.lock()
            .processes
            .iter()
            .filter_map(TrackedProcess::id)
            .collect()
    }

    /// Number of tracked processes
    pub fn len(&self) -> usize {
        self.lock().processes.len()
    }

    /// Check if nothing is tracked
    pub fn is_empty(&self) -> bool {
        self.lock().processes.is_empty()
    }
}

/// Ask a process to exit, then kill it if it outlives `grace`.
///
/// Already exited processes are just reaped.
pub async fn terminate(process: &mut TrackedProcess, grace: Duration) -> io::Result<()> {
    if process.child.try_wait()?.is_some() {
        return Ok(());
    }

    request_exit(&mut process.child)?;

    match tokio::time::timeout(grace, process.child.wait()).await {
        Ok(status) => {
            let status = status?;
            tracing::debug!(tunnel = %process.name, "Tunnel process exited with {}", status);
        }
        Err(_) => {
            tracing::warn!(
                tunnel = %process.name,
                "Tunnel process ignored termination for {:?}, killing it",
                grace
            );
            process.child.kill().await?;
        }
    }
    Ok(())
}

/// Send SIGTERM
#[cfg(unix)]
fn request_exit(child: &mut Child) -> io::Result<()> {
    let Some(pid) = child.id() else {
        return Ok(());
    };
    // ESRCH means the process is already gone, which is what we want
    let result = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
    if result != 0 {
        let err = io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::ESRCH) {
            return Err(err);
        }
    }
    Ok(())
}

#[cfg(not(unix))]
fn request_exit(child: &mut Child) -> io::Result<()> {
    child.start_kill()
}
