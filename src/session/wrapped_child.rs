//! Wrapped child process with process group support
//!
//! Provides a unified interface over process-wrap's ChildWrapper so the
//! orchestrator can drain pipes, wait, and kill the whole tool process tree.

use std::io;
use std::pin::Pin;
use std::process::ExitStatus;

use process_wrap::tokio::ChildWrapper;
use tokio::process::{ChildStderr, ChildStdout};

/// Wrapper around Box<dyn ChildWrapper> owned by exactly one in-flight run
#[derive(Debug)]
pub struct WrappedChild {
    inner: Box<dyn ChildWrapper>,
}

impl WrappedChild {
    /// Create a new wrapped child from a process-wrap ChildWrapper
    pub fn new(inner: Box<dyn ChildWrapper>) -> Self {
        Self { inner }
    }

    /// Take ownership of the stdout pipe, if it was captured
    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.inner.stdout().take()
    }

    /// Take ownership of the stderr pipe, if it was captured
    pub fn take_stderr(&mut self) -> Option<ChildStderr> {
        self.inner.stderr().take()
    }

    /// Kill the process group and wait for exit
    ///
    /// This will terminate the entire process group, not just the tool itself.
    pub async fn kill(&mut self) -> io::Result<()> {
        Pin::from(self.inner.kill()).await
    }

    /// Wait for the process to exit
    pub async fn wait(&mut self) -> io::Result<ExitStatus> {
        Pin::from(self.inner.wait()).await
    }

    /// Try to wait without blocking
    ///
    /// Returns Some(status) if the process has exited, None if still running.
    pub fn try_wait(&mut self) -> io::Result<Option<ExitStatus>> {
        self.inner.try_wait()
    }

    /// Get the process ID, `None` once the child has been reaped
    pub fn id(&self) -> Option<u32> {
        self.inner.id()
    }
}
