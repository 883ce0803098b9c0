//! Process launching
//!
//! The orchestrator never spawns directly; it goes through a
//! [`ProcessLauncher`] so every launch is observable and replaceable.

use std::io;
use std::path::Path;
use std::process::Stdio;

use process_wrap::tokio::{CommandWrap, KillOnDrop};
#[cfg(unix)]
use process_wrap::tokio::ProcessGroup;

use super::WrappedChild;

/// Spawn primitive used by sessions
pub trait ProcessLauncher: std::fmt::Debug + Send + Sync {
    /// Start `argv[0]` with the remaining arguments in `cwd`
    ///
    /// Implementations must close stdin and capture stdout and stderr. An
    /// error of kind [`io::ErrorKind::NotFound`] means the tool is not
    /// installed.
    fn launch(&self, argv: &[String], cwd: &Path) -> io::Result<WrappedChild>;
}

/// Launches tools as real OS processes
///
/// Each child leads its own process group, so a kill reaches anything the
/// tool spawned, and is killed if its handle is dropped.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemLauncher;

impl ProcessLauncher for SystemLauncher {
    fn launch(&self, argv: &[String], cwd: &Path) -> io::Result<WrappedChild> {
        let Some((program, args)) = argv.split_first() else {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "empty argument vector",
            ));
        };

        let mut command = CommandWrap::with_new(program, |cmd| {
            cmd.args(args)
                .current_dir(cwd)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped());
        });
        #[cfg(unix)]
        command.wrap(ProcessGroup::leader());
        command.wrap(KillOnDrop);

        let child = command.spawn()?;
        tracing::debug!(program = %program, pid = ?child.id(), cwd = %cwd.display(), "Spawned tool process");
        Ok(WrappedChild::new(child))
    }
}
