use std::io;
use std::process::{Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};

use crate::config::LinkOptions;

/// Opens a target URI in a new browser tab. Fire-and-forget.
pub trait TabOpener: Send + Sync {
    fn open_tab(&self, uri: &str);
}

/// Only records the request; used when no open command is configured.
#[derive(Debug, Default)]
pub struct LogTabOpener;

impl TabOpener for LogTabOpener {
    fn open_tab(&self, uri: &str) {
        tracing::info!(uri, "open tab requested (no open_command configured)");
    }
}

/// Hands the URI to an external program, e.g. `google-chrome`.
#[derive(Debug, Clone)]
pub struct CommandTabOpener {
    program: String,
}

impl CommandTabOpener {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Spawns the program plus a detached thread that reaps it.
    fn launch(&self, uri: &str) -> io::Result<JoinHandle<io::Result<ExitStatus>>> {
        let mut child = Command::new(&self.program)
            .arg(uri)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        tracing::debug!(uri, pid = child.id(), "opened tab");
        let program = self.program.clone();
        thread::Builder::new()
            .name("tab-opener-reaper".into())
            .spawn(move || {
                let status = child.wait();
                match &status {
                    Ok(status) if !status.success() => {
                        tracing::warn!(%program, %status, "tab opener exited unsuccessfully")
                    }
                    Ok(_) => {}
                    Err(err) => tracing::warn!(?err, %program, "waiting on tab opener failed"),
                }
                status
            })
    }
}

impl TabOpener for CommandTabOpener {
    fn open_tab(&self, uri: &str) {
        if let Err(err) = self.launch(uri) {
            tracing::warn!(?err, program = %self.program, uri, "failed to open tab");
        }
    }
}

pub fn opener_from_config(options: &LinkOptions) -> Box<dyn TabOpener> {
    match options
        .open_command
        .as_deref()
        .map(str::trim)
        .filter(|program| !program.is_empty())
    {
        Some(program) => Box::new(CommandTabOpener::new(program)),
        None => Box::new(LogTabOpener),
    }
}
