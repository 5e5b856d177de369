//! [`EventSource`] implementation backed by `xev -root`.
//!
//! `xev` prints one block per X event; the first line of each block starts
//! with the event name (`RRScreenChangeNotify event, serial ...`).  The
//! process runs for the whole session and is killed when the future
//! driving it is dropped.

use crate::signal::SlotSender;
use crate::traits::EventSource;
use crate::watcher::EventWatcher;
use log::info;
use std::process::{ExitStatus, Stdio};
use tokio::io::BufReader;
use tokio::process::Command;

/// Streams root-window events from `xev`.
#[derive(Debug, Clone)]
pub struct Xev {
    program: String,
    args: Vec<String>,
}

/// Errors produced by the `xev` event stream.
#[derive(Debug, thiserror::Error)]
pub enum XevError {
    #[error("xev: cannot start {0}: {1}")]
    Spawn(String, #[source] std::io::Error),
    #[error("xev: cannot get stdout")]
    NoStdout,
    #[error("xev: cannot read stdout: {0}")]
    Read(#[source] std::io::Error),
    #[error("xev: cannot wait: {0}")]
    Wait(#[source] std::io::Error),
    #[error("xev: exited with {0}")]
    Exit(ExitStatus),
}

impl Default for Xev {
    fn default() -> Self {
        Self::new("xev")
    }
}

impl Xev {
    /// Stream events from `program -root` instead of `xev -root`.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: vec!["-root".into()],
        }
    }

    /// Replace the default `-root` arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }
}

impl EventSource for Xev {
    type Error = XevError;

    async fn run(self, watcher: EventWatcher, sink: SlotSender<String>) -> Result<(), XevError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| XevError::Spawn(self.program.clone(), e))?;
        info!("watching {} for {:?}", self.program, watcher.events());

        let stdout = child.stdout.take().ok_or(XevError::NoStdout)?;
        watcher
            .forward(BufReader::new(stdout), &sink)
            .await
            .map_err(XevError::Read)?;

        let status = child.wait().await.map_err(XevError::Wait)?;
        if !status.success() {
            return Err(XevError::Exit(status));
        }
        info!("{} exited", self.program);
        Ok(())
    }
}
