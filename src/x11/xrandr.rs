//! [`DisplayQuery`] implementation backed by the `xrandr` command.

use crate::screen::{self, ParseError, Screens};
use crate::traits::DisplayQuery;
use std::process::{ExitStatus, Stdio};
use tokio::process::Command;

/// Runs `xrandr` once per query.
#[derive(Debug, Clone)]
pub struct Xrandr {
    program: String,
    args: Vec<String>,
}

/// Errors that can occur while querying `xrandr`.
#[derive(Debug, thiserror::Error)]
pub enum XrandrError {
    #[error("cannot start {0}: {1}")]
    Spawn(String, #[source] std::io::Error),
    #[error("cannot parse: {0}")]
    Parse(#[from] ParseError),
    #[error("exited unexpectedly: {0}")]
    Exit(ExitStatus),
}

impl Default for Xrandr {
    fn default() -> Self {
        Self::new("xrandr")
    }
}

impl Xrandr {
    /// Query with `program` instead of `xrandr`.  It must print
    /// `xrandr`-style output.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Pass `args` to the program.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }
}

impl DisplayQuery for Xrandr {
    type Error = XrandrError;

    async fn query(&self) -> Result<Screens, XrandrError> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| XrandrError::Spawn(self.program.clone(), e))?;

        // Parse errors take precedence over the exit status: a malformed
        // line is the more useful diagnostic.
        let text = String::from_utf8_lossy(&output.stdout);
        let screens = screen::parse(&text)?;

        if !output.status.success() {
            return Err(XrandrError::Exit(output.status));
        }
        Ok(screens)
    }
}
