//! Invoking the user's command.
//!
//! The configured command string runs through `sh -c` with the current
//! environment plus three extra variables describing the decision:
//!
//! | variable | example |
//! |----------|---------|
//! | `scale`  | `1.5`   |
//! | `width`  | `1920`  |
//! | `height` | `1080`  |

use crate::traits::CommandRunner;
use log::info;
use std::process::{ExitStatus, Stdio};
use tokio::process::Command;

/// One request to run the command.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Invocation {
    pub scale: f64,
    pub width: u32,
    pub height: u32,
}

impl Invocation {
    /// The extra environment bindings, as decimal text.
    ///
    /// `scale` uses the shortest representation that round-trips, so `1.0`
    /// becomes `1` and `1.25` stays `1.25`.
    pub fn env(&self) -> [(&'static str, String); 3] {
        [
            ("scale", self.scale.to_string()),
            ("width", self.width.to_string()),
            ("height", self.height.to_string()),
        ]
    }
}

/// Errors produced when running the command.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("cannot start command: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("command exited with {0}")]
    Exit(ExitStatus),
}

/// A [`CommandRunner`] that hands the command string to `sh -c`.
///
/// Output goes straight to our own stdout/stderr.  The child is killed if
/// the run is cancelled while it is still going.
#[derive(Debug, Clone)]
pub struct ShellCommand {
    command: String,
    dry_run: bool,
}

impl ShellCommand {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            dry_run: false,
        }
    }

    /// Log invocations instead of executing them.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

impl CommandRunner for ShellCommand {
    type Error = CommandError;

    async fn run(&self, invocation: &Invocation) -> Result<(), CommandError> {
        let env = invocation.env();

        if self.dry_run {
            let vars: Vec<String> = env.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
            info!("dry run: {} sh -c {:?}", vars.join(" "), self.command);
            return Ok(());
        }

        let status = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .envs(env)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .status()
            .await?;

        if status.success() {
            Ok(())
        } else {
            Err(CommandError::Exit(status))
        }
    }
}
