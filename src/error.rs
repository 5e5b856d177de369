//! Fatal errors.
//!
//! Everything here stops the run.  Recoverable conditions (missing
//! screen, no matching rule, a failing user command) are logged inside the
//! control loop and never become an [`Error`].

use crate::config::ConfigError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Querying or parsing the screen list failed.
    #[error("query failed: {0}")]
    Query(String),

    /// The event stream failed or its process exited with an error.
    #[error("watcher exited unexpectedly: {0}")]
    Watcher(String),
}
