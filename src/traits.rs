//! Traits that decouple the control loop from the concrete display tools.
//!
//! The [`ControlLoop`](crate::control::ControlLoop) only depends on these
//! abstractions.  The X11 backends live in [`x11`](crate::x11); tests plug
//! in hand-written doubles.

use crate::command::Invocation;
use crate::screen::Screens;
use crate::signal::SlotSender;
use crate::watcher::EventWatcher;
use std::future::Future;

/// Something that can report the current list of screens.
///
/// One call is one request/response round trip; any subprocess it starts
/// must be gone by the time the future completes or is dropped.
pub trait DisplayQuery {
    /// The error type produced by this query.  Every error is fatal to
    /// the control loop.
    type Error: std::error::Error + Send + 'static;

    fn query(&self) -> impl Future<Output = Result<Screens, Self::Error>> + Send;
}

/// Runs the user's command for one resolved scale.
pub trait CommandRunner {
    /// The error type produced by this runner.  Errors are logged and
    /// never stop the control loop.
    type Error: std::error::Error + Send + 'static;

    fn run(&self, invocation: &Invocation) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

/// A long-lived stream of display-change lines.
///
/// # Contract
///
/// * [`run`](EventSource::run) feeds every line it receives through
///   [`EventWatcher::handle_line`] and returns when the stream ends.
/// * Returning `Ok(())` means the stream ended cleanly; an `Err` is
///   fatal to the whole run.
/// * Dropping the future must stop the underlying stream (e.g. kill the
///   subprocess).  This is how cancellation reaches the source.
pub trait EventSource: Send + 'static {
    /// The error type produced by this source.
    type Error: std::error::Error + Send + 'static;

    fn run(
        self,
        watcher: EventWatcher,
        sink: SlotSender<String>,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;
}
