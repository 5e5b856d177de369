//! **autoscaler** — re-run a command whenever a display's resolution
//! crosses configured thresholds.
//!
//! Typical use is switching UI scaling when a monitor is hot-plugged or
//! its mode changes: the configured command runs with `scale`, `width` and
//! `height` in its environment.
//!
//! # Architecture
//!
//! The crate is organised around three traits in [`traits`]:
//!
//! * [`traits::DisplayQuery`] — reports the current screens.
//! * [`traits::EventSource`] — streams display-change notification lines.
//! * [`traits::CommandRunner`] — runs the user's command.
//!
//! [`control::ControlLoop`] only depends on these.  Concrete X11
//! implementations (`xrandr`, `xev -root`) live in [`x11`]; the shell
//! runner lives in [`command`].  Parsing ([`screen`]) and scale selection
//! ([`scale`]) are pure.

pub mod command;
pub mod config;
pub mod control;
pub mod error;
pub mod scale;
pub mod screen;
pub mod signal;
pub mod traits;
pub mod watcher;
pub mod x11;
