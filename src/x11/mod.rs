//! X11 backends.
//!
//! [`xrandr::Xrandr`] implements [`DisplayQuery`](crate::traits::DisplayQuery)
//! by running `xrandr` and parsing its output; [`xev::Xev`] implements
//! [`EventSource`](crate::traits::EventSource) by streaming `xev -root`.
//!
//! Nothing outside this module should reference either tool directly.

pub mod xev;
pub mod xrandr;
