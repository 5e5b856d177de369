//! Filtering of display-change notification lines.
//!
//! Each line from the event stream is `<eventName> <anything>`.  Lines
//! whose event name is on the allow-list are published into the
//! single-slot notification channel; everything else is ignored.
//!
//! ```text
//! RRScreenChangeNotify event, serial 20, synthetic NO, window 0x6a8,
//! ConfigureNotify event, serial 21, synthetic NO, event 0x6a8, window 0x6a8,
//! ```

use crate::signal::SlotSender;
use log::debug;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

/// Event names used when the configuration does not list any.
pub const DEFAULT_EVENTS: &[&str] = &["RRScreenChangeNotify", "ConfigureNotify"];

/// Split a notification line into its event name and the rest.
///
/// Lines without a space separator yield `None`.
pub fn split_line(line: &str) -> Option<(&str, &str)> {
    line.split_once(' ')
}

/// Matches notification lines against an allow-list of event names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventWatcher {
    events: Vec<String>,
}

impl EventWatcher {
    pub fn new(events: Vec<String>) -> Self {
        Self { events }
    }

    pub fn events(&self) -> &[String] {
        &self.events
    }

    /// The allow-listed event name `line` carries, if any.
    pub fn matching_event<'l>(&self, line: &'l str) -> Option<&'l str> {
        let (name, _) = split_line(line)?;
        self.events.iter().any(|e| e == name).then_some(name)
    }

    /// Publish the event `line` carries if it is on the allow-list.  A
    /// match that finds the slot already occupied is coalesced into the
    /// pending notification.
    pub fn handle_line(&self, line: &str, sink: &SlotSender<String>) {
        if let Some(name) = self.matching_event(line) {
            if sink.publish(name.to_string()) {
                debug!("notify: {}", name);
            } else {
                debug!("notify: {} (coalesced)", name);
            }
        }
    }

    /// Feed every line of `reader` through [`handle_line`](Self::handle_line)
    /// until end of stream.
    ///
    /// Lines are split on raw `\n` bytes; invalid UTF-8 is replaced rather
    /// than treated as a read error, since `xev` echoes raw key bytes.
    pub async fn forward<R>(&self, mut reader: R, sink: &SlotSender<String>) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut buf = Vec::new();
        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf).await? == 0 {
                return Ok(());
            }
            let line = String::from_utf8_lossy(&buf);
            self.handle_line(line.trim_end_matches(['\n', '\r']), sink);
        }
    }
}
