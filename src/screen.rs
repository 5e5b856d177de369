//! Screen list parsing.
//!
//! Turns the text printed by `xrandr` (no arguments) into a list of
//! [`Screen`]s.  The first line is a summary of the X screen and is
//! skipped; every indented line is a mode belonging to the output above
//! it and is skipped too.  Every other line is an output header:
//!
//! ```text
//! DP-1 connected primary 1920x1080+0+0 (normal left inverted right x axis y axis) 527mm x 296mm
//! HDMI1 disconnected 1280x720+1920+0 (normal left inverted right x axis y axis) 0mm x 0mm
//! ```
//!
//! A header that does not look like `<name> (dis)connected ... WxH+X+Y` is
//! a hard error: silently dropping an output would make the scale decision
//! downstream wrong.  Names are ASCII letters, digits and `-`.

use regex::Regex;
use std::sync::OnceLock;

/// Current pixel geometry of an output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub width: u32,
    pub height: u32,
    /// Offset of the output inside the virtual screen.  Parsed for
    /// validation only; scale decisions never look at it.
    pub x: i32,
    pub y: i32,
}

/// One output as reported by a single query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Screen {
    pub name: String,
    pub connected: bool,
    pub geometry: Geometry,
}

impl Screen {
    /// `(width, height)` in pixels.
    pub fn resolution(&self) -> (u32, u32) {
        (self.geometry.width, self.geometry.height)
    }
}

/// The result of one query, in output order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Screens(Vec<Screen>);

impl Screens {
    /// Find the screen called `name`.
    pub fn find(&self, name: &str) -> Option<&Screen> {
        self.0.iter().find(|s| s.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Screen> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<Screen>> for Screens {
    fn from(screens: Vec<Screen>) -> Self {
        Self(screens)
    }
}

/// An output header line that could not be understood.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("cannot parse line {0:?}")]
    Line(String),
    #[error("cannot parse geometry {0:?}")]
    Geometry(String),
}

fn header_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"^(?P<name>[A-Za-z0-9][A-Za-z0-9-]*?)\s+(?P<state>(?:dis)?connected)\s+.*?(?P<geometry>\d+x\d+\+\d+\+\d+)",
        )
        .expect("header pattern is valid")
    })
}

fn geometry_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(?P<w>\d+)x(?P<h>\d+)\+(?P<x>\d+)\+(?P<y>\d+)")
            .expect("geometry pattern is valid")
    })
}

/// Decompose a `WxH+X+Y` string.
pub fn parse_geometry(text: &str) -> Result<Geometry, ParseError> {
    let err = || ParseError::Geometry(text.to_string());
    let caps = geometry_pattern().captures(text).ok_or_else(err)?;
    let size = |key: &str| caps[key].parse::<u32>().map_err(|_| err());
    let offset = |key: &str| caps[key].parse::<i32>().map_err(|_| err());
    Ok(Geometry {
        width: size("w")?,
        height: size("h")?,
        x: offset("x")?,
        y: offset("y")?,
    })
}

/// Parse the full output of a display query.
///
/// Pure: the same text always yields the same list.
pub fn parse(output: &str) -> Result<Screens, ParseError> {
    let mut screens = Vec::new();

    for line in output.lines().skip(1) {
        if line.trim().is_empty() || line.starts_with(char::is_whitespace) {
            continue;
        }

        let caps = header_pattern()
            .captures(line)
            .ok_or_else(|| ParseError::Line(line.to_string()))?;

        screens.push(Screen {
            name: caps["name"].to_string(),
            connected: &caps["state"] == "connected",
            geometry: parse_geometry(&caps["geometry"])?,
        });
    }

    Ok(Screens(screens))
}
