//! Resolution thresholds and scale selection.
//!
//! A [`ScaleRule`] says "outputs no wider than `width` and no taller than
//! `height` get `scale`", where `0` leaves that dimension unconstrained.
//! [`ScaleTable`] holds the rules sorted by ascending scale and picks the
//! **highest** scale among all rules that match a resolution.

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer};
use std::fmt;

/// One threshold entry.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ScaleRule {
    /// Maximum width in pixels; `0` means any width.
    #[serde(default)]
    pub width: u32,
    /// Maximum height in pixels; `0` means any height.
    #[serde(default)]
    pub height: u32,
    /// Scale factor, either a JSON number or a numeric string.
    #[serde(deserialize_with = "deserialize_scale")]
    pub scale: f64,
}

impl ScaleRule {
    pub fn new(width: u32, height: u32, scale: f64) -> Self {
        Self { width, height, scale }
    }

    /// Whether an output of `width × height` satisfies this rule.
    pub fn matches(&self, width: u32, height: u32) -> bool {
        (self.width == 0 || width <= self.width) && (self.height == 0 || height <= self.height)
    }
}

/// Accepts `1.5` as well as `"1.5"`.
fn deserialize_scale<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Visitor;
    struct V;
    impl<'de> Visitor<'de> for V {
        type Value = f64;
        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "a number or a numeric string")
        }
        fn visit_f64<E: DeError>(self, v: f64) -> Result<f64, E> {
            Ok(v)
        }
        fn visit_u64<E: DeError>(self, v: u64) -> Result<f64, E> {
            Ok(v as f64)
        }
        fn visit_i64<E: DeError>(self, v: i64) -> Result<f64, E> {
            Ok(v as f64)
        }
        fn visit_str<E: DeError>(self, s: &str) -> Result<f64, E> {
            s.trim()
                .parse()
                .map_err(|_| DeError::custom(format!("invalid scale: {:?}", s)))
        }
    }
    deserializer.deserialize_any(V)
}

/// The configured rules, kept in ascending order of scale.
///
/// Deserializes from a plain list of rules.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(from = "Vec<ScaleRule>")]
pub struct ScaleTable {
    rules: Vec<ScaleRule>,
}

impl ScaleTable {
    /// Build a table, sorting `rules` by ascending scale.  The sort is
    /// stable, so rules with equal scales keep their configured order.
    pub fn new(mut rules: Vec<ScaleRule>) -> Self {
        rules.sort_by(|a, b| a.scale.total_cmp(&b.scale));
        Self { rules }
    }

    pub fn rules(&self) -> &[ScaleRule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Pick the rule with the highest scale whose constraints `width ×
    /// height` satisfies, walking the table from the end.
    ///
    /// `None` means "no action", not an error.
    pub fn resolve(&self, width: u32, height: u32) -> Option<&ScaleRule> {
        self.rules.iter().rev().find(|r| r.matches(width, height))
    }
}

impl From<Vec<ScaleRule>> for ScaleTable {
    fn from(rules: Vec<ScaleRule>) -> Self {
        ScaleTable::new(rules)
    }
}
