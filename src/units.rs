//! Unit compatibility for hint resolution.
//!
//! Flattening never converts between units: data is always written with its own unit label.
//! The only question asked here is whether data carrying one label may satisfy a hint naming
//! another, which a [`Units`] implementation answers.

use std::collections::HashMap;
use std::fmt;

pub trait Units: fmt::Debug + Send + Sync {
    /// Whether data in unit `have` may be flattened against a hint requiring unit `want`.
    fn compatible(&self, have: &str, want: &str) -> bool;
}

/// Labels must be identical.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactUnits;

impl Units for ExactUnits {
    fn compatible(&self, have: &str, want: &str) -> bool {
        have == want
    }
}

/// Compatible when both labels name the same physical dimension.
///
/// Knows SI base and derived units (with SI prefixes) and a few common non-SI labels.
/// Compound labels such as `m/s` are only compatible with themselves, and so is any label
/// the table does not know.
#[derive(Debug, Clone, Default)]
pub struct StandardUnits {
    extra: HashMap<String, String>,
}

// (label, dimension, accepts SI prefixes)
const BASE_UNITS: &[(&str, &str, bool)] = &[
    ("m", "length", true),
    ("in", "length", false),
    ("ft", "length", false),
    ("yd", "length", false),
    ("mi", "length", false),
    ("s", "time", true),
    ("min", "time", false),
    ("h", "time", false),
    ("d", "time", false),
    ("g", "mass", true),
    ("A", "current", true),
    ("K", "temperature", true),
    ("mol", "amount", true),
    ("cd", "luminous intensity", true),
    ("Hz", "frequency", true),
    ("N", "force", true),
    ("Pa", "pressure", true),
    ("bar", "pressure", true),
    ("J", "energy", true),
    ("eV", "energy", true),
    ("W", "power", true),
    ("C", "charge", true),
    ("V", "voltage", true),
    ("F", "capacitance", true),
    ("Ohm", "resistance", true),
    ("\u{3a9}", "resistance", true),
    ("S", "conductance", true),
    ("Wb", "magnetic flux", true),
    ("T", "flux density", true),
    ("G", "flux density", false),
    ("H", "inductance", true),
    ("rad", "angle", true),
    ("deg", "angle", false),
    ("L", "volume", true),
    ("dBm", "log power", false),
    ("dB", "ratio", false),
];

const SI_PREFIXES: &[&str] = &[
    "da", "Y", "Z", "E", "P", "T", "G", "M", "k", "h", "d", "c", "m", "u", "\u{b5}", "n", "p",
    "f", "a", "z", "y",
];

impl StandardUnits {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or override) the dimension of a label.
    pub fn with_unit(mut self, label: &str, dimension: &str) -> Self {
        self.extra.insert(label.to_string(), dimension.to_string());
        self
    }

    /// Dimension name for a label, if known.
    pub fn dimension<'a>(&'a self, label: &str) -> Option<&'a str> {
        if let Some(d) = self.extra.get(label) {
            return Some(d.as_str());
        }
        if let Some(&(_, d, _)) = BASE_UNITS.iter().find(|(l, _, _)| *l == label) {
            return Some(d);
        }
        SI_PREFIXES.iter().find_map(|prefix| {
            let rest = label.strip_prefix(prefix)?;
            BASE_UNITS
                .iter()
                .find(|(l, _, prefixable)| *prefixable && *l == rest)
                .map(|&(_, d, _)| d)
        })
    }
}

impl Units for StandardUnits {
    fn compatible(&self, have: &str, want: &str) -> bool {
        if have == want {
            return true;
        }
        match (self.dimension(have), self.dimension(want)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}
