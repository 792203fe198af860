use std::fmt::{Display, Formatter};

const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

/// A byte count scaled to a human unit, one decimal place.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaledSize {
    pub value: f64,
    pub unit: &'static str,
}

impl Display for ScaledSize {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        write!(f, "{:.1} {}", self.value, self.unit)
    }
}

/// Divides by 1024 until the value drops below 1024 or the units run out.
pub fn format_size(bytes: u64) -> ScaledSize {
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    ScaledSize {
        value: (value * 10.0).round() / 10.0,
        unit: UNITS[unit],
    }
}

/// Size in MiB, the unit upload limits are configured in.
pub fn mebibytes(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0)
}
