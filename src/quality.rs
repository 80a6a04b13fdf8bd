//! Water quality classes derived from a WQI value

use serde::{Deserialize, Serialize};
use std::fmt;

/// Quality category for a WQI score. Lower scores mean cleaner water.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum WqiClass {
    Excellent,
    Good,
    Poor,
    #[serde(rename = "Very Poor")]
    VeryPoor,
    #[serde(rename = "Unsuitable for Drinking")]
    Unsuitable,
}

impl WqiClass {
    pub const ALL: [WqiClass; 5] = [
        WqiClass::Excellent,
        WqiClass::Good,
        WqiClass::Poor,
        WqiClass::VeryPoor,
        WqiClass::Unsuitable,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            WqiClass::Excellent => "Excellent",
            WqiClass::Good => "Good",
            WqiClass::Poor => "Poor",
            WqiClass::VeryPoor => "Very Poor",
            WqiClass::Unsuitable => "Unsuitable for Drinking",
        }
    }
}

impl fmt::Display for WqiClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Step function over the upper-inclusive thresholds 25, 50, 75 and 100.
///
/// NaN falls through every comparison and lands in `Unsuitable`.
pub fn classify(wqi: f64) -> WqiClass {
    if wqi <= 25.0 {
        WqiClass::Excellent
    } else if wqi <= 50.0 {
        WqiClass::Good
    } else if wqi <= 75.0 {
        WqiClass::Poor
    } else if wqi <= 100.0 {
        WqiClass::VeryPoor
    } else {
        WqiClass::Unsuitable
    }
}
