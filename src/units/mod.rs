//! Output unit systems and number formatting
//!
//! Commands arrive in canonical units (mm for lengths, mm/s for feeds).
//! The program is written either in mm and mm/min (G21) or in inches and
//! in/min (G20); the conversion is a linear scale done through `uom`.

use serde::{Deserialize, Serialize};
use std::fmt;
use uom::si::f64::{Length, Time, Velocity};
use uom::si::length::{inch, millimeter};
use uom::si::time::minute;
use uom::si::velocity::millimeter_per_second;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum UnitSystem {
    #[default]
    Metric, // G21
    Imperial, // G20
}

impl UnitSystem {
    /// The G-code word that selects this unit system.
    pub fn command(self) -> &'static str {
        match self {
            UnitSystem::Metric => "G21",
            UnitSystem::Imperial => "G20",
        }
    }

    /// Unit system selected by a G-word number (20 or 21).
    pub fn from_g_number(number: f64) -> Option<Self> {
        if number == 21.0 {
            Some(UnitSystem::Metric)
        } else if number == 20.0 {
            Some(UnitSystem::Imperial)
        } else {
            None
        }
    }

    pub fn length_unit(self) -> &'static str {
        match self {
            UnitSystem::Metric => "mm",
            UnitSystem::Imperial => "in",
        }
    }

    pub fn speed_unit(self) -> &'static str {
        match self {
            UnitSystem::Metric => "mm/min",
            UnitSystem::Imperial => "in/min",
        }
    }

    /// Canonical millimetres to output length units.
    pub fn convert_position(self, value: f64) -> f64 {
        self.length_out(Length::new::<millimeter>(value))
    }

    /// Canonical mm/s to output feed units (per minute).
    pub fn convert_speed(self, value: f64) -> f64 {
        let per_minute: Length =
            Velocity::new::<millimeter_per_second>(value) * Time::new::<minute>(1.0);
        self.length_out(per_minute)
    }

    /// Output length units back to canonical millimetres.
    pub fn position_to_canonical(self, value: f64) -> f64 {
        let length = match self {
            UnitSystem::Metric => Length::new::<millimeter>(value),
            UnitSystem::Imperial => Length::new::<inch>(value),
        };
        length.get::<millimeter>()
    }

    fn length_out(self, length: Length) -> f64 {
        match self {
            UnitSystem::Metric => length.get::<millimeter>(),
            UnitSystem::Imperial => length.get::<inch>(),
        }
    }
}

impl fmt::Display for UnitSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitSystem::Metric => write!(f, "Metric"),
            UnitSystem::Imperial => write!(f, "Imperial"),
        }
    }
}

/// Fixed-point rendering with exactly `precision` fractional digits.
pub fn format_number(value: f64, precision: usize) -> String {
    format!("{:.*}", precision, value)
}

/// Truncates towards zero and renders without a fractional part.
pub fn format_integer(value: f64) -> String {
    format!("{}", value.trunc() as i64)
}
