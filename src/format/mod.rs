//! Parameter formatting and command classification
//!
//! Every mnemonic belongs to a command class, and every class carries the
//! ordered template of parameter letters it accepts. Parameters are always
//! written in template order, never in input order.

use crate::modal::{DistanceMode, DrillRetractMode};
use crate::units::{format_integer, format_number, UnitSystem};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FormatError {
    #[error("unexpected parameter '{0}'")]
    UnexpectedParameter(char),

    #[error("invalid feed rate: {value} (must be greater than zero)")]
    InvalidFeedRate { value: f64 },

    #[error("missing required parameter '{0}'")]
    MissingParameter(char),

    #[error("parameter '{0}' is not a finite number")]
    NonFiniteValue(char),
}

/// How a parameter value is converted and rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Position,
    Rotation,
    ArcOffset,
    Radius,
    Feed,
    IntegerCount,
    /// Dwell time in seconds, never scaled.
    Duration,
}

pub type Template = &'static [(char, ParamKind)];

use ParamKind::*;

pub const MOVE_TEMPLATE: Template = &[
    ('X', Position),
    ('Y', Position),
    ('Z', Position),
    ('A', Rotation),
    ('B', Rotation),
    ('C', Rotation),
    ('I', ArcOffset),
    ('J', ArcOffset),
    ('K', ArcOffset),
    ('R', Radius),
    ('F', Feed),
];

pub const DWELL_TEMPLATE: Template = &[('P', Duration)];

pub const DRILL_TEMPLATE: Template = &[
    ('X', Position),
    ('Y', Position),
    ('Z', Position),
    ('R', Position),
    ('Q', Position),
    ('P', Duration),
    ('L', IntegerCount),
    ('F', Feed),
];

pub const SPINDLE_TEMPLATE: Template = &[('S', IntegerCount)];

pub const TOOL_CHANGE_TEMPLATE: Template = &[('T', IntegerCount), ('H', IntegerCount)];

pub const NO_PARAMETERS: Template = &[];

/// Order used for mnemonics the post does not know.
pub const GENERIC_TEMPLATE: Template = &[
    ('X', Position),
    ('Y', Position),
    ('Z', Position),
    ('A', Rotation),
    ('B', Rotation),
    ('C', Rotation),
    ('U', Position),
    ('V', Position),
    ('W', Position),
    ('I', ArcOffset),
    ('J', ArcOffset),
    ('K', ArcOffset),
    ('F', Feed),
    ('S', IntegerCount),
    ('T', IntegerCount),
    ('Q', Position),
    ('R', Radius),
    ('L', IntegerCount),
    ('P', Duration),
    ('D', IntegerCount),
    ('H', IntegerCount),
];

/// Drill cycle families that can be rewritten into primitive moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleKind {
    Drill,      // G81
    DrillDwell, // G82
    Peck,       // G83
}

/// Mode switches, each touching exactly one of the two distance modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeSwitch {
    Move(DistanceMode),
    Arc(DistanceMode),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandClass {
    Rapid,
    Linear,
    Arc,
    Dwell,
    UnitSwitch(UnitSystem),
    ModeSwitch(ModeSwitch),
    DrillReturn(DrillRetractMode),
    DrillCycle(CycleKind),
    CycleCancel,
    ToolChange,
    Coolant,
    Spindle { starts: bool },
    Comment,
    Other,
}

impl CommandClass {
    pub fn classify(name: &str) -> Self {
        match name {
            "G0" | "G00" => CommandClass::Rapid,
            "G1" | "G01" => CommandClass::Linear,
            "G2" | "G02" | "G3" | "G03" => CommandClass::Arc,
            "G4" | "G04" => CommandClass::Dwell,
            "G20" => CommandClass::UnitSwitch(UnitSystem::Imperial),
            "G21" => CommandClass::UnitSwitch(UnitSystem::Metric),
            "G90" => CommandClass::ModeSwitch(ModeSwitch::Move(DistanceMode::Absolute)),
            "G91" => CommandClass::ModeSwitch(ModeSwitch::Move(DistanceMode::Relative)),
            "G90.1" => CommandClass::ModeSwitch(ModeSwitch::Arc(DistanceMode::Absolute)),
            "G91.1" => CommandClass::ModeSwitch(ModeSwitch::Arc(DistanceMode::Relative)),
            "G98" => CommandClass::DrillReturn(DrillRetractMode::InitialHeight),
            "G99" => CommandClass::DrillReturn(DrillRetractMode::RetractHeight),
            "G81" => CommandClass::DrillCycle(CycleKind::Drill),
            "G82" => CommandClass::DrillCycle(CycleKind::DrillDwell),
            "G83" => CommandClass::DrillCycle(CycleKind::Peck),
            "G80" => CommandClass::CycleCancel,
            "M6" | "M06" => CommandClass::ToolChange,
            "M7" | "M07" | "M8" | "M08" | "M9" | "M09" => CommandClass::Coolant,
            "M3" | "M03" | "M4" | "M04" => CommandClass::Spindle { starts: true },
            "M5" | "M05" => CommandClass::Spindle { starts: false },
            _ if name.starts_with('(') => CommandClass::Comment,
            _ => CommandClass::Other,
        }
    }

    /// Accepted parameters in output order. `None` means any letter goes,
    /// in generic order.
    pub fn template(self) -> Option<Template> {
        match self {
            CommandClass::Rapid | CommandClass::Linear | CommandClass::Arc => Some(MOVE_TEMPLATE),
            CommandClass::Dwell => Some(DWELL_TEMPLATE),
            CommandClass::DrillCycle(_) => Some(DRILL_TEMPLATE),
            CommandClass::Spindle { .. } => Some(SPINDLE_TEMPLATE),
            CommandClass::ToolChange => Some(TOOL_CHANGE_TEMPLATE),
            CommandClass::UnitSwitch(_)
            | CommandClass::ModeSwitch(_)
            | CommandClass::DrillReturn(_)
            | CommandClass::CycleCancel
            | CommandClass::Coolant
            | CommandClass::Comment => Some(NO_PARAMETERS),
            CommandClass::Other => None,
        }
    }

    pub fn is_motion(self) -> bool {
        matches!(
            self,
            CommandClass::Rapid | CommandClass::Linear | CommandClass::Arc
        )
    }
}

/// Renders numbers for one program: unit system plus precision.
#[derive(Debug, Clone, Copy)]
pub struct ParamFormatter {
    pub units: UnitSystem,
    pub precision: usize,
}

impl ParamFormatter {
    pub fn new(units: UnitSystem, precision: usize) -> Self {
        Self { units, precision }
    }

    /// Render a single `<letter><number>` token.
    pub fn format(&self, letter: char, value: f64, kind: ParamKind) -> Result<String, FormatError> {
        if !value.is_finite() {
            return Err(FormatError::NonFiniteValue(letter));
        }

        let number = match kind {
            Position | ArcOffset | Radius => {
                format_number(self.units.convert_position(value), self.precision)
            }
            Rotation | Duration => format_number(value, self.precision),
            Feed => {
                let speed = self.units.convert_speed(value);
                if speed <= 0.0 {
                    return Err(FormatError::InvalidFeedRate { value: speed });
                }
                format_number(speed, self.precision)
            }
            IntegerCount => format_integer(value),
        };

        Ok(format!("{}{}", letter, number))
    }

    /// Render all parameters of a command, validated against the template.
    pub fn format_params(
        &self,
        params: &BTreeMap<char, f64>,
        template: Option<Template>,
    ) -> Result<Vec<String>, FormatError> {
        match template {
            Some(template) => {
                if let Some(letter) = params
                    .keys()
                    .find(|letter| !template.iter().any(|(t, _)| t == *letter))
                {
                    return Err(FormatError::UnexpectedParameter(*letter));
                }
                template
                    .iter()
                    .filter_map(|(letter, kind)| {
                        params.get(letter).map(|value| self.format(*letter, *value, *kind))
                    })
                    .collect()
            }
            None => {
                let mut tokens = Vec::with_capacity(params.len());
                for (letter, kind) in GENERIC_TEMPLATE {
                    if let Some(value) = params.get(letter) {
                        tokens.push(self.format(*letter, *value, *kind)?);
                    }
                }
                // BTreeMap iteration keeps the leftovers alphabetical
                for (letter, value) in params {
                    if !GENERIC_TEMPLATE.iter().any(|(t, _)| t == letter) {
                        tokens.push(self.format(*letter, *value, Position)?);
                    }
                }
                Ok(tokens)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ParamKind::*;
    use super::*;
    use std::collections::BTreeMap;

    fn params(pairs: &[(char, f64)]) -> BTreeMap<char, f64> {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_position_and_rotation() {
        let fmt = ParamFormatter::new(UnitSystem::Imperial, 4);
        assert_eq!(fmt.format('X', 25.4, Position).unwrap(), "X1.0000");
        assert_eq!(fmt.format('A', 90.0, Rotation).unwrap(), "A90.0000");
        assert_eq!(fmt.format('I', -12.7, ArcOffset).unwrap(), "I-0.5000");
    }

    #[test]
    fn test_feed_is_converted_per_minute() {
        let fmt = ParamFormatter::new(UnitSystem::Metric, 3);
        assert_eq!(fmt.format('F', 5.0, Feed).unwrap(), "F300.000");
    }

    #[test]
    fn test_feed_must_be_positive() {
        let fmt = ParamFormatter::new(UnitSystem::Metric, 3);
        assert!(matches!(
            fmt.format('F', 0.0, Feed),
            Err(FormatError::InvalidFeedRate { .. })
        ));
        assert!(matches!(
            fmt.format('F', -2.0, Feed),
            Err(FormatError::InvalidFeedRate { .. })
        ));
    }

    #[test]
    fn test_integer_count_truncates() {
        let fmt = ParamFormatter::new(UnitSystem::Imperial, 3);
        assert_eq!(fmt.format('T', 3.7, IntegerCount).unwrap(), "T3");
        assert_eq!(fmt.format('S', 12000.0, IntegerCount).unwrap(), "S12000");
    }

    #[test]
    fn test_non_finite_rejected() {
        let fmt = ParamFormatter::new(UnitSystem::Metric, 3);
        assert_eq!(
            fmt.format('X', f64::NAN, Position),
            Err(FormatError::NonFiniteValue('X'))
        );
    }

    #[test]
    fn test_template_order_wins_over_input_order() {
        let fmt = ParamFormatter::new(UnitSystem::Metric, 1);
        let p = params(&[('F', 1.0), ('Z', -1.0), ('X', 2.0), ('A', 45.0)]);
        let tokens = fmt.format_params(&p, Some(MOVE_TEMPLATE)).unwrap();
        assert_eq!(tokens, vec!["X2.0", "Z-1.0", "A45.0", "F60.0"]);
    }

    #[test]
    fn test_unexpected_parameter() {
        let fmt = ParamFormatter::new(UnitSystem::Metric, 3);
        let p = params(&[('X', 1.0), ('Q', 2.0)]);
        assert_eq!(
            fmt.format_params(&p, Some(MOVE_TEMPLATE)),
            Err(FormatError::UnexpectedParameter('Q'))
        );
        let p = params(&[('X', 1.0)]);
        assert_eq!(
            fmt.format_params(&p, Some(NO_PARAMETERS)),
            Err(FormatError::UnexpectedParameter('X'))
        );
    }

    #[test]
    fn test_generic_template_accepts_everything() {
        let fmt = ParamFormatter::new(UnitSystem::Metric, 2);
        let p = params(&[('E', 1.5), ('P', 2.0), ('X', 1.0), ('S', 100.0)]);
        let tokens = fmt.format_params(&p, None).unwrap();
        assert_eq!(tokens, vec!["X1.00", "S100", "P2.00", "E1.50"]);
    }

    #[test]
    fn test_classify() {
        assert_eq!(CommandClass::classify("G0"), CommandClass::Rapid);
        assert_eq!(CommandClass::classify("G01"), CommandClass::Linear);
        assert_eq!(CommandClass::classify("G03"), CommandClass::Arc);
        assert_eq!(
            CommandClass::classify("G91.1"),
            CommandClass::ModeSwitch(ModeSwitch::Arc(DistanceMode::Relative))
        );
        assert_eq!(
            CommandClass::classify("G83"),
            CommandClass::DrillCycle(CycleKind::Peck)
        );
        assert_eq!(
            CommandClass::classify("M4"),
            CommandClass::Spindle { starts: true }
        );
        assert_eq!(CommandClass::classify("(hello)"), CommandClass::Comment);
        assert_eq!(CommandClass::classify("G38.2"), CommandClass::Other);
    }
}
