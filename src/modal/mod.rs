//! Modal state carried through one export
//!
//! One `ModalState` belongs to exactly one export call. It is mutated in
//! command order and dropped when the program text has been returned.

use crate::units::UnitSystem;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DistanceMode {
    #[default]
    Absolute, // G90 / G90.1
    Relative, // G91 / G91.1
}

/// Where a drill cycle returns to once the hole is done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DrillRetractMode {
    /// G98: back to the height the tool started the cycle from.
    InitialHeight,
    /// G99: back to the R plane.
    #[default]
    RetractHeight,
}

/// Machine position in canonical units (mm).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl DistanceMode {
    /// The word selecting this mode for straight moves.
    pub fn move_command(self) -> &'static str {
        match self {
            DistanceMode::Absolute => "G90",
            DistanceMode::Relative => "G91",
        }
    }
}

impl Position {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineNumbers {
    pub next: u32,
    pub step: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModalState {
    pub units: UnitSystem,
    pub move_mode: DistanceMode,
    pub arc_mode: DistanceMode,
    pub drill_retract_mode: DrillRetractMode,
    pub last_command: Option<String>,
    pub position: Position,
    pub line_numbers: Option<LineNumbers>,
}

impl Default for ModalState {
    fn default() -> Self {
        Self::new(UnitSystem::Metric, None)
    }
}

impl ModalState {
    pub fn new(units: UnitSystem, line_numbers: Option<LineNumbers>) -> Self {
        Self {
            units,
            move_mode: DistanceMode::Absolute,
            arc_mode: DistanceMode::Absolute,
            drill_retract_mode: DrillRetractMode::default(),
            last_command: None,
            position: Position::default(),
            line_numbers,
        }
    }

    /// Hand out the number for the next line and advance the counter.
    /// `None` while line numbering is off.
    pub fn take_line_number(&mut self) -> Option<u32> {
        let numbers = self.line_numbers.as_mut()?;
        let current = numbers.next;
        numbers.next = numbers.next.saturating_add(numbers.step);
        Some(current)
    }

    /// True when `name` repeats the previously emitted mnemonic.
    pub fn repeats(&self, name: &str) -> bool {
        self.last_command.as_deref() == Some(name)
    }

    pub fn record_command(&mut self, name: &str) {
        self.last_command = Some(name.to_string());
    }

    /// Forget the last mnemonic so the next command is written in full.
    /// Needed after any line the emitter did not format itself.
    pub fn forget_command(&mut self) {
        self.last_command = None;
    }

    /// Apply the X/Y/Z words of a motion command. Omitted axes keep their
    /// value; provided axes accumulate while moves are relative.
    pub fn apply_motion(&mut self, x: Option<f64>, y: Option<f64>, z: Option<f64>) {
        let relative = self.move_mode == DistanceMode::Relative;
        let update = |current: &mut f64, value: Option<f64>| {
            if let Some(v) = value {
                if relative {
                    *current += v;
                } else {
                    *current = v;
                }
            }
        };
        update(&mut self.position.x, x);
        update(&mut self.position.y, y);
        update(&mut self.position.z, z);
    }
}
