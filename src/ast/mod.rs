//! Input model handed over by the CAM side
//! A job is an ordered list of operations, each an ordered list of commands.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// One machine command: a mnemonic plus named numeric parameters.
///
/// Parameter values are in canonical units (millimetres, millimetres per
/// second). Output order is decided by the command's template, so the map
/// order carries no meaning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub name: String,
    #[serde(default)]
    pub params: BTreeMap<char, f64>,
}

impl Command {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: BTreeMap::new(),
        }
    }

    /// Builder-style parameter setter, letters are normalised to upper case.
    pub fn with(mut self, letter: char, value: f64) -> Self {
        self.params.insert(letter.to_ascii_uppercase(), value);
        self
    }

    pub fn param(&self, letter: char) -> Option<f64> {
        self.params.get(&letter).copied()
    }

    pub fn has(&self, letter: char) -> bool {
        self.params.contains_key(&letter)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        for (letter, value) in &self.params {
            write!(f, " {}{}", letter, value)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CoolantMode {
    #[default]
    None,
    Flood, // M8
    Mist,  // M7
}

impl CoolantMode {
    /// Mnemonic that switches this coolant on, if any.
    pub fn on_code(self) -> Option<&'static str> {
        match self {
            CoolantMode::None => None,
            CoolantMode::Flood => Some("M8"),
            CoolantMode::Mist => Some("M7"),
        }
    }
}

impl fmt::Display for CoolantMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoolantMode::None => write!(f, "None"),
            CoolantMode::Flood => write!(f, "Flood"),
            CoolantMode::Mist => write!(f, "Mist"),
        }
    }
}

impl FromStr for CoolantMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "None" => Ok(CoolantMode::None),
            "Flood" => Ok(CoolantMode::Flood),
            "Mist" => Ok(CoolantMode::Mist),
            other => Err(format!("unknown coolant mode: {}", other)),
        }
    }
}

/// A named path of commands plus the metadata the post cares about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub label: String,
    #[serde(default)]
    pub commands: Vec<Command>,
    #[serde(default)]
    pub coolant: CoolantMode,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl Operation {
    pub fn new(label: impl Into<String>, commands: Vec<Command>) -> Self {
        Self {
            label: label.into(),
            commands,
            coolant: CoolantMode::None,
            active: true,
        }
    }

    pub fn with_coolant(mut self, coolant: CoolantMode) -> Self {
        self.coolant = coolant;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }
}

/// Everything exported in one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Job {
    #[serde(default)]
    pub operations: Vec<Operation>,
}

impl Job {
    pub fn new(operations: Vec<Operation>) -> Self {
        Self { operations }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_builder_uppercases_letters() {
        let cmd = Command::new("G1").with('x', 1.5).with('F', 10.0);
        assert_eq!(cmd.param('X'), Some(1.5));
        assert!(cmd.has('F'));
        assert!(!cmd.has('x'));
    }

    #[test]
    fn test_coolant_mode_from_str() {
        assert_eq!("Flood".parse::<CoolantMode>(), Ok(CoolantMode::Flood));
        assert_eq!("Mist".parse::<CoolantMode>(), Ok(CoolantMode::Mist));
        assert_eq!("None".parse::<CoolantMode>(), Ok(CoolantMode::None));
        assert!("Through".parse::<CoolantMode>().is_err());
    }

    #[test]
    fn test_job_from_json() {
        let json = r#"{
            "operations": [
                {
                    "label": "Drill001",
                    "coolant": "Flood",
                    "commands": [
                        { "name": "G0", "params": { "X": 10.0, "Y": 5.0 } },
                        { "name": "G81", "params": { "Z": -3.0, "R": 2.0, "F": 2.0 } }
                    ]
                },
                { "label": "Disabled", "active": false }
            ]
        }"#;

        let job: Job = serde_json::from_str(json).expect("job should parse");
        assert_eq!(job.operations.len(), 2);
        assert_eq!(job.operations[0].coolant, CoolantMode::Flood);
        assert!(job.operations[0].active);
        assert_eq!(job.operations[0].commands[1].param('R'), Some(2.0));
        assert!(!job.operations[1].active);
        assert!(job.operations[1].commands.is_empty());
    }
}
