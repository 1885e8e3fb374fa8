//! Post-processor options
//!
//! `PostConfig` is the resolved option set. It can be built in code,
//! deserialized from JSON, or parsed from command-line style arguments via
//! `PostArgs`. Whatever the source, `validate` runs before any output is
//! produced.

use crate::units::UnitSystem;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

pub const DEFAULT_PREAMBLE: &str = "G17 G90";
pub const DEFAULT_POSTAMBLE: &str = "M5\nG17 G90\nM2";
pub const MAX_PRECISION: usize = 8;

/// Commands commented out whenever drill cycles are translated.
pub const DRILL_SUPPRESSED: [&str; 3] = ["G99", "G98", "G80"];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for {option}: {message}")]
    InvalidValue {
        option: &'static str,
        message: String,
    },

    #[error(transparent)]
    Args(#[from] clap::Error),

    #[error("invalid configuration file: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PostConfig {
    pub comments: bool,
    pub header: bool,
    pub line_numbers: bool,
    pub line_number_start: u32,
    pub line_number_increment: u32,
    pub precision: usize,
    pub preamble: String,
    pub postamble: String,
    pub pre_operation: String,
    pub post_operation: String,
    pub translate_drill_cycles: bool,
    pub modal: bool,
    pub output_tool_change: bool,
    pub tool_change_text: String,
    /// Seconds to dwell after starting the spindle, 0 disables.
    pub spindle_wait: f64,
    pub return_to: Option<[f64; 2]>,
    pub output_block_markers: bool,
    pub output_imperial: bool,
    pub suppress_commands: Vec<String>,
}

impl Default for PostConfig {
    fn default() -> Self {
        Self {
            comments: true,
            header: true,
            line_numbers: false,
            line_number_start: 100,
            line_number_increment: 10,
            precision: 3,
            preamble: DEFAULT_PREAMBLE.to_string(),
            postamble: DEFAULT_POSTAMBLE.to_string(),
            pre_operation: String::new(),
            post_operation: String::new(),
            translate_drill_cycles: false,
            modal: false,
            output_tool_change: true,
            tool_change_text: String::new(),
            spindle_wait: 0.0,
            return_to: None,
            output_block_markers: false,
            output_imperial: false,
            suppress_commands: Vec::new(),
        }
    }
}

impl PostConfig {
    /// Parse argument-vector style options, e.g. `["--modal", "--precision", "4"]`.
    pub fn from_args<I, S>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<std::ffi::OsString> + Clone,
    {
        let argv = std::iter::once(std::ffi::OsString::from("swarf-post"))
            .chain(args.into_iter().map(Into::into));
        PostArgs::try_parse_from(argv)?.into_config()
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: PostConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.precision > MAX_PRECISION {
            return Err(ConfigError::InvalidValue {
                option: "precision",
                message: format!("{} exceeds the maximum of {}", self.precision, MAX_PRECISION),
            });
        }
        if self.line_number_increment == 0 {
            return Err(ConfigError::InvalidValue {
                option: "line-number-increment",
                message: "must be greater than zero".to_string(),
            });
        }
        if !self.spindle_wait.is_finite() || self.spindle_wait < 0.0 {
            return Err(ConfigError::InvalidValue {
                option: "spindle-wait",
                message: format!("{} is not a non-negative number of seconds", self.spindle_wait),
            });
        }
        if let Some([x, y]) = self.return_to {
            if !x.is_finite() || !y.is_finite() {
                return Err(ConfigError::InvalidValue {
                    option: "return-to",
                    message: format!("({}, {}) is not a finite point", x, y),
                });
            }
        }
        if let Some(bad) = self
            .suppress_commands
            .iter()
            .find(|c| c.trim().is_empty() || c.contains(char::is_whitespace))
        {
            return Err(ConfigError::InvalidValue {
                option: "suppress",
                message: format!("'{}' is not a command mnemonic", bad),
            });
        }
        Ok(())
    }

    /// Unit system the program starts in unless the preamble picks one.
    pub fn units(&self) -> UnitSystem {
        if self.output_imperial {
            UnitSystem::Imperial
        } else {
            UnitSystem::Metric
        }
    }

    /// Mnemonics to comment out instead of executing.
    pub fn suppressed_commands(&self) -> BTreeSet<String> {
        let mut suppressed: BTreeSet<String> = self.suppress_commands.iter().cloned().collect();
        if self.translate_drill_cycles {
            suppressed.extend(DRILL_SUPPRESSED.iter().map(|c| c.to_string()));
        }
        suppressed
    }
}

/// Command-line form of `PostConfig`.
#[derive(Debug, Clone, Parser)]
#[command(name = "swarf-post")]
pub struct PostArgs {
    /// Suppress comment output
    #[arg(long)]
    pub no_comments: bool,

    /// Suppress header output
    #[arg(long)]
    pub no_header: bool,

    /// Prefix each line with N<number>
    #[arg(long)]
    pub line_numbers: bool,

    #[arg(long, default_value_t = 100)]
    pub line_number_start: u32,

    #[arg(long, default_value_t = 10)]
    pub line_number_increment: u32,

    /// Number of digits after the decimal point
    #[arg(long, default_value_t = 3)]
    pub precision: usize,

    /// Commands issued before the first operation (\n separates lines)
    #[arg(long, default_value = DEFAULT_PREAMBLE)]
    pub preamble: String,

    /// Commands issued after the last operation (\n separates lines)
    #[arg(long, default_value = DEFAULT_POSTAMBLE)]
    pub postamble: String,

    #[arg(long, default_value = "")]
    pub pre_operation: String,

    #[arg(long, default_value = "")]
    pub post_operation: String,

    /// Rewrite G81/G82/G83 as plain G0/G1 moves
    #[arg(long)]
    pub translate_drill: bool,

    /// Omit a command word that repeats the previous one
    #[arg(long)]
    pub modal: bool,

    /// Comment out M6 instead of emitting the tool change text
    #[arg(long)]
    pub no_tool_change: bool,

    #[arg(long, default_value = "")]
    pub tool_change_text: String,

    /// Seconds to wait after M3/M4
    #[arg(long, default_value_t = 0.0)]
    pub spindle_wait: f64,

    /// Final G0 X,Y move before the postamble
    #[arg(long, value_parser = parse_point)]
    pub return_to: Option<[f64; 2]>,

    /// Emit bCNC block markers around operations
    #[arg(long)]
    pub bcnc: bool,

    /// Output in inches (G20)
    #[arg(long)]
    pub inches: bool,

    /// Comma separated mnemonics to comment out
    #[arg(long, value_delimiter = ',')]
    pub suppress: Vec<String>,
}

fn unescape_block(text: &str) -> String {
    text.replace("\\n", "\n")
}

fn parse_point(text: &str) -> Result<[f64; 2], String> {
    let parts: Vec<&str> = text.split(',').map(str::trim).collect();
    if parts.len() != 2 {
        return Err(format!("expected X,Y but got '{}'", text));
    }
    let x = parts[0]
        .parse::<f64>()
        .map_err(|e| format!("bad X '{}': {}", parts[0], e))?;
    let y = parts[1]
        .parse::<f64>()
        .map_err(|e| format!("bad Y '{}': {}", parts[1], e))?;
    Ok([x, y])
}

impl PostArgs {
    pub fn into_config(self) -> Result<PostConfig, ConfigError> {
        let config = PostConfig {
            comments: !self.no_comments,
            header: !self.no_header,
            line_numbers: self.line_numbers,
            line_number_start: self.line_number_start,
            line_number_increment: self.line_number_increment,
            precision: self.precision,
            preamble: unescape_block(&self.preamble),
            postamble: unescape_block(&self.postamble),
            pre_operation: unescape_block(&self.pre_operation),
            post_operation: unescape_block(&self.post_operation),
            translate_drill_cycles: self.translate_drill,
            modal: self.modal,
            output_tool_change: !self.no_tool_change,
            tool_change_text: unescape_block(&self.tool_change_text),
            spindle_wait: self.spindle_wait,
            return_to: self.return_to,
            output_block_markers: self.bcnc,
            output_imperial: self.inches,
            suppress_commands: self.suppress,
        };
        config.validate()?;
        Ok(config)
    }
}
