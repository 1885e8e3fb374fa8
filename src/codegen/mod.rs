//! G-code emitter
//! Turns commands into program lines while keeping the modal state current

use crate::ast::Command;
use crate::config::{ConfigError, PostConfig};
use crate::cycles::{self, DrillCycle};
use crate::format::{CommandClass, CycleKind, FormatError, ModeSwitch, ParamFormatter};
use crate::lexer;
use crate::modal::{LineNumbers, ModalState};
use crate::units::UnitSystem;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;
use thiserror::Error;
use tracing::{trace, warn};

/// Comments of this shape carry a raw controller command.
static MACHINE_COMMAND: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\(MC_RUN_COMMAND: ([^)]+)\)$").expect("machine command pattern"));

#[derive(Error, Debug)]
pub enum PostError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("operation '{operation}', command '{command}': {source}")]
    Command {
        operation: String,
        command: String,
        #[source]
        source: FormatError,
    },
}

/// Program text, one entry per line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GCodeOutput {
    pub lines: Vec<String>,
}

impl GCodeOutput {
    pub fn new() -> Self {
        Self::default()
    }
}

impl std::fmt::Display for GCodeOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for line in &self.lines {
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}

/// Payload of a `(MC_RUN_COMMAND: ...)` comment.
pub fn machine_command(comment: &str) -> Option<&str> {
    MACHINE_COMMAND
        .captures(comment)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Which modal groups a text block set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlockModes {
    pub units: bool,
    pub move_mode: bool,
}

pub struct CodeGenerator<'a> {
    config: &'a PostConfig,
    suppressed: BTreeSet<String>,
    state: ModalState,
    output: GCodeOutput,
}

impl<'a> CodeGenerator<'a> {
    pub fn new(config: &'a PostConfig) -> Self {
        let numbering = config.line_numbers.then_some(LineNumbers {
            next: config.line_number_start,
            step: config.line_number_increment,
        });

        Self {
            config,
            suppressed: config.suppressed_commands(),
            state: ModalState::new(config.units(), numbering),
            output: GCodeOutput::new(),
        }
    }

    pub fn config(&self) -> &PostConfig {
        self.config
    }

    pub fn state(&self) -> &ModalState {
        &self.state
    }

    pub fn output(&self) -> &GCodeOutput {
        &self.output
    }

    pub fn into_output(self) -> GCodeOutput {
        self.output
    }

    fn formatter(&self) -> ParamFormatter {
        ParamFormatter::new(self.state.units, self.config.precision)
    }

    /// Append one line, numbered when line numbers are on.
    pub fn line(&mut self, code: &str) {
        let text = match self.state.take_line_number() {
            Some(n) => format!("N{} {}", n, code),
            None => code.to_string(),
        };
        self.output.lines.push(text);
    }

    /// A parenthesised comment line, emitted regardless of the comments option.
    pub fn comment(&mut self, text: &str) {
        self.line(&format!("({})", text));
    }

    /// A comment line that only appears when comments are enabled.
    pub fn note(&mut self, text: &str) {
        if self.config.comments {
            self.comment(text);
        }
    }

    /// Emit a user text block line by line. Unit and distance-mode words in
    /// it update the modal state, and any line written clears the last
    /// mnemonic since the block may have changed the active motion mode.
    pub fn emit_block(&mut self, block: &str) -> BlockModes {
        let mut modes = BlockModes::default();

        for raw in block.lines() {
            let text = raw.trim_end();
            if text.trim().is_empty() {
                continue;
            }
            self.line(text);
            self.state.forget_command();

            for word in lexer::words(text) {
                if word.letter != 'G' {
                    continue;
                }
                if let Some(units) = UnitSystem::from_g_number(word.number) {
                    self.state.units = units;
                    modes.units = true;
                    continue;
                }
                let mnemonic = format!("G{}", word.number);
                if let CommandClass::ModeSwitch(switch) = CommandClass::classify(&mnemonic) {
                    if let ModeSwitch::Move(_) = switch {
                        modes.move_mode = true;
                    }
                    self.apply_mode_switch(switch);
                }
            }
        }

        modes
    }

    /// Start of a new operation: the first command is always written in full.
    pub fn begin_operation(&mut self) {
        self.state.forget_command();
    }

    fn apply_mode_switch(&mut self, switch: ModeSwitch) {
        match switch {
            ModeSwitch::Move(mode) => self.state.move_mode = mode,
            ModeSwitch::Arc(mode) => self.state.arc_mode = mode,
        }
    }

    fn apply(&mut self, class: CommandClass, cmd: &Command) {
        match class {
            CommandClass::UnitSwitch(units) => self.state.units = units,
            CommandClass::ModeSwitch(switch) => self.apply_mode_switch(switch),
            CommandClass::DrillReturn(mode) => self.state.drill_retract_mode = mode,
            CommandClass::DrillCycle(_) => {
                self.state.apply_motion(cmd.param('X'), cmd.param('Y'), None)
            }
            c if c.is_motion() => {
                self.state
                    .apply_motion(cmd.param('X'), cmd.param('Y'), cmd.param('Z'))
            }
            _ => {}
        }
        self.state.record_command(&cmd.name);
    }

    /// Emit one command of `operation`.
    pub fn emit_command(&mut self, cmd: &Command, operation: &str) -> Result<(), PostError> {
        let class = CommandClass::classify(&cmd.name);
        trace!(operation, command = %cmd, ?class, "emit");

        let fail = |source: FormatError| PostError::Command {
            operation: operation.to_string(),
            command: cmd.to_string(),
            source,
        };

        let tokens = self
            .formatter()
            .format_params(&cmd.params, class.template())
            .map_err(fail)?;

        match class {
            CommandClass::Comment => {
                self.emit_comment_command(cmd);
                return Ok(());
            }
            CommandClass::DrillCycle(kind) if self.config.translate_drill_cycles => {
                let cycle = DrillCycle::from_command(kind, cmd).map_err(fail)?;
                return self.emit_translated_cycle(kind, cycle, cmd, tokens, operation);
            }
            CommandClass::Dwell if !cmd.has('P') => {
                return Err(fail(FormatError::MissingParameter('P')));
            }
            CommandClass::ToolChange => {
                self.note("Begin toolchange");
                let config = self.config;
                if config.output_tool_change {
                    self.emit_block(&config.tool_change_text);
                }
            }
            _ => {}
        }

        let suppressed = self.suppressed.contains(&cmd.name)
            || (class == CommandClass::ToolChange && !self.config.output_tool_change);

        let mut words = Vec::with_capacity(tokens.len() + 1);
        if suppressed || !(self.config.modal && self.state.repeats(&cmd.name)) {
            words.push(cmd.name.clone());
        }
        words.extend(tokens);

        self.apply(class, cmd);

        if !words.is_empty() {
            let text = words.join(" ");
            if suppressed {
                self.comment(&text);
            } else {
                self.line(&text);
            }
        }

        if class == (CommandClass::Spindle { starts: true }) && self.config.spindle_wait > 0.0 {
            let dwell = Command::new("G4").with('P', self.config.spindle_wait);
            self.emit_command(&dwell, operation)?;
        }

        Ok(())
    }

    fn emit_comment_command(&mut self, cmd: &Command) {
        if self.config.comments {
            self.line(&cmd.name);
        }
        self.state.record_command(&cmd.name);
        if let Some(payload) = machine_command(&cmd.name).map(str::trim) {
            if !payload.is_empty() {
                self.line(payload);
                self.state.forget_command();
            }
        }
    }

    fn emit_translated_cycle(
        &mut self,
        kind: CycleKind,
        cycle: DrillCycle,
        cmd: &Command,
        tokens: Vec<String>,
        operation: &str,
    ) -> Result<(), PostError> {
        if self.config.comments {
            let mut words = vec![cmd.name.clone()];
            words.extend(tokens);
            self.comment(&words.join(" "));
        }

        match cycles::expand(&cycle, &self.state) {
            Ok(moves) => {
                trace!(operation, ?kind, moves = moves.len(), "drill cycle expanded");
                for primitive in &moves {
                    self.emit_command(primitive, operation)?;
                }
            }
            Err(err) => {
                warn!(
                    operation,
                    command = %cmd,
                    retract = cycle.retract,
                    depth = cycle.z,
                    "{}", err
                );
                self.comment(&err.to_string());
            }
        }
        Ok(())
    }
}

/// Format commands under a throwaway default state, handy for tests and
/// quick previews.
pub fn format_command(config: &PostConfig, cmd: &Command) -> Result<String, PostError> {
    let mut gen = CodeGenerator::new(config);
    gen.emit_command(cmd, "preview")?;
    Ok(gen.into_output().to_string())
}
