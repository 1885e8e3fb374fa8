//! Program assembly
//!
//! Wraps the emitted operations in header, preamble, per-operation blocks and
//! postamble. One `process` call owns one `CodeGenerator`, so every export
//! starts from a fresh modal state.

use crate::ast::{Command, Job, Operation};
use crate::codegen::{CodeGenerator, PostError};
use crate::config::PostConfig;
use chrono::{DateTime, Utc};
use tracing::{debug, info};

/// Controller flavour written into the header.
pub const POST_NAME: &str = "grbl";

const PREAMBLE: &str = "preamble";
const POSTAMBLE: &str = "postamble";

pub struct PostProcessor {
    config: PostConfig,
    timestamp: DateTime<Utc>,
}

impl PostProcessor {
    /// Validates the configuration up front so a bad option never produces
    /// partial output.
    pub fn new(config: PostConfig) -> Result<Self, PostError> {
        config.validate()?;
        Ok(Self {
            config,
            timestamp: Utc::now(),
        })
    }

    /// Pin the header time, mostly for reproducible output.
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn name(&self) -> &str {
        POST_NAME
    }

    pub fn config(&self) -> &PostConfig {
        &self.config
    }

    /// Export `job` as one program text.
    pub fn process(&self, job: &Job) -> Result<String, PostError> {
        info!(
            post = self.name(),
            operations = job.operations.len(),
            "post processing started"
        );

        let config = &self.config;
        let mut gen = CodeGenerator::new(config);

        if config.header {
            gen.comment(&format!("Exported by swarf-post {}", env!("CARGO_PKG_VERSION")));
            gen.comment(&format!("Post Processor: {}", self.name()));
            gen.comment(&format!(
                "Output Time: {}",
                self.timestamp.format("%Y-%m-%d %H:%M:%S")
            ));
        }

        gen.note("Begin preamble");
        let modes = gen.emit_block(&config.preamble);
        if !modes.move_mode {
            let mode = Command::new(gen.state().move_mode.move_command());
            gen.emit_command(&mode, PREAMBLE)?;
        }
        if !modes.units {
            let units = Command::new(gen.state().units.command());
            gen.emit_command(&units, PREAMBLE)?;
        }
        let units = gen.state().units;
        debug!(length = units.length_unit(), feed = units.speed_unit(), "output units");

        for operation in &job.operations {
            if !operation.active {
                debug!(operation = %operation.label, "skipping inactive operation");
                continue;
            }
            self.emit_operation(&mut gen, operation)?;
        }

        if let Some([x, y]) = config.return_to {
            let home = Command::new("G0").with('X', x).with('Y', y);
            gen.emit_command(&home, POSTAMBLE)?;
        }

        if config.output_block_markers {
            block_markers(&mut gen, "post_amble");
        }
        gen.note("Begin postamble");
        gen.emit_block(&config.postamble);

        let output = gen.into_output();
        info!(lines = output.lines.len(), "post processing finished");
        Ok(output.to_string())
    }

    fn emit_operation(&self, gen: &mut CodeGenerator, operation: &Operation) -> Result<(), PostError> {
        let config = &self.config;
        let label = operation.label.as_str();
        debug!(operation = label, commands = operation.commands.len(), "operation");
        gen.begin_operation();

        if config.output_block_markers {
            block_markers(gen, label);
        }
        gen.note(&format!("Begin operation: {}", label));
        gen.emit_block(&config.pre_operation);

        let coolant = operation.coolant.on_code();
        if let Some(code) = coolant {
            gen.note(&format!("Coolant On: {}", operation.coolant));
            gen.emit_command(&Command::new(code), label)?;
        }

        gen.note(&format!("Path: {}", label));
        for cmd in &operation.commands {
            gen.emit_command(cmd, label)?;
        }

        if coolant.is_some() {
            gen.note(&format!("Coolant Off: {}", operation.coolant));
            gen.emit_command(&Command::new("M9"), label)?;
        }

        gen.note(&format!("Finish operation: {}", label));
        gen.emit_block(&config.post_operation);
        Ok(())
    }
}

/// bCNC splits programs into editable blocks on these comments.
fn block_markers(gen: &mut CodeGenerator, name: &str) {
    gen.comment(&format!("Block-name: {}", name));
    gen.comment("Block-expand: 0");
    gen.comment("Block-enable: 1");
}

/// Export `job` with `config` in one call.
pub fn export(job: &Job, config: PostConfig) -> Result<String, PostError> {
    PostProcessor::new(config)?.process(job)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::CoolantMode;
    use crate::config::ConfigError;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn bare() -> PostConfig {
        PostConfig {
            comments: false,
            header: false,
            preamble: String::new(),
            postamble: String::new(),
            ..PostConfig::default()
        }
    }

    fn job(commands: Vec<Command>) -> Job {
        Job::new(vec![Operation::new("Profile", commands)])
    }

    #[test]
    fn test_default_unit_command_added() {
        let out = export(&job(vec![]), bare()).unwrap();
        assert_eq!(out, "G90\nG21\n");

        let imperial = PostConfig {
            output_imperial: true,
            ..bare()
        };
        assert_eq!(export(&job(vec![]), imperial).unwrap(), "G90\nG20\n");
    }

    #[test]
    fn test_default_distance_mode_follows_preamble() {
        let relative = PostConfig {
            preamble: "G17 G91".to_string(),
            ..bare()
        };
        assert_eq!(export(&job(vec![]), relative).unwrap(), "G17 G91\nG21\n");

        // G90.1 is the arc mode and does not count
        let arc_only = PostConfig {
            preamble: "G90.1 G21".to_string(),
            ..bare()
        };
        assert_eq!(export(&job(vec![]), arc_only).unwrap(), "G90.1 G21\nG90\n");
    }

    #[test]
    fn test_preamble_units_win() {
        let config = PostConfig {
            preamble: "G17 G90 G20".to_string(),
            ..bare()
        };
        let out = export(
            &job(vec![Command::new("G0").with('X', 25.4)]),
            config,
        )
        .unwrap();
        assert_eq!(out, "G17 G90 G20\nG0 X1.000\n");
    }

    #[test]
    fn test_header() {
        let config = PostConfig {
            header: true,
            ..bare()
        };
        let stamp = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 0).unwrap();
        let post = PostProcessor::new(config).unwrap().with_timestamp(stamp);
        let out = post.process(&Job::default()).unwrap();
        let lines: Vec<&str> = out.lines().collect();

        assert_eq!(
            lines,
            vec![
                format!("(Exported by swarf-post {})", env!("CARGO_PKG_VERSION")).as_str(),
                "(Post Processor: grbl)",
                "(Output Time: 2024-03-09 14:05:00)",
                "G90",
                "G21",
            ]
        );
    }

    #[test]
    fn test_coolant_wraps_operation() {
        let config = PostConfig {
            comments: true,
            ..bare()
        };
        let op = Operation::new("Pocket", vec![Command::new("G0").with('Z', 5.0)])
            .with_coolant(CoolantMode::Mist);
        let out = export(&Job::new(vec![op]), config).unwrap();
        assert_eq!(
            out,
            "(Begin preamble)\n\
             G90\n\
             G21\n\
             (Begin operation: Pocket)\n\
             (Coolant On: Mist)\n\
             M7\n\
             (Path: Pocket)\n\
             G0 Z5.000\n\
             (Coolant Off: Mist)\n\
             M9\n\
             (Finish operation: Pocket)\n\
             (Begin postamble)\n"
        );
    }

    #[test]
    fn test_inactive_operation_contributes_nothing() {
        let active = Operation::new("Keep", vec![Command::new("G0").with('X', 1.0)]);
        let skipped = Operation::new("Skip", vec![Command::new("G0").with('X', 2.0)])
            .with_coolant(CoolantMode::Flood)
            .inactive();
        let out = export(&Job::new(vec![skipped, active]), bare()).unwrap();
        assert_eq!(out, "G90\nG21\nG0 X1.000\n");
    }

    #[test]
    fn test_block_markers() {
        let config = PostConfig {
            output_block_markers: true,
            ..bare()
        };
        let out = export(&job(vec![]), config).unwrap();
        assert_eq!(
            out,
            "G90\n\
             G21\n\
             (Block-name: Profile)\n\
             (Block-expand: 0)\n\
             (Block-enable: 1)\n\
             (Block-name: post_amble)\n\
             (Block-expand: 0)\n\
             (Block-enable: 1)\n"
        );
    }

    #[test]
    fn test_return_to_precedes_postamble() {
        let config = PostConfig {
            return_to: Some([0.0, 0.0]),
            postamble: "M2".to_string(),
            ..bare()
        };
        let out = export(&job(vec![]), config).unwrap();
        assert_eq!(out, "G90\nG21\nG0 X0.000 Y0.000\nM2\n");
    }

    #[test]
    fn test_bad_config_fails_before_output() {
        let config = PostConfig {
            precision: 42,
            ..bare()
        };
        assert!(matches!(
            PostProcessor::new(config),
            Err(PostError::Config(ConfigError::InvalidValue { option: "precision", .. }))
        ));
    }

    #[test]
    fn test_fatal_command_error_aborts_export() {
        let commands = vec![
            Command::new("G0").with('X', 1.0),
            Command::new("G1").with('X', 2.0).with('F', -1.0),
        ];
        let err = export(&job(commands), bare()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "operation 'Profile', command 'G1 F-1 X2': invalid feed rate: -60 (must be greater than zero)"
        );
    }
}
