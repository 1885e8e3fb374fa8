//! swarf-post: turns CAM operations into controller-ready G-code
//!
//! A [`Job`] of operations goes through [`PostProcessor`], which emits each
//! command against a single [`ModalState`] and returns the program text.

pub mod ast;
pub mod codegen;
pub mod config;
pub mod cycles;
pub mod format;
pub mod lexer;
pub mod modal;
pub mod post;
pub mod units;

pub use ast::{Command, CoolantMode, Job, Operation};
pub use codegen::{CodeGenerator, GCodeOutput, PostError};
pub use config::{ConfigError, PostArgs, PostConfig};
pub use modal::ModalState;
pub use post::{export, PostProcessor};
pub use units::UnitSystem;
