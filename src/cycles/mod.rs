//! Canned drill cycle expansion
//!
//! Controllers without canned cycle support need G81/G82/G83 spelled out as
//! plain G0/G1/G4 moves. Expansion always works in absolute coordinates;
//! when the program runs relative, the body is wrapped in G90 ... G91.

use crate::ast::Command;
use crate::format::{CycleKind, FormatError};
use crate::modal::{DistanceMode, DrillRetractMode, ModalState};
use thiserror::Error;

/// Share of the peck increment the tool stops short of the previous
/// hole bottom when it rapids back in.
pub const PECK_CLEARANCE: f64 = 0.05;

/// Upper bound on pecks per hole; anything beyond is a bad Q.
pub const MAX_PECKS: f64 = 10_000.0;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CycleError {
    #[error("drill cycle error: R less than Z")]
    RetractBelowDepth { retract: f64, depth: f64 },

    #[error("drill cycle error: peck increment too small")]
    TooManyPecks { step: f64, pecks: f64 },
}

/// A drill cycle with its parameters pulled out of the command.
#[derive(Debug, Clone, PartialEq)]
pub struct DrillCycle {
    pub kind: CycleKind,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub z: f64,
    pub retract: f64,
    pub feed: f64,
    pub peck: f64,
    pub dwell: f64,
}

impl DrillCycle {
    pub fn from_command(kind: CycleKind, cmd: &Command) -> Result<Self, FormatError> {
        let required = |letter: char| cmd.param(letter).ok_or(FormatError::MissingParameter(letter));

        let peck = match kind {
            CycleKind::Peck => required('Q')?.abs(),
            _ => 0.0,
        };
        let dwell = match kind {
            CycleKind::DrillDwell => required('P')?,
            _ => 0.0,
        };

        Ok(Self {
            kind,
            x: cmd.param('X'),
            y: cmd.param('Y'),
            z: required('Z')?,
            retract: required('R')?,
            feed: required('F')?,
            peck,
            dwell,
        })
    }
}

fn rapid_z(z: f64) -> Command {
    Command::new("G0").with('Z', z)
}

fn feed_z(z: f64, feed: f64) -> Command {
    Command::new("G1").with('Z', z).with('F', feed)
}

/// Rewrite one cycle into primitive commands, starting from `state`.
///
/// Coordinates in the result are absolute and canonical. The state is only
/// read; the caller emits the commands, which moves the tracked position.
pub fn expand(cycle: &DrillCycle, state: &ModalState) -> Result<Vec<Command>, CycleError> {
    if cycle.retract < cycle.z {
        return Err(CycleError::RetractBelowDepth {
            retract: cycle.retract,
            depth: cycle.z,
        });
    }

    let current = state.position;
    let relative = state.move_mode == DistanceMode::Relative;

    let (x, y, depth, mut retract) = if relative {
        (
            current.x + cycle.x.unwrap_or(0.0),
            current.y + cycle.y.unwrap_or(0.0),
            current.z + cycle.z,
            current.z + cycle.retract,
        )
    } else {
        (
            cycle.x.unwrap_or(current.x),
            cycle.y.unwrap_or(current.y),
            cycle.z,
            cycle.retract,
        )
    };

    // Never pull the tool down to R when it should come back up to where it started
    if state.drill_retract_mode == DrillRetractMode::InitialHeight && current.z >= retract {
        retract = current.z;
    }

    let mut out = Vec::new();
    if relative {
        out.push(Command::new("G90"));
    }

    // Preliminary motion
    if current.z < retract {
        out.push(rapid_z(retract));
    }
    out.push(Command::new("G0").with('X', x).with('Y', y));
    if current.z > retract {
        // R may sit below the stock surface, so feed down to it
        out.push(feed_z(retract, cycle.feed));
    }

    match cycle.kind {
        CycleKind::Drill | CycleKind::DrillDwell => {
            out.push(feed_z(depth, cycle.feed));
            if cycle.kind == CycleKind::DrillDwell {
                out.push(Command::new("G4").with('P', cycle.dwell));
            }
            out.push(rapid_z(retract));
        }
        CycleKind::Peck => out.extend(peck_moves(depth, retract, cycle.peck, cycle.feed)?),
    }

    if relative {
        out.push(Command::new("G91"));
    }

    Ok(out)
}

/// Peck down from `retract` to `depth`. The number of pecks is fixed up
/// front, and a step that no longer lowers the stop ends the loop early.
fn peck_moves(depth: f64, retract: f64, step: f64, feed: f64) -> Result<Vec<Command>, CycleError> {
    let mut moves = Vec::new();

    if step > 0.0 {
        let pecks = ((retract - depth) / step).ceil();
        if pecks.is_nan() || pecks > MAX_PECKS {
            return Err(CycleError::TooManyPecks { step, pecks });
        }

        let clearance = step * PECK_CLEARANCE;
        let mut last_stop = retract;

        for _ in 0..pecks as usize {
            let next = last_stop - step;
            if next <= depth || next >= last_stop {
                break;
            }
            if last_stop != retract {
                moves.push(rapid_z(last_stop + clearance));
            }
            last_stop = next;
            moves.push(feed_z(last_stop, feed));
            moves.push(rapid_z(retract));
        }

        if last_stop != retract {
            moves.push(rapid_z(last_stop + clearance));
        }
    }

    moves.push(feed_z(depth, feed));
    moves.push(rapid_z(retract));
    Ok(moves)
}
