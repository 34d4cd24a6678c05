//! Command Builder
//!
//! Builds CR LF terminated wire commands from typed intents.
//!
//! Grammar (axis token is '1'..'4' or 'W'):
//! - `H:<axis>`                      home
//! - `M:<axis><sign>P<magnitude>`    relative move
//! - `A:<axis>P<position>`           absolute move
//! - `D:<axis>S<slow>F<fast>R<rate>` speed profile
//! - `J:<axis><sign>`                jog
//! - `L:<axis>`                      stop
//! - `Q:`                            status
//! - `G:`                            go

use std::fmt;

use super::commands::{AxisSelector, Direction, MotionCommand};

/// Line terminator expected by the controller
pub const TERMINATOR: &str = "\r\n";

/// An encoded command, ready to be written once
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WireCommand(String);

impl WireCommand {
    /// The `G:` continuation that starts staged motion
    pub fn go() -> Self {
        encode(MotionCommand::Go, AxisSelector::All)
    }

    /// The full command, terminator included
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The command without its CR LF
    pub fn body(&self) -> &str {
        self.0.trim_end_matches(TERMINATOR)
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for WireCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.body())
    }
}

/// Encode a command for the given axis.
///
/// The axis is ignored for `QueryStatus` and `Go`, which carry no axis token.
pub fn encode(command: MotionCommand, axis: AxisSelector) -> WireCommand {
    let axis = axis.token();
    let mut out = String::with_capacity(24);
    out.push(command.letter());
    out.push(':');

    match command {
        MotionCommand::Home | MotionCommand::Stop => out.push(axis),
        MotionCommand::MoveRelative(steps) => {
            out.push(axis);
            out.push(Direction::of(steps).sign());
            out.push('P');
            out.push_str(&steps.unsigned_abs().to_string());
        }
        MotionCommand::MoveAbsolute(position) => {
            out.push(axis);
            out.push('P');
            out.push_str(&position.to_string());
        }
        MotionCommand::SetSpeedProfile(profile) => {
            out.push(axis);
            out.push('S');
            out.push_str(&profile.slow.to_string());
            out.push('F');
            out.push_str(&profile.fast.to_string());
            out.push('R');
            out.push_str(&profile.ramp_rate.to_string());
        }
        MotionCommand::Jog(direction) => {
            out.push(axis);
            out.push(direction.sign());
        }
        MotionCommand::QueryStatus | MotionCommand::Go => {}
    }

    out.push_str(TERMINATOR);
    WireCommand(out)
}
