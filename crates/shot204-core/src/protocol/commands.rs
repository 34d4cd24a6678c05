//! Protocol commands
//!
//! Defines the intents the SHOT-204 understands and the axis/direction tokens
//! they carry on the wire.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Which axis a command addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AxisSelector {
    Axis1,
    Axis2,
    Axis3,
    Axis4,
    /// All axes at once ('W' on the wire)
    All,
}

impl AxisSelector {
    /// Every selector, in panel order
    pub const ALL: [AxisSelector; 5] = [
        AxisSelector::Axis1,
        AxisSelector::Axis2,
        AxisSelector::Axis3,
        AxisSelector::Axis4,
        AxisSelector::All,
    ];

    /// Get the wire token for this selector
    pub fn token(&self) -> char {
        match self {
            AxisSelector::Axis1 => '1',
            AxisSelector::Axis2 => '2',
            AxisSelector::Axis3 => '3',
            AxisSelector::Axis4 => '4',
            AxisSelector::All => 'W',
        }
    }

    /// Map an axis number to a selector; 0 means all axes
    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(AxisSelector::All),
            1 => Some(AxisSelector::Axis1),
            2 => Some(AxisSelector::Axis2),
            3 => Some(AxisSelector::Axis3),
            4 => Some(AxisSelector::Axis4),
            _ => None,
        }
    }
}

impl fmt::Display for AxisSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AxisSelector::All => f.write_str("all"),
            other => write!(f, "{}", other.token()),
        }
    }
}

impl FromStr for AxisSelector {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1" => Ok(AxisSelector::Axis1),
            "2" => Ok(AxisSelector::Axis2),
            "3" => Ok(AxisSelector::Axis3),
            "4" => Ok(AxisSelector::Axis4),
            s if s.eq_ignore_ascii_case("all") || s.eq_ignore_ascii_case("w") || s == "0" => {
                Ok(AxisSelector::All)
            }
            other => Err(format!("unknown axis '{}', expected 1-4 or all", other)),
        }
    }
}

/// Travel direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Positive,
    Negative,
}

impl Direction {
    /// Get the wire sign for this direction
    pub fn sign(&self) -> char {
        match self {
            Direction::Positive => '+',
            Direction::Negative => '-',
        }
    }

    /// Direction of a signed step; zero counts as positive
    pub fn of(value: i64) -> Self {
        if value >= 0 {
            Direction::Positive
        } else {
            Direction::Negative
        }
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "+" => Ok(Direction::Positive),
            "-" => Ok(Direction::Negative),
            s if s.eq_ignore_ascii_case("pos") || s.eq_ignore_ascii_case("positive") => {
                Ok(Direction::Positive)
            }
            s if s.eq_ignore_ascii_case("neg") || s.eq_ignore_ascii_case("negative") => {
                Ok(Direction::Negative)
            }
            other => Err(format!("unknown direction '{}', expected + or -", other)),
        }
    }
}

/// Speed profile for `D:` (pulses per second, ramp time in ms)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeedProfile {
    /// Start speed
    pub slow: u64,
    /// Maximum speed
    pub fast: u64,
    /// Acceleration/deceleration time
    pub ramp_rate: u64,
}

impl SpeedProfile {
    pub fn new(slow: u64, fast: u64, ramp_rate: u64) -> Self {
        Self {
            slow,
            fast,
            ramp_rate,
        }
    }
}

/// Intents the controller accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MotionCommand {
    /// Return to mechanical origin ('H')
    Home,

    /// Relative move; the sign selects the direction ('M')
    MoveRelative(i64),

    /// Absolute move to a non-negative position ('A')
    MoveAbsolute(u64),

    /// Set slow/fast/ramp speeds ('D')
    SetSpeedProfile(SpeedProfile),

    /// Continuous travel until stopped ('J')
    Jog(Direction),

    /// Decelerate and stop ('L')
    Stop,

    /// Read the status record ('Q'); axis-independent on the wire
    QueryStatus,

    /// Execute the staged move or jog ('G'); axis-independent
    Go,
}

impl MotionCommand {
    /// Get the command character
    pub fn letter(&self) -> char {
        match self {
            MotionCommand::Home => 'H',
            MotionCommand::MoveRelative(_) => 'M',
            MotionCommand::MoveAbsolute(_) => 'A',
            MotionCommand::SetSpeedProfile(_) => 'D',
            MotionCommand::Jog(_) => 'J',
            MotionCommand::Stop => 'L',
            MotionCommand::QueryStatus => 'Q',
            MotionCommand::Go => 'G',
        }
    }

    /// Check if the command only stages travel and needs a `G:` to start it
    pub fn needs_go(&self) -> bool {
        matches!(
            self,
            MotionCommand::MoveRelative(_) | MotionCommand::MoveAbsolute(_) | MotionCommand::Jog(_)
        )
    }

    /// Check if the command carries an axis token
    pub fn takes_axis(&self) -> bool {
        !matches!(self, MotionCommand::QueryStatus | MotionCommand::Go)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_axis_tokens() {
        assert_eq!(AxisSelector::Axis1.token(), '1');
        assert_eq!(AxisSelector::Axis4.token(), '4');
        assert_eq!(AxisSelector::All.token(), 'W');
    }

    #[test]
    fn test_axis_from_index() {
        assert_eq!(AxisSelector::from_index(0), Some(AxisSelector::All));
        assert_eq!(AxisSelector::from_index(3), Some(AxisSelector::Axis3));
        assert_eq!(AxisSelector::from_index(5), None);
    }

    #[test]
    fn test_axis_parse() {
        assert_eq!("2".parse::<AxisSelector>().unwrap(), AxisSelector::Axis2);
        assert_eq!("ALL".parse::<AxisSelector>().unwrap(), AxisSelector::All);
        assert_eq!("w".parse::<AxisSelector>().unwrap(), AxisSelector::All);
        assert!("7".parse::<AxisSelector>().is_err());
    }

    #[test]
    fn test_direction_of_sign() {
        assert_eq!(Direction::of(0), Direction::Positive);
        assert_eq!(Direction::of(15), Direction::Positive);
        assert_eq!(Direction::of(-1), Direction::Negative);
        assert_eq!(Direction::Negative.sign(), '-');
    }

    #[test]
    fn test_needs_go() {
        assert!(MotionCommand::MoveRelative(-5).needs_go());
        assert!(MotionCommand::MoveAbsolute(5).needs_go());
        assert!(MotionCommand::Jog(Direction::Positive).needs_go());
        assert!(!MotionCommand::Home.needs_go());
        assert!(!MotionCommand::Stop.needs_go());
        assert!(!MotionCommand::Go.needs_go());
    }

    #[test]
    fn test_takes_axis() {
        assert!(MotionCommand::Home.takes_axis());
        assert!(!MotionCommand::QueryStatus.takes_axis());
        assert!(!MotionCommand::Go.takes_axis());
    }
}
