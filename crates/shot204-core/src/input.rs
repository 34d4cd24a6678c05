//! Operator input validation
//!
//! Turns raw text from a panel or command line into typed commands. Nothing
//! here touches the port: a rejected field means no command is ever built.

use crate::protocol::{MotionCommand, SpeedProfile, ValidationError};

/// Parse a signed integer, ignoring surrounding whitespace
pub fn parse_integer(field: &'static str, text: &str) -> Result<i64, ValidationError> {
    text.trim()
        .parse::<i64>()
        .map_err(|_| ValidationError::MalformedInput {
            field,
            input: text.to_string(),
        })
}

/// Parse an integer that has no sign on the wire
pub fn parse_non_negative(field: &'static str, text: &str) -> Result<u64, ValidationError> {
    let value = parse_integer(field, text)?;
    u64::try_from(value).map_err(|_| ValidationError::Negative { field, value })
}

/// Relative move of `text` steps; a leading '-' moves in the negative direction
pub fn relative_move(text: &str) -> Result<MotionCommand, ValidationError> {
    parse_integer("relative distance", text).map(MotionCommand::MoveRelative)
}

/// Absolute move to position `text`
pub fn absolute_move(text: &str) -> Result<MotionCommand, ValidationError> {
    parse_non_negative("absolute position", text).map(MotionCommand::MoveAbsolute)
}

/// Speed profile from its three fields; all must be valid or none is used
pub fn speed_profile(slow: &str, fast: &str, rate: &str) -> Result<SpeedProfile, ValidationError> {
    Ok(SpeedProfile::new(
        parse_non_negative("slow speed", slow)?,
        parse_non_negative("fast speed", fast)?,
        parse_non_negative("ramp rate", rate)?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_integer() {
        assert_eq!(parse_integer("x", "100"), Ok(100));
        assert_eq!(parse_integer("x", "-100"), Ok(-100));
        assert_eq!(parse_integer("x", "+7"), Ok(7));
        assert_eq!(parse_integer("x", " 42 "), Ok(42));
    }

    #[test]
    fn test_malformed_inputs() {
        for text in ["abc", "", "12.5", "1e3", "--1", "0x10"] {
            assert_eq!(
                parse_integer("distance", text),
                Err(ValidationError::MalformedInput {
                    field: "distance",
                    input: text.to_string(),
                }),
                "input {:?}",
                text
            );
        }
    }

    #[test]
    fn test_non_negative() {
        assert_eq!(parse_non_negative("pos", "0"), Ok(0));
        assert_eq!(
            parse_non_negative("pos", "-5"),
            Err(ValidationError::Negative {
                field: "pos",
                value: -5
            })
        );
    }

    #[test]
    fn test_relative_move() {
        assert_eq!(relative_move("-100"), Ok(MotionCommand::MoveRelative(-100)));
        assert!(relative_move("ten").is_err());
    }

    #[test]
    fn test_absolute_move() {
        assert_eq!(absolute_move("2500"), Ok(MotionCommand::MoveAbsolute(2500)));
        assert!(matches!(
            absolute_move("-1"),
            Err(ValidationError::Negative { .. })
        ));
    }

    #[test]
    fn test_speed_profile_all_or_nothing() {
        assert_eq!(
            speed_profile("2000", "20000", "200"),
            Ok(SpeedProfile::new(2000, 20000, 200))
        );
        assert_eq!(
            speed_profile("2000", "fast", "200"),
            Err(ValidationError::MalformedInput {
                field: "fast speed",
                input: "fast".to_string(),
            })
        );
        assert!(speed_profile("2000", "20000", "").is_err());
    }
}
