//! Protocol errors

use thiserror::Error;

/// Errors raised while opening the serial port
#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("Port unavailable: {port}: {reason}")]
    PortUnavailable { port: String, reason: String },
}

/// Errors raised by a single write-then-read exchange
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Not connected to controller")]
    NotConnected,

    #[error("I/O error: {0}")]
    IoFailure(#[from] std::io::Error),
}

/// Errors in the controller's reply
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("No response from controller")]
    NoResponse,
}

/// Errors in operator-supplied text, raised before any command is built
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Malformed {field}: '{input}' is not an integer")]
    MalformedInput { field: &'static str, input: String },

    #[error("Invalid {field}: {value} must not be negative")]
    Negative { field: &'static str, value: i64 },
}

/// Any failure of a stage operation
#[derive(Error, Debug)]
pub enum StageError {
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}
