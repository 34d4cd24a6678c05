//! Serial Protocol Communication
//!
//! Implements the SHOT-204 ASCII command protocol: one CR LF terminated command
//! per exchange, one line back from the controller.
//!
//! The line settings are fixed by the controller and are not configuration.

pub mod command_builder;
pub mod commands;
mod connection;
mod error;
pub mod response;
pub mod serial;

pub use command_builder::{encode, WireCommand};
pub use commands::{AxisSelector, Direction, MotionCommand, SpeedProfile};
pub use connection::{Connection, StagePort};
pub use error::{ConnectionError, ProtocolError, StageError, TransportError, ValidationError};
pub use response::{decode_ack, decode_status, ControllerResponse, StatusField};
pub use serial::{list_ports, open_port, PortInfo};

/// Controller baud rate
pub const BAUD_RATE: u32 = 38_400;

/// Default read timeout in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 2000;

/// Shortest read timeout the controller tolerates
pub const MIN_TIMEOUT_MS: u64 = 2000;

/// Longest read timeout worth waiting for a single line
pub const MAX_TIMEOUT_MS: u64 = 5000;

/// Default delay between a staged motion command and its `G:`
pub const DEFAULT_SETTLE_MS: u64 = 500;

/// Upper bound on the settle delay
pub const MAX_SETTLE_MS: u64 = 1000;

/// Longest response line we buffer before giving up on a terminator
pub const MAX_LINE_LEN: usize = 256;
