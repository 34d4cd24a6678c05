//! # SHOT-204 Core Library
//!
//! Command/response protocol for the SIGMA-KOKI SHOT-204 stage controller.

#![cfg_attr(docsrs, feature(doc_cfg))]

//!
//! This library provides:
//! - Wire encoding of controller commands (home, move, speed, jog, stop, status)
//! - Decoding of acknowledgements and the positional status record
//! - A serial connection with the controller's fixed line settings
//! - An async [`stage::Stage`] that serialises exchanges and schedules the
//!   `G:` continuation after staged moves
//! - Validation of operator text before any command is built
//! - A simulated controller for running without hardware
//!
//! ## Example
//!
//! ```rust,ignore
//! use shot204_core::{config::StageConfig, protocol::AxisSelector, stage::Stage};
//!
//! let stage = Stage::new(&StageConfig::default());
//! stage.open("/dev/ttyUSB0").await?;
//!
//! let staged = stage.move_relative(AxisSelector::Axis2, -100).await?;
//! staged.go.wait().await;
//! println!("{}", stage.query_status(AxisSelector::Axis2).await?);
//!
//! stage.close().await;
//! ```

pub mod config;
pub mod demo;
pub mod input;
pub mod protocol;
pub mod stage;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::StageConfig;
    pub use crate::demo::SimulatedController;
    pub use crate::protocol::{
        AxisSelector, Connection, Direction, MotionCommand, SpeedProfile, StageError,
    };
    pub use crate::stage::{GoHandle, Reply, Stage, Staged};
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
