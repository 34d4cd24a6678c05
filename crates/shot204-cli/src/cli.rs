use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use shot204_core::config::StageConfig;
use shot204_core::protocol::{AxisSelector, Direction};

#[derive(Parser, Debug, Clone)]
#[command(name = "shot204", about = "Drive a SIGMA-KOKI SHOT-204 stage controller")]
pub struct Cli {
    #[command(flatten)]
    pub link: LinkOpts,
    /// Log every wire command and response
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,
    #[command(subcommand)]
    pub cmd: Cmd,
}

#[derive(Args, Debug, Clone)]
pub struct LinkOpts {
    /// Serial device path or COM port name
    #[arg(long, global = true)]
    pub port: Option<String>,
    /// JSON settings file (port_name, read_timeout_ms, settle_delay_ms)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// Per-line read timeout in ms (2000-5000)
    #[arg(long, global = true)]
    pub timeout_ms: Option<u64>,
    /// Delay before the G: that starts a staged move, in ms (0-1000)
    #[arg(long, global = true)]
    pub settle_ms: Option<u64>,
    /// Talk to a simulated controller instead of a serial port
    #[arg(long, global = true, default_value_t = false)]
    pub demo: bool,
}

#[derive(Args, Debug, Clone)]
pub struct AxisOpt {
    /// Axis 1-4, or "all"
    #[arg(short, long, default_value = "1")]
    pub axis: AxisSelector,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Cmd {
    /// List serial ports
    Ports,
    /// Return to mechanical origin
    Home(AxisOpt),
    /// Move by a signed number of pulses
    MoveRel {
        #[command(flatten)]
        axis: AxisOpt,
        /// Pulses; negative moves in the negative direction
        #[arg(allow_hyphen_values = true)]
        distance: String,
    },
    /// Move to an absolute position
    MoveAbs {
        #[command(flatten)]
        axis: AxisOpt,
        /// Target position in pulses
        #[arg(allow_hyphen_values = true)]
        position: String,
    },
    /// Set the speed profile
    Speed {
        #[command(flatten)]
        axis: AxisOpt,
        /// Start speed
        slow: String,
        /// Maximum speed
        fast: String,
        /// Acceleration time
        rate: String,
    },
    /// Jog for a while, then stop
    Jog {
        #[command(flatten)]
        axis: AxisOpt,
        /// "+" or "-"
        #[arg(long, allow_hyphen_values = true, default_value = "+")]
        dir: Direction,
        /// How long to travel before stopping, in ms
        #[arg(long, default_value_t = 1000)]
        duration_ms: u64,
    },
    /// Decelerate and stop
    Stop(AxisOpt),
    /// Print the status field of an axis
    Status(AxisOpt),
    /// Interactive operator panel
    Panel,
}

impl Cli {
    /// Settings from the optional file, overridden by flags
    pub fn stage_config(&self) -> anyhow::Result<StageConfig> {
        let mut config = match &self.link.config {
            Some(path) => StageConfig::from_json_file(path)
                .with_context(|| format!("loading settings from {}", path.display()))?,
            None => StageConfig::default(),
        };
        if let Some(port) = &self.link.port {
            config.port_name = port.clone();
        }
        if let Some(ms) = self.link.timeout_ms {
            config.read_timeout_ms = ms;
        }
        if let Some(ms) = self.link.settle_ms {
            config.settle_delay_ms = ms;
        }
        Ok(config)
    }
}
