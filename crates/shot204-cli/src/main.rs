//! `shot204`: one-shot commands and an operator panel for the SHOT-204.

mod cli;
mod logging;
mod panel;

use anyhow::Context;
use clap::Parser;
use std::time::Duration;

use cli::{Cli, Cmd};
use shot204_core::input;
use shot204_core::prelude::*;
use shot204_core::protocol::list_ports;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    logging::init(args.verbose)?;

    if let Cmd::Ports = args.cmd {
        print_ports();
        return Ok(());
    }

    let config = args.stage_config()?;
    let stage = Stage::new(&config);
    let simulator = args.link.demo.then(SimulatedController::new);

    connect(&stage, &config.port_name, simulator.as_ref(), &args.cmd).await?;

    let result = match args.cmd {
        Cmd::Panel => panel::run(&stage, &config.port_name, simulator).await,
        cmd => run_once(&stage, cmd).await,
    };

    if args.verbose {
        let (tx_bytes, rx_bytes, tx_commands, rx_lines) = stage.counters().await;
        tracing::debug!(
            "traffic: {} commands ({} bytes) out, {} lines ({} bytes) in",
            tx_commands,
            tx_bytes,
            rx_lines,
            rx_bytes
        );
    }
    stage.close().await;
    result
}

/// Open the port (or the simulator) before running `cmd`. The panel starts
/// closed when the port is unavailable so the operator can `open` another.
async fn connect(
    stage: &Stage,
    port_name: &str,
    simulator: Option<&SimulatedController>,
    cmd: &Cmd,
) -> anyhow::Result<()> {
    let opened = match simulator {
        Some(sim) => {
            stage.attach("simulator", Box::new(sim.clone())).await;
            Ok(())
        }
        None => stage.open(port_name).await,
    };
    match (opened, cmd) {
        (Ok(()), _) => Ok(()),
        (Err(e), Cmd::Panel) => {
            tracing::warn!("{}; panel starts disconnected, use 'open [port]'", e);
            Ok(())
        }
        (Err(e), _) => Err(e).with_context(|| format!("opening {}", port_name)),
    }
}

fn print_ports() {
    let ports = list_ports();
    if ports.is_empty() {
        println!("no serial ports found");
    }
    for port in ports {
        match (port.vid, port.pid) {
            (Some(vid), Some(pid)) => println!(
                "{}  [{:04x}:{:04x}] {}",
                port.name,
                vid,
                pid,
                port.product.or(port.manufacturer).unwrap_or_default()
            ),
            _ => println!("{}", port.name),
        }
    }
}

/// Wait for the staged `G:` so the process does not exit before the move starts
async fn finish(staged: Staged) -> anyhow::Result<()> {
    println!("{}", staged.ack);
    match staged.go.wait().await {
        Some(Ok(ack)) => {
            println!("{}", ack);
            Ok(())
        }
        Some(Err(e)) => Err(e).context("starting motion"),
        None => anyhow::bail!("motion start was cancelled"),
    }
}

async fn run_once(stage: &Stage, cmd: Cmd) -> anyhow::Result<()> {
    match cmd {
        Cmd::Home(opt) => println!("{}", stage.home(opt.axis).await?),
        Cmd::MoveRel { axis, distance } => {
            let command = input::relative_move(&distance)?;
            match stage.execute(command, axis.axis).await? {
                Reply::Staged(staged) => finish(staged).await?,
                other => tracing::warn!("unexpected reply to a move: {:?}", other),
            }
        }
        Cmd::MoveAbs { axis, position } => {
            let command = input::absolute_move(&position)?;
            match stage.execute(command, axis.axis).await? {
                Reply::Staged(staged) => finish(staged).await?,
                other => tracing::warn!("unexpected reply to a move: {:?}", other),
            }
        }
        Cmd::Speed {
            axis,
            slow,
            fast,
            rate,
        } => {
            let profile = input::speed_profile(&slow, &fast, &rate)?;
            println!("{}", stage.set_speed(axis.axis, profile).await?);
        }
        Cmd::Jog {
            axis,
            dir,
            duration_ms,
        } => {
            finish(stage.jog(axis.axis, dir).await?).await?;
            tokio::time::sleep(Duration::from_millis(duration_ms)).await;
            println!("{}", stage.stop(axis.axis).await?);
        }
        Cmd::Stop(opt) => println!("{}", stage.stop(opt.axis).await?),
        Cmd::Status(opt) => println!("{}", stage.query_status(opt.axis).await?),
        other @ (Cmd::Ports | Cmd::Panel) => {
            anyhow::bail!("{:?} is not a one-shot command", other)
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cli::AxisOpt;

    const MISSING: &str = "/dev/shot204-no-such-port";

    #[tokio::test]
    async fn test_panel_starts_closed_without_port() {
        let stage = Stage::new(&StageConfig::default());
        connect(&stage, MISSING, None, &Cmd::Panel).await.unwrap();
        assert!(!stage.is_open().await);
    }

    #[tokio::test]
    async fn test_one_shot_fails_without_port() {
        let stage = Stage::new(&StageConfig::default());
        let cmd = Cmd::Home(AxisOpt {
            axis: AxisSelector::Axis1,
        });
        let err = connect(&stage, MISSING, None, &cmd).await.unwrap_err();
        assert!(format!("{:#}", err).contains(MISSING));
    }

    #[tokio::test]
    async fn test_demo_attaches_simulator() {
        let stage = Stage::new(&StageConfig::default());
        let sim = SimulatedController::new();
        connect(&stage, MISSING, Some(&sim), &Cmd::Status(AxisOpt { axis: AxisSelector::All }))
            .await
            .unwrap();
        assert!(stage.is_open().await);
    }
}
