//! Line-oriented operator panel
//!
//! Holds the selected axis and jog direction between commands. Every line is
//! validated before anything reaches the stage, and a rejected line only
//! prints an error.

use anyhow::Context;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

use shot204_core::input;
use shot204_core::prelude::*;
use shot204_core::protocol::list_ports;

const HELP: &str = "\
commands:
  axis <1-4|all>              select the axis
  dir <+|->                   select the jog direction
  home                        return to origin
  rel <pulses>                relative move (negative moves backwards)
  abs <pulses>                absolute move
  speed <slow> <fast> <rate>  set the speed profile
  jog                         travel in the selected direction
  stop                        decelerate and stop
  status                      show the selected axis' status field
  go                          send G: by hand
  open [port]  close  ports  help  quit";

/// One parsed panel line
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Select(AxisSelector),
    Turn(Direction),
    Run(MotionCommand),
    Jog,
    Open(Option<String>),
    Close,
    Ports,
    Help,
    Quit,
}

/// Parse one line. Blank lines yield `None`.
pub fn parse_line(line: &str) -> anyhow::Result<Option<Action>> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    let args: Vec<&str> = words.collect();
    let arg = |i: usize| {
        args.get(i)
            .copied()
            .with_context(|| format!("'{}' needs {} argument(s)", verb, i + 1))
    };

    let action = match verb.to_ascii_lowercase().as_str() {
        "axis" | "a" => Action::Select(arg(0)?.parse().map_err(anyhow::Error::msg)?),
        "dir" | "d" => Action::Turn(arg(0)?.parse().map_err(anyhow::Error::msg)?),
        "home" | "h" => Action::Run(MotionCommand::Home),
        "rel" | "m" => Action::Run(input::relative_move(arg(0)?)?),
        "abs" => Action::Run(input::absolute_move(arg(0)?)?),
        "speed" => Action::Run(MotionCommand::SetSpeedProfile(input::speed_profile(
            arg(0)?,
            arg(1)?,
            arg(2)?,
        )?)),
        "jog" | "j" => Action::Jog,
        "stop" | "l" => Action::Run(MotionCommand::Stop),
        "status" | "q" => Action::Run(MotionCommand::QueryStatus),
        "go" | "g" => Action::Run(MotionCommand::Go),
        "open" => Action::Open(args.first().map(|s| s.to_string())),
        "close" => Action::Close,
        "ports" => Action::Ports,
        "help" | "?" => Action::Help,
        "quit" | "exit" => Action::Quit,
        other => anyhow::bail!("unknown command '{}', try help", other),
    };
    Ok(Some(action))
}

/// Show the selection. A console that cannot be written only costs the prompt.
fn write_prompt(out: &mut impl Write, axis: AxisSelector, direction: Direction) {
    if let Err(e) = write!(out, "[axis {} {}] > ", axis, direction.sign()) {
        tracing::debug!("prompt write failed: {}", e);
    }
    if let Err(e) = out.flush() {
        tracing::debug!("prompt flush failed: {}", e);
    }
}

struct Panel<'a> {
    stage: &'a Stage,
    port_name: String,
    simulator: Option<SimulatedController>,
    axis: AxisSelector,
    direction: Direction,
}

impl Panel<'_> {
    fn prompt(&self) {
        write_prompt(&mut std::io::stdout(), self.axis, self.direction);
    }

    async fn apply(&mut self, action: Action) -> anyhow::Result<()> {
        match action {
            Action::Select(axis) => self.axis = axis,
            Action::Turn(direction) => self.direction = direction,
            Action::Jog => self.execute(MotionCommand::Jog(self.direction)).await?,
            Action::Run(command) => self.execute(command).await?,
            Action::Open(name) => {
                if let Some(name) = name {
                    self.port_name = name;
                }
                match &self.simulator {
                    Some(sim) => self.stage.attach("simulator", Box::new(sim.clone())).await,
                    None => self
                        .stage
                        .open(&self.port_name)
                        .await
                        .with_context(|| format!("opening {}", self.port_name))?,
                }
                println!("opened {}", self.port_name);
            }
            Action::Close => {
                self.stage.close().await;
                println!("closed");
            }
            Action::Ports => {
                for port in list_ports() {
                    println!("{}", port.name);
                }
            }
            Action::Help => println!("{}", HELP),
            Action::Quit => {}
        }
        Ok(())
    }

    async fn execute(&self, command: MotionCommand) -> anyhow::Result<()> {
        match self.stage.execute(command, self.axis).await? {
            Reply::Ack(ack) => println!("{}", ack),
            Reply::Status(field) => println!("{}", field),
            // The continuation runs on its own; failures are logged by the stage.
            Reply::Staged(staged) => println!("{} (starting)", staged.ack),
        }
        Ok(())
    }
}

/// Read commands from stdin until `quit` or end of input
pub async fn run(
    stage: &Stage,
    port_name: &str,
    simulator: Option<SimulatedController>,
) -> anyhow::Result<()> {
    let mut panel = Panel {
        stage,
        port_name: port_name.to_string(),
        simulator,
        axis: AxisSelector::Axis1,
        direction: Direction::Positive,
    };
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("{}", HELP);
    panel.prompt();
    while let Some(line) = lines.next_line().await.context("reading panel input")? {
        match parse_line(&line) {
            Ok(Some(Action::Quit)) => break,
            Ok(Some(action)) => {
                if let Err(e) = panel.apply(action).await {
                    println!("error: {:#}", e);
                }
            }
            Ok(None) => {}
            Err(e) => println!("error: {:#}", e),
        }
        panel.prompt();
    }
    Ok(())
}
