use pretty_assertions::assert_eq;
use shot204_core::demo::{SimulatedController, JOG_STEP};
use shot204_core::input;
use shot204_core::prelude::*;
use shot204_core::protocol::StagePort;
use std::io::{self, Read, Write};
use std::time::Duration;

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

async fn simulated_stage() -> (Stage, SimulatedController) {
    init_logging();
    let sim = SimulatedController::new();
    let stage = Stage::with_connection(Connection::default(), Duration::from_millis(10));
    stage.attach("simulator", Box::new(sim.clone())).await;
    (stage, sim)
}

/// Simulator behind a slow line: every write takes `delay`
struct SlowLine {
    inner: SimulatedController,
    delay: Duration,
}

impl Read for SlowLine {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Write for SlowLine {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        std::thread::sleep(self.delay);
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl StagePort for SlowLine {
    fn discard_input(&mut self) -> io::Result<()> {
        self.inner.discard_input()
    }
}

#[tokio::test]
async fn test_operator_session() {
    let (stage, sim) = simulated_stage().await;

    let profile = input::speed_profile("2000", "20000", "200").unwrap();
    assert_eq!(stage.set_speed(AxisSelector::All, profile).await.unwrap(), "OK");
    assert_eq!(sim.speeds(), [Some(profile); 4]);

    let command = input::relative_move("-100").unwrap();
    match stage.execute(command, AxisSelector::Axis2).await.unwrap() {
        Reply::Staged(staged) => {
            assert_eq!(staged.ack, "OK");
            assert!(staged.go.wait().await.is_some());
        }
        other => panic!("unexpected reply {:?}", other),
    }

    let staged = stage.move_absolute(AxisSelector::Axis1, 1500).await.unwrap();
    staged.go.wait().await;
    assert_eq!(sim.positions(), [1500, -100, 0, 0]);

    assert_eq!(stage.query_status(AxisSelector::Axis1).await.unwrap(), "+     1500");
    assert_eq!(stage.query_status(AxisSelector::Axis2).await.unwrap(), "      100");
    assert_eq!(
        stage.query_status(AxisSelector::All).await.unwrap(),
        "+     1500,-      100"
    );

    assert_eq!(stage.home(AxisSelector::All).await.unwrap(), "OK");
    assert_eq!(sim.positions(), [0; 4]);

    stage.close().await;
    assert!(!stage.is_open().await);
}

#[tokio::test]
async fn test_jog_and_stop() {
    let (stage, sim) = simulated_stage().await;

    let staged = stage.jog(AxisSelector::Axis4, Direction::Negative).await.unwrap();
    staged.go.wait().await;
    assert!(sim.is_busy());

    stage.query_status(AxisSelector::Axis4).await.unwrap();
    assert_eq!(stage.stop(AxisSelector::Axis4).await.unwrap(), "OK");
    assert!(!sim.is_busy());
    assert_eq!(sim.positions()[3], -JOG_STEP);
    assert_eq!(sim.received(), vec!["J:4-", "G:", "Q:", "L:4"]);
}

#[tokio::test]
async fn test_manual_go() {
    let (stage, sim) = simulated_stage().await;

    let reply = stage
        .execute(MotionCommand::Go, AxisSelector::Axis1)
        .await
        .unwrap();
    assert!(matches!(reply, Reply::Ack(ref ack) if ack == "OK"));
    assert_eq!(sim.received(), vec!["G:"]);
}

#[tokio::test]
async fn test_counters_track_traffic() {
    let (stage, _sim) = simulated_stage().await;

    stage.stop(AxisSelector::Axis1).await.unwrap();
    stage.home(AxisSelector::Axis1).await.unwrap();

    let (tx_bytes, rx_bytes, tx_commands, rx_lines) = stage.counters().await;
    assert_eq!(tx_bytes, 10);
    assert_eq!(rx_bytes, 8);
    assert_eq!(tx_commands, 2);
    assert_eq!(rx_lines, 2);
}

#[tokio::test]
async fn test_close_ends_session() {
    init_logging();
    let sim = SimulatedController::new();
    let stage = Stage::with_connection(Connection::default(), Duration::from_secs(1));
    stage.attach("simulator", Box::new(sim.clone())).await;

    let staged = stage.move_absolute(AxisSelector::All, 5).await.unwrap();
    assert_eq!(staged.ack, "OK");
    stage.close().await;
    assert!(staged.go.wait().await.is_none());
    assert_eq!(sim.positions(), [0; 4]);

    let err = stage.home(AxisSelector::Axis1).await.unwrap_err();
    assert!(matches!(
        err,
        StageError::Transport(shot204_core::protocol::TransportError::NotConnected)
    ));
}

#[tokio::test]
async fn test_reattach_during_move_drops_go() {
    init_logging();
    let first = SimulatedController::new();
    let second = SimulatedController::new();
    let stage = Stage::with_connection(Connection::default(), Duration::from_millis(10));
    let slow = SlowLine {
        inner: first.clone(),
        delay: Duration::from_millis(300),
    };
    stage.attach("first", Box::new(slow)).await;

    let (staged, ()) = tokio::join!(stage.move_relative(AxisSelector::Axis1, 100), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        stage.attach("second", Box::new(second.clone())).await;
    });

    let staged = staged.unwrap();
    assert_eq!(staged.ack, "OK");
    assert!(staged.go.wait().await.is_none());
    assert_eq!(first.received(), vec!["M:1+P100"]);
    assert!(second.received().is_empty());

    assert_eq!(stage.home(AxisSelector::Axis1).await.unwrap(), "OK");
    assert_eq!(second.received(), vec!["H:1"]);
}
