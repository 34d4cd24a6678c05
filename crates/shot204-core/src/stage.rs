//! Stage control
//!
//! Async facade over a [`Connection`]. Every operation encodes one command,
//! runs the exchange on the blocking pool while holding the exchange lock, and
//! decodes the reply. Moves and jogs schedule the `G:` continuation as a task
//! that queues on the same lock after the settle delay.

use std::io;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::StageConfig;
use crate::protocol::{
    decode_ack, decode_status, encode, AxisSelector, Connection, ConnectionError,
    ControllerResponse, Direction, MotionCommand, SpeedProfile, StageError, StagePort,
    TransportError, WireCommand,
};

/// Outcome of the deferred `G:`: `None` when it was cancelled by `close`
pub type GoOutcome = Option<Result<String, StageError>>;

/// Handle to a scheduled `G:`. Dropping it leaves the task running.
#[derive(Debug)]
pub struct GoHandle {
    handle: JoinHandle<GoOutcome>,
}

impl GoHandle {
    /// Wait for the `G:` to be sent and acknowledged, or cancelled
    pub async fn wait(self) -> GoOutcome {
        match self.handle.await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!("go task ended abnormally: {}", e);
                None
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Reply to a staged command plus its pending `G:`
#[derive(Debug)]
pub struct Staged {
    /// Acknowledgement of the staging command
    pub ack: String,
    /// The scheduled continuation
    pub go: GoHandle,
}

/// Decoded result of [`Stage::execute`]
#[derive(Debug)]
pub enum Reply {
    /// Acknowledgement of a single-step command
    Ack(String),
    /// Acknowledgement of a staged move or jog, `G:` pending
    Staged(Staged),
    /// The status field selected by the axis
    Status(String),
}

/// Run one exchange on the blocking pool. The guard is released when the
/// exchange finishes, so callers queue strictly behind each other.
async fn run_exchange(
    mut link: OwnedMutexGuard<Connection>,
    command: WireCommand,
) -> Result<ControllerResponse, TransportError> {
    tokio::task::spawn_blocking(move || link.exchange(command))
        .await
        .map_err(|e| TransportError::IoFailure(io::Error::other(e)))?
}

/// A SHOT-204 stage controller session
pub struct Stage {
    /// Exchange lock around the single connection
    link: Arc<Mutex<Connection>>,
    /// Cancelled on close, so continuations never outlive their session
    session: StdMutex<CancellationToken>,
    settle: Duration,
}

impl Stage {
    /// Create a closed stage from settings
    pub fn new(config: &StageConfig) -> Self {
        Self::with_connection(Connection::new(config.read_timeout()), config.settle_delay())
    }

    /// Wrap an existing connection
    pub fn with_connection(connection: Connection, settle: Duration) -> Self {
        Self {
            link: Arc::new(Mutex::new(connection)),
            session: StdMutex::new(CancellationToken::new()),
            settle,
        }
    }

    pub fn settle_delay(&self) -> Duration {
        self.settle
    }

    fn session_token(&self) -> CancellationToken {
        self.session
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// End the current session and start a fresh one
    fn renew_session(&self) {
        let mut session = self
            .session
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        session.cancel();
        *session = CancellationToken::new();
    }

    /// Open the named serial port
    pub async fn open(&self, port_name: &str) -> Result<(), ConnectionError> {
        self.renew_session();
        let mut link = self.link.clone().lock_owned().await;
        let name = port_name.to_string();
        tokio::task::spawn_blocking(move || link.open(&name))
            .await
            .map_err(|e| ConnectionError::PortUnavailable {
                port: port_name.to_string(),
                reason: e.to_string(),
            })?
    }

    /// Use an already open byte stream, e.g. the simulator
    pub async fn attach(&self, port_name: &str, port: Box<dyn StagePort>) {
        self.renew_session();
        self.link.lock().await.attach(port_name, port);
    }

    /// Close the port and cancel any pending `G:`. Safe to call when closed.
    pub async fn close(&self) {
        self.renew_session();
        self.link.lock().await.close();
    }

    pub async fn is_open(&self) -> bool {
        self.link.lock().await.is_open()
    }

    /// Cumulative (tx_bytes, rx_bytes, tx_commands, rx_lines)
    pub async fn counters(&self) -> (u64, u64, u64, u64) {
        self.link.lock().await.counters()
    }

    async fn exchange(&self, command: WireCommand) -> Result<ControllerResponse, TransportError> {
        let link = self.link.clone().lock_owned().await;
        run_exchange(link, command).await
    }

    async fn acknowledged(
        &self,
        command: MotionCommand,
        axis: AxisSelector,
    ) -> Result<String, StageError> {
        let wire = encode(command, axis);
        tracing::debug!("{} (axis {})", wire, axis);
        let response = self.exchange(wire).await?;
        let ack = decode_ack(response).inspect_err(|e| {
            tracing::warn!("{:?} on axis {}: {}", command, axis, e);
        })?;
        Ok(ack)
    }

    async fn staged(
        &self,
        command: MotionCommand,
        axis: AxisSelector,
    ) -> Result<Staged, StageError> {
        // The G: belongs to the session the staging command was issued in
        let token = self.session_token();
        let ack = self.acknowledged(command, axis).await?;
        Ok(Staged {
            ack,
            go: self.schedule_go(token),
        })
    }

    /// Send `G:` after the settle delay unless `token`'s session ends first.
    /// The reply is logged, not checked.
    fn schedule_go(&self, token: CancellationToken) -> GoHandle {
        let link = self.link.clone();
        let settle = self.settle;

        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    tracing::debug!("G: cancelled before settle delay elapsed");
                    return None;
                }
                _ = tokio::time::sleep(settle) => {}
            }

            let link = tokio::select! {
                _ = token.cancelled() => {
                    tracing::debug!("G: cancelled while waiting for the port");
                    return None;
                }
                guard = link.lock_owned() => guard,
            };
            if token.is_cancelled() {
                return None;
            }

            let result = match run_exchange(link, WireCommand::go()).await {
                Ok(response) => decode_ack(response).map_err(StageError::from),
                Err(e) => Err(StageError::from(e)),
            };
            match &result {
                Ok(ack) => tracing::debug!("G: -> {:?}", ack),
                Err(e) => tracing::warn!("G: failed: {}", e),
            }
            Some(result)
        });

        GoHandle { handle }
    }

    /// Run any command and decode its reply the way its variant requires
    pub async fn execute(
        &self,
        command: MotionCommand,
        axis: AxisSelector,
    ) -> Result<Reply, StageError> {
        match command {
            MotionCommand::QueryStatus => self.query_status(axis).await.map(Reply::Status),
            command if command.needs_go() => self.staged(command, axis).await.map(Reply::Staged),
            command => self.acknowledged(command, axis).await.map(Reply::Ack),
        }
    }

    /// Drive `axis` to its mechanical origin
    pub async fn home(&self, axis: AxisSelector) -> Result<String, StageError> {
        self.acknowledged(MotionCommand::Home, axis).await
    }

    /// Move by `steps` pulses; negative values move in the negative direction
    pub async fn move_relative(&self, axis: AxisSelector, steps: i64) -> Result<Staged, StageError> {
        self.staged(MotionCommand::MoveRelative(steps), axis).await
    }

    /// Move to `position` pulses from origin
    pub async fn move_absolute(
        &self,
        axis: AxisSelector,
        position: u64,
    ) -> Result<Staged, StageError> {
        self.staged(MotionCommand::MoveAbsolute(position), axis).await
    }

    pub async fn set_speed(
        &self,
        axis: AxisSelector,
        profile: SpeedProfile,
    ) -> Result<String, StageError> {
        self.acknowledged(MotionCommand::SetSpeedProfile(profile), axis)
            .await
    }

    /// Travel continuously until [`Stage::stop`]
    pub async fn jog(&self, axis: AxisSelector, direction: Direction) -> Result<Staged, StageError> {
        self.staged(MotionCommand::Jog(direction), axis).await
    }

    pub async fn stop(&self, axis: AxisSelector) -> Result<String, StageError> {
        self.acknowledged(MotionCommand::Stop, axis).await
    }

    /// Query the status record and return the part that belongs to `axis`
    pub async fn query_status(&self, axis: AxisSelector) -> Result<String, StageError> {
        let wire = encode(MotionCommand::QueryStatus, axis);
        let response = self.exchange(wire).await?;
        tracing::debug!("status record {:?}", response.as_str());
        Ok(decode_status(&response, axis)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo::SimulatedController;
    use crate::protocol::ProtocolError;

    fn stage() -> Stage {
        Stage::with_connection(Connection::default(), Duration::from_millis(5))
    }

    #[tokio::test]
    async fn test_operations_need_open_port() {
        let stage = stage();
        let err = stage.home(AxisSelector::Axis1).await.unwrap_err();
        assert!(matches!(
            err,
            StageError::Transport(TransportError::NotConnected)
        ));
        let err = stage
            .move_relative(AxisSelector::Axis1, 10)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StageError::Transport(TransportError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_close_without_open() {
        let stage = stage();
        stage.close().await;
        stage.close().await;
        assert!(!stage.is_open().await);
    }

    #[tokio::test]
    async fn test_open_missing_port() {
        let stage = stage();
        let err = stage.open("/dev/shot204-does-not-exist").await.unwrap_err();
        assert!(matches!(err, ConnectionError::PortUnavailable { .. }));
        assert!(!stage.is_open().await);
    }

    #[tokio::test]
    async fn test_move_then_go() {
        let sim = SimulatedController::new();
        let stage = stage();
        stage.attach("sim", Box::new(sim.clone())).await;

        let staged = stage.move_relative(AxisSelector::Axis3, 250).await.unwrap();
        assert_eq!(staged.ack, "OK");
        assert_eq!(sim.positions(), [0, 0, 0, 0]);

        let go = staged.go.wait().await;
        assert_eq!(go.map(|r| r.unwrap()), Some("OK".to_string()));
        assert_eq!(sim.positions(), [0, 0, 250, 0]);
        assert_eq!(sim.received(), vec!["M:3+P250", "G:"]);
    }

    #[tokio::test]
    async fn test_no_response_from_controller() {
        let sim = SimulatedController::new();
        sim.set_unresponsive(true);
        let stage = Stage::with_connection(
            Connection::new(Duration::from_millis(20)),
            Duration::from_millis(5),
        );
        stage.attach("sim", Box::new(sim)).await;

        let err = stage.stop(AxisSelector::All).await.unwrap_err();
        assert!(matches!(err, StageError::Protocol(ProtocolError::NoResponse)));
        let err = stage.query_status(AxisSelector::All).await.unwrap_err();
        assert!(matches!(err, StageError::Protocol(ProtocolError::NoResponse)));
    }

    #[tokio::test]
    async fn test_close_cancels_pending_go() {
        let sim = SimulatedController::new();
        let stage = Stage::with_connection(Connection::default(), Duration::from_secs(1));
        stage.attach("sim", Box::new(sim.clone())).await;

        let staged = stage.jog(AxisSelector::Axis1, Direction::Negative).await.unwrap();
        stage.close().await;

        assert!(staged.go.wait().await.is_none());
        assert_eq!(sim.received(), vec!["J:1-"]);
        assert!(!sim.is_busy());
    }

    #[tokio::test]
    async fn test_reopen_drops_old_session_go() {
        let first = SimulatedController::new();
        let second = SimulatedController::new();
        let stage = Stage::with_connection(Connection::default(), Duration::from_millis(200));
        stage.attach("first", Box::new(first.clone())).await;

        let staged = stage.move_absolute(AxisSelector::All, 10).await.unwrap();
        stage.attach("second", Box::new(second.clone())).await;

        assert!(staged.go.wait().await.is_none());
        assert!(second.received().is_empty());
        assert_eq!(first.received(), vec!["A:WP10"]);
    }
}
