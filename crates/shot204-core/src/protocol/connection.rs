//! Connection management
//!
//! Owns the serial handle and performs one write-then-read-line exchange per call.

use serialport::{ClearBuffer, SerialPort};
use std::io::{self, Read, Write};
use std::time::{Duration, Instant};

use super::{
    serial::open_port, ConnectionError, ControllerResponse, TransportError, WireCommand,
    DEFAULT_TIMEOUT_MS, MAX_LINE_LEN,
};

/// Byte stream the connection talks through.
///
/// Implemented for real serial ports; tests and the simulator provide their own.
pub trait StagePort: Read + Write + Send {
    /// Drop anything already received, so a late reply to an earlier command
    /// cannot be mistaken for the answer to the next one.
    fn discard_input(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl StagePort for Box<dyn SerialPort> {
    fn discard_input(&mut self) -> io::Result<()> {
        self.clear(ClearBuffer::Input).map_err(io::Error::from)
    }
}

/// Read bytes up to and including `\n`, or until `timeout` passes.
///
/// A timeout is not an error: it ends the line with whatever arrived.
fn read_line(port: &mut dyn StagePort, timeout: Duration) -> io::Result<Vec<u8>> {
    let deadline = Instant::now() + timeout;
    let mut line = Vec::new();
    let mut byte = [0u8; 1];

    while line.len() < MAX_LINE_LEN {
        if Instant::now() >= deadline {
            tracing::debug!("read_line: timeout after {} bytes", line.len());
            break;
        }
        match port.read(&mut byte) {
            Ok(0) => break,
            Ok(_) => {
                line.push(byte[0]);
                if byte[0] == b'\n' {
                    break;
                }
            }
            Err(e) if e.kind() == io::ErrorKind::TimedOut => {
                tracing::debug!("read_line: port timed out after {} bytes", line.len());
                break;
            }
            Err(e)
                if e.kind() == io::ErrorKind::Interrupted
                    || e.kind() == io::ErrorKind::WouldBlock =>
            {
                continue;
            }
            Err(e) => return Err(e),
        }
    }

    Ok(line)
}

/// Controller connection
pub struct Connection {
    /// Port handle, `None` while closed
    port: Option<Box<dyn StagePort>>,
    /// Name the port was opened under
    port_name: Option<String>,
    /// Per-line read timeout
    timeout: Duration,
    /// Metrics: cumulative bytes and lines each way
    tx_bytes: u64,
    rx_bytes: u64,
    tx_commands: u64,
    rx_lines: u64,
}

impl Default for Connection {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_TIMEOUT_MS))
    }
}

impl Connection {
    /// Create a closed connection
    pub fn new(timeout: Duration) -> Self {
        Self {
            port: None,
            port_name: None,
            timeout,
            tx_bytes: 0,
            rx_bytes: 0,
            tx_commands: 0,
            rx_lines: 0,
        }
    }

    /// Open the named serial port. An already open handle is closed first.
    pub fn open(&mut self, port_name: &str) -> Result<(), ConnectionError> {
        self.close();
        let port = open_port(port_name, self.timeout).inspect_err(|e| {
            tracing::warn!("open failed: {}", e);
        })?;
        self.attach(port_name, Box::new(port));
        Ok(())
    }

    /// Use an already open byte stream as the controller link
    pub fn attach(&mut self, port_name: &str, port: Box<dyn StagePort>) {
        self.close();
        tracing::info!("connected to {}", port_name);
        self.port = Some(port);
        self.port_name = Some(port_name.to_string());
    }

    /// Release the port; does nothing when already closed
    pub fn close(&mut self) {
        if let Some(mut port) = self.port.take() {
            if let Err(e) = port.flush() {
                tracing::debug!("flush on close failed: {}", e);
            }
            tracing::info!(
                "disconnected from {}",
                self.port_name.as_deref().unwrap_or("port")
            );
        }
        self.port_name = None;
    }

    pub fn is_open(&self) -> bool {
        self.port.is_some()
    }

    /// Name of the open port
    pub fn port_name(&self) -> Option<&str> {
        self.port_name.as_deref()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Cumulative (tx_bytes, rx_bytes, tx_commands, rx_lines)
    pub fn counters(&self) -> (u64, u64, u64, u64) {
        (self.tx_bytes, self.rx_bytes, self.tx_commands, self.rx_lines)
    }

    /// Write one command and read one line back.
    ///
    /// An empty response means the read timed out with no data; deciding
    /// whether that is a protocol violation is left to the caller. After an
    /// `IoFailure` the link state is unknown and should be reopened.
    pub fn exchange(
        &mut self,
        command: WireCommand,
    ) -> Result<ControllerResponse, TransportError> {
        let timeout = self.timeout;
        let port = self.port.as_mut().ok_or(TransportError::NotConnected)?;

        if let Err(e) = port.discard_input() {
            tracing::debug!("exchange: discarding stale input failed: {}", e);
        }

        tracing::debug!("exchange: sending {:?}", command.as_str());
        port.write_all(command.as_bytes()).inspect_err(|e| {
            tracing::warn!("exchange: write of {} failed: {}", command, e);
        })?;
        port.flush()?;

        self.tx_bytes = self.tx_bytes.saturating_add(command.len() as u64);
        self.tx_commands = self.tx_commands.saturating_add(1);

        let raw = read_line(port.as_mut(), timeout).inspect_err(|e| {
            tracing::warn!("exchange: read after {} failed: {}", command, e);
        })?;

        if !raw.is_empty() {
            self.rx_bytes = self.rx_bytes.saturating_add(raw.len() as u64);
            self.rx_lines = self.rx_lines.saturating_add(1);
        }

        let response = ControllerResponse::from_bytes(&raw);
        tracing::debug!("exchange: {} -> {:?}", command, response.as_str());
        Ok(response)
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}
