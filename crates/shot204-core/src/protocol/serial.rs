//! Serial port handling
//!
//! Opens ports with the controller's fixed line settings and lists candidates.

use serialport::{
    DataBits, FlowControl, Parity, SerialPort, SerialPortInfo, SerialPortType, StopBits,
};
use std::collections::HashMap;
#[cfg(target_os = "linux")]
use std::fs;
use std::time::Duration;

use super::{ConnectionError, BAUD_RATE};

/// Information about an available serial port
#[derive(Debug, Clone)]
pub struct PortInfo {
    /// Port name (e.g., "/dev/ttyUSB0" or "COM3")
    pub name: String,

    /// USB vendor ID (if USB device)
    pub vid: Option<u16>,

    /// USB product ID (if USB device)
    pub pid: Option<u16>,

    /// Manufacturer name (if available)
    pub manufacturer: Option<String>,

    /// Product name (if available)
    pub product: Option<String>,
}

impl PortInfo {
    #[cfg_attr(not(target_os = "linux"), allow(dead_code))]
    fn bare(name: String) -> Self {
        Self {
            name,
            vid: None,
            pid: None,
            manufacturer: None,
            product: None,
        }
    }
}

impl From<SerialPortInfo> for PortInfo {
    fn from(info: SerialPortInfo) -> Self {
        match info.port_type {
            SerialPortType::UsbPort(usb) => Self {
                name: info.port_name,
                vid: Some(usb.vid),
                pid: Some(usb.pid),
                manufacturer: usb.manufacturer,
                product: usb.product,
            },
            _ => Self::bare(info.port_name),
        }
    }
}

/// Device prefixes in the order an operator is most likely to want them.
/// The controller usually sits behind a USB-RS232 adapter.
const PREFERRED_PREFIXES: [&str; 3] = ["ttyUSB", "ttyACM", "ttyS"];

/// Rank by preferred prefix, then by numeric suffix so ttyUSB2 < ttyUSB10
fn port_sort_key(name: &str) -> (usize, u32, String) {
    let device = name.rsplit('/').next().unwrap_or(name);
    PREFERRED_PREFIXES
        .iter()
        .enumerate()
        .find_map(|(rank, prefix)| {
            let index = device.strip_prefix(prefix)?.parse::<u32>().ok()?;
            Some((rank, index, device.to_string()))
        })
        .unwrap_or((PREFERRED_PREFIXES.len(), 0, device.to_string()))
}

/// Serial ports the controller could be on, best candidates first
pub fn list_ports() -> Vec<PortInfo> {
    let mut found: HashMap<String, PortInfo> = match serialport::available_ports() {
        Ok(ports) => ports
            .into_iter()
            .map(PortInfo::from)
            .map(|port| (port.name.clone(), port))
            .collect(),
        Err(e) => {
            tracing::warn!("serial port enumeration failed: {}", e);
            HashMap::new()
        }
    };

    // Adapters without udev metadata are skipped by enumeration
    #[cfg(target_os = "linux")]
    if let Ok(entries) = fs::read_dir("/dev") {
        let adapters = entries
            .flatten()
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|device| device.starts_with("ttyUSB") || device.starts_with("ttyACM"));
        for device in adapters {
            let path = format!("/dev/{}", device);
            found
                .entry(path.clone())
                .or_insert_with(|| PortInfo::bare(path));
        }
    }

    let mut ports: Vec<PortInfo> = found.into_values().collect();
    ports.sort_by_key(|port| port_sort_key(&port.name));
    ports
}

/// Open a port at 38400 8N1 with RTS/CTS flow control
pub fn open_port(name: &str, timeout: Duration) -> Result<Box<dyn SerialPort>, ConnectionError> {
    serialport::new(name, BAUD_RATE)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::Hardware)
        .timeout(timeout)
        .open()
        .map_err(|e| ConnectionError::PortUnavailable {
            port: name.to_string(),
            reason: e.to_string(),
        })
}
