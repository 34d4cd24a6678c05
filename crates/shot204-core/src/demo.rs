//! Demo Mode - simulated SHOT-204 controller
//!
//! Answers the full command vocabulary in memory so the tools can be driven
//! without hardware. Moves and jogs are staged and only take effect on `G:`,
//! like the real controller. A jogging axis advances by [`JOG_STEP`] every time
//! status is queried.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::protocol::{SpeedProfile, StagePort};

/// Number of axes on a SHOT-204
pub const AXES: usize = 4;

/// Pulses a jogging axis travels between two status queries
pub const JOG_STEP: i64 = 100;

/// Motion waiting for `G:`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Staged {
    Relative { axes: [bool; AXES], delta: i64 },
    Absolute { axes: [bool; AXES], position: i64 },
    Jog { axes: [bool; AXES], step: i64 },
}

#[derive(Debug, Default)]
struct SimState {
    positions: [i64; AXES],
    jogging: [i64; AXES],
    speeds: [Option<SpeedProfile>; AXES],
    staged: Option<Staged>,
    inbound: Vec<u8>,
    outbound: VecDeque<u8>,
    received: Vec<String>,
    unresponsive: bool,
}

/// In-memory controller; clones share the same state
#[derive(Debug, Clone, Default)]
pub struct SimulatedController {
    state: Arc<Mutex<SimState>>,
}

impl SimulatedController {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Current positions of all axes
    pub fn positions(&self) -> [i64; AXES] {
        self.lock().positions
    }

    /// Last speed profile set per axis
    pub fn speeds(&self) -> [Option<SpeedProfile>; AXES] {
        self.lock().speeds
    }

    /// Check if any axis is jogging
    pub fn is_busy(&self) -> bool {
        self.lock().jogging.iter().any(|&s| s != 0)
    }

    /// Every command line received so far, without terminators
    pub fn received(&self) -> Vec<String> {
        self.lock().received.clone()
    }

    /// Stop answering, as a controller that is powered off would
    pub fn set_unresponsive(&self, unresponsive: bool) {
        self.lock().unresponsive = unresponsive;
    }
}

/// Parse an axis token into the set of axes it addresses
fn parse_axes(token: Option<char>) -> Option<[bool; AXES]> {
    let mut axes = [false; AXES];
    match token? {
        'W' => axes = [true; AXES],
        c @ '1'..='4' => axes[(c as u8 - b'1') as usize] = true,
        _ => return None,
    }
    Some(axes)
}

fn parse_sign(c: char) -> Option<i64> {
    match c {
        '+' => Some(1),
        '-' => Some(-1),
        _ => None,
    }
}

/// Parse `<digits>` following `prefix`, returning the number and the rest
fn take_number<'a>(s: &'a str, prefix: char) -> Option<(i64, &'a str)> {
    let s = s.strip_prefix(prefix)?;
    let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let value = s[..end].parse().ok()?;
    Some((value, &s[end..]))
}

fn format_position(position: i64) -> String {
    let sign = if position < 0 { '-' } else { '+' };
    format!("{}{:>9}", sign, position.unsigned_abs())
}

impl SimState {
    fn status_record(&mut self) -> String {
        for axis in 0..AXES {
            self.positions[axis] = self.positions[axis].saturating_add(self.jogging[axis]);
        }
        let fields: Vec<String> = self.positions.iter().map(|&p| format_position(p)).collect();
        let ready = if self.jogging.iter().any(|&s| s != 0) {
            'B'
        } else {
            'R'
        };
        format!("{},K,K,{}", fields.join(","), ready)
    }

    fn go(&mut self) {
        match self.staged.take() {
            Some(Staged::Relative { axes, delta }) => {
                for axis in (0..AXES).filter(|&a| axes[a]) {
                    self.positions[axis] = self.positions[axis].saturating_add(delta);
                }
            }
            Some(Staged::Absolute { axes, position }) => {
                for axis in (0..AXES).filter(|&a| axes[a]) {
                    self.positions[axis] = position;
                }
            }
            Some(Staged::Jog { axes, step }) => {
                for axis in (0..AXES).filter(|&a| axes[a]) {
                    self.jogging[axis] = step;
                }
            }
            None => {}
        }
    }

    /// Execute one command line and produce the reply text
    fn handle(&mut self, line: &str) -> Option<String> {
        let mut chars = line.chars();
        let letter = chars.next()?;
        let rest = chars.as_str().strip_prefix(':')?;
        let mut rest_chars = rest.chars();
        let axes = parse_axes(rest_chars.next());
        let after_axis = rest_chars.as_str();

        match letter {
            'Q' if rest.is_empty() => Some(self.status_record()),
            'G' if rest.is_empty() => {
                self.go();
                Some("OK".into())
            }
            'H' if after_axis.is_empty() => {
                let axes = axes?;
                for axis in (0..AXES).filter(|&a| axes[a]) {
                    self.positions[axis] = 0;
                    self.jogging[axis] = 0;
                }
                Some("OK".into())
            }
            'L' if after_axis.is_empty() => {
                let axes = axes?;
                for axis in (0..AXES).filter(|&a| axes[a]) {
                    self.jogging[axis] = 0;
                }
                Some("OK".into())
            }
            'M' => {
                let axes = axes?;
                let mut tail = after_axis.chars();
                let sign = parse_sign(tail.next()?)?;
                let (pulses, left) = take_number(tail.as_str(), 'P')?;
                if !left.is_empty() {
                    return None;
                }
                self.staged = Some(Staged::Relative {
                    axes,
                    delta: sign * pulses,
                });
                Some("OK".into())
            }
            'A' => {
                let axes = axes?;
                // Older firmware accepts a sign before 'P'
                let (sign, tail) = match after_axis.chars().next().and_then(parse_sign) {
                    Some(sign) => (sign, &after_axis[1..]),
                    None => (1, after_axis),
                };
                let (position, left) = take_number(tail, 'P')?;
                if !left.is_empty() {
                    return None;
                }
                self.staged = Some(Staged::Absolute {
                    axes,
                    position: sign * position,
                });
                Some("OK".into())
            }
            'D' => {
                let axes = axes?;
                let (slow, tail) = take_number(after_axis, 'S')?;
                let (fast, tail) = take_number(tail, 'F')?;
                let (rate, tail) = take_number(tail, 'R')?;
                if !tail.is_empty() {
                    return None;
                }
                let profile = SpeedProfile::new(slow as u64, fast as u64, rate as u64);
                for axis in (0..AXES).filter(|&a| axes[a]) {
                    self.speeds[axis] = Some(profile);
                }
                Some("OK".into())
            }
            'J' => {
                let axes = axes?;
                let mut tail = after_axis.chars();
                let sign = parse_sign(tail.next()?)?;
                if !tail.as_str().is_empty() {
                    return None;
                }
                self.staged = Some(Staged::Jog {
                    axes,
                    step: sign * JOG_STEP,
                });
                Some("OK".into())
            }
            _ => None,
        }
    }

    fn feed(&mut self, bytes: &[u8]) {
        for &b in bytes {
            if b != b'\n' {
                self.inbound.push(b);
                continue;
            }
            let raw = std::mem::take(&mut self.inbound);
            let line = String::from_utf8_lossy(&raw).trim_end_matches('\r').to_string();
            let reply = self.handle(&line).unwrap_or_else(|| "NG".into());
            self.received.push(line);
            if !self.unresponsive {
                self.outbound.extend(reply.bytes());
                self.outbound.extend(b"\r\n");
            }
        }
    }
}

impl Read for SimulatedController {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut state = self.lock();
        if state.outbound.is_empty() {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "no reply"));
        }
        let n = buf.len().min(state.outbound.len());
        for (slot, byte) in buf.iter_mut().zip(state.outbound.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl Write for SimulatedController {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.lock().feed(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl StagePort for SimulatedController {
    fn discard_input(&mut self) -> io::Result<()> {
        self.lock().outbound.clear();
        Ok(())
    }
}
