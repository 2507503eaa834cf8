//! ==============================================================================
//! source.rs - where readings come from
//! ==============================================================================
//!
//! purpose:
//!     produces the next temperature/humidity reading, either from the serial
//!     device or from a simulator when no device is available. every reading
//!     that comes out of here has already been appended to the csv log.
//!
//! design:
//!     - ReadingSource is picked once at startup (Live or Simulated) and the
//!       rest of the program never asks which one it got.
//!     - the device is behind the DeviceChannel trait so the polling and
//!       parsing logic can be exercised without hardware (same idea as a mock
//!       hal on a dev machine).
//!     - polling never blocks: we only read what bytes_to_read() says is
//!       already buffered. a half-received line waits for the next tick.
//!
//! relationships:
//!     - used by: orchestrator.rs (next_reading once per live tick)
//!     - uses: store.rs (append), config.rs (port settings, simulation ranges)
//!
//! ==============================================================================

use crate::config::{DeviceConfig, SimulationConfig};
use crate::domain::{Reading, SourceMode};
use crate::store::DurableLog;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDateTime, SubsecRound};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serialport::SerialPort;
use std::io::Read;
use std::time::Duration;

/// longest partial line we keep waiting on before giving up on it
const MAX_PENDING_BYTES: usize = 4096;

/// local wall-clock time, truncated to whole seconds
pub fn wall_clock() -> NaiveDateTime {
    Local::now().naive_local().trunc_subsecs(0)
}

// ==============================================================================
// device channel
// ==============================================================================

/// a line-oriented byte channel to the sensor
pub trait DeviceChannel: Send {
    /// next complete line if one is already buffered, `None` if nothing is waiting
    fn poll_line(&mut self) -> Result<Option<Vec<u8>>>;
}

/// raw bytes from the device plus how many are already waiting
pub trait ByteSource: Read + Send {
    fn bytes_available(&mut self) -> Result<usize>;
}

impl ByteSource for Box<dyn SerialPort> {
    fn bytes_available(&mut self) -> Result<usize> {
        Ok(self.bytes_to_read().context("Serial status query failed")? as usize)
    }
}

/// splits a byte source into lines without ever waiting for more input.
/// a partial line stays in `pending` until its newline arrives.
pub struct LineFramer<S> {
    source: S,
    pending: Vec<u8>,
}

pub type SerialChannel = LineFramer<Box<dyn SerialPort>>;

impl SerialChannel {
    pub fn open(config: &DeviceConfig) -> Result<Self> {
        let port = serialport::new(&config.port, config.baud_rate)
            .timeout(Duration::from_millis(config.read_timeout_ms))
            .open()
            .with_context(|| format!("Cannot open serial port {}", config.port))?;
        Ok(LineFramer::new(port))
    }
}

impl<S: ByteSource> LineFramer<S> {
    pub fn new(source: S) -> Self {
        Self { source, pending: Vec::new() }
    }

    fn take_line(&mut self) -> Option<Vec<u8>> {
        let pos = self.pending.iter().position(|&b| b == b'\n')?;
        let mut line: Vec<u8> = self.pending.drain(..=pos).collect();
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Some(line)
    }
}

impl<S: ByteSource> DeviceChannel for LineFramer<S> {
    fn poll_line(&mut self) -> Result<Option<Vec<u8>>> {
        loop {
            if let Some(line) = self.take_line() {
                return Ok(Some(line));
            }

            let available = self.source.bytes_available()?;
            if available == 0 {
                return Ok(None);
            }

            let mut buf = vec![0u8; available];
            let n = self.source.read(&mut buf).context("Serial read failed")?;
            self.pending.extend_from_slice(&buf[..n]);

            if self.pending.len() > MAX_PENDING_BYTES && !self.pending.contains(&b'\n') {
                tracing::warn!("Dropping {} bytes of unterminated serial input", self.pending.len());
                self.pending.clear();
            }
            if n == 0 {
                return Ok(None);
            }
        }
    }
}

// ==============================================================================
// simulator
// ==============================================================================

pub struct Simulator {
    rng: StdRng,
    ranges: SimulationConfig,
}

impl Simulator {
    pub fn new(ranges: SimulationConfig) -> Self {
        Self { rng: StdRng::from_entropy(), ranges }
    }

    #[cfg(test)]
    pub fn seeded(ranges: SimulationConfig, seed: u64) -> Self {
        Self { rng: StdRng::seed_from_u64(seed), ranges }
    }

    fn sample(&mut self) -> (f64, f64) {
        let r = &self.ranges;
        let t = self.rng.gen_range(r.temperature_min..=r.temperature_max);
        let h = self.rng.gen_range(r.humidity_min..=r.humidity_max);
        (round2(t), round2(h))
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

// ==============================================================================
// reading source
// ==============================================================================

pub enum ReadingSource {
    Live(Box<dyn DeviceChannel>),
    Simulated(Simulator),
}

impl ReadingSource {
    /// pick the source for this process. never fails: anything that stops the
    /// device from opening drops us into simulation for good.
    pub fn connect(device: &DeviceConfig, simulation: &SimulationConfig) -> Self {
        let flagged = std::env::var_os(&device.simulate_env).is_some();
        Self::connect_with(device, simulation, flagged, |cfg| {
            SerialChannel::open(cfg).map(|c| Box::new(c) as Box<dyn DeviceChannel>)
        })
    }

    fn connect_with<F>(
        device: &DeviceConfig,
        simulation: &SimulationConfig,
        simulate_flag: bool,
        open: F,
    ) -> Self
    where
        F: FnOnce(&DeviceConfig) -> Result<Box<dyn DeviceChannel>>,
    {
        if simulate_flag {
            tracing::warn!("{} is set: serial connection disabled, simulating readings", device.simulate_env);
            return Self::Simulated(Simulator::new(simulation.clone()));
        }
        if !device.enabled {
            tracing::warn!("Device disabled in config, simulating readings");
            return Self::Simulated(Simulator::new(simulation.clone()));
        }

        match open(device) {
            Ok(channel) => {
                tracing::info!("Serial port {} open at {} baud", device.port, device.baud_rate);
                if device.settle_ms > 0 {
                    // most boards reset when the port opens
                    std::thread::sleep(Duration::from_millis(device.settle_ms));
                }
                Self::Live(channel)
            }
            Err(e) => {
                tracing::warn!("{:#}; falling back to simulated readings", e);
                Self::Simulated(Simulator::new(simulation.clone()))
            }
        }
    }

    pub fn mode(&self) -> SourceMode {
        match self {
            Self::Live(_) => SourceMode::Live,
            Self::Simulated(_) => SourceMode::Simulated,
        }
    }

    /// acquire at most one reading and append it to `log` before returning it.
    ///
    /// in live mode buffered lines are drained until the first valid one;
    /// lines that don't parse are discarded.
    pub fn next_reading(&mut self, log: &DurableLog) -> Result<Option<Reading>> {
        let values = match self {
            Self::Simulated(sim) => Some(sim.sample()),
            Self::Live(channel) => drain_first_valid(channel.as_mut())?,
        };

        let Some((temperature, humidity)) = values else {
            return Ok(None);
        };
        let reading = Reading { timestamp: wall_clock(), temperature, humidity };
        log.append(&reading)?;
        Ok(Some(reading))
    }
}

fn drain_first_valid(channel: &mut dyn DeviceChannel) -> Result<Option<(f64, f64)>> {
    while let Some(raw) = channel.poll_line()? {
        let line = match String::from_utf8(raw) {
            Ok(line) => line,
            Err(_) => {
                tracing::warn!("Invalid UTF-8 from device, skipping line");
                continue;
            }
        };
        let line = line.trim();
        tracing::debug!("Raw serial data: {}", line);

        match parse_line(line) {
            Some(values) => return Ok(Some(values)),
            None => tracing::warn!("Could not find both temperature and humidity in {:?}, skipping", line),
        }
    }
    Ok(None)
}

// ==============================================================================
// line parsing
// ==============================================================================

/// first two numbers in the line are temperature and humidity, the rest is ignored
pub fn parse_line(line: &str) -> Option<(f64, f64)> {
    let mut numbers = extract_numbers(line).into_iter();
    let temperature = numbers.next()?;
    let humidity = numbers.next()?;
    Some((temperature, humidity))
}

/// every signed integer or decimal in the text, left to right
pub fn extract_numbers(text: &str) -> Vec<f64> {
    let bytes = text.as_bytes();
    let mut out = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        match scan_number(bytes, i) {
            Some(end) => {
                // the slice is ascii sign/digits/dot only
                if let Ok(v) = text[i..end].parse::<f64>() {
                    out.push(v);
                }
                i = end;
            }
            None => i += 1,
        }
    }
    out
}

/// end index of a number starting exactly at `start`, if one does
fn scan_number(bytes: &[u8], start: usize) -> Option<usize> {
    let mut i = start;
    if matches!(bytes.get(i), Some(b'-' | b'+')) {
        i += 1;
    }

    let int_start = i;
    while bytes.get(i).is_some_and(u8::is_ascii_digit) {
        i += 1;
    }
    let has_int = i > int_start;

    // only take the dot when a digit follows it
    if bytes.get(i) == Some(&b'.') && bytes.get(i + 1).is_some_and(u8::is_ascii_digit) {
        i += 1;
        while bytes.get(i).is_some_and(u8::is_ascii_digit) {
            i += 1;
        }
        return Some(i);
    }

    has_int.then_some(i)
}
