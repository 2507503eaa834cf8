//! ==============================================================================
//! store.rs - append-only csv log of readings
//! ==============================================================================
//!
//! purpose:
//!     persists every reading as one csv line and reads the whole file back
//!     for rendering and export.
//!
//! format:
//!     Timestamp,Temperature,Humidity
//!     2025-03-01 14:02:11,23.5,55.1
//!
//! every call opens the file, does its work and drops the handle again.
//! there is a single writer (the orchestrator) so no locking is needed.
//!
//! relationships:
//!     - written by: source.rs (append as part of acquisition)
//!     - read by: orchestrator.rs (read_all), server.rs (export)
//!
//! ==============================================================================

use crate::domain::{format_float, Reading, Record, TIMESTAMP_FORMAT};

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

pub const HEADER: &str = "Timestamp,Temperature,Humidity";

#[derive(Debug, Clone)]
pub struct DurableLog {
    path: PathBuf,
}

impl DurableLog {
    /// open the log, creating it with just the header if it is missing
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            fs::write(&path, format!("{}\n", HEADER))
                .with_context(|| format!("Failed to create log {}", path.display()))?;
            tracing::info!("Created sensor log {}", path.display());
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// append one reading as a single newline-terminated line
    pub fn append(&self, reading: &Reading) -> Result<()> {
        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open log {}", self.path.display()))?;

        let line = format!(
            "{},{},{}\n",
            reading.timestamp.format(TIMESTAMP_FORMAT),
            format_float(reading.temperature),
            format_float(reading.humidity)
        );
        file.write_all(line.as_bytes())
            .and_then(|_| file.flush())
            .with_context(|| format!("Failed to append to log {}", self.path.display()))?;
        Ok(())
    }

    /// load every row in insertion order.
    ///
    /// a missing or empty file is "no data yet". unparseable timestamps become
    /// `None`; rows with non-numeric values are skipped.
    pub fn read_all(&self) -> Result<Vec<Record>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read log {}", self.path.display()))
            }
        };

        let mut lines = content.lines();
        // first line is the header
        if lines.next().is_none() {
            return Ok(Vec::new());
        }

        let mut records = Vec::new();
        for (i, line) in lines.enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match parse_row(line) {
                Some(record) => records.push(record),
                None => tracing::warn!("Skipping malformed log row {}: {:?}", i + 2, line),
            }
        }
        Ok(records)
    }

    /// raw file contents for bulk download
    pub fn export(&self) -> Result<Vec<u8>> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(format!("{}\n", HEADER).into_bytes()),
            Err(e) => Err(e).with_context(|| format!("Failed to read log {}", self.path.display())),
        }
    }
}

fn parse_row(line: &str) -> Option<Record> {
    let mut cells = line.split(',').map(str::trim);
    let timestamp = cells.next()?;
    let temperature = cells.next()?.parse::<f64>().ok()?;
    let humidity = cells.next()?.parse::<f64>().ok()?;

    Some(Record {
        timestamp: parse_timestamp(timestamp),
        temperature,
        humidity,
    })
}

fn parse_timestamp(cell: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(cell, TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(cell, "%Y-%m-%d %H:%M:%S%.f"))
        .or_else(|_| NaiveDateTime::parse_from_str(cell, "%Y-%m-%dT%H:%M:%S%.f"))
        .ok()
}
