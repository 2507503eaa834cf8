//! ==============================================================================
//! domain.rs - shared value types
//! ==============================================================================
//!
//! purpose:
//!     the types that flow between the reading source, the csv log, the
//!     window selector, the statistics engine and the web shell.
//!
//! relationships:
//!     - produced by: source.rs (Reading), store.rs (Record)
//!     - consumed by: window.rs, stats.rs, orchestrator.rs, server.rs
//!
//! ==============================================================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// timestamp layout used on the wire and in the csv log
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// one freshly acquired sample. immutable once recorded.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Reading {
    pub timestamp: NaiveDateTime,
    /// degrees celsius
    pub temperature: f64,
    /// relative humidity in percent
    pub humidity: f64,
}

/// a row read back from the log.
///
/// the timestamp is `None` when the cell could not be parsed; such rows are
/// kept in the "all" view and dropped from time-windowed views.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Record {
    pub timestamp: Option<NaiveDateTime>,
    pub temperature: f64,
    pub humidity: f64,
}

impl From<Reading> for Record {
    fn from(r: Reading) -> Self {
        Self {
            timestamp: Some(r.timestamp),
            temperature: r.temperature,
            humidity: r.humidity,
        }
    }
}

/// shortest float form, but whole numbers keep a trailing ".0"
pub fn format_float(v: f64) -> String {
    if v.is_finite() && v.fract() == 0.0 {
        format!("{:.1}", v)
    } else {
        v.to_string()
    }
}

// ==============================================================================
// display filter
// ==============================================================================

#[derive(Error, Debug, PartialEq)]
pub enum ParseFilterError {
    #[error("unknown live mode {0:?} (expected \"on\" or \"off\")")]
    LiveMode(String),

    #[error("unknown time window {0:?} (expected \"5\", \"10\", \"30\" or \"all\")")]
    TimeWindow(String),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LiveMode {
    #[default]
    On,
    Off,
}

impl FromStr for LiveMode {
    type Err = ParseFilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "on" => Ok(Self::On),
            "off" => Ok(Self::Off),
            other => Err(ParseFilterError::LiveMode(other.to_string())),
        }
    }
}

/// the time ranges the dashboard offers
pub const WINDOW_MINUTES: [u32; 3] = [5, 10, 30];

/// how much history the chart and statistics cover
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TimeWindow {
    /// readings from the last N minutes, one of `WINDOW_MINUTES`
    Minutes(u32),
    #[default]
    All,
}

impl TimeWindow {
    pub fn minutes(self) -> Option<u32> {
        match self {
            Self::Minutes(n) => Some(n),
            Self::All => None,
        }
    }
}

impl FromStr for TimeWindow {
    type Err = ParseFilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "all" {
            return Ok(Self::All);
        }
        WINDOW_MINUTES
            .iter()
            .find(|n| n.to_string() == s)
            .map(|&n| Self::Minutes(n))
            .ok_or_else(|| ParseFilterError::TimeWindow(s.to_string()))
    }
}

impl TryFrom<String> for TimeWindow {
    type Error = ParseFilterError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<TimeWindow> for String {
    fn from(w: TimeWindow) -> Self {
        w.to_string()
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Minutes(n) => write!(f, "{}", n),
            Self::All => f.write_str("all"),
        }
    }
}

/// owned by the presentation layer, read once per tick
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayFilter {
    pub live: LiveMode,
    pub window: TimeWindow,
}

// ==============================================================================
// render payload
// ==============================================================================

/// which variant of the reading source is feeding the log
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceMode {
    Live,
    Simulated,
}

impl fmt::Display for SourceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Live => f.write_str("live"),
            Self::Simulated => f.write_str("simulated"),
        }
    }
}

/// everything the shell needs to draw one refresh. recomputed every live tick.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RenderPayload {
    /// chart series, same subset the statistics were computed over
    pub series: Vec<Record>,
    pub current_temp: String,
    pub current_hum: String,
    pub avg_temp: String,
    pub avg_hum: String,
    pub max_temp: String,
    pub min_temp: String,
    /// empty when no alert is active
    pub alert_text: String,
    pub filter: DisplayFilter,
    pub source: SourceMode,
    pub generated_at: NaiveDateTime,
}
