//! ==============================================================================
//! stats.rs - summary statistics and alerts
//! ==============================================================================
//!
//! purpose:
//!     latest / average / max / min over the windowed subset, plus the single
//!     warning line shown above the chart.
//!
//! notes:
//!     - "current" is the last row of the subset it is given, not the newest
//!       timestamp in the log.
//!     - humidity only gets an average; there is no max/min humidity.
//!
//! ==============================================================================

use crate::config::AlertConfig;
use crate::domain::{format_float as value, Record};

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Summary {
    pub current_temp: f64,
    pub current_hum: f64,
    pub avg_temp: f64,
    pub avg_hum: f64,
    pub max_temp: f64,
    pub min_temp: f64,
}

/// `None` is the designated empty result
pub fn summarize(subset: &[Record]) -> Option<Summary> {
    let last = subset.last()?;
    let n = subset.len() as f64;

    let mut sum_temp = 0.0;
    let mut sum_hum = 0.0;
    let mut max_temp = f64::NEG_INFINITY;
    let mut min_temp = f64::INFINITY;
    for r in subset {
        sum_temp += r.temperature;
        sum_hum += r.humidity;
        max_temp = max_temp.max(r.temperature);
        min_temp = min_temp.min(r.temperature);
    }

    Some(Summary {
        current_temp: last.temperature,
        current_hum: last.humidity,
        avg_temp: sum_temp / n,
        avg_hum: sum_hum / n,
        max_temp,
        min_temp,
    })
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Alert {
    HighTemperature(f64),
    HighHumidity(f64),
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Alert::HighTemperature(limit) => {
                write!(f, "⚠️ WARNING: High Temperature! (> {}°C)", limit)
            }
            Alert::HighHumidity(limit) => write!(f, "⚠️ WARNING: High Humidity! (> {}%)", limit),
        }
    }
}

/// checked against the current values only; temperature wins over humidity
pub fn derive_alert(summary: &Summary, limits: &AlertConfig) -> Option<Alert> {
    if summary.current_temp > limits.temperature_high {
        Some(Alert::HighTemperature(limits.temperature_high))
    } else if summary.current_hum > limits.humidity_high {
        Some(Alert::HighHumidity(limits.humidity_high))
    } else {
        None
    }
}

// ==============================================================================
// display strings
// ==============================================================================

const PLACEHOLDER: &str = "--";

/// the seven strings the dashboard shows, in display order
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayLines {
    pub current_temp: String,
    pub current_hum: String,
    pub avg_temp: String,
    pub avg_hum: String,
    pub max_temp: String,
    pub min_temp: String,
    pub alert: String,
}

impl DisplayLines {
    pub fn build(summary: Option<&Summary>, limits: &AlertConfig) -> Self {
        let Some(s) = summary else {
            return Self {
                current_temp: format!("Temperature: {}", PLACEHOLDER),
                current_hum: format!("Humidity: {}", PLACEHOLDER),
                avg_temp: format!("Avg Temp: {}", PLACEHOLDER),
                avg_hum: format!("Avg Hum: {}", PLACEHOLDER),
                max_temp: format!("Max Temp: {}", PLACEHOLDER),
                min_temp: format!("Min Temp: {}", PLACEHOLDER),
                alert: String::new(),
            };
        };

        Self {
            current_temp: format!("Temperature: {}°C", value(s.current_temp)),
            current_hum: format!("Humidity: {}%", value(s.current_hum)),
            avg_temp: format!("Avg Temp: {:.2}°C", s.avg_temp),
            avg_hum: format!("Avg Hum: {:.2}%", s.avg_hum),
            max_temp: format!("Max Temp: {}°C", value(s.max_temp)),
            min_temp: format!("Min Temp: {}°C", value(s.min_temp)),
            alert: derive_alert(s, limits).map(|a| a.to_string()).unwrap_or_default(),
        }
    }
}
