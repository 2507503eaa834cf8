//! ==============================================================================
//! orchestrator.rs - one refresh per timer tick
//! ==============================================================================
//!
//! purpose:
//!     turns a tick plus the current display filter into a render payload.
//!
//! states:
//!     - Paused (filter.live == off): nothing is read, written or recomputed.
//!       the last payload stays as it was.
//!     - Live: acquire at most one reading (appended by the source), read the
//!       whole log back, window it, summarize the window, build the payload.
//!
//! the orchestrator never sleeps. the caller owns the timer and must not
//! start a tick before the previous one returned.
//!
//! relationships:
//!     - used by: main.rs (timer loop)
//!     - uses: source.rs, store.rs, window.rs, stats.rs
//!
//! ==============================================================================

use crate::config::AlertConfig;
use crate::domain::{DisplayFilter, LiveMode, RenderPayload, SourceMode};
use crate::source::{wall_clock, ReadingSource};
use crate::stats::{self, DisplayLines};
use crate::store::DurableLog;
use crate::window;

use anyhow::Result;
use chrono::NaiveDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// paused: the previous payload is still current
    Unchanged,
    /// live: a new payload was built
    Refreshed,
}

pub struct Orchestrator {
    source: ReadingSource,
    log: DurableLog,
    alerts: AlertConfig,
    show_sensor_data: bool,
    payload: Option<RenderPayload>,
}

impl Orchestrator {
    pub fn new(source: ReadingSource, log: DurableLog, alerts: AlertConfig) -> Self {
        Self { source, log, alerts, show_sensor_data: false, payload: None }
    }

    /// log every persisted reading at info level
    pub fn with_sensor_output(mut self, on: bool) -> Self {
        self.show_sensor_data = on;
        self
    }

    pub fn mode(&self) -> SourceMode {
        self.source.mode()
    }

    /// last payload built, `None` until the first live tick
    pub fn payload(&self) -> Option<&RenderPayload> {
        self.payload.as_ref()
    }

    pub fn tick(&mut self, filter: &DisplayFilter) -> Result<TickOutcome> {
        self.tick_at(filter, wall_clock())
    }

    /// `now` is the reference point for the time window
    pub fn tick_at(&mut self, filter: &DisplayFilter, now: NaiveDateTime) -> Result<TickOutcome> {
        if filter.live == LiveMode::Off {
            return Ok(TickOutcome::Unchanged);
        }

        if let Some(r) = self.source.next_reading(&self.log)? {
            if self.show_sensor_data {
                tracing::info!(
                    source = %self.source.mode(),
                    "[{}] Temp: {}°C | Humidity: {}%",
                    r.timestamp,
                    r.temperature,
                    r.humidity
                );
            }
        }

        let all = self.log.read_all()?;
        let subset = window::select(&all, filter.window, now);
        let summary = stats::summarize(&subset);
        let lines = DisplayLines::build(summary.as_ref(), &self.alerts);

        tracing::debug!(
            rows = all.len(),
            in_window = subset.len(),
            window = %filter.window,
            "Refreshed payload"
        );

        self.payload = Some(RenderPayload {
            series: subset,
            current_temp: lines.current_temp,
            current_hum: lines.current_hum,
            avg_temp: lines.avg_temp,
            avg_hum: lines.avg_hum,
            max_temp: lines.max_temp,
            min_temp: lines.min_temp,
            alert_text: lines.alert,
            filter: *filter,
            source: self.source.mode(),
            generated_at: now,
        });
        Ok(TickOutcome::Refreshed)
    }
}
