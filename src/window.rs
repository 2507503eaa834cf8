//! window.rs - narrows the log to the selected time range

use crate::domain::{Record, TimeWindow};

use chrono::{Duration, NaiveDateTime};

/// rows at or after `now - N minutes`, in log order. `All` keeps everything,
/// including rows whose timestamp could not be parsed.
pub fn select(records: &[Record], window: TimeWindow, now: NaiveDateTime) -> Vec<Record> {
    let Some(minutes) = window.minutes() else {
        return records.to_vec();
    };
    let cutoff = now - Duration::minutes(i64::from(minutes));

    records
        .iter()
        .filter(|r| r.timestamp.is_some_and(|ts| ts >= cutoff))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 1).unwrap().and_hms_opt(h, m, s).unwrap()
    }

    fn row(ts: Option<NaiveDateTime>, t: f64) -> Record {
        Record { timestamp: ts, temperature: t, humidity: 50.0 }
    }

    fn sample() -> Vec<Record> {
        vec![
            row(Some(at(11, 0, 0)), 1.0),
            row(None, 2.0),
            row(Some(at(11, 50, 0)), 3.0),
            row(Some(at(11, 55, 0)), 4.0),
            row(Some(at(11, 58, 30)), 5.0),
        ]
    }

    #[test]
    fn test_all_is_identity() {
        let rows = sample();
        assert_eq!(select(&rows, TimeWindow::All, at(12, 0, 0)), rows);
    }

    #[test]
    fn test_minutes_window() {
        let rows = sample();
        let now = at(12, 0, 0);

        let last5 = select(&rows, TimeWindow::Minutes(5), now);
        // 11:55:00 sits exactly on the cutoff and is kept
        assert_eq!(last5.iter().map(|r| r.temperature).collect::<Vec<_>>(), vec![4.0, 5.0]);

        let last10 = select(&rows, TimeWindow::Minutes(10), now);
        assert_eq!(last10.len(), 3);

        let last30 = select(&rows, TimeWindow::Minutes(30), now);
        assert!(last30.iter().all(|r| r.timestamp.is_some()));
        assert_eq!(last30.len(), 3);
    }

    #[test]
    fn test_window_matches_definition() {
        let rows = sample();
        let now = at(12, 0, 0);
        for n in [1u32, 5, 10, 30, 90] {
            let cutoff = now - Duration::minutes(n as i64);
            let expected: Vec<Record> = rows
                .iter()
                .filter(|r| matches!(r.timestamp, Some(ts) if ts >= cutoff))
                .cloned()
                .collect();
            assert_eq!(select(&rows, TimeWindow::Minutes(n), now), expected);
        }
    }

    #[test]
    fn test_empty_input() {
        assert!(select(&[], TimeWindow::Minutes(5), at(12, 0, 0)).is_empty());
    }
}
