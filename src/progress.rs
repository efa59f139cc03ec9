//! Advisory progress reporting.
//!
//! The transcoder writes `key=value` lines to stdout when run with
//! `-progress pipe:1`. Those lines are turned into a fractional ratio and
//! published as an integer percentage. Nothing here influences whether an
//! operation succeeds.

use tokio::sync::watch;

/// One parsed line of `-progress` output
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressLine {
    /// Encoded output position, in microseconds
    OutTime(u64),
    /// `progress=continue` / `progress=end`
    Status { finished: bool },
    Other,
}

impl ProgressLine {
    pub fn parse(line: &str) -> Self {
        let Some((key, value)) = line.trim().split_once('=') else {
            return ProgressLine::Other;
        };

        match key {
            // out_time_ms is also microseconds, despite the name
            "out_time_us" | "out_time_ms" => value
                .parse::<u64>()
                .map(ProgressLine::OutTime)
                .unwrap_or(ProgressLine::Other),
            "progress" => ProgressLine::Status { finished: value == "end" },
            _ => ProgressLine::Other,
        }
    }
}

/// Convert a fractional ratio into a percentage in `[0, 100]`.
pub fn ratio_to_percent(ratio: f64) -> u8 {
    if !ratio.is_finite() {
        return 0;
    }
    (ratio.clamp(0.0, 1.0) * 100.0).floor() as u8
}

/// Publishes a monotonically non-decreasing percentage for one operation.
#[derive(Debug)]
pub struct ProgressReporter {
    tx: watch::Sender<u8>,
}

impl ProgressReporter {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self { tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<u8> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> u8 {
        *self.tx.borrow()
    }

    /// Report a fractional ratio. Values lower than what was already
    /// reported are dropped.
    pub fn report_ratio(&self, ratio: f64) {
        self.report_percent(ratio_to_percent(ratio));
    }

    pub fn report_percent(&self, percent: u8) {
        let percent = percent.min(100);
        self.tx.send_if_modified(|current| {
            if percent > *current {
                *current = percent;
                true
            } else {
                false
            }
        });
    }

    pub fn finish(&self) {
        self.report_percent(100);
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}
