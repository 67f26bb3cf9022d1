use std::sync::atomic::{ AtomicU64, Ordering };
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::info;

/// Lock-free controller counters
#[derive(Debug)]
pub struct Stats {
    pub samples: AtomicU64,
    pub samples_missed: AtomicU64,
    pub commands_issued: AtomicU64,
    pub commands_rejected: AtomicU64,
    pub command_errors: AtomicU64,
    pub gestures_played: AtomicU64,
    pub gestures_aborted: AtomicU64,
}

impl Stats {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            samples: AtomicU64::new(0),
            samples_missed: AtomicU64::new(0),
            commands_issued: AtomicU64::new(0),
            commands_rejected: AtomicU64::new(0),
            command_errors: AtomicU64::new(0),
            gestures_played: AtomicU64::new(0),
            gestures_aborted: AtomicU64::new(0),
        })
    }

    #[inline(always)]
    pub fn record_sample(&self) {
        self.samples.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn record_missed(&self) {
        self.samples_missed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn record_command(&self) {
        self.commands_issued.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn record_rejected(&self) {
        self.commands_rejected.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn record_command_error(&self) {
        self.command_errors.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn record_gesture(&self, aborted: bool) {
        self.gestures_played.fetch_add(1, Ordering::Relaxed);
        if aborted {
            self.gestures_aborted.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Snapshot of the cumulative counters (never reset).
    pub fn totals(&self) -> StatsTotals {
        StatsTotals {
            samples: self.samples.load(Ordering::Relaxed),
            samples_missed: self.samples_missed.load(Ordering::Relaxed),
            commands_issued: self.commands_issued.load(Ordering::Relaxed),
            commands_rejected: self.commands_rejected.load(Ordering::Relaxed),
            command_errors: self.command_errors.load(Ordering::Relaxed),
            gestures_played: self.gestures_played.load(Ordering::Relaxed),
            gestures_aborted: self.gestures_aborted.load(Ordering::Relaxed),
        }
    }

    /// End-of-session summary.
    pub fn summary(&self, duration: Duration) -> SessionSummary {
        let totals = self.totals();
        let secs = duration.as_secs_f64();
        SessionSummary {
            sample_rate: if secs > 0.0 { (totals.samples as f64) / secs } else { 0.0 },
            duration,
            totals,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsTotals {
    pub samples: u64,
    pub samples_missed: u64,
    pub commands_issued: u64,
    pub commands_rejected: u64,
    pub command_errors: u64,
    pub gestures_played: u64,
    pub gestures_aborted: u64,
}

#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub totals: StatsTotals,
    pub sample_rate: f64,
    pub duration: Duration,
}

impl SessionSummary {
    pub fn log(&self) {
        info!(
            samples = self.totals.samples,
            missed = self.totals.samples_missed,
            avg_rate = format!("{:.1}", self.sample_rate),
            duration_s = format!("{:.1}", self.duration.as_secs_f64()),
            commands = self.totals.commands_issued,
            gestures = self.totals.gestures_played,
            "📊 session summary"
        );
    }
}

/// Background stats reporter task
pub async fn stats_reporter(stats: Arc<Stats>, interval_secs: u64) {
    if interval_secs == 0 {
        // Stats disabled, park forever
        std::future::pending::<()>().await;
        return;
    }

    let interval = Duration::from_secs(interval_secs);
    let mut last = Instant::now();
    let mut prev = stats.totals();

    loop {
        tokio::time::sleep(interval).await;
        let now = Instant::now();
        let secs = (now - last).as_secs_f64().max(0.001);
        last = now;

        let cur = stats.totals();
        info!(
            sample_rate = format!("{:.1}", ((cur.samples - prev.samples) as f64) / secs),
            missed = cur.samples_missed - prev.samples_missed,
            issued = cur.commands_issued - prev.commands_issued,
            rejected = cur.commands_rejected - prev.commands_rejected,
            errors = cur.command_errors - prev.command_errors,
            gestures = cur.gestures_played - prev.gestures_played,
            "[STATS]"
        );
        prev = cur;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let stats = Stats::new();
        stats.record_sample();
        stats.record_sample();
        stats.record_missed();
        stats.record_command();
        stats.record_rejected();
        stats.record_gesture(false);
        stats.record_gesture(true);

        let t = stats.totals();
        assert_eq!(t.samples, 2);
        assert_eq!(t.samples_missed, 1);
        assert_eq!(t.commands_issued, 1);
        assert_eq!(t.commands_rejected, 1);
        assert_eq!(t.gestures_played, 2);
        assert_eq!(t.gestures_aborted, 1);
    }

    #[test]
    fn test_summary_rate() {
        let stats = Stats::new();
        for _ in 0..30 {
            stats.record_sample();
        }
        let s = stats.summary(Duration::from_secs(2));
        assert!((s.sample_rate - 15.0).abs() < 1e-9);
        assert_eq!(stats.summary(Duration::ZERO).sample_rate, 0.0);
    }
}
