use crate::perception::{ Acquisition, PerceptionSample, PerceptionSource };
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{ AsyncBufReadExt, BufReader, Lines };
use tracing::{ info, warn };

/// Plays back a recorded session: one JSON [`PerceptionSample`] per line,
/// one line per `interval`. Closes at end of file.
pub struct ReplaySource {
    lines: Lines<BufReader<File>>,
    interval: Duration,
    line_no: usize,
}

impl ReplaySource {
    pub async fn open(path: &str, interval: Duration) -> anyhow::Result<Self> {
        let file = File::open(path).await?;
        info!(path = path, interval_ms = interval.as_millis() as u64, "📼 replaying samples");
        Ok(Self {
            lines: BufReader::new(file).lines(),
            interval,
            line_no: 0,
        })
    }
}

impl PerceptionSource for ReplaySource {
    async fn next_sample(&mut self) -> Acquisition {
        tokio::time::sleep(self.interval).await;
        loop {
            let line = match self.lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => {
                    return Acquisition::Closed;
                }
                Err(e) => {
                    warn!(line = self.line_no + 1, error = %e, "replay read failed");
                    return Acquisition::Closed;
                }
            };
            self.line_no += 1;

            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            return match PerceptionSample::from_json(line.as_bytes()) {
                Some(sample) => Acquisition::Sample(sample),
                None => {
                    warn!(line = self.line_no, "skipping malformed replay line");
                    Acquisition::Missing
                }
            };
        }
    }
}
