use tokio::time::Instant;

/// Time source used by the gate and the emotion state machine.
///
/// Built on `tokio::time::Instant` so that a paused tokio runtime also
/// pauses the controller's notion of "now".
pub trait Clock {
    fn now(&self) -> Instant;
}

/// Wall clock backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

impl Clock for TokioClock {
    #[inline]
    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[cfg(test)]
pub use manual::ManualClock;
