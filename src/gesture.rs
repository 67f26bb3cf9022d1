use crate::robot::{ Actuator, HeadPose, PoseCommand };
use clap::ValueEnum;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tracing::{ debug, info, warn };

// ─────────────────────────────────────────────────────────────────────
//  Gestures: fixed keyframe choreography, one per emotion
// ─────────────────────────────────────────────────────────────────────
//
//  Each keyframe is sent as one `goto` with duration = hold, and the
//  sequencer then waits for the hold before moving on.  The gesture is
//  real-time choreography: the total play time is the sum of holds.
//
//  Antenna angles are radians, head angles degrees.

/// One pose in a gesture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keyframe {
    pub antennas: [f32; 2],
    pub head: Option<HeadPose>,
    pub hold: Duration,
}

impl Keyframe {
    const fn new(head: HeadPose, antennas: [f32; 2], hold_ms: u64) -> Self {
        Self {
            antennas,
            head: Some(head),
            hold: Duration::from_millis(hold_ms),
        }
    }

    pub fn command(&self) -> PoseCommand {
        PoseCommand {
            head: self.head,
            antennas: Some(self.antennas),
            duration: self.hold,
        }
    }
}

/// A named, static keyframe sequence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GestureSpec {
    pub name: &'static str,
    pub keyframes: &'static [Keyframe],
}

impl GestureSpec {
    pub fn total_duration(&self) -> Duration {
        self.keyframes.iter().map(|k| k.hold).sum()
    }
}

const NEUTRAL: HeadPose = HeadPose::NEUTRAL;
const TILT_RIGHT: HeadPose = HeadPose::new(20.0, 5.0, 0.0);
const TILT_LEFT: HeadPose = HeadPose::new(-20.0, 5.0, 0.0);
const LOOK_UP: HeadPose = HeadPose::new(0.0, 15.0, 0.0);
const LOOK_DOWN: HeadPose = HeadPose::new(0.0, -20.0, 0.0);
const NOD_UP: HeadPose = HeadPose::new(0.0, 10.0, 0.0);
const NOD_DOWN: HeadPose = HeadPose::new(0.0, -10.0, 0.0);

/// Head tilts right, left, right with lopsided antennas, then recentres.
pub static CURIOUS_WAVE: GestureSpec = GestureSpec {
    name: "curious-wave",
    keyframes: &[
        Keyframe::new(TILT_RIGHT, [0.6, -0.3], 600),
        Keyframe::new(TILT_LEFT, [-0.3, 0.6], 600),
        Keyframe::new(TILT_RIGHT, [0.6, -0.3], 600),
        Keyframe::new(NEUTRAL, [0.0, 0.0], 500),
    ],
};

/// A single lift: head up, antennas raised.
pub static HAPPY_BOUNCE: GestureSpec = GestureSpec {
    name: "happy-bounce",
    keyframes: &[Keyframe::new(LOOK_UP, [0.8, 0.8], 500)],
};

/// Slow look down with drooping antennas. The head stays down until the
/// next command moves it.
pub static SAD_DROOP: GestureSpec = GestureSpec {
    name: "sad-droop",
    keyframes: &[Keyframe::new(LOOK_DOWN, [-0.8, -0.8], 800)],
};

/// Three fast nods with crossed antennas.
pub static EXCITED_WIGGLE: GestureSpec = GestureSpec {
    name: "excited-wiggle",
    keyframes: &[
        Keyframe::new(NOD_UP, [1.0, -1.0], 200),
        Keyframe::new(NOD_DOWN, [-1.0, 1.0], 200),
        Keyframe::new(NOD_UP, [1.0, -1.0], 200),
        Keyframe::new(NOD_DOWN, [-1.0, 1.0], 200),
        Keyframe::new(NOD_UP, [1.0, -1.0], 200),
        Keyframe::new(NOD_DOWN, [-1.0, 1.0], 200),
        Keyframe::new(NEUTRAL, [0.0, 0.0], 300),
    ],
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum GestureKind {
    CuriousWave,
    HappyBounce,
    SadDroop,
    ExcitedWiggle,
}

impl GestureKind {
    pub fn spec(self) -> &'static GestureSpec {
        match self {
            GestureKind::CuriousWave => &CURIOUS_WAVE,
            GestureKind::HappyBounce => &HAPPY_BOUNCE,
            GestureKind::SadDroop => &SAD_DROOP,
            GestureKind::ExcitedWiggle => &EXCITED_WIGGLE,
        }
    }
}

impl fmt::Display for GestureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.spec().name)
    }
}

/// What happened during one `play`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GestureOutcome {
    pub keyframes_played: usize,
    pub aborted: bool,
}

/// Plays gesture specs on an actuator, blocking the caller for the
/// gesture's duration.
#[derive(Debug, Clone, Copy, Default)]
pub struct GestureSequencer;

impl GestureSequencer {
    pub fn new() -> Self {
        Self
    }

    /// Play every keyframe in order. An actuator error stops the gesture
    /// where it is; the error is logged, never returned.
    pub async fn play<A: Actuator>(&self, spec: &GestureSpec, actuator: &mut A) -> GestureOutcome {
        debug!(gesture = spec.name, total_ms = spec.total_duration().as_millis() as u64, "gesture start");

        for (i, frame) in spec.keyframes.iter().enumerate() {
            if let Err(e) = actuator.goto_pose(&frame.command()) {
                warn!(gesture = spec.name, keyframe = i, error = %e, "⚠️ gesture aborted");
                return GestureOutcome { keyframes_played: i, aborted: true };
            }
            tokio::time::sleep(frame.hold).await;
        }

        debug!(gesture = spec.name, "gesture done");
        GestureOutcome { keyframes_played: spec.keyframes.len(), aborted: false }
    }

    /// Play `spec` once while racing `stop`, then recentre. The neutral pose
    /// goes out however the gesture ended. Returns `None` when `stop` won.
    pub async fn perform<A, F>(
        &self,
        spec: &GestureSpec,
        actuator: &mut A,
        neutral_duration: Duration,
        stop: F
    ) -> anyhow::Result<Option<GestureOutcome>>
        where A: Actuator, F: Future<Output = ()>
    {
        let outcome = tokio::select! {
            outcome = self.play(spec, actuator) => Some(outcome),
            _ = stop => {
                info!(gesture = spec.name, "👋 Stop requested");
                None
            }
        };

        let neutral = PoseCommand::neutral(neutral_duration);
        actuator.goto_pose(&neutral)?;
        tokio::time::sleep(neutral.duration).await;
        Ok(outcome)
    }
}
