use crate::config::{ BehaviorConfig, TrackingMode };
use crate::mapper::ControlAngle;
use std::time::Duration;
use tokio::time::Instant;

// ─────────────────────────────────────────────────────────────────────
//  Motion gate: decides whether a mapped yaw becomes a command
// ─────────────────────────────────────────────────────────────────────
//
//  Face tracking     deadband around the frame centre + debounce between
//                    commands.  Sub-threshold jitter never moves the head
//                    and commands never arrive faster than they settle.
//
//  Direction         change detection against the last issued yaw, only
//                    while the speaker is active.  The subject is not
//                    expected to end up centred, so there is no deadband.

/// Acceptance rule in force.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GateMode {
    Deadband {
        threshold: f32,
        min_interval: Duration,
    },
    ChangeDetect {
        min_delta: f32,
    },
}

/// Why a command was or wasn't issued this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Issued,
    InsideDeadband,
    Debounced,
    Inactive,
    TooSmall,
}

impl GateDecision {
    pub fn issued(self) -> bool {
        self == GateDecision::Issued
    }
}

#[derive(Debug, Clone)]
pub struct MotionGate {
    mode: GateMode,
    last_command_at: Option<Instant>,
    last_issued_angle: ControlAngle,
}

impl MotionGate {
    pub fn new(mode: GateMode) -> Self {
        Self {
            mode,
            last_command_at: None,
            last_issued_angle: ControlAngle::ZERO,
        }
    }

    pub fn from_config(config: &BehaviorConfig) -> Self {
        let mode = match config.mode {
            TrackingMode::Face =>
                GateMode::Deadband {
                    threshold: config.tracking_threshold,
                    min_interval: config.min_command_interval,
                },
            TrackingMode::Direction => GateMode::ChangeDetect { min_delta: config.min_angle_delta },
        };
        Self::new(mode)
    }

    pub fn last_command_at(&self) -> Option<Instant> {
        self.last_command_at
    }

    pub fn last_issued_angle(&self) -> ControlAngle {
        self.last_issued_angle
    }

    /// Pure check: would `angle` be issued at `now`?
    pub fn evaluate(&self, angle: ControlAngle, active: bool, now: Instant) -> GateDecision {
        match self.mode {
            GateMode::Deadband { threshold, min_interval } => {
                if angle.degrees().abs() <= threshold {
                    return GateDecision::InsideDeadband;
                }
                match self.last_command_at {
                    Some(last) if now.saturating_duration_since(last) <= min_interval => {
                        GateDecision::Debounced
                    }
                    _ => GateDecision::Issued,
                }
            }
            GateMode::ChangeDetect { min_delta } => {
                if !active {
                    return GateDecision::Inactive;
                }
                if (angle.degrees() - self.last_issued_angle.degrees()).abs() <= min_delta {
                    return GateDecision::TooSmall;
                }
                GateDecision::Issued
            }
        }
    }

    /// Check and, when accepted, run `dispatch`. Gate state only moves when
    /// the dispatch succeeded; a failed dispatch is returned to the caller
    /// and the gate behaves as if nothing was sent.
    pub fn try_issue<F>(
        &mut self,
        angle: ControlAngle,
        active: bool,
        now: Instant,
        dispatch: F
    ) -> anyhow::Result<GateDecision>
        where F: FnOnce(ControlAngle) -> anyhow::Result<()>
    {
        let decision = self.evaluate(angle, active, now);
        if decision.issued() {
            dispatch(angle)?;
            self.last_command_at = Some(now);
            self.last_issued_angle = angle;
        }
        Ok(decision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{ Clock, ManualClock };
    use crate::mapper::GeometryMapper;

    fn face_gate() -> MotionGate {
        MotionGate::from_config(&BehaviorConfig::default())
    }

    fn direction_gate() -> MotionGate {
        MotionGate::from_config(
            &(BehaviorConfig { mode: TrackingMode::Direction, ..BehaviorConfig::default() })
        )
    }

    fn yaw(deg: f32) -> ControlAngle {
        GeometryMapper::new(&BehaviorConfig::default()).direction_yaw(deg * 3.0).unwrap()
    }

    #[test]
    fn test_small_face_offset_rejected() {
        // 100px face at x=600 in a 1280 frame → ~0.47°
        let m = GeometryMapper::new(&BehaviorConfig::default());
        let angle = m.face_yaw(650.0, 1280).unwrap();
        let clock = ManualClock::new();
        assert_eq!(face_gate().evaluate(angle, true, clock.now()), GateDecision::InsideDeadband);
    }

    #[test]
    fn test_first_command_passes_then_debounces() {
        let clock = ManualClock::new();
        let mut gate = face_gate();
        let mut sent = Vec::new();

        let d = gate.try_issue(yaw(12.0), true, clock.now(), |a| {
            sent.push(a);
            Ok(())
        });
        assert_eq!(d.unwrap(), GateDecision::Issued);

        clock.advance_secs(0.2);
        let d = gate.try_issue(yaw(-12.0), true, clock.now(), |a| {
            sent.push(a);
            Ok(())
        });
        assert_eq!(d.unwrap(), GateDecision::Debounced);

        // Exactly at the interval is still too soon.
        clock.advance_secs(0.3);
        assert_eq!(gate.evaluate(yaw(-12.0), true, clock.now()), GateDecision::Debounced);

        clock.advance_secs(0.01);
        assert_eq!(gate.evaluate(yaw(-12.0), true, clock.now()), GateDecision::Issued);
        assert_eq!(sent.len(), 1);
    }

    #[test]
    fn test_commands_never_closer_than_interval() {
        let clock = ManualClock::new();
        let mut gate = face_gate();
        let mut issued_at = Vec::new();

        // 33ms frames, target swinging past the deadband every frame
        for i in 0..300 {
            let a = if i % 2 == 0 { 20.0 } else { -20.0 };
            let now = clock.now();
            gate.try_issue(yaw(a), true, now, |_| Ok(())).unwrap();
            if gate.last_command_at() == Some(now) {
                issued_at.push(now);
            }
            clock.advance_secs(0.033);
        }

        assert!(issued_at.len() > 1);
        for pair in issued_at.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_millis(500));
        }
    }

    #[test]
    fn test_failed_dispatch_leaves_state() {
        let clock = ManualClock::new();
        let mut gate = face_gate();
        let r = gate.try_issue(yaw(15.0), true, clock.now(), |_| anyhow::bail!("link down"));
        assert!(r.is_err());
        assert_eq!(gate.last_command_at(), None);
        assert_eq!(gate.last_issued_angle(), ControlAngle::ZERO);

        // Next tick can still issue immediately.
        let r = gate.try_issue(yaw(15.0), true, clock.now(), |_| Ok(()));
        assert_eq!(r.unwrap(), GateDecision::Issued);
    }

    #[test]
    fn test_direction_requires_activity() {
        let clock = ManualClock::new();
        assert_eq!(direction_gate().evaluate(yaw(20.0), false, clock.now()), GateDecision::Inactive);
    }

    #[test]
    fn test_direction_change_detection() {
        let clock = ManualClock::new();
        let mut gate = direction_gate();

        // From rest (0°), 4° is not enough, 6° is.
        assert_eq!(gate.evaluate(yaw(4.0), true, clock.now()), GateDecision::TooSmall);
        assert_eq!(gate.try_issue(yaw(6.0), true, clock.now(), |_| Ok(())).unwrap(), GateDecision::Issued);

        // Relative to 6° now; no time debounce in this mode.
        assert_eq!(gate.evaluate(yaw(10.0), true, clock.now()), GateDecision::TooSmall);
        assert_eq!(gate.evaluate(yaw(11.5), true, clock.now()), GateDecision::Issued);
        assert_eq!(gate.evaluate(yaw(0.5), true, clock.now()), GateDecision::Issued);
    }

    #[test]
    fn test_off_centre_subject_does_not_retrigger() {
        let clock = ManualClock::new();
        let mut gate = direction_gate();
        gate.try_issue(yaw(-25.0), true, clock.now(), |_| Ok(())).unwrap();
        for _ in 0..10 {
            clock.advance_secs(0.1);
            let d = gate.try_issue(yaw(-24.0), true, clock.now(), |_| panic!("should not dispatch"));
            assert_eq!(d.unwrap(), GateDecision::TooSmall);
        }
    }
}
