use crate::clock::Clock;
use crate::config::{ BehaviorConfig, TrackingMode };
use crate::emotion::{ Emotion, EmotionStateMachine };
use crate::gate::{ GateDecision, MotionGate };
use crate::gesture::{ GestureOutcome, GestureSequencer };
use crate::mapper::{ ControlAngle, GeometryMapper };
use crate::perception::{ direction_label, Acquisition, PerceptionSample, PerceptionSource };
use crate::robot::{ Actuator, HeadPose, PoseCommand, SpeechOutput };
use crate::stats::{ SessionSummary, Stats };
use std::future::Future;
use std::sync::Arc;
use tracing::{ debug, info, trace, warn };

/// What one tick did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub present: bool,
    pub transition: Option<Emotion>,
    pub gesture: Option<(Emotion, GestureOutcome)>,
    pub target: Option<ControlAngle>,
    pub decision: Option<GateDecision>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Tick {
    Ran(TickReport),
    Missed,
    Closed,
}

/// Per-tick orchestrator: perception → mapper → gate → actuator, with the
/// emotion state machine running alongside on the presence signal.
pub struct ControlLoop<S, A, P, C> {
    config: BehaviorConfig,
    source: S,
    actuator: A,
    speech: P,
    clock: C,
    mapper: GeometryMapper,
    gate: MotionGate,
    emotions: EmotionStateMachine,
    sequencer: GestureSequencer,
    stats: Arc<Stats>,
    min_face_size: u32,
}

impl<S, A, P, C> ControlLoop<S, A, P, C>
    where S: PerceptionSource, A: Actuator, P: SpeechOutput, C: Clock
{
    pub fn new(
        config: BehaviorConfig,
        source: S,
        actuator: A,
        speech: P,
        clock: C,
        stats: Arc<Stats>
    ) -> Self {
        Self {
            mapper: GeometryMapper::new(&config),
            gate: MotionGate::from_config(&config),
            emotions: EmotionStateMachine::new(&config),
            sequencer: GestureSequencer::new(),
            config,
            source,
            actuator,
            speech,
            clock,
            stats,
            min_face_size: 0,
        }
    }

    /// Ignore detections smaller than `px` on either side.
    pub fn with_min_face_size(mut self, px: u32) -> Self {
        self.min_face_size = px;
        self
    }

    pub fn emotions(&self) -> &EmotionStateMachine {
        &self.emotions
    }

    #[cfg(test)]
    pub fn stats(&self) -> &Arc<Stats> {
        &self.stats
    }

    /// Run ticks until `stop` resolves or the source closes, then put the
    /// robot back in its neutral pose. The finalizer runs even when `stop`
    /// lands in the middle of a gesture.
    pub async fn run<F>(&mut self, stop: F) -> SessionSummary where F: Future<Output = ()> {
        let started = self.clock.now();
        info!(mode = ?self.config.mode, emotions = self.config.emotions_enabled, "🎬 control loop started");

        let stopped = tokio::select! {
            _ = stop => true,
            _ = self.tick_until_closed() => false,
        };

        if stopped {
            info!("👋 Stop requested");
        } else {
            info!("perception source closed");
        }

        debug!(emotion = %self.emotions.state(), timeline = ?self.emotions.timeline(), "loop finished");
        self.return_to_neutral().await;
        self.stats.summary(self.clock.now().saturating_duration_since(started))
    }

    async fn tick_until_closed(&mut self) {
        loop {
            match self.tick().await {
                Tick::Closed => {
                    break;
                }
                Tick::Missed => {}
                Tick::Ran(report) => {
                    trace!(
                        present = report.present,
                        transition = ?report.transition,
                        gesture = ?report.gesture.map(|(e, o)| (e, o.keyframes_played)),
                        target = ?report.target.map(|a| a.degrees()),
                        decision = ?report.decision,
                        "tick"
                    );
                }
            }
        }
    }

    /// One perception → decision → actuation pass.
    pub async fn tick(&mut self) -> Tick {
        let mut sample = match self.source.next_sample().await {
            Acquisition::Sample(s) => s,
            Acquisition::Missing => {
                self.stats.record_missed();
                debug!("no sample this tick");
                return Tick::Missed;
            }
            Acquisition::Closed => {
                return Tick::Closed;
            }
        };
        self.stats.record_sample();
        sample.retain_faces_at_least(self.min_face_size);

        let present = sample.presence();
        let mut report = TickReport { present, ..TickReport::default() };

        if self.config.emotions_enabled {
            report.transition = self.emotions.update(present, self.clock.now());
            if !self.emotions.in_progress() {
                let played = self.emotions.execute(
                    &self.sequencer,
                    &mut self.actuator,
                    &mut self.speech
                ).await;
                if let Some((emotion, outcome)) = played {
                    self.stats.record_gesture(outcome.aborted);
                    report.gesture = Some((emotion, outcome));
                }
            }
        }

        if self.emotions.in_progress() {
            return Tick::Ran(report);
        }

        let Some(angle) = self.mapper.map(&sample) else {
            return Tick::Ran(report);
        };
        report.target = Some(angle);

        if let PerceptionSample::SoundDirection { angle_degrees, is_active } = &sample {
            debug!(
                active = *is_active,
                doa = format!("{:.0}", angle_degrees),
                direction = direction_label(*angle_degrees),
                yaw = %angle,
                "🎤 DoA"
            );
        }

        let command = self.tracking_command(angle);
        let actuator = &mut self.actuator;
        let now = self.clock.now();
        match self.gate.try_issue(angle, present, now, |_| actuator.goto_pose(&command)) {
            Ok(decision) if decision.issued() => {
                self.stats.record_command();
                debug!(
                    yaw = %angle,
                    faces = sample.face_count(),
                    face_center = ?sample.largest_face().map(|f| (f.center_x(), f.center_y())),
                    "→ turning head"
                );
                report.decision = Some(decision);
                // Let the move play out before the next command can supersede it.
                tokio::time::sleep(command.duration).await;
            }
            Ok(decision) => {
                self.stats.record_rejected();
                debug!(
                    ?decision,
                    yaw = %angle,
                    holding = %self.gate.last_issued_angle(),
                    since_last_ms = self.gate
                        .last_command_at()
                        .map(|t| now.saturating_duration_since(t).as_millis() as u64),
                    "hold"
                );
                report.decision = Some(decision);
            }
            Err(e) => {
                self.stats.record_command_error();
                warn!(yaw = %angle, error = %e, "⚠️ tracking command failed");
            }
        }

        Tick::Ran(report)
    }

    fn tracking_command(&self, angle: ControlAngle) -> PoseCommand {
        match self.config.mode {
            TrackingMode::Face =>
                PoseCommand::head(
                    HeadPose::new(0.0, 0.0, angle.degrees()),
                    self.config.face_move_duration
                ),
            TrackingMode::Direction =>
                PoseCommand::head(
                    HeadPose::new(0.0, self.config.direction_pitch, angle.degrees()),
                    self.config.direction_move_duration
                ),
        }
    }

    async fn return_to_neutral(&mut self) {
        info!("Returning to neutral...");
        let cmd = PoseCommand::neutral(self.config.neutral_duration);
        if let Err(e) = self.actuator.goto_pose(&cmd) {
            warn!(error = %e, "⚠️ could not return to neutral");
            return;
        }
        tokio::time::sleep(cmd.duration).await;
    }
}
