use serde::{ Deserialize, Serialize };
use std::time::Duration;
use tracing::info;

/// Head orientation in degrees. Positive pitch looks up, positive yaw turns right.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct HeadPose {
    pub roll: f32,
    pub pitch: f32,
    pub yaw: f32,
}

impl HeadPose {
    pub const NEUTRAL: HeadPose = HeadPose { roll: 0.0, pitch: 0.0, yaw: 0.0 };

    pub const fn new(roll: f32, pitch: f32, yaw: f32) -> Self {
        Self { roll, pitch, yaw }
    }
}

/// "Move to this pose over `duration`". Absent parts are left where they are.
#[derive(Debug, Clone, PartialEq)]
pub struct PoseCommand {
    pub head: Option<HeadPose>,
    /// Left / right antenna angles in radians.
    pub antennas: Option<[f32; 2]>,
    pub duration: Duration,
}

impl PoseCommand {
    pub fn head(head: HeadPose, duration: Duration) -> Self {
        Self { head: Some(head), antennas: None, duration }
    }

    /// Head centred, antennas down, used when a session ends.
    pub fn neutral(duration: Duration) -> Self {
        Self {
            head: Some(HeadPose::NEUTRAL),
            antennas: Some([0.0, 0.0]),
            duration,
        }
    }
}

/// Sink for pose commands.
///
/// Calls are fire-and-forget: the robot interpolates over `duration` on its
/// own and a newer command supersedes an older one.
pub trait Actuator {
    fn goto_pose(&mut self, cmd: &PoseCommand) -> anyhow::Result<()>;
}

/// Sink for sounds and spoken phrases. Fire-and-forget.
pub trait SpeechOutput {
    fn play_sound(&mut self, name: &str) -> anyhow::Result<()>;
}

/// Logs every command instead of sending it anywhere.
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunRobot;

impl Actuator for DryRunRobot {
    fn goto_pose(&mut self, cmd: &PoseCommand) -> anyhow::Result<()> {
        info!(
            head = ?cmd.head,
            antennas = ?cmd.antennas,
            duration_ms = cmd.duration.as_millis() as u64,
            "🤖 [dry-run] goto"
        );
        Ok(())
    }
}

impl SpeechOutput for DryRunRobot {
    fn play_sound(&mut self, name: &str) -> anyhow::Result<()> {
        info!(sound = name, "🔊 [dry-run] play");
        Ok(())
    }
}

#[cfg(test)]
pub use recording::{ Recorded, RecordingRobot };

#[cfg(test)]
mod recording {
    use super::*;
    use std::sync::{ Arc, Mutex };

    #[derive(Debug, Clone, PartialEq)]
    pub enum Recorded {
        Pose(PoseCommand),
        Sound(String),
    }

    /// Shared-log fake robot. Clones append to the same log, so one clone can
    /// act as the actuator and another as the speech output.
    #[derive(Debug, Clone, Default)]
    pub struct RecordingRobot {
        log: Arc<Mutex<Vec<Recorded>>>,
        /// Fail pose commands once this many have been accepted.
        fail_pose_after: Option<usize>,
        fail_sound: bool,
    }

    impl RecordingRobot {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn failing_pose_after(n: usize) -> Self {
            Self { fail_pose_after: Some(n), ..Self::default() }
        }

        pub fn failing_sound() -> Self {
            Self { fail_sound: true, ..Self::default() }
        }

        pub fn log(&self) -> Vec<Recorded> {
            self.log.lock().unwrap().clone()
        }

        pub fn poses(&self) -> Vec<PoseCommand> {
            self.log()
                .into_iter()
                .filter_map(|r| match r {
                    Recorded::Pose(p) => Some(p),
                    Recorded::Sound(_) => None,
                })
                .collect()
        }

        pub fn sounds(&self) -> Vec<String> {
            self.log()
                .into_iter()
                .filter_map(|r| match r {
                    Recorded::Sound(s) => Some(s),
                    Recorded::Pose(_) => None,
                })
                .collect()
        }

        pub fn clear(&self) {
            self.log.lock().unwrap().clear();
        }
    }

    impl Actuator for RecordingRobot {
        fn goto_pose(&mut self, cmd: &PoseCommand) -> anyhow::Result<()> {
            let mut log = self.log.lock().unwrap();
            if let Some(n) = self.fail_pose_after {
                let accepted = log
                    .iter()
                    .filter(|r| matches!(r, Recorded::Pose(_)))
                    .count();
                if accepted >= n {
                    anyhow::bail!("actuator offline");
                }
            }
            log.push(Recorded::Pose(cmd.clone()));
            Ok(())
        }
    }

    impl SpeechOutput for RecordingRobot {
        fn play_sound(&mut self, name: &str) -> anyhow::Result<()> {
            if self.fail_sound {
                anyhow::bail!("no audio device");
            }
            self.log.lock().unwrap().push(Recorded::Sound(name.to_string()));
            Ok(())
        }
    }
}
