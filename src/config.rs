use clap::{ Parser, ValueEnum };
use std::time::Duration;

use crate::gesture::GestureKind;

/// Which perceptual signal drives head tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TrackingMode {
    /// Follow the largest detected face (camera)
    Face,
    /// Turn toward the speaker (microphone array direction of arrival)
    Direction,
}

/// What the robot says when an emotion is expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SpeechMode {
    /// Pre-rendered spoken phrases (`<emotion>_greeting.wav`)
    Phrases,
    /// Built-in SDK sound effects
    Effects,
    /// Silent
    Off,
}

/// Reactive face / sound tracking with emotion gestures for a desktop robot.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about)]
pub struct Config {
    /// Tracking input
    #[arg(long, value_enum, default_value_t = TrackingMode::Face)]
    pub mode: TrackingMode,

    /// Listen address for perception datagrams from the detector
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    /// UDP port for perception datagrams (JSON samples)
    #[arg(long, default_value_t = 5600)]
    pub perception_port: u16,

    /// UDP receive buffer size (SO_RCVBUF)
    #[arg(long, default_value_t = 256 * 1024)]
    pub recv_buf_size: usize,

    /// Replay JSON-lines samples from a file instead of listening on UDP
    #[arg(long)]
    pub replay: Option<String>,

    /// Interval between replayed samples, in milliseconds
    #[arg(long, default_value_t = 100)]
    pub replay_interval_ms: u64,

    /// Robot bridge address for pose / sound commands (dry run when unset)
    #[arg(long, env = "REACHY_ROBOT_ADDR")]
    pub robot_addr: Option<String>,

    /// How long to wait for a sample before counting the tick as missed
    #[arg(long, default_value_t = 100)]
    pub sample_timeout_ms: u64,

    /// Stats logging interval in seconds (0 = disabled)
    #[arg(long, default_value_t = 10)]
    pub stats_interval_secs: u64,

    // ── Detector ───────────────────────────────────────────────────────

    /// Haar cascade scale factor announced to the detector
    #[arg(long, default_value_t = 1.1)]
    pub scale_factor: f32,

    /// Haar cascade min-neighbours announced to the detector
    #[arg(long, default_value_t = 5)]
    pub min_neighbors: u32,

    /// Faces smaller than this (pixels, both sides) are ignored
    #[arg(long, default_value_t = 50)]
    pub min_face_size: u32,

    // ── Tracking ───────────────────────────────────────────────────────

    /// Head yaw limit in degrees (commands are clamped to ±limit)
    #[arg(long, default_value_t = 30.0, value_parser = degrees)]
    pub yaw_limit: f32,

    /// Face tracking deadband in degrees
    #[arg(long, default_value_t = 5.0, value_parser = degrees)]
    pub tracking_threshold: f32,

    /// Minimum seconds between face tracking commands (also their duration)
    #[arg(long, default_value_t = 0.5)]
    pub tracking_interval_secs: f64,

    /// Minimum yaw change in degrees before turning toward a new speaker
    #[arg(long, default_value_t = 5.0, value_parser = degrees)]
    pub min_angle_delta: f32,

    /// Duration of a turn-to-speaker command in seconds
    #[arg(long, default_value_t = 0.3)]
    pub direction_move_secs: f64,

    // ── Emotions ───────────────────────────────────────────────────────

    /// Disable the emotion state machine (tracking only)
    #[arg(long, default_value_t = false)]
    pub no_emotions: bool,

    /// Minimum seconds between two emotions
    #[arg(long, default_value_t = 5.0)]
    pub emotion_cooldown_secs: f64,

    /// Seconds of continuous presence before HAPPY
    #[arg(long, default_value_t = 3.0)]
    pub happy_trigger_secs: f64,

    /// Seconds of absence before SAD
    #[arg(long, default_value_t = 2.0)]
    pub goodbye_delay_secs: f64,

    /// Speech played alongside each emotion
    #[arg(long, value_enum, default_value_t = SpeechMode::Phrases)]
    pub speech: SpeechMode,

    /// Play a single gesture and exit
    #[arg(long, value_enum)]
    pub perform: Option<GestureKind>,
}

impl Config {
    pub fn perception_addr(&self) -> String {
        format!("{}:{}", self.host, self.perception_port)
    }

    pub fn sample_timeout(&self) -> Duration {
        Duration::from_millis(self.sample_timeout_ms)
    }

    pub fn detector_settings(&self) -> DetectorSettings {
        DetectorSettings {
            scale_factor: self.scale_factor,
            min_neighbors: self.min_neighbors,
            min_face_size: self.min_face_size,
        }
    }

    /// Freeze the behaviour knobs into the immutable form handed to components.
    pub fn behavior(&self) -> BehaviorConfig {
        BehaviorConfig {
            mode: self.mode,
            emotions_enabled: !self.no_emotions,
            speech: self.speech,
            yaw_limit: self.yaw_limit,
            doa_attenuation: DOA_ATTENUATION,
            tracking_threshold: self.tracking_threshold,
            min_command_interval: secs(self.tracking_interval_secs),
            face_move_duration: secs(self.tracking_interval_secs),
            min_angle_delta: self.min_angle_delta,
            direction_move_duration: secs(self.direction_move_secs),
            direction_pitch: DIRECTION_PITCH_DEG,
            emotion_cooldown: secs(self.emotion_cooldown_secs),
            happy_trigger_time: secs(self.happy_trigger_secs),
            goodbye_delay: secs(self.goodbye_delay_secs),
            neutral_duration: NEUTRAL_POSE_DURATION,
        }
    }
}

/// Angles on the command line must be finite and non-negative.
fn degrees(s: &str) -> Result<f32, String> {
    let v: f32 = s.parse().map_err(|e| format!("{e}"))?;
    if v.is_finite() && v >= 0.0 {
        Ok(v)
    } else {
        Err(format!("`{s}` is not a finite, non-negative angle in degrees"))
    }
}

/// Negative or NaN values from the command line collapse to zero.
fn secs(v: f64) -> Duration {
    Duration::try_from_secs_f64(v).unwrap_or(Duration::ZERO)
}

/// DoA ±90° maps onto the full ±30° yaw arc.
pub const DOA_ATTENUATION: f32 = 3.0;

/// Head tilts slightly up when facing a speaker, for eye contact.
pub const DIRECTION_PITCH_DEG: f32 = 5.0;

pub const NEUTRAL_POSE_DURATION: Duration = Duration::from_millis(500);

/// Parameters forwarded to the external face detector.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct DetectorSettings {
    pub scale_factor: f32,
    pub min_neighbors: u32,
    pub min_face_size: u32,
}

/// Immutable behaviour configuration shared by every component.
#[derive(Debug, Clone)]
pub struct BehaviorConfig {
    pub mode: TrackingMode,
    pub emotions_enabled: bool,
    pub speech: SpeechMode,

    pub yaw_limit: f32,
    pub doa_attenuation: f32,

    pub tracking_threshold: f32,
    pub min_command_interval: Duration,
    pub face_move_duration: Duration,

    pub min_angle_delta: f32,
    pub direction_move_duration: Duration,
    pub direction_pitch: f32,

    pub emotion_cooldown: Duration,
    pub happy_trigger_time: Duration,
    pub goodbye_delay: Duration,

    pub neutral_duration: Duration,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            mode: TrackingMode::Face,
            emotions_enabled: true,
            speech: SpeechMode::Phrases,
            yaw_limit: 30.0,
            doa_attenuation: DOA_ATTENUATION,
            tracking_threshold: 5.0,
            min_command_interval: Duration::from_millis(500),
            face_move_duration: Duration::from_millis(500),
            min_angle_delta: 5.0,
            direction_move_duration: Duration::from_millis(300),
            direction_pitch: DIRECTION_PITCH_DEG,
            emotion_cooldown: Duration::from_secs(5),
            happy_trigger_time: Duration::from_secs(3),
            goodbye_delay: Duration::from_secs(2),
            neutral_duration: NEUTRAL_POSE_DURATION,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults_match_behavior_defaults() {
        let config = Config::parse_from(["reachy-behavior"]);
        let from_cli = config.behavior();
        let default = BehaviorConfig::default();

        assert_eq!(from_cli.mode, default.mode);
        assert_eq!(from_cli.yaw_limit, default.yaw_limit);
        assert_eq!(from_cli.tracking_threshold, default.tracking_threshold);
        assert_eq!(from_cli.min_command_interval, default.min_command_interval);
        assert_eq!(from_cli.direction_move_duration, default.direction_move_duration);
        assert_eq!(from_cli.emotion_cooldown, default.emotion_cooldown);
        assert_eq!(from_cli.happy_trigger_time, default.happy_trigger_time);
        assert_eq!(from_cli.goodbye_delay, default.goodbye_delay);
        assert!(from_cli.emotions_enabled);
    }

    #[test]
    fn test_overrides() {
        let config = Config::parse_from([
            "reachy-behavior",
            "--mode",
            "direction",
            "--no-emotions",
            "--emotion-cooldown-secs",
            "1.5",
            "--speech",
            "off",
            "--perform",
            "excited-wiggle",
        ]);
        let b = config.behavior();
        assert_eq!(b.mode, TrackingMode::Direction);
        assert!(!b.emotions_enabled);
        assert_eq!(b.speech, SpeechMode::Off);
        assert_eq!(b.emotion_cooldown, Duration::from_millis(1500));
        assert_eq!(config.perform, Some(GestureKind::ExcitedWiggle));
    }

    #[test]
    fn test_negative_seconds_clamp_to_zero() {
        assert_eq!(secs(-1.0), Duration::ZERO);
        assert_eq!(secs(f64::NAN), Duration::ZERO);
        assert_eq!(secs(0.25), Duration::from_millis(250));
    }

    #[test]
    fn test_bad_angles_rejected() {
        for (flag, value) in [
            ("--yaw-limit", "NaN"),
            ("--yaw-limit", "inf"),
            ("--yaw-limit=-5", ""),
            ("--tracking-threshold", "NaN"),
            ("--min-angle-delta", "-inf"),
        ] {
            let mut args = vec!["reachy-behavior", flag];
            if !value.is_empty() {
                args.push(value);
            }
            assert!(Config::try_parse_from(&args).is_err(), "{args:?}");
        }

        let config = Config::try_parse_from(["reachy-behavior", "--yaw-limit", "20"]).unwrap();
        assert_eq!(config.behavior().yaw_limit, 20.0);
    }

    #[test]
    fn test_perception_addr() {
        let config = Config::parse_from(["reachy-behavior", "--perception-port", "7000"]);
        assert_eq!(config.perception_addr(), "0.0.0.0:7000");
    }
}
