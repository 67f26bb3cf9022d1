use crate::config::BehaviorConfig;
use crate::perception::PerceptionSample;
use std::fmt;

/// Head yaw command in degrees. Always within the mapper's yaw limit.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct ControlAngle(f32);

impl ControlAngle {
    pub const ZERO: ControlAngle = ControlAngle(0.0);

    #[inline]
    pub fn degrees(self) -> f32 {
        self.0
    }
}

impl fmt::Display for ControlAngle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:+.1}°", self.0)
    }
}

/// Converts raw perceptual geometry into a bounded yaw command.
#[derive(Debug, Clone, Copy)]
pub struct GeometryMapper {
    yaw_limit: f32,
    doa_attenuation: f32,
}

impl GeometryMapper {
    pub fn new(config: &BehaviorConfig) -> Self {
        Self {
            // A non-finite limit pins the head at centre instead of poisoning clamp().
            yaw_limit: if config.yaw_limit.is_finite() { config.yaw_limit.abs() } else { 0.0 },
            doa_attenuation: config.doa_attenuation,
        }
    }

    /// Map a sample to a yaw command. `None` means there is nothing to track.
    pub fn map(&self, sample: &PerceptionSample) -> Option<ControlAngle> {
        match sample {
            PerceptionSample::Faces { frame_width, .. } => {
                let face = sample.largest_face()?;
                self.face_yaw(face.center_x(), *frame_width)
            }
            PerceptionSample::SoundDirection { angle_degrees, .. } =>
                self.direction_yaw(*angle_degrees),
        }
    }

    /// Horizontal face offset from the frame centre, scaled so that the frame
    /// edge maps to the yaw limit.
    pub fn face_yaw(&self, center_x: f32, frame_width: u32) -> Option<ControlAngle> {
        if frame_width == 0 || !center_x.is_finite() {
            return None;
        }
        let half = (frame_width as f32) / 2.0;
        let offset = center_x - half;
        Some(self.clamp((offset / half) * self.yaw_limit))
    }

    /// DoA angle in [0, 360) (0 = front, 90 = right) to a yaw command.
    pub fn direction_yaw(&self, angle_degrees: f32) -> Option<ControlAngle> {
        if !angle_degrees.is_finite() {
            return None;
        }
        let a = angle_degrees.rem_euclid(360.0);
        let normalized = if a > 180.0 { a - 360.0 } else { a };
        Some(self.clamp(normalized / self.doa_attenuation))
    }

    #[inline]
    fn clamp(&self, yaw: f32) -> ControlAngle {
        ControlAngle(yaw.clamp(-self.yaw_limit, self.yaw_limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::perception::FaceRect;

    fn mapper() -> GeometryMapper {
        GeometryMapper::new(&BehaviorConfig::default())
    }

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn test_face_centre_is_zero() {
        assert_eq!(mapper().face_yaw(640.0, 1280), Some(ControlAngle::ZERO));
    }

    #[test]
    fn test_face_edges_hit_limit() {
        let m = mapper();
        assert!(close(m.face_yaw(1280.0, 1280).unwrap().degrees(), 30.0));
        assert!(close(m.face_yaw(0.0, 1280).unwrap().degrees(), -30.0));
    }

    #[test]
    fn test_face_mapping_is_linear() {
        let m = mapper();
        for offset in [-640.0f32, -320.0, -10.0, 0.0, 1.0, 160.0, 639.0] {
            let yaw = m.face_yaw(640.0 + offset, 1280).unwrap().degrees();
            assert!(close(yaw, (offset / 640.0) * 30.0), "offset={offset} yaw={yaw}");
        }
    }

    #[test]
    fn test_face_mapping_small_offset() {
        let sample = PerceptionSample::Faces {
            frame_width: 1280,
            frame_height: 720,
            faces: vec![FaceRect::new(600, 200, 100, 100)],
        };
        let yaw = mapper().map(&sample).unwrap().degrees();
        assert!(close(yaw, 0.46875), "yaw={yaw}");
    }

    #[test]
    fn test_no_face_no_target() {
        let sample = PerceptionSample::Faces { frame_width: 1280, frame_height: 720, faces: vec![] };
        assert_eq!(mapper().map(&sample), None);
        assert_eq!(mapper().face_yaw(10.0, 0), None);
    }

    #[test]
    fn test_direction_normalisation() {
        let m = mapper();
        assert!(close(m.direction_yaw(0.0).unwrap().degrees(), 0.0));
        assert!(close(m.direction_yaw(45.0).unwrap().degrees(), 15.0));
        assert!(close(m.direction_yaw(90.0).unwrap().degrees(), 30.0));
        assert!(close(m.direction_yaw(180.0).unwrap().degrees(), 30.0));
        assert!(close(m.direction_yaw(270.0).unwrap().degrees(), -30.0));
        assert!(close(m.direction_yaw(330.0).unwrap().degrees(), -10.0));
    }

    #[test]
    fn test_direction_always_bounded_and_continuous_off_the_wrap() {
        let m = mapper();
        let mut prev: Option<(f32, f32)> = None;
        let mut a = 0.0f32;
        while a < 360.0 {
            let yaw = m.direction_yaw(a).unwrap().degrees();
            assert!((-30.0..=30.0).contains(&yaw), "a={a} yaw={yaw}");
            if let Some((pa, py)) = prev {
                let crosses_wrap = pa <= 180.0 && a > 180.0;
                if !crosses_wrap {
                    assert!((yaw - py).abs() <= 0.5 / 3.0 + 1e-4, "jump at a={a}");
                }
            }
            prev = Some((a, yaw));
            a += 0.5;
        }
    }

    #[test]
    fn test_undefined_direction_no_target() {
        assert_eq!(mapper().direction_yaw(f32::NAN), None);
        let sample = PerceptionSample::SoundDirection { angle_degrees: f32::INFINITY, is_active: true };
        assert_eq!(mapper().map(&sample), None);
    }

    #[test]
    fn test_custom_limit() {
        let config = BehaviorConfig { yaw_limit: 20.0, ..BehaviorConfig::default() };
        let m = GeometryMapper::new(&config);
        assert!(close(m.face_yaw(1280.0, 1280).unwrap().degrees(), 20.0));
        assert!(close(m.direction_yaw(90.0).unwrap().degrees(), 20.0));
    }

    #[test]
    fn test_non_finite_limit_does_not_panic() {
        let config = BehaviorConfig { yaw_limit: f32::NAN, ..BehaviorConfig::default() };
        let m = GeometryMapper::new(&config);
        assert_eq!(m.face_yaw(1100.0, 1280), Some(ControlAngle::ZERO));
        assert_eq!(m.direction_yaw(270.0), Some(ControlAngle::ZERO));

        let config = BehaviorConfig { yaw_limit: -20.0, ..BehaviorConfig::default() };
        let m = GeometryMapper::new(&config);
        assert_eq!(m.face_yaw(1280.0, 1280), Some(ControlAngle(20.0)));
    }

    #[test]
    fn test_display() {
        assert_eq!(mapper().direction_yaw(45.0).unwrap().to_string(), "+15.0°");
    }
}
