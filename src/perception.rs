use serde::{ Deserialize, Serialize };

/// Axis-aligned face bounding box in frame pixels, as returned by the detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl FaceRect {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    #[inline]
    pub fn center_x(&self) -> f32 {
        (self.x as f32) + (self.width as f32) / 2.0
    }

    #[inline]
    pub fn center_y(&self) -> f32 {
        (self.y as f32) + (self.height as f32) / 2.0
    }

    #[inline]
    pub fn area(&self) -> u64 {
        (self.width as u64) * (self.height as u64)
    }
}

/// One perceptual reading, produced once per tick by the perception source.
///
/// JSON form (one datagram / one line):
///   {"kind":"faces","frame_width":1280,"frame_height":720,"faces":[{"x":600,"y":200,"width":100,"height":100}]}
///   {"kind":"sound_direction","angle_degrees":270.0,"is_active":true}
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PerceptionSample {
    Faces {
        frame_width: u32,
        frame_height: u32,
        #[serde(default)]
        faces: Vec<FaceRect>,
    },
    SoundDirection {
        angle_degrees: f32,
        #[serde(default, alias = "is_speaking")]
        is_active: bool,
    },
}

impl PerceptionSample {
    /// Parse a JSON datagram or line. Returns None if malformed.
    #[inline]
    pub fn from_json(buf: &[u8]) -> Option<Self> {
        serde_json::from_slice(buf).ok()
    }

    /// Is the tracked subject there this tick?
    #[inline]
    pub fn presence(&self) -> bool {
        match self {
            PerceptionSample::Faces { faces, .. } => !faces.is_empty(),
            PerceptionSample::SoundDirection { is_active, .. } => *is_active,
        }
    }

    /// The face to track: the largest one by area. Ties go to the first.
    pub fn largest_face(&self) -> Option<&FaceRect> {
        match self {
            PerceptionSample::Faces { faces, .. } =>
                faces.iter().reduce(|best, f| if f.area() > best.area() { f } else { best }),
            PerceptionSample::SoundDirection { .. } => None,
        }
    }

    /// Drop detections smaller than `min_size` on either side.
    pub fn retain_faces_at_least(&mut self, min_size: u32) {
        if let PerceptionSample::Faces { faces, .. } = self {
            faces.retain(|f| f.width >= min_size && f.height >= min_size);
        }
    }

    pub fn face_count(&self) -> usize {
        match self {
            PerceptionSample::Faces { faces, .. } => faces.len(),
            PerceptionSample::SoundDirection { .. } => 0,
        }
    }
}

/// Result of asking the perception source for this tick's sample.
#[derive(Debug, Clone, PartialEq)]
pub enum Acquisition {
    Sample(PerceptionSample),
    /// No frame / no reading this tick; try again next tick.
    Missing,
    /// The source is finished and will never produce again.
    Closed,
}

/// Where samples come from (camera + detector, microphone array, a replay...).
#[allow(async_fn_in_trait)]
pub trait PerceptionSource {
    async fn next_sample(&mut self) -> Acquisition;
}

/// Eight-sector compass label for a DoA angle (0° = front, 90° = right).
pub fn direction_label(angle_degrees: f32) -> &'static str {
    let a = angle_degrees.rem_euclid(360.0);
    // Sectors are 45° wide and centred on the compass points.
    match (((a + 22.5) / 45.0) as u32) % 8 {
        0 => "FRONT",
        1 => "FRONT-RIGHT",
        2 => "RIGHT",
        3 => "BACK-RIGHT",
        4 => "BACK",
        5 => "BACK-LEFT",
        6 => "LEFT",
        _ => "FRONT-LEFT",
    }
}
