use crate::config::{ BehaviorConfig, SpeechMode };
use crate::gesture::{ GestureKind, GestureOutcome, GestureSequencer };
use crate::robot::{ Actuator, SpeechOutput };
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{ debug, info, warn };

// ─────────────────────────────────────────────────────────────────────
//  Emotion state machine
// ─────────────────────────────────────────────────────────────────────
//
//          ┌──── entry edge ────▶ Curious ───┐
//          │                                 │
//  Neutral ┼── dwell ≥ happy ───▶ Happy ─────┼── execute() ──▶ Neutral
//          │                                 │
//          └── gone ≥ goodbye ──▶ Sad ───────┘
//
//  Rules are checked once per tick in the order entry, goodbye, dwell;
//  the first match wins.  No transition lands while a gesture is playing
//  or within the cooldown of the previous transition.  Presence
//  bookkeeping runs every tick regardless.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Emotion {
    Neutral,
    Curious,
    Happy,
    Sad,
}

impl Emotion {
    pub fn gesture(self) -> Option<GestureKind> {
        match self {
            Emotion::Neutral => None,
            Emotion::Curious => Some(GestureKind::CuriousWave),
            Emotion::Happy => Some(GestureKind::HappyBounce),
            Emotion::Sad => Some(GestureKind::SadDroop),
        }
    }

    pub fn phrase(self) -> Option<&'static str> {
        match self {
            Emotion::Neutral => None,
            Emotion::Curious => Some("Hello! Who are you?"),
            Emotion::Happy => Some("I'm so happy to see you!"),
            Emotion::Sad => Some("Goodbye! Come back soon!"),
        }
    }

    /// Sound to play for this emotion, if any.
    pub fn sound(self, mode: SpeechMode) -> Option<String> {
        let stem = match self {
            Emotion::Neutral => {
                return None;
            }
            Emotion::Curious => "curious",
            Emotion::Happy => "happy",
            Emotion::Sad => "sad",
        };
        match mode {
            SpeechMode::Phrases => Some(format!("{stem}_greeting.wav")),
            SpeechMode::Effects =>
                Some(
                    (match self {
                        Emotion::Curious => "confused1.wav",
                        Emotion::Happy => "wake_up.wav",
                        _ => "go_sleep.wav",
                    }).to_string()
                ),
            SpeechMode::Off => None,
        }
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Emotion::Neutral => write!(f, "NEUTRAL"),
            Emotion::Curious => write!(f, "CURIOUS"),
            Emotion::Happy => write!(f, "HAPPY"),
            Emotion::Sad => write!(f, "SAD"),
        }
    }
}

/// When the subject was seen, and whether a goodbye is owed.
#[derive(Debug, Clone, Default)]
pub struct PresenceTimeline {
    pub first_seen_at: Option<Instant>,
    pub last_seen_at: Option<Instant>,
    pub previous_presence: bool,
    /// Presence dropped and the goodbye delay hasn't been resolved yet.
    pub goodbye_pending: bool,
    /// HAPPY already landed during the current visit.
    pub happy_shown: bool,
}

#[derive(Debug)]
pub struct EmotionStateMachine {
    state: Emotion,
    timeline: PresenceTimeline,
    last_transition_at: Option<Instant>,
    in_progress: bool,
    cooldown: Duration,
    happy_trigger_time: Duration,
    goodbye_delay: Duration,
    speech: SpeechMode,
}

impl EmotionStateMachine {
    pub fn new(config: &BehaviorConfig) -> Self {
        Self {
            state: Emotion::Neutral,
            timeline: PresenceTimeline::default(),
            last_transition_at: None,
            in_progress: false,
            cooldown: config.emotion_cooldown,
            happy_trigger_time: config.happy_trigger_time,
            goodbye_delay: config.goodbye_delay,
            speech: config.speech,
        }
    }

    pub fn state(&self) -> Emotion {
        self.state
    }

    pub fn in_progress(&self) -> bool {
        self.in_progress
    }

    pub fn timeline(&self) -> &PresenceTimeline {
        &self.timeline
    }

    fn in_cooldown(&self, now: Instant) -> bool {
        match self.last_transition_at {
            Some(t) => now.saturating_duration_since(t) < self.cooldown,
            None => false,
        }
    }

    /// Feed one tick of presence. Returns the emotion that was entered, if any.
    pub fn update(&mut self, present: bool, now: Instant) -> Option<Emotion> {
        let was_present = self.timeline.previous_presence;
        self.timeline.previous_presence = present;

        let permitted = !self.in_progress && !self.in_cooldown(now);

        // 1. entry edge
        if present && !was_present {
            self.timeline.first_seen_at = Some(now);
            self.timeline.last_seen_at = Some(now);
            self.timeline.goodbye_pending = false;
            self.timeline.happy_shown = false;
            if permitted {
                info!("👀 New subject! Showing CURIOUS");
                return Some(self.transition(Emotion::Curious, now));
            }
            debug!(in_progress = self.in_progress, "entry edge suppressed");
            return None;
        }

        if present {
            self.timeline.last_seen_at = Some(now);
        } else if was_present {
            self.timeline.goodbye_pending = true;
        }

        // 3. exit edge + goodbye delay
        if !present && self.timeline.goodbye_pending {
            let gone_for = self.timeline.last_seen_at
                .map(|t| now.saturating_duration_since(t))
                .unwrap_or(Duration::MAX);
            if gone_for >= self.goodbye_delay {
                self.timeline.goodbye_pending = false;
                self.timeline.first_seen_at = None;
                if permitted {
                    info!("👋 Subject left! Showing SAD");
                    return Some(self.transition(Emotion::Sad, now));
                }
                debug!("goodbye suppressed");
            }
            return None;
        }

        // 2. sustained presence
        if present && !self.timeline.happy_shown && self.state != Emotion::Happy {
            let dwell = self.timeline.first_seen_at
                .map(|t| now.saturating_duration_since(t))
                .unwrap_or(Duration::ZERO);
            if dwell >= self.happy_trigger_time && permitted {
                self.timeline.happy_shown = true;
                info!(dwell_ms = dwell.as_millis() as u64, "😊 Subject staying! Showing HAPPY");
                return Some(self.transition(Emotion::Happy, now));
            }
        }

        None
    }

    fn transition(&mut self, to: Emotion, now: Instant) -> Emotion {
        self.state = to;
        self.last_transition_at = Some(now);
        to
    }

    /// Mark the current emotion as executing. Returns it, or `None` when
    /// there is nothing to express or something already is.
    pub fn begin_execution(&mut self) -> Option<Emotion> {
        if self.state == Emotion::Neutral || self.in_progress {
            return None;
        }
        self.in_progress = true;
        Some(self.state)
    }

    /// Execution is over (however it ended): back to Neutral.
    pub fn finish_execution(&mut self) {
        self.in_progress = false;
        self.state = Emotion::Neutral;
    }

    /// Express the current emotion: speech first, then the gesture. Errors
    /// from either collaborator are logged; execution always finishes.
    pub async fn execute<A, S>(
        &mut self,
        sequencer: &GestureSequencer,
        actuator: &mut A,
        speech: &mut S
    ) -> Option<(Emotion, GestureOutcome)>
        where A: Actuator, S: SpeechOutput
    {
        let emotion = self.begin_execution()?;

        if let Some(sound) = emotion.sound(self.speech) {
            match speech.play_sound(&sound) {
                Ok(()) => {
                    info!(emotion = %emotion, sound = %sound, phrase = emotion.phrase(), "🔊 speaking");
                }
                Err(e) => warn!(emotion = %emotion, error = %e, "⚠️ speech playback failed"),
            }
        }

        let outcome = match emotion.gesture() {
            Some(kind) => sequencer.play(kind.spec(), actuator).await,
            None => GestureOutcome { keyframes_played: 0, aborted: false },
        };

        self.finish_execution();
        Some((emotion, outcome))
    }
}
