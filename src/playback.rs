//! Playback controller: angular deltas in, note triggers and state edges out.
//!
//! The controller owns all playback state (rotation accumulator, tempo,
//! melody cursor, idle deadline) and mutates it only in response to ordered
//! calls from its single owner, so the whole engine needs no locking. Time is
//! passed in rather than read from a clock, which keeps every transition
//! deterministic under test.

use std::time::{Duration, Instant};

use crate::melody::Melody;
use crate::params::PlaybackConfig;

/// Opaque handle to one in-flight synthesized tone. Handles exist only so a
/// caller can count what is currently sounding; they carry no operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ToneId(pub u64);

/// Gross rotation direction of the gesture sample that triggered a note.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationDirection {
    Forward,
    Backward,
}

impl RotationDirection {
    fn from_delta(delta_deg: f32) -> Self {
        if delta_deg < 0.0 {
            Self::Backward
        } else {
            Self::Forward
        }
    }
}

/// Notifications emitted to the caller, in the order they occurred. Consumers
/// (drum rotation, confetti, poppers) are outside this crate; they see only
/// these values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackEvent {
    /// One melody note was rendered and the cursor advanced.
    NoteTriggered { direction: RotationDirection },
    /// Rising edge: playback went from stopped to active.
    Started,
    /// Falling edge: the inactivity window elapsed with no gesture samples.
    Stopped,
}

/// Destination for triggered notes.
///
/// The audio engine is the real sink; tests use recording mocks and a
/// degraded system runs on [`crate::audio::SilentSink`]. A sink may decline a
/// note by returning `None` (output unavailable): the note is simply never
/// heard, nothing is raised.
pub trait NoteSink {
    fn play_note(&mut self, frequency_hz: f32, duration_s: f32) -> Option<ToneId>;
}

/// Converts accumulated rotation into discrete note triggers with tempo
/// derived from gesture velocity.
pub struct PlaybackController {
    config: PlaybackConfig,
    melody: Melody,
    cursor: usize,
    accumulator_deg: f32,
    tempo: f32,
    playing: bool,
    last_sample_at: Option<Instant>,
    idle_deadline: Option<Instant>,
    active_tones: Vec<(ToneId, Instant)>,
}

impl PlaybackController {
    pub fn new(melody: Melody, config: PlaybackConfig) -> Result<Self, String> {
        config.validate()?;
        Ok(Self {
            config,
            melody,
            cursor: 0,
            accumulator_deg: 0.0,
            tempo: 1.0,
            playing: false,
            last_sample_at: None,
            idle_deadline: None,
            active_tones: Vec::new(),
        })
    }

    /// Process one gesture sample.
    ///
    /// Accumulates |delta|, updates the tempo estimate from the sample's
    /// angular velocity, and drains the accumulator one threshold at a time:
    /// several notes can fire from a single fast sample, and the exact
    /// remainder below the threshold is preserved so the arc-to-note mapping
    /// is independent of how finely the gesture is sampled.
    pub fn on_angular_delta(
        &mut self,
        delta_deg: f32,
        now: Instant,
        sink: &mut dyn NoteSink,
    ) -> Vec<PlaybackEvent> {
        let mut events = Vec::new();

        // Smooth the tempo estimate from instantaneous angular velocity.
        // Zero elapsed time (duplicate timestamps) contributes nothing.
        if let Some(last) = self.last_sample_at {
            let elapsed_s = now.duration_since(last).as_secs_f32();
            if elapsed_s > 0.0 {
                let speed_deg_per_s = delta_deg.abs() / elapsed_s;
                let target = speed_deg_per_s / self.config.reference_speed_deg_per_s;
                let smoothing = self.config.tempo_smoothing;
                self.tempo = (self.tempo * smoothing + target * (1.0 - smoothing))
                    .clamp(self.config.tempo_min, self.config.tempo_max);
            }
        }
        self.last_sample_at = Some(now);

        self.accumulator_deg += delta_deg.abs();

        let direction = RotationDirection::from_delta(delta_deg);
        let mut fired = false;
        while self.accumulator_deg >= self.config.degrees_per_note {
            self.accumulator_deg -= self.config.degrees_per_note;
            if self.melody.is_empty() {
                continue;
            }
            let note = *self.melody.note(self.cursor);
            let duration_s = note.base_duration_s / self.tempo;
            if let Some(id) = sink.play_note(note.frequency_hz, duration_s) {
                let expiry = now
                    + Duration::from_secs_f32(duration_s)
                    + self.config.tone_linger;
                self.active_tones.push((id, expiry));
            }
            self.cursor = (self.cursor + 1) % self.melody.len();
            events.push(PlaybackEvent::NoteTriggered { direction });
            fired = true;
        }

        if fired && !self.playing {
            self.playing = true;
            events.push(PlaybackEvent::Started);
        }

        // Debounce: every sample cancels and re-arms the inactivity window.
        self.idle_deadline = Some(now + self.config.idle_timeout);

        events
    }

    /// Poll timers. The host calls this from its event loop; nothing blocks.
    ///
    /// When the inactivity deadline has passed, playback stops exactly once:
    /// the accumulator resets to zero and a falling edge is emitted if
    /// playback was active. Already-scheduled tones are not silenced; they
    /// just age out of the active set.
    pub fn tick(&mut self, now: Instant) -> Vec<PlaybackEvent> {
        let mut events = Vec::new();

        self.active_tones.retain(|&(_, expiry)| expiry > now);

        if let Some(deadline) = self.idle_deadline {
            if now >= deadline {
                self.idle_deadline = None;
                self.accumulator_deg = 0.0;
                if self.playing {
                    self.playing = false;
                    events.push(PlaybackEvent::Stopped);
                }
            }
        }

        events
    }

    /// Clear rotation and timing state. The melody cursor is kept unless the
    /// controller was configured with `rewind_on_reset`. The tempo estimate
    /// survives, as it does across idle gaps.
    pub fn reset(&mut self) {
        self.idle_deadline = None;
        self.accumulator_deg = 0.0;
        self.playing = false;
        if self.config.rewind_on_reset {
            self.cursor = 0;
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Current tempo multiplier in `[tempo_min, tempo_max]`.
    pub fn tempo(&self) -> f32 {
        self.tempo
    }

    /// Melody cursor position (next note to trigger).
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Unconsumed rotation below the trigger threshold (degrees).
    pub fn accumulated_degrees(&self) -> f32 {
        self.accumulator_deg
    }

    /// Tones still within their scheduled lifetime.
    pub fn active_tone_count(&self) -> usize {
        self.active_tones.len()
    }

    /// Next instant at which `tick` has work to do, for hosts that sleep
    /// between events.
    pub fn next_deadline(&self) -> Option<Instant> {
        let tone_deadline = self.active_tones.iter().map(|&(_, e)| e).min();
        match (self.idle_deadline, tone_deadline) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::PlaybackConfig;

    /// Records every triggered note; ids count up from 1.
    struct MockSink {
        played: Vec<(f32, f32)>,
        next_id: u64,
    }

    impl MockSink {
        fn new() -> Self {
            Self {
                played: Vec::new(),
                next_id: 1,
            }
        }
    }

    impl NoteSink for MockSink {
        fn play_note(&mut self, frequency_hz: f32, duration_s: f32) -> Option<ToneId> {
            self.played.push((frequency_hz, duration_s));
            let id = ToneId(self.next_id);
            self.next_id += 1;
            Some(id)
        }
    }

    /// Declines every note, as an uninitialized output does.
    struct DeadSink;

    impl NoteSink for DeadSink {
        fn play_note(&mut self, _frequency_hz: f32, _duration_s: f32) -> Option<ToneId> {
            None
        }
    }

    fn controller() -> PlaybackController {
        PlaybackController::new(Melody::happy_birthday(), PlaybackConfig::default()).unwrap()
    }

    fn note_count(events: &[PlaybackEvent]) -> usize {
        events
            .iter()
            .filter(|e| matches!(e, PlaybackEvent::NoteTriggered { .. }))
            .count()
    }

    #[test]
    fn test_eighteen_fine_samples_trigger_one_note() {
        let mut c = controller();
        let mut sink = MockSink::new();
        let start = Instant::now();

        let mut total_notes = 0;
        for i in 0..18 {
            let now = start + Duration::from_millis(10 * i);
            total_notes += note_count(&c.on_angular_delta(5.0, now, &mut sink));
        }

        assert_eq!(total_notes, 1);
        assert_eq!(c.accumulated_degrees(), 0.0);
        assert_eq!(c.cursor(), 1);
    }

    #[test]
    fn test_single_fast_sample_triggers_two_notes() {
        let mut c = controller();
        let mut sink = MockSink::new();

        let events = c.on_angular_delta(200.0, Instant::now(), &mut sink);

        assert_eq!(note_count(&events), 2);
        assert!((c.accumulated_degrees() - 20.0).abs() < 1e-4);
        assert_eq!(c.cursor(), 2);
    }

    #[test]
    fn test_accumulator_conservation_is_sampling_independent() {
        let start = Instant::now();

        // Ten 10° samples and one 100° sample consume the same arc
        let mut fine = controller();
        let mut fine_sink = MockSink::new();
        let mut fine_notes = 0;
        for i in 0..10 {
            let now = start + Duration::from_millis(10 * i);
            fine_notes += note_count(&fine.on_angular_delta(10.0, now, &mut fine_sink));
        }

        let mut coarse = controller();
        let mut coarse_sink = MockSink::new();
        let coarse_notes = note_count(&coarse.on_angular_delta(100.0, start, &mut coarse_sink));

        assert_eq!(fine_notes, 1);
        assert_eq!(coarse_notes, 1);
        assert!((fine.accumulated_degrees() - 10.0).abs() < 1e-4);
        assert!((coarse.accumulated_degrees() - 10.0).abs() < 1e-4);
    }

    #[test]
    fn test_tempo_never_leaves_clamp_range() {
        let mut c = controller();
        let mut sink = MockSink::new();
        let start = Instant::now();

        // Velocity spike: a full turn in a microsecond
        c.on_angular_delta(1.0, start, &mut sink);
        c.on_angular_delta(360.0, start + Duration::from_micros(1), &mut sink);
        assert!(c.tempo() <= 3.0);

        // Crawl: fractions of a degree across long gaps
        for i in 0..50 {
            let now = start + Duration::from_secs(1 + i);
            c.on_angular_delta(0.01, now, &mut sink);
        }
        assert!(c.tempo() >= 0.3);
    }

    #[test]
    fn test_duplicate_timestamp_does_not_poison_tempo() {
        let mut c = controller();
        let mut sink = MockSink::new();
        let now = Instant::now();

        c.on_angular_delta(10.0, now, &mut sink);
        c.on_angular_delta(10.0, now, &mut sink);

        assert!(c.tempo().is_finite());
        assert!((0.3..=3.0).contains(&c.tempo()));
    }

    #[test]
    fn test_cursor_wraps_circularly() {
        let mut c = controller();
        let mut sink = MockSink::new();
        let melody_len = 25;
        let start = Instant::now();

        // melody_len + 2 notes, one 90° sample each
        for i in 0..(melody_len + 2) {
            let now = start + Duration::from_millis(50 * i as u64);
            c.on_angular_delta(90.0, now, &mut sink);
        }

        assert_eq!(c.cursor(), 2);
        assert_eq!(sink.played.len(), melody_len + 2);
        // The 26th note repeats the first pin
        assert_eq!(sink.played[melody_len].0, sink.played[0].0);
    }

    #[test]
    fn test_note_duration_follows_tempo() {
        let mut c = controller();
        let mut sink = MockSink::new();
        let start = Instant::now();

        c.on_angular_delta(45.0, start, &mut sink);
        c.on_angular_delta(45.0, start + Duration::from_millis(100), &mut sink);

        assert_eq!(sink.played.len(), 1);
        let (_, duration) = sink.played[0];
        let expected = 0.8 / c.tempo();
        assert!((duration - expected).abs() < 1e-4);
    }

    #[test]
    fn test_started_rises_once_per_session() {
        let mut c = controller();
        let mut sink = MockSink::new();
        let start = Instant::now();

        let events = c.on_angular_delta(95.0, start, &mut sink);
        assert!(events.contains(&PlaybackEvent::Started));

        let events = c.on_angular_delta(95.0, start + Duration::from_millis(50), &mut sink);
        assert!(!events.contains(&PlaybackEvent::Started));
    }

    #[test]
    fn test_subthreshold_wiggle_emits_nothing() {
        let mut c = controller();
        let mut sink = MockSink::new();

        let events = c.on_angular_delta(30.0, Instant::now(), &mut sink);

        assert!(events.is_empty());
        assert!(!c.is_playing());
    }

    #[test]
    fn test_idle_timeout_stops_exactly_once() {
        let mut c = controller();
        let mut sink = MockSink::new();
        let start = Instant::now();

        c.on_angular_delta(100.0, start, &mut sink);
        assert!(c.is_playing());

        // Before the window closes: nothing
        assert!(c.tick(start + Duration::from_millis(150)).is_empty());

        // After: one falling edge, accumulator cleared
        let events = c.tick(start + Duration::from_millis(250));
        assert_eq!(events, vec![PlaybackEvent::Stopped]);
        assert!(!c.is_playing());
        assert_eq!(c.accumulated_degrees(), 0.0);

        // Deadline disarmed: no second edge
        assert!(c.tick(start + Duration::from_millis(500)).is_empty());
    }

    #[test]
    fn test_gesture_rearms_idle_deadline() {
        let mut c = controller();
        let mut sink = MockSink::new();
        let start = Instant::now();

        c.on_angular_delta(100.0, start, &mut sink);
        // A sample at 150ms pushes the deadline past 250ms
        c.on_angular_delta(5.0, start + Duration::from_millis(150), &mut sink);

        assert!(c.tick(start + Duration::from_millis(250)).is_empty());
        assert!(c.is_playing());

        let events = c.tick(start + Duration::from_millis(400));
        assert_eq!(events, vec![PlaybackEvent::Stopped]);
    }

    #[test]
    fn test_backward_cranking_plays_with_direction() {
        let mut c = controller();
        let mut sink = MockSink::new();

        let events = c.on_angular_delta(-95.0, Instant::now(), &mut sink);

        assert_eq!(sink.played.len(), 1);
        assert!(events.contains(&PlaybackEvent::NoteTriggered {
            direction: RotationDirection::Backward
        }));
    }

    #[test]
    fn test_declined_notes_still_advance_the_drum() {
        let mut c = controller();
        let mut sink = DeadSink;

        let events = c.on_angular_delta(200.0, Instant::now(), &mut sink);

        // The engine is silent but the mechanism still turns
        assert_eq!(note_count(&events), 2);
        assert_eq!(c.cursor(), 2);
        assert_eq!(c.active_tone_count(), 0);
    }

    #[test]
    fn test_active_tones_expire_after_linger() {
        let mut c = controller();
        let mut sink = MockSink::new();
        let start = Instant::now();

        c.on_angular_delta(90.0, start, &mut sink);
        assert_eq!(c.active_tone_count(), 1);

        let (_, duration) = sink.played[0];
        let past_expiry = start + Duration::from_secs_f32(duration) + Duration::from_millis(150);
        c.tick(past_expiry);
        assert_eq!(c.active_tone_count(), 0);
    }

    #[test]
    fn test_reset_keeps_cursor_by_default() {
        let mut c = controller();
        let mut sink = MockSink::new();

        c.on_angular_delta(200.0, Instant::now(), &mut sink);
        c.reset();

        assert_eq!(c.cursor(), 2);
        assert_eq!(c.accumulated_degrees(), 0.0);
        assert!(!c.is_playing());
    }

    #[test]
    fn test_reset_rewinds_when_configured() {
        let config = PlaybackConfig {
            rewind_on_reset: true,
            ..PlaybackConfig::default()
        };
        let mut c = PlaybackController::new(Melody::happy_birthday(), config).unwrap();
        let mut sink = MockSink::new();

        c.on_angular_delta(200.0, Instant::now(), &mut sink);
        c.reset();

        assert_eq!(c.cursor(), 0);
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = PlaybackConfig {
            degrees_per_note: -1.0,
            ..PlaybackConfig::default()
        };
        assert!(PlaybackController::new(Melody::happy_birthday(), config).is_err());
    }
}
