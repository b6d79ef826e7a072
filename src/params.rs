//! Parameter definitions with physical units and documented semantics.
//!
//! All magic numbers are extracted here with:
//! - Physical units (degrees, seconds, Hz, etc.)
//! - Documented ranges and meanings
//! - Defaults matching the designed music box timbre

use std::time::Duration;

/// Crank gesture tracking parameters
#[derive(Debug, Clone)]
pub struct CrankConfig {
    /// Minimum pointer distance from the pivot for a usable angle (pixels).
    /// Closer samples are held over: the last valid angle is reused rather
    /// than recomputed from degenerate geometry.
    pub min_radius_px: f32,
}

impl Default for CrankConfig {
    fn default() -> Self {
        Self { min_radius_px: 14.0 }
    }
}

/// Playback controller parameters
#[derive(Debug, Clone)]
pub struct PlaybackConfig {
    /// Rotation consumed per note trigger (degrees)
    pub degrees_per_note: f32,

    /// Cranking speed that maps to a 1.0 tempo multiplier (degrees per second)
    pub reference_speed_deg_per_s: f32,

    /// Weight of the previous tempo value in the exponential moving average
    /// (dimensionless, in [0, 1); the new velocity sample gets the remainder)
    pub tempo_smoothing: f32,

    /// Lower clamp for the tempo multiplier (dimensionless)
    pub tempo_min: f32,

    /// Upper clamp for the tempo multiplier (dimensionless)
    pub tempo_max: f32,

    /// Gesture inactivity window before playback is judged stopped
    pub idle_timeout: Duration,

    /// Bookkeeping margin added to a tone's adjusted duration before its
    /// handle is dropped from the active set
    pub tone_linger: Duration,

    /// Whether `reset()` also rewinds the melody cursor to the first note
    pub rewind_on_reset: bool,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            degrees_per_note: 90.0,
            reference_speed_deg_per_s: 90.0,
            tempo_smoothing: 0.7,
            tempo_min: 0.3,
            tempo_max: 3.0,
            idle_timeout: Duration::from_millis(200),
            tone_linger: Duration::from_millis(100),
            rewind_on_reset: false,
        }
    }
}

impl PlaybackConfig {
    /// Validate configuration (threshold must be positive, clamp ordered, etc.)
    pub fn validate(&self) -> Result<(), String> {
        if self.degrees_per_note <= 0.0 {
            return Err(format!(
                "degrees_per_note must be > 0, got {}",
                self.degrees_per_note
            ));
        }
        if self.reference_speed_deg_per_s <= 0.0 {
            return Err("reference_speed_deg_per_s must be > 0".to_string());
        }
        if !(0.0..1.0).contains(&self.tempo_smoothing) {
            return Err(format!(
                "tempo_smoothing must be in [0, 1), got {}",
                self.tempo_smoothing
            ));
        }
        if self.tempo_min <= 0.0 || self.tempo_max < self.tempo_min {
            return Err(format!(
                "tempo clamp must satisfy 0 < min <= max, got [{}, {}]",
                self.tempo_min, self.tempo_max
            ));
        }
        Ok(())
    }
}

/// One inharmonic overtone partial layered under the note envelope
#[derive(Debug, Clone, Copy)]
pub struct OvertonePartial {
    /// Frequency as a multiple of the fundamental (dimensionless, non-integer
    /// ratios give the metallic character)
    pub ratio: f32,

    /// Starting amplitude (linear gain)
    pub level: f32,

    /// Time for the partial to decay to the silence floor (seconds)
    pub decay_s: f32,
}

/// Note synthesizer timbre parameters
///
/// These encode one designed music box voice. They are data, not structure:
/// swapping values changes the timbre without touching the DSP.
#[derive(Debug, Clone)]
pub struct SynthPatch {
    /// Linear attack time to the envelope peak (seconds)
    pub attack_s: f32,

    /// Envelope peak level (linear gain)
    pub peak_level: f32,

    /// Time of the post-attack exponential decay knee (seconds)
    pub decay_s: f32,

    /// Level at the decay knee (linear gain)
    pub decay_level: f32,

    /// Release floor treated as silence (linear gain)
    pub floor_level: f32,

    /// Envelope release deadline: the release reaches the floor by
    /// min(note duration, this) (seconds)
    pub max_envelope_s: f32,

    /// Hard stop for the tone's generators: min(note duration, this) (seconds)
    pub max_tone_s: f32,

    /// Frequency shimmer rate applied to the fundamental (Hz)
    pub vibrato_rate_hz: f32,

    /// Frequency shimmer depth (Hz, peak deviation)
    pub vibrato_depth_hz: f32,

    /// Band-pass center as a multiple of the fundamental (dimensionless)
    pub bandpass_center_ratio: f32,

    /// Band-pass resonance (Q, dimensionless)
    pub bandpass_q: f32,

    /// High-pass cutoff for brightness (Hz)
    pub highpass_cutoff_hz: f32,

    /// High-pass resonance (Q, dimensionless)
    pub highpass_q: f32,

    /// Inharmonic partials layered over the filtered fundamental
    pub overtones: Vec<OvertonePartial>,
}

impl Default for SynthPatch {
    fn default() -> Self {
        Self {
            attack_s: 0.003,
            peak_level: 0.4,
            decay_s: 0.08,
            decay_level: 0.12,
            floor_level: 0.001,
            max_envelope_s: 1.5,
            max_tone_s: 2.0,
            vibrato_rate_hz: 5.5,
            vibrato_depth_hz: 2.0,
            bandpass_center_ratio: 1.5,
            bandpass_q: 8.0,
            highpass_cutoff_hz: 1200.0,
            highpass_q: 0.7,
            overtones: vec![
                OvertonePartial {
                    ratio: 2.7,
                    level: 0.15,
                    decay_s: 0.3,
                },
                OvertonePartial {
                    ratio: 4.2,
                    level: 0.08,
                    decay_s: 0.2,
                },
            ],
        }
    }
}

impl SynthPatch {
    /// Validate configuration (ordered envelope stages, positive levels)
    pub fn validate(&self) -> Result<(), String> {
        if self.attack_s <= 0.0 || self.decay_s <= self.attack_s {
            return Err(format!(
                "envelope stages must satisfy 0 < attack < decay, got {} / {}",
                self.attack_s, self.decay_s
            ));
        }
        if self.max_envelope_s <= self.decay_s || self.max_tone_s < self.max_envelope_s {
            return Err(
                "envelope must end after the decay knee and before the tone stop".to_string(),
            );
        }
        if self.floor_level <= 0.0 {
            return Err("floor_level must be > 0 for exponential release".to_string());
        }
        Ok(())
    }
}

/// Synthetic reverb parameters
#[derive(Debug, Clone)]
pub struct ReverbConfig {
    /// Impulse response length (seconds)
    pub length_s: f32,

    /// Dry path gain (linear)
    pub dry_level: f32,

    /// Reverberated path gain (linear)
    pub wet_level: f32,

    /// Noise impulse seed (fixed so the room character is stable run to run)
    pub noise_seed: u32,
}

impl Default for ReverbConfig {
    fn default() -> Self {
        Self {
            length_s: 2.5,
            dry_level: 0.6,
            wet_level: 0.4,
            noise_seed: 42,
        }
    }
}

impl ReverbConfig {
    /// Validate configuration (impulse must be non-empty)
    pub fn validate(&self) -> Result<(), String> {
        if self.length_s <= 0.0 {
            return Err(format!("reverb length must be > 0 s, got {}", self.length_s));
        }
        if self.dry_level < 0.0 || self.wet_level < 0.0 {
            return Err("dry/wet levels must be >= 0".to_string());
        }
        Ok(())
    }
}

/// Audio engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Master gain between the mixer and the device (linear)
    pub master_gain: f32,

    /// Sample rate used when no device dictates one, e.g. offline rendering (Hz)
    pub fallback_sample_rate_hz: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            master_gain: 0.6,
            fallback_sample_rate_hz: 44_100.0,
        }
    }
}

/// Recording mode configuration
#[derive(Debug, Clone)]
pub struct RecordingConfig {
    /// Duration to record (seconds)
    pub duration_secs: f32,

    /// Output directory for the captured audio
    pub output_dir: String,
}

impl RecordingConfig {
    pub fn new(duration_secs: f32) -> Self {
        Self {
            duration_secs,
            output_dir: "recording".to_string(),
        }
    }

    /// Audio file path
    pub fn audio_path(&self) -> String {
        format!("{}/audio.wav", self.output_dir)
    }
}
