//! Audio output: the cpal engine, the recording tap, and offline rendering.
//!
//! The engine is the owned process-wide audio resource: created once at
//! startup, torn down when dropped. Everything downstream of the controller
//! shares one `Mixer` behind a mutex with the device callback.

pub mod mixer;

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use crate::melody::Melody;
use crate::params::{EngineConfig, PlaybackConfig, RecordingConfig, ReverbConfig, SynthPatch};
use crate::playback::{NoteSink, PlaybackController, ToneId};
use crate::synth::NoteSynth;
use mixer::Mixer;

/// WAV tap on the live output, bounded by the configured duration.
struct RecordingTap {
    writer: hound::WavWriter<std::io::BufWriter<std::fs::File>>,
    frames_left: usize,
}

/// Audio engine: renders triggered notes and streams the mix to the default
/// output device.
pub struct AudioEngine {
    synth: NoteSynth,
    shared: Arc<Mutex<Mixer>>,

    /// Audio output stream (kept alive)
    _stream: cpal::Stream,
}

impl AudioEngine {
    /// Create and start the engine on the default output device.
    pub fn new(
        patch: SynthPatch,
        reverb: ReverbConfig,
        engine: EngineConfig,
        recording: Option<RecordingConfig>,
    ) -> Result<Self, String> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or("No audio output device found")?;

        let config = device
            .default_output_config()
            .map_err(|e| format!("Failed to get audio config: {}", e))?;

        let sample_rate_hz = config.sample_rate().0 as f32;
        let channels = config.channels() as usize;

        println!(
            "Audio: {} @ {}Hz",
            device.name().unwrap_or_else(|_| "Unknown".to_string()),
            config.sample_rate().0
        );

        let synth = NoteSynth::new(patch, reverb, sample_rate_hz)?;

        let shared = Arc::new(Mutex::new(Mixer::new(engine.master_gain)));
        let mixer_for_callback = Arc::clone(&shared);

        // Create WAV tap if recording
        let tap = recording
            .map(|config| -> Result<Arc<Mutex<RecordingTap>>, String> {
                std::fs::create_dir_all(&config.output_dir)
                    .map_err(|e| format!("Failed to create output directory: {}", e))?;
                let spec = hound::WavSpec {
                    channels: 1,
                    sample_rate: sample_rate_hz as u32,
                    bits_per_sample: 32,
                    sample_format: hound::SampleFormat::Float,
                };
                let writer = hound::WavWriter::create(config.audio_path(), spec)
                    .map_err(|e| format!("Failed to create WAV writer: {}", e))?;
                Ok(Arc::new(Mutex::new(RecordingTap {
                    writer,
                    frames_left: (config.duration_secs * sample_rate_hz) as usize,
                })))
            })
            .transpose()?;

        let mut mono: Vec<f32> = Vec::new();
        let stream = device
            .build_output_stream(
                &config.into(),
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let frames = data.len() / channels;
                    mono.resize(frames, 0.0);
                    mixer_for_callback.lock().unwrap().render(&mut mono);

                    // Duplicate the mono mix across all device channels
                    for (frame, &sample) in data.chunks_mut(channels).zip(mono.iter()) {
                        for slot in frame.iter_mut() {
                            *slot = sample;
                        }
                    }

                    if let Some(ref tap) = tap {
                        if let Ok(mut tap) = tap.lock() {
                            let count = frames.min(tap.frames_left);
                            for &sample in mono.iter().take(count) {
                                let _ = tap.writer.write_sample(sample);
                            }
                            tap.frames_left -= count;
                        }
                    }
                },
                |err| eprintln!("Audio stream error: {}", err),
                None,
            )
            .map_err(|e| format!("Failed to build audio stream: {}", e))?;

        stream
            .play()
            .map_err(|e| format!("Failed to start audio stream: {}", e))?;

        Ok(Self {
            synth,
            shared,
            _stream: stream,
        })
    }

    pub fn sample_rate_hz(&self) -> f32 {
        self.synth.sample_rate_hz()
    }

    /// Tones currently feeding the output.
    pub fn active_voices(&self) -> usize {
        self.shared.lock().unwrap().active_voices()
    }
}

impl NoteSink for AudioEngine {
    fn play_note(&mut self, frequency_hz: f32, duration_s: f32) -> Option<ToneId> {
        match self.synth.render(frequency_hz, duration_s) {
            Ok(samples) => Some(self.shared.lock().unwrap().add_voice(samples)),
            Err(e) => {
                eprintln!("Note render error: {}", e);
                None
            }
        }
    }
}

/// Sink used when no output device is available: cranking still turns the
/// drum, nothing sounds, nothing errors.
pub struct SilentSink;

impl NoteSink for SilentSink {
    fn play_note(&mut self, _frequency_hz: f32, _duration_s: f32) -> Option<ToneId> {
        None
    }
}

/// Device-free sink: renders into a caller-owned mixer.
struct MixerSink<'a> {
    synth: &'a NoteSynth,
    mixer: &'a mut Mixer,
}

impl NoteSink for MixerSink<'_> {
    fn play_note(&mut self, frequency_hz: f32, duration_s: f32) -> Option<ToneId> {
        match self.synth.render(frequency_hz, duration_s) {
            Ok(samples) => Some(self.mixer.add_voice(samples)),
            Err(e) => {
                eprintln!("Note render error: {}", e);
                None
            }
        }
    }
}

/// Gesture sampling rate for simulated sessions (Hz). Matches the cadence of
/// a typical pointer-event stream.
const SESSION_GESTURE_RATE_HZ: f32 = 60.0;

/// Render a simulated constant-speed crank session through the full pipeline
/// (controller, synthesizer, mixer; no audio device) and write a mono WAV to
/// the recording config's audio path.
pub fn render_session(
    recording: &RecordingConfig,
    crank_speed_deg_per_s: f32,
    melody: Melody,
    playback: PlaybackConfig,
    patch: SynthPatch,
    reverb: ReverbConfig,
    engine: EngineConfig,
) -> Result<(), String> {
    if recording.duration_secs <= 0.0 {
        return Err(format!(
            "session duration must be > 0 s, got {}",
            recording.duration_secs
        ));
    }
    if crank_speed_deg_per_s <= 0.0 {
        return Err("crank speed must be > 0 deg/s".to_string());
    }

    let sample_rate_hz = engine.fallback_sample_rate_hz;
    let synth = NoteSynth::new(patch, reverb, sample_rate_hz)?;
    let mut controller = PlaybackController::new(melody, playback)?;
    let mut mixer = Mixer::new(engine.master_gain);

    std::fs::create_dir_all(&recording.output_dir)
        .map_err(|e| format!("Failed to create output directory: {}", e))?;
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: sample_rate_hz as u32,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(recording.audio_path(), spec)
        .map_err(|e| format!("Failed to create WAV writer: {}", e))?;

    let step_frames = (sample_rate_hz / SESSION_GESTURE_RATE_HZ) as usize;
    let steps = (recording.duration_secs * SESSION_GESTURE_RATE_HZ).ceil() as usize;
    let delta_deg = crank_speed_deg_per_s / SESSION_GESTURE_RATE_HZ;

    let start = Instant::now();
    let mut block = vec![0.0_f32; step_frames];
    for i in 0..steps {
        let now = start + Duration::from_secs_f32(i as f32 / SESSION_GESTURE_RATE_HZ);
        let mut sink = MixerSink {
            synth: &synth,
            mixer: &mut mixer,
        };
        controller.on_angular_delta(delta_deg, now, &mut sink);
        controller.tick(now);

        mixer.render(&mut block);
        for &sample in &block {
            writer
                .write_sample(sample)
                .map_err(|e| format!("Failed to write sample: {}", e))?;
        }
    }

    // Let the release and reverb tails ring out
    let tail_limit = (5.0 * SESSION_GESTURE_RATE_HZ) as usize;
    let mut tail_steps = 0;
    while mixer.active_voices() > 0 && tail_steps < tail_limit {
        mixer.render(&mut block);
        for &sample in &block {
            writer
                .write_sample(sample)
                .map_err(|e| format!("Failed to write sample: {}", e))?;
        }
        tail_steps += 1;
    }

    writer
        .finalize()
        .map_err(|e| format!("Failed to finalize WAV: {}", e))
}
