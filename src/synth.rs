//! Note synthesis: one bell-like transient tone per trigger.
//!
//! Each note is rendered whole into a mono sample buffer (fundamental,
//! shimmer, band-limiting, inharmonic partials, envelope, convolution
//! reverb), so a rendered tone owns its entire lifetime and nothing has to
//! tear it down mid-flight.

use std::f32::consts::TAU;

use biquad::{Biquad, Coefficients, DirectForm2Transposed, ToHertz, Type};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use rustfft::{num_complex::Complex, FftPlanner};

use crate::params::{ReverbConfig, SynthPatch};

/// Renders music box notes at a fixed sample rate.
///
/// The reverb impulse is generated once at construction from a seeded PCG32
/// and shared by every note, so the room character never varies within a run.
pub struct NoteSynth {
    patch: SynthPatch,
    reverb: ReverbConfig,
    impulse: Vec<f32>,
    sample_rate_hz: f32,
}

impl NoteSynth {
    pub fn new(
        patch: SynthPatch,
        reverb: ReverbConfig,
        sample_rate_hz: f32,
    ) -> Result<Self, String> {
        patch.validate()?;
        reverb.validate()?;
        if sample_rate_hz <= 0.0 {
            return Err(format!("sample rate must be > 0, got {}", sample_rate_hz));
        }
        let impulse = reverb_impulse(&reverb, sample_rate_hz);
        Ok(Self {
            patch,
            reverb,
            impulse,
            sample_rate_hz,
        })
    }

    pub fn sample_rate_hz(&self) -> f32 {
        self.sample_rate_hz
    }

    /// Render one tone at `frequency_hz` lasting `duration_s` (capped at the
    /// patch's hard stop), returning the mono buffer including the reverb
    /// tail.
    pub fn render(&self, frequency_hz: f32, duration_s: f32) -> Result<Vec<f32>, String> {
        if frequency_hz <= 0.0 {
            return Err(format!("frequency must be > 0 Hz, got {}", frequency_hz));
        }
        if duration_s <= 0.0 {
            return Err(format!("duration must be > 0 s, got {}", duration_s));
        }

        let p = &self.patch;
        let sr = self.sample_rate_hz;
        let tone_s = duration_s.min(p.max_tone_s);
        let samples = (tone_s * sr).ceil() as usize;

        // Release must land after the decay knee even for very short notes
        let env_end_s = duration_s.min(p.max_envelope_s).max(p.decay_s + 1.0 / sr);

        let nyquist = sr / 2.0;
        let bp_center_hz = (frequency_hz * p.bandpass_center_ratio).min(nyquist * 0.95);
        let mut bandpass = DirectForm2Transposed::<f32>::new(
            Coefficients::<f32>::from_params(Type::BandPass, sr.hz(), bp_center_hz.hz(), p.bandpass_q)
                .map_err(|e| format!("band-pass coefficients: {:?}", e))?,
        );
        let hp_cutoff_hz = p.highpass_cutoff_hz.min(nyquist * 0.95);
        let mut highpass = DirectForm2Transposed::<f32>::new(
            Coefficients::<f32>::from_params(Type::HighPass, sr.hz(), hp_cutoff_hz.hz(), p.highpass_q)
                .map_err(|e| format!("high-pass coefficients: {:?}", e))?,
        );

        let mut dry = Vec::with_capacity(samples);
        let mut phase = 0.0_f32;
        for i in 0..samples {
            let t = i as f32 / sr;

            // Square fundamental with a slow frequency shimmer
            let shimmer_hz = p.vibrato_depth_hz * (TAU * p.vibrato_rate_hz * t).sin();
            phase += (frequency_hz + shimmer_hz) / sr;
            phase -= phase.floor();
            let fundamental = if phase < 0.5 { 1.0 } else { -1.0 };

            let filtered = highpass.run(bandpass.run(fundamental));

            // Inharmonic partials ride under the same note envelope
            let mut sample = filtered;
            for partial in &p.overtones {
                let gain = exp_ramp(partial.level, p.floor_level, partial.decay_s, t);
                sample += gain * (TAU * frequency_hz * partial.ratio * t).sin();
            }

            dry.push(sample * note_envelope(p, env_end_s, t));
        }

        // Split into dry and reverberated paths, summed at the fixed mix
        let wet = convolve(&dry, &self.impulse);
        let mut out = vec![0.0_f32; wet.len()];
        for (i, out_sample) in out.iter_mut().enumerate() {
            let d = dry.get(i).copied().unwrap_or(0.0);
            *out_sample = self.reverb.dry_level * d + self.reverb.wet_level * wet[i];
        }
        Ok(out)
    }
}

/// Piecewise note envelope: linear attack to the peak, exponential decay to
/// the knee, exponential release to the floor by `env_end_s`, floor after.
fn note_envelope(p: &SynthPatch, env_end_s: f32, t: f32) -> f32 {
    if t < p.attack_s {
        p.peak_level * (t / p.attack_s)
    } else if t < p.decay_s {
        let progress = (t - p.attack_s) / (p.decay_s - p.attack_s);
        p.peak_level * (p.decay_level / p.peak_level).powf(progress)
    } else if t < env_end_s {
        let progress = (t - p.decay_s) / (env_end_s - p.decay_s);
        p.decay_level * (p.floor_level / p.decay_level).powf(progress)
    } else {
        p.floor_level
    }
}

/// Exponential ramp from `from` at t=0 to `to` at `duration_s`, held at `to`
/// afterwards.
fn exp_ramp(from: f32, to: f32, duration_s: f32, t: f32) -> f32 {
    if t >= duration_s {
        to
    } else {
        from * (to / from).powf(t / duration_s)
    }
}

/// Generate the reverb impulse: white noise under a squared fade-out,
/// energy-normalized so the wet path lands at a gain comparable to the dry.
pub fn reverb_impulse(config: &ReverbConfig, sample_rate_hz: f32) -> Vec<f32> {
    let length = ((config.length_s * sample_rate_hz) as usize).max(1);
    let seed64 = (config.noise_seed as u64) | ((config.noise_seed as u64) << 32);
    let mut rng = Pcg32::seed_from_u64(seed64);

    let mut impulse: Vec<f32> = (0..length)
        .map(|i| {
            let fade = 1.0 - i as f32 / length as f32;
            rng.gen_range(-1.0..1.0_f32) * fade * fade
        })
        .collect();

    let energy: f32 = impulse.iter().map(|x| x * x).sum();
    if energy > 0.0 {
        let scale = 1.0 / energy.sqrt();
        for x in &mut impulse {
            *x *= scale;
        }
    }
    impulse
}

/// Full linear convolution via FFT; output length is `signal + kernel - 1`.
pub fn convolve(signal: &[f32], kernel: &[f32]) -> Vec<f32> {
    if signal.is_empty() || kernel.is_empty() {
        return Vec::new();
    }
    let out_len = signal.len() + kernel.len() - 1;
    let fft_len = out_len.next_power_of_two();

    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(fft_len);
    let ifft = planner.plan_fft_inverse(fft_len);

    let mut a: Vec<Complex<f32>> = signal
        .iter()
        .map(|&x| Complex::new(x, 0.0))
        .chain(std::iter::repeat(Complex::new(0.0, 0.0)))
        .take(fft_len)
        .collect();
    let mut b: Vec<Complex<f32>> = kernel
        .iter()
        .map(|&x| Complex::new(x, 0.0))
        .chain(std::iter::repeat(Complex::new(0.0, 0.0)))
        .take(fft_len)
        .collect();

    fft.process(&mut a);
    fft.process(&mut b);
    for (x, y) in a.iter_mut().zip(b.iter()) {
        *x *= *y;
    }
    ifft.process(&mut a);

    // rustfft leaves the inverse unscaled
    let scale = 1.0 / fft_len as f32;
    a[..out_len].iter().map(|c| c.re * scale).collect()
}
