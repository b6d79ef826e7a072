//! Command-line argument parsing.

use clap::Parser;

use crankbox::params::RecordingConfig;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "Crankbox")]
#[command(about = "Hand-cranked music box synthesizer", long_about = None)]
pub struct Args {
    /// Record the live session audio to WAV (duration in seconds)
    #[arg(long, value_name = "SECONDS")]
    pub record: Option<f32>,

    /// Render a simulated crank session to WAV and exit, no window or audio
    /// device needed (duration in seconds)
    #[arg(long, value_name = "SECONDS")]
    pub offline: Option<f32>,

    /// Crank speed for offline rendering (degrees per second)
    #[arg(long, value_name = "DEG_PER_S", default_value = "180")]
    pub crank_speed: f32,

    /// Rewind the melody to its first note when the box is reset
    #[arg(long)]
    pub rewind_on_reset: bool,
}

impl Args {
    /// Create recording configuration if recording mode is enabled
    pub fn create_recording_config(&self) -> Option<RecordingConfig> {
        self.record.map(RecordingConfig::new)
    }

    /// Recording configuration for the offline render, kept apart from live
    /// captures
    pub fn create_offline_config(&self) -> Option<RecordingConfig> {
        self.offline.map(|duration| RecordingConfig {
            duration_secs: duration,
            output_dir: "offline".to_string(),
        })
    }
}
