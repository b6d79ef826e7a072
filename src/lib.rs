//! Crankbox library - hand-cranked music box engine

pub mod audio;
pub mod crank;
pub mod melody;
pub mod params;
pub mod playback;
pub mod synth;
