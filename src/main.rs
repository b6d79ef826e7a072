//! Crankbox - a hand-cranked birthday music box
//!
//! Drag the pointer around the window center to turn the crank: rotation
//! advances the pinned drum, each pin triggers a synthesized note, and
//! gesture speed sets the tempo.

mod cli;

use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
use glam::Vec2;
use winit::{
    application::ApplicationHandler,
    event::*,
    event_loop::{ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

use cli::Args;
use crankbox::audio::{render_session, AudioEngine, SilentSink};
use crankbox::crank::CrankTracker;
use crankbox::melody::Melody;
use crankbox::params::{
    CrankConfig, EngineConfig, PlaybackConfig, RecordingConfig, ReverbConfig, SynthPatch,
};
use crankbox::playback::{NoteSink, PlaybackController, PlaybackEvent, RotationDirection};

/// Window dimensions (pixels)
const WINDOW_WIDTH: u32 = 800;
const WINDOW_HEIGHT: u32 = 600;

/// Timer-polling cadence for the shell's event loop (milliseconds)
const TICK_INTERVAL_MS: u64 = 16;

/// Main application state
struct App {
    window: Option<Arc<Window>>,

    // Engine, or SilentSink when no output device is available
    sink: Box<dyn NoteSink>,

    crank: CrankTracker,
    controller: PlaybackController,

    // Pointer position in physical pixels
    cursor_pos: Vec2,

    // Drum state consumed by the mechanism visuals
    drum_rotation_deg: f32,
    drum_step_deg: f32,

    recording: Option<RecordingConfig>,
}

impl App {
    fn new(args: &Args) -> Self {
        let melody = Melody::happy_birthday();
        // One full drum turn per pass through the tune
        let drum_step_deg = 360.0 / melody.len() as f32;

        let playback = PlaybackConfig {
            rewind_on_reset: args.rewind_on_reset,
            ..PlaybackConfig::default()
        };
        let controller =
            PlaybackController::new(melody, playback).expect("default playback configuration");

        Self {
            window: None,
            sink: Box::new(SilentSink),
            crank: CrankTracker::new(CrankConfig::default()),
            controller,
            cursor_pos: Vec2::ZERO,
            drum_rotation_deg: 0.0,
            drum_step_deg,
            recording: args.create_recording_config(),
        }
    }

    /// Apply controller notifications to the shell-side decoration state.
    fn handle_events(&mut self, events: &[PlaybackEvent]) {
        for event in events {
            match event {
                PlaybackEvent::NoteTriggered { direction } => {
                    let step = match direction {
                        RotationDirection::Forward => self.drum_step_deg,
                        RotationDirection::Backward => -self.drum_step_deg,
                    };
                    self.drum_rotation_deg = (self.drum_rotation_deg + step).rem_euclid(360.0);
                    println!(
                        "note {:>2}  tempo {:.2}x  drum {:>5.1} deg",
                        self.controller.cursor(),
                        self.controller.tempo(),
                        self.drum_rotation_deg
                    );
                }
                PlaybackEvent::Started => println!("Playback started"),
                PlaybackEvent::Stopped => println!("Playback stopped"),
            }
        }
    }

    fn reset(&mut self) {
        self.controller.reset();
        self.crank.end();
        self.drum_rotation_deg = 0.0;
        println!("Music box reset");
    }
}

impl ApplicationHandler for App {
    fn about_to_wait(&mut self, event_loop: &winit::event_loop::ActiveEventLoop) {
        let events = self.controller.tick(Instant::now());
        self.handle_events(&events);
        event_loop.set_control_flow(ControlFlow::WaitUntil(
            Instant::now() + Duration::from_millis(TICK_INTERVAL_MS),
        ));
    }

    fn resumed(&mut self, event_loop: &winit::event_loop::ActiveEventLoop) {
        if self.window.is_some() {
            return; // Already initialized
        }

        let window_attributes = Window::default_attributes()
            .with_title("Crankbox - Hand-Cranked Music Box")
            .with_inner_size(winit::dpi::LogicalSize::new(WINDOW_WIDTH, WINDOW_HEIGHT));

        let window = Arc::new(event_loop.create_window(window_attributes).unwrap());

        let size = window.inner_size();
        self.crank
            .set_center(Vec2::new(size.width as f32 / 2.0, size.height as f32 / 2.0));

        // The crank works either way; a missing device just means silence
        match AudioEngine::new(
            SynthPatch::default(),
            ReverbConfig::default(),
            EngineConfig::default(),
            self.recording.take(),
        ) {
            Ok(engine) => self.sink = Box::new(engine),
            Err(e) => eprintln!("Audio unavailable, cranking silently: {}", e),
        }

        println!("\nCrankbox is running!");
        println!("Drag around the window center to crank, R resets, ESC quits\n");

        self.window = Some(window);
    }

    fn window_event(
        &mut self,
        event_loop: &winit::event_loop::ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        state: ElementState::Pressed,
                        physical_key: PhysicalKey::Code(code),
                        ..
                    },
                ..
            } => match code {
                KeyCode::Escape => event_loop.exit(),
                KeyCode::KeyR => self.reset(),
                _ => {}
            },
            WindowEvent::Resized(size) => {
                self.crank
                    .set_center(Vec2::new(size.width as f32 / 2.0, size.height as f32 / 2.0));
            }
            WindowEvent::MouseInput {
                state: ElementState::Pressed,
                button: MouseButton::Left,
                ..
            } => {
                self.crank.begin(self.cursor_pos);
            }
            WindowEvent::MouseInput {
                state: ElementState::Released,
                button: MouseButton::Left,
                ..
            } => {
                self.crank.end();
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.cursor_pos = Vec2::new(position.x as f32, position.y as f32);
                if let Some(delta) = self.crank.sample(self.cursor_pos) {
                    let events =
                        self.controller
                            .on_angular_delta(delta, Instant::now(), self.sink.as_mut());
                    self.handle_events(&events);
                }
            }
            _ => {}
        }
    }
}

fn main() {
    let args = Args::parse();

    println!("Crankbox - hand-cranked music box");

    // Offline mode: no window, no device, just the pipeline into a WAV
    if let Some(offline) = args.create_offline_config() {
        println!(
            "Rendering {}s of cranking at {} deg/s to {}",
            offline.duration_secs,
            args.crank_speed,
            offline.audio_path()
        );
        let playback = PlaybackConfig {
            rewind_on_reset: args.rewind_on_reset,
            ..PlaybackConfig::default()
        };
        if let Err(e) = render_session(
            &offline,
            args.crank_speed,
            Melody::happy_birthday(),
            playback,
            SynthPatch::default(),
            ReverbConfig::default(),
            EngineConfig::default(),
        ) {
            eprintln!("Offline render failed: {}", e);
            std::process::exit(1);
        }
        println!("Done");
        return;
    }

    let mut app = App::new(&args);
    let event_loop = EventLoop::new().unwrap();
    let _ = event_loop.run_app(&mut app);
}
