//! Desktop host for the emulator core.
//!
//! Opens a window, plays audio, and maps the keyboard to controller 1.
//! Usage: vesper path/to/game.nes
//!
//! Keys: arrows = D-pad, Z = B, X = A, Right Shift = Select, Enter = Start,
//! F5 = save state, F9 = load state, R = reset, Escape = quit.

use std::env;
use std::process;
use std::time::{Duration, Instant};

use ansi_term::Colour::Red;
use log::{info, warn};
use minifb::{Key, KeyRepeat, Window, WindowOptions};
use rodio::source::Source;
use rodio::{OutputStream, Sink};

use vesper::apu::ring_buffer::SampleConsumer;
use vesper::config::{FRAME_HEIGHT, FRAME_WIDTH};
use vesper::{Button, Console, EmulatorConfig};

/// NES runs at ~60.0988 Hz (NTSC). Target one frame per 16.67 ms for ~60 fps.
const FRAME_DURATION: Duration = Duration::from_nanos(16_666_667);

const KEYMAP: [(Key, u8); 8] = [
    (Key::X, Button::A),
    (Key::Z, Button::B),
    (Key::RightShift, Button::SELECT),
    (Key::Enter, Button::START),
    (Key::Up, Button::UP),
    (Key::Down, Button::DOWN),
    (Key::Left, Button::LEFT),
    (Key::Right, Button::RIGHT),
];

/// Pulls mixed APU output off the sample queue for rodio.
struct ApuSource {
    samples: SampleConsumer<f32>,
    sample_rate: u32,
    previous_value: f32,
}

impl Iterator for ApuSource {
    type Item = f32;

    #[inline]
    fn next(&mut self) -> Option<f32> {
        if let Some(value) = self.samples.pop() {
            self.previous_value = value;
        }
        Some(self.previous_value)
    }
}

impl Source for ApuSource {
    #[inline]
    fn current_frame_len(&self) -> Option<usize> {
        None
    }

    #[inline]
    fn channels(&self) -> u16 {
        1
    }

    #[inline]
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    #[inline]
    fn total_duration(&self) -> Option<Duration> {
        None
    }
}

fn fatal(message: impl std::fmt::Display) -> ! {
    eprintln!("{} {message}", Red.bold().paint("ERROR"));
    process::exit(1);
}

fn main() {
    env_logger::init();

    let Some(path) = env::args().nth(1) else {
        fatal("usage: vesper path/to/game.nes");
    };

    let config = EmulatorConfig {
        trace: log::log_enabled!(log::Level::Trace),
        ..EmulatorConfig::default()
    };
    let mut console = match Console::from_path(&path, &config) {
        Ok(console) => console,
        Err(e) => fatal(format!("{path}: {e}")),
    };

    // Audio is optional; the stream must outlive the loop.
    let audio = match OutputStream::try_default() {
        Ok((stream, handle)) => match Sink::try_new(&handle) {
            Ok(sink) => {
                sink.append(ApuSource {
                    samples: console.audio(),
                    sample_rate: config.sample_rate,
                    previous_value: 0.0,
                });
                Some((stream, sink))
            }
            Err(e) => {
                warn!("No audio sink: {e}");
                None
            }
        },
        Err(e) => {
            warn!("No audio device: {e}");
            None
        }
    };

    let mut window = Window::new(
        "Vesper",
        FRAME_WIDTH,
        FRAME_HEIGHT,
        WindowOptions {
            borderless: true,
            resize: true,
            scale: minifb::Scale::FitScreen,
            scale_mode: minifb::ScaleMode::AspectRatioStretch,
            topmost: true,
            title: false,
            transparency: false,
            none: false,
        },
    )
    .unwrap_or_else(|e| fatal(format!("failed to create window: {e}")));

    window.set_target_fps(60);

    let mut pixels = vec![0u32; FRAME_WIDTH * FRAME_HEIGHT];
    let mut snapshot: Option<Vec<u8>> = None;

    while window.is_open() && !window.is_key_down(Key::Escape) {
        let frame_start = Instant::now();

        let buttons = KEYMAP
            .iter()
            .filter(|(key, _)| window.is_key_down(*key))
            .fold(0, |acc, (_, bit)| acc | bit);
        console.set_buttons(0, buttons);

        if window.is_key_pressed(Key::R, KeyRepeat::No) {
            console.reset();
        }
        if window.is_key_pressed(Key::F5, KeyRepeat::No) {
            match console.save_state() {
                Ok(bytes) => snapshot = Some(bytes),
                Err(e) => warn!("Save state failed: {e}"),
            }
        }
        if window.is_key_pressed(Key::F9, KeyRepeat::No) {
            if let Some(bytes) = &snapshot {
                if let Err(e) = console.load_state(bytes) {
                    warn!("Load state failed: {e}");
                }
            }
        }

        console.step_frame();
        if console.halted() {
            info!("CPU halted at {:04X}", console.cpu().pc);
            break;
        }

        console.frame_rgb(&mut pixels);
        if let Err(e) = window.update_with_buffer(&pixels, FRAME_WIDTH, FRAME_HEIGHT) {
            fatal(format!("failed to update window: {e}"));
        }

        // Pace to ~60 fps so we don't burn CPU (emulation is far faster than real NES)
        let elapsed = frame_start.elapsed();
        if elapsed < FRAME_DURATION {
            std::thread::sleep(FRAME_DURATION - elapsed);
        }
    }

    drop(audio);
}
