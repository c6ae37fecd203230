//! Machine constants and host-tunable emulator settings.
//!
//! Values follow the NTSC console: [Cycle reference chart](https://www.nesdev.org/wiki/Cycle_reference_chart).

use serde::{Deserialize, Serialize};

/// NTSC CPU clock in Hz.
pub const CPU_FREQUENCY: f64 = 1_789_773.0;

/// Visible picture size.
pub const FRAME_WIDTH: usize = 256;
pub const FRAME_HEIGHT: usize = 240;

/// PRG ROM is sized in 16 KiB chunks, CHR ROM in 8 KiB chunks (iNES header bytes 4 and 5).
pub const PRG_CHUNK_SIZE: usize = 0x4000;
pub const CHR_CHUNK_SIZE: usize = 0x2000;

/// Battery/work RAM at $6000–$7FFF.
pub const SRAM_SIZE: usize = 0x2000;

/// Settings a host may tune. Persisting them is the host's business.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EmulatorConfig {
    /// Host audio sample rate in Hz.
    pub sample_rate: u32,
    /// Capacity of the audio ring buffer, in samples.
    pub audio_buffer_len: usize,
    /// Master volume, 0.0..=1.0.
    pub volume: f32,
    /// Emit a nestest-style line per instruction at `trace` log level.
    pub trace: bool,
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            audio_buffer_len: 8192,
            volume: 1.0,
            trace: false,
        }
    }
}

impl EmulatorConfig {
    /// CPU cycles between two output samples.
    pub fn cycles_per_sample(&self) -> f64 {
        CPU_FREQUENCY / self.sample_rate.max(1) as f64
    }
}
