//! NES APU (Audio Processing Unit) emulation.
//!
//! - **Pulse** (×2): square waves with duty, envelope, sweep, length counter.
//! - **Triangle**: 32-step wave, linear counter, length counter.
//! - **Noise**: LFSR-based, envelope, length counter.
//! - **DMC**: 1-bit delta samples fetched from CPU memory, stalling the CPU.
//! - **Frame counter**: 4-step or 5-step mode; clocks envelope/linear/length/sweep.
//! - **Mixer**: NES-style non-linear mix, resampled to the host rate into a [`ring_buffer`].

pub mod apu;
pub mod dmc;
pub mod mixer;
pub mod noise;
pub mod pulse;
pub mod ring_buffer;
pub mod triangle;
pub mod units;
