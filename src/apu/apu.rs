//! NES APU (Audio Processing Unit) implementation.
//!
//! Implements the [APU](https://www.nesdev.org/wiki/APU) as in the Ricoh 2A03: five channels (pulse×2,
//! triangle, noise, DMC), [frame counter](https://www.nesdev.org/wiki/APU_Frame_Counter) (4-step or
//! 5-step), and [APU Mixer](https://www.nesdev.org/wiki/APU_Mixer) (non-linear). Registers $4000–$4013,
//! $4015, $4017. See [APU registers](https://www.nesdev.org/wiki/APU_registers).
//!
//! ## Timing
//!
//! - Pulse: timer clocked every 2 CPU cycles (APU "half cycle").
//! - Triangle, noise, DMC: timers counted in CPU cycles. Length/envelope/sweep clocked by the frame
//!   counter (~240 Hz).
//! - One output sample every `CPU_FREQUENCY / sample_rate` CPU cycles, kept fractional.

use log::trace;
use serde::{Deserialize, Serialize};

use crate::apu::dmc::{Dmc, DmcPort};
use crate::apu::mixer::mix;
use crate::apu::noise::Noise;
use crate::apu::pulse::Pulse;
use crate::apu::ring_buffer::{SampleBuffer, SampleConsumer, SampleProducer};
use crate::apu::triangle::Triangle;
use crate::config::EmulatorConfig;
use crate::error::StateError;

/// Quarter-frame points of the sequencer, in CPU cycles since the last reset.
const STEP1: u32 = 7457;
const STEP2: u32 = 14913;
const STEP3: u32 = 22371;
/// 4-step: half frame and IRQ (if not inhibited); the sequence restarts on the next cycle.
const STEP4: u32 = 29829;
/// 5-step: last quarter/half frame, no IRQ.
const STEP5: u32 = 37281;

/// Saved APU state. The channel structs double as their own snapshots.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ApuState {
    pub pulse1: Pulse,
    pub pulse2: Pulse,
    pub triangle: Triangle,
    pub noise: Noise,
    pub dmc: Dmc,
    pub frame_cycle: u32,
    pub five_step: bool,
    pub irq_inhibit: bool,
    pub frame_irq: bool,
    pub odd_cycle: bool,
    pub sample_phase: f64,
}

/// APU state: pulse×2, triangle, noise, DMC; frame counter; output sample queue.
/// `step` advances one CPU cycle.
pub struct APU {
    pulse1: Pulse,
    pulse2: Pulse,
    triangle: Triangle,
    noise: Noise,
    dmc: Dmc,
    frame_cycle: u32,
    five_step: bool,
    irq_inhibit: bool,
    frame_irq: bool,
    /// Pulse timers run on odd cycles.
    odd_cycle: bool,
    sample_phase: f64,
    cycles_per_sample: f64,
    volume: f32,
    producer: SampleProducer<f32>,
    consumer: SampleConsumer<f32>,
}

impl APU {
    pub fn new(config: &EmulatorConfig) -> Self {
        let (producer, consumer) = SampleBuffer::new(config.audio_buffer_len).split();
        Self {
            pulse1: Pulse::first(),
            pulse2: Pulse::second(),
            triangle: Triangle::default(),
            noise: Noise::default(),
            dmc: Dmc::default(),
            frame_cycle: 0,
            five_step: false,
            irq_inhibit: false,
            frame_irq: false,
            odd_cycle: false,
            sample_phase: 0.0,
            cycles_per_sample: config.cycles_per_sample(),
            volume: config.volume.clamp(0.0, 1.0),
            producer,
            consumer,
        }
    }

    /// Handle for the host audio thread.
    pub fn samples(&self) -> SampleConsumer<f32> {
        self.consumer.clone()
    }

    /// Write to APU registers. $4000–$4013 = channel regs; $4015 = enable; $4017 = frame counter
    /// (mode 4/5-step, IRQ inhibit). Writing $4017 resets the frame counter.
    pub fn write(&mut self, addr: u16, data: u8) {
        match addr {
            0x4000..=0x4003 => self.pulse1.write(addr, data),
            0x4004..=0x4007 => self.pulse2.write(addr, data),
            0x4008..=0x400B => self.triangle.write(addr, data),
            0x400C..=0x400F => self.noise.write(addr, data),
            0x4010..=0x4013 => self.dmc.write(addr, data),
            0x4015 => {
                self.pulse1.length.set_enabled(data & 0x01 != 0);
                self.pulse2.length.set_enabled(data & 0x02 != 0);
                self.triangle.length.set_enabled(data & 0x04 != 0);
                self.noise.length.set_enabled(data & 0x08 != 0);
                self.dmc.set_enabled(data & 0x10 != 0);
            }
            0x4017 => {
                self.five_step = data & 0x80 != 0;
                self.irq_inhibit = data & 0x40 != 0;
                self.frame_cycle = 0;
                if self.irq_inhibit {
                    self.frame_irq = false;
                }
                // Selecting 5-step mode clocks a quarter and half frame immediately.
                if self.five_step {
                    self.clock_quarter_frame();
                    self.clock_half_frame();
                }
            }
            _ => trace!("write to unmapped APU register {addr:#06X}"),
        }
    }

    /// Read $4015: bits 0–3 = length counter > 0 for pulse1, pulse2, triangle, noise; bit 4 = DMC
    /// has bytes remaining; bit 6 = frame IRQ; bit 7 = DMC IRQ. Reading clears the frame IRQ.
    /// Bit 5 is open bus.
    pub fn read_status(&mut self, open_bus: u8) -> u8 {
        let mut status = open_bus & 0x20;
        if self.pulse1.length.active() {
            status |= 0x01;
        }
        if self.pulse2.length.active() {
            status |= 0x02;
        }
        if self.triangle.length.active() {
            status |= 0x04;
        }
        if self.noise.length.active() {
            status |= 0x08;
        }
        if self.dmc.active() {
            status |= 0x10;
        }
        if self.frame_irq {
            status |= 0x40;
        }
        if self.dmc.irq_pending {
            status |= 0x80;
        }
        self.frame_irq = false;
        status
    }

    /// Level of the APU's IRQ output (frame counter or DMC).
    pub fn irq(&self) -> bool {
        self.frame_irq || self.dmc.irq_pending
    }

    /// Quarter-frame: clock envelope (pulse, noise) and triangle linear counter.
    fn clock_quarter_frame(&mut self) {
        self.pulse1.envelope.clock();
        self.pulse2.envelope.clock();
        self.noise.envelope.clock();
        self.triangle.clock_linear();
    }

    /// Half-frame: clock length counters and sweep units.
    fn clock_half_frame(&mut self) {
        self.pulse1.length.clock();
        self.pulse2.length.clock();
        self.triangle.length.clock();
        self.noise.length.clock();
        self.pulse1.clock_sweep();
        self.pulse2.clock_sweep();
    }

    fn clock_frame_counter(&mut self) {
        self.frame_cycle += 1;
        match self.frame_cycle {
            STEP1 | STEP3 => self.clock_quarter_frame(),
            STEP2 => {
                self.clock_quarter_frame();
                self.clock_half_frame();
            }
            STEP4 if !self.five_step => {
                self.clock_quarter_frame();
                self.clock_half_frame();
                if !self.irq_inhibit {
                    self.frame_irq = true;
                }
            }
            STEP5 if self.five_step => {
                self.clock_quarter_frame();
                self.clock_half_frame();
            }
            _ => {}
        }
        let period = if self.five_step { STEP5 } else { STEP4 };
        if self.frame_cycle > period {
            self.frame_cycle = 0;
        }
    }

    /// Advance one CPU cycle: frame counter, channel timers, DMC memory reader, and resampling.
    pub fn step(&mut self, port: &mut impl DmcPort) {
        self.clock_frame_counter();

        if self.odd_cycle {
            self.pulse1.clock_timer();
            self.pulse2.clock_timer();
        }
        self.odd_cycle = !self.odd_cycle;
        self.triangle.clock_timer();
        self.noise.clock_timer();
        self.dmc.step(port);

        self.sample_phase += 1.0;
        if self.sample_phase >= self.cycles_per_sample {
            self.sample_phase -= self.cycles_per_sample;
            // A full queue drops the sample; the machine clock never waits on the host.
            self.producer.push(self.output());
        }
    }

    /// Current mixed output, scaled by the master volume.
    pub fn output(&self) -> f32 {
        mix(
            self.pulse1.output(),
            self.pulse2.output(),
            self.triangle.output(),
            self.noise.output(),
            self.dmc.output(),
        ) * self.volume
    }

    /// Reset line: silence every channel and restart the frame counter. The frame mode survives.
    pub fn reset(&mut self) {
        self.write(0x4015, 0);
        self.dmc.irq_pending = false;
        self.frame_irq = false;
        self.frame_cycle = 0;
        self.consumer.clear();
    }

    pub fn save_state(&self) -> ApuState {
        ApuState {
            pulse1: self.pulse1.clone(),
            pulse2: self.pulse2.clone(),
            triangle: self.triangle.clone(),
            noise: self.noise.clone(),
            dmc: self.dmc.clone(),
            frame_cycle: self.frame_cycle,
            five_step: self.five_step,
            irq_inhibit: self.irq_inhibit,
            frame_irq: self.frame_irq,
            odd_cycle: self.odd_cycle,
            sample_phase: self.sample_phase,
        }
    }

    /// Check every channel and the frame counter before anything is restored.
    pub fn validate_state(state: &ApuState) -> Result<(), StateError> {
        state.pulse1.validate()?;
        state.pulse2.validate()?;
        state.triangle.validate()?;
        state.noise.validate()?;
        state.dmc.validate()?;
        if state.frame_cycle > STEP5 {
            return Err(StateError::OutOfRange("frame counter"));
        }
        if !state.sample_phase.is_finite() || state.sample_phase < 0.0 {
            return Err(StateError::OutOfRange("sample phase"));
        }
        Ok(())
    }

    pub fn load_state(&mut self, state: ApuState) -> Result<(), StateError> {
        Self::validate_state(&state)?;
        self.pulse1 = state.pulse1;
        self.pulse2 = state.pulse2;
        self.triangle = state.triangle;
        self.noise = state.noise;
        self.dmc = state.dmc;
        self.frame_cycle = state.frame_cycle;
        self.five_step = state.five_step;
        self.irq_inhibit = state.irq_inhibit;
        self.frame_irq = state.frame_irq;
        self.odd_cycle = state.odd_cycle;
        self.sample_phase = state.sample_phase;
        self.consumer.clear();
        Ok(())
    }
}
