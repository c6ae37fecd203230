//! The assembled machine: CPU driving the bus with PPU, APU, cartridge and controllers behind it.
//!
//! This is the surface a host talks to. It never blocks: audio comes out through a
//! [`SampleConsumer`] the host drains on its own thread, video through [`Console::frame`].

use std::path::Path;

use log::info;

use crate::apu::apu::APU;
use crate::apu::ring_buffer::SampleConsumer;
use crate::bus::NesBus;
use crate::cartridge::cartridge::Cartridge;
use crate::config::EmulatorConfig;
use crate::cpu::cpu::CPU;
use crate::error::{LoadError, StateError};
use crate::ppu::ppu::PPU;
use crate::savestate::MachineState;

pub struct Console {
    cpu: CPU<NesBus>,
}

impl Console {
    /// Power on with `cart` inserted; the CPU starts from the reset vector.
    pub fn new(cart: Cartridge, config: &EmulatorConfig) -> Self {
        let bus = NesBus::new(cart, config);
        let mut cpu = CPU::new(bus);
        cpu.trace_enabled = config.trace;
        cpu.reset();
        Self { cpu }
    }

    pub fn from_rom_bytes(bytes: &[u8], config: &EmulatorConfig) -> Result<Self, LoadError> {
        Ok(Self::new(Cartridge::from_bytes(bytes)?, config))
    }

    pub fn from_path(path: impl AsRef<Path>, config: &EmulatorConfig) -> Result<Self, LoadError> {
        Ok(Self::new(Cartridge::from_path(path)?, config))
    }

    pub fn cpu(&self) -> &CPU<NesBus> {
        &self.cpu
    }

    pub fn cpu_mut(&mut self) -> &mut CPU<NesBus> {
        &mut self.cpu
    }

    pub fn ppu(&self) -> &PPU {
        &self.cpu.bus.ppu
    }

    pub fn cartridge(&self) -> &Cartridge {
        &self.cpu.bus.cart
    }

    pub fn cartridge_mut(&mut self) -> &mut Cartridge {
        &mut self.cpu.bus.cart
    }

    /// True after a JAM opcode.
    pub fn halted(&self) -> bool {
        self.cpu.halted
    }

    /// One instruction (or interrupt entry). Returns CPU cycles elapsed.
    pub fn step(&mut self) -> usize {
        self.cpu.step()
    }

    /// Run until the PPU finishes a picture (start of vblank) or the CPU halts. Returns CPU cycles.
    pub fn step_frame(&mut self) -> usize {
        let mut cycles = 0;
        loop {
            let elapsed = self.cpu.step();
            cycles += elapsed;
            if self.cpu.bus.frame_ready() {
                self.cpu.bus.clear_frame_ready();
                break;
            }
            if elapsed == 0 {
                break;
            }
        }
        cycles
    }

    /// Press the reset button. RAM, cartridge and controller state survive.
    pub fn reset(&mut self) {
        info!("Console reset");
        self.cpu.bus.reset();
        self.cpu.reset();
    }

    /// Last picture as palette indices, 256×240.
    pub fn frame(&self) -> &[u8] {
        self.cpu.bus.ppu.frame()
    }

    /// Last picture as 0xRRGGBB.
    pub fn frame_rgb(&self, out: &mut [u32]) {
        self.cpu.bus.ppu.frame_rgb(out);
    }

    /// Set the held buttons (see [`crate::controller::Button`]) for port 0 or 1.
    pub fn set_buttons(&mut self, port: usize, buttons: u8) {
        if let Some(controller) = self.cpu.bus.controllers.get_mut(port) {
            controller.buttons = buttons;
        }
    }

    /// Audio samples for another thread to drain.
    pub fn audio(&self) -> SampleConsumer<f32> {
        self.cpu.bus.apu.samples()
    }

    /// nestest-style trace line for the next instruction.
    pub fn trace(&self) -> String {
        self.cpu.trace()
    }

    /// Snapshot the whole machine. Call between steps only.
    pub fn save_state(&self) -> Result<Vec<u8>, StateError> {
        let state = MachineState {
            cpu: self.cpu.save_state(),
            ppu: self.cpu.bus.ppu.save_state(),
            apu: self.cpu.bus.apu.save_state(),
            bus: self.cpu.bus.save_state(),
            mapper: self.cpu.bus.cart.save_state(),
        };
        let bytes = state.encode()?;
        info!("Saved state ({} bytes)", bytes.len());
        Ok(bytes)
    }

    /// Restore a snapshot. Nothing changes unless the whole snapshot is accepted.
    pub fn load_state(&mut self, bytes: &[u8]) -> Result<(), StateError> {
        let state = MachineState::decode(bytes)?;
        PPU::validate_state(&state.ppu)?;
        NesBus::validate_state(&state.bus)?;
        APU::validate_state(&state.apu)?;

        let bus = &mut self.cpu.bus;
        let backup = bus.cart.save_state();
        if let Err(e) = bus.cart.load_state(state.mapper) {
            bus.cart.load_state(backup)?;
            return Err(e);
        }
        bus.ppu.load_state(state.ppu)?;
        bus.load_state(state.bus)?;
        bus.apu.load_state(state.apu)?;
        self.cpu.load_state(state.cpu);
        info!("Loaded state ({} bytes)", bytes.len());
        Ok(())
    }
}
