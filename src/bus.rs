//! Memory bus and address decoding for the NES.
//!
//! Implements the [CPU memory map](https://www.nesdev.org/wiki/CPU_memory_map): 2 KiB RAM mirrored
//! to $1FFF, PPU registers mirrored every 8 bytes to $3FFF, APU and I/O at $4000–$401F, cartridge
//! from $4020. Each CPU cycle steps the PPU three times, the APU once and the board logic once.
//! Addresses nothing answers return the last value seen on the data bus.

use log::trace;
use serde::{Deserialize, Serialize};

use crate::apu::apu::APU;
use crate::apu::dmc::DmcPort;
use crate::cartridge::cartridge::Cartridge;
use crate::config::EmulatorConfig;
use crate::controller::Controller;
use crate::error::StateError;
use crate::ppu::ppu::PPU;

const RAM_SIZE: usize = 0x0800;

/// OAM DMA: one alignment cycle plus 256 read/write pairs; one more when $4014 is written on an
/// odd cycle.
const OAM_DMA_CYCLES: usize = 513;

/// Trait for memory-mapped I/O and bus access used by the CPU.
pub trait Bus {
    fn read(&mut self, addr: u16) -> u8;
    fn write(&mut self, addr: u16, data: u8);

    /// Side-effect-free read for traces and debuggers.
    fn peek(&self, addr: u16) -> u8;

    /// Advance everything on the bus by `cycles` CPU cycles.
    fn tick(&mut self, _cycles: usize) {}

    /// Take a pending NMI edge.
    fn poll_nmi(&mut self) -> bool {
        false
    }

    /// Level of the shared IRQ line.
    fn irq_line(&self) -> bool {
        false
    }

    /// CPU cycles stolen by DMA since the last call.
    fn take_stall(&mut self) -> usize {
        0
    }

    /// PPU (scanline, dot), for the trace.
    fn ppu_position(&self) -> (u16, u16) {
        (0, 0)
    }
}

/// Saved bus state. PPU, APU and cartridge are saved separately.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BusState {
    pub ram: Vec<u8>,
    pub controllers: [Controller; 2],
    pub open_bus: u8,
    pub cycles: u64,
    pub stall: usize,
}

/// What the DMC sees of the bus while the APU is being stepped.
struct DmcBus<'a> {
    ram: &'a [u8; RAM_SIZE],
    cart: &'a Cartridge,
    open_bus: u8,
    stall: &'a mut usize,
}

impl DmcPort for DmcBus<'_> {
    fn read(&mut self, addr: u16) -> u8 {
        match addr {
            0x0000..=0x1FFF => self.ram[(addr & 0x07FF) as usize],
            0x6000..=0xFFFF => self.cart.read(addr),
            _ => self.open_bus,
        }
    }

    fn stall(&mut self, cycles: usize) {
        *self.stall += cycles;
    }
}

/// Main NES bus: RAM, PPU, APU, cartridge, and both controller ports.
pub struct NesBus {
    pub ram: [u8; RAM_SIZE],
    pub cart: Cartridge,
    pub ppu: PPU,
    pub apu: APU,
    pub controllers: [Controller; 2],
    /// Last byte driven on the CPU data bus.
    open_bus: u8,
    /// CPU cycles elapsed; parity decides OAM DMA length.
    cycles: u64,
    /// Cycles the CPU owes to DMA.
    stall: usize,
    /// $4014 was written during the instruction being executed; its stall is charged on the tick.
    dma_pending: bool,
}

impl NesBus {
    pub fn new(cart: Cartridge, config: &EmulatorConfig) -> Self {
        Self {
            ram: [0; RAM_SIZE],
            cart,
            ppu: PPU::new(),
            apu: APU::new(config),
            controllers: [Controller::new(), Controller::new()],
            open_bus: 0,
            cycles: 0,
            stall: 0,
            dma_pending: false,
        }
    }

    /// True once the PPU has entered vblank; the frame buffer holds a complete picture.
    pub fn frame_ready(&self) -> bool {
        self.ppu.frame_complete
    }

    /// Clear the frame latch after presenting.
    pub fn clear_frame_ready(&mut self) {
        self.ppu.frame_complete = false;
    }

    /// Reset line as seen by the chips behind the bus. RAM and the cartridge keep their contents.
    pub fn reset(&mut self) {
        self.ppu.reset();
        self.apu.reset();
        self.stall = 0;
        self.dma_pending = false;
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// $4014: copy a 256-byte CPU page into OAM through OAMDATA.
    fn oam_dma(&mut self, page: u8) {
        let base = (page as u16) << 8;
        for i in 0..256u16 {
            let byte = self.read(base | i);
            self.ppu.write_oam(byte);
        }
        self.dma_pending = true;
    }

    pub fn save_state(&self) -> BusState {
        BusState {
            ram: self.ram.to_vec(),
            controllers: self.controllers.clone(),
            open_bus: self.open_bus,
            cycles: self.cycles,
            stall: self.stall,
        }
    }

    pub fn validate_state(state: &BusState) -> Result<(), StateError> {
        if state.ram.len() != RAM_SIZE {
            return Err(StateError::SizeMismatch("ram"));
        }
        Ok(())
    }

    pub fn load_state(&mut self, state: BusState) -> Result<(), StateError> {
        Self::validate_state(&state)?;
        self.ram.copy_from_slice(&state.ram);
        self.controllers = state.controllers;
        self.open_bus = state.open_bus;
        self.cycles = state.cycles;
        self.stall = state.stall;
        Ok(())
    }
}

impl Bus for NesBus {
    fn read(&mut self, addr: u16) -> u8 {
        let value = match addr {
            // Internal RAM (mirrored 4x in 0x0000-0x1FFF)
            0x0000..=0x1FFF => self.ram[(addr & 0x07FF) as usize],
            // PPU registers $2000-$3FFF (mirrored every 8 bytes)
            0x2000..=0x3FFF => self.ppu.read_register(&mut self.cart, addr),
            // APU status is internal to the 2A03 and does not drive the external bus.
            0x4015 => return self.apu.read_status(self.open_bus),
            0x4016 => self.controllers[0].read() | (self.open_bus & 0xE0),
            0x4017 => self.controllers[1].read() | (self.open_bus & 0xE0),
            0x6000..=0xFFFF => self.cart.read(addr),
            // Write-only APU registers, test-mode registers, expansion area
            _ => self.open_bus,
        };
        self.open_bus = value;
        value
    }

    fn write(&mut self, addr: u16, data: u8) {
        self.open_bus = data;
        match addr {
            0x0000..=0x1FFF => self.ram[(addr & 0x07FF) as usize] = data,
            0x2000..=0x3FFF => self.ppu.write_register(&mut self.cart, addr, data),
            0x4014 => self.oam_dma(data),
            0x4016 => {
                self.controllers[0].write(data);
                self.controllers[1].write(data);
            }
            0x4000..=0x4013 | 0x4015 | 0x4017 => self.apu.write(addr, data),
            0x6000..=0xFFFF => self.cart.write(addr, data),
            _ => trace!("write {data:#04X} to unmapped {addr:#06X}"),
        }
    }

    fn peek(&self, addr: u16) -> u8 {
        match addr {
            0x0000..=0x1FFF => self.ram[(addr & 0x07FF) as usize],
            0x2000..=0x3FFF => self.ppu.peek_register(addr),
            0x6000..=0xFFFF => self.cart.read(addr),
            _ => self.open_bus,
        }
    }

    fn tick(&mut self, cycles: usize) {
        // The $4014 write is the last cycle of the instruction being ticked.
        if std::mem::take(&mut self.dma_pending) {
            let write_cycle = (self.cycles + cycles as u64).saturating_sub(1);
            self.stall += OAM_DMA_CYCLES + (write_cycle & 1) as usize;
        }
        for _ in 0..cycles {
            for _ in 0..3 {
                self.ppu.step(&mut self.cart);
            }
            let mut port = DmcBus {
                ram: &self.ram,
                cart: &self.cart,
                open_bus: self.open_bus,
                stall: &mut self.stall,
            };
            self.apu.step(&mut port);
            self.cart.step();
            self.cycles += 1;
        }
    }

    fn poll_nmi(&mut self) -> bool {
        self.ppu.poll_nmi()
    }

    fn irq_line(&self) -> bool {
        self.apu.irq() || self.cart.irq()
    }

    fn take_stall(&mut self) -> usize {
        std::mem::take(&mut self.stall)
    }

    fn ppu_position(&self) -> (u16, u16) {
        (self.ppu.scanline, self.ppu.dot)
    }
}
