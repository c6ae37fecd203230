//! NES PPU (Picture Processing Unit) implementation.
//!
//! A dot-stepped 2C02: 341 dots per scanline, 262 scanlines per frame (0–239 visible, 240
//! post-render, 241–260 vblank, 261 pre-render). Background tiles are fetched through the
//! [8-dot pipeline](https://www.nesdev.org/wiki/PPU_rendering) into a shift buffer, sprites are
//! evaluated at dot 257 and their patterns fetched during dots 257–320, and each visible dot
//! writes one palette index into the frame buffer. Registers: $2000–$2007 (mirrored).
//!
//! The position (`scanline`, `dot`) is the next dot to be processed, which is also the number of
//! dots already elapsed on the current line.

use log::trace;
use serde::{Deserialize, Serialize};

use crate::cartridge::cartridge::Cartridge;
use crate::config::{FRAME_HEIGHT, FRAME_WIDTH};
use crate::error::StateError;
use crate::ppu::palette::{PaletteRam, rgb};
use crate::ppu::registers::*;

/// OAM (Object Attribute Memory): 64 sprites × 4 bytes. Each entry: Y, tile, attr, X.
pub const OAM_LEN: usize = 256;

pub const DOTS_PER_SCANLINE: u16 = 341;
pub const SCANLINES_PER_FRAME: u16 = 262;
pub const VBLANK_SCANLINE: u16 = 241;
pub const PRE_RENDER_SCANLINE: u16 = 261;

/// Dots an undriven open-bus latch holds its value before reading back as zero. Roughly one frame.
const OPEN_BUS_DECAY_DOTS: u32 = DOTS_PER_SCANLINE as u32 * SCANLINES_PER_FRAME as u32;

/// Last dot of line 241 at which a $2002 read still cancels the NMI.
const NMI_CANCEL_LAST_DOT: u16 = 3;

/// 4 KiB of nametable RAM: the console's 2 KiB plus room for four-screen boards.
const NAMETABLE_LEN: usize = 0x1000;

/// A sprite selected for the next scanline.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SpriteSlot {
    /// Eight 4-bit pixels (palette bits + pattern bits), leftmost in the high nibble.
    pub pattern: u32,
    pub x: u8,
    /// Drawn behind opaque background.
    pub behind: bool,
    pub oam_index: u8,
    tile: u8,
    attr: u8,
    row: u8,
}

/// Saved PPU state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PpuState {
    pub scanline: u16,
    pub dot: u16,
    pub odd_frame: bool,
    pub frame_count: u64,
    pub ctrl: u8,
    pub mask: u8,
    pub status: u8,
    pub loopy: Loopy,
    pub read_buffer: u8,
    pub open_bus: u8,
    pub open_bus_decay: u32,
    pub oam: Vec<u8>,
    pub oam_addr: u8,
    pub nametables: Vec<u8>,
    pub palette: [u8; 32],
    pub nt_byte: u8,
    pub at_bits: u8,
    pub pattern_lo: u8,
    pub pattern_hi: u8,
    pub tile_data: u64,
    pub sprites: Vec<SpriteSlot>,
    pub sprite_count: u8,
    pub nmi_pending: bool,
    pub suppress_vblank: bool,
    pub frame: Vec<u8>,
}

/// PPU state: timing, VRAM, nametables, palettes, OAM, rendering pipeline, and frame buffer.
pub struct PPU {
    pub scanline: u16,
    pub dot: u16,
    odd_frame: bool,
    /// Incremented at the start of every vblank.
    pub frame_count: u64,
    /// Set at the start of vblank; the console clears it after presenting.
    pub frame_complete: bool,
    ctrl: u8,
    mask: u8,
    /// PPUSTATUS bits 5–7 only.
    status: u8,
    loopy: Loopy,
    /// $2007 read buffer.
    read_buffer: u8,
    open_bus: u8,
    open_bus_decay: u32,
    oam: [u8; OAM_LEN],
    oam_addr: u8,
    nametables: [u8; NAMETABLE_LEN],
    palette: PaletteRam,
    // Background pipeline latches.
    nt_byte: u8,
    at_bits: u8,
    pattern_lo: u8,
    pattern_hi: u8,
    /// Two tiles of 4-bit pixels; the upper 32 bits are being drawn.
    tile_data: u64,
    sprites: [SpriteSlot; 8],
    sprite_count: u8,
    /// NMI edge waiting for the CPU.
    nmi_pending: bool,
    /// A $2002 read just before vblank cancels this frame's flag and NMI.
    suppress_vblank: bool,
    /// 256×240 palette indices, row-major.
    frame: Vec<u8>,
}

impl Default for PPU {
    fn default() -> Self {
        Self::new()
    }
}

impl PPU {
    /// Power-on state: scanline 0, dot 0, rendering disabled.
    pub fn new() -> Self {
        Self {
            scanline: 0,
            dot: 0,
            odd_frame: false,
            frame_count: 0,
            frame_complete: false,
            ctrl: 0,
            mask: 0,
            status: 0,
            loopy: Loopy::default(),
            read_buffer: 0,
            open_bus: 0,
            open_bus_decay: 0,
            oam: [0; OAM_LEN],
            oam_addr: 0,
            nametables: [0; NAMETABLE_LEN],
            palette: PaletteRam::default(),
            nt_byte: 0,
            at_bits: 0,
            pattern_lo: 0,
            pattern_hi: 0,
            tile_data: 0,
            sprites: [SpriteSlot::default(); 8],
            sprite_count: 0,
            nmi_pending: false,
            suppress_vblank: false,
            frame: vec![0; FRAME_WIDTH * FRAME_HEIGHT],
        }
    }

    /// Reset line: PPUCTRL, PPUMASK, the write toggle and the read buffer clear. The dot counter
    /// keeps running where it was.
    pub fn reset(&mut self) {
        self.ctrl = 0;
        self.mask = 0;
        self.loopy.w = false;
        self.loopy.t = 0;
        self.loopy.fine_x = 0;
        self.read_buffer = 0;
        self.nmi_pending = false;
    }

    /// Frame buffer of palette indices (256×240).
    pub fn frame(&self) -> &[u8] {
        &self.frame
    }

    /// Convert the frame buffer to 0xRRGGBB pixels.
    pub fn frame_rgb(&self, out: &mut [u32]) {
        for (dst, &index) in out.iter_mut().zip(self.frame.iter()) {
            *dst = rgb(index);
        }
    }

    /// Take the pending NMI edge, if any. The edge raised at (241,1) stays invisible to the CPU
    /// until dot 4, while a $2002 read can still cancel it.
    pub fn poll_nmi(&mut self) -> bool {
        if self.scanline == VBLANK_SCANLINE && self.dot <= NMI_CANCEL_LAST_DOT {
            return false;
        }
        std::mem::take(&mut self.nmi_pending)
    }

    pub fn ctrl(&self) -> u8 {
        self.ctrl
    }

    pub fn mask(&self) -> u8 {
        self.mask
    }

    pub fn oam(&self) -> &[u8] {
        &self.oam
    }

    fn rendering_enabled(&self) -> bool {
        self.mask & (MASK_BG | MASK_SPRITES) != 0
    }

    fn on_render_line(&self) -> bool {
        self.scanline < 240 || self.scanline == PRE_RENDER_SCANLINE
    }

    fn sprite_height(&self) -> u8 {
        if self.ctrl & CTRL_SPRITE_16 != 0 { 16 } else { 8 }
    }

    fn drive_open_bus(&mut self, value: u8) {
        self.open_bus = value;
        self.open_bus_decay = OPEN_BUS_DECAY_DOTS;
    }

    // ---------------------------------------------------------------------------------------------
    // PPU address space
    // ---------------------------------------------------------------------------------------------

    fn read_vram(&mut self, cart: &mut Cartridge, addr: u16) -> u8 {
        let addr = addr & 0x3FFF;
        match addr {
            0x0000..=0x1FFF => {
                cart.on_ppu_address(addr);
                cart.read(addr)
            }
            0x2000..=0x3EFF => self.nametables[cart.mirroring().nametable_offset(addr)],
            _ => self.palette.read(addr),
        }
    }

    fn write_vram(&mut self, cart: &mut Cartridge, addr: u16, data: u8) {
        let addr = addr & 0x3FFF;
        match addr {
            0x0000..=0x1FFF => {
                cart.on_ppu_address(addr);
                cart.write(addr, data);
            }
            0x2000..=0x3EFF => self.nametables[cart.mirroring().nametable_offset(addr)] = data,
            _ => self.palette.write(addr, data),
        }
    }

    // ---------------------------------------------------------------------------------------------
    // CPU-facing registers
    // ---------------------------------------------------------------------------------------------

    /// Read $2000–$2007 (already mirrored down by the caller or not; only the low 3 bits matter).
    pub fn read_register(&mut self, cart: &mut Cartridge, addr: u16) -> u8 {
        match addr & 7 {
            2 => self.read_status(),
            4 => {
                let mut value = self.oam[self.oam_addr as usize];
                if self.oam_addr & 3 == 2 {
                    value &= 0xE3;
                }
                self.drive_open_bus(value);
                value
            }
            7 => self.read_data(cart),
            _ => self.open_bus,
        }
    }

    /// Side-effect-free view of a register, for debuggers and traces.
    pub fn peek_register(&self, addr: u16) -> u8 {
        match addr & 7 {
            2 => self.status | (self.open_bus & 0x1F),
            4 => self.oam[self.oam_addr as usize],
            7 => self.read_buffer,
            _ => self.open_bus,
        }
    }

    /// Read PPUSTATUS ($2002); clears vblank and the write toggle.
    fn read_status(&mut self) -> u8 {
        if self.scanline == VBLANK_SCANLINE {
            match self.dot {
                // One dot before the flag would be set: neither flag nor NMI this frame.
                1 => self.suppress_vblank = true,
                // Flag set one or two dots ago: it reads back, but the NMI is dropped.
                2..=NMI_CANCEL_LAST_DOT => self.nmi_pending = false,
                _ => {}
            }
        }
        let value = self.status | (self.open_bus & 0x1F);
        self.status &= !STATUS_VBLANK;
        self.loopy.w = false;
        self.open_bus = value;
        value
    }

    /// Read PPUDATA ($2007). Below the palette the read is delayed through the buffer; palette
    /// reads return at once and refill the buffer from the nametable underneath.
    fn read_data(&mut self, cart: &mut Cartridge) -> u8 {
        let addr = self.loopy.v & 0x3FFF;
        let value = if addr >= 0x3F00 {
            self.read_buffer = self.read_vram(cart, addr - 0x1000);
            (self.read_vram(cart, addr) & 0x3F) | (self.open_bus & 0xC0)
        } else {
            let buffered = self.read_buffer;
            self.read_buffer = self.read_vram(cart, addr);
            buffered
        };
        self.increment_vram_addr(cart);
        self.drive_open_bus(value);
        value
    }

    /// Write $2000–$2007. Every write refreshes the open-bus latch.
    pub fn write_register(&mut self, cart: &mut Cartridge, addr: u16, data: u8) {
        self.drive_open_bus(data);
        match addr & 7 {
            0 => {
                let was_enabled = self.ctrl & CTRL_NMI != 0;
                self.ctrl = data;
                self.loopy.write_ctrl(data);
                let enabled = data & CTRL_NMI != 0;
                if !was_enabled && enabled && self.status & STATUS_VBLANK != 0 {
                    self.nmi_pending = true;
                } else if !enabled {
                    // Dropping the enable bit pulls the NMI line back up before the CPU sees it.
                    self.nmi_pending = false;
                }
            }
            1 => self.mask = data,
            2 => trace!("write {data:#04X} to read-only PPUSTATUS"),
            3 => self.oam_addr = data,
            4 => self.write_oam(data),
            5 => self.loopy.write_scroll(data),
            6 => {
                if self.loopy.write_addr(data) {
                    cart.on_ppu_address(self.loopy.v & 0x3FFF);
                }
            }
            _ => {
                let addr = self.loopy.v;
                self.write_vram(cart, addr, data);
                self.increment_vram_addr(cart);
            }
        }
    }

    /// OAMDATA write; also the target of OAM DMA.
    pub fn write_oam(&mut self, data: u8) {
        self.oam[self.oam_addr as usize] = data;
        self.oam_addr = self.oam_addr.wrapping_add(1);
    }

    /// After a $2007 access: +1 or +32, or the rendering increments while the picture is drawn.
    fn increment_vram_addr(&mut self, cart: &mut Cartridge) {
        if self.rendering_enabled() && self.on_render_line() {
            self.loopy.increment_x();
            self.loopy.increment_y();
        } else {
            let step = if self.ctrl & CTRL_INCREMENT_32 != 0 { 32 } else { 1 };
            self.loopy.v = self.loopy.v.wrapping_add(step) & 0x7FFF;
            cart.on_ppu_address(self.loopy.v & 0x3FFF);
        }
    }

    // ---------------------------------------------------------------------------------------------
    // Dot stepping
    // ---------------------------------------------------------------------------------------------

    /// Process the current dot, then advance to the next one.
    pub fn step(&mut self, cart: &mut Cartridge) {
        if self.rendering_enabled() {
            self.render_dot(cart);
        } else if self.scanline < 240 && (1..=256).contains(&self.dot) {
            let index = self.palette.read(0x3F00) & self.greyscale_mask();
            self.put_pixel(self.dot as usize - 1, index);
        }

        if self.scanline == VBLANK_SCANLINE && self.dot == 1 {
            if !self.suppress_vblank {
                self.status |= STATUS_VBLANK;
                if self.ctrl & CTRL_NMI != 0 {
                    self.nmi_pending = true;
                }
            }
            self.suppress_vblank = false;
            self.frame_complete = true;
            self.frame_count += 1;
        }
        if self.scanline == PRE_RENDER_SCANLINE && self.dot == 1 {
            self.status &= !(STATUS_VBLANK | STATUS_SPRITE0 | STATUS_OVERFLOW);
        }

        if self.open_bus_decay > 0 {
            self.open_bus_decay -= 1;
            if self.open_bus_decay == 0 {
                self.open_bus = 0;
            }
        }

        self.advance();
    }

    fn advance(&mut self) {
        // Odd frames with rendering on skip the last dot of the pre-render line.
        if self.scanline == PRE_RENDER_SCANLINE
            && self.dot == 339
            && self.odd_frame
            && self.rendering_enabled()
        {
            self.dot = 0;
            self.scanline = 0;
            self.odd_frame = false;
            return;
        }
        self.dot += 1;
        if self.dot == DOTS_PER_SCANLINE {
            self.dot = 0;
            self.scanline += 1;
            if self.scanline == SCANLINES_PER_FRAME {
                self.scanline = 0;
                self.odd_frame = !self.odd_frame;
            }
        }
    }

    fn render_dot(&mut self, cart: &mut Cartridge) {
        let dot = self.dot;
        let visible_dot = (1..=256).contains(&dot);
        let fetch_dot = visible_dot || (321..=336).contains(&dot);

        if self.scanline < 240 && visible_dot {
            self.render_pixel();
        }

        if !self.on_render_line() {
            return;
        }

        if fetch_dot {
            self.tile_data <<= 4;
            match dot % 8 {
                1 => {
                    let addr = self.loopy.tile_address();
                    self.nt_byte = self.read_vram(cart, addr);
                }
                3 => {
                    let addr = self.loopy.attribute_address();
                    let shift = self.loopy.attribute_shift();
                    self.at_bits = ((self.read_vram(cart, addr) >> shift) & 3) << 2;
                }
                5 => {
                    let addr = self.bg_pattern_address();
                    self.pattern_lo = self.read_vram(cart, addr);
                }
                7 => {
                    let addr = self.bg_pattern_address() + 8;
                    self.pattern_hi = self.read_vram(cart, addr);
                }
                0 => {
                    self.store_tile();
                    self.loopy.increment_x();
                }
                _ => {}
            }
        }

        if dot == 256 {
            self.loopy.increment_y();
        }
        if dot == 257 {
            self.loopy.copy_x();
            if self.scanline < 240 {
                self.evaluate_sprites();
            } else {
                self.sprite_count = 0;
            }
        }
        if (257..=320).contains(&dot) {
            self.oam_addr = 0;
            self.fetch_sprite_dot(cart, dot);
        }
        if self.scanline == PRE_RENDER_SCANLINE && (280..=304).contains(&dot) {
            self.loopy.copy_y();
        }
    }

    fn bg_pattern_address(&self) -> u16 {
        let table = if self.ctrl & CTRL_BG_TABLE != 0 { 0x1000 } else { 0 };
        table + self.nt_byte as u16 * 16 + self.loopy.fine_y()
    }

    /// Pack the fetched tile row into eight 4-bit pixels in the low half of the shift buffer.
    fn store_tile(&mut self) {
        let mut lo = self.pattern_lo;
        let mut hi = self.pattern_hi;
        let mut data = 0u32;
        for _ in 0..8 {
            let p1 = (lo & 0x80) >> 7;
            let p2 = (hi & 0x80) >> 6;
            lo <<= 1;
            hi <<= 1;
            data = (data << 4) | (self.at_bits | p1 | p2) as u32;
        }
        self.tile_data |= data as u64;
    }

    fn background_pixel(&self, x: usize) -> u8 {
        if self.mask & MASK_BG == 0 || (x < 8 && self.mask & MASK_BG_LEFT == 0) {
            return 0;
        }
        let tile = (self.tile_data >> 32) as u32;
        ((tile >> ((7 - self.loopy.fine_x as u32) * 4)) & 0x0F) as u8
    }

    /// First opaque sprite pixel at `x`, with its slot.
    fn sprite_pixel(&self, x: usize) -> Option<(u8, SpriteSlot)> {
        if self.mask & MASK_SPRITES == 0 || (x < 8 && self.mask & MASK_SPRITE_LEFT == 0) {
            return None;
        }
        self.sprites[..self.sprite_count as usize]
            .iter()
            .find_map(|sprite| {
                let offset = x as isize - sprite.x as isize;
                if !(0..8).contains(&offset) {
                    return None;
                }
                let color = ((sprite.pattern >> ((7 - offset) * 4)) & 0x0F) as u8;
                (color & 3 != 0).then_some((color, *sprite))
            })
    }

    fn render_pixel(&mut self) {
        let x = self.dot as usize - 1;
        let background = self.background_pixel(x);
        let bg_opaque = background & 3 != 0;

        let color = match self.sprite_pixel(x) {
            None if bg_opaque => background,
            None => 0,
            Some((sprite, _)) if !bg_opaque => sprite | 0x10,
            Some((sprite, slot)) => {
                if slot.oam_index == 0 && x < 255 {
                    self.status |= STATUS_SPRITE0;
                }
                if slot.behind { background } else { sprite | 0x10 }
            }
        };
        let index = self.palette.read(0x3F00 | color as u16) & self.greyscale_mask();
        self.put_pixel(x, index);
    }

    fn greyscale_mask(&self) -> u8 {
        if self.mask & MASK_GREYSCALE != 0 { 0x30 } else { 0x3F }
    }

    fn put_pixel(&mut self, x: usize, index: u8) {
        let y = self.scanline as usize;
        if let Some(pixel) = self.frame.get_mut(y * FRAME_WIDTH + x) {
            *pixel = index;
        }
    }

    // ---------------------------------------------------------------------------------------------
    // Sprites
    // ---------------------------------------------------------------------------------------------

    /// Select up to eight sprites covering this scanline; they are drawn on the next one.
    fn evaluate_sprites(&mut self) {
        let height = self.sprite_height() as i32;
        let mut count = 0usize;
        for i in 0..64 {
            let entry = &self.oam[i * 4..i * 4 + 4];
            let row = self.scanline as i32 - entry[0] as i32;
            if !(0..height).contains(&row) {
                continue;
            }
            if count == 8 {
                self.status |= STATUS_OVERFLOW;
                break;
            }
            self.sprites[count] = SpriteSlot {
                pattern: 0,
                x: entry[3],
                behind: entry[2] & 0x20 != 0,
                oam_index: i as u8,
                tile: entry[1],
                attr: entry[2],
                row: row as u8,
            };
            count += 1;
        }
        self.sprite_count = count as u8;
    }

    /// Dots 257–320: eight 8-dot slots, pattern low byte on the 5th dot and high byte on the 7th.
    /// Empty slots fetch tile $FF so the mapper sees the same address traffic.
    fn fetch_sprite_dot(&mut self, cart: &mut Cartridge, dot: u16) {
        let slot = ((dot - 257) / 8) as usize;
        let phase = (dot - 257) % 8;
        if phase != 4 && phase != 6 {
            return;
        }
        let used = slot < self.sprite_count as usize;
        let sprite = if used {
            self.sprites[slot]
        } else {
            SpriteSlot {
                tile: 0xFF,
                ..SpriteSlot::default()
            }
        };
        let addr = self.sprite_pattern_address(&sprite) + if phase == 6 { 8 } else { 0 };
        let byte = self.read_vram(cart, addr);
        if !used {
            return;
        }
        if phase == 4 {
            self.sprites[slot].pattern = byte as u32;
        } else {
            let lo = self.sprites[slot].pattern as u8;
            self.sprites[slot].pattern = pack_sprite_row(lo, byte, sprite.attr);
        }
    }

    fn sprite_pattern_address(&self, sprite: &SpriteSlot) -> u16 {
        let height = self.sprite_height();
        let mut row = sprite.row.min(height - 1);
        if sprite.attr & 0x80 != 0 {
            row = height - 1 - row;
        }
        if height == 8 {
            let table = if self.ctrl & CTRL_SPRITE_TABLE != 0 { 0x1000 } else { 0 };
            table + sprite.tile as u16 * 16 + row as u16
        } else {
            let table = (sprite.tile as u16 & 1) * 0x1000;
            let mut tile = sprite.tile as u16 & 0xFE;
            if row > 7 {
                tile += 1;
                row -= 8;
            }
            table + tile * 16 + row as u16
        }
    }

    // ---------------------------------------------------------------------------------------------
    // Save state
    // ---------------------------------------------------------------------------------------------

    pub fn save_state(&self) -> PpuState {
        PpuState {
            scanline: self.scanline,
            dot: self.dot,
            odd_frame: self.odd_frame,
            frame_count: self.frame_count,
            ctrl: self.ctrl,
            mask: self.mask,
            status: self.status,
            loopy: self.loopy.clone(),
            read_buffer: self.read_buffer,
            open_bus: self.open_bus,
            open_bus_decay: self.open_bus_decay,
            oam: self.oam.to_vec(),
            oam_addr: self.oam_addr,
            nametables: self.nametables.to_vec(),
            palette: self.palette.bytes(),
            nt_byte: self.nt_byte,
            at_bits: self.at_bits,
            pattern_lo: self.pattern_lo,
            pattern_hi: self.pattern_hi,
            tile_data: self.tile_data,
            sprites: self.sprites.to_vec(),
            sprite_count: self.sprite_count,
            nmi_pending: self.nmi_pending,
            suppress_vblank: self.suppress_vblank,
            frame: self.frame.clone(),
        }
    }

    /// Check that a snapshot fits before any field is touched.
    pub fn validate_state(state: &PpuState) -> Result<(), StateError> {
        if state.oam.len() != OAM_LEN {
            return Err(StateError::SizeMismatch("oam"));
        }
        if state.nametables.len() != NAMETABLE_LEN {
            return Err(StateError::SizeMismatch("nametables"));
        }
        if state.sprites.len() != 8 || state.sprite_count > 8 {
            return Err(StateError::SizeMismatch("sprites"));
        }
        if state.frame.len() != FRAME_WIDTH * FRAME_HEIGHT {
            return Err(StateError::SizeMismatch("frame"));
        }
        if state.scanline >= SCANLINES_PER_FRAME || state.dot >= DOTS_PER_SCANLINE {
            return Err(StateError::OutOfRange("ppu position"));
        }
        if state.loopy.fine_x > 7 {
            return Err(StateError::OutOfRange("fine x scroll"));
        }
        if state.loopy.v > 0x7FFF || state.loopy.t > 0x7FFF {
            return Err(StateError::OutOfRange("vram address"));
        }
        Ok(())
    }

    pub fn load_state(&mut self, state: PpuState) -> Result<(), StateError> {
        Self::validate_state(&state)?;
        self.scanline = state.scanline;
        self.dot = state.dot;
        self.odd_frame = state.odd_frame;
        self.frame_count = state.frame_count;
        self.ctrl = state.ctrl;
        self.mask = state.mask;
        self.status = state.status;
        self.loopy = state.loopy;
        self.read_buffer = state.read_buffer;
        self.open_bus = state.open_bus;
        self.open_bus_decay = state.open_bus_decay;
        self.oam.copy_from_slice(&state.oam);
        self.oam_addr = state.oam_addr;
        self.nametables.copy_from_slice(&state.nametables);
        self.palette = PaletteRam::from_bytes(state.palette);
        self.nt_byte = state.nt_byte;
        self.at_bits = state.at_bits;
        self.pattern_lo = state.pattern_lo;
        self.pattern_hi = state.pattern_hi;
        self.tile_data = state.tile_data;
        self.sprites.copy_from_slice(&state.sprites);
        self.sprite_count = state.sprite_count;
        self.nmi_pending = state.nmi_pending;
        self.suppress_vblank = state.suppress_vblank;
        self.frame = state.frame;
        self.frame_complete = false;
        Ok(())
    }
}

/// Eight 4-bit sprite pixels from a pattern row, honoring horizontal flip (attr bit 6).
fn pack_sprite_row(mut lo: u8, mut hi: u8, attr: u8) -> u32 {
    let palette = (attr & 3) << 2;
    let flip = attr & 0x40 != 0;
    let mut data = 0u32;
    for _ in 0..8 {
        let (p1, p2) = if flip {
            let bits = (lo & 1, (hi & 1) << 1);
            lo >>= 1;
            hi >>= 1;
            bits
        } else {
            let bits = ((lo & 0x80) >> 7, (hi & 0x80) >> 6);
            lo <<= 1;
            hi <<= 1;
            bits
        };
        data = (data << 4) | (palette | p1 | p2) as u32;
    }
    data
}
