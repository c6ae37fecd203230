use crate::cartridge::cartridge::{Cartridge, Header, Rom};
use crate::cartridge::mapper::Mirroring;
use crate::error::StateError;
use crate::ppu::ppu::{PPU, PRE_RENDER_SCANLINE, VBLANK_SCANLINE};
use crate::ppu::registers::{
    MASK_BG, MASK_BG_LEFT, MASK_SPRITE_LEFT, MASK_SPRITES, STATUS_OVERFLOW, STATUS_SPRITE0,
    STATUS_VBLANK,
};

const FRAME_DOTS: usize = 341 * 262;

/// NROM with CHR RAM so tests can draw their own tiles.
fn chr_ram_cart() -> Cartridge {
    let rom = Rom {
        header: Header::new(1, 0, 0, Mirroring::Horizontal, false),
        prg: vec![0; 0x4000],
        chr: Vec::new(),
        submapper: 0,
    };
    Cartridge::from_rom(rom).unwrap()
}

fn run(ppu: &mut PPU, cart: &mut Cartridge, dots: usize) {
    for _ in 0..dots {
        ppu.step(cart);
    }
}

fn run_to(ppu: &mut PPU, cart: &mut Cartridge, scanline: u16, dot: u16) {
    while ppu.scanline != scanline || ppu.dot != dot {
        ppu.step(cart);
    }
}

fn set_addr(ppu: &mut PPU, cart: &mut Cartridge, addr: u16) {
    ppu.write_register(cart, 0x2006, (addr >> 8) as u8);
    ppu.write_register(cart, 0x2006, addr as u8);
}

#[test]
fn frame_is_341_by_262_dots_without_rendering() {
    let mut cart = chr_ram_cart();
    let mut ppu = PPU::new();
    for frame in 1..=2 {
        run(&mut ppu, &mut cart, FRAME_DOTS);
        assert_eq!((ppu.scanline, ppu.dot), (0, 0));
        assert_eq!(ppu.frame_count, frame);
    }
}

#[test]
fn odd_frame_skips_a_dot_when_rendering() {
    let mut cart = chr_ram_cart();
    let mut ppu = PPU::new();
    ppu.write_register(&mut cart, 0x2001, MASK_BG);

    run(&mut ppu, &mut cart, FRAME_DOTS);
    assert_eq!((ppu.scanline, ppu.dot), (0, 0));

    run(&mut ppu, &mut cart, FRAME_DOTS - 1);
    assert_eq!((ppu.scanline, ppu.dot), (0, 0));

    run(&mut ppu, &mut cart, FRAME_DOTS);
    assert_eq!((ppu.scanline, ppu.dot), (0, 0));
}

#[test]
fn one_nmi_per_frame() {
    let mut cart = chr_ram_cart();
    let mut ppu = PPU::new();
    ppu.write_register(&mut cart, 0x2000, 0x80);
    let mut nmis = 0;
    for _ in 0..FRAME_DOTS * 3 {
        ppu.step(&mut cart);
        if ppu.poll_nmi() {
            nmis += 1;
            assert_eq!((ppu.scanline, ppu.dot), (VBLANK_SCANLINE, 4));
        }
    }
    assert_eq!(nmis, 3);
}

#[test]
fn no_nmi_when_disabled() {
    let mut cart = chr_ram_cart();
    let mut ppu = PPU::new();
    run(&mut ppu, &mut cart, FRAME_DOTS);
    assert!(!ppu.poll_nmi());
    assert!(ppu.frame_complete);
}

#[test]
fn enabling_nmi_during_vblank_fires_immediately() {
    let mut cart = chr_ram_cart();
    let mut ppu = PPU::new();
    run_to(&mut ppu, &mut cart, 250, 0);
    assert!(!ppu.poll_nmi());
    ppu.write_register(&mut cart, 0x2000, 0x80);
    assert!(ppu.poll_nmi());
}

#[test]
fn status_read_clears_vblank_and_toggle() {
    let mut cart = chr_ram_cart();
    let mut ppu = PPU::new();
    run_to(&mut ppu, &mut cart, 245, 0);
    ppu.write_register(&mut cart, 0x2005, 0x10);

    let status = ppu.read_register(&mut cart, 0x2002);
    assert_ne!(status & STATUS_VBLANK, 0);
    assert_eq!(ppu.read_register(&mut cart, 0x2002) & STATUS_VBLANK, 0);

    // Toggle was reset, so this is a first write again: fine X.
    ppu.write_register(&mut cart, 0x2005, 0x07);
    ppu.write_register(&mut cart, 0x2005, 0x00);
    assert_eq!(ppu.save_state().loopy.fine_x, 7);
}

#[test]
fn status_read_just_before_vblank_suppresses_flag_and_nmi() {
    let mut cart = chr_ram_cart();
    let mut ppu = PPU::new();
    ppu.write_register(&mut cart, 0x2000, 0x80);
    run_to(&mut ppu, &mut cart, VBLANK_SCANLINE, 1);

    assert_eq!(ppu.read_register(&mut cart, 0x2002) & STATUS_VBLANK, 0);
    run(&mut ppu, &mut cart, 10);
    assert!(!ppu.poll_nmi());
    assert_eq!(ppu.peek_register(0x2002) & STATUS_VBLANK, 0);

    // Next frame behaves normally.
    run_to(&mut ppu, &mut cart, VBLANK_SCANLINE, 5);
    assert!(ppu.poll_nmi());
}

#[test]
fn status_read_as_vblank_starts_drops_only_the_nmi() {
    let mut cart = chr_ram_cart();
    let mut ppu = PPU::new();
    ppu.write_register(&mut cart, 0x2000, 0x80);
    run_to(&mut ppu, &mut cart, VBLANK_SCANLINE, 2);

    assert_ne!(ppu.read_register(&mut cart, 0x2002) & STATUS_VBLANK, 0);
    run(&mut ppu, &mut cart, 10);
    assert!(!ppu.poll_nmi());
}

#[test]
fn nmi_edge_is_held_back_while_it_can_be_cancelled() {
    let mut cart = chr_ram_cart();
    let mut ppu = PPU::new();
    ppu.write_register(&mut cart, 0x2000, 0x80);
    run_to(&mut ppu, &mut cart, VBLANK_SCANLINE, 2);
    assert!(!ppu.poll_nmi());
    run_to(&mut ppu, &mut cart, VBLANK_SCANLINE, 3);
    assert!(!ppu.poll_nmi());
    run_to(&mut ppu, &mut cart, VBLANK_SCANLINE, 4);
    assert!(ppu.poll_nmi());
}

#[test]
fn clearing_nmi_enable_drops_a_pending_nmi() {
    let mut cart = chr_ram_cart();
    let mut ppu = PPU::new();
    ppu.write_register(&mut cart, 0x2000, 0x80);
    run_to(&mut ppu, &mut cart, VBLANK_SCANLINE, 3);
    ppu.write_register(&mut cart, 0x2000, 0x00);
    run(&mut ppu, &mut cart, 10);
    assert!(!ppu.poll_nmi());
    // The flag itself is untouched.
    assert_ne!(ppu.peek_register(0x2002) & STATUS_VBLANK, 0);
}

#[test]
fn reset_keeps_the_dot_counter_running() {
    let mut cart = chr_ram_cart();
    let mut ppu = PPU::new();
    ppu.write_register(&mut cart, 0x2000, 0x80);
    ppu.write_register(&mut cart, 0x2001, MASK_BG);
    ppu.write_register(&mut cart, 0x2005, 0x10);
    run_to(&mut ppu, &mut cart, 100, 50);

    ppu.reset();
    assert_eq!((ppu.scanline, ppu.dot), (100, 50));
    assert_eq!(ppu.ctrl(), 0);
    assert_eq!(ppu.mask(), 0);
    assert!(!ppu.save_state().loopy.w);
}

#[test]
fn vblank_cleared_on_pre_render_line() {
    let mut cart = chr_ram_cart();
    let mut ppu = PPU::new();
    run_to(&mut ppu, &mut cart, PRE_RENDER_SCANLINE, 1);
    assert_ne!(ppu.peek_register(0x2002) & STATUS_VBLANK, 0);
    ppu.step(&mut cart);
    assert_eq!(ppu.peek_register(0x2002) & STATUS_VBLANK, 0);
}

#[test]
fn data_reads_are_buffered_below_palette() {
    let mut cart = chr_ram_cart();
    let mut ppu = PPU::new();
    set_addr(&mut ppu, &mut cart, 0x2400);
    ppu.write_register(&mut cart, 0x2007, 0xAB);
    ppu.write_register(&mut cart, 0x2007, 0xCD);

    set_addr(&mut ppu, &mut cart, 0x2400);
    let _stale = ppu.read_register(&mut cart, 0x2007);
    assert_eq!(ppu.read_register(&mut cart, 0x2007), 0xAB);
    assert_eq!(ppu.read_register(&mut cart, 0x2007), 0xCD);
}

#[test]
fn horizontal_mirroring_shares_top_tables() {
    let mut cart = chr_ram_cart();
    let mut ppu = PPU::new();
    set_addr(&mut ppu, &mut cart, 0x2005);
    ppu.write_register(&mut cart, 0x2007, 0x5A);

    set_addr(&mut ppu, &mut cart, 0x2405);
    ppu.read_register(&mut cart, 0x2007);
    assert_eq!(ppu.read_register(&mut cart, 0x2007), 0x5A);
}

#[test]
fn palette_reads_are_immediate() {
    let mut cart = chr_ram_cart();
    let mut ppu = PPU::new();
    set_addr(&mut ppu, &mut cart, 0x3F10);
    ppu.write_register(&mut cart, 0x2007, 0x2C);

    set_addr(&mut ppu, &mut cart, 0x3F00);
    assert_eq!(ppu.read_register(&mut cart, 0x2007) & 0x3F, 0x2C);
}

#[test]
fn increment_32_walks_down_a_column() {
    let mut cart = chr_ram_cart();
    let mut ppu = PPU::new();
    ppu.write_register(&mut cart, 0x2000, 0x04);
    set_addr(&mut ppu, &mut cart, 0x2000);
    ppu.write_register(&mut cart, 0x2007, 1);
    ppu.write_register(&mut cart, 0x2007, 2);
    assert_eq!(ppu.save_state().loopy.v, 0x2040);

    ppu.write_register(&mut cart, 0x2000, 0x00);
    set_addr(&mut ppu, &mut cart, 0x2020);
    ppu.read_register(&mut cart, 0x2007);
    assert_eq!(ppu.read_register(&mut cart, 0x2007), 2);
}

#[test]
fn write_only_registers_read_open_bus() {
    let mut cart = chr_ram_cart();
    let mut ppu = PPU::new();
    ppu.write_register(&mut cart, 0x2001, 0x00);
    ppu.write_register(&mut cart, 0x2003, 0x9E);
    assert_eq!(ppu.read_register(&mut cart, 0x2000), 0x9E);
    assert_eq!(ppu.read_register(&mut cart, 0x3FF5), 0x9E);
    assert_eq!(ppu.read_register(&mut cart, 0x2002) & 0x1F, 0x1E);
}

#[test]
fn open_bus_decays_after_a_frame() {
    let mut cart = chr_ram_cart();
    let mut ppu = PPU::new();
    ppu.write_register(&mut cart, 0x2003, 0xFF);
    run(&mut ppu, &mut cart, 1000);
    assert_eq!(ppu.read_register(&mut cart, 0x2005), 0xFF);
    run(&mut ppu, &mut cart, FRAME_DOTS + 1);
    assert_eq!(ppu.read_register(&mut cart, 0x2005), 0x00);
}

#[test]
fn oam_attribute_reads_mask_unused_bits() {
    let mut cart = chr_ram_cart();
    let mut ppu = PPU::new();
    ppu.write_register(&mut cart, 0x2003, 0x02);
    ppu.write_register(&mut cart, 0x2004, 0xFF);
    ppu.write_register(&mut cart, 0x2003, 0x02);
    assert_eq!(ppu.read_register(&mut cart, 0x2004), 0xE3);
}

#[test]
fn backdrop_fills_frame_when_rendering_disabled() {
    let mut cart = chr_ram_cart();
    let mut ppu = PPU::new();
    set_addr(&mut ppu, &mut cart, 0x3F00);
    ppu.write_register(&mut cart, 0x2007, 0x21);
    run(&mut ppu, &mut cart, FRAME_DOTS);
    assert!(ppu.frame().iter().all(|&p| p == 0x21));

    let mut rgb = vec![0u32; 256 * 240];
    ppu.frame_rgb(&mut rgb);
    assert_eq!(rgb[0], crate::ppu::palette::rgb(0x21));
}

/// Tile 1 is solid colour 1; the whole first nametable uses it; one sprite per `sprites` entry.
fn solid_scene(cart: &mut Cartridge, sprites: &[(u8, u8)]) -> PPU {
    let mut ppu = PPU::new();
    set_addr(&mut ppu, cart, 0x0010);
    for _ in 0..8 {
        ppu.write_register(cart, 0x2007, 0xFF);
    }
    set_addr(&mut ppu, cart, 0x2000);
    for _ in 0..960 {
        ppu.write_register(cart, 0x2007, 0x01);
    }
    set_addr(&mut ppu, cart, 0x3F01);
    ppu.write_register(cart, 0x2007, 0x16);
    set_addr(&mut ppu, cart, 0x3F11);
    ppu.write_register(cart, 0x2007, 0x2A);

    for i in 0..64u8 {
        ppu.write_oam(0xFF);
        ppu.write_oam(0);
        ppu.write_oam(0);
        ppu.write_oam(i);
    }
    ppu.write_register(cart, 0x2003, 0);
    for &(y, x) in sprites {
        ppu.write_oam(y);
        ppu.write_oam(1);
        ppu.write_oam(0);
        ppu.write_oam(x);
    }

    set_addr(&mut ppu, cart, 0x0000);
    ppu.write_register(cart, 0x2000, 0x00);
    ppu.write_register(cart, 0x2005, 0x00);
    ppu.write_register(cart, 0x2005, 0x00);
    ppu.write_register(
        cart,
        0x2001,
        MASK_BG | MASK_SPRITES | MASK_BG_LEFT | MASK_SPRITE_LEFT,
    );
    ppu
}

#[test]
fn sprite_zero_hit_over_opaque_background() {
    let mut cart = chr_ram_cart();
    let mut ppu = solid_scene(&mut cart, &[(20, 40)]);
    run(&mut ppu, &mut cart, FRAME_DOTS);
    assert_eq!(ppu.peek_register(0x2002) & STATUS_SPRITE0, 0);

    run_to(&mut ppu, &mut cart, 30, 0);
    assert_ne!(ppu.peek_register(0x2002) & STATUS_SPRITE0, 0);
    assert_eq!(ppu.frame()[25 * 256 + 44], 0x2A);
    assert_eq!(ppu.frame()[25 * 256 + 100], 0x16);
}

#[test]
fn no_sprite_zero_hit_with_sprites_disabled() {
    let mut cart = chr_ram_cart();
    let mut ppu = solid_scene(&mut cart, &[(20, 40)]);
    ppu.write_register(&mut cart, 0x2001, MASK_BG | MASK_BG_LEFT);
    run(&mut ppu, &mut cart, FRAME_DOTS);
    run_to(&mut ppu, &mut cart, 100, 0);
    assert_eq!(ppu.peek_register(0x2002) & STATUS_SPRITE0, 0);
}

#[test]
fn nine_sprites_on_a_line_set_overflow() {
    let mut cart = chr_ram_cart();
    let sprites: Vec<(u8, u8)> = (0..9).map(|i| (50, i * 10)).collect();
    let mut ppu = solid_scene(&mut cart, &sprites);
    run(&mut ppu, &mut cart, FRAME_DOTS);
    run_to(&mut ppu, &mut cart, 49, 0);
    assert_eq!(ppu.peek_register(0x2002) & STATUS_OVERFLOW, 0);
    run_to(&mut ppu, &mut cart, 51, 0);
    assert_ne!(ppu.peek_register(0x2002) & STATUS_OVERFLOW, 0);
}

#[test]
fn state_round_trip_resumes_identically() {
    let mut cart = chr_ram_cart();
    let mut ppu = solid_scene(&mut cart, &[(20, 40)]);
    run(&mut ppu, &mut cart, 12_345);
    let state = ppu.save_state();

    let mut copy = PPU::new();
    copy.load_state(state.clone()).unwrap();
    run(&mut ppu, &mut cart, FRAME_DOTS);
    run(&mut copy, &mut cart, FRAME_DOTS);
    assert_eq!(ppu.save_state(), copy.save_state());
}

#[test]
fn rejects_state_with_wrong_sizes() {
    let ppu = PPU::new();
    let mut state = ppu.save_state();
    state.oam.pop();
    assert!(PPU::new().load_state(state).is_err());
}

#[test]
fn rejects_state_with_out_of_range_scroll() {
    let mut state = PPU::new().save_state();
    state.loopy.fine_x = 9;
    assert!(matches!(
        PPU::validate_state(&state),
        Err(StateError::OutOfRange("fine x scroll"))
    ));

    let mut state = PPU::new().save_state();
    state.loopy.v = 0x8000;
    assert!(matches!(
        PPU::new().load_state(state),
        Err(StateError::OutOfRange("vram address"))
    ));
}
