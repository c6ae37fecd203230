use vesper::cartridge::cartridge::{Header, Rom};
use vesper::cartridge::mapper::Mirroring;
use vesper::config::PRG_CHUNK_SIZE;
use serde::Serialize;
use serde::de::DeserializeOwned;
use vesper::savestate::{MachineState, STATE_VERSION};
use vesper::{Console, EmulatorConfig, LoadError, MapperError, StateError};

// Code is assembled at $C000, which is the last PRG bank on every board used here.
const ORIGIN: u16 = 0xC000;
const NMI_HANDLER: u16 = 0xC010;
const IRQ_HANDLER: u16 = 0xC020;

/// LDA #$05; TAX; LDA #$80; STA $2000; loop: JMP loop.
/// NMI: INC $10; RTI. IRQ: RTI.
const PROGRAM: &[u8] = &[
    0xA9, 0x05, 0xAA, 0xA9, 0x80, 0x8D, 0x00, 0x20, 0x4C, 0x08, 0xC0,
];

fn image(mapper_id: u8, prg_chunks: u8, program: &[u8]) -> Vec<u8> {
    let mut prg = vec![0xEA; prg_chunks as usize * PRG_CHUNK_SIZE];
    let last = prg.len() - PRG_CHUNK_SIZE;
    prg[last..last + program.len()].copy_from_slice(program);

    let nmi = last + (NMI_HANDLER - ORIGIN) as usize;
    prg[nmi..nmi + 3].copy_from_slice(&[0xE6, 0x10, 0x40]);
    let irq = last + (IRQ_HANDLER - ORIGIN) as usize;
    prg[irq] = 0x40;

    let vectors = prg.len() - 6;
    for (i, addr) in [NMI_HANDLER, ORIGIN, IRQ_HANDLER].into_iter().enumerate() {
        prg[vectors + 2 * i..vectors + 2 * i + 2].copy_from_slice(&addr.to_le_bytes());
    }

    Rom {
        header: Header::new(prg_chunks, 0, mapper_id, Mirroring::Vertical, false),
        prg,
        chr: Vec::new(),
        submapper: 0,
    }
    .to_bytes()
}

fn console(program: &[u8]) -> Console {
    Console::from_rom_bytes(&image(0, 1, program), &EmulatorConfig::default()).unwrap()
}

/// LDA #$80; STA $2000; LDA $2002; loop: JMP loop.
const STATUS_RACE: &[u8] = &[
    0xA9, 0x80, 0x8D, 0x00, 0x20, 0xAD, 0x02, 0x20, 0x4C, 0x08, 0xC0,
];

/// Runs up to the `LDA $2002` with the PPU parked at (241, `dot`).
fn status_read_at(dot: u16) -> Console {
    let mut console = console(STATUS_RACE);
    console.step();
    console.step();
    let bus = &mut console.cpu_mut().bus;
    while (bus.ppu.scanline, bus.ppu.dot) != (241, dot) {
        bus.ppu.step(&mut bus.cart);
    }
    console
}

fn corrupted(console: &Console, edit: impl FnOnce(&mut MachineState)) -> Vec<u8> {
    let mut state = MachineState::decode(&console.save_state().unwrap()).unwrap();
    edit(&mut state);
    state.encode().unwrap()
}

/// Overwrite one byte of a private field through the snapshot's own encoding.
fn patched<T: Serialize + DeserializeOwned>(value: &T, offset: usize, byte: u8) -> T {
    let mut bytes = bincode::serialize(value).unwrap();
    bytes[offset] = byte;
    bincode::deserialize(&bytes).unwrap()
}

#[test]
fn boots_from_reset_vector() {
    let mut console = console(PROGRAM);
    assert_eq!(console.cpu().pc, ORIGIN);
    assert_eq!(console.cpu().cycles, 7);

    console.step();
    console.step();
    assert_eq!(console.cpu().a, 0x05);
    assert_eq!(console.cpu().x, 0x05);
}

#[test]
fn one_nmi_per_frame() {
    let mut console = console(PROGRAM);
    for _ in 0..3 {
        console.step_frame();
    }
    assert_eq!(console.ppu().frame_count, 3);

    // The third NMI is taken on the next instruction boundary.
    for _ in 0..4 {
        console.step();
    }
    assert_eq!(console.cpu().bus.ram[0x10], 3);
}

#[test]
fn frame_takes_about_29781_cpu_cycles() {
    let mut console = console(PROGRAM);
    console.step_frame();
    for _ in 0..4 {
        let cycles = console.step_frame();
        assert!((29_770..=29_792).contains(&cycles), "frame took {cycles} cycles");
    }
}

#[test]
fn status_read_before_vblank_keeps_the_nmi() {
    let mut console = status_read_at(0);
    console.step();
    assert_eq!(console.cpu().a & 0x80, 0);
    assert_eq!(console.cpu().pc, 0xC008);

    console.step();
    assert_eq!(console.cpu().pc, NMI_HANDLER);
    console.step();
    assert_eq!(console.cpu().bus.ram[0x10], 1);
}

#[test]
fn status_read_on_the_vblank_dot_suppresses_flag_and_nmi() {
    let mut console = status_read_at(1);
    console.step();
    assert_eq!(console.cpu().a & 0x80, 0);

    console.step();
    assert_eq!(console.cpu().pc, 0xC008);
    assert_eq!(console.cpu().bus.ram[0x10], 0);
}

#[test]
fn status_read_just_after_vblank_returns_the_flag_and_cancels_the_nmi() {
    for dot in [2, 3] {
        let mut console = status_read_at(dot);
        console.step();
        assert_eq!(console.cpu().a & 0x80, 0x80, "dot {dot}");
        assert_eq!(console.cpu().pc, 0xC008, "dot {dot}");

        console.step();
        console.step();
        assert_eq!(console.cpu().pc, 0xC008, "dot {dot}");
        assert_eq!(console.cpu().bus.ram[0x10], 0, "dot {dot}");
    }
}

#[test]
fn nmi_is_taken_once_the_cancel_window_closes() {
    let mut console = status_read_at(4);
    console.step();
    assert_eq!(console.cpu().pc, NMI_HANDLER);
    console.step();
    assert_eq!(console.cpu().bus.ram[0x10], 1);
}

#[test]
fn oam_dma_written_on_an_even_cycle_takes_513() {
    // STA $4014 from cycle 7: the write lands on cycle 10.
    let mut console = console(&[0x8D, 0x14, 0x40]);
    assert_eq!(console.cpu().cycles, 7);
    assert_eq!(console.step(), 4 + 513);
}

#[test]
fn oam_dma_written_on_an_odd_cycle_takes_514() {
    // LDA $00; STA $4014: the write lands on cycle 13.
    let mut console = console(&[0xA5, 0x00, 0x8D, 0x14, 0x40]);
    assert_eq!(console.step(), 3);
    assert_eq!(console.step(), 4 + 514);
}

#[test]
fn oam_dma_copies_the_page() {
    // LDA #$5A; STA $0200; LDA #$02; STA $4014
    let mut console = console(&[0xA9, 0x5A, 0x8D, 0x00, 0x02, 0xA9, 0x02, 0x8D, 0x14, 0x40]);
    for _ in 0..4 {
        console.step();
    }
    let state = MachineState::decode(&console.save_state().unwrap()).unwrap();
    assert_eq!(state.ppu.oam[0], 0x5A);
}

#[test]
fn jam_stops_step_frame() {
    let mut console = console(&[0xA9, 0x01, 0x02]);
    console.step_frame();
    assert!(console.halted());
    assert_eq!(console.cpu().pc, ORIGIN + 2);
    assert_eq!(console.step(), 0);
}

#[test]
fn reset_keeps_ram() {
    let mut console = console(PROGRAM);
    console.step_frame();
    console.step_frame();
    let count = console.cpu().bus.ram[0x10];
    assert!(count > 0);

    console.reset();
    assert_eq!(console.cpu().pc, ORIGIN);
    assert_eq!(console.cpu().bus.ram[0x10], count);
    assert_eq!(console.cpu().sp, 0xFA);
}

#[test]
fn buttons_reach_the_controller_port() {
    // LDA #$01; STA $4016; LDA #$00; STA $4016; LDA $4016; LDA $4016; JAM
    let program = [
        0xA9, 0x01, 0x8D, 0x16, 0x40, 0xA9, 0x00, 0x8D, 0x16, 0x40, 0xAD, 0x16, 0x40, 0xAD, 0x16,
        0x40, 0x02,
    ];
    let mut console = console(&program);
    console.set_buttons(0, vesper::Button::B);
    for _ in 0..5 {
        console.step();
    }
    assert_eq!(console.cpu().a & 1, 0);
    console.step();
    assert_eq!(console.cpu().a & 1, 1);
}

#[test]
fn save_and_load_resume_identically() {
    let mut console = console(PROGRAM);
    console.step_frame();
    console.step_frame();
    let saved = console.save_state().unwrap();

    for _ in 0..3 {
        console.step_frame();
    }
    let expected = console.save_state().unwrap();
    let expected_frame = console.frame().to_vec();

    console.load_state(&saved).unwrap();
    assert_eq!(console.save_state().unwrap(), saved);
    for _ in 0..3 {
        console.step_frame();
    }
    assert_eq!(console.save_state().unwrap(), expected);
    assert_eq!(console.frame(), &expected_frame[..]);
}

#[test]
fn bad_magic_is_rejected_without_changes() {
    let mut console = console(PROGRAM);
    console.step_frame();
    let before = console.save_state().unwrap();

    assert!(matches!(console.load_state(b"nope"), Err(StateError::BadMagic)));
    assert!(matches!(console.load_state(&[]), Err(StateError::BadMagic)));
    assert_eq!(console.save_state().unwrap(), before);
}

#[test]
fn other_version_is_rejected() {
    let mut console = console(PROGRAM);
    let mut bytes = console.save_state().unwrap();
    bytes[4..6].copy_from_slice(&(STATE_VERSION + 1).to_le_bytes());
    match console.load_state(&bytes) {
        Err(StateError::VersionMismatch { found, expected }) => {
            assert_eq!(found, STATE_VERSION + 1);
            assert_eq!(expected, STATE_VERSION);
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn truncated_state_fails_to_decode() {
    let mut console = console(PROGRAM);
    let bytes = console.save_state().unwrap();
    assert!(matches!(
        console.load_state(&bytes[..bytes.len() / 2]),
        Err(StateError::Decode(_))
    ));
}

#[test]
fn state_from_another_board_is_rejected_without_changes() {
    let nrom = console(PROGRAM);
    let bytes = nrom.save_state().unwrap();

    let mut uxrom =
        Console::from_rom_bytes(&image(2, 2, PROGRAM), &EmulatorConfig::default()).unwrap();
    uxrom.step_frame();
    let before = uxrom.save_state().unwrap();

    match uxrom.load_state(&bytes) {
        Err(StateError::MapperMismatch { found, expected }) => {
            assert_eq!(found, 0);
            assert_eq!(expected, 2);
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert_eq!(uxrom.save_state().unwrap(), before);
}

#[test]
fn out_of_range_registers_are_rejected_without_changes() {
    let mut console = console(PROGRAM);
    console.step_frame();
    let before = console.save_state().unwrap();

    let cases: [(&str, fn(&mut MachineState)); 7] = [
        ("fine x scroll", |s| s.ppu.loopy.fine_x = 8),
        ("pulse duty", |s| s.apu.pulse1 = patched(&s.apu.pulse1, 1, 4)),
        ("pulse sequencer", |s| s.apu.pulse2 = patched(&s.apu.pulse2, 2, 8)),
        ("pulse sweep", |s| s.apu.pulse1 = patched(&s.apu.pulse1, 15, 40)),
        ("triangle sequencer", |s| s.apu.triangle = patched(&s.apu.triangle, 11, 32)),
        ("dmc rate", |s| s.apu.dmc = patched(&patched(&s.apu.dmc, 3, 0), 4, 0)),
        ("sample phase", |s| s.apu.sample_phase = f64::NAN),
    ];
    for (what, edit) in cases {
        let bytes = corrupted(&console, edit);
        match console.load_state(&bytes) {
            Err(StateError::OutOfRange(field)) => assert_eq!(field, what),
            other => panic!("{what}: unexpected result: {other:?}"),
        }
        assert_eq!(console.save_state().unwrap(), before, "{what}");
    }
}

#[test]
fn unsupported_mapper_fails_to_load() {
    let result = Console::from_rom_bytes(&image(99, 1, PROGRAM), &EmulatorConfig::default());
    assert!(matches!(
        result,
        Err(LoadError::Mapper(MapperError::Unsupported(99)))
    ));
}

#[test]
fn audio_samples_are_produced() {
    let mut console = console(PROGRAM);
    let audio = console.audio();
    console.step_frame();
    console.step_frame();
    // 44.1 kHz over two frames.
    assert!(audio.len() > 1000, "only {} samples", audio.len());
    audio.clear();
    assert!(audio.is_empty());
}
