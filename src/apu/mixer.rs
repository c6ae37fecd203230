//! [APU Mixer](https://www.nesdev.org/wiki/APU_Mixer): the chip's nonlinear summing network as
//! two lookup tables, built once on first use.

use std::sync::OnceLock;

struct MixerTables {
    /// 95.52 / (8128/n + 100), n = pulse1 + pulse2 (0–30).
    pulse: [f32; 31],
    /// 163.67 / (24329/n + 100), n = 3*triangle + 2*noise + dmc (0–202).
    tnd: [f32; 203],
}

fn tables() -> &'static MixerTables {
    static TABLES: OnceLock<MixerTables> = OnceLock::new();
    TABLES.get_or_init(|| {
        let mut pulse = [0.0; 31];
        for (n, out) in pulse.iter_mut().enumerate().skip(1) {
            *out = 95.52 / (8128.0 / n as f32 + 100.0);
        }
        let mut tnd = [0.0; 203];
        for (n, out) in tnd.iter_mut().enumerate().skip(1) {
            *out = 163.67 / (24329.0 / n as f32 + 100.0);
        }
        MixerTables { pulse, tnd }
    })
}

/// Combine channel outputs into one sample in roughly 0.0..=1.0.
pub fn mix(pulse1: u8, pulse2: u8, triangle: u8, noise: u8, dmc: u8) -> f32 {
    let tables = tables();
    let pulse = (pulse1 as usize + pulse2 as usize).min(30);
    let tnd = (3 * triangle as usize + 2 * noise as usize + dmc as usize).min(202);
    tables.pulse[pulse] + tables.tnd[tnd]
}
