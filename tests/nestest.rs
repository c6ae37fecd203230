use std::fs;
use std::path::PathBuf;

use vesper::{Console, EmulatorConfig};

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test").join(name)
}

/// Runs nestest in automation mode ($C000) and diffs every trace line against the reference log.
/// Needs `test/nestest.nes` and `test/nestest.log`, which are not shipped.
#[test]
#[ignore]
fn matches_reference_log() {
    let log = fs::read_to_string(fixture("nestest.log")).unwrap();
    let mut console =
        Console::from_path(fixture("nestest.nes"), &EmulatorConfig::default()).unwrap();
    console.cpu_mut().pc = 0xC000;

    for (n, expected) in log.lines().enumerate() {
        let actual = console.trace();
        assert_eq!(actual, expected.trim_end(), "trace diverged at line {}", n + 1);
        console.step();
    }

    // Result codes: $02 = documented opcodes, $03 = undocumented opcodes. Zero means every test passed.
    assert_eq!(console.cpu().bus.ram[0x02], 0);
    assert_eq!(console.cpu().bus.ram[0x03], 0);
}
