//! Error types surfaced to the host.
//!
//! Only load-time structural failures and save-state decoding can fail; everything that happens
//! while the machine runs is total.

use thiserror::Error;

/// A ROM image that cannot become a cartridge.
#[derive(Error, Debug)]
pub enum RomError {
    #[error("ROM is too short to hold an iNES header ({0} bytes)")]
    TooShort(usize),
    #[error("missing iNES magic (expected \"NES\\x1A\")")]
    BadMagic,
    #[error("NES 2.0 headers are not supported")]
    Nes2Unsupported,
    #[error("ROM declares no PRG ROM")]
    NoPrg,
    #[error("truncated PRG ROM: expected {expected} bytes, found {actual}")]
    TruncatedPrg { expected: usize, actual: usize },
    #[error("truncated CHR ROM: expected {expected} bytes, found {actual}")]
    TruncatedChr { expected: usize, actual: usize },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A cartridge whose board is not emulated.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum MapperError {
    #[error("unsupported mapper {0}")]
    Unsupported(u8),
}

/// Anything that can go wrong turning a ROM file into a running console.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error(transparent)]
    Rom(#[from] RomError),
    #[error(transparent)]
    Mapper(#[from] MapperError),
}

/// Failure to produce or apply a save state.
#[derive(Error, Debug)]
pub enum StateError {
    #[error("failed to encode save state: {0}")]
    Encode(bincode::Error),
    #[error("failed to decode save state: {0}")]
    Decode(bincode::Error),
    #[error("not a save state (bad magic)")]
    BadMagic,
    #[error("save state version {found} does not match {expected}")]
    VersionMismatch { found: u16, expected: u16 },
    #[error("save state is for mapper {found}, cartridge uses mapper {expected}")]
    MapperMismatch { found: u8, expected: u8 },
    #[error("save state {0} has the wrong size")]
    SizeMismatch(&'static str),
    #[error("save state {0} is out of range")]
    OutOfRange(&'static str),
}
