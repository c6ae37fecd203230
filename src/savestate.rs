//! Versioned machine snapshots.
//!
//! Layout: the 4-byte magic `VSPR`, a little-endian `u16` format version, then a bincode-encoded
//! [`MachineState`]. Each component owns its own `*State` struct; changing any of them means
//! bumping [`STATE_VERSION`]. Where the bytes end up is the host's business.

use serde::{Deserialize, Serialize};

use crate::apu::apu::ApuState;
use crate::bus::BusState;
use crate::cartridge::mapper::mapper::MapperState;
use crate::cpu::cpu::CpuState;
use crate::error::StateError;
use crate::ppu::ppu::PpuState;

pub const STATE_MAGIC: [u8; 4] = *b"VSPR";
pub const STATE_VERSION: u16 = 1;

const PREAMBLE_LEN: usize = STATE_MAGIC.len() + 2;

/// Everything needed to resume a console bit-identically.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MachineState {
    pub cpu: CpuState,
    pub ppu: PpuState,
    pub apu: ApuState,
    pub bus: BusState,
    pub mapper: MapperState,
}

impl MachineState {
    pub fn encode(&self) -> Result<Vec<u8>, StateError> {
        let body = bincode::serialize(self).map_err(StateError::Encode)?;
        let mut bytes = Vec::with_capacity(PREAMBLE_LEN + body.len());
        bytes.extend_from_slice(&STATE_MAGIC);
        bytes.extend_from_slice(&STATE_VERSION.to_le_bytes());
        bytes.extend_from_slice(&body);
        Ok(bytes)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, StateError> {
        if bytes.len() < PREAMBLE_LEN || bytes[..4] != STATE_MAGIC {
            return Err(StateError::BadMagic);
        }
        let version = u16::from_le_bytes([bytes[4], bytes[5]]);
        if version != STATE_VERSION {
            return Err(StateError::VersionMismatch {
                found: version,
                expected: STATE_VERSION,
            });
        }
        bincode::deserialize(&bytes[PREAMBLE_LEN..]).map_err(StateError::Decode)
    }
}
