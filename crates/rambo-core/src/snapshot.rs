//! Versioned machine snapshots.
//!
//! Layout: a small envelope (magic, version, mapper id, machine config)
//! followed by the postcard-serialized machine state, including PRG RAM
//! and CHR RAM inside the mapper blob. Decoding rejects unknown versions,
//! foreign mappers, and mismatched region/variant configuration before any
//! state is touched.

use serde::{Deserialize, Serialize};

use crate::apu::Apu;
use crate::bus::OpenBus;
use crate::cartridge::Mapper;
use crate::clock::Clock;
use crate::controller::Controller;
use crate::cpu::Cpu;
use crate::dma::{DmcDma, OamDma};
use crate::error::SnapshotError;
use crate::nes::MachineConfig;
use crate::ppu::Ppu;

const MAGIC: [u8; 4] = *b"RMBS";
pub const VERSION: u16 = 1;

#[derive(Serialize, Deserialize)]
struct Snapshot {
    magic: [u8; 4],
    version: u16,
    mapper_id: u16,
    config: MachineConfig,
    state: MachineState,
}

/// Everything gameplay-visible.
#[derive(Serialize, Deserialize)]
pub(crate) struct MachineState {
    pub cpu: Cpu,
    pub ppu: Ppu,
    pub apu: Apu,
    pub clock: Clock,
    pub ram: Vec<u8>,
    pub controllers: [Controller; 2],
    pub open_bus: OpenBus,
    pub oam_dma: OamDma,
    pub dmc_dma: DmcDma,
    pub oam_dma_request: Option<u8>,
    pub mapper: Mapper,
}

pub(crate) fn encode(
    mapper_id: u16,
    config: MachineConfig,
    state: MachineState,
) -> Result<Vec<u8>, SnapshotError> {
    let snapshot = Snapshot {
        magic: MAGIC,
        version: VERSION,
        mapper_id,
        config,
        state,
    };
    Ok(postcard::to_allocvec(&snapshot)?)
}

pub(crate) fn decode(
    bytes: &[u8],
    expected_mapper: u16,
    expected_config: MachineConfig,
) -> Result<MachineState, SnapshotError> {
    let snapshot: Snapshot = postcard::from_bytes(bytes).map_err(|err| match err {
        postcard::Error::DeserializeUnexpectedEnd => SnapshotError::Truncated,
        other => SnapshotError::Codec(other),
    })?;

    if snapshot.magic != MAGIC {
        return Err(SnapshotError::VersionMismatch {
            expected: VERSION,
            found: 0,
        });
    }
    if snapshot.version != VERSION {
        return Err(SnapshotError::VersionMismatch {
            expected: VERSION,
            found: snapshot.version,
        });
    }
    if snapshot.mapper_id != expected_mapper {
        return Err(SnapshotError::UnsupportedMapper {
            expected: expected_mapper,
            found: snapshot.mapper_id,
        });
    }
    if snapshot.config != expected_config {
        return Err(SnapshotError::ConfigMismatch);
    }
    Ok(snapshot.state)
}
