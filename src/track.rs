//! FM and MFM track decoding: recovering sectors from a raw bitstream.
//!
//! The input is the bit sequence as it passed under the head, MSB-first
//! within each byte (the container readers normalise bit order before we see
//! it). FM stores each on-disc byte as 16 bits with clock and data
//! interleaved (cDcDcDcD...); address marks are distinguished by abnormal
//! clock patterns. MFM synchronises on the A1 pre-mark byte written with a
//! deliberately missing clock bit, which appears as the 16-bit pattern
//! 0x4489.

use log::{debug, warn};

use crate::bits::BitStream;
use crate::crc::Crc16;
use crate::error::{Error, Result};

pub const ID_ADDRESS_MARK: u8 = 0xFE;
pub const DATA_ADDRESS_MARK: u8 = 0xFB;
pub const DELETED_DATA_ADDRESS_MARK: u8 = 0xF8;

/// The three-byte identity of a sector on a track. Acorn DFS records are
/// numbered from 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SectorAddress {
    pub cylinder: u8,
    pub head: u8,
    pub record: u8,
}

impl std::fmt::Display for SectorAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({},{},{})", self.cylinder, self.head, self.record)
    }
}

#[derive(Debug, Clone)]
pub struct Sector {
    pub address: SectorAddress,
    pub data: Vec<u8>,
    pub crc: [u8; 2],
}

fn decode_sector_size(code: u8) -> Option<usize> {
    match code {
        0 => Some(128),
        1 => Some(256),
        2 => Some(512),
        3 => Some(1024),
        _ => None,
    }
}

/// Read one FM byte (16 bits) at `pos`, returning (clock, data).
fn read_fm_byte(bits: &BitStream, pos: &mut usize) -> Option<(u8, u8)> {
    if *pos + 16 > bits.len() {
        return None;
    }
    let mut clock = 0u8;
    let mut data = 0u8;
    for _ in 0..8 {
        clock = (clock << 1) | u8::from(bits.get(*pos));
        *pos += 1;
        data = (data << 1) | u8::from(bits.get(*pos));
        *pos += 1;
    }
    Some((clock, data))
}

/// Copy `out.len()` byte-aligned FM bytes; every byte must carry the normal
/// 0xFF clock or we have lost synchronisation.
fn copy_fm_bytes(bits: &BitStream, pos: &mut usize, out: &mut [u8]) -> bool {
    for slot in out.iter_mut() {
        match read_fm_byte(bits, pos) {
            Some((0xFF, data)) => *slot = data,
            Some((clock, _)) => {
                debug!("desynced while reading FM data bytes (clock {clock:#04X})");
                return false;
            }
            None => {
                debug!("end of track while reading FM data bytes");
                return false;
            }
        }
    }
    true
}

/// Copy byte-aligned MFM bytes. MFM clock patterns depend on neighbouring
/// data bits, so they are not verified here.
fn copy_mfm_bytes(bits: &BitStream, pos: &mut usize, out: &mut [u8]) -> bool {
    for slot in out.iter_mut() {
        if *pos + 16 > bits.len() {
            debug!("end of track while reading MFM data bytes");
            return false;
        }
        let mut data = 0u8;
        for _ in 0..8 {
            *pos += 1; // clock bit
            data = (data << 1) | u8::from(bits.get(*pos));
            *pos += 1;
        }
        *slot = data;
    }
    true
}

enum FmState {
    Desynced,
    LookingForAddress,
    LookingForRecord,
}

/// Decode an FM bit train into zero or more data sectors. Control (deleted)
/// records and sectors failing their CRC are dropped.
pub fn decode_fm_track(bits: &BitStream) -> Vec<Sector> {
    let mut result = Vec::new();
    let mut pos = 0usize;
    let mut state = FmState::Desynced;
    let mut address = SectorAddress {
        cylinder: 0,
        head: 0,
        record: 0,
    };
    let mut sec_size = 0usize;

    while pos < bits.len() {
        match state {
            FmState::Desynced => {
                // The sync field is clock 0xFF, data 0x00: bit pattern 0xAAAA.
                match bits.scan_for(pos, 0xAAAA, 0xFFFF) {
                    Some((end, _)) => {
                        pos = end + 1;
                        state = FmState::LookingForAddress;
                    }
                    None => break,
                }
            }
            FmState::LookingForAddress => {
                // 0xF57E encodes clock 0xC7, data 0xFE: the sector ID mark.
                let found = bits.scan_for(pos, 0xF57E, 0xFFFF);
                let end = match found {
                    Some((end, _)) => end,
                    None => break,
                };
                pos = end + 1;
                // id holds mark, cylinder, head, record, size code and the
                // two CRC bytes; hashing the lot must give zero.
                let mut id = [0u8; 7];
                id[0] = ID_ADDRESS_MARK;
                if !copy_fm_bytes(bits, &mut pos, &mut id[1..]) {
                    debug!("failed to read sector address");
                    state = FmState::Desynced;
                    continue;
                }
                let mut crc = Crc16::new_ccitt();
                crc.update(&id);
                if crc.get() != 0 {
                    debug!("sector address CRC mismatch: {:#06X} should be 0", crc.get());
                    state = FmState::Desynced;
                    continue;
                }
                address = SectorAddress {
                    cylinder: id[1],
                    head: id[2],
                    record: id[3],
                };
                match decode_sector_size(id[4]) {
                    Some(size) => sec_size = size,
                    None => {
                        debug!("unexpected sector size code {:#04X}", id[4]);
                        state = FmState::Desynced;
                        continue;
                    }
                }
                state = FmState::LookingForRecord;
            }
            FmState::LookingForRecord => {
                // 0xF56F is the data record mark, 0xF56A the control
                // (deleted) record mark; their conjunction is 0xF56A so we
                // scan for that and inspect what arrived.
                let mut found = None;
                while pos < bits.len() {
                    let searched_from = pos;
                    match bits.scan_for(pos, 0xF56A, 0xFFFA) {
                        Some((end, shifter)) if shifter == 0xF56A || shifter == 0xF56F => {
                            found = Some((end + 1, shifter));
                            break;
                        }
                        Some(_) => {
                            // A third pattern such as 0xF56B; resume one bit on.
                            pos = searched_from + 1;
                        }
                        None => {
                            pos = bits.len();
                            break;
                        }
                    }
                }
                let (next, shifter) = match found {
                    Some(f) => f,
                    None => break,
                };
                pos = next;
                let discard_record = shifter == 0xF56A;
                let mark = if discard_record {
                    DELETED_DATA_ADDRESS_MARK
                } else {
                    DATA_ADDRESS_MARK
                };
                let mut data = vec![0u8; sec_size + 2]; // data plus CRC
                if !copy_fm_bytes(bits, &mut pos, &mut data) {
                    debug!("lost sync in sector data");
                    state = FmState::Desynced;
                    continue;
                }
                let mut crc = Crc16::new_ccitt();
                crc.update(&[mark]);
                crc.update(&data);
                if crc.get() != 0 && !discard_record {
                    debug!("sector data CRC mismatch: {:#06X} should be 0", crc.get());
                    state = FmState::Desynced;
                    continue;
                }
                if discard_record {
                    debug!("dropping control record at {address}");
                } else {
                    let crc_bytes = [data[sec_size], data[sec_size + 1]];
                    data.truncate(sec_size);
                    result.push(Sector {
                        address,
                        data,
                        crc: crc_bytes,
                    });
                }
                state = FmState::Desynced;
            }
        }
    }
    result
}

enum MfmState {
    LookingForAddress,
    LookingForRecord,
}

/// Decode an MFM bit train into zero or more data sectors.
pub fn decode_mfm_track(bits: &BitStream) -> Vec<Sector> {
    let mut result = Vec::new();
    let mut pos = 0usize;
    let mut state = MfmState::LookingForAddress;
    let mut address = SectorAddress {
        cylinder: 0,
        head: 0,
        record: 0,
    };
    let mut sec_size = 0usize;

    loop {
        // Synchronise on the A1 pre-mark (0xA1 with a missing clock bit).
        let end = match bits.scan_for(pos, 0x4489, 0xFFFF) {
            Some((end, _)) => end,
            None => break,
        };
        pos = end + 1;
        // Two more A1 pre-mark bytes precede the mark proper.
        let mut premark = [0u8; 2];
        if !copy_mfm_bytes(bits, &mut pos, &mut premark) {
            debug!("desynced while reading the tail of the pre-mark run");
            state = MfmState::LookingForAddress;
            continue;
        }

        match state {
            MfmState::LookingForAddress => {
                let mut header = [0u8; 7];
                if !copy_mfm_bytes(bits, &mut pos, &mut header) {
                    continue;
                }
                let mut crc = Crc16::new_ccitt();
                crc.update(&header);
                if crc.get() != 0 {
                    debug!("sector header CRC mismatch: {:#06X} should be 0", crc.get());
                    continue;
                }
                if header[0] != ID_ADDRESS_MARK {
                    // Not a sector ID, however the CRC matched.
                    debug!("address mark {:#04X} is not a sector ID", header[0]);
                    continue;
                }
                address = SectorAddress {
                    cylinder: header[1],
                    head: header[2],
                    record: header[3],
                };
                match decode_sector_size(header[4]) {
                    Some(size) => sec_size = size,
                    None => {
                        debug!("unexpected sector size code {:#04X}", header[4]);
                        continue;
                    }
                }
                state = MfmState::LookingForRecord;
            }
            MfmState::LookingForRecord => {
                // Mark byte, the data, then two CRC bytes.
                let mut mark_and_data = vec![0u8; sec_size + 3];
                if !copy_mfm_bytes(bits, &mut pos, &mut mark_and_data) {
                    state = MfmState::LookingForAddress;
                    continue;
                }
                let mut crc = Crc16::new_ccitt();
                crc.update(&mark_and_data);
                if crc.get() != 0 {
                    debug!("sector data CRC mismatch: {:#06X} should be 0", crc.get());
                    state = MfmState::LookingForAddress;
                    continue;
                }
                if mark_and_data[0] == DATA_ADDRESS_MARK {
                    let crc_bytes = [mark_and_data[sec_size + 1], mark_and_data[sec_size + 2]];
                    result.push(Sector {
                        address,
                        data: mark_and_data[1..=sec_size].to_vec(),
                        crc: crc_bytes,
                    });
                } else {
                    debug!("dropping control record at {address}");
                }
                state = MfmState::LookingForAddress;
            }
        }
    }
    result
}

/// Validate the sectors decoded from one physical track. `sectors` must
/// already be sorted by address.
pub fn check_track(sectors: &[Sector], cylinder: u32, head: u32, block_size: usize) -> Result<()> {
    let mut prev_record: Option<u8> = None;
    for sector in sectors {
        if u32::from(sector.address.head) != head {
            return Err(Error::Unsupported(format!(
                "found sector with address {} in the data for side {}",
                sector.address, head
            )));
        }
        if u32::from(sector.address.cylinder) != cylinder {
            return Err(Error::Unsupported(format!(
                "found sector with address {} in the data for track {}",
                sector.address, cylinder
            )));
        }
        match prev_record {
            Some(prev) if prev == sector.address.record => {
                return Err(Error::Unsupported(format!(
                    "sector with address {} has a duplicate record number",
                    sector.address
                )));
            }
            Some(prev) if prev + 1 < sector.address.record => {
                return Err(Error::Unsupported(format!(
                    "before sector with address {} there is no sector with record number {}",
                    sector.address,
                    prev + 1
                )));
            }
            Some(_) => {}
            None => {
                if sector.address.record != 0 {
                    warn!(
                        "the lowest-numbered sector of track {} has record number {} instead of 0",
                        cylinder, sector.address.record
                    );
                }
            }
        }
        if sector.data.len() != block_size {
            return Err(Error::Unsupported(format!(
                "track {} contains a sector with address {} of unsupported size {}",
                cylinder,
                sector.address,
                sector.data.len()
            )));
        }
        prev_record = Some(sector.address.record);
    }
    Ok(())
}
