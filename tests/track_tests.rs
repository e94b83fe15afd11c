use beebdfs::bits::BitStream;
use beebdfs::crc::Crc16;
use beebdfs::track::{
    check_track, decode_fm_track, decode_mfm_track, Sector, SectorAddress, DATA_ADDRESS_MARK,
    DELETED_DATA_ADDRESS_MARK, ID_ADDRESS_MARK,
};

fn push_bit(bits: &mut Vec<bool>, bit: bool) {
    bits.push(bit);
}

/// Append one FM byte: clock and data bits interleaved, clock bit first.
fn fm_byte(bits: &mut Vec<bool>, clock: u8, data: u8) {
    for i in (0..8).rev() {
        push_bit(bits, clock & (1 << i) != 0);
        push_bit(bits, data & (1 << i) != 0);
    }
}

/// Append an MFM byte; the decoder ignores clock bits, so they are zero.
fn mfm_byte(bits: &mut Vec<bool>, data: u8) {
    for i in (0..8).rev() {
        push_bit(bits, false);
        push_bit(bits, data & (1 << i) != 0);
    }
}

/// Append the A1 pre-mark with its deliberately missing clock: 0x4489.
fn mfm_premark(bits: &mut Vec<bool>) {
    for i in (0..16).rev() {
        push_bit(bits, 0x4489u16 & (1 << i) != 0);
    }
}

fn pack(bits: &[bool]) -> Vec<u8> {
    let mut out = vec![0u8; bits.len().div_ceil(8)];
    for (i, &bit) in bits.iter().enumerate() {
        if bit {
            out[i / 8] |= 0x80 >> (i % 8);
        }
    }
    out
}

fn crc_of(parts: &[&[u8]]) -> [u8; 2] {
    let mut crc = Crc16::new_ccitt();
    for part in parts {
        crc.update(part);
    }
    crc.get().to_be_bytes()
}

/// Encode one FM sector: gap, sync, ID field, gap, sync, data field.
fn fm_sector(bits: &mut Vec<bool>, address: SectorAddress, size_code: u8, data: &[u8], mark: u8) {
    for _ in 0..4 {
        fm_byte(bits, 0xFF, 0xFF); // gap
    }
    for _ in 0..6 {
        fm_byte(bits, 0xFF, 0x00); // sync
    }
    let id = [
        address.cylinder,
        address.head,
        address.record,
        size_code,
    ];
    let id_crc = crc_of(&[&[ID_ADDRESS_MARK], &id]);
    fm_byte(bits, 0xC7, ID_ADDRESS_MARK);
    for b in id.iter().chain(id_crc.iter()) {
        fm_byte(bits, 0xFF, *b);
    }
    for _ in 0..4 {
        fm_byte(bits, 0xFF, 0xFF); // gap 2
    }
    for _ in 0..6 {
        fm_byte(bits, 0xFF, 0x00); // sync
    }
    let data_crc = crc_of(&[&[mark], data]);
    fm_byte(bits, 0xC7, mark);
    for b in data.iter().chain(data_crc.iter()) {
        fm_byte(bits, 0xFF, *b);
    }
    for _ in 0..4 {
        fm_byte(bits, 0xFF, 0xFF); // gap 3
    }
}

fn mfm_sector(bits: &mut Vec<bool>, address: SectorAddress, size_code: u8, data: &[u8], mark: u8) {
    for _ in 0..8 {
        mfm_byte(bits, 0x00);
    }
    for _ in 0..3 {
        mfm_premark(bits);
    }
    let id = [
        address.cylinder,
        address.head,
        address.record,
        size_code,
    ];
    let id_crc = crc_of(&[&[ID_ADDRESS_MARK], &id]);
    mfm_byte(bits, ID_ADDRESS_MARK);
    for b in id.iter().chain(id_crc.iter()) {
        mfm_byte(bits, *b);
    }
    for _ in 0..8 {
        mfm_byte(bits, 0x00);
    }
    for _ in 0..3 {
        mfm_premark(bits);
    }
    let data_crc = crc_of(&[&[mark], data]);
    mfm_byte(bits, mark);
    for b in data.iter().chain(data_crc.iter()) {
        mfm_byte(bits, *b);
    }
    for _ in 0..4 {
        mfm_byte(bits, 0x00);
    }
}

fn addr(cylinder: u8, head: u8, record: u8) -> SectorAddress {
    SectorAddress {
        cylinder,
        head,
        record,
    }
}

#[test]
fn test_fm_decode_recovers_sector() {
    let payload: Vec<u8> = (0..=255u8).collect();
    let mut bits = Vec::new();
    fm_sector(&mut bits, addr(3, 0, 6), 1, &payload, DATA_ADDRESS_MARK);
    let track = pack(&bits);
    let sectors = decode_fm_track(&BitStream::new(&track));
    assert_eq!(sectors.len(), 1);
    assert_eq!(sectors[0].address, addr(3, 0, 6));
    assert_eq!(sectors[0].data, payload);
}
#[test]
fn test_fm_emitted_sector_crc_validates() {
    // CRC-16/CCITT over mark, data and stored CRC must give 0.
    let payload = vec![0x42u8; 256];
    let mut bits = Vec::new();
    fm_sector(&mut bits, addr(0, 0, 0), 1, &payload, DATA_ADDRESS_MARK);
    let track = pack(&bits);
    let sectors = decode_fm_track(&BitStream::new(&track));
    assert_eq!(sectors.len(), 1);
    let mut crc = Crc16::new_ccitt();
    crc.update(&[DATA_ADDRESS_MARK]);
    crc.update(&sectors[0].data);
    crc.update(&sectors[0].crc);
    assert_eq!(crc.get(), 0);
}
#[test]
fn test_fm_sector_sizes() {
    let payload = vec![0xA5u8; 128];
    let mut bits = Vec::new();
    fm_sector(&mut bits, addr(0, 0, 1), 0, &payload, DATA_ADDRESS_MARK);
    let track = pack(&bits);
    let sectors = decode_fm_track(&BitStream::new(&track));
    assert_eq!(sectors.len(), 1);
    assert_eq!(sectors[0].data.len(), 128);
}
#[test]
fn test_fm_deleted_record_is_discarded() {
    let payload = vec![0u8; 256];
    let mut bits = Vec::new();
    fm_sector(
        &mut bits,
        addr(0, 0, 0),
        1,
        &payload,
        DELETED_DATA_ADDRESS_MARK,
    );
    let track = pack(&bits);
    assert!(decode_fm_track(&BitStream::new(&track)).is_empty());
}
#[test]
fn test_fm_bad_crc_drops_sector() {
    let payload = vec![0u8; 256];
    let mut bits = Vec::new();
    fm_sector(&mut bits, addr(0, 0, 0), 1, &payload, DATA_ADDRESS_MARK);
    let mut track = pack(&bits);
    // Corrupt a data byte without touching the framing.
    let len = track.len();
    track[len - 30] ^= 0x02;
    assert!(decode_fm_track(&BitStream::new(&track)).is_empty());
}
#[test]
fn test_fm_multiple_sectors() {
    let mut bits = Vec::new();
    for record in 0..3u8 {
        let payload = vec![record; 256];
        fm_sector(&mut bits, addr(0, 0, record), 1, &payload, DATA_ADDRESS_MARK);
    }
    let track = pack(&bits);
    let sectors = decode_fm_track(&BitStream::new(&track));
    assert_eq!(sectors.len(), 3);
    for (record, sector) in sectors.iter().enumerate() {
        assert_eq!(sector.address.record, record as u8);
        assert_eq!(sector.data[0], record as u8);
    }
}
#[test]
fn test_mfm_decode_recovers_sector() {
    let payload: Vec<u8> = (0..=255u8).rev().collect();
    let mut bits = Vec::new();
    mfm_sector(&mut bits, addr(7, 1, 2), 1, &payload, DATA_ADDRESS_MARK);
    let track = pack(&bits);
    let sectors = decode_mfm_track(&BitStream::new(&track));
    assert_eq!(sectors.len(), 1);
    assert_eq!(sectors[0].address, addr(7, 1, 2));
    assert_eq!(sectors[0].data, payload);
}
#[test]
fn test_mfm_deleted_record_is_discarded() {
    let payload = vec![0u8; 256];
    let mut bits = Vec::new();
    mfm_sector(
        &mut bits,
        addr(0, 0, 0),
        1,
        &payload,
        DELETED_DATA_ADDRESS_MARK,
    );
    let track = pack(&bits);
    assert!(decode_mfm_track(&BitStream::new(&track)).is_empty());
}
fn sector_with(address: SectorAddress, len: usize) -> Sector {
    Sector {
        address,
        data: vec![0; len],
        crc: [0, 0],
    }
}
#[test]
fn test_check_track_accepts_well_formed_track() {
    let sectors = vec![
        sector_with(addr(5, 0, 0), 256),
        sector_with(addr(5, 0, 1), 256),
        sector_with(addr(5, 0, 2), 256),
    ];
    check_track(&sectors, 5, 0, 256).unwrap();
}
#[test]
fn test_check_track_rejects_duplicates_and_gaps() {
    let dup = vec![
        sector_with(addr(0, 0, 1), 256),
        sector_with(addr(0, 0, 1), 256),
    ];
    assert!(check_track(&dup, 0, 0, 256).is_err());
    let gap = vec![
        sector_with(addr(0, 0, 0), 256),
        sector_with(addr(0, 0, 2), 256),
    ];
    assert!(check_track(&gap, 0, 0, 256).is_err());
}
#[test]
fn test_check_track_rejects_misplaced_sectors() {
    let wrong_cyl = vec![sector_with(addr(9, 0, 0), 256)];
    assert!(check_track(&wrong_cyl, 1, 0, 256).is_err());
    let wrong_head = vec![sector_with(addr(1, 1, 0), 256)];
    assert!(check_track(&wrong_head, 1, 0, 256).is_err());
    let wrong_size = vec![sector_with(addr(1, 0, 0), 128)];
    assert!(check_track(&wrong_size, 1, 0, 256).is_err());
}
