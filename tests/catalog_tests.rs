use beebdfs::blockdev::BlockSource;
use beebdfs::catalog::{sign_extend, BootSetting, Catalog, CatalogFragment};
use beebdfs::commands::inf_line;
use beebdfs::crc::Crc16;
use beebdfs::filesystem::{FileSystem, Format};
use beebdfs::geometry::{Encoding, Geometry, SectorBuffer, SECTOR_BYTES};
use beebdfs::names::{parse_filename, DfsContext, SurfaceSelector};

struct MemDisc(Vec<u8>);

impl BlockSource for MemDisc {
    fn read_block(&mut self, lba: u64) -> beebdfs::Result<Option<SectorBuffer>> {
        let start = lba as usize * SECTOR_BYTES;
        if start >= self.0.len() {
            return Ok(None);
        }
        let mut buf = [0u8; SECTOR_BYTES];
        let end = (start + SECTOR_BYTES).min(self.0.len());
        buf[..end - start].copy_from_slice(&self.0[start..end]);
        Ok(Some(buf))
    }
}

fn put_entry(
    img: &mut [u8],
    slot: usize,
    name: &[u8; 7],
    dir: u8,
    load: u32,
    exec: u32,
    len: u32,
    start: u16,
) {
    let name_off = slot * 8;
    img[name_off..name_off + 7].copy_from_slice(name);
    img[name_off + 7] = dir;
    let md = SECTOR_BYTES + slot * 8;
    img[md] = (load & 0xFF) as u8;
    img[md + 1] = ((load >> 8) & 0xFF) as u8;
    img[md + 2] = (exec & 0xFF) as u8;
    img[md + 3] = ((exec >> 8) & 0xFF) as u8;
    img[md + 4] = (len & 0xFF) as u8;
    img[md + 5] = ((len >> 8) & 0xFF) as u8;
    img[md + 6] = ((start >> 8) & 3) as u8
        | (((load >> 16) & 3) << 2) as u8
        | (((len >> 16) & 3) << 4) as u8
        | (((exec >> 16) & 3) << 6) as u8;
    img[md + 7] = (start & 0xFF) as u8;
    img[SECTOR_BYTES + 5] = img[SECTOR_BYTES + 5].max((slot * 8) as u8);
}

/// An 0x50-sector SSD holding one file, $.PROG, at sector 2.
fn minimal_disc() -> Vec<u8> {
    let mut img = vec![0u8; 0x50 * SECTOR_BYTES];
    img[..8].copy_from_slice(b"HELLO   ");
    img[SECTOR_BYTES + 4] = 0x01; // sequence number
    img[SECTOR_BYTES + 6] = 0x00; // boot off, high sector bits 0
    img[SECTOR_BYTES + 7] = 0x50;
    put_entry(&mut img, 1, b"PROG   ", b'$', 0x1900, 0x1900, 0x100, 2);
    for i in 0..SECTOR_BYTES {
        img[2 * SECTOR_BYTES + i] = i as u8;
    }
    img
}

#[test]
fn test_minimal_catalog() {
    let mut disc = MemDisc(minimal_disc());
    let catalog = Catalog::read(Format::Acorn, 0, &mut disc).unwrap();
    assert_eq!(catalog.title(), "HELLO");
    assert_eq!(catalog.sequence_number(), Some(1));
    assert_eq!(catalog.boot_setting(), BootSetting::None);
    assert_eq!(catalog.total_sectors(), 0x50);
    assert_eq!(catalog.max_file_count(), 31);
    let entries = catalog.entries();
    assert_eq!(entries.len(), 1);
    let entry = entries[0];
    assert_eq!(entry.name(), "PROG");
    assert_eq!(entry.directory(), '$');
    assert_eq!(entry.full_name(), "$.PROG");
    assert!(!entry.is_locked());
    assert_eq!(entry.load_address(), 0x1900);
    assert_eq!(entry.exec_address(), 0x1900);
    assert_eq!(entry.file_length(), 0x100);
    assert_eq!(entry.start_sector(), 2);
    assert_eq!(entry.last_sector(), 2);
    catalog.validate().unwrap();
}
#[test]
fn test_find_is_case_insensitive() {
    let mut disc = MemDisc(minimal_disc());
    let catalog = Catalog::read(Format::Acorn, 0, &mut disc).unwrap();
    let ctx = DfsContext::default();
    let wanted = parse_filename(&ctx, "prog").unwrap();
    assert!(catalog.find(&wanted).is_some());
    let missing = parse_filename(&ctx, "B.prog").unwrap();
    assert!(catalog.find(&missing).is_none());
}
#[test]
fn test_visit_file_body() {
    let mut disc = MemDisc(minimal_disc());
    let catalog = Catalog::read(Format::Acorn, 0, &mut disc).unwrap();
    let entry = catalog.entries()[0].clone();
    let mut body = Vec::new();
    entry
        .visit_file_body(&mut disc, 0x50, &mut |piece| {
            body.extend_from_slice(piece);
            Ok(())
        })
        .unwrap();
    assert_eq!(body.len(), 0x100);
    assert_eq!(body[0], 0);
    assert_eq!(body[255], 255);
}
#[test]
fn test_body_beyond_media_is_rejected() {
    let mut img = minimal_disc();
    // Make the file start close to the declared end so it pokes past it.
    img[SECTOR_BYTES + 8 + 7] = 0x4F;
    img[SECTOR_BYTES + 8 + 5] = 0x02; // two sectors long
    let mut disc = MemDisc(img);
    let catalog = Catalog::read(Format::Acorn, 0, &mut disc).unwrap();
    assert!(catalog.validate().is_err());
    let entry = catalog.entries()[0].clone();
    let err = entry
        .visit_file_body(&mut disc, 0x50, &mut |_| Ok(()))
        .unwrap_err();
    assert!(matches!(err, beebdfs::Error::BadFileSystem(_)));
}
#[test]
fn test_entry_offset_must_be_multiple_of_eight() {
    let mut img = minimal_disc();
    img[SECTOR_BYTES + 5] = 12;
    let mut disc = MemDisc(img);
    let catalog = Catalog::read(Format::Acorn, 0, &mut disc).unwrap();
    assert!(catalog.validate().is_err());
}
#[test]
fn test_sign_extension() {
    assert_eq!(sign_extend(0x3F1900), 0xFF1900);
    assert_eq!(sign_extend(0x001900), 0x001900);
}
#[test]
fn test_eighteen_bit_fields() {
    let mut img = vec![0u8; 4 * SECTOR_BYTES];
    img[SECTOR_BYTES + 7] = 0xFF;
    img[SECTOR_BYTES + 6] = 0x03; // 0x3FF total sectors
    put_entry(&mut img, 1, b"BIG    ", b'$' | 0x80, 0x31900, 0x38023, 0x20000, 3);
    let names: SectorBuffer = img[..SECTOR_BYTES].try_into().unwrap();
    let metadata: SectorBuffer = img[SECTOR_BYTES..2 * SECTOR_BYTES].try_into().unwrap();
    let fragment = CatalogFragment::parse(Format::Acorn, 0, &names, &metadata);
    assert_eq!(fragment.total_sectors(), 0x3FF);
    let entry = &fragment.entries()[0];
    assert!(entry.is_locked());
    assert_eq!(entry.load_address(), 0x31900);
    assert_eq!(entry.exec_address(), 0x38023);
    assert_eq!(entry.file_length(), 0x20000);
}
#[test]
fn test_watford_catalog_has_two_fragments() {
    let mut img = vec![0u8; 0x50 * SECTOR_BYTES];
    img[..8].copy_from_slice(b"WATFORD ");
    img[SECTOR_BYTES + 5] = 8;
    img[SECTOR_BYTES + 7] = 0x50;
    put_entry(&mut img, 1, b"FIRST  ", b'$', 0, 0, 0x100, 4);
    // Second fragment at sectors 2/3, introduced by the recognition bytes.
    for i in 0..8 {
        img[2 * SECTOR_BYTES + i] = 0xAA;
    }
    img[3 * SECTOR_BYTES + 5] = 8;
    img[3 * SECTOR_BYTES + 7] = 0x50;
    let base = 2 * SECTOR_BYTES;
    img[base + 8..base + 15].copy_from_slice(b"EXTRA  ");
    img[base + 15] = b'B';
    img[3 * SECTOR_BYTES + 8 + 4] = 0x80; // 0x80 bytes long
    img[3 * SECTOR_BYTES + 8 + 7] = 5; // start sector

    let mut disc = MemDisc(img);
    let catalog = Catalog::read(Format::Watford, 0, &mut disc).unwrap();
    assert_eq!(catalog.fragments().len(), 2);
    assert_eq!(catalog.max_file_count(), 62);
    let entries = catalog.entries();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].full_name(), "$.FIRST");
    assert_eq!(entries[1].full_name(), "B.EXTRA");
    let ctx = DfsContext::default();
    let wanted = parse_filename(&ctx, "B.EXTRA").unwrap();
    assert!(catalog.find(&wanted).is_some());
}
#[test]
fn test_sector_ownership_map() {
    let mut disc = MemDisc(minimal_disc());
    let fs = FileSystem::mount(
        &mut disc,
        Format::Acorn,
        Geometry::new(8, 1, 10, Some(Encoding::Fm)),
    )
    .unwrap();
    let map = fs.sector_map(SurfaceSelector(0));
    assert_eq!(map.at(0), Some("catalog"));
    assert_eq!(map.at(1), Some("catalog"));
    assert_eq!(map.at(2), Some("$.PROG"));
    assert_eq!(map.at(3), None);
}
#[test]
fn test_inf_line_format() {
    let mut disc = MemDisc(minimal_disc());
    let catalog = Catalog::read(Format::Acorn, 0, &mut disc).unwrap();
    let entry = catalog.entries()[0].clone();
    let mut body = Vec::new();
    entry
        .visit_file_body(&mut disc, 0x50, &mut |piece| {
            body.extend_from_slice(piece);
            Ok(())
        })
        .unwrap();
    let mut crc = Crc16::new_tape();
    crc.update(&body);
    let line = inf_line(&entry, crc.get());
    assert!(line.starts_with("$.PROG 001900 001900 000100 CRC="));
    assert!(line.ends_with('\n'));
    // Sign extension shows up in the .inf file too.
    let mut img = minimal_disc();
    img[SECTOR_BYTES + 8 + 6] |= 3 << 2; // load address top bits
    let mut disc = MemDisc(img);
    let catalog = Catalog::read(Format::Acorn, 0, &mut disc).unwrap();
    let line = inf_line(&catalog.entries()[0], 0);
    assert!(line.starts_with("$.PROG FF1900 001900 000100 CRC=0000"));
}
