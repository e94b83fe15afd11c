use beebdfs::blockdev::BlockSource;
use beebdfs::filesystem::Format;
use beebdfs::geometry::{Encoding, SectorBuffer, SECTOR_BYTES};
use beebdfs::probe::{identify_image, make_candidate_list, probe, probe_format};

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

/// Write a small valid Acorn catalog at `sector` declaring `total` sectors.
fn put_catalog(img: &mut [u8], sector: usize, total: u16) {
    let s0 = sector * SECTOR_BYTES;
    let s1 = s0 + SECTOR_BYTES;
    img[s0..s0 + 6].copy_from_slice(b"TITLE ");
    img[s1 + 4] = 0x01;
    img[s1 + 5] = 8; // one catalog entry
    img[s1 + 6] = ((total >> 8) & 3) as u8;
    img[s1 + 7] = (total & 0xFF) as u8;
    // $.A, 1 byte long, at sector 4 (clear of the Watford catalog area).
    img[s0 + 8..s0 + 15].copy_from_slice(b"A      ");
    img[s0 + 15] = b'$';
    img[s1 + 8 + 4] = 0x01;
    img[s1 + 8 + 7] = 4;
}

#[test]
fn test_candidate_hints_from_extension() {
    let all = make_candidate_list("image.img");
    assert_eq!(all.len(), 36); // 2 encodings x {1,2} sides x 3 tracks x spt x 2 interleavings
    let ssd = make_candidate_list("image.ssd");
    assert!(ssd
        .iter()
        .all(|c| !c.interleaved && c.geometry.encoding == Some(Encoding::Fm)));
    let ddd = make_candidate_list("image.ddd");
    assert!(ddd
        .iter()
        .all(|c| c.interleaved
            && c.geometry.heads == 2
            && c.geometry.encoding == Some(Encoding::Mfm)));
}
#[test]
fn test_acorn_format_detected() {
    let mut img = vec![0u8; 0x50 * SECTOR_BYTES];
    put_catalog(&mut img, 0, 0x50);
    let (format, total) = probe_format(&mut MemDisc(img)).unwrap();
    assert_eq!(format, Format::Acorn);
    assert_eq!(total, 0x50);
}
#[test]
fn test_garbage_is_unrecognized() {
    let img = vec![0xEEu8; 16 * SECTOR_BYTES];
    let err = probe_format(&mut MemDisc(img)).unwrap_err();
    assert!(matches!(err, beebdfs::Error::Unrecognized(_)));
}
#[test]
fn test_watford_recognition_bytes() {
    let mut img = vec![0u8; 0x50 * SECTOR_BYTES];
    put_catalog(&mut img, 0, 0x50);
    for i in 0..8 {
        img[2 * SECTOR_BYTES + i] = 0xAA;
    }
    img[3 * SECTOR_BYTES + 7] = 0x50; // second fragment's sector count
    let (format, _) = probe_format(&mut MemDisc(img)).unwrap();
    assert_eq!(format, Format::Watford);
}
#[test]
fn test_watford_defeated_by_file_at_sector_two() {
    // A DFS file whose body starts at sector 2 may begin with 0xAA bytes;
    // such a disc must not be taken for Watford DFS.
    let mut img = vec![0u8; 0x50 * SECTOR_BYTES];
    put_catalog(&mut img, 0, 0x50);
    img[SECTOR_BYTES + 8 + 7] = 2; // the file body starts in sector 2
    for i in 0..8 {
        img[2 * SECTOR_BYTES + i] = 0xAA; // the file body, not a catalog
    }
    let (format, _) = probe_format(&mut MemDisc(img)).unwrap();
    assert_eq!(format, Format::Acorn);
}
#[test]
fn test_hdfs_detected_by_catalog_bit() {
    let mut img = vec![0u8; 0x50 * SECTOR_BYTES];
    put_catalog(&mut img, 0, 0x50);
    img[SECTOR_BYTES + 6] |= 8;
    let (format, total) = probe_format(&mut MemDisc(img)).unwrap();
    assert_eq!(format, Format::Hdfs);
    assert_eq!(total, 0x50);
}
#[test]
fn test_double_sided_hdfs_is_unsupported() {
    let mut img = vec![0u8; 0x50 * SECTOR_BYTES];
    put_catalog(&mut img, 0, 0x50);
    img[SECTOR_BYTES + 6] |= 8 | 4;
    let err = probe_format(&mut MemDisc(img)).unwrap_err();
    assert!(matches!(err, beebdfs::Error::Unsupported(_)));
}
#[test]
fn test_opus_disc_catalogue_detected() {
    let mut img = vec![0u8; 720 * SECTOR_BYTES];
    put_catalog(&mut img, 0, 702); // volume A's root
    let s16 = 16 * SECTOR_BYTES;
    img[s16 + 1] = (720u16 >> 8) as u8;
    img[s16 + 2] = (720u16 & 0xFF) as u8;
    img[s16 + 3] = 18;
    img[s16 + 8] = 1; // volume A data starts at track 1
    let (format, total) = probe_format(&mut MemDisc(img.clone())).unwrap();
    assert_eq!(format, Format::OpusDdos);
    assert_eq!(total, 720);

    let (format, ff) = probe(&mut MemDisc(img), &make_candidate_list("disc.img")).unwrap();
    assert_eq!(format, Format::OpusDdos);
    assert_eq!(ff.geometry.cylinders, 40);
    assert_eq!(ff.geometry.sectors, 18);
    assert_eq!(ff.geometry.heads, 1);
}
#[test]
fn test_opus_rejected_when_sectors_per_track_wrong() {
    let mut img = vec![0u8; 720 * SECTOR_BYTES];
    put_catalog(&mut img, 0, 0x50);
    let s16 = 16 * SECTOR_BYTES;
    img[s16 + 1] = 2;
    img[s16 + 2] = 0xD0;
    img[s16 + 3] = 10; // not the Opus DDOS 18
    img[s16 + 8] = 1;
    let (format, _) = probe_format(&mut MemDisc(img)).unwrap();
    assert_eq!(format, Format::Acorn);
}
#[test]
fn test_forty_track_two_sided_vs_eighty_track_single() {
    // Two images of identical length; only the second catalog where side 1
    // would begin distinguishes them.
    let mut two_sided = vec![0u8; 800 * SECTOR_BYTES];
    put_catalog(&mut two_sided, 0, 400);
    put_catalog(&mut two_sided, 400, 400);
    let ff = identify_image(&mut MemDisc(two_sided), "disc.img").unwrap();
    assert_eq!(
        (ff.geometry.cylinders, ff.geometry.heads, ff.geometry.sectors),
        (40, 2, 10)
    );
    assert!(!ff.interleaved);

    let mut single_sided = vec![0u8; 800 * SECTOR_BYTES];
    put_catalog(&mut single_sided, 0, 400);
    let ff = identify_image(&mut MemDisc(single_sided), "disc.img").unwrap();
    assert_eq!(
        (ff.geometry.cylinders, ff.geometry.heads, ff.geometry.sectors),
        (80, 1, 10)
    );
}
#[test]
fn test_chosen_geometry_covers_whole_image() {
    // The guessed geometry always accounts for every byte of the file.
    let mut img = vec![0u8; 800 * SECTOR_BYTES];
    put_catalog(&mut img, 0, 400);
    let len = img.len() as u64;
    let ff = identify_image(&mut MemDisc(img), "disc.img").unwrap();
    assert!(u64::from(ff.geometry.total_sectors()) * SECTOR_BYTES as u64 >= len);
}
