use std::io::Write;

use beebdfs::blockdev::{
    media_handle, BlockDevice, BlockSource, Blockwise, FileView, Media, OsFile, SectorCache,
    DecompressedFile,
};
use beebdfs::geometry::{Encoding, Geometry, SECTOR_BYTES};
use flate2::write::GzEncoder;
use flate2::Compression;
use tempfile::NamedTempFile;

fn patterned_image(sectors: usize) -> Vec<u8> {
    let mut data = vec![0u8; sectors * SECTOR_BYTES];
    for (i, chunk) in data.chunks_mut(SECTOR_BYTES).enumerate() {
        chunk.fill(i as u8);
    }
    data
}

fn media_for(data: &[u8]) -> (beebdfs::blockdev::MediaHandle, NamedTempFile) {
    let mut temp = NamedTempFile::new().unwrap();
    temp.write_all(data).unwrap();
    temp.flush().unwrap();
    let file = OsFile::open(temp.path()).unwrap();
    (media_handle(Media::Os(file)), temp)
}

fn geom(c: u32, s: u32) -> Geometry {
    Geometry::new(c, 1, s, Some(Encoding::Fm))
}

#[test]
fn test_blockwise_reads_and_eof() {
    let (media, _temp) = media_for(&patterned_image(4));
    let mut blocks = Blockwise::new(media);
    assert_eq!(blocks.read_block(0).unwrap().unwrap()[0], 0);
    assert_eq!(blocks.read_block(3).unwrap().unwrap()[0], 3);
    assert!(blocks.read_block(4).unwrap().is_none());
}
#[test]
fn test_truncated_sector_is_zero_padded() {
    let mut data = patterned_image(2);
    data.truncate(SECTOR_BYTES + 10);
    let (media, _temp) = media_for(&data);
    let mut blocks = Blockwise::new(media);
    let buf = blocks.read_block(1).unwrap().unwrap();
    assert_eq!(buf[9], 1);
    assert_eq!(buf[10], 0);
}
#[test]
fn test_identity_view_matches_underlying() {
    let (media, _temp) = media_for(&patterned_image(8));
    let mut view = FileView::new(media.clone(), "view".to_string(), geom(4, 2), 0, 8, 0, 8);
    let mut raw = Blockwise::new(media);
    for lba in 0..8 {
        assert_eq!(
            view.read_block(lba).unwrap(),
            raw.read_block(lba).unwrap(),
            "mismatch at lba {lba}"
        );
    }
    assert!(view.read_block(8).unwrap().is_none());
}
#[test]
fn test_interleaved_views() {
    // Two sides, two sectors per track: container order is
    // s0t0 s0t0 s1t0 s1t0 s0t1 s0t1 s1t1 s1t1.
    let (media, _temp) = media_for(&patterned_image(8));
    let mut side0 = FileView::new(media.clone(), "side 0".to_string(), geom(2, 2), 0, 2, 2, 4);
    let mut side1 = FileView::new(media.clone(), "side 1".to_string(), geom(2, 2), 2, 2, 2, 4);
    let side0_sectors: Vec<u8> = (0..4)
        .map(|lba| side0.read_block(lba).unwrap().unwrap()[0])
        .collect();
    let side1_sectors: Vec<u8> = (0..4)
        .map(|lba| side1.read_block(lba).unwrap().unwrap()[0])
        .collect();
    assert_eq!(side0_sectors, vec![0, 1, 4, 5]);
    assert_eq!(side1_sectors, vec![2, 3, 6, 7]);
}
#[test]
fn test_initial_skip_addresses_an_mmb_slot() {
    // Slot 3 of an MMB file starts at sector 32 + 3 * 800.
    let skip = 32 + 3 * 800;
    let mut data = vec![0u8; (skip + 1) * SECTOR_BYTES];
    let off = skip * SECTOR_BYTES;
    data[off..off + 4].copy_from_slice(b"SLOT");
    let (media, _temp) = media_for(&data);
    let mut view = FileView::new(
        media,
        "slot 3".to_string(),
        geom(80, 10),
        skip as u64,
        800,
        0,
        800,
    );
    let buf = view.read_block(0).unwrap().unwrap();
    assert_eq!(&buf[..4], b"SLOT");
}
#[test]
fn test_unformatted_view_reads_nothing() {
    let view = FileView::unformatted("absent".to_string(), geom(80, 10));
    assert!(!view.is_formatted());
    let mut view = view;
    assert!(view.read_block(0).unwrap().is_none());
    assert!(view.read_block(799).unwrap().is_none());
}
#[test]
fn test_decompressed_media() {
    let image = patterned_image(4);
    let mut temp = tempfile::Builder::new().suffix(".ssd.gz").tempfile().unwrap();
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&image).unwrap();
    temp.write_all(&encoder.finish().unwrap()).unwrap();
    temp.flush().unwrap();

    let file = DecompressedFile::open(temp.path()).unwrap();
    let mut blocks = Blockwise::new(media_handle(Media::Decompressed(file)));
    assert_eq!(blocks.read_block(2).unwrap().unwrap()[0], 2);
    assert!(blocks.read_block(4).unwrap().is_none());
}
#[test]
fn test_missing_file_reports_path() {
    let err = OsFile::open("/nonexistent/image.ssd").unwrap_err();
    assert!(err.to_string().contains("image.ssd"));
}
#[test]
fn test_sector_cache_serves_repeat_reads() {
    let (media, _temp) = media_for(&patterned_image(8));
    let view = FileView::new(media, "cached".to_string(), geom(4, 2), 0, 8, 0, 8);
    let mut cache = SectorCache::new(Box::new(view), 4);
    let first = cache.read_block(1).unwrap().unwrap();
    let again = cache.read_block(1).unwrap().unwrap();
    assert_eq!(first, again);
    assert_eq!(cache.geometry(), geom(4, 2));
    assert!(cache.read_block(99).unwrap().is_none());
}
