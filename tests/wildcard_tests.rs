use beebdfs::names::{
    parse_filename, qualify, DfsContext, SurfaceSelector, VolumeSelector, WildcardMatcher,
};
use proptest::prelude::*;

fn ctx() -> DfsContext {
    DfsContext::default()
}

#[test]
fn test_parse_bare_name() {
    let parsed = parse_filename(&ctx(), "PROG").unwrap();
    assert_eq!(parsed.vol, VolumeSelector::new(0));
    assert_eq!(parsed.dir, '$');
    assert_eq!(parsed.name, "PROG");
}
#[test]
fn test_parse_directory_and_drive() {
    let parsed = parse_filename(&ctx(), ":2.B.DATA").unwrap();
    assert_eq!(parsed.vol, VolumeSelector::new(2));
    assert_eq!(parsed.dir, 'B');
    assert_eq!(parsed.name, "DATA");
}
#[test]
fn test_parse_opus_subvolume() {
    let parsed = parse_filename(&ctx(), ":0B.$.MENU").unwrap();
    assert_eq!(parsed.vol, VolumeSelector::with_subvolume(0, 'B'));
    assert_eq!(parsed.name, "MENU");
}
#[test]
fn test_parse_rejects_bad_drive() {
    assert!(parse_filename(&ctx(), ":X.FOO").is_err());
    assert!(parse_filename(&ctx(), ":0FOO").is_err());
}
#[test]
fn test_surface_selector_parse() {
    assert_eq!(SurfaceSelector::parse("12rest"), Ok((SurfaceSelector(12), 2)));
    assert!(SurfaceSelector::parse("drive").is_err());
}
#[test]
fn test_qualify_fills_in_context() {
    assert_eq!(qualify(&ctx(), "PROG").unwrap(), ":0.$.PROG");
    assert_eq!(qualify(&ctx(), "B.PROG").unwrap(), ":0.B.PROG");
    assert_eq!(qualify(&ctx(), ":3.PROG").unwrap(), ":3.$.PROG");
}
#[test]
fn test_qualify_is_idempotent() {
    let once = qualify(&ctx(), "b.thing").unwrap();
    let twice = qualify(&ctx(), &once).unwrap();
    assert_eq!(once, twice);
}
#[test]
fn test_qualify_rejects_empty_and_metacharacters() {
    assert!(qualify(&ctx(), "").is_err());
    assert!(qualify(&ctx(), "A.B.C").is_err());
    assert!(qualify(&ctx(), "NAME*").is_err());
}
#[test]
fn test_wildcard_hash_matches_one_character() {
    let matcher = WildcardMatcher::compile(&ctx(), "#").unwrap();
    assert!(matcher.matches(VolumeSelector::new(0), '$', "A"));
    assert!(!matcher.matches(VolumeSelector::new(0), '$', "AB"));
}
#[test]
fn test_wildcard_star_matches_runs() {
    // With current volume 0 and directory $, P* matches $.Price in either
    // case but not files in another directory.
    let matcher = WildcardMatcher::compile(&ctx(), "P*").unwrap();
    assert!(matcher.matches(VolumeSelector::new(0), '$', "Price"));
    assert!(matcher.matches(VolumeSelector::new(0), '$', "price"));
    assert!(!matcher.matches(VolumeSelector::new(0), 'Q', "Price"));
    assert!(!matcher.matches(VolumeSelector::new(0), '$', "Quote"));
}
#[test]
fn test_wildcard_directory_can_be_ambiguous() {
    let matcher = WildcardMatcher::compile(&ctx(), "#.PROG").unwrap();
    assert!(matcher.matches(VolumeSelector::new(0), '$', "PROG"));
    assert!(matcher.matches(VolumeSelector::new(0), 'Z', "PROG"));
}
#[test]
fn test_wildcard_drive_is_never_ambiguous() {
    assert!(WildcardMatcher::compile(&ctx(), ":*.$.PROG").is_err());
    let matcher = WildcardMatcher::compile(&ctx(), ":1.$.*").unwrap();
    assert_eq!(matcher.volume(), VolumeSelector::new(1));
}
#[test]
fn test_wildcard_match_is_case_insensitive() {
    let matcher = WildcardMatcher::compile(&ctx(), "b.pr#g").unwrap();
    assert!(matcher.matches(VolumeSelector::new(0), 'B', "PROG"));
    assert!(matcher.matches(VolumeSelector::new(0), 'b', "prog"));
    assert!(!matcher.matches(VolumeSelector::new(0), 'B', "PROOG"));
}
#[test]
fn test_trailing_spaces_are_trimmed_before_matching() {
    let matcher = WildcardMatcher::compile(&ctx(), "PROG").unwrap();
    assert!(matcher.matches(VolumeSelector::new(0), '$', "PROG   "));
}

proptest! {
    #[test]
    fn qualification_is_idempotent(name in "[A-Za-z0-9!][A-Za-z0-9!]{0,6}") {
        let context = ctx();
        let once = qualify(&context, &name).unwrap();
        let twice = qualify(&context, &once).unwrap();
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn literal_patterns_match_themselves(name in "[A-Za-z][A-Za-z0-9]{0,6}") {
        let context = ctx();
        let matcher = WildcardMatcher::compile(&context, &name).unwrap();
        prop_assert!(matcher.matches(VolumeSelector::new(0), '$', &name));
    }
}
