//! Property-based tests for content hashing and file-name matching.

use proptest::prelude::*;

use checkrun::hash::{self, ContentHash};
use checkrun::ScriptDirConfig;

proptest! {
    /// Hashing the same bytes twice always yields the same digest.
    #[test]
    fn prop_digest_is_deterministic(bytes in proptest::collection::vec(any::<u8>(), 0..512)) {
        prop_assert_eq!(ContentHash::of_bytes(&bytes), ContentHash::of_bytes(&bytes));
    }

    /// Every digest survives a hex round trip.
    #[test]
    fn prop_hex_roundtrip(bytes in proptest::collection::vec(any::<u8>(), 0..512)) {
        let digest = ContentHash::of_bytes(&bytes);
        let parsed = ContentHash::from_hex(&digest.to_hex()).unwrap();
        prop_assert_eq!(digest, parsed);
    }

    /// Flipping any single bit of a file breaks verification against the
    /// digest taken before the edit.
    #[test]
    fn prop_any_byte_change_breaks_verification(
        bytes in proptest::collection::vec(any::<u8>(), 1..512),
        index in any::<prop::sample::Index>(),
        bit in 0u8..8,
    ) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("unit.chk");
        std::fs::write(&path, &bytes).unwrap();
        let registered = ContentHash::of_file(&path).unwrap();
        prop_assert!(hash::verify_file(&path, &registered).unwrap());

        let mut tampered = bytes.clone();
        let i = index.index(tampered.len());
        tampered[i] ^= 1 << bit;
        std::fs::write(&path, &tampered).unwrap();

        prop_assert!(!hash::verify_file(&path, &registered).unwrap());
    }

    /// Appending bytes also breaks verification, even when the original
    /// content is a prefix of the new content.
    #[test]
    fn prop_appended_bytes_break_verification(
        bytes in proptest::collection::vec(any::<u8>(), 0..256),
        extra in proptest::collection::vec(any::<u8>(), 1..64),
    ) {
        let registered = ContentHash::of_bytes(&bytes);
        let mut grown = bytes.clone();
        grown.extend_from_slice(&extra);
        prop_assert_ne!(registered, ContentHash::of_bytes(&grown));
    }

    /// Any identifier built as `<prefix><rest>` maps to a file name the
    /// directory convention accepts.
    #[test]
    fn prop_prefixed_ids_round_trip_through_matching(rest in "[a-z0-9_]{1,24}") {
        let config = ScriptDirConfig::new("/opt/checks", "chk_");
        let id = format!("chk_{rest}");
        let path = config.script_path(&id);
        let file_name = path.file_name().unwrap().to_str().unwrap();
        prop_assert!(config.matches(file_name));
    }
}
