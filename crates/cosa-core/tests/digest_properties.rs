//! # Streaming Digest Properties
//!
//! File digests are what artifact records publish, so they must be stable
//! for unchanged content and sensitive to any single-byte change, including
//! changes past the first read chunk.

use cosa_core::{sha256_bytes, sha256_file, DIGEST_CHUNK_SIZE};
use proptest::prelude::*;

#[test]
fn zero_byte_file_has_empty_input_digest() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty.img");
    std::fs::write(&path, b"").unwrap();
    assert_eq!(
        sha256_file(&path).unwrap().to_hex(),
        "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
    );
}

#[test]
fn repeated_file_digests_are_stable() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("disk.img");
    let data = vec![0x5au8; DIGEST_CHUNK_SIZE + 1];
    std::fs::write(&path, &data).unwrap();

    let first = sha256_file(&path).unwrap();
    let second = sha256_file(&path).unwrap();
    assert_eq!(first, second);
    assert_eq!(first, sha256_bytes(&data));
}

#[test]
fn flip_in_last_chunk_changes_digest() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("disk.img");
    let mut data = vec![0u8; DIGEST_CHUNK_SIZE * 3];
    std::fs::write(&path, &data).unwrap();
    let before = sha256_file(&path).unwrap();

    let last = data.len() - 1;
    data[last] ^= 0x01;
    std::fs::write(&path, &data).unwrap();
    assert_ne!(before, sha256_file(&path).unwrap());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn any_single_byte_flip_changes_digest(
        data in proptest::collection::vec(any::<u8>(), 1..4096),
        index in any::<prop::sample::Index>(),
        mask in 1u8..=255,
    ) {
        let i = index.index(data.len());
        let mut flipped = data.clone();
        flipped[i] ^= mask;
        prop_assert_ne!(sha256_bytes(&data), sha256_bytes(&flipped));
    }

    #[test]
    fn file_digest_matches_in_memory_digest(
        data in proptest::collection::vec(any::<u8>(), 0..8192),
    ) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blob");
        std::fs::write(&path, &data).unwrap();
        prop_assert_eq!(sha256_file(&path).unwrap(), sha256_bytes(&data));
    }
}
