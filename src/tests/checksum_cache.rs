// tests/checksum_cache.rs

use crate::io::cache::ChunkCache;
use crate::io::checksum::fletcher32;

//===================================================================
// --------------------------- Fletcher-32 --------------------------
//===================================================================

#[test]
fn fletcher32_of_zeros_is_zero() {
    assert_eq!(fletcher32(&[]), 0);
    assert_eq!(fletcher32(&[0u8; 4096]), 0);
}

#[test]
fn fletcher32_known_values() {
    // Big-endian 16-bit words; the odd trailing byte is the high half of a word.
    assert_eq!(fletcher32(b"abcde"), 0x4ff0_29c7);
    assert_eq!(fletcher32(b"abcdef"), 0x5056_2a2d);
    assert_eq!(fletcher32(b"abcdefgh"), 0xe1eb_9195);
}

#[test]
fn fletcher32_spans_several_blocks() {
    // 512 words: one full 360-word block plus a partial one.
    let data: Vec<u8> = (0..4).flat_map(|_| 0u8..=255).collect();
    assert_eq!(fletcher32(&data), 0x1516_00ff);
}

#[test]
fn fletcher32_detects_a_flipped_bit() {
    let mut data: Vec<u8> = (0..1000u32).map(|x| (x * 7 % 251) as u8).collect();
    let before = fletcher32(&data);
    data[517] ^= 0x10;
    assert_ne!(fletcher32(&data), before);
}

//===================================================================
// --------------------------- Chunk cache --------------------------
//===================================================================

#[test]
fn cache_evicts_least_recently_used_slot() {
    // Arrange
    let mut cache = ChunkCache::new(2, 1024);
    cache.insert(1, vec![1; 4]);
    cache.insert(2, vec![2; 4]);

    // Act
    assert!(cache.get(1).is_some());
    cache.insert(3, vec![3; 4]);

    // Assert
    assert_eq!(cache.len(), 2);
    assert!(cache.get(2).is_none());
    assert_eq!(cache.get(1), Some(&[1u64; 4][..]));
    assert_eq!(cache.get(3), Some(&[3u64; 4][..]));
}

#[test]
fn cache_respects_byte_budget() {
    let mut cache = ChunkCache::new(100, 64);
    cache.insert(0, vec![0; 4]);
    cache.insert(1, vec![0; 4]);
    assert_eq!(cache.bytes(), 64);

    cache.insert(2, vec![0; 2]);
    assert_eq!(cache.len(), 2);
    assert_eq!(cache.bytes(), 48);
    assert!(cache.get(0).is_none());

    // Larger than the whole budget: not cached at all.
    cache.insert(9, vec![0; 16]);
    assert!(cache.get(9).is_none());
}

#[test]
fn cache_replaces_and_invalidates() {
    let mut cache = ChunkCache::new(4, 1024);
    cache.insert(7, vec![1; 2]);
    cache.insert(7, vec![2; 3]);
    assert_eq!(cache.len(), 1);
    assert_eq!(cache.bytes(), 24);
    assert_eq!(cache.get(7), Some(&[2u64; 3][..]));

    cache.invalidate(7);
    assert!(cache.is_empty());
    assert_eq!(cache.bytes(), 0);

    cache.insert(1, vec![0; 1]);
    cache.clear();
    assert!(cache.get(1).is_none());
}
