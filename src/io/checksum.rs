// src/io/checksum.rs
//! Fletcher-32 checksum over a byte stream, as used by HDF5's chunk filter:
//! big-endian 16-bit words, modular sums folded every 360 words, and a trailing
//! odd byte treated as the high half of a final word. Sums are kept in `u64`
//! so a block can never overflow before it is folded.

const BLOCK_WORDS: usize = 360;

#[inline]
fn fold(x: u64) -> u64 {
    (x & 0xffff) + (x >> 16)
}

pub fn fletcher32(data: &[u8]) -> u32 {
    let mut sum1: u64 = 0;
    let mut sum2: u64 = 0;

    let mut words = data.chunks_exact(2);
    let mut remaining = data.len() / 2;
    while remaining > 0 {
        let block = remaining.min(BLOCK_WORDS);
        remaining -= block;
        for w in words.by_ref().take(block) {
            sum1 += u64::from(u16::from_be_bytes([w[0], w[1]]));
            sum2 += sum1;
        }
        sum1 = fold(sum1);
        sum2 = fold(sum2);
    }

    if let [last] = words.remainder() {
        sum1 += u64::from(*last) << 8;
        sum2 += sum1;
        sum1 = fold(sum1);
        sum2 = fold(sum2);
    }

    sum1 = fold(sum1);
    sum2 = fold(sum2);
    (((sum2 & 0xffff) << 16) | (sum1 & 0xffff)) as u32
}
