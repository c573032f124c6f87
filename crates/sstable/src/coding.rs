//! Varint codec and key helpers.
//!
//! Varints use little-endian base-128 groups: seven payload bits per byte,
//! high bit set on every byte except the last. A `u64` takes at most
//! [`MAX_VARINT_LEN`] bytes.

/// Longest encoding of a `u64` varint.
pub const MAX_VARINT_LEN: usize = 10;

/// Appends `value` to `buf` as a varint.
pub fn put_varint(buf: &mut Vec<u8>, mut value: u64) {
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            buf.push(byte);
            return;
        }
        buf.push(byte | 0x80);
    }
}

/// Decodes a varint from the front of `buf`.
///
/// Returns the value and the number of bytes consumed, or `None` if `buf`
/// ends mid-varint or the encoding overflows 64 bits.
pub fn get_varint(buf: &[u8]) -> Option<(u64, usize)> {
    let mut value = 0u64;
    for (i, &byte) in buf.iter().take(MAX_VARINT_LEN).enumerate() {
        let shift = 7 * i as u32;
        let bits = (byte & 0x7F) as u64;
        if shift == 63 && bits > 1 {
            return None;
        }
        value |= bits << shift;
        if byte & 0x80 == 0 {
            return Some((value, i + 1));
        }
    }
    None
}

/// Shortens `start` in place to a separator key `s` with
/// `start <= s < limit`.
///
/// If `start` is a prefix of `limit` (or vice versa), or no byte can be
/// bumped without reaching `limit`, `start` is left unchanged. Callers must
/// pass `start < limit`.
pub fn shortest_separator(start: &mut Vec<u8>, limit: &[u8]) {
    let min_len = start.len().min(limit.len());
    let diff = start
        .iter()
        .zip(limit)
        .position(|(a, b)| a != b)
        .unwrap_or(min_len);
    if diff >= min_len {
        return;
    }
    let byte = start[diff];
    if byte < 0xFF && byte + 1 < limit[diff] {
        start[diff] = byte + 1;
        start.truncate(diff + 1);
    }
}

/// Length of the common prefix of `a` and `b`.
pub fn shared_prefix_len(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}
