//! Encoder-side helpers: the mirror image of [`super::Cursor`].

/// Number of bytes the compact-size encoding of `n` occupies.
pub fn compact_size_len(n: u64) -> usize {
    match n {
        0..=0xfc => 1,
        0xfd..=0xffff => 3,
        0x1_0000..=0xffff_ffff => 5,
        _ => 9,
    }
}

/// Appends the minimal compact-size encoding of `n`.
pub fn write_compact_size(buf: &mut Vec<u8>, n: u64) {
    match compact_size_len(n) {
        1 => buf.push(n as u8),
        3 => {
            buf.push(0xfd);
            buf.extend_from_slice(&(n as u16).to_le_bytes());
        }
        5 => {
            buf.push(0xfe);
            buf.extend_from_slice(&(n as u32).to_le_bytes());
        }
        _ => {
            buf.push(0xff);
            buf.extend_from_slice(&n.to_le_bytes());
        }
    }
}

/// Appends a compact-size length prefix followed by `bytes`.
pub fn write_var_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    write_compact_size(buf, bytes.len() as u64);
    buf.extend_from_slice(bytes);
}
