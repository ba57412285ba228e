//! Minimal RLP encoder: byte strings, unsigned integers, lists.

fn length_prefix(len: usize, short_base: u8, long_base: u8) -> Vec<u8> {
    if len <= 55 {
        return vec![short_base + len as u8];
    }
    let len_bytes = trim_leading_zeros(&(len as u64).to_be_bytes()).to_vec();
    let mut out = Vec::with_capacity(1 + len_bytes.len());
    out.push(long_base + len_bytes.len() as u8);
    out.extend_from_slice(&len_bytes);
    out
}

fn trim_leading_zeros(bytes: &[u8]) -> &[u8] {
    let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    &bytes[first..]
}

pub fn encode_bytes(bytes: &[u8]) -> Vec<u8> {
    if bytes.len() == 1 && bytes[0] < 0x80 {
        return bytes.to_vec();
    }
    let mut out = length_prefix(bytes.len(), 0x80, 0xb7);
    out.extend_from_slice(bytes);
    out
}

/// Big-endian, no leading zeros; zero encodes as the empty string.
pub fn encode_uint(value: u128) -> Vec<u8> {
    encode_bytes(trim_leading_zeros(&value.to_be_bytes()))
}

/// A 256-bit scalar given as big-endian bytes (e.g. a signature component).
pub fn encode_scalar(be_bytes: &[u8]) -> Vec<u8> {
    encode_bytes(trim_leading_zeros(be_bytes))
}

/// Concatenate already-encoded items under a list header.
pub fn encode_list(items: &[Vec<u8>]) -> Vec<u8> {
    let payload_len: usize = items.iter().map(Vec::len).sum();
    let mut out = length_prefix(payload_len, 0xc0, 0xf7);
    out.reserve(payload_len);
    for item in items {
        out.extend_from_slice(item);
    }
    out
}
