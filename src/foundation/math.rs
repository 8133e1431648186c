pub(crate) fn mul_div255_u16(x: u16, y: u16) -> u16 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u16
}

pub(crate) fn mul_div255_u8(x: u16, y: u16) -> u8 {
    mul_div255_u16(x, y) as u8
}

/// Content fingerprint used to order otherwise indistinguishable fragments.
pub(crate) fn fingerprint_bytes(parts: &[&[u8]]) -> u64 {
    let mut hasher = xxhash_rust::xxh3::Xxh3::new();
    for part in parts {
        hasher.update(&(part.len() as u64).to_le_bytes());
        hasher.update(part);
    }
    hasher.digest()
}

/// Pack an RGBA pixel into a single comparable value.
pub(crate) fn pack_rgba(px: [u8; 4]) -> u32 {
    u32::from_be_bytes(px)
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/math.rs"]
mod tests;
