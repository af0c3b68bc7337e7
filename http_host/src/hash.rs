//! The rolling hash the host uses for its header tables.
//!
//! Every table that is built at startup and every lookup performed at
//! request time must agree on this function bit for bit, otherwise a
//! lookup silently misses. The hash is `key * 31 + byte` over the
//! platform word, wrapping on overflow.

#[inline]
pub const fn hash(key: usize, c: u8) -> usize {
    key.wrapping_mul(31).wrapping_add(c as usize)
}

/// ASCII only, so the fold never depends on the process locale.
#[inline]
pub const fn to_lower(c: u8) -> u8 {
    if c.is_ascii_uppercase() {
        c | 0x20
    } else {
        c
    }
}

pub fn hash_key(data: &[u8]) -> usize {
    data.iter().fold(0, |key, &c| hash(key, c))
}

pub fn hash_key_lc(data: &[u8]) -> usize {
    data.iter().fold(0, |key, &c| hash(key, to_lower(c)))
}

/// Lowercases `data` and hashes the folded bytes in a single pass.
pub fn hash_strlow(data: &[u8]) -> (usize, Vec<u8>) {
    let mut lowcase = Vec::with_capacity(data.len());
    let mut key = 0;
    for &c in data {
        let c = to_lower(c);
        key = hash(key, c);
        lowcase.push(c);
    }
    (key, lowcase)
}
