//! Hashing and the quadratic probe sequence over the slot table.

use core::hash::BuildHasher;

/// 32-bit hash of `uri` under the table's hasher state.
///
/// The state is fixed for the lifetime of a table, so equal strings always
/// start from the same slot. Nothing is promised across processes.
#[inline]
pub(crate) fn hash32<S: BuildHasher>(state: &S, uri: &str) -> u32 {
    let h = state.hash_one(uri.as_bytes());
    (h ^ (h >> 32)) as u32
}

/// Slot indices visited for one key: `(hash + i*i) & mask` for
/// `i in 0..capacity`.
///
/// Over a power-of-two table this sequence repeats indices, so it may end
/// before every slot has been offered.
#[derive(Clone, Debug)]
pub(crate) struct Probe {
    hash: u32,
    mask: u32,
    attempt: u32,
    limit: u32,
}

impl Probe {
    pub(crate) fn new(hash: u32, capacity: u32) -> Self {
        debug_assert!(capacity.is_power_of_two());
        Self {
            hash,
            mask: capacity - 1,
            attempt: 0,
            limit: capacity,
        }
    }
}

impl Iterator for Probe {
    type Item = usize;

    #[inline]
    fn next(&mut self) -> Option<usize> {
        if self.attempt >= self.limit {
            return None;
        }
        let i = self.attempt;
        self.attempt += 1;
        Some((self.hash.wrapping_add(i.wrapping_mul(i)) & self.mask) as usize)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = (self.limit - self.attempt) as usize;
        (left, Some(left))
    }
}
