//! UridMap: the public interning table and its builder.

use crate::error::{BuildError, MapError};
use crate::memlock::MemLock;
use crate::probe::{hash32, Probe};
use crate::slot_table::SlotTable;
use crate::uri_buf::{PendingUri, UriRef};
use allocator_api2::alloc::{Allocator, Global};
use core::fmt;
use core::hash::BuildHasher;
use core::num::NonZeroU32;
use core::sync::atomic::{AtomicU32, Ordering};
use hashbrown::hash_map::DefaultHashBuilder;

/// Fixed-capacity, lock-free URI ↔ URID table.
///
/// `map` and `unmap` take `&self` and may be called from any number of
/// threads. Neither locks; the only code that can block is the injected
/// allocator, and only when `map` sees a URI for the first time.
///
/// URID `0` is never assigned. Ids `1..nstats` belong to the static
/// table given at construction; dynamic ids follow and are derived from
/// the slot index, so they stay valid until the table is dropped.
pub struct UridMap<A: Allocator = Global, S = DefaultHashBuilder> {
    // Unlocked before the slot array is freed.
    memlock: Option<MemLock>,
    table: SlotTable,
    // Slot index of static id `i + 1`.
    statics: Box<[u32]>,
    offset: NonZeroU32,
    usage: AtomicU32,
    hasher: S,
    alloc: A,
}

impl UridMap {
    /// Table for at least `capacity` URIs with no static ids, backed by the
    /// global allocator.
    pub fn new(capacity: u32) -> Result<Self, BuildError> {
        Builder::new().capacity(capacity).build()
    }

    pub fn builder() -> Builder {
        Builder::new()
    }
}

impl<A: Allocator, S: BuildHasher> UridMap<A, S> {
    /// Intern `uri`, returning its URID.
    ///
    /// Equal strings get the same id for the lifetime of the table, from
    /// any thread. At most one copy of `uri` is allocated per call; a copy
    /// that loses the race for a slot is freed before returning.
    pub fn try_map(&self, uri: &str) -> Result<NonZeroU32, MapError> {
        if uri.is_empty() {
            return Err(MapError::Empty);
        }
        let hash = hash32(&self.hasher, uri);
        let mut clone: Option<PendingUri<'_, A>> = None;

        for idx in Probe::new(hash, self.table.capacity()) {
            let Some(slot) = self.table.get(idx) else {
                break;
            };

            if let Some(existing) = slot.load(Ordering::Acquire) {
                if existing.as_bytes() == uri.as_bytes() {
                    return Ok(self.urid_at(idx));
                }
                continue;
            }

            let pending = match clone.take() {
                Some(pending) => pending,
                None => PendingUri::clone_in(uri, &self.alloc)?,
            };
            match slot.publish(pending.as_ptr()) {
                Ok(()) => {
                    pending.publish();
                    self.usage.fetch_add(1, Ordering::Relaxed);
                    return Ok(self.urid_at(idx));
                }
                Err(winner) if winner.as_bytes() == uri.as_bytes() => {
                    return Ok(self.urid_at(idx));
                }
                Err(_) => clone = Some(pending),
            }
        }

        Err(MapError::Overflow)
    }

    /// [`try_map`](Self::try_map) with the LV2 convention: `0` on failure.
    #[inline]
    pub fn map(&self, uri: &str) -> u32 {
        self.try_map(uri).map_or(0, NonZeroU32::get)
    }
}

impl<A: Allocator, S> UridMap<A, S> {
    /// Resolve a URID back to its URI. `None` for `0`, ids out of range
    /// and ids that were never handed out.
    pub fn unmap(&self, urid: u32) -> Option<&str> {
        self.resolve(urid).map(|uri| uri.as_str())
    }

    /// Static ids are looked up through the slot their string was interned
    /// into at build time rather than a separate copy, so `map` and
    /// `unmap` of a static share one buffer.
    pub(crate) fn resolve(&self, urid: u32) -> Option<UriRef<'_>> {
        let idx = if urid < self.offset.get() {
            let nth = urid.checked_sub(1)?;
            *self.statics.get(nth as usize)? as usize
        } else {
            (urid - self.offset.get()) as usize
        };
        self.table.get(idx)?.load(Ordering::Acquire)
    }

    /// Number of occupied slots. Static URIs count once each.
    pub fn usage(&self) -> u32 {
        self.usage.load(Ordering::Relaxed)
    }

    /// Number of slots, always a power of two.
    pub fn capacity(&self) -> u32 {
        self.table.capacity()
    }

    /// Number of static ids registered at construction, not counting the
    /// reserved id `0`.
    pub fn static_count(&self) -> u32 {
        self.statics.len() as u32
    }

    pub fn is_memory_locked(&self) -> bool {
        self.memlock.is_some()
    }

    #[inline]
    fn urid_at(&self, idx: usize) -> NonZeroU32 {
        match self.table.get(idx).and_then(|slot| slot.reserved_id()) {
            Some(id) => id,
            None => self.offset.saturating_add(idx as u32),
        }
    }
}

impl<A: Allocator, S> Drop for UridMap<A, S> {
    fn drop(&mut self) {
        // SAFETY: every published buffer was cloned with `self.alloc`.
        let released = unsafe { self.table.release_all(&self.alloc) };
        tracing::debug!(released, "urid table torn down");
    }
}

impl<A: Allocator, S> fmt::Debug for UridMap<A, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UridMap")
            .field("capacity", &self.capacity())
            .field("statics", &self.static_count())
            .field("usage", &self.usage())
            .field("memory_locked", &self.is_memory_locked())
            .finish()
    }
}

/// Construction parameters for a [`UridMap`].
///
/// ```
/// use urid_mapper::UridMap;
///
/// let map = UridMap::builder()
///     .capacity(100)
///     .statics(["", "urn:x1", "urn:x2"])
///     .build()
///     .unwrap();
/// assert_eq!(map.capacity(), 128);
/// assert_eq!(map.map("urn:x2"), 2);
/// ```
pub struct Builder<A = Global, S = DefaultHashBuilder> {
    capacity: u32,
    statics: Vec<String>,
    lock_memory: bool,
    alloc: A,
    hasher: S,
}

impl Builder {
    pub fn new() -> Self {
        Self {
            capacity: 1,
            statics: Vec::new(),
            lock_memory: true,
            alloc: Global,
            hasher: DefaultHashBuilder::default(),
        }
    }
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}

impl<A, S> Builder<A, S> {
    /// Minimum number of slots; rounded up to the next power of two.
    pub fn capacity(mut self, hint: u32) -> Self {
        self.capacity = hint;
        self
    }

    /// Well-known URIs that get the fixed ids `1..n`. Entry `0` stands for
    /// the invalid id and is never registered.
    pub fn statics<I, T>(mut self, statics: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.statics = statics.into_iter().map(Into::into).collect();
        self
    }

    /// Ask the OS to keep the slot array resident. On by default.
    pub fn lock_memory(mut self, lock: bool) -> Self {
        self.lock_memory = lock;
        self
    }

    /// Allocator used for every URI copy the table owns.
    pub fn allocator<B: Allocator>(self, alloc: B) -> Builder<B, S> {
        Builder {
            capacity: self.capacity,
            statics: self.statics,
            lock_memory: self.lock_memory,
            alloc,
            hasher: self.hasher,
        }
    }

    pub fn hasher<T: BuildHasher>(self, hasher: T) -> Builder<A, T> {
        Builder {
            capacity: self.capacity,
            statics: self.statics,
            lock_memory: self.lock_memory,
            alloc: self.alloc,
            hasher,
        }
    }
}

impl<A: Allocator, S: BuildHasher> Builder<A, S> {
    pub fn build(self) -> Result<UridMap<A, S>, BuildError> {
        let requested = self.capacity;
        let capacity = requested
            .max(1)
            .checked_next_power_of_two()
            .ok_or(BuildError::CapacityOverflow {
                requested: requested as u64,
            })?;
        let nstats = self.statics.len() as u64;
        let offset = nstats.max(1);
        let last_id = offset + capacity as u64 - 1;
        if last_id > u32::MAX as u64 {
            return Err(BuildError::CapacityOverflow { requested: last_id });
        }
        let offset = NonZeroU32::new(offset as u32).ok_or(BuildError::CapacityOverflow {
            requested: offset,
        })?;

        let table = SlotTable::new(capacity)?;
        let memlock = if self.lock_memory {
            let (addr, len) = table.memory();
            MemLock::acquire(addr, len)
        } else {
            None
        };

        let mut map = UridMap {
            memlock,
            table,
            statics: Box::new([]),
            offset,
            usage: AtomicU32::new(0),
            hasher: self.hasher,
            alloc: self.alloc,
        };

        let mut statics = Vec::with_capacity(self.statics.len().saturating_sub(1));
        for (index, uri) in self.statics.iter().enumerate().skip(1) {
            let index = index as u32;
            let urid = match map.try_map(uri) {
                Ok(urid) => urid.get(),
                Err(source) => {
                    tracing::error!(index, uri = %uri, %source, "static uri registration failed");
                    return Err(BuildError::Static { index, source });
                }
            };
            if urid < offset.get() {
                return Err(BuildError::DuplicateStatic { index, first: urid });
            }
            let idx = urid - offset.get();
            map.table.reserve(idx as usize, index);
            statics.push(idx);
        }
        map.statics = statics.into_boxed_slice();

        tracing::debug!(
            capacity,
            statics = map.static_count(),
            locked = map.is_memory_locked(),
            "urid table created"
        );
        Ok(map)
    }
}
