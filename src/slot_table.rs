//! SlotTable: fixed array of write-once URI slots.
//!
//! Each slot holds an atomically published pointer to an owned URI buffer.
//! A slot goes from empty to occupied at most once and its contents never
//! change afterwards; only teardown empties it again. Publication uses a
//! release CAS and readers load with acquire, so any thread that sees a
//! pointer also sees the bytes behind it.

use crate::error::BuildError;
use crate::uri_buf::{free_in, UriHeader, UriRef};
use allocator_api2::alloc::Allocator;
use core::num::NonZeroU32;
use core::ptr::{self, NonNull};
use core::sync::atomic::{AtomicPtr, Ordering};

pub(crate) struct Slot {
    uri: AtomicPtr<UriHeader>,
    /// Static id served for this slot. Written only while the table is
    /// still exclusively owned.
    reserved_id: Option<NonZeroU32>,
}

impl Slot {
    const fn empty() -> Self {
        Self {
            uri: AtomicPtr::new(ptr::null_mut()),
            reserved_id: None,
        }
    }

    #[inline]
    pub(crate) fn load(&self, order: Ordering) -> Option<UriRef<'_>> {
        let raw = NonNull::new(self.uri.load(order))?;
        // SAFETY: non-null slot values are published buffers that live
        // until teardown, which needs `&mut` access to the table.
        Some(unsafe { UriRef::from_raw(raw) })
    }

    /// Publish `candidate` into an empty slot.
    ///
    /// On failure returns the buffer that won the slot.
    #[inline]
    pub(crate) fn publish(&self, candidate: *mut UriHeader) -> Result<(), UriRef<'_>> {
        match self.uri.compare_exchange(
            ptr::null_mut(),
            candidate,
            Ordering::Release,
            Ordering::Acquire,
        ) {
            Ok(_) => Ok(()),
            Err(winner) => {
                // SAFETY: the CAS only fails on a non-null, published buffer.
                Err(unsafe { UriRef::from_raw(NonNull::new_unchecked(winner)) })
            }
        }
    }

    #[inline]
    pub(crate) fn reserved_id(&self) -> Option<NonZeroU32> {
        self.reserved_id
    }
}

pub(crate) struct SlotTable {
    slots: Box<[Slot]>,
}

impl SlotTable {
    /// Allocate `capacity` empty slots. `capacity` must be a power of two.
    pub(crate) fn new(capacity: u32) -> Result<Self, BuildError> {
        debug_assert!(capacity.is_power_of_two());
        let mut slots = Vec::new();
        slots.try_reserve_exact(capacity as usize)?;
        slots.extend((0..capacity).map(|_| Slot::empty()));
        Ok(Self {
            slots: slots.into_boxed_slice(),
        })
    }

    #[inline]
    pub(crate) fn capacity(&self) -> u32 {
        self.slots.len() as u32
    }

    #[inline]
    pub(crate) fn get(&self, idx: usize) -> Option<&Slot> {
        self.slots.get(idx)
    }

    pub(crate) fn reserve(&mut self, idx: usize, id: u32) {
        if let Some(slot) = self.slots.get_mut(idx) {
            slot.reserved_id = NonZeroU32::new(id);
        }
    }

    /// Address and byte length of the slot array, for memory locking.
    pub(crate) fn memory(&self) -> (*const u8, usize) {
        (
            self.slots.as_ptr().cast(),
            core::mem::size_of_val(&*self.slots),
        )
    }

    /// Empty every slot, returning its buffer to `alloc`. Returns how many
    /// buffers were released.
    ///
    /// # Safety
    /// Every published buffer must have been allocated with `alloc`.
    pub(crate) unsafe fn release_all<A: Allocator>(&mut self, alloc: &A) -> usize {
        let mut released = 0;
        for slot in self.slots.iter_mut() {
            let raw = core::mem::replace(slot.uri.get_mut(), ptr::null_mut());
            if let Some(raw) = NonNull::new(raw) {
                // SAFETY: forwarded from the caller; the slot no longer
                // refers to the buffer.
                unsafe { free_in(raw, alloc) };
                released += 1;
            }
        }
        released
    }
}
