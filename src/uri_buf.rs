//! Owned URI buffers allocated through the injected allocator.
//!
//! A buffer is a single allocation laid out as `[len: usize][bytes][NUL]`.
//! Slots publish a pointer to the header; the length travels with the
//! bytes so that comparison and deallocation need nothing else. The
//! trailing NUL lets the C shims hand the bytes out unchanged.
//!
//! Freshly cloned buffers are wrapped in a [`PendingUri`], a linear guard
//! that returns the memory to its allocator when dropped. Publishing a
//! buffer into a slot consumes the guard without freeing.

use crate::MapError;
use allocator_api2::alloc::Allocator;
use core::alloc::Layout;
use core::ffi::c_char;
use core::marker::PhantomData;
use core::mem::{align_of, size_of};
use core::ptr::{self, NonNull};

#[repr(C)]
pub(crate) struct UriHeader {
    len: usize,
}

const DATA_OFFSET: usize = size_of::<UriHeader>();

fn layout_for(len: usize) -> Option<Layout> {
    let size = DATA_OFFSET.checked_add(len)?.checked_add(1)?;
    Layout::from_size_align(size, align_of::<UriHeader>()).ok()
}

/// Speculative clone of a URI that has not been published yet.
///
/// Dropping the guard frees the buffer.
pub(crate) struct PendingUri<'a, A: Allocator> {
    ptr: NonNull<UriHeader>,
    alloc: &'a A,
}

impl<'a, A: Allocator> PendingUri<'a, A> {
    /// Copy `uri` into a new buffer obtained from `alloc`.
    pub(crate) fn clone_in(uri: &str, alloc: &'a A) -> Result<Self, MapError> {
        let len = uri.len();
        let layout = layout_for(len).ok_or(MapError::AllocFailed)?;
        let block = alloc.allocate(layout).map_err(|_| MapError::AllocFailed)?;
        let header = block.cast::<UriHeader>();
        // SAFETY: the block is at least `layout.size()` bytes and aligned
        // for `UriHeader`; the header, `len` bytes and the NUL all fit.
        unsafe {
            header.as_ptr().write(UriHeader { len });
            let data = block.cast::<u8>().as_ptr().add(DATA_OFFSET);
            ptr::copy_nonoverlapping(uri.as_ptr(), data, len);
            data.add(len).write(0);
        }
        Ok(Self { ptr: header, alloc })
    }

    pub(crate) fn as_ptr(&self) -> *mut UriHeader {
        self.ptr.as_ptr()
    }

    /// Hand ownership of the buffer to the slot it was stored in.
    pub(crate) fn publish(self) {
        core::mem::forget(self);
    }
}

impl<'a, A: Allocator> Drop for PendingUri<'a, A> {
    fn drop(&mut self) {
        // SAFETY: the buffer came from `self.alloc` and was never published.
        unsafe { free_in(self.ptr, self.alloc) };
    }
}

/// Borrowed view of a published buffer.
#[derive(Copy, Clone)]
pub(crate) struct UriRef<'a> {
    ptr: NonNull<UriHeader>,
    _lt: PhantomData<&'a UriHeader>,
}

impl<'a> UriRef<'a> {
    /// # Safety
    /// `ptr` must point to a fully initialized buffer created by
    /// [`PendingUri::clone_in`] that stays allocated for `'a`.
    pub(crate) unsafe fn from_raw(ptr: NonNull<UriHeader>) -> Self {
        Self {
            ptr,
            _lt: PhantomData,
        }
    }

    pub(crate) fn as_bytes(&self) -> &'a [u8] {
        // SAFETY: guaranteed by `from_raw`.
        unsafe {
            let len = (*self.ptr.as_ptr()).len;
            let data = self.ptr.cast::<u8>().as_ptr().add(DATA_OFFSET);
            core::slice::from_raw_parts(data, len)
        }
    }

    pub(crate) fn as_str(&self) -> &'a str {
        // SAFETY: buffers are only ever cloned from `&str`.
        unsafe { core::str::from_utf8_unchecked(self.as_bytes()) }
    }

    pub(crate) fn as_c_ptr(&self) -> *const c_char {
        // SAFETY: guaranteed by `from_raw`; the data is NUL-terminated.
        unsafe { self.ptr.cast::<u8>().as_ptr().add(DATA_OFFSET) as *const c_char }
    }
}

/// Return a buffer to the allocator it came from.
///
/// # Safety
/// `ptr` must have been produced by [`PendingUri::clone_in`] with `alloc`
/// and must not be used afterwards.
pub(crate) unsafe fn free_in<A: Allocator>(ptr: NonNull<UriHeader>, alloc: &A) {
    // SAFETY: forwarded from the caller.
    unsafe {
        let len = (*ptr.as_ptr()).len;
        if let Some(layout) = layout_for(len) {
            alloc.deallocate(ptr.cast(), layout);
        }
    }
}
