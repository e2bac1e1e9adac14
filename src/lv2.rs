//! C ABI shims matching LV2's `LV2_URID_Map` and `LV2_URID_Unmap`.
//!
//! Hosts pass these structs to plugins as the `urid#map` and
//! `urid#unmap` features. The `handle` field points at the [`UridMap`]
//! the feature was taken from, so the table must outlive every copy of
//! the feature struct.

use crate::UridMap;
use allocator_api2::alloc::Allocator;
use core::ffi::{c_char, c_void, CStr};
use core::hash::BuildHasher;

/// Feature URI under which hosts pass [`UridMapFeature`].
pub const URID_MAP_URI: &str = "http://lv2plug.in/ns/ext/urid#map";
/// Feature URI under which hosts pass [`UridUnmapFeature`].
pub const URID_UNMAP_URI: &str = "http://lv2plug.in/ns/ext/urid#unmap";

/// Layout-compatible with `LV2_URID_Map`.
#[repr(C)]
#[derive(Copy, Clone, Debug)]
pub struct UridMapFeature {
    pub handle: *mut c_void,
    pub map: unsafe extern "C" fn(handle: *mut c_void, uri: *const c_char) -> u32,
}

/// Layout-compatible with `LV2_URID_Unmap`.
#[repr(C)]
#[derive(Copy, Clone, Debug)]
pub struct UridUnmapFeature {
    pub handle: *mut c_void,
    pub unmap: unsafe extern "C" fn(handle: *mut c_void, urid: u32) -> *const c_char,
}

impl<A, S> UridMap<A, S>
where
    A: Allocator + Sync,
    S: BuildHasher + Sync,
{
    /// `urid#map` feature backed by this table.
    pub fn map_feature(&self) -> UridMapFeature {
        UridMapFeature {
            handle: self as *const Self as *mut c_void,
            map: map_trampoline::<A, S>,
        }
    }

    /// `urid#unmap` feature backed by this table. Returned strings are
    /// NUL-terminated and stay valid until the table is dropped.
    pub fn unmap_feature(&self) -> UridUnmapFeature {
        UridUnmapFeature {
            handle: self as *const Self as *mut c_void,
            unmap: unmap_trampoline::<A, S>,
        }
    }
}

unsafe extern "C" fn map_trampoline<A, S>(handle: *mut c_void, uri: *const c_char) -> u32
where
    A: Allocator + Sync,
    S: BuildHasher + Sync,
{
    if handle.is_null() || uri.is_null() {
        return 0;
    }
    // SAFETY: `handle` was set by `map_feature` and the table outlives the
    // feature; `uri` is a NUL-terminated string per the LV2 contract.
    let (map, uri) = unsafe { (&*(handle as *const UridMap<A, S>), CStr::from_ptr(uri)) };
    match uri.to_str() {
        Ok(uri) => map.map(uri),
        Err(_) => 0,
    }
}

unsafe extern "C" fn unmap_trampoline<A, S>(handle: *mut c_void, urid: u32) -> *const c_char
where
    A: Allocator + Sync,
    S: BuildHasher + Sync,
{
    if handle.is_null() {
        return core::ptr::null();
    }
    // SAFETY: `handle` was set by `unmap_feature` and the table outlives
    // the feature.
    let map = unsafe { &*(handle as *const UridMap<A, S>) };
    map.resolve(urid)
        .map_or(core::ptr::null(), |uri| uri.as_c_ptr())
}
