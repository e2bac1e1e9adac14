//! urid-mapper: a fixed-capacity, lock-free table that interns URI
//! strings as small integer ids (URIDs) and resolves them back.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: give every thread of an audio host, including real-time
//!   callbacks, a `map`/`unmap` pair that never takes a lock.
//! - Layers:
//!   - `uri_buf`: owned, NUL-terminated URI copies allocated through the
//!     injected allocator; a speculative copy is a linear guard that frees
//!     itself unless it gets published.
//!   - `probe`: 32-bit hash and the quadratic probe sequence.
//!   - `SlotTable`: power-of-two array of write-once atomic slots.
//!   - `UridMap`: insert-or-find over the slot table, static id
//!     registration, teardown. Public API.
//!   - `lv2`: C ABI shims shaped like `LV2_URID_Map`/`LV2_URID_Unmap`.
//!
//! Constraints
//! - Capacity is fixed at construction; no resize, no removal.
//! - `map` allocates at most once per call and only when the URI is not
//!   already present. Supplying a non-blocking allocator makes the whole
//!   call real-time safe.
//! - Every mutation is one atomic operation on one word: a CAS on a slot
//!   or a fetch-add on the usage counter.
//!
//! Memory ordering
//! - Slots are published with a release CAS and read with acquire loads,
//!   so a thread that observes a pointer observes the finished bytes.
//! - `unmap` also loads with acquire. A fabricated id can then at worst
//!   resolve to a string that another thread just finished publishing.
//! - `usage` is a relaxed statistic and orders nothing.
//!
//! Identifier space
//! - `0` is invalid. `1..nstats` are static ids fixed by the static
//!   table. Dynamic ids are `max(nstats, 1) + slot_index`.
//! - A static URI also occupies a slot whose reserved id redirects later
//!   `map` calls to the static id, whatever the insertion order.
//!
//! Probing
//! - Attempt `i` visits `(hash + i*i) & (capacity - 1)` for `i` below
//!   `capacity`. Over a power-of-two table this does not visit every slot,
//!   so a nearly full table can report overflow while slots are still
//!   free. Size the table with headroom.
//!
//! Teardown
//! - `Drop` has exclusive access, frees every owned URI through the
//!   injected allocator and releases the memory lock taken at
//!   construction.

mod error;
pub mod lv2;
mod memlock;
mod probe;
mod slot_table;
mod uri_buf;
mod urid_map;
mod urid_map_proptest;

// Public surface
pub use error::{BuildError, MapError};
pub use urid_map::{Builder, UridMap};

/// Whether the slot atomics are lock-free on this target. Hosts check this
/// before handing the table to real-time threads.
pub const fn is_lock_free() -> bool {
    cfg!(target_has_atomic = "ptr")
}
