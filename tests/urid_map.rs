// UridMap single-threaded test suite.
//
// Each test documents what behavior is being verified. The core
// invariants exercised:
// - Idempotence: map(s) == map(s) for every call.
// - Round-trip: unmap(map(s)) == s whenever map(s) != 0.
// - Static stability: statics own ids 1..n regardless of later inserts.
// - Overflow: a full table reports 0 instead of failing loudly.
// - Resource accounting: allocations - frees == usage while live, and
//   every allocation is freed by teardown.
use allocator_api2::alloc::{AllocError, Allocator, Global};
use std::alloc::Layout;
use std::hash::{BuildHasher, Hasher};
use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};
use urid_mapper::{BuildError, MapError, UridMap};

#[derive(Default)]
struct CountingAlloc {
    allocs: AtomicUsize,
    frees: AtomicUsize,
    budget: Option<usize>,
}

impl CountingAlloc {
    fn with_budget(budget: usize) -> Self {
        Self {
            budget: Some(budget),
            ..Self::default()
        }
    }
    fn allocs(&self) -> usize {
        self.allocs.load(Ordering::Relaxed)
    }
    fn frees(&self) -> usize {
        self.frees.load(Ordering::Relaxed)
    }
}

unsafe impl Allocator for CountingAlloc {
    fn allocate(&self, layout: Layout) -> Result<NonNull<[u8]>, AllocError> {
        if let Some(budget) = self.budget {
            if self.allocs() >= budget {
                return Err(AllocError);
            }
        }
        self.allocs.fetch_add(1, Ordering::Relaxed);
        Global.allocate(layout)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        self.frees.fetch_add(1, Ordering::Relaxed);
        unsafe { Global.deallocate(ptr, layout) }
    }
}

// Hashes a string to its last byte, so single-character keys pick their
// start slot directly.
#[derive(Clone, Default)]
struct LastByteState;
#[derive(Default)]
struct LastByteHasher(u64);
impl BuildHasher for LastByteState {
    type Hasher = LastByteHasher;
    fn build_hasher(&self) -> Self::Hasher {
        LastByteHasher::default()
    }
}
impl Hasher for LastByteHasher {
    fn write(&mut self, bytes: &[u8]) {
        if let Some(&b) = bytes.last() {
            self.0 = b as u64;
        }
    }
    fn finish(&self) -> u64 {
        self.0
    }
}

fn table(capacity: u32) -> UridMap {
    UridMap::builder()
        .capacity(capacity)
        .lock_memory(false)
        .build()
        .expect("build table")
}

// Test: the worked example from the interface contract.
// Verifies: hint 10 rounds to 16; ids land in [1, 16]; repeat maps are
// stable; far-out ids resolve to nothing.
#[test]
fn concrete_scenario() {
    let m = table(10);
    assert_eq!(m.capacity(), 16);
    let id_a = m.map("a");
    assert!((1..=16).contains(&id_a), "id {} out of range", id_a);
    assert_eq!(m.map("a"), id_a);
    assert_eq!(m.unmap(id_a), Some("a"));
    assert_eq!(m.unmap(id_a + 1000), None);
}

// Test: static id stability.
// Verifies: statics resolve to their index both through map and unmap,
// and dynamic inserts never take a static id.
#[test]
fn static_ids_are_fixed() {
    let m = UridMap::builder()
        .capacity(128)
        .statics(["", "X1", "X2"])
        .lock_memory(false)
        .build()
        .unwrap();
    for i in 0..20 {
        let id = m.map(&format!("urn:dyn:{}", i));
        assert!(id >= 3, "dynamic id {} collides with statics", id);
    }
    assert_eq!(m.map("X1"), 1);
    assert_eq!(m.map("X2"), 2);
    assert_eq!(m.unmap(1), Some("X1"));
    assert_eq!(m.unmap(2), Some("X2"));
    assert_eq!(m.unmap(0), None);
    assert_eq!(m.usage(), 22);
}

// Test: overflow boundary.
// Assumes: keys "0".."7" start probing at slots 0..7 under LastByteState.
// Verifies: with every slot taken, a ninth distinct string maps to 0 and
// the first eight keep resolving.
#[test]
fn ninth_string_overflows_full_table() {
    let m = UridMap::builder()
        .capacity(8)
        .lock_memory(false)
        .hasher(LastByteState)
        .build()
        .unwrap();
    let keys: Vec<String> = (0..9).map(|i| i.to_string()).collect();
    let ids: Vec<u32> = keys[..8].iter().map(|k| m.map(k)).collect();
    assert!(ids.iter().all(|&id| id != 0));
    assert_eq!(m.usage(), 8);

    assert_eq!(m.map(&keys[8]), 0);
    assert_eq!(m.try_map(&keys[8]), Err(MapError::Overflow));
    for (k, id) in keys.iter().zip(&ids) {
        assert_eq!(m.unmap(*id), Some(k.as_str()));
        assert_eq!(m.map(k), *id);
    }
}

// Test: overflow with a realistic hasher.
// Verifies: once any call overflows, usage never exceeds capacity and
// mapped strings stay resolvable.
#[test]
fn overflow_is_not_fatal() {
    let m = table(8);
    let mut mapped = Vec::new();
    let mut overflowed = 0;
    for i in 0..32 {
        let s = format!("urn:x:{}", i);
        match m.map(&s) {
            0 => overflowed += 1,
            id => mapped.push((s, id)),
        }
    }
    assert!(overflowed >= 24);
    assert!(m.usage() <= 8);
    assert_eq!(m.usage() as usize, mapped.len());
    for (s, id) in &mapped {
        assert_eq!(m.unmap(*id), Some(s.as_str()));
    }
}

// Test: allocation accounting.
// Verifies: repeat maps allocate nothing; live allocations equal usage;
// teardown frees everything exactly once.
#[test]
fn allocations_match_usage() {
    let alloc = CountingAlloc::default();
    {
        let m = UridMap::builder()
            .capacity(128)
            .statics(["", "urn:s1", "urn:s2"])
            .lock_memory(false)
            .allocator(&alloc)
            .build()
            .unwrap();
        for round in 0..3 {
            for i in 0..20 {
                assert_ne!(m.map(&format!("urn:item:{}", i)), 0, "round {}", round);
            }
        }
        assert_eq!(m.usage(), 22);
        assert_eq!(alloc.allocs() - alloc.frees(), m.usage() as usize);
    }
    assert_eq!(alloc.frees(), alloc.allocs());
}

// Test: allocator failure.
// Verifies: a refused allocation maps to 0, leaves no trace, and does not
// stop lookups of strings already present.
#[test]
fn allocator_failure_maps_to_zero() {
    let alloc = CountingAlloc::with_budget(1);
    {
        let m = UridMap::builder()
            .capacity(8)
            .lock_memory(false)
            .allocator(&alloc)
            .build()
            .unwrap();
        let a = m.map("a");
        assert_ne!(a, 0);
        assert_eq!(m.try_map("b"), Err(MapError::AllocFailed));
        assert_eq!(m.map("b"), 0);
        assert_eq!(m.map("a"), a);
        assert_eq!(m.usage(), 1);
    }
    assert_eq!(alloc.allocs(), 1);
    assert_eq!(alloc.frees(), 1);
}

// Test: construction failures are reported, not deferred.
// Verifies: a static that cannot be cloned fails the build and anything
// already cloned is returned to the allocator.
#[test]
fn failed_build_releases_statics() {
    let alloc = CountingAlloc::with_budget(1);
    let res = UridMap::builder()
        .capacity(8)
        .statics(["", "urn:s1", "urn:s2"])
        .lock_memory(false)
        .allocator(&alloc)
        .build();
    match res {
        Err(BuildError::Static {
            index: 2,
            source: MapError::AllocFailed,
        }) => {}
        other => panic!("unexpected result: {:?}", other.map(|_| ())),
    }
    assert_eq!(alloc.allocs(), 1);
    assert_eq!(alloc.frees(), 1);
}

// Test: independent tables do not share ids or strings.
#[test]
fn tables_are_independent() {
    let m1 = table(16);
    let m2 = table(16);
    let a = m1.map("urn:only-in-m1");
    assert_ne!(a, 0);
    assert_eq!(m2.usage(), 0);
    assert_eq!(m2.unmap(a), None);
}

// Test: unmapped strings borrow from the table and keep their contents
// while more strings are inserted.
#[test]
fn unmapped_strings_are_stable() {
    let m = table(64);
    let id = m.map("urn:first");
    let first = m.unmap(id).unwrap();
    for i in 0..30 {
        m.map(&format!("urn:more:{}", i));
    }
    assert_eq!(first, "urn:first");
}

// Test: memory locking is optional and never fails the build.
#[test]
fn memory_lock_is_best_effort() {
    let locked = UridMap::new(16).unwrap();
    let is_locked = locked.is_memory_locked();
    let shown = format!("{:?}", locked);
    assert!(
        shown.contains(&format!("memory_locked: {}", is_locked)),
        "{}",
        shown
    );
    assert_ne!(locked.map("a"), 0);
    assert_eq!(locked.unmap(locked.map("a")), Some("a"));

    let unlocked = table(16);
    assert!(!unlocked.is_memory_locked());
    assert!(format!("{:?}", unlocked).contains("memory_locked: false"));
}

#[test]
fn atomics_are_lock_free() {
    assert!(urid_mapper::is_lock_free());
}
