#![cfg(test)]

// Property tests for UridMap kept inside the crate so they can reach
// `resolve` and the slot table without widening the public API.

use crate::{MapError, UridMap};
use proptest::prelude::*;
use std::collections::{BTreeSet, HashMap};
use std::hash::{BuildHasher, Hasher};

// Pool-indexed operations to improve shrinking: indices shrink to earlier
// strings, the pool shrinks, and op lists shrink in length.
#[derive(Clone, Debug)]
enum OpI {
    Map(usize),
    Unmap(u32),
    UnmapKnown(usize),
}

fn arb_scenario() -> impl Strategy<Value = (Vec<String>, Vec<OpI>)> {
    proptest::collection::vec("[a-z:/]{1,8}", 1..=12).prop_flat_map(|pool| {
        let idxs: Vec<usize> = (0..pool.len()).collect();
        let idx = proptest::sample::select(idxs);
        let op = prop_oneof![
            3 => idx.clone().prop_map(OpI::Map),
            1 => any::<u32>().prop_map(OpI::Unmap),
            2 => idx.clone().prop_map(OpI::UnmapKnown),
        ];
        proptest::collection::vec(op, 1..80).prop_map(move |ops| (pool.clone(), ops))
    })
}

#[derive(Clone, Default)]
struct ConstBuildHasher;
struct ConstHasher;
impl BuildHasher for ConstBuildHasher {
    type Hasher = ConstHasher;
    fn build_hasher(&self) -> Self::Hasher {
        ConstHasher
    }
}
impl Hasher for ConstHasher {
    fn write(&mut self, _bytes: &[u8]) {}
    fn finish(&self) -> u64 {
        0
    }
}

// Shared driver. `may_overflow` allows `Overflow` for strings not yet
// mapped; everything else must match the model exactly.
fn run<S: BuildHasher>(
    sut: &UridMap<allocator_api2::alloc::Global, S>,
    pool: &[String],
    ops: Vec<OpI>,
    may_overflow: bool,
) -> Result<(), TestCaseError> {
    let mut model: HashMap<String, u32> = HashMap::new();
    let nstats = sut.static_count();

    for op in ops {
        match op {
            OpI::Map(i) => {
                let uri = &pool[i];
                match sut.try_map(uri) {
                    Ok(urid) => {
                        let urid = urid.get();
                        prop_assert!(urid > nstats, "dynamic ids follow the static range");
                        match model.get(uri) {
                            Some(&prev) => prop_assert_eq!(prev, urid, "id must be stable"),
                            None => {
                                prop_assert!(
                                    !model.values().any(|&v| v == urid),
                                    "distinct uris must not share an id"
                                );
                                model.insert(uri.clone(), urid);
                            }
                        }
                    }
                    Err(MapError::Overflow) => {
                        prop_assert!(may_overflow, "unexpected overflow");
                        prop_assert!(!model.contains_key(uri), "known uri must be found");
                    }
                    Err(e) => prop_assert!(false, "unexpected error: {:?}", e),
                }
            }
            OpI::Unmap(raw) => {
                if (1..=nstats).contains(&raw) {
                    prop_assert!(sut.unmap(raw).is_some(), "static ids always resolve");
                } else {
                    let expected = model
                        .iter()
                        .find(|(_, v)| **v == raw)
                        .map(|(k, _)| k.as_str());
                    prop_assert_eq!(sut.unmap(raw), expected);
                }
            }
            OpI::UnmapKnown(i) => {
                let uri = &pool[i];
                if let Some(&urid) = model.get(uri) {
                    prop_assert_eq!(sut.unmap(urid), Some(uri.as_str()));
                    let c = sut.resolve(urid).map(|r| r.as_bytes());
                    prop_assert_eq!(c, Some(uri.as_bytes()));
                }
            }
        }

        // Post-conditions after each op
        prop_assert_eq!(sut.usage() as usize, model.len() + nstats as usize);
        prop_assert_eq!(sut.unmap(0), None);
    }

    let ids: BTreeSet<u32> = model.values().copied().collect();
    prop_assert_eq!(ids.len(), model.len());
    Ok(())
}

// Property: state-machine equivalence against a HashMap model.
// - Equal strings always get the same id; distinct strings distinct ids.
// - unmap(map(s)) == s; unmap of anything never handed out is None.
// - usage == number of distinct mapped strings.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine((pool, ops) in arb_scenario()) {
        let sut = UridMap::builder().capacity(64).lock_memory(false).build().unwrap();
        run(&sut, &pool, ops, false)?;
    }
}

// Property: same invariants with statics registered up front; static
// strings keep their fixed ids whatever else is mapped.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine_with_statics((pool, ops) in arb_scenario()) {
        let statics = ["", "urn:s1", "urn:s2", "urn:s3"];
        let sut = UridMap::builder()
            .capacity(256)
            .statics(statics)
            .lock_memory(false)
            .build()
            .unwrap();
        // pool strings never contain digits, so they cannot clash with statics
        run(&sut, &pool, ops, false)?;
        for (i, s) in statics.iter().enumerate().skip(1) {
            prop_assert_eq!(sut.map(s), i as u32);
            prop_assert_eq!(sut.unmap(i as u32), Some(*s));
        }
    }
}

// Property: worst-case collisions with a constant hasher on a small table.
// Overflow is allowed for new strings, but ids of mapped strings stay
// stable and resolvable.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine_with_collisions((pool, ops) in arb_scenario()) {
        let sut = UridMap::builder()
            .capacity(8)
            .lock_memory(false)
            .hasher(ConstBuildHasher)
            .build()
            .unwrap();
        run(&sut, &pool, ops, true)?;
        prop_assert!(sut.usage() <= 3, "constant hash reaches only three slots");
    }
}
