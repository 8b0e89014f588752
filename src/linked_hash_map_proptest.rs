#![cfg(test)]

// Property tests for LinkedHashMap kept inside the crate so they can check
// structural invariants (contiguity, load factor) alongside the model.

use crate::linked_hash_map::LinkedHashMap;
use crate::node_list::NodeRef;
use core::hash::{BuildHasher, Hasher};
use proptest::prelude::*;
use std::collections::{BTreeSet, HashMap};

// Pool-indexed operations to improve shrinking: indices shrink to earlier
// keys, pool length shrinks, and op lists shrink in length.
#[derive(Clone, Debug)]
enum OpI {
    Insert(usize, i32),
    Remove(usize),
    RemoveNode(usize),
    Find(usize),
    Mutate(usize, i32),
    GetOrDefault(usize),
    Iterate,
    Rehash(usize),
    Reserve(usize),
}

fn arb_scenario() -> impl Strategy<Value = (Vec<String>, Vec<OpI>)> {
    proptest::collection::vec("[a-z]{0,5}", 1..=8).prop_flat_map(|pool| {
        let idxs: Vec<usize> = (0..pool.len()).collect();
        let idx = proptest::sample::select(idxs);
        let op = prop_oneof![
            (idx.clone(), any::<i32>()).prop_map(|(i, v)| OpI::Insert(i, v)),
            idx.clone().prop_map(OpI::Remove),
            idx.clone().prop_map(OpI::RemoveNode),
            idx.clone().prop_map(OpI::Find),
            (idx.clone(), any::<i32>()).prop_map(|(i, d)| OpI::Mutate(i, d)),
            idx.clone().prop_map(OpI::GetOrDefault),
            Just(OpI::Iterate),
            (1usize..64).prop_map(OpI::Rehash),
            (0usize..64).prop_map(OpI::Reserve),
        ];
        proptest::collection::vec(op, 1..80).prop_map(move |ops| (pool.clone(), ops))
    })
}

/// Structural post-conditions checked after every operation:
/// size parity with the model, key-set parity under iteration, contiguous
/// bucket runs, and staleness of handles whose entries were removed.
fn check_invariants<S: BuildHasher>(
    sut: &LinkedHashMap<String, i32, S>,
    model: &HashMap<String, i32>,
    stale: &[NodeRef],
) -> Result<(), TestCaseError> {
    prop_assert_eq!(sut.len(), model.len());
    prop_assert_eq!(sut.is_empty(), model.is_empty());

    // Iteration yields each live entry exactly once with the model's value.
    let mut seen = BTreeSet::new();
    for (k, v) in sut.iter() {
        prop_assert!(seen.insert(k.clone()), "key {} iterated twice", k);
        prop_assert_eq!(model.get(k), Some(v));
    }
    prop_assert_eq!(seen.len(), model.len());

    // Contiguity: each bucket's entries form one unbroken run in sequence
    // order.
    let mut finished: BTreeSet<usize> = BTreeSet::new();
    let mut run: Option<usize> = None;
    for (k, _) in sut.iter() {
        let bucket = (sut.hasher().hash_one(k) % sut.bucket_count() as u64) as usize;
        if run != Some(bucket) {
            prop_assert!(
                !finished.contains(&bucket),
                "bucket {} split into separate runs",
                bucket
            );
            if let Some(prev) = run {
                finished.insert(prev);
            }
            run = Some(bucket);
        }
    }

    for &h in stale {
        prop_assert!(h.value(sut).is_none(), "stale handle resolved");
    }
    Ok(())
}

fn run_scenario<S: BuildHasher>(
    mut sut: LinkedHashMap<String, i32, S>,
    pool: Vec<String>,
    ops: Vec<OpI>,
) -> Result<(), TestCaseError> {
    let mut model: HashMap<String, i32> = HashMap::new();
    let mut live: HashMap<String, NodeRef> = HashMap::new();
    let mut stale: Vec<NodeRef> = Vec::new();

    for op in ops {
        match op {
            OpI::Insert(i, v) => {
                let k = pool[i].clone();
                let already = model.contains_key(&k);
                let buckets_before = sut.bucket_count();
                let (node, inserted) = sut.insert(k.clone(), v);
                prop_assert_eq!(inserted, !already, "inserted flag disagrees with model");
                if let Some(old) = live.insert(k.clone(), node) {
                    // Replacement invalidates the old entry's handle.
                    stale.push(old);
                }
                model.insert(k, v);
                // After an insert the load factor is under the limit, or the
                // table grew within this call (a manual shrinking rehash can
                // leave more than one doubling of debt).
                prop_assert!(
                    sut.load_factor() < sut.max_load_factor()
                        || sut.bucket_count() > buckets_before
                );
            }
            OpI::Remove(i) => {
                let k = &pool[i];
                let removed = sut.remove(k);
                prop_assert_eq!(removed, model.remove(k));
                if let Some(h) = live.remove(k) {
                    stale.push(h);
                }
            }
            OpI::RemoveNode(i) => {
                let k = &pool[i];
                if let Some(&h) = live.get(k) {
                    let (kk, vv) = sut.remove_node(h).expect("live handle must remove");
                    prop_assert_eq!(&kk, k);
                    let mv = model.remove(&kk).expect("present in model");
                    prop_assert_eq!(vv, mv);
                    live.remove(k);
                    stale.push(h);
                } else {
                    prop_assert!(sut.find(k).is_none());
                }
            }
            OpI::Find(i) => {
                let k = &pool[i];
                let found = sut.find(k);
                prop_assert_eq!(found.is_some(), model.contains_key(k));
                prop_assert_eq!(sut.contains_key(k.as_str()), model.contains_key(k));
                if let Some(h) = found {
                    prop_assert_eq!(Some(&h), live.get(k));
                    prop_assert_eq!(h.value(&sut), model.get(k));
                }
            }
            OpI::Mutate(i, d) => {
                let k = &pool[i];
                if let Some(v) = sut.get_mut(k) {
                    *v = v.saturating_add(d);
                    let mv = model.get_mut(k).expect("model out of sync");
                    *mv = mv.saturating_add(d);
                } else {
                    prop_assert!(!model.contains_key(k));
                }
            }
            OpI::GetOrDefault(i) => {
                let k = pool[i].clone();
                let fresh = !model.contains_key(&k);
                let v = *sut.get_or_insert_default(k.clone());
                if fresh {
                    prop_assert_eq!(v, 0);
                    model.insert(k.clone(), 0);
                    let node = sut.find(&k).expect("just inserted");
                    live.insert(k, node);
                } else {
                    prop_assert_eq!(Some(&v), model.get(&k));
                }
            }
            OpI::Iterate => {
                let fwd: Vec<String> = sut.keys().cloned().collect();
                let mut bwd: Vec<String> = sut.keys().rev().cloned().collect();
                bwd.reverse();
                prop_assert_eq!(fwd, bwd);
            }
            OpI::Rehash(buckets) => {
                sut.rehash(buckets);
                prop_assert_eq!(sut.bucket_count(), buckets.max(1));
            }
            OpI::Reserve(count) => {
                sut.reserve(count);
            }
        }

        check_invariants(&sut, &model, &stale)?;
    }
    Ok(())
}

// Property: state-machine equivalence against std::collections::HashMap,
// with structural checks (contiguous runs, handle staleness, load bound)
// after every step.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine((pool, ops) in arb_scenario()) {
        // Small initial table so growth paths are exercised early.
        let sut: LinkedHashMap<String, i32> = LinkedHashMap::with_buckets(2);
        run_scenario(sut, pool, ops)?;
    }
}

// Collision variant using a constant hasher: every key lands in bucket 0,
// stressing run scans, replacement and removal repair within one run.
#[derive(Clone, Default)]
struct ConstBuildHasher;
struct ConstHasher;

impl BuildHasher for ConstBuildHasher {
    type Hasher = ConstHasher;
    fn build_hasher(&self) -> ConstHasher {
        ConstHasher
    }
}

impl Hasher for ConstHasher {
    fn write(&mut self, _bytes: &[u8]) {}
    fn finish(&self) -> u64 {
        0
    }
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine_with_collisions((pool, ops) in arb_scenario()) {
        let sut: LinkedHashMap<String, i32, ConstBuildHasher> =
            LinkedHashMap::with_buckets_and_hasher(2, ConstBuildHasher);
        run_scenario(sut, pool, ops)?;
    }
}
