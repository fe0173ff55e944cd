// Copyright 2026 foyer Project Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::collections::HashMap;

use itertools::Itertools;
use rand::{rngs::StdRng, Rng, SeedableRng};

use super::*;

#[test]
fn test_slab_reuses_vacant_slots() {
    let mut slab = Slab::new();
    let tokens = (0..4).map(|i| slab.insert(i)).collect_vec();
    assert_eq!(slab.len(), 4);

    assert_eq!(slab.remove(tokens[1]), Some(1));
    assert_eq!(slab.remove(tokens[1]), None);
    assert_eq!(slab.remove(tokens[2]), Some(2));
    assert_eq!(slab.len(), 2);

    // Vacant slots are handed out again, most recently freed first.
    let t = slab.insert(20);
    assert_eq!(t.index(), tokens[2].index());
    let t = slab.insert(10);
    assert_eq!(t.index(), tokens[1].index());
    let t = slab.insert(40);
    assert_eq!(t.index(), 4);

    assert_eq!(slab.get(tokens[0]), Some(&0));
    assert_eq!(slab.get(tokens[3]), Some(&3));
    assert_eq!(slab.len(), 5);
}

#[test]
fn test_slab_get_mut_and_clear() {
    let mut slab = Slab::with_capacity(2);
    let t = slab.insert(String::from("ds=1"));
    slab.get_mut(t).unwrap().push_str("/hr=2");
    assert_eq!(slab.get(t).map(String::as_str), Some("ds=1/hr=2"));

    slab.clear();
    assert!(slab.is_empty());
    assert!(slab.get(t).is_none());
}

#[test]
fn test_slab_fuzzy() {
    let mut rng = StdRng::seed_from_u64(42);
    let mut slab = Slab::new();
    let mut model: HashMap<usize, (Token, u64)> = HashMap::new();

    for i in 0..10_000u64 {
        if model.is_empty() || rng.random_bool(0.6) {
            let token = slab.insert(i);
            assert!(model.insert(token.index(), (token, i)).is_none());
        } else {
            let key = *model.keys().nth(rng.random_range(0..model.len())).unwrap();
            let (token, v) = model.remove(&key).unwrap();
            assert_eq!(slab.remove(token), Some(v));
        }
        assert_eq!(slab.len(), model.len());
    }

    for (token, v) in model.values() {
        assert_eq!(slab.get(*token), Some(v));
    }
}
