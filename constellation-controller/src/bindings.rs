// Copyright 2024-2025 Golem Cloud
//
// Licensed under the Golem Source License v1.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://license.golem.cloud/LICENSE
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use constellation_common::model::WorkerId;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

/// Maps a resource key (the request path, query excluded) to the worker
/// that owns it. A key maps to at most one worker, and a binding survives
/// exactly as long as its owner stays in the registry and healthy. When the
/// registry lock is also needed it is taken first.
pub struct BindingTable {
    bindings: Mutex<HashMap<String, WorkerId>>,
}

impl BindingTable {
    pub fn new() -> BindingTable {
        BindingTable {
            bindings: Mutex::new(HashMap::new()),
        }
    }

    /// Records ownership. Re-binding a key to the same worker is a no-op.
    pub fn bind(&self, key: &str, id: WorkerId) {
        self.bindings.lock().unwrap().insert(key.to_string(), id);
    }

    pub fn owner(&self, key: &str) -> Option<WorkerId> {
        self.bindings.lock().unwrap().get(key).copied()
    }

    /// Removes every binding owned by the worker; returns the keys that
    /// were bound to it.
    pub fn evict_worker(&self, id: &WorkerId) -> Vec<String> {
        let mut bindings = self.bindings.lock().unwrap();
        let evicted: Vec<String> = bindings
            .iter()
            .filter(|(_, owner)| *owner == id)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &evicted {
            bindings.remove(key);
        }
        evicted
    }

    pub fn evict_key(&self, key: &str) -> bool {
        self.bindings.lock().unwrap().remove(key).is_some()
    }

    /// Copy of the table grouped by owner, as served by the admin API.
    pub fn snapshot(&self) -> BTreeMap<WorkerId, Vec<String>> {
        let bindings = self.bindings.lock().unwrap();
        let mut snapshot: BTreeMap<WorkerId, Vec<String>> = BTreeMap::new();
        for (key, owner) in bindings.iter() {
            snapshot.entry(*owner).or_default().push(key.clone());
        }
        for keys in snapshot.values_mut() {
            keys.sort();
        }
        snapshot
    }

    pub fn len(&self) -> usize {
        self.bindings.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for BindingTable {
    fn default() -> Self {
        Self::new()
    }
}
