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

use crate::bindings::BindingTable;
use crate::model::{RegisteredWorker, WorkerInfo};
use constellation_common::model::WorkerId;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

pub(crate) struct RegistryState {
    pub(crate) workers: Vec<Arc<RegisteredWorker>>,
    /// Round-robin cursor into `workers`; advanced when a new binding is
    /// recorded, clamped on removal.
    pub(crate) cursor: usize,
}

/// The set of connected workers. All mutations go through a single mutex;
/// snapshots are copies so callers never iterate under the lock. Lock order
/// when the binding table is also needed: registry first, bindings second.
pub struct WorkerRegistry {
    state: Mutex<RegistryState>,
    bindings: Arc<BindingTable>,
}

impl WorkerRegistry {
    pub fn new(bindings: Arc<BindingTable>) -> WorkerRegistry {
        WorkerRegistry {
            state: Mutex::new(RegistryState {
                workers: Vec::new(),
                cursor: 0,
            }),
            bindings,
        }
    }

    /// Admits a worker. Returns false when the id is already present; a
    /// worker is never re-admitted under the same identifier while its
    /// record is still in the registry.
    pub fn add(&self, worker: Arc<RegisteredWorker>) -> bool {
        let mut state = self.state.lock().unwrap();
        if state.workers.iter().any(|existing| existing.id == worker.id) {
            return false;
        }
        state.workers.push(worker);
        true
    }

    /// Removes a worker and, atomically with it, every resource binding
    /// owned by it. The binding lock is taken while the registry lock is
    /// still held so no route call can observe the worker without its
    /// bindings.
    pub fn remove(&self, id: &WorkerId) -> bool {
        let mut state = self.state.lock().unwrap();
        let before = state.workers.len();
        state.workers.retain(|worker| worker.id != *id);
        if state.workers.len() == before {
            return false;
        }

        // removal compacts the list, so the cursor may now be out of range
        state.cursor %= state.workers.len().max(1);

        let evicted = self.bindings.evict_worker(id);
        if !evicted.is_empty() {
            debug!(
                worker_id = %id,
                keys = evicted.len(),
                "evicted resource bindings of removed worker"
            );
        }
        true
    }

    pub fn lookup(&self, id: &WorkerId) -> Option<Arc<RegisteredWorker>> {
        let state = self.state.lock().unwrap();
        state.workers.iter().find(|worker| worker.id == *id).cloned()
    }

    pub fn snapshot(&self) -> Vec<Arc<RegisteredWorker>> {
        self.state.lock().unwrap().workers.clone()
    }

    pub fn worker_infos(&self) -> Vec<WorkerInfo> {
        self.state
            .lock()
            .unwrap()
            .workers
            .iter()
            .map(|worker| worker.info())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.state.lock().unwrap().workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn lock_state(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap()
    }
}
