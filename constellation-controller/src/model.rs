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

use chrono::{DateTime, Utc};
use constellation_common::frame::Frame;
use constellation_common::model::WorkerId;
use serde::Serialize;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// A connected worker as the controller sees it. The registry owns the
/// record; everything else holds the id and looks it up under the registry
/// lock.
pub struct RegisteredWorker {
    pub id: WorkerId,
    /// Transport peer address, for diagnostics only.
    pub address: String,
    pub admitted_at: DateTime<Utc>,
    last_activity: RwLock<DateTime<Utc>>,
    healthy: AtomicBool,
    /// Cancelled when the worker is evicted or the controller shuts down;
    /// every per-worker task derives from it.
    pub cancellation: CancellationToken,
    outbound: mpsc::UnboundedSender<Frame>,
}

impl RegisteredWorker {
    pub fn new(
        id: WorkerId,
        address: String,
        outbound: mpsc::UnboundedSender<Frame>,
        cancellation: CancellationToken,
    ) -> RegisteredWorker {
        let now = Utc::now();
        RegisteredWorker {
            id,
            address,
            admitted_at: now,
            last_activity: RwLock::new(now),
            healthy: AtomicBool::new(true),
            cancellation,
            outbound,
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Acquire)
    }

    /// Only the worker's heartbeat loop flips this.
    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::Release);
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        *self.last_activity.read().unwrap()
    }

    pub fn touch(&self) {
        *self.last_activity.write().unwrap() = Utc::now();
    }

    /// Enqueues a frame for the connection's writer task. Fails once the
    /// connection is gone and the queue has been dropped.
    pub fn push_frame(&self, frame: Frame) -> Result<(), ChannelClosed> {
        self.outbound.send(frame).map_err(|_| ChannelClosed(self.id))
    }

    pub fn info(&self) -> WorkerInfo {
        WorkerInfo {
            id: self.id,
            address: self.address.clone(),
            healthy: self.is_healthy(),
            admitted_utc: self.admitted_at,
            last_activity_utc: self.last_activity(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("outbound channel to worker {0} is closed")]
pub struct ChannelClosed(pub WorkerId);

/// Worker record as served by the admin API.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct WorkerInfo {
    pub id: WorkerId,
    pub address: String,
    pub healthy: bool,
    pub admitted_utc: DateTime<Utc>,
    pub last_activity_utc: DateTime<Utc>,
}
