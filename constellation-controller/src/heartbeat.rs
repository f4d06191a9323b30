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

use crate::model::RegisteredWorker;
use crate::registry::WorkerRegistry;
use constellation_common::frame::Frame;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

/// One loop per worker. Emits a probe immediately on admission and then
/// every `interval`; a successful send resets the consecutive failure
/// counter, and once the counter exceeds `max_failures` the worker is
/// marked unhealthy, evicted (which cascades to its bindings) and the loop
/// ends. The loop also ends on cancellation.
pub async fn run_heartbeat_loop(
    worker: Arc<RegisteredWorker>,
    registry: Arc<WorkerRegistry>,
    interval: Duration,
    max_failures: u32,
) {
    let cancellation = worker.cancellation.clone();
    let mut failures: u32 = 0;
    let mut first = true;

    loop {
        if !first {
            tokio::select! {
                _ = cancellation.cancelled() => break,
                _ = sleep(interval) => {}
            }
        }
        first = false;

        if cancellation.is_cancelled() {
            break;
        }

        match worker.push_frame(Frame::heartbeat(&worker.id)) {
            Ok(()) => {
                failures = 0;
            }
            Err(error) => {
                failures += 1;
                warn!(
                    worker_id = %worker.id,
                    failures,
                    max_failures,
                    "heartbeat send failed: {error}"
                );
                if failures > max_failures {
                    worker.set_healthy(false);
                    info!(
                        worker_id = %worker.id,
                        "worker exceeded its heartbeat failure budget, evicting"
                    );
                    registry.remove(&worker.id);
                    cancellation.cancel();
                    break;
                }
            }
        }
    }
}
