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

use crate::error::DispatchError;
use crate::model::RegisteredWorker;
use chrono::{DateTime, Utc};
use constellation_common::frame::Frame;
use constellation_common::model::CorrelationId;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::debug;

struct InFlight {
    slot: oneshot::Sender<Frame>,
}

struct ParkedResponse {
    expires_at: DateTime<Utc>,
    // kept only until the sweep; the frame itself is never read back
    _frame: Frame,
}

/// Matches response frames to suspended dispatch calls, by correlation id
/// only. Responses whose waiter is gone are parked until their expiration
/// so late arrivals never accumulate.
pub struct Correlator {
    in_flight: scc::HashMap<CorrelationId, InFlight>,
    parked: scc::HashMap<CorrelationId, ParkedResponse>,
    retention_ms: u64,
}

impl Correlator {
    pub fn new(retention_ms: u64) -> Correlator {
        Correlator {
            in_flight: scc::HashMap::new(),
            parked: scc::HashMap::new(),
            retention_ms,
        }
    }

    /// Forwards the frame on the worker's channel and suspends until the
    /// matching response arrives, the timeout fires, or the worker goes
    /// away. The caller has already set a fresh correlation id on the
    /// frame.
    pub async fn dispatch(
        &self,
        worker: &RegisteredWorker,
        frame: Frame,
        timeout: Duration,
    ) -> Result<Frame, DispatchError> {
        let correlation_id = frame.correlation_id;

        let (slot, response) = oneshot::channel();
        if self
            .in_flight
            .insert_sync(correlation_id, InFlight { slot })
            .is_err()
        {
            return Err(DispatchError::Internal(format!(
                "correlation id collision: {correlation_id}"
            )));
        }
        // whichever way this call ends, the in-flight record must go away
        let _guard = InFlightGuard {
            correlator: self,
            correlation_id,
        };

        if let Err(error) = worker.push_frame(frame) {
            return Err(DispatchError::ProxyFailed {
                worker_id: worker.id,
                reason: error.to_string(),
            });
        }

        tokio::select! {
            result = response => match result {
                Ok(frame) => Ok(frame),
                Err(_) => Err(DispatchError::Internal(
                    "in-flight record dropped before completion".to_string(),
                )),
            },
            _ = tokio::time::sleep(timeout) => Err(DispatchError::Timeout {
                timeout_ms: timeout.as_millis() as u64,
            }),
            _ = worker.cancellation.cancelled() => Err(DispatchError::ProxyFailed {
                worker_id: worker.id,
                reason: "worker channel closed".to_string(),
            }),
        }
    }

    /// Called for every response frame arriving from any worker. Unmatched
    /// responses are parked until their expiration.
    pub fn deliver(&self, frame: Frame) {
        match self.in_flight.remove_sync(&frame.correlation_id) {
            Some((_, in_flight)) => {
                if let Err(frame) = in_flight.slot.send(frame) {
                    debug!(
                        correlation_id = %frame.correlation_id,
                        "waiter gave up before delivery, parking response"
                    );
                    self.park(frame);
                }
            }
            None => {
                debug!(
                    correlation_id = %frame.correlation_id,
                    "response does not match any in-flight request, parking"
                );
                self.park(frame);
            }
        }
    }

    fn park(&self, frame: Frame) {
        let expires_at = frame
            .expiration_utc
            .unwrap_or_else(|| Utc::now() + chrono::Duration::milliseconds(self.retention_ms as i64));
        let _ = self.parked.insert_sync(
            frame.correlation_id,
            ParkedResponse {
                expires_at,
                _frame: frame,
            },
        );
    }

    /// Drops parked responses whose expiration has passed; returns how many
    /// were evicted.
    pub fn sweep_expired(&self) -> usize {
        let now = Utc::now();
        let mut evicted = 0;
        self.parked.retain_sync(|_, parked| {
            let keep = parked.expires_at > now;
            if !keep {
                evicted += 1;
            }
            keep
        });
        evicted
    }

    /// Background sweep, one per controller.
    pub async fn run_retention_sweep(self: std::sync::Arc<Self>, cancellation: CancellationToken) {
        let period = Duration::from_millis(self.retention_ms.max(1000));
        let mut interval = tokio::time::interval(period);
        loop {
            tokio::select! {
                _ = cancellation.cancelled() => break,
                _ = interval.tick() => {
                    let evicted = self.sweep_expired();
                    if evicted > 0 {
                        debug!(evicted, "evicted expired retained responses");
                    }
                }
            }
        }
    }

    pub fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }

    pub fn parked_len(&self) -> usize {
        self.parked.len()
    }
}

struct InFlightGuard<'a> {
    correlator: &'a Correlator,
    correlation_id: CorrelationId,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let _ = self.correlator.in_flight.remove_sync(&self.correlation_id);
    }
}
