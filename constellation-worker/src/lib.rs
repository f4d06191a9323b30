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

use crate::connection::WorkerConnection;
use crate::handler::{EchoHandler, RequestHandler};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[cfg(test)]
test_r::enable!();

pub mod config;
pub mod connection;
pub mod handler;

pub use config::WorkerConfig;

/// Runs a worker with the given handler until shutdown.
pub async fn run_with_handler(
    config: WorkerConfig,
    handler: Arc<dyn RequestHandler>,
) -> anyhow::Result<()> {
    config.validate()?;

    let cancellation = CancellationToken::new();
    {
        let cancellation = cancellation.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Shutdown signal received");
                cancellation.cancel();
            }
        });
    }

    WorkerConnection::new(config, handler, cancellation)
        .run_forever()
        .await;
    Ok(())
}

/// Runs the bundled echo worker.
pub async fn run(config: WorkerConfig) -> anyhow::Result<()> {
    run_with_handler(config, Arc::new(EchoHandler)).await
}
