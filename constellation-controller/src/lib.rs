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

use crate::bootstrap::Services;
use anyhow::Context;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tracing::{Instrument, info, warn};

#[cfg(test)]
test_r::enable!();

pub mod api;
pub mod bindings;
pub mod bootstrap;
pub mod channel;
pub mod config;
pub mod correlator;
pub mod error;
pub mod heartbeat;
pub mod model;
pub mod registry;
pub mod router;

/// Where the listeners actually ended up, for configurations using port 0.
pub struct RunDetails {
    pub http_port: u16,
    pub socket_ports: Vec<u16>,
}

/// Binds the public webserver and the worker channel listeners and spawns
/// them, together with the response retention sweep, into the join set.
pub async fn start(
    services: Services,
    join_set: &mut JoinSet<anyhow::Result<()>>,
) -> anyhow::Result<RunDetails> {
    let config = services.config.clone();

    let http_listener = TcpListener::bind((config.webserver.hostname.as_str(), config.webserver.port))
        .await
        .with_context(|| {
            format!(
                "Failed to bind webserver to {}:{}",
                config.webserver.hostname, config.webserver.port
            )
        })?;
    let http_port = http_listener.local_addr()?.port();
    {
        let app = api::public_router(services.clone());
        let cancellation = services.cancellation.clone();
        join_set.spawn(
            async move {
                axum::serve(
                    http_listener,
                    app.into_make_service_with_connect_info::<SocketAddr>(),
                )
                .with_graceful_shutdown(cancellation.cancelled_owned())
                .await?;
                Ok(())
            }
            .in_current_span(),
        );
    }
    info!(
        "Webserver listening on {}:{http_port}",
        config.webserver.hostname
    );

    if config.socket.ssl {
        warn!(
            "Socket.Ssl is enabled: workers will connect with wss; TLS termination is expected at the ingress"
        );
    }

    let mut socket_ports = Vec::new();
    for hostname in &config.socket.hostnames {
        let listener = TcpListener::bind((hostname.as_str(), config.socket.port))
            .await
            .with_context(|| {
                format!(
                    "Failed to bind worker channel to {hostname}:{}",
                    config.socket.port
                )
            })?;
        let port = listener.local_addr()?.port();
        socket_ports.push(port);

        let app = channel::channel_router(services.clone());
        let cancellation = services.cancellation.clone();
        join_set.spawn(
            async move {
                axum::serve(
                    listener,
                    app.into_make_service_with_connect_info::<SocketAddr>(),
                )
                .with_graceful_shutdown(cancellation.cancelled_owned())
                .await?;
                Ok(())
            }
            .in_current_span(),
        );
        info!("Worker channel listening on {hostname}:{port}");
    }

    {
        let correlator = services.correlator.clone();
        let cancellation = services.cancellation.clone();
        join_set.spawn(
            async move {
                correlator.run_retention_sweep(cancellation).await;
                Ok(())
            }
            .in_current_span(),
        );
    }

    Ok(RunDetails {
        http_port,
        socket_ports,
    })
}

/// Runs a controller until shutdown. Validates the configuration, starts
/// the listeners, and cancels everything on ctrl-c.
pub async fn run(config: ControllerConfig) -> anyhow::Result<()> {
    config.validate()?;

    let services = Services::new(config);
    let mut join_set = JoinSet::new();
    start(services.clone(), &mut join_set).await?;

    {
        let cancellation = services.cancellation.clone();
        join_set.spawn(async move {
            tokio::signal::ctrl_c().await?;
            info!("Shutdown signal received");
            cancellation.cancel();
            Ok(())
        });
    }

    while let Some(result) = join_set.join_next().await {
        result??;
    }
    Ok(())
}

pub use config::ControllerConfig;
