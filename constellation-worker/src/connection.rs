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

use crate::config::WorkerConfig;
use crate::handler::RequestHandler;
use anyhow::{Context, anyhow};
use constellation_common::frame::{Frame, FrameHeaders, FrameKind};
use constellation_common::model::{StatusCode, WORKER_ID_HEADER, WorkerId};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio_tungstenite::connect_async_tls_with_config;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Maintains the channel to the controller: connects, dispatches request
/// frames to the handler, pushes responses back, and reconnects forever on
/// loss. Every connection attempt announces a fresh worker identifier, so
/// resource bindings do not survive a reconnect.
pub struct WorkerConnection {
    config: WorkerConfig,
    handler: Arc<dyn RequestHandler>,
    cancellation: CancellationToken,
}

impl WorkerConnection {
    pub fn new(
        config: WorkerConfig,
        handler: Arc<dyn RequestHandler>,
        cancellation: CancellationToken,
    ) -> WorkerConnection {
        WorkerConnection {
            config,
            handler,
            cancellation,
        }
    }

    /// Connects and serves until cancellation, sleeping
    /// `ConnectionCheckIntervalMs` between attempts.
    pub async fn run_forever(&self) {
        while !self.cancellation.is_cancelled() {
            let worker_id = WorkerId::new();
            match self.run_connection(worker_id).await {
                Ok(()) => info!(%worker_id, "connection closed"),
                Err(error) => warn!(%worker_id, "connection failed: {error:#}"),
            }

            tokio::select! {
                _ = self.cancellation.cancelled() => break,
                _ = tokio::time::sleep(self.config.connection_check_interval()) => {}
            }
        }
    }

    async fn run_connection(&self, worker_id: WorkerId) -> anyhow::Result<()> {
        let request = self.create_request(&worker_id)?;

        let (ws_stream, _) = connect_async_tls_with_config(request, None, false, None)
            .await
            .map_err(|error| anyhow!("Failed to connect to controller: {error}"))?;

        info!(%worker_id, "connected to controller");
        let (mut write, mut read) = ws_stream.split();

        loop {
            tokio::select! {
                _ = self.cancellation.cancelled() => {
                    let _ = write.send(Message::Close(None)).await;
                    return Ok(());
                }
                message = read.next() => match message {
                    None => return Ok(()),
                    Some(Err(error)) => return Err(anyhow!("channel error: {error}")),
                    Some(Ok(message)) => {
                        let frame = match message {
                            Message::Binary(data) => Frame::decode(data.as_slice()),
                            Message::Text(text) => Frame::decode(text.as_str().as_bytes()),
                            Message::Close(_) => return Ok(()),
                            _ => continue,
                        };

                        let frame = match frame {
                            Ok(frame) => frame,
                            Err(error) => {
                                warn!(%worker_id, "failed to decode frame: {error}");
                                continue;
                            }
                        };

                        if let Some(response) = self.dispatch(frame).await {
                            let encoded = response.encode()?;
                            write
                                .send(Message::Binary(encoded.into()))
                                .await
                                .context("Failed to send response frame")?;
                        }
                    }
                }
            }
        }
    }

    /// The dispatch boundary: handler errors become a 500 response frame
    /// carrying the incoming frame's correlation id; they never close the
    /// channel.
    async fn dispatch(&self, frame: Frame) -> Option<Frame> {
        let correlation_id = frame.correlation_id;
        match frame.kind {
            FrameKind::Heartbeat => None,
            FrameKind::Request => match self.handler.handle_request(frame).await {
                Ok(Some(mut response)) => {
                    response.correlation_id = correlation_id;
                    response.kind = FrameKind::Response;
                    Some(response)
                }
                Ok(None) => None,
                Err(error) => {
                    error!(%correlation_id, "request handler failed: {error:#}");
                    let mut response = Frame::response(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        Some("text/plain".to_string()),
                        FrameHeaders::new(),
                        format!("{error:#}").into_bytes(),
                    );
                    response.correlation_id = correlation_id;
                    Some(response)
                }
            },
            kind => {
                debug!(?kind, "ignoring frame");
                None
            }
        }
    }

    fn create_request(&self, worker_id: &WorkerId) -> anyhow::Result<Request> {
        let mut url = self.config.controller.url();

        let ws_scheme = if url.scheme() == "http" { "ws" } else { "wss" };
        url.set_scheme(ws_scheme)
            .map_err(|()| anyhow!("Failed to set ws url scheme"))?;

        let mut request = url
            .to_string()
            .into_client_request()
            .context("Failed to create connect request")?;
        request
            .headers_mut()
            .insert(WORKER_ID_HEADER, worker_id.to_string().parse()?);

        Ok(request)
    }
}
