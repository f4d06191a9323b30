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
use crate::heartbeat::run_heartbeat_loop;
use crate::model::RegisteredWorker;
use axum::Router;
use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade, close_code};
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use constellation_common::frame::{Frame, FrameKind};
use constellation_common::model::{WORKER_ID_HEADER, WorkerId};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::borrow::Cow;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, warn};

/// The worker-facing listener: a single websocket upgrade route. The worker
/// announces its identifier in the upgrade request headers.
pub fn channel_router(services: Services) -> Router {
    Router::new()
        .route("/", any(handle_ws))
        .with_state(services)
}

async fn handle_ws(
    ws: WebSocketUpgrade,
    State(services): State<Services>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Response {
    let worker_id = match headers
        .get(WORKER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<WorkerId>().ok())
    {
        Some(worker_id) => worker_id,
        None => {
            return (
                StatusCode::BAD_REQUEST,
                format!("Missing or invalid {WORKER_ID_HEADER} header"),
            )
                .into_response();
        }
    };

    ws.on_upgrade(move |socket| handle_socket(socket, services, worker_id, peer))
}

async fn handle_socket(
    socket: WebSocket,
    services: Services,
    worker_id: WorkerId,
    peer: SocketAddr,
) {
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let cancellation = services.cancellation.child_token();
    let worker = Arc::new(RegisteredWorker::new(
        worker_id,
        peer.to_string(),
        outbound_tx,
        cancellation.clone(),
    ));

    if !services.registry.add(worker.clone()) {
        warn!(worker_id = %worker_id, "rejecting connection: worker id already registered");
        let mut socket = socket;
        let _ = socket
            .send(Message::Close(Some(CloseFrame {
                code: close_code::POLICY,
                reason: Cow::from("worker id already registered"),
            })))
            .await;
        return;
    }

    info!(worker_id = %worker_id, peer = %peer, "worker admitted");

    let heartbeat = tokio::spawn(
        run_heartbeat_loop(
            worker.clone(),
            services.registry.clone(),
            services.config.heartbeat.interval(),
            services.config.heartbeat.max_failures,
        )
        .in_current_span(),
    );

    let (sender, receiver) = socket.split();
    let writer = tokio::spawn(write_loop(sender, outbound_rx, cancellation.clone()).in_current_span());

    read_loop(receiver, &services, &worker).await;

    // the connection is gone, one way or another: evict the worker and
    // stop its tasks
    cancellation.cancel();
    services.registry.remove(&worker.id);
    let _ = writer.await;
    let _ = heartbeat.await;
    info!(worker_id = %worker_id, "worker disconnected");
}

async fn write_loop(
    mut sender: SplitSink<WebSocket, Message>,
    mut outbound: mpsc::UnboundedReceiver<Frame>,
    cancellation: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancellation.cancelled() => {
                let _ = sender.send(Message::Close(None)).await;
                break;
            }
            frame = outbound.recv() => match frame {
                None => break,
                Some(frame) => {
                    let encoded = match frame.encode() {
                        Ok(bytes) => bytes,
                        Err(error) => {
                            warn!("failed to encode outbound frame: {error}");
                            continue;
                        }
                    };
                    if let Err(error) = sender.send(Message::Binary(encoded)).await {
                        // dropping the queue here is what makes further
                        // pushes fail, feeding the heartbeat failure budget
                        debug!("worker channel send failed: {error}");
                        break;
                    }
                }
            }
        }
    }
}

async fn read_loop(
    mut receiver: SplitStream<WebSocket>,
    services: &Services,
    worker: &Arc<RegisteredWorker>,
) {
    loop {
        tokio::select! {
            _ = worker.cancellation.cancelled() => break,
            message = receiver.next() => match message {
                None => break,
                Some(Err(error)) => {
                    debug!(worker_id = %worker.id, "worker channel error: {error}");
                    break;
                }
                Some(Ok(message)) => match message {
                    Message::Binary(data) => handle_frame(services, worker, &data),
                    Message::Text(text) => handle_frame(services, worker, text.as_bytes()),
                    Message::Ping(_) | Message::Pong(_) => {}
                    Message::Close(_) => break,
                }
            }
        }
    }
}

fn handle_frame(services: &Services, worker: &Arc<RegisteredWorker>, data: &[u8]) {
    worker.touch();
    match Frame::decode(data) {
        Ok(frame) => match frame.kind {
            FrameKind::Response => services.correlator.deliver(frame),
            // nothing to do beyond the transport acknowledgement
            FrameKind::Heartbeat => {}
            kind => debug!(worker_id = %worker.id, ?kind, "ignoring frame"),
        },
        Err(error) => {
            warn!(worker_id = %worker.id, "failed to decode frame from worker: {error}")
        }
    }
}
