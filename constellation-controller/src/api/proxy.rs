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
use crate::error::{DispatchError, ErrorBody, RoutingError};
use axum::Json;
use axum::body::Body;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderName, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use constellation_common::SafeDisplay;
use constellation_common::frame::{Frame, FrameHeaders};
use constellation_common::model::{CorrelationId, WorkerId};
use std::net::SocketAddr;
use tracing::{debug, error, info, warn};
use url::Url;

const X_REQUEST: HeaderName = HeaderName::from_static("x-request");
const X_WORKER: HeaderName = HeaderName::from_static("x-worker");

pub(crate) async fn handle_proxy(
    State(services): State<Services>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request,
) -> Response {
    proxy_request(&services, peer, request).await
}

/// Routes the request to the owning worker and suspends until its response
/// frame comes back. Every outcome carries the request id in `x-request`;
/// successful (and failed-after-routing) outcomes also name the worker in
/// `x-worker`.
pub(crate) async fn proxy_request(
    services: &Services,
    peer: SocketAddr,
    request: Request,
) -> Response {
    let request_id = CorrelationId::new();
    let resource = request.uri().path().to_string();

    let worker = match services.router.route(&resource) {
        Ok(worker) => worker,
        Err(error @ RoutingError::NoWorkers { .. }) => {
            info!(request_id = %request_id, resource = %resource, "routing failed: {error}");
            return error_response(
                StatusCode::BAD_GATEWAY,
                ErrorBody::bad_gateway(error.to_safe_string()),
                request_id,
                None,
            );
        }
    };

    let frame = match build_request_frame(services, peer, request, request_id).await {
        Ok(frame) => frame,
        Err(error) => {
            error!(request_id = %request_id, "failed to build request frame: {error:#}");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorBody::internal("Failed to process the request."),
                request_id,
                Some(worker.id),
            );
        }
    };

    debug!(
        request_id = %request_id,
        worker_id = %worker.id,
        resource = %resource,
        "proxying request"
    );

    match services
        .correlator
        .dispatch(&worker, frame, services.config.proxy.timeout())
        .await
    {
        Ok(response) => build_http_response(response, request_id, worker.id),
        Err(error @ DispatchError::Timeout { .. }) => {
            info!(request_id = %request_id, worker_id = %worker.id, "{error}");
            error_response(
                StatusCode::REQUEST_TIMEOUT,
                ErrorBody::timeout(error.to_safe_string()),
                request_id,
                Some(worker.id),
            )
        }
        Err(error @ DispatchError::ProxyFailed { .. }) => {
            warn!(request_id = %request_id, worker_id = %worker.id, "{error}");
            error_response(
                StatusCode::BAD_GATEWAY,
                ErrorBody::bad_gateway(error.to_safe_string()),
                request_id,
                Some(worker.id),
            )
        }
        Err(error) => {
            error!(request_id = %request_id, worker_id = %worker.id, "{error}");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorBody::internal(error.to_safe_string()),
                request_id,
                Some(worker.id),
            )
        }
    }
}

async fn build_request_frame(
    services: &Services,
    peer: SocketAddr,
    request: Request,
    request_id: CorrelationId,
) -> anyhow::Result<Frame> {
    let (parts, body) = request.into_parts();
    let body = axum::body::to_bytes(body, usize::MAX).await?;

    let authority = parts
        .headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| {
            format!(
                "{}:{}",
                services.config.webserver.hostname, services.config.webserver.port
            )
        });
    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|path_and_query| path_and_query.as_str())
        .unwrap_or("/");
    let url = Url::parse(&format!("http://{authority}{path_and_query}"))?;

    let mut headers = FrameHeaders::new();
    for (name, value) in &parts.headers {
        if let Ok(value) = value.to_str() {
            headers.insert(name.as_str(), value);
        }
    }
    headers.insert("x-forwarded-for", peer.ip().to_string());

    let content_type = parts
        .headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    let mut frame = Frame::request(
        parts.method.as_str(),
        url,
        headers,
        content_type,
        body.to_vec(),
    );
    frame.correlation_id = request_id;
    Ok(frame)
}

fn build_http_response(frame: Frame, request_id: CorrelationId, worker_id: WorkerId) -> Response {
    let status = frame
        .status_code
        .map(|status| status.as_u16())
        .unwrap_or(200);

    let mut builder = Response::builder().status(status);
    for (name, values) in frame.headers.iter() {
        if skip_forwarding(name, &frame) {
            continue;
        }
        for value in values {
            builder = builder.header(name, value.as_str());
        }
    }
    if let Some(content_type) = &frame.content_type {
        builder = builder.header(header::CONTENT_TYPE, content_type);
    }
    builder = builder
        .header(X_REQUEST, request_id.to_string())
        .header(X_WORKER, worker_id.to_string());

    match builder.body(Body::from(frame.data)) {
        Ok(response) => response,
        Err(error) => {
            error!(request_id = %request_id, "failed to assemble proxied response: {error}");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorBody::internal("Failed to assemble the proxied response."),
                request_id,
                Some(worker_id),
            )
        }
    }
}

/// Headers the proxy owns on the response: connection management belongs to
/// this hop, the body length is recomputed, and the content type comes from
/// the frame's dedicated field.
fn skip_forwarding(name: &str, frame: &Frame) -> bool {
    matches!(
        name,
        "connection"
            | "keep-alive"
            | "transfer-encoding"
            | "upgrade"
            | "proxy-authenticate"
            | "proxy-authorization"
            | "te"
            | "trailer"
            | "content-length"
    ) || (name == "content-type" && frame.content_type.is_some())
}

fn error_response(
    status: StatusCode,
    body: ErrorBody,
    request_id: CorrelationId,
    worker_id: Option<WorkerId>,
) -> Response {
    let mut response = (status, Json(body)).into_response();
    if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
        response.headers_mut().insert(X_REQUEST, value);
    }
    if let Some(worker_id) = worker_id {
        if let Ok(value) = HeaderValue::from_str(&worker_id.to_string()) {
            response.headers_mut().insert(X_WORKER, value);
        }
    }
    response
}
