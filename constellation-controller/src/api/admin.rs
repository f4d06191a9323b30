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

use crate::api::proxy::proxy_request;
use crate::bootstrap::Services;
use crate::config::AdminConfig;
use crate::error::ErrorBody;
use axum::Json;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use std::net::SocketAddr;

pub(crate) enum AdminGate {
    Authorized,
    WrongKey,
    /// No API key header at all: the request is indistinguishable from a
    /// proxy request and is treated as one.
    NoKey,
}

pub(crate) fn admin_gate(config: &AdminConfig, headers: &HeaderMap) -> AdminGate {
    match headers.get(config.api_key_header.as_str()) {
        None => AdminGate::NoKey,
        Some(value) => match value.to_str() {
            Ok(key) if config.api_keys.iter().any(|candidate| candidate == key) => {
                AdminGate::Authorized
            }
            _ => AdminGate::WrongKey,
        },
    }
}

pub(crate) async fn get_workers(
    State(services): State<Services>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request,
) -> Response {
    match admin_gate(&services.config.admin, request.headers()) {
        AdminGate::Authorized => Json(services.registry.worker_infos()).into_response(),
        AdminGate::WrongKey => unauthorized(),
        AdminGate::NoKey => proxy_request(&services, peer, request).await,
    }
}

pub(crate) async fn get_maps(
    State(services): State<Services>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request,
) -> Response {
    match admin_gate(&services.config.admin, request.headers()) {
        AdminGate::Authorized => Json(services.bindings.snapshot()).into_response(),
        AdminGate::WrongKey => unauthorized(),
        AdminGate::NoKey => proxy_request(&services, peer, request).await,
    }
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorBody::unauthorized(
            "Authorization failed: invalid API key.",
        )),
    )
        .into_response()
}
