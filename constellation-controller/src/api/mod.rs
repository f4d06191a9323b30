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
use axum::Router;
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::get;

mod admin;
mod proxy;

const WELCOME_HTML: &str = include_str!("../../data/welcome.html");
const FAVICON_PNG: &[u8] = include_bytes!("../../data/favicon.png");

/// The public surface. `GET|HEAD /` and `GET|HEAD /favicon.ico` are
/// reserved; `GET /workers` and `GET /maps` are admin when the API key
/// header is present; everything else — including non-GET methods on the
/// reserved paths — is proxied.
pub fn public_router(services: Services) -> Router {
    Router::new()
        .route("/", get(welcome).fallback(proxy::handle_proxy))
        .route("/favicon.ico", get(favicon).fallback(proxy::handle_proxy))
        .route(
            "/workers",
            get(admin::get_workers).fallback(proxy::handle_proxy),
        )
        .route("/maps", get(admin::get_maps).fallback(proxy::handle_proxy))
        .fallback(proxy::handle_proxy)
        .with_state(services)
}

async fn welcome() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/html")], WELCOME_HTML)
}

async fn favicon() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "image/png")], FAVICON_PNG)
}
