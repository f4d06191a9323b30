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

use async_trait::async_trait;
use constellation_common::frame::{Frame, FrameHeaders};
use constellation_common::model::StatusCode;
use constellation_common::tracing::{TracingConfig, init_tracing_with_default_debug_env_filter};
use constellation_controller::bootstrap::Services;
use constellation_controller::config::ControllerConfig;
use constellation_worker::config::WorkerConfig;
use constellation_worker::connection::WorkerConnection;
use constellation_worker::handler::RequestHandler;
use std::sync::Arc;
use std::time::Duration;
use test_r::test_dep;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

pub mod admin;
pub mod proxy;

test_r::enable!();

#[derive(Debug)]
pub struct Tracing;

#[test_dep]
pub fn tracing() -> Tracing {
    let mut config = TracingConfig::default();
    config.console.colors = false;
    init_tracing_with_default_debug_env_filter(&config);
    Tracing
}

/// A controller bound to ephemeral ports, torn down on drop.
pub struct TestController {
    pub http_port: u16,
    pub socket_port: u16,
    pub services: Services,
    join_set: JoinSet<anyhow::Result<()>>,
}

impl TestController {
    pub async fn start() -> TestController {
        Self::start_with(|_| {}).await
    }

    pub async fn start_with(customize: impl FnOnce(&mut ControllerConfig)) -> TestController {
        let mut config = ControllerConfig::default();
        config.webserver.hostname = "127.0.0.1".to_string();
        config.webserver.port = 0;
        config.socket.hostnames = vec!["127.0.0.1".to_string()];
        config.socket.port = 0;
        customize(&mut config);
        config.validate().expect("test configuration must be valid");

        let services = Services::new(config);
        let mut join_set = JoinSet::new();
        let details = constellation_controller::start(services.clone(), &mut join_set)
            .await
            .expect("failed to start test controller");

        TestController {
            http_port: details.http_port,
            socket_port: details.socket_ports[0],
            services,
            join_set,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://127.0.0.1:{}{path}", self.http_port)
    }

    /// Connects a worker and waits until the controller has admitted it.
    pub async fn attach_worker(&self, handler: Arc<dyn RequestHandler>) -> TestWorker {
        let expected = self.services.registry.len() + 1;
        let worker = TestWorker::connect(self.socket_port, handler);
        self.wait_for_worker_count(expected).await;
        worker
    }

    pub async fn wait_for_worker_count(&self, expected: usize) {
        for _ in 0..200 {
            if self.services.registry.len() == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        panic!(
            "registry never reached {expected} workers (currently {})",
            self.services.registry.len()
        );
    }
}

impl Drop for TestController {
    fn drop(&mut self) {
        self.services.cancellation.cancel();
        self.join_set.abort_all();
    }
}

/// A worker process stand-in running inside the test.
pub struct TestWorker {
    cancellation: CancellationToken,
}

impl TestWorker {
    pub fn connect(socket_port: u16, handler: Arc<dyn RequestHandler>) -> TestWorker {
        let mut config = WorkerConfig::default();
        config.controller.hostname = "127.0.0.1".to_string();
        config.controller.port = socket_port;
        config.connection_check_interval_ms = 1000;

        let cancellation = CancellationToken::new();
        let connection = WorkerConnection::new(config, handler, cancellation.clone());
        tokio::spawn(async move { connection.run_forever().await });

        TestWorker { cancellation }
    }

    /// Closes the channel; the controller evicts the worker shortly after.
    pub fn detach(&self) {
        self.cancellation.cancel();
    }
}

impl Drop for TestWorker {
    fn drop(&mut self) {
        self.cancellation.cancel();
    }
}

/// Responds 200 with a fixed body, so tests can tell which worker served a
/// request.
pub struct TagHandler {
    pub tag: &'static str,
}

#[async_trait]
impl RequestHandler for TagHandler {
    async fn handle_request(&self, _request: Frame) -> anyhow::Result<Option<Frame>> {
        Ok(Some(Frame::response(
            StatusCode::OK,
            Some("text/plain".to_string()),
            FrameHeaders::new(),
            self.tag.as_bytes().to_vec(),
        )))
    }
}

/// Never responds; requests routed here run into the proxy timeout.
pub struct SilentHandler;

#[async_trait]
impl RequestHandler for SilentHandler {
    async fn handle_request(&self, _request: Frame) -> anyhow::Result<Option<Frame>> {
        Ok(None)
    }
}

/// Responds with the given status and echoes a request header into the
/// body, for asserting what the controller forwarded.
pub struct InspectingHandler {
    pub status: u16,
    pub echo_header: &'static str,
}

#[async_trait]
impl RequestHandler for InspectingHandler {
    async fn handle_request(&self, request: Frame) -> anyhow::Result<Option<Frame>> {
        let value = request
            .headers
            .get(self.echo_header)
            .unwrap_or_default()
            .to_string();
        let mut headers = FrameHeaders::new();
        headers.insert("x-inspected", self.echo_header);
        Ok(Some(Frame::response(
            StatusCode::new(self.status)?,
            Some("text/plain".to_string()),
            headers,
            value.into_bytes(),
        )))
    }
}

/// Always fails; the dispatch boundary must turn this into a 500 frame.
pub struct FailingHandler;

#[async_trait]
impl RequestHandler for FailingHandler {
    async fn handle_request(&self, _request: Frame) -> anyhow::Result<Option<Frame>> {
        Err(anyhow::anyhow!("worker business logic exploded"))
    }
}
