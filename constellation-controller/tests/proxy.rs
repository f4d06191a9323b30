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

use crate::{
    FailingHandler, InspectingHandler, SilentHandler, TagHandler, TestController, Tracing,
};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use test_r::{inherit_test_dep, test};

inherit_test_dep!(Tracing);

fn worker_header(response: &reqwest::Response) -> String {
    response
        .headers()
        .get("x-worker")
        .expect("x-worker header missing")
        .to_str()
        .unwrap()
        .to_string()
}

#[test]
#[tracing::instrument]
async fn requests_for_a_resource_pin_to_one_worker(_tracing: &Tracing) {
    let controller = TestController::start().await;
    let worker = controller
        .attach_worker(Arc::new(TagHandler { tag: "w1" }))
        .await;
    let client = reqwest::Client::new();

    let mut owner = None;
    for _ in 0..5 {
        let response = client
            .get(controller.url("/api/users"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        let header = worker_header(&response);
        match &owner {
            None => owner = Some(header),
            Some(existing) => assert_eq!(&header, existing),
        }
        assert_eq!(response.text().await.unwrap(), "w1");
    }

    // with a single worker, a second resource lands on it as well
    let response = client
        .get(controller.url("/api/products"))
        .send()
        .await
        .unwrap();
    assert_eq!(worker_header(&response), owner.clone().unwrap());

    // the query string is not part of the resource key
    let response = client
        .get(controller.url("/api/users?page=2"))
        .send()
        .await
        .unwrap();
    assert_eq!(worker_header(&response), owner.clone().unwrap());
    assert_eq!(controller.services.bindings.len(), 2);

    // once the worker is gone, the resource has no owner
    worker.detach();
    controller.wait_for_worker_count(0).await;

    let response = client
        .get(controller.url("/api/users"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 502);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["kind"], "BadGateway");
    assert!(
        body["message"]
            .as_str()
            .unwrap()
            .contains("No workers available for resource /api/users")
    );
}

#[test]
#[tracing::instrument]
async fn failover_rebinds_to_a_surviving_worker(_tracing: &Tracing) {
    let controller = TestController::start().await;
    let workers = vec![
        ("w1", controller.attach_worker(Arc::new(TagHandler { tag: "w1" })).await),
        ("w2", controller.attach_worker(Arc::new(TagHandler { tag: "w2" })).await),
        ("w3", controller.attach_worker(Arc::new(TagHandler { tag: "w3" })).await),
    ];
    let client = reqwest::Client::new();

    let response = client
        .get(controller.url("/api/users"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let original_tag = response.text().await.unwrap();

    let (_, victim) = workers
        .iter()
        .find(|(tag, _)| *tag == original_tag)
        .expect("response body names an attached worker");
    victim.detach();
    controller.wait_for_worker_count(2).await;

    let mut replacement = None;
    for _ in 0..3 {
        let response = client
            .get(controller.url("/api/users"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        let tag = response.text().await.unwrap();
        assert_ne!(tag, original_tag);
        match &replacement {
            None => replacement = Some(tag),
            Some(existing) => assert_eq!(&tag, existing),
        }
    }
}

#[test]
#[tracing::instrument]
async fn new_resources_cover_the_whole_fleet(_tracing: &Tracing) {
    let controller = TestController::start().await;
    let _w1 = controller.attach_worker(Arc::new(TagHandler { tag: "w1" })).await;
    let _w2 = controller.attach_worker(Arc::new(TagHandler { tag: "w2" })).await;
    let _w3 = controller.attach_worker(Arc::new(TagHandler { tag: "w3" })).await;
    let client = reqwest::Client::new();

    let mut owners = HashSet::new();
    for index in 0..6 {
        let response = client
            .get(controller.url(&format!("/r{index}")))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        owners.insert(worker_header(&response));
    }

    assert_eq!(owners.len(), 3, "each worker serves at least one resource");

    // the ids in x-worker are the registry's ids
    let registered: HashSet<String> = controller
        .services
        .registry
        .worker_infos()
        .into_iter()
        .map(|info| info.id.to_string())
        .collect();
    assert_eq!(owners, registered);
}

#[test]
#[tracing::instrument]
async fn concurrent_requests_for_one_resource_share_an_owner(_tracing: &Tracing) {
    let controller = TestController::start().await;
    let _w1 = controller.attach_worker(Arc::new(TagHandler { tag: "w1" })).await;
    let _w2 = controller.attach_worker(Arc::new(TagHandler { tag: "w2" })).await;
    let _w3 = controller.attach_worker(Arc::new(TagHandler { tag: "w3" })).await;
    let client = reqwest::Client::new();

    let requests: Vec<_> = (0..20)
        .map(|_| {
            let client = client.clone();
            let url = controller.url("/api/concurrent");
            tokio::spawn(async move { client.post(url).body("payload").send().await.unwrap() })
        })
        .collect();

    let mut owners = HashSet::new();
    for request in requests {
        let response = request.await.unwrap();
        assert_eq!(response.status(), 200);
        owners.insert(worker_header(&response));
    }

    assert_eq!(owners.len(), 1, "all concurrent requests share one owner");
}

#[test]
#[tracing::instrument]
async fn a_silent_worker_times_the_request_out(_tracing: &Tracing) {
    let controller = TestController::start_with(|config| {
        config.proxy.timeout_ms = 1000;
    })
    .await;
    let _worker = controller.attach_worker(Arc::new(SilentHandler)).await;
    let client = reqwest::Client::new();

    let started = Instant::now();
    let response = client
        .post(controller.url("/slow"))
        .body("x")
        .send()
        .await
        .unwrap();
    let elapsed = started.elapsed();

    assert_eq!(response.status(), 408);
    assert!(elapsed >= Duration::from_millis(900), "returned too early");
    assert!(elapsed < Duration::from_secs(3), "timeout fired too late");
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["kind"], "Timeout");
}

#[test]
#[tracing::instrument]
async fn worker_status_and_headers_pass_through(_tracing: &Tracing) {
    let controller = TestController::start().await;
    let _worker = controller
        .attach_worker(Arc::new(InspectingHandler {
            status: 404,
            echo_header: "x-forwarded-for",
        }))
        .await;
    let client = reqwest::Client::new();

    let response = client
        .get(controller.url("/api/missing"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 404);
    assert_eq!(
        response.headers().get("x-inspected").unwrap(),
        "x-forwarded-for"
    );
    assert!(response.headers().contains_key("x-request"));
    // the controller stamped the source address onto the frame
    assert_eq!(response.text().await.unwrap(), "127.0.0.1");
}

#[test]
#[tracing::instrument]
async fn handler_failures_become_a_500_response(_tracing: &Tracing) {
    let controller = TestController::start().await;
    let _worker = controller.attach_worker(Arc::new(FailingHandler)).await;
    let client = reqwest::Client::new();

    let response = client
        .get(controller.url("/api/unstable"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 500);
    assert!(
        response
            .text()
            .await
            .unwrap()
            .contains("worker business logic exploded")
    );

    // the channel survived the failure: the next request still routes there
    let response = client
        .get(controller.url("/api/unstable"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 500);
}

#[test]
#[tracing::instrument]
async fn reserved_paths_are_served_without_workers(_tracing: &Tracing) {
    let controller = TestController::start().await;
    let client = reqwest::Client::new();

    let response = client.get(controller.url("/")).send().await.unwrap();
    assert_eq!(response.status(), 200);
    assert!(
        response
            .headers()
            .get("content-type")
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("text/html")
    );
    assert!(response.text().await.unwrap().contains("Constellation"));

    let response = client
        .get(controller.url("/favicon.ico"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.headers().get("content-type").unwrap(), "image/png");

    // everything else is proxied, which fails with an empty pool
    let response = client
        .get(controller.url("/anything"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 502);

    // a non-GET method on a reserved path is a proxy request too
    let response = client.post(controller.url("/")).send().await.unwrap();
    assert_eq!(response.status(), 502);
}
