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

use crate::{TagHandler, TestController, Tracing};
use std::sync::Arc;
use test_r::{inherit_test_dep, test};

inherit_test_dep!(Tracing);

const API_KEY_HEADER: &str = "x-api-key";
const API_KEY: &str = "constellation-admin";

#[test]
#[tracing::instrument]
async fn workers_endpoint_lists_the_fleet(_tracing: &Tracing) {
    let controller = TestController::start().await;
    let _w1 = controller.attach_worker(Arc::new(TagHandler { tag: "w1" })).await;
    let _w2 = controller.attach_worker(Arc::new(TagHandler { tag: "w2" })).await;
    let client = reqwest::Client::new();

    let response = client
        .get(controller.url("/workers"))
        .header(API_KEY_HEADER, API_KEY)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let workers: serde_json::Value = response.json().await.unwrap();
    let workers = workers.as_array().unwrap();
    assert_eq!(workers.len(), 2);
    for worker in workers {
        assert!(worker["Id"].is_string());
        assert!(worker["Address"].is_string());
        assert_eq!(worker["Healthy"], true);
        assert!(worker["AdmittedUtc"].is_string());
        assert!(worker["LastActivityUtc"].is_string());
    }
}

#[test]
#[tracing::instrument]
async fn maps_endpoint_groups_resources_by_owner(_tracing: &Tracing) {
    let controller = TestController::start().await;
    let _w1 = controller.attach_worker(Arc::new(TagHandler { tag: "w1" })).await;
    let client = reqwest::Client::new();

    client
        .get(controller.url("/api/users"))
        .send()
        .await
        .unwrap();
    client
        .get(controller.url("/api/orders"))
        .send()
        .await
        .unwrap();

    let response = client
        .get(controller.url("/maps"))
        .header(API_KEY_HEADER, API_KEY)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let maps: serde_json::Value = response.json().await.unwrap();
    let maps = maps.as_object().unwrap();
    assert_eq!(maps.len(), 1);
    let keys: Vec<&str> = maps
        .values()
        .next()
        .unwrap()
        .as_array()
        .unwrap()
        .iter()
        .map(|key| key.as_str().unwrap())
        .collect();
    assert_eq!(keys, ["/api/orders", "/api/users"]);
}

#[test]
#[tracing::instrument]
async fn a_wrong_key_is_unauthorized(_tracing: &Tracing) {
    let controller = TestController::start().await;
    let client = reqwest::Client::new();

    let response = client
        .get(controller.url("/workers"))
        .header(API_KEY_HEADER, "not-the-key")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 401);
    let body = response.text().await.unwrap();
    assert!(body.contains("Authorization"));
}

#[test]
#[tracing::instrument]
async fn an_absent_key_turns_admin_paths_into_proxy_requests(_tracing: &Tracing) {
    let controller = TestController::start().await;
    let client = reqwest::Client::new();

    // empty pool: the proxied request fails with 502
    let response = client.get(controller.url("/workers")).send().await.unwrap();
    assert_eq!(response.status(), 502);
    let body: serde_json::Value = response.json().await.unwrap();
    assert!(
        body["message"]
            .as_str()
            .unwrap()
            .contains("No workers available")
    );

    // with a worker attached the same request is proxied to it
    let _worker = controller.attach_worker(Arc::new(TagHandler { tag: "w1" })).await;
    let response = client.get(controller.url("/workers")).send().await.unwrap();
    assert_eq!(response.status(), 200);
    assert!(response.headers().contains_key("x-worker"));
    assert_eq!(response.text().await.unwrap(), "w1");
}

#[test]
#[tracing::instrument]
async fn admin_keys_are_configurable(_tracing: &Tracing) {
    let controller = TestController::start_with(|config| {
        config.admin.api_key_header = "x-admin-token".to_string();
        config.admin.api_keys = vec!["alpha".to_string(), "beta".to_string()];
    })
    .await;
    let client = reqwest::Client::new();

    let response = client
        .get(controller.url("/workers"))
        .header("x-admin-token", "beta")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    // the default header name is no longer recognized, so this is proxied
    let response = client
        .get(controller.url("/workers"))
        .header(API_KEY_HEADER, API_KEY)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 502);
}
