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

/// The worker's business logic. Invoked once per request frame; returning
/// `None` means no response is sent and the controller side will time the
/// request out. Errors are converted into a 500 response frame at the
/// dispatch boundary and never tear down the channel.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn handle_request(&self, request: Frame) -> anyhow::Result<Option<Frame>>;
}

/// Echoes the request payload back with status 200. The default handler of
/// the bundled worker binary, also convenient for smoke tests.
pub struct EchoHandler;

#[async_trait]
impl RequestHandler for EchoHandler {
    async fn handle_request(&self, request: Frame) -> anyhow::Result<Option<Frame>> {
        Ok(Some(Frame::response(
            StatusCode::OK,
            request.content_type.clone(),
            FrameHeaders::new(),
            request.data,
        )))
    }
}
