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

use crate::model::{CorrelationId, StatusCode, WorkerId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use url::Url;

/// What a frame carries. Anything unrecognized on the wire decodes as
/// `Unknown` and is dropped by both peers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FrameKind {
    Unknown,
    Heartbeat,
    Request,
    Response,
}

impl Default for FrameKind {
    fn default() -> Self {
        FrameKind::Unknown
    }
}

impl<'de> Deserialize<'de> for FrameKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let tag = String::deserialize(deserializer)?;
        Ok(match tag.as_str() {
            "Heartbeat" => FrameKind::Heartbeat,
            "Request" => FrameKind::Request,
            "Response" => FrameKind::Response,
            _ => FrameKind::Unknown,
        })
    }
}

/// Case-insensitive header multimap. Names are canonicalized to lowercase
/// on insertion and on decoding, so lookups never depend on the casing the
/// peer used.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FrameHeaders(BTreeMap<String, Vec<String>>);

impl FrameHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a value, keeping previously inserted values for the name.
    pub fn insert(&mut self, name: &str, value: impl Into<String>) {
        self.0
            .entry(name.to_ascii_lowercase())
            .or_default()
            .push(value.into());
    }

    /// Replaces all values for the name.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        self.0.insert(name.to_ascii_lowercase(), vec![value.into()]);
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .get(&name.to_ascii_lowercase())
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    pub fn get_all(&self, name: &str) -> &[String] {
        self.0
            .get(&name.to_ascii_lowercase())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(&name.to_ascii_lowercase())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0
            .iter()
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'de> Deserialize<'de> for FrameHeaders {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = BTreeMap::<String, Vec<String>>::deserialize(deserializer)?;
        let mut headers = FrameHeaders::default();
        for (name, values) in raw {
            for value in values {
                headers.insert(&name, value);
            }
        }
        Ok(headers)
    }
}

/// The absolute request URL; path, query and segments are derived views.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameUrl {
    #[serde(rename = "Uri")]
    uri: Url,
}

impl FrameUrl {
    pub fn new(uri: Url) -> Self {
        FrameUrl { uri }
    }

    pub fn uri(&self) -> &Url {
        &self.uri
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn query(&self) -> Option<&str> {
        self.uri.query()
    }

    pub fn segments(&self) -> Vec<&str> {
        self.uri
            .path_segments()
            .map(|segments| segments.filter(|segment| !segment.is_empty()).collect())
            .unwrap_or_default()
    }
}

/// The envelope exchanged on the worker channel, as UTF-8 JSON in a binary
/// transport message. Unknown fields are ignored on decode; optional fields
/// are omitted when absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    #[serde(rename = "GUID")]
    pub correlation_id: CorrelationId,
    #[serde(rename = "Type", default)]
    pub kind: FrameKind,
    #[serde(rename = "TimestampUtc")]
    pub timestamp_utc: DateTime<Utc>,
    #[serde(rename = "ExpirationUtc", default, skip_serializing_if = "Option::is_none")]
    pub expiration_utc: Option<DateTime<Utc>>,
    #[serde(rename = "StatusCode", default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<StatusCode>,
    #[serde(rename = "Method", default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(rename = "ContentType", default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(rename = "Url", default, skip_serializing_if = "Option::is_none")]
    pub url: Option<FrameUrl>,
    #[serde(rename = "Headers", default)]
    pub headers: FrameHeaders,
    #[serde(rename = "Data", default, with = "base64_bytes")]
    pub data: Vec<u8>,
}

impl Frame {
    /// Periodic probe sent by the controller; the worker id travels in the
    /// payload for diagnostics. Receivers ignore heartbeats beyond the
    /// transport acknowledgement.
    pub fn heartbeat(worker_id: &WorkerId) -> Frame {
        Frame {
            correlation_id: CorrelationId::new(),
            kind: FrameKind::Heartbeat,
            timestamp_utc: Utc::now(),
            expiration_utc: None,
            status_code: None,
            method: None,
            content_type: None,
            url: None,
            headers: FrameHeaders::new(),
            data: worker_id.to_string().into_bytes(),
        }
    }

    pub fn request(
        method: &str,
        url: Url,
        headers: FrameHeaders,
        content_type: Option<String>,
        data: Vec<u8>,
    ) -> Frame {
        Frame {
            correlation_id: CorrelationId::new(),
            kind: FrameKind::Request,
            timestamp_utc: Utc::now(),
            expiration_utc: None,
            status_code: None,
            method: Some(method.to_string()),
            content_type,
            url: Some(FrameUrl::new(url)),
            headers,
            data,
        }
    }

    pub fn response(
        status_code: StatusCode,
        content_type: Option<String>,
        headers: FrameHeaders,
        data: Vec<u8>,
    ) -> Frame {
        Frame {
            correlation_id: CorrelationId::new(),
            kind: FrameKind::Response,
            timestamp_utc: Utc::now(),
            expiration_utc: None,
            status_code: Some(status_code),
            method: None,
            content_type,
            url: None,
            headers,
            data,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, FrameError> {
        serde_json::to_vec(self).map_err(FrameError::Encode)
    }

    pub fn decode(bytes: &[u8]) -> Result<Frame, FrameError> {
        serde_json::from_slice(bytes).map_err(FrameError::Decode)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("failed to encode frame: {0}")]
    Encode(serde_json::Error),
    #[error("failed to decode frame: {0}")]
    Decode(serde_json::Error),
}

mod base64_bytes {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(data))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
