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

use constellation_common::SafeDisplay;
use constellation_common::model::WorkerId;
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum RoutingError {
    #[error("No workers available for resource {resource}.")]
    NoWorkers { resource: String },
}

impl SafeDisplay for RoutingError {
    fn to_safe_string(&self) -> String {
        self.to_string()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Failed to forward request to worker {worker_id}: {reason}")]
    ProxyFailed { worker_id: WorkerId, reason: String },
    #[error("No response received within {timeout_ms}ms.")]
    Timeout { timeout_ms: u64 },
    #[error("Internal dispatch failure: {0}")]
    Internal(String),
}

impl SafeDisplay for DispatchError {
    fn to_safe_string(&self) -> String {
        match self {
            DispatchError::ProxyFailed { .. } => {
                "The request could not be forwarded to its worker.".to_string()
            }
            DispatchError::Timeout { timeout_ms } => {
                format!("No response received within {timeout_ms}ms.")
            }
            DispatchError::Internal(_) => "Internal proxy failure.".to_string(),
        }
    }
}

/// Error kind as it appears in JSON error bodies returned to HTTP clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    BadGateway,
    Timeout,
    Unauthorized,
    InternalError,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub kind: ErrorKind,
    pub message: String,
}

impl ErrorBody {
    pub fn bad_gateway(message: impl Into<String>) -> ErrorBody {
        ErrorBody {
            kind: ErrorKind::BadGateway,
            message: message.into(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> ErrorBody {
        ErrorBody {
            kind: ErrorKind::Timeout,
            message: message.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> ErrorBody {
        ErrorBody {
            kind: ErrorKind::Unauthorized,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> ErrorBody {
        ErrorBody {
            kind: ErrorKind::InternalError,
            message: message.into(),
        }
    }
}
