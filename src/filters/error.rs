/*
 * Copyright 2021 Google LLC
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

use hyper::StatusCode;
use prometheus::Error as MetricsError;

use crate::{
    request::{plain_text, RequestError},
    Response,
};

#[cfg(doc)]
use crate::filters::{FilterFactory, Handler};

/// All possible errors that can be returned from [`Handler`] implementations.
///
/// Policy rejections are not errors, filters answer those with a response of
/// their own. An error means the request could not be evaluated at all.
#[derive(Debug, thiserror::Error)]
pub enum FilterError {
    /// The request is malformed; carries the client error to answer with.
    #[error(transparent)]
    Request(#[from] RequestError),
    #[error("upstream request failed: {0}")]
    Upstream(#[from] hyper::Error),
    #[error("failed to build request: {0}")]
    Http(#[from] hyper::http::Error),
    #[error("container info lookup failed: {0}")]
    Lookup(String),
}

impl FilterError {
    pub fn discriminant(&self) -> &'static str {
        match self {
            Self::Request(error) => error.discriminant(),
            Self::Upstream(_) => "filter::upstream",
            Self::Http(_) => "filter::http",
            Self::Lookup(_) => "filter::container info lookup",
        }
    }

    /// The status a client sees for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Request(error) => error.status(),
            Self::Upstream(_) | Self::Lookup(_) => StatusCode::BAD_GATEWAY,
            Self::Http(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Converts the error into the response sent to the client. Client errors
    /// carry their message, anything else is logged and answered generically.
    pub fn into_response(self) -> Response {
        let status = self.status();

        match self {
            Self::Request(error) => {
                tracing::debug!(%error, %status, "rejecting malformed request");
                plain_text(status, error.to_string())
            }
            error => {
                tracing::warn!(%error, kind = error.discriminant(), "failed to handle request");
                plain_text(status, status.canonical_reason().unwrap_or("error"))
            }
        }
    }
}

impl PartialEq for FilterError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Request(a), Self::Request(b)) => a == b,
            (Self::Lookup(a), Self::Lookup(b)) => a == b,
            _ => false,
        }
    }
}

/// An error that occurred when attempting to create a filter from
/// a [`FilterFactory`].
#[derive(Debug, Eq, PartialEq, thiserror::Error)]
pub enum CreationError {
    #[error("filter `{}` not found", .0)]
    NotFound(String),
    #[error("filter `{}` requires configuration, but none provided", .0)]
    MissingConfig(&'static str),
    #[error("field `{}` is invalid, reason: {}", field, reason)]
    FieldInvalid { field: String, reason: String },
    #[error("Deserialization failed: {}", .0)]
    DeserializeFailed(String),
    #[error("Failed to initialize metrics: {}", .0)]
    InitializeMetricsFailed(String),
}

impl From<MetricsError> for CreationError {
    fn from(error: MetricsError) -> Self {
        Self::InitializeMetricsFailed(error.to_string())
    }
}

impl From<serde_yaml::Error> for CreationError {
    fn from(error: serde_yaml::Error) -> Self {
        Self::DeserializeFailed(error.to_string())
    }
}

impl From<serde_json::Error> for CreationError {
    fn from(error: serde_json::Error) -> Self {
        Self::DeserializeFailed(error.to_string())
    }
}
