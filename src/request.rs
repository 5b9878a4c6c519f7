/*
 * Copyright 2023 Google LLC
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

//! Helpers for taking apart storage API requests: path splitting, header
//! validation and the small value grammars shared by the filters.

use std::borrow::Cow;

use hyper::{header, Body, HeaderMap, StatusCode};
use percent_encoding::percent_decode_str;

use crate::Response;

/// API versions accepted in the first path segment.
pub const VALID_API_VERSIONS: &[&str] = &["v1", "v1.0"];

/// Strings accepted as `true` by [`config_true_value`].
pub const TRUE_VALUES: &[&str] = &["true", "1", "yes", "on", "t", "y"];

pub const ROLES: &str = "x-roles";
pub const SERVICE_ROLES: &str = "x-service-roles";
pub const AUTH_TOKEN: &str = "x-auth-token";
pub const SERVICE_TOKEN: &str = "x-service-token";
pub const DESTINATION: &str = "destination";
pub const DESTINATION_ACCOUNT: &str = "destination-account";

/// Request extension set by the authentication layer when the caller acts as
/// the reseller (operator) of the cluster.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ResellerRequest(pub bool);

/// Returns `true` if the request was marked as a reseller request.
pub fn is_reseller_request<B>(request: &hyper::Request<B>) -> bool {
    request
        .extensions()
        .get::<ResellerRequest>()
        .map_or(false, |reseller| reseller.0)
}

/// Errors raised while validating the shape of a request.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum RequestError {
    #[error("invalid path: {0}")]
    InvalidPath(String),
    #[error("{0}")]
    PreconditionFailed(String),
}

impl RequestError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidPath(_) => StatusCode::BAD_REQUEST,
            Self::PreconditionFailed(_) => StatusCode::PRECONDITION_FAILED,
        }
    }

    pub fn discriminant(&self) -> &'static str {
        match self {
            Self::InvalidPath(_) => "request::invalid path",
            Self::PreconditionFailed(_) => "request::precondition failed",
        }
    }
}

/// Percent-decodes `value`. `+` is left alone, as it is in request paths.
pub fn unquote(value: &str) -> Cow<'_, str> {
    percent_decode_str(value).decode_utf8_lossy()
}

/// Returns the prefix of user metadata headers for `server_type`, e.g.
/// `x-container-meta-`.
pub fn user_meta_prefix(server_type: &str) -> String {
    format!("x-{}-meta-", server_type.to_lowercase())
}

/// Returns the prefix of system metadata headers for `server_type`, e.g.
/// `x-account-sysmeta-`.
pub fn sys_meta_prefix(server_type: &str) -> String {
    format!("x-{}-sysmeta-", server_type.to_lowercase())
}

/// Splits `path` into its segments, validating that at least `min_segs` and
/// at most `max_segs` are present. Missing trailing segments are `None`.
///
/// With `rest_with_last` the final segment receives the remainder of the path,
/// slashes included, which is how object names are carried.
///
/// ```
/// use swift_addons::request::split_path;
///
/// assert_eq!(
///     split_path("/v1/AUTH_test/photos", 3, 4, true).unwrap(),
///     [Some("v1"), Some("AUTH_test"), Some("photos"), None]
/// );
/// assert_eq!(
///     split_path("/v1/AUTH_test/photos/2023/cat.jpg", 3, 4, true).unwrap(),
///     [Some("v1"), Some("AUTH_test"), Some("photos"), Some("2023/cat.jpg")]
/// );
/// assert!(split_path("/v1/AUTH_test", 3, 4, true).is_err());
/// assert!(split_path("/v1//photos", 3, 4, true).is_err());
/// ```
pub fn split_path(
    path: &str,
    min_segs: usize,
    max_segs: usize,
    rest_with_last: bool,
) -> Result<Vec<Option<&str>>, RequestError> {
    let invalid = || RequestError::InvalidPath(path.to_owned());
    let min_segs = min_segs + 1;
    let max_segs = max_segs + 1;

    let segs: Vec<&str> = if rest_with_last {
        path.splitn(max_segs, '/').collect()
    } else {
        path.splitn(max_segs + 1, '/').collect()
    };
    let count = segs.len();
    let empty_required = segs
        .iter()
        .take(min_segs)
        .skip(1)
        .any(|segment| segment.is_empty());

    let out_of_bounds = if rest_with_last {
        count > max_segs
    } else {
        // A single trailing slash is tolerated.
        count > max_segs + 1 || (count == max_segs + 1 && !segs[max_segs].is_empty())
    };

    if !segs[0].is_empty() || count < min_segs || out_of_bounds || empty_required {
        return Err(invalid());
    }

    let mut out: Vec<Option<&str>> = segs
        .into_iter()
        .skip(1)
        .take(max_segs - 1)
        .map(Some)
        .collect();
    out.resize(max_segs - 1, None);
    Ok(out)
}

/// Returns `true` if `version` is an API version this proxy serves.
pub fn valid_api_version(version: &str) -> bool {
    VALID_API_VERSIONS.contains(&version)
}

/// Returns `true` if `value` is one of [`TRUE_VALUES`], ignoring case.
pub fn config_true_value(value: &str) -> bool {
    TRUE_VALUES
        .iter()
        .any(|truthy| truthy.eq_ignore_ascii_case(value))
}

/// Splits a comma separated list, trimming entries and dropping empty ones.
pub fn list_from_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(String::from)
        .collect()
}

/// Returns the header's value as a string, if it is present and valid UTF-8.
pub fn header_str<'h>(headers: &'h HeaderMap, name: &str) -> Option<&'h str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// Validates a path carried in header `name` (e.g. `Destination`) and splits
/// it into exactly `length` segments.
pub fn check_path_header(
    headers: &HeaderMap,
    name: &str,
    length: usize,
    error_message: &str,
) -> Result<Vec<String>, RequestError> {
    let failed = || RequestError::PreconditionFailed(error_message.to_owned());
    let value = headers
        .get(name)
        .ok_or_else(failed)?
        .to_str()
        .map_err(|_| failed())?;

    let mut path = unquote(value).into_owned();
    if !path.starts_with('/') {
        path.insert(0, '/');
    }

    let segments = split_path(&path, length, length, true).map_err(|_| failed())?;
    Ok(segments
        .into_iter()
        .map(|segment| segment.unwrap_or_default().to_owned())
        .collect())
}

fn check_name_format<'n>(name: &'n str, target_type: &str) -> Result<&'n str, RequestError> {
    if name.is_empty() {
        return Err(RequestError::PreconditionFailed(format!(
            "{target_type} name cannot be empty"
        )));
    }

    if name.contains('/') {
        return Err(RequestError::PreconditionFailed(format!(
            "{target_type} name cannot contain slashes"
        )));
    }

    Ok(name)
}

/// Validates a container name taken from a header.
pub fn check_container_format(name: &str) -> Result<&str, RequestError> {
    check_name_format(name, "Container")
}

/// Validates an account name taken from a header.
pub fn check_account_format(name: &str) -> Result<&str, RequestError> {
    check_name_format(name, "Account")
}

/// Builds a `text/plain` response with the given status.
pub fn plain_text(status: StatusCode, body: impl Into<Body>) -> Response {
    let mut response = Response::new(body.into());
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("text/plain; charset=UTF-8"),
    );
    response
}
