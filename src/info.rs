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

//! Container metadata lookups.

use std::{collections::HashMap, sync::Arc};

use hyper::{Body, HeaderMap, Method, StatusCode};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};

use crate::{
    filters::{DynHandler, FilterError},
    request::{sys_meta_prefix, user_meta_prefix, AUTH_TOKEN, SERVICE_TOKEN},
    Request,
};

/// Characters escaped when an account or container name is put back into a
/// request path.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// A point-in-time view of a container's metadata.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContainerInfo {
    /// Status of the request that produced this snapshot.
    pub status: StatusCode,
    /// User metadata, keyed by the lower-cased header suffix
    /// (`X-Container-Meta-Write-Restricted` becomes `write-restricted`).
    pub meta: HashMap<String, String>,
    /// System metadata, keyed the same way.
    pub sysmeta: HashMap<String, String>,
}

impl ContainerInfo {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            meta: HashMap::new(),
            sysmeta: HashMap::new(),
        }
    }

    /// Builds the snapshot from the headers of a container `HEAD` response.
    pub fn from_headers(status: StatusCode, headers: &HeaderMap) -> Self {
        let meta_prefix = user_meta_prefix("container");
        let sysmeta_prefix = sys_meta_prefix("container");
        let mut info = Self::new(status);

        for (name, value) in headers {
            let Ok(value) = value.to_str() else {
                tracing::debug!(header = %name, "skipping non UTF-8 metadata header");
                continue;
            };

            let name = name.as_str();
            if let Some(key) = name.strip_prefix(&meta_prefix) {
                info.meta.insert(key.to_owned(), value.to_owned());
            } else if let Some(key) = name.strip_prefix(&sysmeta_prefix) {
                info.sysmeta.insert(key.to_owned(), value.to_owned());
            }
        }

        info
    }

    /// Returns a user metadata value.
    pub fn meta(&self, key: &str) -> Option<&str> {
        self.meta.get(key).map(String::as_str)
    }
}

/// Headers of the caller's request that a lookup carries over, so the
/// lookup is made with the caller's credentials.
pub const CREDENTIAL_HEADERS: &[&str] = &[AUTH_TOKEN, SERVICE_TOKEN];

/// Fetches the metadata of an `(account, container)` pair on behalf of the
/// request whose headers are `caller`.
///
/// Implementations own their failure handling; whatever they return as an
/// error is propagated to the caller of the filter unchanged.
#[async_trait::async_trait]
pub trait ContainerInfoLookup: Send + Sync {
    async fn lookup(
        &self,
        account: &str,
        container: &str,
        caller: &HeaderMap,
    ) -> Result<ContainerInfo, FilterError>;
}

/// An owned pointer to a dynamic [`ContainerInfoLookup`].
pub type DynContainerInfoLookup = Arc<dyn ContainerInfoLookup>;

/// Looks up container metadata by sending a `HEAD` request for the container
/// through a handler, normally the rest of the pipeline.
///
/// The caller's [`CREDENTIAL_HEADERS`] are copied onto the `HEAD`. A lookup
/// the upstream refuses to authorize is an error rather than a container
/// without metadata.
pub struct HeadRequestLookup {
    app: DynHandler,
    version: String,
}

impl HeadRequestLookup {
    pub fn new(app: DynHandler) -> Self {
        Self::with_version(app, "v1")
    }

    pub fn with_version(app: DynHandler, version: impl Into<String>) -> Self {
        Self {
            app,
            version: version.into(),
        }
    }

    fn path(&self, account: &str, container: &str) -> String {
        format!(
            "/{}/{}/{}",
            self.version,
            utf8_percent_encode(account, PATH_SEGMENT),
            utf8_percent_encode(container, PATH_SEGMENT),
        )
    }
}

#[async_trait::async_trait]
impl ContainerInfoLookup for HeadRequestLookup {
    #[tracing::instrument(skip(self, caller), level = "debug")]
    async fn lookup(
        &self,
        account: &str,
        container: &str,
        caller: &HeaderMap,
    ) -> Result<ContainerInfo, FilterError> {
        let mut request: Request = hyper::Request::builder()
            .method(Method::HEAD)
            .uri(self.path(account, container))
            .body(Body::empty())?;

        let headers = request.headers_mut();
        for name in CREDENTIAL_HEADERS {
            if let Some(value) = caller.get(*name) {
                headers.insert(*name, value.clone());
            }
        }

        let response = self.app.handle(request).await?;
        let status = response.status();

        if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            return Err(FilterError::Lookup(format!(
                "container info lookup for {account}/{container} was refused with {status}"
            )));
        }

        if !status.is_success() {
            tracing::debug!(%status, "container info lookup did not succeed");
            return Ok(ContainerInfo::new(status));
        }

        Ok(ContainerInfo::from_headers(status, response.headers()))
    }
}
