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

//! Handlers at the end of a filter chain.

use hyper::{client::HttpConnector, header, http::uri, Client, StatusCode, Uri};

use crate::{
    filters::{FilterError, Handler},
    request::plain_text,
    Request, Response,
};

/// Forwards every request it receives to a storage proxy.
#[derive(Clone, Debug)]
pub struct Upstream {
    client: Client<HttpConnector>,
    scheme: uri::Scheme,
    authority: uri::Authority,
}

impl Upstream {
    /// Forwards to the scheme and authority of `base`, which must be an
    /// absolute `http` URL.
    pub fn new(base: Uri) -> crate::Result<Self> {
        let parts = base.into_parts();
        let scheme = parts.scheme.unwrap_or(uri::Scheme::HTTP);
        eyre::ensure!(
            scheme == uri::Scheme::HTTP,
            "upstream scheme `{scheme}` is not supported, use `http`"
        );
        let authority = parts
            .authority
            .ok_or_else(|| eyre::eyre!("upstream address needs a host"))?;

        Ok(Self {
            client: Client::new(),
            scheme,
            authority,
        })
    }

    fn target(&self, uri: &Uri) -> Result<Uri, FilterError> {
        let path_and_query = uri
            .path_and_query()
            .cloned()
            .unwrap_or_else(|| uri::PathAndQuery::from_static("/"));

        Uri::builder()
            .scheme(self.scheme.clone())
            .authority(self.authority.clone())
            .path_and_query(path_and_query)
            .build()
            .map_err(From::from)
    }
}

#[async_trait::async_trait]
impl Handler for Upstream {
    #[tracing::instrument(skip_all, level = "trace", fields(upstream = %self.authority))]
    async fn handle(&self, mut request: Request) -> Result<Response, FilterError> {
        *request.uri_mut() = self.target(request.uri())?;
        request.headers_mut().remove(header::HOST);

        Ok(self.client.request(request).await?)
    }
}

/// Answers every request with `503 Service Unavailable`, for chains built
/// without an application behind them.
#[derive(Clone, Copy, Debug, Default)]
pub struct Unrouted;

#[async_trait::async_trait]
impl Handler for Unrouted {
    async fn handle(&self, _: Request) -> Result<Response, FilterError> {
        Ok(plain_text(
            StatusCode::SERVICE_UNAVAILABLE,
            "no upstream configured",
        ))
    }
}
