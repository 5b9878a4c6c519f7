/*
 * Copyright 2022 Google LLC
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

use std::{convert::Infallible, net::SocketAddr, sync::Arc};

use hyper::{
    service::{make_service_fn, service_fn},
    Server, Uri,
};

use super::ShutdownRx;
use crate::{
    filters::{FilterChain, NextHandler},
    request::{header_str, list_from_csv, ResellerRequest, ROLES},
    upstream::Upstream,
    Request,
};

pub const PORT: u16 = 7000;

/// Run the configured filter chain as an HTTP reverse proxy in front of a
/// storage proxy.
#[derive(clap::Args, Clone, Debug)]
pub struct Proxy {
    /// The address to accept client requests on.
    #[clap(short, long, env = "SWIFT_ADDONS_LISTEN", default_value_t = default_listen())]
    pub listen: SocketAddr,
    /// The storage proxy requests are forwarded to, e.g. `http://127.0.0.1:8080`.
    #[clap(short, long, env = "SWIFT_ADDONS_UPSTREAM")]
    pub upstream: Uri,
    /// Roles that mark a request as a reseller request. Stands in for the
    /// authentication layer which normally makes that decision.
    #[clap(long = "reseller-role", env = "SWIFT_ADDONS_RESELLER_ROLES", value_delimiter = ',')]
    pub reseller_roles: Vec<String>,
}

fn default_listen() -> SocketAddr {
    (std::net::Ipv6Addr::UNSPECIFIED, PORT).into()
}

impl Proxy {
    /// Start and run a proxy until `shutdown_rx` is notified.
    #[tracing::instrument(skip_all)]
    pub async fn run(
        self,
        config: Arc<crate::Config>,
        mut shutdown_rx: ShutdownRx,
    ) -> crate::Result<()> {
        let upstream = Upstream::new(self.upstream.clone())?;
        let chain = Arc::new(config.filter_chain(NextHandler::new(Arc::new(upstream)))?);
        let reseller_roles: Arc<[String]> = self.reseller_roles.into();

        let make_svc = make_service_fn(move |_conn| {
            let chain = chain.clone();
            let reseller_roles = reseller_roles.clone();
            async move {
                Ok::<_, Infallible>(service_fn(move |request: Request| {
                    let chain = chain.clone();
                    let reseller_roles = reseller_roles.clone();
                    async move {
                        Ok::<_, Infallible>(serve(&chain, &reseller_roles, request).await)
                    }
                }))
            }
        });

        let server = Server::try_bind(&self.listen)?.serve(make_svc);
        tracing::info!(
            address = %server.local_addr(),
            upstream = %self.upstream,
            filters = config.filters.len(),
            "Starting proxy"
        );

        server
            .with_graceful_shutdown(async move {
                shutdown_rx.changed().await.ok();
            })
            .await?;

        tracing::info!("proxy stopped");
        Ok(())
    }
}

async fn serve(
    chain: &FilterChain,
    reseller_roles: &[String],
    mut request: Request,
) -> crate::Response {
    let is_reseller = !reseller_roles.is_empty()
        && list_from_csv(header_str(request.headers(), ROLES).unwrap_or_default())
            .iter()
            .any(|role| reseller_roles.contains(role));
    request.extensions_mut().insert(ResellerRequest(is_reseller));

    chain.serve(request).await
}
