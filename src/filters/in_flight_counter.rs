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

use prometheus::IntGauge;
use serde::{Deserialize, Serialize};

use crate::filters::prelude::*;

/// Tracks the number of requests currently inside the handlers it wraps, in
/// the `swift_addons_requests_in_flight` gauge.
///
/// A request is counted from the moment it enters until the wrapped handlers
/// return the response head, or fail, or the request is dropped. Streaming
/// the response body out to the client is not counted.
pub struct InFlightCounter {
    in_flight: IntGauge,
    next: DynHandler,
}

impl InFlightCounter {
    fn new(config: Config, next: NextHandler) -> Result<Self, CreationError> {
        let in_flight = crate::metrics::requests_in_flight()
            .get_metric_with_label_values(&[config.route.as_str()])?;

        Ok(Self {
            in_flight,
            next: next.handler(),
        })
    }
}

/// Decrements the gauge once the wrapped handlers are done with the request,
/// however that ends.
struct InFlightGuard<'a>(&'a IntGauge);

impl<'a> InFlightGuard<'a> {
    fn enter(gauge: &'a IntGauge) -> Self {
        gauge.inc();
        Self(gauge)
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.dec();
    }
}

#[async_trait::async_trait]
impl Handler for InFlightCounter {
    #[cfg_attr(feature = "instrument", tracing::instrument(skip_all))]
    async fn handle(&self, request: Request) -> Result<Response, FilterError> {
        let _guard = InFlightGuard::enter(&self.in_flight);
        self.next.handle(request).await
    }
}

impl StaticFilter for InFlightCounter {
    const NAME: &'static str = "swift.filters.in_flight_counter.v1.InFlightCounter";
    type Configuration = Config;

    fn try_from_config(
        config: Option<Self::Configuration>,
        next: NextHandler,
    ) -> Result<Self, CreationError> {
        Self::new(config.unwrap_or_default(), next)
    }
}

/// `in_flight_counter` filter's configuration.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, schemars::JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Value of the `route` label the requests are counted under.
    #[serde(default = "default_route")]
    pub route: String,
}

fn default_route() -> String {
    "default".into()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            route: default_route(),
        }
    }
}
