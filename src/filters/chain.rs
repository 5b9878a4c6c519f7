/*
 * Copyright 2020 Google LLC
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

use crate::{
    config::Filter as FilterConfig,
    filters::{prelude::*, FilterInstance, FilterRegistry},
};

/// A chain of filters wrapped around an application handler.
///
/// The first filter in the chain sees each request first and decides whether
/// to answer it or to pass it on to the second, and so on until the request
/// reaches the application. Each filter receives the next one as its
/// [`NextHandler`] when the chain is built, so a chain is immutable once
/// created.
#[derive(Clone)]
pub struct FilterChain {
    filters: Vec<(String, FilterInstance)>,
    head: DynHandler,
}

impl FilterChain {
    /// Validates the filter configurations and constructs a [`Self`] in front
    /// of `app` if all configurations are valid.
    pub fn try_create(
        filter_configs: impl IntoIterator<Item = FilterConfig>,
        app: NextHandler,
    ) -> Result<Self, CreationError> {
        let filter_configs: Vec<_> = filter_configs.into_iter().collect();
        let mut filters = Vec::with_capacity(filter_configs.len());
        let mut head = app.handler();

        // Built from the application outwards, each filter wraps the
        // previously created one.
        for filter_config in filter_configs.into_iter().rev() {
            let instance = FilterRegistry::get(
                &filter_config.name,
                CreateFilterArgs::new(filter_config.config, app.wrapping(head)),
            )?
            .with_label(filter_config.label);

            tracing::debug!(name = %filter_config.name, label = ?instance.label(), "created filter");
            head = instance.filter().clone();
            filters.push((filter_config.name, instance));
        }

        filters.reverse();
        Ok(Self { filters, head })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.filters.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Returns the configuration of each filter, in request order.
    pub fn iter(&self) -> impl Iterator<Item = FilterConfig> + '_ {
        self.filters.iter().map(|(name, instance)| FilterConfig {
            name: name.clone(),
            label: instance.label().map(String::from),
            config: match instance.config() {
                serde_json::Value::Null => None,
                value => Some(value.clone()),
            },
        })
    }

    /// Runs `request` through the chain, turning any error into the response
    /// the client receives.
    #[tracing::instrument(skip_all, fields(method = %request.method(), path = %request.uri().path()))]
    pub async fn serve(&self, request: Request) -> Response {
        let timer = crate::metrics::request_duration_seconds().start_timer();

        let response = match self.head.handle(request).await {
            Ok(response) => response,
            Err(error) => error.into_response(),
        };

        crate::metrics::responses_total(response.status());
        timer.observe_duration();
        response
    }
}

#[async_trait::async_trait]
impl Handler for FilterChain {
    async fn handle(&self, request: Request) -> Result<Response, FilterError> {
        self.head.handle(request).await
    }
}

impl std::fmt::Debug for FilterChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut filters = f.debug_struct("Filters");

        for (id, instance) in &self.filters {
            filters.field(id, instance.config());
        }

        filters.finish()
    }
}
