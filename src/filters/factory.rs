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

use std::sync::Arc;

use crate::{
    filters::{CreationError, DynHandler, FilterError, StaticFilter},
    info::{DynContainerInfoLookup, HeadRequestLookup},
    Request, Response,
};

/// An owned pointer to a dynamic [`FilterFactory`] instance.
pub type DynFilterFactory = Box<dyn FilterFactory>;

/// Provides the name and creation function for a given filter.
///
/// - The `create_filter` method takes in the configuration for the filter to
///   create and the handler it wraps, and returns a new instance of its filter
///   type.
/// - The `name` method returns the unique identifier of the filter, in the
///   form `swift.filters.<module>.<version>.<item-name>`.
pub trait FilterFactory: Sync + Send {
    /// Returns the configuration name of the filter.
    fn name(&self) -> &'static str;

    /// Returns the JSON schema of the filter's configuration.
    fn config_schema(&self) -> schemars::schema::RootSchema;

    /// Returns a filter based on the provided arguments.
    fn create_filter(&self, args: CreateFilterArgs) -> Result<FilterInstance, CreationError>;
}

impl<F> FilterFactory for std::marker::PhantomData<fn() -> F>
where
    F: StaticFilter + 'static,
{
    fn name(&self) -> &'static str {
        F::NAME
    }

    fn config_schema(&self) -> schemars::schema::RootSchema {
        schemars::schema_for!(F::Configuration)
    }

    fn create_filter(&self, args: CreateFilterArgs) -> Result<FilterInstance, CreationError> {
        let config = args
            .config
            .map(serde_json::from_value::<F::Configuration>)
            .transpose()?;

        let config_json = config
            .as_ref()
            .map(serde_json::to_value)
            .transpose()?
            .unwrap_or(serde_json::Value::Null);

        let filter = F::try_from_config(config, args.next)?;
        Ok(FilterInstance::new(config_json, Arc::new(filter)))
    }
}

/// The handler a filter wraps, along with the collaborators a filter may need
/// from the rest of the pipeline.
#[derive(Clone)]
pub struct NextHandler {
    handler: DynHandler,
    container_info: Option<DynContainerInfoLookup>,
}

impl NextHandler {
    pub fn new(handler: DynHandler) -> Self {
        Self {
            handler,
            container_info: None,
        }
    }

    /// Uses `lookup` for container metadata instead of asking the next
    /// handler.
    pub fn with_container_info(mut self, lookup: DynContainerInfoLookup) -> Self {
        self.container_info = Some(lookup);
        self
    }

    /// Returns a new reference to the wrapped handler.
    pub fn handler(&self) -> DynHandler {
        self.handler.clone()
    }

    /// Returns the configured container metadata lookup, by default a `HEAD`
    /// request sent through the wrapped handler.
    pub fn container_info(&self) -> DynContainerInfoLookup {
        self.container_info
            .clone()
            .unwrap_or_else(|| Arc::new(HeadRequestLookup::new(self.handler.clone())))
    }

    /// Keeps the collaborators but wraps `handler` instead.
    pub(crate) fn wrapping(&self, handler: DynHandler) -> Self {
        Self {
            handler,
            container_info: self.container_info.clone(),
        }
    }

    pub async fn handle(&self, request: Request) -> Result<Response, FilterError> {
        self.handler.handle(request).await
    }
}

/// Arguments needed to create a new filter.
pub struct CreateFilterArgs {
    /// Configuration for the filter.
    pub config: Option<serde_json::Value>,
    /// The handler the new filter delegates to.
    pub next: NextHandler,
}

impl CreateFilterArgs {
    pub fn new(config: Option<serde_json::Value>, next: NextHandler) -> Self {
        Self { config, next }
    }
}

/// A created filter together with the normalized configuration it was built
/// from.
#[derive(Clone)]
pub struct FilterInstance {
    config: Arc<serde_json::Value>,
    label: Option<String>,
    filter: DynHandler,
}

impl FilterInstance {
    pub fn new(config: serde_json::Value, filter: DynHandler) -> Self {
        Self {
            config: Arc::new(config),
            label: None,
            filter,
        }
    }

    pub fn with_label(mut self, label: Option<String>) -> Self {
        self.label = label;
        self
    }

    pub fn config(&self) -> &serde_json::Value {
        &self.config
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn filter(&self) -> &DynHandler {
        &self.filter
    }
}

impl std::fmt::Debug for FilterInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterInstance")
            .field("config", &self.config)
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}
