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

//! Filters for processing storage API requests.

mod chain;
mod error;
mod factory;
mod registry;
mod set;

pub mod domain_override;
pub mod in_flight_counter;
pub mod write_restriction;

use std::sync::Arc;

use crate::{Request, Response};

/// Prelude containing all types and traits required to implement [`Handler`]
/// and [`StaticFilter`].
pub mod prelude {
    pub use super::{
        CreateFilterArgs, CreationError, DynHandler, FilterError, Handler, NextHandler,
        StaticFilter,
    };
    pub use crate::{Request, Response};
}

#[doc(inline)]
pub use self::{
    chain::FilterChain,
    domain_override::DomainOverride,
    error::{CreationError, FilterError},
    factory::{CreateFilterArgs, DynFilterFactory, FilterFactory, FilterInstance, NextHandler},
    in_flight_counter::InFlightCounter,
    registry::FilterRegistry,
    set::{FilterMap, FilterSet},
    write_restriction::WriteRestriction,
};

/// An owned pointer to a dynamic [`Handler`].
pub type DynHandler = Arc<dyn Handler>;

/// Anything that turns a request into a response: the application at the end
/// of the pipeline as well as every filter wrapped around it.
///
/// A filter holds the [`Handler`] it wraps and decides per request whether to
/// answer on its own or to delegate.
#[async_trait::async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, request: Request) -> Result<Response, FilterError>;
}

/// Statically safe version of a filter, if you're writing a Rust filter, you
/// should implement [`StaticFilter`] in addition to [`Handler`], as
/// [`StaticFilter`] lets the registry create the filter by name from its
/// configuration.
/// ```
/// use swift_addons::filters::prelude::*;
///
/// struct Greet {
///     next: DynHandler,
/// }
///
/// #[async_trait::async_trait]
/// impl Handler for Greet {
///     async fn handle(&self, mut request: Request) -> Result<Response, FilterError> {
///         request
///             .headers_mut()
///             .insert("x-greeting", "hello".parse().unwrap());
///         self.next.handle(request).await
///     }
/// }
///
/// impl StaticFilter for Greet {
///     const NAME: &'static str = "greet.v1";
///     type Configuration = ();
///
///     fn try_from_config(_: Option<Self::Configuration>, next: NextHandler) -> Result<Self, CreationError> {
///         Ok(Self { next: next.handler() })
///     }
/// }
/// ```
pub trait StaticFilter: Handler + Sized {
    /// The globally unique name of the filter.
    const NAME: &'static str;
    /// The human-readable configuration of the filter. **Must** be [`serde`]
    /// compatible and have a JSON schema.
    type Configuration: schemars::JsonSchema
        + serde::Serialize
        + for<'de> serde::Deserialize<'de>;

    /// Instantiates a new [`StaticFilter`] from the given configuration, if
    /// any, wrapped around `next`.
    /// # Errors
    /// If the provided configuration is invalid.
    fn try_from_config(
        config: Option<Self::Configuration>,
        next: NextHandler,
    ) -> Result<Self, CreationError>;

    /// Creates a new dynamic [`FilterFactory`] virtual table.
    fn factory() -> DynFilterFactory
    where
        Self: 'static,
    {
        Box::from(std::marker::PhantomData::<fn() -> Self>)
    }

    /// Convenience method for providing a consistent error message for filters
    /// which require a fully initialized [`Self::Configuration`].
    fn ensure_config_exists(
        config: Option<Self::Configuration>,
    ) -> Result<Self::Configuration, CreationError> {
        config.ok_or(CreationError::MissingConfig(Self::NAME))
    }

    /// Returns the pipeline configuration entry for this filter.
    fn as_filter_config(
        config: impl Into<Option<Self::Configuration>>,
    ) -> Result<crate::config::Filter, CreationError> {
        Ok(crate::config::Filter {
            name: Self::NAME.into(),
            label: None,
            config: config
                .into()
                .map(|config| serde_json::to_value(&config))
                .transpose()?,
        })
    }
}
