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

use std::sync::Arc;

use arc_swap::ArcSwap;
use once_cell::sync::Lazy;

use crate::filters::{CreateFilterArgs, CreationError, DynFilterFactory, FilterInstance, FilterSet};

static REGISTRY: Lazy<ArcSwap<FilterSet>> =
    Lazy::new(|| ArcSwap::new(Arc::new(FilterSet::default())));

/// Registry of all filters that can be applied in the system.
///
/// The registry starts out with [`FilterSet::default`]; additional factories
/// can be added at startup with [`FilterRegistry::register`].
#[derive(Debug)]
pub struct FilterRegistry;

impl FilterRegistry {
    /// Loads the provided factories into the registry of available filters,
    /// replacing any existing factory of the same name.
    pub fn register(factories: impl IntoIterator<Item = DynFilterFactory>) {
        let mut registry = FilterSet::clone(&REGISTRY.load_full());
        for factory in factories {
            registry.insert(factory);
        }

        REGISTRY.store(Arc::from(registry));
    }

    /// Creates and returns a new filter instance for a given `key`. Errors if
    /// the filter cannot be found, or if there is a configuration issue.
    pub fn get(key: &str, args: CreateFilterArgs) -> Result<FilterInstance, CreationError> {
        match REGISTRY.load().get(key).map(|p| p.create_filter(args)) {
            None => Err(CreationError::NotFound(key.to_owned())),
            Some(filter) => filter,
        }
    }

    /// Returns `true` if a filter named `key` is registered.
    pub fn contains(key: &str) -> bool {
        REGISTRY.load().get(key).is_some()
    }
}
