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

use std::{iter::FromIterator, sync::Arc};

use crate::filters::{self, DynFilterFactory, FilterFactory, StaticFilter};

#[cfg(doc)]
use crate::filters::FilterRegistry;

/// A map of [`FilterFactory::name`]s to [`FilterFactory`] values.
pub type FilterMap = std::collections::HashMap<&'static str, Arc<dyn FilterFactory>>;

/// A set of filters to be registered with a [`FilterRegistry`].
#[derive(Clone)]
pub struct FilterSet(FilterMap);

impl Default for FilterSet {
    fn default() -> Self {
        Self::default_with(Option::into_iter(None))
    }
}

impl FilterSet {
    /// Returns a `FilterSet` with the filters provided through `filters` in
    /// addition to the defaults. Any filter factories provided by `filters`
    /// will override any defaults with a matching name.
    ///
    /// Current default filters:
    /// - [`domain_override`][filters::domain_override]
    /// - [`in_flight_counter`][filters::in_flight_counter]
    /// - [`write_restriction`][filters::write_restriction]
    pub fn default_with(filters: impl IntoIterator<Item = DynFilterFactory>) -> Self {
        Self::with(
            [
                filters::DomainOverride::factory(),
                filters::InFlightCounter::factory(),
                filters::WriteRestriction::factory(),
            ]
            .into_iter()
            .chain(filters),
        )
    }

    /// Creates a new [`FilterSet`] with the set of `filter_factories` without
    /// any defaults.
    pub fn with(filters: impl IntoIterator<Item = DynFilterFactory>) -> Self {
        Self::from_iter(filters)
    }

    /// Returns a [`FilterFactory`] if it matches the name, otherwise `None`.
    pub fn get(&self, key: &str) -> Option<&Arc<dyn FilterFactory>> {
        self.0.get(key)
    }

    /// Returns an iterator over the current filters in the set.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn FilterFactory>> + '_ {
        self.0.values()
    }

    /// Inserts factory for the specified [`FilterFactory`], returning any
    /// factory that was previously registered under the same name.
    pub fn insert(&mut self, factory: DynFilterFactory) -> Option<Arc<dyn FilterFactory>> {
        self.0.insert(factory.name(), Arc::from(factory))
    }
}

impl FromIterator<DynFilterFactory> for FilterSet {
    fn from_iter<I: IntoIterator<Item = DynFilterFactory>>(iter: I) -> Self {
        let mut set = Self(Default::default());

        for factory in iter {
            set.insert(factory);
        }

        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::TestFilter;

    #[test]
    fn defaults() {
        let set = FilterSet::default();

        for name in [
            filters::DomainOverride::NAME,
            filters::InFlightCounter::NAME,
            filters::WriteRestriction::NAME,
        ] {
            assert!(set.get(name).is_some(), "{name} should be a default filter");
        }
        assert_eq!(3, set.iter().count());
    }

    #[test]
    fn default_with_extra_filters() {
        let set = FilterSet::default_with([TestFilter::factory()]);
        assert!(set.get(TestFilter::NAME).is_some());
        assert_eq!(4, set.iter().count());
    }
}
