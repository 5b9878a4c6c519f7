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

use std::{collections::HashSet, io};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::filters::{CreationError, FilterChain, FilterRegistry, NextHandler};

/// Validation failure for a Config
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("field {0} is not unique")]
    NotUnique(String),
    #[error("filter `{0}` not found")]
    UnknownFilter(String),
}

/// Config is the configuration of the filter pipeline and of the process
/// running it.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub log: crate::log::Config,
    /// Filters in request order, the first one sees each request first.
    #[serde(default)]
    pub filters: Vec<Filter>,
}

/// Filter is the configuration for a single filter
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Filter {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<serde_json::Value>,
}

impl Config {
    /// from_reader returns a config from a given Reader
    pub fn from_reader<R: io::Read>(input: R) -> Result<Config, serde_yaml::Error> {
        serde_yaml::from_reader(input)
    }

    /// Checks that every filter is known and that labels are unique.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(filter) = self
            .filters
            .iter()
            .find(|filter| !FilterRegistry::contains(&filter.name))
        {
            return Err(ValidationError::UnknownFilter(filter.name.clone()));
        }

        let labels: Vec<_> = self
            .filters
            .iter()
            .filter_map(|filter| filter.label.as_deref())
            .collect();
        if labels.iter().collect::<HashSet<_>>().len() != labels.len() {
            return Err(ValidationError::NotUnique("filters.label".into()));
        }

        Ok(())
    }

    /// Builds the configured filters around `app`.
    pub fn filter_chain(&self, app: NextHandler) -> Result<FilterChain, CreationError> {
        FilterChain::try_create(self.filters.clone(), app)
    }
}
