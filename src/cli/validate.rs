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

use std::sync::Arc;

use crate::{filters::NextHandler, upstream::Unrouted, Config};

/// Checks the configuration and prints the filter chain it describes.
#[derive(clap::Args, Clone, Debug, Default)]
pub struct Validate {}

impl Validate {
    pub fn validate(&self, config: &Config) -> crate::Result<()> {
        let chain = Self::chain_summary(config)?;
        print!("{chain}");
        Ok(())
    }

    /// Builds the chain and renders its filters, in request order, as yaml.
    fn chain_summary(config: &Config) -> crate::Result<String> {
        config.validate()?;
        let chain = config.filter_chain(NextHandler::new(Arc::new(Unrouted)))?;
        tracing::info!(filters = chain.len(), "configuration is valid");

        Ok(serde_yaml::to_string(&chain.iter().collect::<Vec<_>>())?)
    }
}
