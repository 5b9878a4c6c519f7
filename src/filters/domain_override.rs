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

use serde::{Deserialize, Serialize};

use crate::{filters::prelude::*, request::is_reseller_request};

/// Header a reseller sets to choose the domain of the project an account
/// belongs to.
pub const OVERRIDE_HEADER: &str = "x-account-project-domain-id-override";

/// The account system metadata holding the project's domain.
pub const SYSMETA_HEADER: &str = "x-account-sysmeta-project-domain-id";

/// Lets a reseller set the project domain of an account, which is system
/// metadata and cannot be written by clients directly.
pub struct DomainOverride {
    next: DynHandler,
}

#[async_trait::async_trait]
impl Handler for DomainOverride {
    #[cfg_attr(feature = "instrument", tracing::instrument(skip_all))]
    async fn handle(&self, mut request: Request) -> Result<Response, FilterError> {
        if is_reseller_request(&request) {
            if let Some(value) = request.headers().get(OVERRIDE_HEADER).cloned() {
                tracing::debug!(domain = ?value, "overriding project domain");
                request.headers_mut().insert(SYSMETA_HEADER, value);
            }
        }

        self.next.handle(request).await
    }
}

impl StaticFilter for DomainOverride {
    const NAME: &'static str = "swift.filters.domain_override.v1.DomainOverride";
    type Configuration = Config;

    fn try_from_config(
        _: Option<Self::Configuration>,
        next: NextHandler,
    ) -> Result<Self, CreationError> {
        Ok(Self {
            next: next.handler(),
        })
    }
}

/// `domain_override` filter's configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq, schemars::JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Config {}
