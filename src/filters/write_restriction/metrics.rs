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

use once_cell::sync::Lazy;
use prometheus::{IntCounter, IntCounterVec, Result as MetricsResult};

use crate::metrics::{opts, CollectorExt};

pub(super) const REASON_HEADER: &str = "restricted_header";
pub(super) const REASON_CONTAINER: &str = "restricted_container";

static REJECTED_TOTAL: Lazy<MetricsResult<IntCounterVec>> = Lazy::new(|| {
    IntCounterVec::new(
        opts(
            "rejected_total",
            "write_restriction",
            "Total number of write requests rejected by the write restriction, by reason",
        ),
        &["reason"],
    )?
    .register_if_not_exists()
});

pub(super) struct Metrics {
    pub(super) rejected_header: IntCounter,
    pub(super) rejected_container: IntCounter,
}

impl Metrics {
    pub(super) fn new() -> MetricsResult<Self> {
        let rejected_total = REJECTED_TOTAL
            .as_ref()
            .map_err(|error| prometheus::Error::Msg(error.to_string()))?;

        Ok(Metrics {
            rejected_header: rejected_total.get_metric_with_label_values(&[REASON_HEADER])?,
            rejected_container: rejected_total
                .get_metric_with_label_values(&[REASON_CONTAINER])?,
        })
    }
}
