/*
 * Copyright 2020 Google LLC All Rights Reserved.
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

use hyper::StatusCode;
use once_cell::sync::Lazy;
use prometheus::{
    core::Collector, Histogram, HistogramOpts, IntCounterVec, IntGaugeVec, Opts, Registry,
    DEFAULT_BUCKETS,
};

pub use prometheus::Result;

pub const NAMESPACE: &str = "swift_addons";

pub(crate) const ROUTE_LABEL: &str = "route";
pub(crate) const STATUS_LABEL: &str = "status";

/// Start the histogram bucket at a quarter of a millisecond; a filter chain
/// answering on its own is expected to be well below that.
const BUCKET_START: f64 = 0.000_25;

const BUCKET_FACTOR: f64 = 2.5;

/// 13 buckets at a factor of 2.5 reach just under four seconds, beyond which
/// the upstream is the one being measured.
const BUCKET_COUNT: usize = 13;

static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

/// Returns the [`Registry`] containing all the metrics of this process.
#[inline]
pub fn registry() -> &'static Registry {
    &REGISTRY
}

pub fn opts(name: &str, subsystem: &str, description: &str) -> Opts {
    Opts::new(name, description)
        .namespace(NAMESPACE)
        .subsystem(subsystem)
}

pub fn histogram_opts(
    name: &str,
    subsystem: &str,
    description: &str,
    buckets: Option<Vec<f64>>,
) -> HistogramOpts {
    HistogramOpts {
        common_opts: opts(name, subsystem, description),
        buckets: buckets.unwrap_or(Vec::from(DEFAULT_BUCKETS as &'static [f64])),
    }
}

/// Total duration of requests through a filter chain, including the
/// application behind it.
pub(crate) fn request_duration_seconds() -> &'static Histogram {
    static METRIC: Lazy<Histogram> = Lazy::new(|| {
        Histogram::with_opts(histogram_opts(
            "request_duration_seconds",
            "chain",
            "Seconds taken to answer a request through the filter chain.",
            Some(
                prometheus::exponential_buckets(BUCKET_START, BUCKET_FACTOR, BUCKET_COUNT)
                    .unwrap(),
            ),
        ))
        .and_then(|histogram| histogram.register_if_not_exists())
        .unwrap()
    });

    &METRIC
}

/// Counts a response sent from a filter chain.
pub(crate) fn responses_total(status: StatusCode) {
    static METRIC: Lazy<IntCounterVec> = Lazy::new(|| {
        IntCounterVec::new(
            opts(
                "responses_total",
                "chain",
                "Total number of responses sent by the filter chain, by status code.",
            ),
            &[STATUS_LABEL],
        )
        .and_then(|metric| metric.register_if_not_exists())
        .unwrap()
    });

    METRIC.with_label_values(&[status.as_str()]).inc();
}

/// Gauge of the requests currently inside an in-flight counter, by route.
pub(crate) fn requests_in_flight() -> &'static IntGaugeVec {
    static METRIC: Lazy<IntGaugeVec> = Lazy::new(|| {
        IntGaugeVec::new(
            Opts::new(
                "requests_in_flight",
                "Number of requests currently being handled behind the in-flight counter.",
            )
            .namespace(NAMESPACE),
            &[ROUTE_LABEL],
        )
        .and_then(|metric| metric.register_if_not_exists())
        .unwrap()
    });

    &METRIC
}

pub trait CollectorExt: Collector + Clone + Sized + 'static {
    /// Registers the current metric collector with the process registry.
    fn register_if_not_exists(self) -> Result<Self> {
        match registry().register(Box::new(self.clone())) {
            Ok(_) | Err(prometheus::Error::AlreadyReg) => Ok(self),
            Err(err) => Err(err),
        }
    }
}

impl<C: Collector + Clone + 'static> CollectorExt for C {}
