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

#![deny(unused_must_use)]

pub mod admin;
pub mod cli;
pub mod config;
pub mod filters;
pub mod info;
pub mod log;
pub mod metrics;
pub mod request;
pub mod upstream;


pub type Result<T, E = eyre::Error> = std::result::Result<T, E>;

/// The request type flowing through every filter.
pub type Request = hyper::Request<hyper::Body>;
/// The response type produced by every handler.
pub type Response = hyper::Response<hyper::Body>;

#[doc(inline)]
pub use self::{cli::Cli, config::Config};
