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

//! Routes the process's logs to stdout.
//!
//! Every module logs under its own target, so `RUST_LOG` directives such as
//! `swift_addons::filters::write_restriction=debug` select a single filter.

use serde::{Deserialize, Serialize};
use tracing_subscriber::{filter::ParseError, EnvFilter};

/// How log records are rendered.
#[derive(
    Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq, schemars::JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// One JSON object per line.
    #[default]
    Json,
    /// Multi-line, human readable.
    Pretty,
    /// Single-line, human readable.
    Compact,
}

/// Logging configuration.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq, schemars::JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub format: Format,
    /// Default filter directives, used when `RUST_LOG` is not set.
    #[serde(default = "default_level")]
    pub level: String,
}

fn default_level() -> String {
    "info".into()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            format: Format::default(),
            level: default_level(),
        }
    }
}

impl Config {
    /// Returns the filter built from `RUST_LOG` when it is set, and from
    /// [`Self::level`] otherwise.
    pub fn env_filter(&self) -> Result<EnvFilter, ParseError> {
        self.filter_from(std::env::var(EnvFilter::DEFAULT_ENV).ok().as_deref())
    }

    fn filter_from(&self, env: Option<&str>) -> Result<EnvFilter, ParseError> {
        match env.filter(|directives| !directives.trim().is_empty()) {
            Some(directives) => EnvFilter::try_new(directives),
            None => EnvFilter::try_new(&self.level),
        }
    }
}

/// Installs the global subscriber writing to stdout.
///
/// # Errors
/// If the directives are invalid or a global subscriber is already set.
pub fn init(config: &Config) -> crate::Result<()> {
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stdout)
        .with_env_filter(config.env_filter()?);

    match config.format {
        Format::Json => builder.json().with_file(true).try_init(),
        Format::Pretty => builder.pretty().try_init(),
        Format::Compact => builder.compact().try_init(),
    }
    .map_err(|error| eyre::eyre!(error))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn parse_config() {
        let config: Config = serde_yaml::from_str("format: pretty\nlevel: debug").unwrap();
        assert_eq!(
            Config {
                format: Format::Pretty,
                level: "debug".into(),
            },
            config
        );

        let config: Config = serde_yaml::from_str("{}").unwrap();
        assert_eq!(Config::default(), config);
        assert_eq!(Format::Json, config.format);

        assert!(serde_yaml::from_str::<Config>("format: xml").is_err());
    }

    #[test]
    fn env_overrides_level() {
        let config = Config {
            level: "warn".into(),
            ..Config::default()
        };

        assert_eq!(
            "warn",
            config.filter_from(None).unwrap().to_string()
        );
        assert_eq!(
            "warn",
            config.filter_from(Some(" ")).unwrap().to_string()
        );
        assert_eq!(
            "swift_addons=debug",
            config
                .filter_from(Some("swift_addons=debug"))
                .unwrap()
                .to_string()
        );
    }

    #[test]
    fn invalid_level() {
        let config = Config {
            level: "swift_addons=loud".into(),
            ..Config::default()
        };
        assert!(config.filter_from(None).is_err());
    }
}
