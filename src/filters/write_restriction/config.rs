/*
 * Copyright 2023 Google LLC
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     https://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

use std::fmt;

use schemars::JsonSchema;
use serde::{
    de::{self, SeqAccess, Visitor},
    Deserialize, Deserializer, Serialize,
};

use crate::request::list_from_csv;

/// Configuration of the [`WriteRestriction`][super::WriteRestriction] filter.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Roles that may write into write-restricted containers and toggle the
    /// restriction. Either a comma separated string or a list. When empty the
    /// restriction is disabled.
    #[serde(default, deserialize_with = "deserialize_roles")]
    #[schemars(with = "RolesSchema")]
    pub allowed_roles: Vec<String>,
}

impl Config {
    pub fn new<I, S>(allowed_roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed_roles: allowed_roles.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(JsonSchema)]
#[serde(untagged)]
#[allow(dead_code)]
enum RolesSchema {
    Csv(String),
    List(Vec<String>),
}

/// Role lists can be specified in yaml either as `"admin, swiftreseller"`,
/// the way paste style configuration files carry them, or as a sequence.
/// Entries of a sequence are split on commas as well.
fn deserialize_roles<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    struct RolesVisitor;

    impl<'de> Visitor<'de> for RolesVisitor {
        type Value = Vec<String>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a comma separated list of roles, or a sequence of roles")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(list_from_csv(v))
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Vec::new())
        }

        fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
        where
            A: SeqAccess<'de>,
        {
            let mut roles = Vec::new();
            while let Some(role) = seq.next_element::<String>()? {
                roles.extend(list_from_csv(&role));
            }
            Ok(roles)
        }
    }

    deserializer.deserialize_any(RolesVisitor)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn roles_from_csv_string() {
        let config: Config =
            serde_yaml::from_str("allowed_roles: ' swiftreseller, admin,,'").unwrap();
        assert_eq!(Config::new(["swiftreseller", "admin"]), config);
    }

    #[test]
    fn roles_from_sequence() {
        let config: Config = serde_yaml::from_str(
            "
allowed_roles:
  - swiftreseller
  - admin
",
        )
        .unwrap();
        assert_eq!(Config::new(["swiftreseller", "admin"]), config);

        let config: Config =
            serde_json::from_value(serde_json::json!({ "allowed_roles": ["a", "b,c"] })).unwrap();
        assert_eq!(Config::new(["a", "b", "c"]), config);
    }

    #[test]
    fn roles_default_to_empty() {
        let config: Config = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(config.allowed_roles.is_empty());

        let config: Config = serde_yaml::from_str("allowed_roles:").unwrap();
        assert!(config.allowed_roles.is_empty());
    }

    #[test]
    fn rejects_invalid() {
        assert!(serde_yaml::from_str::<Config>("allowed_roles: 5").is_err());
        assert!(serde_yaml::from_str::<Config>("allowed: admin").is_err());
    }
}
