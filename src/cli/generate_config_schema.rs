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

use std::path::PathBuf;

use crate::filters::FilterSet;

/// Writes the JSON schema of each filter's configuration, as YAML, into
/// `<output directory>/<filter name>.yaml`.
#[derive(clap::Args, Clone, Debug)]
pub struct GenerateConfigSchema {
    /// Directory the schema files are written to.
    #[clap(short, long, default_value = ".")]
    pub output_directory: PathBuf,
    /// Names of the filters to write schemas for, or `all`.
    #[clap(num_args = 1.., default_value = "all")]
    pub filter_ids: Vec<String>,
}

impl GenerateConfigSchema {
    fn wants_all(&self) -> bool {
        matches!(self.filter_ids.as_slice(), [id] if id.eq_ignore_ascii_case("all"))
    }

    /// Unknown filter names are logged and skipped.
    pub fn generate_config_schema(&self) -> crate::Result<()> {
        let set = FilterSet::default();

        let factories: Vec<_> = if self.wants_all() {
            set.iter().collect()
        } else {
            self.filter_ids
                .iter()
                .filter_map(|id| {
                    let factory = set.get(id);
                    if factory.is_none() {
                        tracing::warn!(%id, "no such filter, skipping");
                    }
                    factory
                })
                .collect()
        };

        for factory in factories {
            let path = self.output_directory.join(format!("{}.yaml", factory.name()));
            tracing::info!(filter = factory.name(), path = %path.display(), "writing schema");
            std::fs::write(&path, serde_yaml::to_string(&factory.config_schema())?)?;
        }

        Ok(())
    }
}
