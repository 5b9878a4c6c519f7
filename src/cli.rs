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

mod generate_config_schema;
mod proxy;
mod validate;

use std::{path::Path, path::PathBuf, sync::Arc};

use tokio::{signal, sync::watch};

use crate::Config;

pub use self::{generate_config_schema::GenerateConfigSchema, proxy::Proxy, validate::Validate};

const VERSION: &str = env!("CARGO_PKG_VERSION");
const ETC_CONFIG_PATH: &str = "/etc/swift-addons/swift-addons.yaml";

/// Receives a notification when the process is asked to stop.
pub type ShutdownRx = watch::Receiver<()>;

/// The Command-Line Interface for swift-addons.
#[derive(clap::Parser)]
#[command(version)]
#[non_exhaustive]
pub struct Cli {
    /// Whether to spawn the admin server or not.
    #[clap(env, long)]
    pub no_admin: bool,
    /// The path to the configuration file.
    #[clap(
        short,
        long,
        env = "SWIFT_ADDONS_CONFIG",
        default_value = "swift-addons.yaml"
    )]
    pub config: PathBuf,
    /// The address to bind for the admin server.
    #[clap(long, env = "SWIFT_ADDONS_ADMIN_ADDRESS")]
    pub admin_address: Option<std::net::SocketAddr>,
    /// Whether swift-addons will report any results to stdout/stderr.
    #[clap(short, long, env)]
    pub quiet: bool,
    #[clap(subcommand)]
    pub command: Commands,
}

/// The various swift-addons commands.
#[derive(Clone, Debug, clap::Subcommand)]
pub enum Commands {
    Proxy(Proxy),
    Validate(Validate),
    GenerateConfigSchema(GenerateConfigSchema),
}

impl Commands {
    /// Whether the command is long running and should expose the admin
    /// server.
    pub fn serves_admin(&self) -> bool {
        matches!(self, Self::Proxy(_))
    }
}

impl Cli {
    /// Drives the main application lifecycle using the command line
    /// arguments.
    #[tracing::instrument(skip_all)]
    pub async fn drive(self) -> crate::Result<()> {
        let version: std::borrow::Cow<'static, str> = if cfg!(debug_assertions) {
            format!("{VERSION}+debug").into()
        } else {
            VERSION.into()
        };

        let config = Arc::new(Self::read_config(&self.config)?);

        if !self.quiet {
            crate::log::init(&config.log)?;
        }

        tracing::info!(version = &*version, "Starting swift-addons");

        let _admin_task = (self.command.serves_admin() && !self.no_admin)
            .then(|| crate::admin::server(config.clone(), self.admin_address));

        let (shutdown_tx, shutdown_rx) = watch::channel::<()>(());

        #[cfg(target_os = "linux")]
        let mut sig_term_fut = signal::unix::signal(signal::unix::SignalKind::terminate())?;

        tokio::spawn(async move {
            #[cfg(target_os = "linux")]
            let sig_term = sig_term_fut.recv();
            #[cfg(not(target_os = "linux"))]
            let sig_term = std::future::pending();

            let signal = tokio::select! {
                _ = signal::ctrl_c() => "SIGINT",
                _ = sig_term => "SIGTERM",
            };

            tracing::info!(%signal, "shutting down from signal");
            // Don't unwrap in order to ensure that we execute
            // any subsequent shutdown tasks.
            shutdown_tx.send(()).ok();
        });

        let task = match self.command {
            Commands::Proxy(runner) => {
                tokio::spawn(async move { runner.run(config, shutdown_rx).await })
            }
            Commands::Validate(validator) => {
                tokio::spawn(std::future::ready(validator.validate(&config)))
            }
            Commands::GenerateConfigSchema(generator) => {
                tokio::spawn(std::future::ready(generator.generate_config_schema()))
            }
        };

        task.await?
    }

    /// Searches for the configuration file, falling back to the defaults if
    /// there is none.
    fn read_config<A: AsRef<Path>>(path: A) -> Result<Config, eyre::Error> {
        let path = path.as_ref();
        let from_reader = |file| Config::from_reader(file).map_err(From::from);

        match std::fs::File::open(path) {
            Ok(file) => (from_reader)(file),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path=%path.display(), "provided path not found");
                match cfg!(unix).then(|| std::fs::File::open(ETC_CONFIG_PATH)) {
                    Some(Ok(file)) => (from_reader)(file),
                    Some(Err(error)) if error.kind() == std::io::ErrorKind::NotFound => {
                        tracing::debug!(path = ETC_CONFIG_PATH, "/etc path not found");
                        Ok(Config::default())
                    }
                    Some(Err(error)) => Err(error.into()),
                    None => Ok(Config::default()),
                }
            }
            Err(error) => Err(error.into()),
        }
    }
}
