//! Server command

use anyhow::Result;
use console::style;
use intake::config::IntakeConfig;
use intake::observability::{self, ObservabilityConfig};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Run the upload service until Ctrl-C
#[derive(Debug, Clone, Default)]
pub struct ServeCommand {
    /// Explicit configuration file
    pub config: Option<PathBuf>,
    /// Listen address overriding `server.bind`
    pub bind: Option<SocketAddr>,
}

impl ServeCommand {
    /// Create a new command instance
    #[must_use]
    pub const fn new(config: Option<PathBuf>, bind: Option<SocketAddr>) -> Self {
        Self { config, bind }
    }

    /// Resolve the configuration the server will run with
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be loaded or is invalid.
    pub fn resolve(&self) -> Result<IntakeConfig> {
        let mut config = IntakeConfig::load_with(self.config.as_deref())?;
        if let Some(bind) = self.bind {
            config.server.bind = bind;
        }
        Ok(config)
    }

    /// Execute the command
    ///
    /// # Errors
    ///
    /// Returns an error if configuration, logging setup, or the server fails.
    pub async fn execute(&self) -> Result<()> {
        let config = self.resolve()?;
        observability::init(&ObservabilityConfig::default())?;

        println!(
            "{} {} {}",
            style("Serving").green().bold(),
            style(format!("http://{}", config.server.bind)).cyan(),
            style(format!("({} storage)", config.storage.backend)).dim()
        );

        intake::server::run(config).await
    }
}
