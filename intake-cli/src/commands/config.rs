//! Configuration inspection command

use anyhow::Result;
use console::style;
use intake::config::IntakeConfig;
use std::path::PathBuf;

/// Print the resolved configuration with secrets masked
#[derive(Debug, Clone, Default)]
pub struct ConfigCommand {
    /// Explicit configuration file
    pub config: Option<PathBuf>,
}

impl ConfigCommand {
    /// Render the resolved configuration as TOML
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be loaded or serialized.
    pub fn render(&self) -> Result<String> {
        let config = IntakeConfig::load_with(self.config.as_deref())?;
        Ok(toml::to_string_pretty(&config.redacted())?)
    }

    /// Execute the command
    ///
    /// # Errors
    ///
    /// See [`ConfigCommand::render`].
    pub fn execute(&self) -> Result<()> {
        let rendered = self.render()?;
        let source = self.config.as_ref().map_or_else(
            || "defaults, /etc/intake, user config, ./intake.toml, INTAKE_*".to_string(),
            |path| path.display().to_string(),
        );
        eprintln!("{} {}", style("# resolved from").dim(), style(source).dim());
        print!("{rendered}");
        Ok(())
    }
}
