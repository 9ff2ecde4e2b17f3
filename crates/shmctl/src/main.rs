use clap::Parser;
use shmctl::{Cli, ShmctlConfig, commands};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = ShmctlConfig::from_env()?;
    if let Some(permissions) = cli.permissions {
        config.permissions = permissions;
    }
    common::setup_logging(config.environment);

    tracing::debug!(?config, command = ?cli.command, "Starting shmctl");

    let stdout = std::io::stdout();
    commands::run(&cli.command, &config, &mut stdout.lock())
}
