use std::process::ExitCode;

use clap::Parser;
use pacsbridge::cli::{self, Cli};
use pacsbridge::config::Config;

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref())?;
    cli.apply_overrides(&mut config)?;
    pacsbridge::init_logging(&config.logging)?;

    tracing::info!(
        "Starting pacsbridge {} as {}",
        env!("CARGO_PKG_VERSION"),
        config.scu.local_aet
    );

    let stdout = std::io::stdout();
    let result = cli::run(&cli, &config, &mut stdout.lock())?;
    Ok(if result.is_ok() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
