//! `decal` binary: exports a design file from the command line.

use std::{process::ExitCode, str::FromStr};

use clap::Parser;
use log::{LevelFilter, debug, error, info, warn};

use decal::DecalError;
use decal_cli::{Args, error_adapter::ErrorAdapter};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    miette::set_panic_hook();

    let args = Args::parse();
    init_logging(&args.log_level);
    debug!(args:?; "Parsed arguments");

    match decal_cli::run(&args).await {
        Ok(path) => {
            println!("{}", path.display());
            ExitCode::SUCCESS
        }
        Err(err) => {
            report(&err);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(level: &str) {
    let parsed = LevelFilter::from_str(level);
    env_logger::Builder::from_env(env_logger::Env::default())
        .filter_level(*parsed.as_ref().unwrap_or(&LevelFilter::Warn))
        .init();

    match parsed {
        Ok(level) => info!(level:?; "Logging initialized"),
        Err(_) => warn!(requested = level; "Unknown log level, falling back to warn"),
    }
}

fn report(err: &DecalError) {
    let mut rendered = String::new();
    match miette::GraphicalReportHandler::new().render_report(&mut rendered, &ErrorAdapter(err)) {
        Ok(()) => error!("{rendered}"),
        Err(_) => error!(err:% = err; "Export failed"),
    }
}
