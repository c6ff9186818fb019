use clap::Parser;
use std::process::ExitCode;
use taskstat_sync::args::{Args, Command};
use taskstat_sync::model::DateRange;
use taskstat_sync::{commands, Config, Error, ErrorType, Mode, Result};
use tracing::{debug, error, trace};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let log_level = args.common().log_level();
    init_logger(log_level);
    debug!("Log level set to {}", log_level.to_string().to_lowercase());

    match main_inner(args).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Exiting with error: {e}");
            ExitCode::FAILURE
        }
    }
}

pub async fn main_inner(args: Args) -> Result<()> {
    trace!("{args:?}");
    let home = args.common().taskstat_home().path();

    // This allows for running the program without hitting Jira or the Google APIs. When
    // TASKSTAT_IN_TEST_MODE is set and non-zero in length, then the mode will be Mode::Testing,
    // otherwise it will be Mode::Google.
    let mode = Mode::from_env();

    let _: () = match args.command() {
        Command::Init(init_args) => {
            commands::init(home, init_args.client_secret(), &init_args.settings())
                .await?
                .print()
        }

        Command::Auth(auth_args) => {
            let config = load_config(&args).await?;
            if auth_args.verify() {
                commands::auth_verify(&config).await?.print()
            } else {
                commands::auth(&config).await?.print()
            }
        }

        Command::Report(range_args) => {
            let config = load_config(&args).await?;
            let range = date_range(range_args.start(), range_args.end())?;
            commands::report(&config, mode, range).await?.print()
        }

        Command::Sync(sync_args) => {
            let config = load_config(&args).await?;
            let range = date_range(sync_args.range().start(), sync_args.range().end())?;
            commands::sync(&config, mode, range, sync_args.dry_run())
                .await?
                .print()
        }

        Command::Serve(serve_args) => {
            let config = load_config(&args).await?;
            commands::serve(config, mode, serve_args.host(), serve_args.port())
                .await?
                .print()
        }
    };
    Ok(())
}

async fn load_config(args: &Args) -> Result<Config> {
    let config = Config::load(args.common().taskstat_home().path())
        .await
        .map_err(|e| Error::new(ErrorType::Configuration, e))?;
    Ok(config.with_jira_credentials(args.common().jira_credentials()))
}

fn date_range(start: chrono::NaiveDate, end: chrono::NaiveDate) -> Result<DateRange> {
    DateRange::new(start, end).map_err(|e| Error::new(ErrorType::Configuration, e))
}

/// Initializes the tracing subscriber.
pub fn init_logger(level: LevelFilter) {
    let filter = match std::env::var("RUST_LOG").ok() {
        Some(_) => {
            // RUST_LOG exists; use it.
            EnvFilter::from_default_env()
        }
        None => {
            // RUST_LOG does not exist; use default log level for the library and binary only.
            EnvFilter::new(format!(
                "{}={},{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                level,
                env!("CARGO_BIN_NAME"),
                level
            ))
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
