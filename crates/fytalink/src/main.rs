mod cli;
mod error;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use fytalink_config::Settings;
use fytalink_core::Driver;
use fytalink_host::{Adapter, DriverMetadata, server};

use crate::cli::{Cli, LogFormat};
use crate::error::DriverError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_format);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8, format: LogFormat) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

async fn run(cli: Cli) -> Result<(), DriverError> {
    let mut settings = Settings::load(cli.config_home.as_deref())?;
    cli.apply(&mut settings);
    let config = settings.to_driver_config()?;

    let metadata =
        DriverMetadata::load(&settings.driver_metadata).map_err(DriverError::Metadata)?;
    info!(
        driver_id = %metadata.driver_id,
        version = %metadata.version,
        config_home = %config.config_home.display(),
        "starting driver"
    );

    let driver = Driver::from_config(config)?;
    match driver.restore().await {
        Ok(true) => {
            driver.start_polling().await;
            drop(driver.refresh_now());
        }
        Ok(false) => info!("no stored account, waiting for setup"),
        Err(e) => warn!(error = %e, "stored credentials unreadable, waiting for setup"),
    }

    let listener = server::bind(&settings.listen_addr())
        .await
        .map_err(DriverError::Bind)?;

    let cancel = CancellationToken::new();
    tokio::spawn(shutdown_on_signal(cancel.clone()));

    let adapter = Adapter::new(driver.clone(), metadata);
    let served = server::serve(listener, adapter, cancel).await;
    driver.shutdown().await;
    served.map_err(DriverError::Server)
}

async fn shutdown_on_signal(cancel: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "cannot listen for shutdown signal");
        return;
    }
    info!("shutdown requested");
    cancel.cancel();
}
