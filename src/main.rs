//! COVID-19 Dashboard - builds the dashboard report and prints it as JSON
//! for the map renderer.

use anyhow::Result;
use covid_dashboard::config::Settings;
use covid_dashboard::dashboard::{build_report, DashboardError};
use covid_dashboard::data::{DataLoader, DataSource, LocalDirSource, ObjectStoreSource};
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

fn main() -> Result<ExitCode> {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_writer(std::io::stderr)
        .init();
    info!("startup");

    let settings = Settings::from_env();
    match settings.data_root.clone() {
        Some(root) => {
            info!("reading dataset from local directory");
            run(LocalDirSource::new(root), &settings)
        }
        None => run(ObjectStoreSource::s3()?, &settings),
    }
}

fn run<S: DataSource>(source: S, settings: &Settings) -> Result<ExitCode> {
    let loader = DataLoader::new(source, settings.cache_ttl);

    match build_report(&loader, settings) {
        Ok(report) => {
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(DashboardError::Loader(e)) if e.is_warning() => {
            warn!("{e}");
            eprintln!("{}", e.user_message());
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            error!("{e}");
            eprintln!("{}", e.user_message());
            Ok(ExitCode::FAILURE)
        }
    }
}
