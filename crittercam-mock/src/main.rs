use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use crittercam_embedded::orchestrator::BootExit;
use crittercam_mock::run;
use crittercam_mock::settings::Settings;

#[tokio::main]
async fn main() -> ExitCode {
    let path = env::args_os().nth(1).map(PathBuf::from);
    let settings = match Settings::new(path.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Failed to load settings: {e}");
            return ExitCode::FAILURE;
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            let app_name = env!("CARGO_PKG_NAME").replace('-', "_");
            let level = settings.logger.level.as_str();

            format!("{app_name}={level},crittercam_embedded={level}").into()
        }))
        .init();

    match run(&settings).await {
        Ok(BootExit::Suspended(report)) => {
            tracing::info!(
                "Suspended for {} ({:?}) after {} ms",
                report.sleep,
                report.reason,
                report.elapsed_ms
            );
            ExitCode::SUCCESS
        }
        Ok(BootExit::Reset(e)) => {
            tracing::warn!("Board reset: {e}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
