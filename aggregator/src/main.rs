mod config;

use aggregation::AggregationError;
use clap::{Args, Parser};
use config::{Config, ConfigError, LoggingConfig, MetricsConfig};
use metrics_exporter_statsd::StatsdBuilder;
use shared::metrics_defs::describe_metrics;
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

const METRICS_PREFIX: &str = "tnt_aggregator";

#[derive(Parser)]
#[command(name = "tnt-aggregator", version)]
enum CliCommand {
    /// Serve the aggregation endpoint
    Aggregation(ConfigArgs),
    /// Load and validate a config file, then exit
    ValidateConfig(ConfigArgs),
}

#[derive(Args, Debug)]
struct ConfigArgs {
    #[arg(long)]
    config_file_path: PathBuf,
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("could not initialize logging: {0}")]
    Logging(String),
    #[error("could not initialize metrics: {0}")]
    Metrics(String),
    #[error("could not start runtime: {0}")]
    Runtime(#[from] std::io::Error),
    #[error(transparent)]
    Aggregation(#[from] AggregationError),
}

fn main() {
    let cli = CliCommand::parse();

    if let Err(e) = cli_main(cli) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn cli_main(cli: CliCommand) -> Result<(), CliError> {
    match cli {
        CliCommand::Aggregation(args) => {
            let config = Config::from_file(&args.config_file_path)?;

            // Dropping the guard flushes pending sentry events
            let _sentry = init_logging(config.common.logging.as_ref())?;
            if let Some(metrics) = &config.common.metrics {
                init_metrics(metrics)?;
            }

            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;
            runtime.block_on(aggregation::run(config.aggregation))?;
        }
        CliCommand::ValidateConfig(args) => {
            let config = Config::from_file(&args.config_file_path)?;
            config
                .aggregation
                .validate()
                .map_err(AggregationError::from)?;
            println!("Config is valid");
        }
    }
    Ok(())
}

fn init_logging(
    logging: Option<&LoggingConfig>,
) -> Result<Option<sentry::ClientInitGuard>, CliError> {
    let guard = logging.map(|logging| {
        sentry::init((
            logging.sentry_dsn.as_str(),
            sentry::ClientOptions {
                release: sentry::release_name!(),
                ..Default::default()
            },
        ))
    });
    let sentry_layer = guard
        .as_ref()
        .map(|_| sentry::integrations::tracing::layer());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_layer)
        .try_init()
        .map_err(|e| CliError::Logging(e.to_string()))?;

    Ok(guard)
}

fn init_metrics(metrics: &MetricsConfig) -> Result<(), CliError> {
    let recorder = StatsdBuilder::from(metrics.statsd_host.as_str(), metrics.statsd_port)
        .build(Some(METRICS_PREFIX))
        .map_err(|e| CliError::Metrics(e.to_string()))?;
    metrics::set_global_recorder(recorder).map_err(|e| CliError::Metrics(e.to_string()))?;

    describe_metrics(batcher::metrics_defs::ALL_METRICS);
    describe_metrics(aggregation::metrics_defs::ALL_METRICS);

    tracing::info!(
        host = %metrics.statsd_host,
        port = metrics.statsd_port,
        "Reporting metrics to statsd"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition() {
        CliCommand::command().debug_assert();

        let cli = CliCommand::try_parse_from([
            "tnt-aggregator",
            "aggregation",
            "--config-file-path",
            "config.yaml",
        ])
        .unwrap();
        assert!(matches!(
            cli,
            CliCommand::Aggregation(ConfigArgs { ref config_file_path })
                if config_file_path == &PathBuf::from("config.yaml")
        ));

        assert!(CliCommand::try_parse_from(["tnt-aggregator", "validate-config"]).is_err());
    }

    #[test]
    fn validate_config_rejects_invalid_values() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(
            &mut tmp,
            br#"
aggregation:
    listener: {host: 0.0.0.0, port: 0}
    admin_listener: {host: 127.0.0.1, port: 3001}
    upstream: {url: "http://localhost:8080"}
"#,
        )
        .unwrap();

        let cli = CliCommand::ValidateConfig(ConfigArgs {
            config_file_path: tmp.path().to_path_buf(),
        });
        assert!(matches!(
            cli_main(cli),
            Err(CliError::Aggregation(AggregationError::InvalidConfig(_)))
        ));
    }
}
