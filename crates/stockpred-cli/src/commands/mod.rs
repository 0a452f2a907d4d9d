mod history;
mod predict;
mod serve;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use stockpred_core::{
    EngineConfig, FnModel, HttpClient, LstmModel, ModelError, NoopHttpClient, PredictionEngine,
    PredictionStore, ReqwestHttpClient, SharedModel, UnavailableStore, YahooAdapter,
};
use stockpred_warehouse::{Warehouse, WarehouseConfig};

use crate::cli::{Cli, Command};
use crate::error::CliError;

const MODEL_FILE: &str = "model.json";

pub async fn run(cli: &Cli) -> Result<(), CliError> {
    match &cli.command {
        Command::Predict(args) => predict::run(cli, args).await,
        Command::History(args) => history::run(cli, args),
        Command::Serve(args) => serve::run(cli, args).await,
    }
}

/// Print `value` as JSON on stdout.
pub fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<(), CliError> {
    let rendered = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{rendered}");
    Ok(())
}

pub fn engine_config(cli: &Cli) -> EngineConfig {
    let mut config = EngineConfig::from_env();
    if let Some(timeout_ms) = cli.timeout_ms {
        config = config.with_fetch_timeout(Duration::from_millis(timeout_ms));
    }
    if let Some(days) = cli.lookback_days {
        config = config.with_lookback_days(days);
    }
    config
}

/// Wire source, model and store from the global flags.
pub fn build_engine(cli: &Cli) -> Result<PredictionEngine, CliError> {
    let config = engine_config(cli);
    let warehouse_config = WarehouseConfig::default();

    let http_client: Arc<dyn HttpClient> = if cli.mock {
        Arc::new(NoopHttpClient)
    } else {
        Arc::new(ReqwestHttpClient::new())
    };
    let fetch_timeout_ms = u64::try_from(config.fetch_timeout.as_millis()).unwrap_or(u64::MAX);
    let source = YahooAdapter::with_http_client(http_client).with_timeout_ms(fetch_timeout_ms);

    let model = load_model(cli, &warehouse_config, config.time_steps)?;
    let store = open_store(warehouse_config);

    Ok(PredictionEngine::new(
        Arc::new(source),
        Arc::new(model),
        store,
        config,
    ))
}

fn load_model(
    cli: &Cli,
    warehouse_config: &WarehouseConfig,
    time_steps: usize,
) -> Result<SharedModel, CliError> {
    let path = cli
        .model
        .clone()
        .unwrap_or_else(|| default_model_path(warehouse_config));

    if path.exists() {
        let model = LstmModel::load(&path)?;
        if model.sequence_length() != time_steps {
            tracing::error!(
                path = %path.display(),
                sequence_length = model.sequence_length(),
                time_steps,
                "model artifact does not match the configured window"
            );
            return Err(CliError::Model(ModelError::ShapeMismatch {
                expected: time_steps,
                actual: model.sequence_length(),
            }));
        }
        return Ok(SharedModel::from_model(model));
    }
    if cli.mock {
        tracing::warn!(path = %path.display(), "no model artifact; using last-value model");
        return Ok(SharedModel::from_model(FnModel::new(
            "last-value",
            |window: &[f64]| {
                window
                    .last()
                    .copied()
                    .ok_or_else(|| ModelError::Backend(String::from("empty window")))
            },
        )));
    }

    Err(CliError::MissingModel {
        path: path.display().to_string(),
    })
}

fn default_model_path(warehouse_config: &WarehouseConfig) -> PathBuf {
    warehouse_config.stockpred_home.join(MODEL_FILE)
}

// A prediction log that cannot be opened must not block forecasting; each
// response then carries the lost-write warning.
fn open_store(config: WarehouseConfig) -> Arc<dyn PredictionStore> {
    match Warehouse::open(config) {
        Ok(warehouse) => Arc::new(warehouse),
        Err(error) => {
            tracing::warn!(%error, "prediction log unavailable; predictions will not be recorded");
            Arc::new(UnavailableStore::new(error.to_string()))
        }
    }
}
