use serde::Serialize;
use stockpred_core::HistoricalPoint;

use crate::cli::{Cli, PredictArgs};
use crate::error::CliError;

use super::{build_engine, print_json};

#[derive(Debug, Serialize)]
struct PredictOutput {
    ticker: String,
    prediction: f64,
    historical_data: Vec<HistoricalPoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warning: Option<String>,
}

pub async fn run(cli: &Cli, args: &PredictArgs) -> Result<(), CliError> {
    let engine = build_engine(cli)?;
    let outcome = engine.run(Some(args.ticker.as_str())).await?;

    if let Some(warning) = &outcome.warning {
        eprintln!("warning: {warning}");
    }

    print_json(
        &PredictOutput {
            ticker: outcome.record.ticker.to_string(),
            prediction: outcome.response.prediction,
            historical_data: outcome.response.historical_data,
            warning: outcome.warning,
        },
        cli.pretty,
    )
}
